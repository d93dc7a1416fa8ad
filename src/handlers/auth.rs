use crate::db::models::{CurrentUser, User, UserProfile};
use crate::db::queries;
use crate::error::AppError;
use crate::middleware::auth::{create_token, AuthUser};
use crate::validation::{sanitize_string, validate_email, validate_required};
use crate::AppState;
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use axum::{extract::State, response::IntoResponse, Extension, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct RegisterPayload {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub token: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<impl IntoResponse, AppError> {
    let email = payload.email.as_deref().unwrap_or_default();
    let name = sanitize_string(payload.name.as_deref().unwrap_or_default());
    let password = payload.password.as_deref().unwrap_or_default();

    validate_email("email", email)?;
    validate_required("name", &name)?;
    validate_required("password", password)?;

    let email = sanitize_string(email).to_lowercase();

    if queries::find_user_by_email(&state.db, &email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = hash_password(password)?;
    let user = queries::insert_user(&state.db, &User::new(email, name, password_hash)).await?;

    let token = create_token(user.id, &user.email, state.config.jwt_secret.as_bytes())?;

    Ok(Json(AuthResponse {
        user: user.profile(),
        token,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse, AppError> {
    let email = payload.email.as_deref().unwrap_or_default();
    let password = payload.password.as_deref().unwrap_or_default();

    validate_required("email", email)?;
    validate_required("password", password)?;

    let email = sanitize_string(email).to_lowercase();

    // Same rejection for unknown email and bad password, so the response
    // does not reveal which accounts exist.
    let user = queries::find_user_by_email(&state.db, &email)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    if !verify_password(password, &user.password_hash) {
        return Err(AppError::Unauthenticated);
    }

    let token = create_token(user.id, &user.email, state.config.jwt_secret.as_bytes())?;

    Ok(Json(AuthResponse {
        user: user.profile(),
        token,
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let user = queries::find_user_by_id(&state.db, auth_user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(CurrentUser {
        id: user.id,
        email: user.email,
        name: user.name,
        created_at: user.created_at,
    }))
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("failed to hash password: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
