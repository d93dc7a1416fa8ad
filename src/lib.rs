pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod money;
pub mod startup;
pub mod utils;
pub mod validation;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use config::Config;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Config,
}

pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        .route(
            "/api/goals",
            post(handlers::goals::create_goal).get(handlers::goals::list_goals),
        )
        .route(
            "/api/goals/:id",
            get(handlers::goals::get_goal)
                .put(handlers::goals::update_goal)
                .delete(handlers::goals::delete_goal),
        )
        .route(
            "/api/goals/:id/transactions",
            post(handlers::goals::add_transaction),
        )
        .route(
            "/api/shared-goals",
            post(handlers::shared_goals::create_shared_goal)
                .get(handlers::shared_goals::list_shared_goals),
        )
        .route(
            "/api/shared-goals/invitations",
            get(handlers::shared_goals::list_invitations),
        )
        .route(
            "/api/shared-goals/invitations/:id/accept",
            post(handlers::shared_goals::accept_invitation),
        )
        .route(
            "/api/shared-goals/invitations/:id/reject",
            post(handlers::shared_goals::reject_invitation),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .merge(protected)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(cors_layer(&state.config))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    match &config.cors_allowed_origins {
        Some(origins) => {
            let list: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(list)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    }
}
