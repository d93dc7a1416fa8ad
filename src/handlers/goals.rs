use crate::db::models::{
    Goal, GoalDetail, GoalWithTransactions, Transaction, TransactionDetail, SharedGoalWithMembers,
    GOAL_KIND_INDIVIDUAL,
};
use crate::db::queries;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::validation::{
    sanitize_string, validate_max_len, validate_required, validate_target_amount,
    validate_transaction_amount, validate_transaction_kind, NOTE_MAX_LEN, TITLE_MAX_LEN,
};
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "crate::money::as_string_opt")]
    pub target_amount: Option<i64>,
    pub target_date: Option<DateTime<Utc>>,
}

struct ValidatedGoalPayload {
    title: String,
    description: Option<String>,
    target_amount: i64,
    target_date: DateTime<Utc>,
}

fn validate_goal_payload(payload: GoalPayload) -> Result<ValidatedGoalPayload, AppError> {
    let title = sanitize_string(payload.title.as_deref().unwrap_or_default());
    validate_required("title", &title)?;
    validate_max_len("title", &title, TITLE_MAX_LEN)?;

    let target_amount = payload
        .target_amount
        .ok_or_else(|| AppError::Validation("targetAmount: is required".to_string()))?;
    validate_target_amount(target_amount)?;

    let target_date = payload
        .target_date
        .ok_or_else(|| AppError::Validation("targetDate: is required".to_string()))?;

    let description = payload
        .description
        .map(|d| sanitize_string(&d))
        .filter(|d| !d.is_empty());

    Ok(ValidatedGoalPayload {
        title,
        description,
        target_amount,
        target_date,
    })
}

/// Groups the joined transaction rows by goal, preserving their order.
fn group_by_goal(transactions: Vec<TransactionDetail>) -> HashMap<Uuid, Vec<TransactionDetail>> {
    let mut grouped: HashMap<Uuid, Vec<TransactionDetail>> = HashMap::new();
    for detail in transactions {
        grouped
            .entry(detail.transaction.goal_id)
            .or_default()
            .push(detail);
    }
    grouped
}

pub async fn create_goal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<GoalPayload>,
) -> Result<impl IntoResponse, AppError> {
    let payload = validate_goal_payload(payload)?;

    let goal = Goal::new(
        payload.title,
        payload.description,
        payload.target_amount,
        payload.target_date,
        GOAL_KIND_INDIVIDUAL,
        auth_user.user_id,
    );
    let goal = queries::create_goal(&state.db, &goal).await?;

    Ok(Json(GoalWithTransactions {
        goal,
        transactions: Vec::new(),
    }))
}

pub async fn list_goals(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let goals = queries::list_goals_by_creator(&state.db, auth_user.user_id).await?;

    let goal_ids: Vec<Uuid> = goals.iter().map(|g| g.id).collect();
    let mut grouped = group_by_goal(queries::transactions_for_goals(&state.db, &goal_ids).await?);

    let response: Vec<GoalWithTransactions> = goals
        .into_iter()
        .map(|goal| {
            let transactions = grouped.remove(&goal.id).unwrap_or_default();
            GoalWithTransactions { goal, transactions }
        })
        .collect();

    Ok(Json(response))
}

pub async fn get_goal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let goal = queries::get_goal(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Goal not found".to_string()))?;

    let transactions = queries::transactions_for_goals(&state.db, &[goal.id]).await?;

    let shared_goal = match queries::shared_goal_for_goal(&state.db, goal.id).await? {
        Some(shared_goal) => {
            let members = queries::members_for_shared_goals(&state.db, &[shared_goal.id]).await?;
            Some(SharedGoalWithMembers {
                shared_goal,
                members,
            })
        }
        None => None,
    };

    Ok(Json(GoalDetail {
        goal,
        transactions,
        shared_goal,
    }))
}

pub async fn update_goal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<GoalPayload>,
) -> Result<impl IntoResponse, AppError> {
    let payload = validate_goal_payload(payload)?;

    let goal = queries::get_goal(&state.db, id).await?;
    match goal {
        Some(goal) if goal.created_by == auth_user.user_id => {}
        _ => {
            return Err(AppError::Forbidden(
                "Not authorized to update this goal".to_string(),
            ))
        }
    }

    let updated = queries::update_goal(
        &state.db,
        id,
        &payload.title,
        payload.description.as_deref(),
        payload.target_amount,
        payload.target_date,
    )
    .await?;

    let transactions = queries::transactions_for_goals(&state.db, &[updated.id]).await?;

    Ok(Json(GoalWithTransactions {
        goal: updated,
        transactions,
    }))
}

pub async fn delete_goal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let goal = queries::get_goal(&state.db, id).await?;
    match goal {
        Some(goal) if goal.created_by == auth_user.user_id => {}
        _ => {
            return Err(AppError::Forbidden(
                "Not authorized to delete this goal".to_string(),
            ))
        }
    }

    queries::delete_goal(&state.db, id).await?;

    Ok(Json(json!({ "message": "Goal deleted successfully" })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPayload {
    #[serde(default, with = "crate::money::as_string_opt")]
    pub amount: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub note: Option<String>,
}

pub async fn add_transaction(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransactionPayload>,
) -> Result<impl IntoResponse, AppError> {
    let amount = payload
        .amount
        .ok_or_else(|| AppError::Validation("amount: is required".to_string()))?;
    validate_transaction_amount(amount)?;

    let kind = payload.kind.unwrap_or_default();
    validate_transaction_kind(&kind)?;

    let note = payload
        .note
        .map(|n| sanitize_string(&n))
        .filter(|n| !n.is_empty());
    if let Some(note) = &note {
        validate_max_len("note", note, NOTE_MAX_LEN)?;
    }

    let goal = queries::get_goal(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Goal not found".to_string()))?;

    // Creator of the goal, or member of its shared wrapper.
    let has_access = goal.created_by == auth_user.user_id
        || queries::is_goal_member(&state.db, goal.id, auth_user.user_id).await?;
    if !has_access {
        return Err(AppError::Forbidden(
            "Not authorized to add transaction".to_string(),
        ));
    }

    let transaction = Transaction::new(goal.id, auth_user.user_id, amount, &kind, note);
    let inserted = queries::add_transaction(&state.db, &transaction).await?;

    Ok(Json(inserted))
}
