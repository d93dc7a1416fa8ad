use crate::db::models::{
    Goal, GoalInvitation, GoalWithTransactions, InvitationDetail, MemberDetail, SharedGoal,
    SharedGoalMember, SharedGoalOverview, SharedGoalSummary, TransactionDetail, UserProfile,
    GOAL_KIND_SHARED, INVITATION_STATUS_PENDING, MEMBER_ROLE_CREATOR,
};
use crate::db::queries;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::validation::{
    sanitize_string, validate_email, validate_max_len, validate_required, validate_target_amount,
    TITLE_MAX_LEN,
};
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedGoalPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "crate::money::as_string_opt")]
    pub target_amount: Option<i64>,
    pub target_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub invited_emails: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSharedGoalResponse {
    pub goal: Goal,
    pub shared_goal: SharedGoal,
    pub invitations: Vec<GoalInvitation>,
}

pub async fn create_shared_goal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<SharedGoalPayload>,
) -> Result<impl IntoResponse, AppError> {
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

    let mut invited_emails = Vec::with_capacity(payload.invited_emails.len());
    for email in &payload.invited_emails {
        validate_email("invitedEmails", email)?;
        invited_emails.push(sanitize_string(email).to_lowercase());
    }

    let goal = Goal::new(
        title,
        description,
        target_amount,
        target_date,
        GOAL_KIND_SHARED,
        auth_user.user_id,
    );
    let shared_goal = SharedGoal::new(goal.id);
    let creator_member = SharedGoalMember::new(shared_goal.id, auth_user.user_id, MEMBER_ROLE_CREATOR);
    let invitations: Vec<GoalInvitation> = invited_emails
        .into_iter()
        .map(|email| GoalInvitation::new(shared_goal.id, email, auth_user.user_id))
        .collect();

    queries::create_shared_goal(&state.db, &goal, &shared_goal, &creator_member, &invitations)
        .await?;

    tracing::info!(
        goal_id = %goal.id,
        invitation_count = invitations.len(),
        "shared goal created"
    );

    Ok(Json(CreateSharedGoalResponse {
        goal,
        shared_goal,
        invitations,
    }))
}

fn group_transactions(
    transactions: Vec<TransactionDetail>,
) -> HashMap<Uuid, Vec<TransactionDetail>> {
    let mut grouped: HashMap<Uuid, Vec<TransactionDetail>> = HashMap::new();
    for detail in transactions {
        grouped
            .entry(detail.transaction.goal_id)
            .or_default()
            .push(detail);
    }
    grouped
}

fn group_members(members: Vec<MemberDetail>) -> HashMap<Uuid, Vec<MemberDetail>> {
    let mut grouped: HashMap<Uuid, Vec<MemberDetail>> = HashMap::new();
    for detail in members {
        grouped
            .entry(detail.member.shared_goal_id)
            .or_default()
            .push(detail);
    }
    grouped
}

pub async fn list_shared_goals(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let shared_goals = queries::list_shared_goals_for_member(&state.db, auth_user.user_id).await?;

    let shared_goal_ids: Vec<Uuid> = shared_goals.iter().map(|sg| sg.id).collect();
    let goal_ids: Vec<Uuid> = shared_goals.iter().map(|sg| sg.goal_id).collect();

    let mut goals: HashMap<Uuid, Goal> = queries::goals_by_ids(&state.db, &goal_ids)
        .await?
        .into_iter()
        .map(|goal| (goal.id, goal))
        .collect();
    let mut transactions =
        group_transactions(queries::transactions_for_goals(&state.db, &goal_ids).await?);
    let mut members =
        group_members(queries::members_for_shared_goals(&state.db, &shared_goal_ids).await?);

    let response: Vec<SharedGoalOverview> = shared_goals
        .into_iter()
        .filter_map(|shared_goal| {
            let goal = goals.remove(&shared_goal.goal_id)?;
            let transactions = transactions.remove(&goal.id).unwrap_or_default();
            let members = members.remove(&shared_goal.id).unwrap_or_default();
            Some(SharedGoalOverview {
                shared_goal,
                goal: GoalWithTransactions { goal, transactions },
                members,
            })
        })
        .collect();

    Ok(Json(response))
}

pub async fn list_invitations(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    // The invitation is addressed to an email, which may predate the
    // account, so the caller's stored email is the lookup key.
    let user = queries::find_user_by_id(&state.db, auth_user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let invitations = queries::pending_invitations_for_email(&state.db, &user.email).await?;

    let response = assemble_invitation_details(&state, invitations).await?;
    Ok(Json(response))
}

async fn assemble_invitation_details(
    state: &AppState,
    invitations: Vec<GoalInvitation>,
) -> Result<Vec<InvitationDetail>, AppError> {
    let shared_goal_ids: Vec<Uuid> = invitations.iter().map(|inv| inv.shared_goal_id).collect();
    let inviter_ids: Vec<Uuid> = invitations.iter().map(|inv| inv.invited_by_user_id).collect();

    let shared_goals: HashMap<Uuid, SharedGoal> =
        queries::shared_goals_by_ids(&state.db, &shared_goal_ids)
            .await?
            .into_iter()
            .map(|sg| (sg.id, sg))
            .collect();

    let goal_ids: Vec<Uuid> = shared_goals.values().map(|sg| sg.goal_id).collect();
    let goals: HashMap<Uuid, Goal> = queries::goals_by_ids(&state.db, &goal_ids)
        .await?
        .into_iter()
        .map(|goal| (goal.id, goal))
        .collect();

    let members =
        group_members(queries::members_for_shared_goals(&state.db, &shared_goal_ids).await?);

    let inviters: HashMap<Uuid, UserProfile> =
        queries::user_profiles_by_ids(&state.db, &inviter_ids)
            .await?
            .into_iter()
            .map(|profile| (profile.id, profile))
            .collect();

    // Several invitations may point at the same shared goal, so lookups
    // clone rather than consume the maps.
    Ok(invitations
        .into_iter()
        .filter_map(|invitation| {
            let shared_goal = shared_goals.get(&invitation.shared_goal_id)?.clone();
            let goal = goals.get(&shared_goal.goal_id)?.clone();
            let members = members.get(&shared_goal.id).cloned().unwrap_or_default();
            let invited_by = inviters.get(&invitation.invited_by_user_id)?.clone();
            Some(InvitationDetail {
                invitation,
                shared_goal: SharedGoalSummary {
                    shared_goal,
                    goal,
                    members,
                },
                invited_by,
            })
        })
        .collect())
}

pub async fn accept_invitation(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invitation = queries::get_invitation(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Invitation not found".to_string()))?;

    if invitation.status != INVITATION_STATUS_PENDING {
        return Err(AppError::Conflict(
            "Invitation already processed".to_string(),
        ));
    }

    let accepted = queries::accept_invitation(&state.db, id, auth_user.user_id)
        .await?
        // A concurrent accept or reject got there first.
        .ok_or_else(|| AppError::Conflict("Invitation already processed".to_string()))?;

    let mut details = assemble_invitation_details(&state, vec![accepted]).await?;
    let detail = details
        .pop()
        .ok_or_else(|| AppError::Internal("accepted invitation vanished".to_string()))?;

    Ok(Json(detail))
}

pub async fn reject_invitation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invitation = queries::get_invitation(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Invitation not found".to_string()))?;

    if invitation.status != INVITATION_STATUS_PENDING {
        return Err(AppError::Conflict(
            "Invitation already processed".to_string(),
        ));
    }

    let rejected = queries::reject_invitation(&state.db, id)
        .await?
        .ok_or_else(|| AppError::Conflict("Invitation already processed".to_string()))?;

    Ok(Json(rejected))
}
