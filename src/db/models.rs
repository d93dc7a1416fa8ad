use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const GOAL_KIND_INDIVIDUAL: &str = "INDIVIDUAL";
pub const GOAL_KIND_SHARED: &str = "SHARED";

pub const TRANSACTION_KIND_INCOME: &str = "INCOME";
pub const TRANSACTION_KIND_WITHDRAWAL: &str = "WITHDRAWAL";

pub const INVITATION_STATUS_PENDING: &str = "PENDING";
pub const INVITATION_STATUS_ACCEPTED: &str = "ACCEPTED";
pub const INVITATION_STATUS_REJECTED: &str = "REJECTED";

pub const MEMBER_ROLE_CREATOR: &str = "creator";
pub const MEMBER_ROLE_MEMBER: &str = "member";

pub const INVITATION_TTL_DAYS: i64 = 7;

/// Full user row. Never serialized directly; responses use [`UserProfile`]
/// or [`CurrentUser`] so the password hash stays server-side.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, name: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            email,
            name,
            password_hash,
            created_at: Utc::now(),
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(with = "crate::money::as_string")]
    pub target_amount: i64,
    #[serde(with = "crate::money::as_string")]
    pub current_amount: i64,
    pub target_date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    pub fn new(
        title: String,
        description: Option<String>,
        target_amount: i64,
        target_date: DateTime<Utc>,
        kind: &str,
        created_by: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            target_amount,
            current_amount: 0,
            target_date,
            kind: kind.to_string(),
            created_by,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub user_id: Uuid,
    #[serde(with = "crate::money::as_string")]
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(goal_id: Uuid, user_id: Uuid, amount: i64, kind: &str, note: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            goal_id,
            user_id,
            amount,
            kind: kind.to_string(),
            note,
            created_at: Utc::now(),
        }
    }

    /// Contribution of this transaction to the goal's running balance.
    pub fn signed_amount(&self) -> i64 {
        if self.kind == TRANSACTION_KIND_INCOME {
            self.amount
        } else {
            -self.amount
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedGoal {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl SharedGoal {
    pub fn new(goal_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            goal_id,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedGoalMember {
    pub id: Uuid,
    pub shared_goal_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

impl SharedGoalMember {
    pub fn new(shared_goal_id: Uuid, user_id: Uuid, role: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            shared_goal_id,
            user_id,
            role: role.to_string(),
            joined_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalInvitation {
    pub id: Uuid,
    pub shared_goal_id: Uuid,
    pub invited_email: String,
    pub invited_by_user_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl GoalInvitation {
    pub fn new(shared_goal_id: Uuid, invited_email: String, invited_by_user_id: Uuid) -> Self {
        let created_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            shared_goal_id,
            invited_email,
            invited_by_user_id,
            status: INVITATION_STATUS_PENDING.to_string(),
            created_at,
            expires_at: created_at + Duration::days(INVITATION_TTL_DAYS),
            accepted_at: None,
        }
    }
}

// --- Composite response shapes, matching the original API payloads ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalRef {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetail {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub goal_ref: GoalRef,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalWithTransactions {
    #[serde(flatten)]
    pub goal: Goal,
    pub transactions: Vec<TransactionDetail>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalDetail {
    #[serde(flatten)]
    pub goal: Goal,
    pub transactions: Vec<TransactionDetail>,
    pub shared_goal: Option<SharedGoalWithMembers>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDetail {
    #[serde(flatten)]
    pub member: SharedGoalMember,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedGoalWithMembers {
    #[serde(flatten)]
    pub shared_goal: SharedGoal,
    pub members: Vec<MemberDetail>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedGoalOverview {
    #[serde(flatten)]
    pub shared_goal: SharedGoal,
    pub goal: GoalWithTransactions,
    pub members: Vec<MemberDetail>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedGoalSummary {
    #[serde(flatten)]
    pub shared_goal: SharedGoal,
    pub goal: Goal,
    pub members: Vec<MemberDetail>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationDetail {
    #[serde(flatten)]
    pub invitation: GoalInvitation,
    pub shared_goal: SharedGoalSummary,
    pub invited_by: UserProfile,
}
