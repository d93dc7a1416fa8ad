use crate::db::models::{
    Goal, GoalInvitation, GoalRef, MemberDetail, SharedGoal, SharedGoalMember, Transaction,
    TransactionDetail, User, UserProfile, INVITATION_STATUS_ACCEPTED, INVITATION_STATUS_PENDING,
    INVITATION_STATUS_REJECTED, MEMBER_ROLE_MEMBER,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Result, Transaction as SqlxTransaction};
use uuid::Uuid;

// --- User queries ---

pub async fn insert_user(pool: &PgPool, user: &User) -> Result<User> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, email, name, password_hash, created_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(&user.name)
    .bind(&user.password_hash)
    .bind(user.created_at)
    .fetch_one(pool)
    .await
}

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn user_profiles_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<UserProfile>> {
    sqlx::query_as::<_, UserProfile>("SELECT id, name, email FROM users WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
}

// --- Goal queries ---

async fn insert_goal(
    executor: &mut SqlxTransaction<'_, Postgres>,
    goal: &Goal,
) -> Result<Goal> {
    sqlx::query_as::<_, Goal>(
        r#"
        INSERT INTO goals (
            id, title, description, target_amount, current_amount,
            target_date, kind, created_by, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(goal.id)
    .bind(&goal.title)
    .bind(&goal.description)
    .bind(goal.target_amount)
    .bind(goal.current_amount)
    .bind(goal.target_date)
    .bind(&goal.kind)
    .bind(goal.created_by)
    .bind(goal.created_at)
    .fetch_one(&mut **executor)
    .await
}

pub async fn create_goal(pool: &PgPool, goal: &Goal) -> Result<Goal> {
    let mut transaction = pool.begin().await?;
    let inserted = insert_goal(&mut transaction, goal).await?;
    transaction.commit().await?;
    Ok(inserted)
}

pub async fn get_goal(pool: &PgPool, id: Uuid) -> Result<Option<Goal>> {
    sqlx::query_as::<_, Goal>("SELECT * FROM goals WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_goals_by_creator(pool: &PgPool, user_id: Uuid) -> Result<Vec<Goal>> {
    sqlx::query_as::<_, Goal>(
        "SELECT * FROM goals WHERE created_by = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Overwrites the mutable goal fields. The running balance is owned by
/// transaction posting and is never touched here.
pub async fn update_goal(
    pool: &PgPool,
    id: Uuid,
    title: &str,
    description: Option<&str>,
    target_amount: i64,
    target_date: DateTime<Utc>,
) -> Result<Goal> {
    sqlx::query_as::<_, Goal>(
        r#"
        UPDATE goals
        SET title = $1, description = $2, target_amount = $3, target_date = $4
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(title)
    .bind(description)
    .bind(target_amount)
    .bind(target_date)
    .bind(id)
    .fetch_one(pool)
    .await
}

pub async fn delete_goal(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM goals WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// --- Transaction queries ---

#[derive(Debug, FromRow)]
struct TransactionJoinRow {
    id: Uuid,
    goal_id: Uuid,
    user_id: Uuid,
    amount: i64,
    kind: String,
    note: Option<String>,
    created_at: DateTime<Utc>,
    goal_title: String,
    user_name: String,
    user_email: String,
}

impl From<TransactionJoinRow> for TransactionDetail {
    fn from(row: TransactionJoinRow) -> Self {
        TransactionDetail {
            transaction: Transaction {
                id: row.id,
                goal_id: row.goal_id,
                user_id: row.user_id,
                amount: row.amount,
                kind: row.kind,
                note: row.note,
                created_at: row.created_at,
            },
            goal_ref: GoalRef {
                id: row.goal_id,
                title: row.goal_title,
            },
            user: UserProfile {
                id: row.user_id,
                name: row.user_name,
                email: row.user_email,
            },
        }
    }
}

pub async fn transactions_for_goals(
    pool: &PgPool,
    goal_ids: &[Uuid],
) -> Result<Vec<TransactionDetail>> {
    let rows = sqlx::query_as::<_, TransactionJoinRow>(
        r#"
        SELECT t.id, t.goal_id, t.user_id, t.amount, t.kind, t.note, t.created_at,
               g.title AS goal_title,
               u.name AS user_name, u.email AS user_email
        FROM transactions t
        JOIN goals g ON g.id = t.goal_id
        JOIN users u ON u.id = t.user_id
        WHERE t.goal_id = ANY($1)
        ORDER BY t.created_at DESC
        "#,
    )
    .bind(goal_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(TransactionDetail::from).collect())
}

/// Inserts the transaction and applies its signed amount to the goal's
/// running balance in one database transaction, so concurrent postings
/// against the same goal never lose an update.
pub async fn add_transaction(pool: &PgPool, tx: &Transaction) -> Result<Transaction> {
    let mut transaction = pool.begin().await?;

    let inserted = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (id, goal_id, user_id, amount, kind, note, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(tx.id)
    .bind(tx.goal_id)
    .bind(tx.user_id)
    .bind(tx.amount)
    .bind(&tx.kind)
    .bind(&tx.note)
    .bind(tx.created_at)
    .fetch_one(&mut *transaction)
    .await?;

    sqlx::query("UPDATE goals SET current_amount = current_amount + $1 WHERE id = $2")
        .bind(inserted.signed_amount())
        .bind(tx.goal_id)
        .execute(&mut *transaction)
        .await?;

    transaction.commit().await?;
    Ok(inserted)
}

// --- Shared goal queries ---

pub async fn shared_goal_for_goal(pool: &PgPool, goal_id: Uuid) -> Result<Option<SharedGoal>> {
    sqlx::query_as::<_, SharedGoal>("SELECT * FROM shared_goals WHERE goal_id = $1")
        .bind(goal_id)
        .fetch_optional(pool)
        .await
}

pub async fn shared_goals_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<SharedGoal>> {
    sqlx::query_as::<_, SharedGoal>("SELECT * FROM shared_goals WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
}

pub async fn goals_by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Goal>> {
    sqlx::query_as::<_, Goal>("SELECT * FROM goals WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
}

/// Membership check used to authorize transaction posting on shared goals.
pub async fn is_goal_member(pool: &PgPool, goal_id: Uuid, user_id: Uuid) -> Result<bool> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM shared_goal_members m
            JOIN shared_goals sg ON sg.id = m.shared_goal_id
            WHERE sg.goal_id = $1 AND m.user_id = $2
        )
        "#,
    )
    .bind(goal_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
}

pub async fn list_shared_goals_for_member(pool: &PgPool, user_id: Uuid) -> Result<Vec<SharedGoal>> {
    sqlx::query_as::<_, SharedGoal>(
        r#"
        SELECT sg.id, sg.goal_id, sg.created_at
        FROM shared_goals sg
        JOIN shared_goal_members m ON m.shared_goal_id = sg.id
        WHERE m.user_id = $1
        ORDER BY sg.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

#[derive(Debug, FromRow)]
struct MemberJoinRow {
    id: Uuid,
    shared_goal_id: Uuid,
    user_id: Uuid,
    role: String,
    joined_at: DateTime<Utc>,
    user_name: String,
    user_email: String,
}

impl From<MemberJoinRow> for MemberDetail {
    fn from(row: MemberJoinRow) -> Self {
        MemberDetail {
            member: SharedGoalMember {
                id: row.id,
                shared_goal_id: row.shared_goal_id,
                user_id: row.user_id,
                role: row.role,
                joined_at: row.joined_at,
            },
            user: UserProfile {
                id: row.user_id,
                name: row.user_name,
                email: row.user_email,
            },
        }
    }
}

pub async fn members_for_shared_goals(
    pool: &PgPool,
    shared_goal_ids: &[Uuid],
) -> Result<Vec<MemberDetail>> {
    let rows = sqlx::query_as::<_, MemberJoinRow>(
        r#"
        SELECT m.id, m.shared_goal_id, m.user_id, m.role, m.joined_at,
               u.name AS user_name, u.email AS user_email
        FROM shared_goal_members m
        JOIN users u ON u.id = m.user_id
        WHERE m.shared_goal_id = ANY($1)
        ORDER BY m.joined_at
        "#,
    )
    .bind(shared_goal_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(MemberDetail::from).collect())
}

/// Creates the goal, its shared wrapper, the creator membership, and all
/// invitations in one database transaction. Any failure rolls back the
/// whole group, so no partial shared goal can persist.
pub async fn create_shared_goal(
    pool: &PgPool,
    goal: &Goal,
    shared_goal: &SharedGoal,
    creator_member: &SharedGoalMember,
    invitations: &[GoalInvitation],
) -> Result<()> {
    let mut transaction = pool.begin().await?;

    insert_goal(&mut transaction, goal).await?;

    sqlx::query("INSERT INTO shared_goals (id, goal_id, created_at) VALUES ($1, $2, $3)")
        .bind(shared_goal.id)
        .bind(shared_goal.goal_id)
        .bind(shared_goal.created_at)
        .execute(&mut *transaction)
        .await?;

    insert_member(&mut transaction, creator_member).await?;

    for invitation in invitations {
        sqlx::query(
            r#"
            INSERT INTO goal_invitations (
                id, shared_goal_id, invited_email, invited_by_user_id,
                status, created_at, expires_at, accepted_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(invitation.id)
        .bind(invitation.shared_goal_id)
        .bind(&invitation.invited_email)
        .bind(invitation.invited_by_user_id)
        .bind(&invitation.status)
        .bind(invitation.created_at)
        .bind(invitation.expires_at)
        .bind(invitation.accepted_at)
        .execute(&mut *transaction)
        .await?;
    }

    transaction.commit().await?;
    Ok(())
}

async fn insert_member(
    executor: &mut SqlxTransaction<'_, Postgres>,
    member: &SharedGoalMember,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO shared_goal_members (id, shared_goal_id, user_id, role, joined_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (shared_goal_id, user_id) DO NOTHING
        "#,
    )
    .bind(member.id)
    .bind(member.shared_goal_id)
    .bind(member.user_id)
    .bind(&member.role)
    .bind(member.joined_at)
    .execute(&mut **executor)
    .await?;
    Ok(())
}

// --- Invitation queries ---

pub async fn get_invitation(pool: &PgPool, id: Uuid) -> Result<Option<GoalInvitation>> {
    sqlx::query_as::<_, GoalInvitation>("SELECT * FROM goal_invitations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn pending_invitations_for_email(
    pool: &PgPool,
    email: &str,
) -> Result<Vec<GoalInvitation>> {
    sqlx::query_as::<_, GoalInvitation>(
        r#"
        SELECT * FROM goal_invitations
        WHERE invited_email = $1 AND status = $2
        ORDER BY created_at DESC
        "#,
    )
    .bind(email)
    .bind(INVITATION_STATUS_PENDING)
    .fetch_all(pool)
    .await
}

/// Marks the invitation accepted and adds the caller as a member, both in
/// one database transaction. The `status = PENDING` guard makes the
/// transition monotone: a concurrent accept or reject wins and this call
/// returns `None`.
pub async fn accept_invitation(
    pool: &PgPool,
    invitation_id: Uuid,
    user_id: Uuid,
) -> Result<Option<GoalInvitation>> {
    let mut transaction = pool.begin().await?;

    let updated = sqlx::query_as::<_, GoalInvitation>(
        r#"
        UPDATE goal_invitations
        SET status = $3, accepted_at = NOW()
        WHERE id = $1 AND status = $2
        RETURNING *
        "#,
    )
    .bind(invitation_id)
    .bind(INVITATION_STATUS_PENDING)
    .bind(INVITATION_STATUS_ACCEPTED)
    .fetch_optional(&mut *transaction)
    .await?;

    let Some(invitation) = updated else {
        transaction.rollback().await?;
        return Ok(None);
    };

    let member = SharedGoalMember::new(invitation.shared_goal_id, user_id, MEMBER_ROLE_MEMBER);
    insert_member(&mut transaction, &member).await?;

    transaction.commit().await?;
    Ok(Some(invitation))
}

/// Same monotone guard as accept: only a PENDING invitation can be
/// rejected; `None` means the row was already in a terminal state.
pub async fn reject_invitation(pool: &PgPool, invitation_id: Uuid) -> Result<Option<GoalInvitation>> {
    sqlx::query_as::<_, GoalInvitation>(
        r#"
        UPDATE goal_invitations
        SET status = $3
        WHERE id = $1 AND status = $2
        RETURNING *
        "#,
    )
    .bind(invitation_id)
    .bind(INVITATION_STATUS_PENDING)
    .bind(INVITATION_STATUS_REJECTED)
    .fetch_optional(pool)
    .await
}
