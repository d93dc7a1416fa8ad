//! End-to-end flows against a real Postgres. These tests need
//! `DATABASE_URL` and skip themselves when it is not set.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::{migrate::Migrator, PgPool};
use std::path::Path;
use tabungan_bersama::db::models::{
    Goal, GoalInvitation, SharedGoal, SharedGoalMember, User, GOAL_KIND_SHARED,
    MEMBER_ROLE_CREATOR,
};
use tabungan_bersama::db::queries;
use tabungan_bersama::{create_app, AppState};
use tower::ServiceExt;
use uuid::Uuid;

async fn setup_test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("skipping: DATABASE_URL not set");
        return None;
    };

    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test DB");
    let migrator = Migrator::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        .await
        .expect("Failed to load migrations");
    migrator
        .run(&pool)
        .await
        .expect("Failed to run migrations on test DB");

    Some(pool)
}

async fn setup_test_app() -> Option<Router> {
    let pool = setup_test_pool().await?;
    let database_url = std::env::var("DATABASE_URL").expect("checked by setup_test_pool");

    let state = AppState {
        db: pool,
        config: common::test_config(&database_url),
    };
    Some(create_app(state))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Registers a fresh user and returns (token, email).
async fn register_user(app: &Router, name: &str) -> (String, String) {
    let email = format!("{}-{}@example.com", name, Uuid::new_v4());
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": email, "name": name, "password": "rahasia-banget" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register failed: {}", body);
    (body["token"].as_str().unwrap().to_string(), email)
}

#[tokio::test]
async fn register_login_me_round_trip() {
    let Some(app) = setup_test_app().await else { return };

    let (token, email) = register_user(&app, "budi").await;

    // Duplicate email is a conflict
    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": email, "name": "Budi", "password": "rahasia-banget" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Wrong password
    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": "salah" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Correct password
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": "rahasia-banget" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    let (status, body) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], email);
}

#[tokio::test]
async fn goal_ledger_keeps_balance_in_sync_with_transactions() {
    let Some(app) = setup_test_app().await else { return };

    let (token, _) = register_user(&app, "budi").await;

    let (status, goal) = send(
        &app,
        "POST",
        "/api/goals",
        Some(&token),
        Some(json!({
            "title": "Dana liburan",
            "description": "Bali",
            "targetAmount": "1000000",
            "targetDate": "2026-12-31T00:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(goal["type"], "INDIVIDUAL");
    assert_eq!(goal["currentAmount"], "0");
    assert_eq!(goal["transactions"], json!([]));
    let goal_id = goal["id"].as_str().unwrap().to_string();

    // Income of 300.000 (parsed from display format on the client side)
    let (status, tx) = send(
        &app,
        "POST",
        &format!("/api/goals/{}/transactions", goal_id),
        Some(&token),
        Some(json!({ "amount": "300000", "type": "INCOME", "note": "gaji" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tx["amount"], "300000");
    assert_eq!(tx["type"], "INCOME");

    // Withdrawal of 120.000
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/goals/{}/transactions", goal_id),
        Some(&token),
        Some(json!({ "amount": "120000", "type": "WITHDRAWAL" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, fetched) = send(
        &app,
        "GET",
        &format!("/api/goals/{}", goal_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["currentAmount"], "180000");

    // Balance equals the signed sum of the returned transactions
    let signed_sum: i64 = fetched["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| {
            let amount: i64 = t["amount"].as_str().unwrap().parse().unwrap();
            if t["type"] == "INCOME" { amount } else { -amount }
        })
        .sum();
    assert_eq!(signed_sum, 180_000);
    assert_eq!(fetched["sharedGoal"], Value::Null);

    // Update overwrites mutable fields only; a smuggled currentAmount is
    // ignored and the balance survives untouched.
    let (status, updated) = send(
        &app,
        "PUT",
        &format!("/api/goals/{}", goal_id),
        Some(&token),
        Some(json!({
            "title": "Dana liburan keluarga",
            "targetAmount": "2000000",
            "targetDate": "2027-06-30T00:00:00Z",
            "currentAmount": "999999999"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Dana liburan keluarga");
    assert_eq!(updated["targetAmount"], "2000000");
    assert_eq!(updated["currentAmount"], "180000");

    // Goals list is newest-first and carries the transactions
    let (status, goals) = send(&app, "GET", "/api/goals", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let goals = goals.as_array().unwrap();
    assert_eq!(goals.len(), 1);
    assert_eq!(goals[0]["transactions"].as_array().unwrap().len(), 2);

    // Delete cascades; the goal is gone afterwards
    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/api/goals/{}", goal_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Goal deleted successfully");

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/goals/{}", goal_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn strangers_cannot_mutate_someone_elses_goal() {
    let Some(app) = setup_test_app().await else { return };

    let (owner_token, _) = register_user(&app, "owner").await;
    let (stranger_token, _) = register_user(&app, "stranger").await;

    let (_, goal) = send(
        &app,
        "POST",
        "/api/goals",
        Some(&owner_token),
        Some(json!({
            "title": "Dana darurat",
            "targetAmount": "5000000",
            "targetDate": "2026-12-31T00:00:00Z"
        })),
    )
    .await;
    let goal_id = goal["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/goals/{}", goal_id),
        Some(&stranger_token),
        Some(json!({
            "title": "Hijacked",
            "targetAmount": "1",
            "targetDate": "2026-12-31T00:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/goals/{}", goal_id),
        Some(&stranger_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/goals/{}/transactions", goal_id),
        Some(&stranger_token),
        Some(json!({ "amount": "1000", "type": "INCOME" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Posting against a goal that does not exist is a 404, not a 403
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/goals/{}/transactions", Uuid::new_v4()),
        Some(&stranger_token),
        Some(json!({ "amount": "1000", "type": "INCOME" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The creator still succeeds
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/goals/{}/transactions", goal_id),
        Some(&owner_token),
        Some(json!({ "amount": "1000", "type": "INCOME" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn shared_goal_invitation_lifecycle() {
    let Some(app) = setup_test_app().await else { return };

    let (creator_token, _) = register_user(&app, "creator").await;
    let (member_token, member_email) = register_user(&app, "member").await;

    // One invitation for an existing account, one for an email with no
    // account yet.
    let (status, created) = send(
        &app,
        "POST",
        "/api/shared-goals",
        Some(&creator_token),
        Some(json!({
            "title": "Patungan rumah",
            "targetAmount": "150000000",
            "targetDate": "2027-12-31T00:00:00Z",
            "invitedEmails": [member_email, format!("nanti-{}@example.com", Uuid::new_v4())]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create shared goal: {}", created);
    assert_eq!(created["goal"]["type"], "SHARED");
    let invitations = created["invitations"].as_array().unwrap();
    assert_eq!(invitations.len(), 2);
    assert!(invitations.iter().all(|inv| inv["status"] == "PENDING"));
    let shared_goal_goal_id = created["goal"]["id"].as_str().unwrap().to_string();

    // The invitee sees exactly one pending invitation, with the nested
    // shared goal and the inviter profile.
    let (status, pending) = send(
        &app,
        "GET",
        "/api/shared-goals/invitations",
        Some(&member_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let pending = pending.as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["status"], "PENDING");
    assert_eq!(pending[0]["sharedGoal"]["goal"]["title"], "Patungan rumah");
    assert_eq!(pending[0]["sharedGoal"]["members"].as_array().unwrap().len(), 1);
    assert!(pending[0]["invitedBy"]["email"].is_string());
    let invitation_id = pending[0]["id"].as_str().unwrap().to_string();

    // Accept adds the member and returns the enriched invitation
    let (status, accepted) = send(
        &app,
        "POST",
        &format!("/api/shared-goals/invitations/{}/accept", invitation_id),
        Some(&member_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["status"], "ACCEPTED");
    assert!(accepted["acceptedAt"].is_string());
    assert_eq!(accepted["sharedGoal"]["members"].as_array().unwrap().len(), 2);

    // The transition is monotone: a second accept conflicts
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/shared-goals/invitations/{}/accept", invitation_id),
        Some(&member_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // So does rejecting an accepted invitation
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/shared-goals/invitations/{}/reject", invitation_id),
        Some(&member_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Accepting an unknown invitation is a 404
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/shared-goals/invitations/{}/accept", Uuid::new_v4()),
        Some(&member_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The new member sees the shared goal with both members
    let (status, shared_goals) = send(
        &app,
        "GET",
        "/api/shared-goals",
        Some(&member_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let shared_goals = shared_goals.as_array().unwrap();
    assert_eq!(shared_goals.len(), 1);
    assert_eq!(shared_goals[0]["members"].as_array().unwrap().len(), 2);
    assert_eq!(shared_goals[0]["goal"]["title"], "Patungan rumah");

    // Membership grants contribution rights without ownership
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/goals/{}/transactions", shared_goal_goal_id),
        Some(&member_token),
        Some(json!({ "amount": "250000", "type": "INCOME", "note": "iuran pertama" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, goal) = send(
        &app,
        "GET",
        &format!("/api/goals/{}", shared_goal_goal_id),
        Some(&creator_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(goal["currentAmount"], "250000");
    assert_eq!(goal["sharedGoal"]["members"].as_array().unwrap().len(), 2);

    // But members still cannot update or delete the goal record itself
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/goals/{}", shared_goal_goal_id),
        Some(&member_token),
        Some(json!({
            "title": "Direbut",
            "targetAmount": "1",
            "targetDate": "2027-12-31T00:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn repeated_invitations_to_one_shared_goal_are_all_listed() {
    let Some(app) = setup_test_app().await else { return };

    let (creator_token, _) = register_user(&app, "creator").await;
    let (invitee_token, invitee_email) = register_user(&app, "invitee").await;

    // The same email can be invited more than once to one shared goal;
    // every resulting invitation must show up for the invitee.
    let (status, created) = send(
        &app,
        "POST",
        "/api/shared-goals",
        Some(&creator_token),
        Some(json!({
            "title": "Patungan dobel",
            "targetAmount": "10000000",
            "targetDate": "2027-12-31T00:00:00Z",
            "invitedEmails": [invitee_email, invitee_email]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create shared goal: {}", created);
    assert_eq!(created["invitations"].as_array().unwrap().len(), 2);

    let (status, pending) = send(
        &app,
        "GET",
        "/api/shared-goals/invitations",
        Some(&invitee_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let pending = pending.as_array().unwrap();
    assert_eq!(pending.len(), 2);
    for invitation in pending {
        assert_eq!(invitation["status"], "PENDING");
        assert_eq!(invitation["sharedGoal"]["goal"]["title"], "Patungan dobel");
        assert_eq!(
            invitation["sharedGoal"]["members"].as_array().unwrap().len(),
            1
        );
        assert!(invitation["invitedBy"]["email"].is_string());
    }
}

#[tokio::test]
async fn failed_shared_goal_creation_leaves_no_partial_rows() {
    let Some(pool) = setup_test_pool().await else { return };

    let creator = queries::insert_user(
        &pool,
        &User::new(
            format!("creator-{}@example.com", Uuid::new_v4()),
            "Creator".to_string(),
            "not-a-real-hash".to_string(),
        ),
    )
    .await
    .unwrap();

    let goal = Goal::new(
        "Patungan gagal".to_string(),
        None,
        1_000_000,
        Utc::now(),
        GOAL_KIND_SHARED,
        creator.id,
    );
    let shared_goal = SharedGoal::new(goal.id);
    let creator_member = SharedGoalMember::new(shared_goal.id, creator.id, MEMBER_ROLE_CREATOR);

    // The invitation's status violates the table's CHECK constraint, so
    // the last insert of the group fails.
    let mut invitation = GoalInvitation::new(
        shared_goal.id,
        "tamu@example.com".to_string(),
        creator.id,
    );
    invitation.status = "SNAILMAILED".to_string();

    let result =
        queries::create_shared_goal(&pool, &goal, &shared_goal, &creator_member, &[invitation])
            .await;
    assert!(result.is_err());

    // Everything rolled back: no goal, no wrapper, no membership.
    assert!(queries::get_goal(&pool, goal.id).await.unwrap().is_none());
    assert!(queries::shared_goal_for_goal(&pool, goal.id)
        .await
        .unwrap()
        .is_none());
    assert!(queries::members_for_shared_goals(&pool, &[shared_goal.id])
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn rejecting_an_invitation_is_guarded_like_accepting() {
    let Some(app) = setup_test_app().await else { return };

    let (creator_token, _) = register_user(&app, "creator").await;
    let (invitee_token, invitee_email) = register_user(&app, "invitee").await;

    let (_, created) = send(
        &app,
        "POST",
        "/api/shared-goals",
        Some(&creator_token),
        Some(json!({
            "title": "Patungan motor",
            "targetAmount": "30000000",
            "targetDate": "2027-12-31T00:00:00Z",
            "invitedEmails": [invitee_email]
        })),
    )
    .await;
    let invitation_id = created["invitations"][0]["id"].as_str().unwrap().to_string();

    let (status, rejected) = send(
        &app,
        "POST",
        &format!("/api/shared-goals/invitations/{}/reject", invitation_id),
        Some(&invitee_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "REJECTED");

    // Terminal states never transition again
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/shared-goals/invitations/{}/reject", invitation_id),
        Some(&invitee_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/shared-goals/invitations/{}/accept", invitation_id),
        Some(&invitee_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Rejecting an unknown invitation is a 404
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/shared-goals/invitations/{}/reject", Uuid::new_v4()),
        Some(&invitee_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // No membership was created along the way
    let (status, shared_goals) = send(
        &app,
        "GET",
        "/api/shared-goals",
        Some(&invitee_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shared_goals.as_array().unwrap().len(), 0);
}
