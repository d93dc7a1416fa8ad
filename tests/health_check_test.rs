mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tabungan_bersama::create_app;
use tower::ServiceExt;

#[tokio::test]
async fn health_reports_unavailable_when_store_is_down() {
    let app = create_app(common::offline_state());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "unavailable");
    assert!(body["timestamp"].is_string());
}
