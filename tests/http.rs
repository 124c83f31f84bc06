//! `POST /submit-ticket` and `GET /health` through the axum router.

mod common;

use std::sync::atomic::Ordering;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{preload, prior_login_ticket, Harness};
use ticket_responder::server::router;

fn submit(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/submit-ticket")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn login_json() -> Value {
    json!({
        "subject": "Login fails",
        "body": "Cannot log in after reset",
        "priority": "high",
        "product_names": ["Auth"],
        "email": "u@x.com"
    })
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_submit_ticket_success() {
    let h = Harness::new();
    preload(&h.index, &prior_login_ticket()).await;
    let app = router(h.pipeline());

    let response = app.oneshot(submit(login_json())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["message"], "Ticket processed successfully");
    let text = body["response"].as_str().unwrap();
    assert!(text.contains("Login fails"));

    let sent = h.notifier.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "u@x.com");
    assert_eq!(sent[0].1, "Support Ticket Response");
    assert_eq!(sent[0].2, text);
}

#[tokio::test]
async fn test_embedding_failure_is_500_with_detail() {
    let h = Harness::new();
    h.embedder.fail_always();
    let app = router(h.pipeline());

    let response = app.oneshot(submit(login_json())).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json(response).await;
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("Embedding error:"));
    assert!(detail.contains("embedding service unavailable"));
    assert_eq!(h.log.count("upsert:"), 0);
    assert_eq!(h.log.count("query:"), 0);
    assert_eq!(h.log.count("respond:"), 0);
    assert_eq!(h.log.count("notify:"), 0);
}

#[tokio::test]
async fn test_every_stage_failure_is_500() {
    for stage in ["upsert", "query", "respond", "notify"] {
        let h = Harness::new();
        match stage {
            "upsert" => h.index.fail_upsert.store(true, Ordering::SeqCst),
            "query" => h.index.fail_query.store(true, Ordering::SeqCst),
            "respond" => h.responder.fail.store(true, Ordering::SeqCst),
            _ => h.notifier.fail.store(true, Ordering::SeqCst),
        }
        let app = router(h.pipeline());

        let response = app.oneshot(submit(login_json())).await.unwrap();

        assert_eq!(
            response.status(),
            StatusCode::INTERNAL_SERVER_ERROR,
            "stage {}",
            stage
        );
        let body = read_json(response).await;
        assert!(body["detail"].is_string(), "stage {}", stage);
        assert!(body.get("response").is_none(), "stage {}", stage);
    }
}

#[tokio::test]
async fn test_missing_field_rejected_before_pipeline() {
    let h = Harness::new();
    let app = router(h.pipeline());

    let response = app
        .oneshot(submit(json!({ "subject": "x", "body": "y" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json(response).await;
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("priority"), "detail: {}", detail);
    assert!(h.log.entries().is_empty());
}

#[tokio::test]
async fn test_malformed_json_gets_json_detail() {
    let h = Harness::new();
    let app = router(h.pipeline());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/submit-ticket")
                .header("content-type", "application/json")
                .body(Body::from("{\"subject\": "))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert!(body["detail"].is_string());
    assert!(h.log.entries().is_empty());
}

#[tokio::test]
async fn test_wrong_content_type_gets_json_detail() {
    let h = Harness::new();
    let app = router(h.pipeline());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/submit-ticket")
                .header("content-type", "text/plain")
                .body(Body::from(login_json().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body = read_json(response).await;
    assert!(body["detail"].is_string());
    assert!(h.log.entries().is_empty());
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new();
    let app = router(h.pipeline());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
