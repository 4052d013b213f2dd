//! In-process tests for the HTTP surface.
//!
//! Each test builds the router over the in-memory store and drives it with
//! `tower::ServiceExt::oneshot`; no socket is bound.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use common::Marketplace;
use escrow_engine::{
    api::{build_router, AppState, USER_ID_HEADER, USER_ROLE_HEADER},
    authz::Actor,
    config::OrderServiceConfig,
    order_service::OrderLifecycleService,
};
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn router(m: &Marketplace) -> Router {
    let service =
        OrderLifecycleService::new(OrderServiceConfig::default(), Arc::new(m.store.clone()));
    build_router(AppState::new(service))
}

fn request(method: &str, uri: &str, actor: Option<&Actor>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder
            .header(USER_ID_HEADER, actor.user_id.to_string())
            .header(USER_ROLE_HEADER, actor.role.as_str());
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn call(router: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let bytes = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body is not valid JSON")
    };
    (status, json)
}

async fn place(m: &Marketplace, price: &str) -> (StatusCode, Value) {
    call(
        router(m),
        request(
            "POST",
            "/api/orders",
            Some(&m.client),
            Some(json!({
                "project_id": m.project.id,
                "freelancer_id": m.freelancer.user_id,
                "price": price,
            })),
        ),
    )
    .await
}

#[tokio::test]
async fn health_returns_ok() {
    let m = Marketplace::new(dec!(0)).await;
    let (status, body) = call(router(&m), request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn place_order_returns_201_with_order_shape() {
    let m = Marketplace::new(dec!(100.00)).await;
    let (status, body) = place(&m, "40.00").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["price"], "40.00");
    assert_eq!(body["client_id"], m.client.user_id.to_string());
    assert_eq!(body["freelancer_id"], m.freelancer.user_id.to_string());
    assert_eq!(body["project_id"], m.project.id.to_string());
    assert!(body["completed_at"].is_null());
    assert!(body["created_at"].is_string());
    assert_eq!(m.balance(m.client.user_id).await, dec!(60.00));
}

#[tokio::test]
async fn insufficient_funds_maps_to_400() {
    let m = Marketplace::new(dec!(10.00)).await;
    let (status, body) = place(&m, "40.00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_funds");
}

#[tokio::test]
async fn malformed_body_maps_to_400() {
    let m = Marketplace::new(dec!(100.00)).await;
    let (status, body) = call(
        router(&m),
        request(
            "POST",
            "/api/orders",
            Some(&m.client),
            Some(json!({"project_id": "nope"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");
}

#[tokio::test]
async fn missing_identity_is_401() {
    let m = Marketplace::new(dec!(100.00)).await;
    let (status, body) = call(router(&m), request("GET", "/api/orders", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    let req = Request::builder()
        .method("GET")
        .uri("/api/orders")
        .header(USER_ID_HEADER, m.client.user_id.to_string())
        .header(USER_ROLE_HEADER, "SUPERUSER")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(router(&m), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn full_lifecycle_over_http() {
    let m = Marketplace::new(dec!(100.00)).await;
    let (_, body) = place(&m, "40.00").await;
    let id = body["id"].as_str().unwrap().to_string();

    // Client may not accept.
    let (status, body) = call(
        router(&m),
        request(
            "PUT",
            &format!("/api/orders/{id}/status"),
            Some(&m.client),
            Some(json!({"status": "ACCEPTED"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "unauthorized");

    for next in ["ACCEPTED", "IN_PROGRESS"] {
        let (status, body) = call(
            router(&m),
            request(
                "PUT",
                &format!("/api/orders/{id}/status"),
                Some(&m.freelancer),
                Some(json!({"status": next})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], next);
    }

    let (status, body) = call(
        router(&m),
        request(
            "PUT",
            &format!("/api/orders/{id}/complete"),
            Some(&m.client),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMPLETED");
    assert!(body["completed_at"].is_string());
    assert_eq!(m.balance(m.freelancer.user_id).await, dec!(40.00));

    let (status, body) = call(
        router(&m),
        request("DELETE", &format!("/api/orders/{id}"), Some(&m.client), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_transition");

    let (status, body) = call(
        router(&m),
        request(
            "GET",
            &format!("/api/orders/{id}/events"),
            Some(&m.freelancer),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        kinds,
        [
            "order.placed",
            "order.status_changed",
            "order.status_changed",
            "order.completed"
        ]
    );
}

#[tokio::test]
async fn cancel_returns_cancelled_order() {
    let m = Marketplace::new(dec!(100.00)).await;
    let (_, body) = place(&m, "40.00").await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        router(&m),
        request("DELETE", &format!("/api/orders/{id}"), Some(&m.client), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");
    assert_eq!(m.balance(m.client.user_id).await, dec!(100.00));
}

#[tokio::test]
async fn reads_respect_visibility() {
    let m = Marketplace::new(dec!(100.00)).await;
    let (_, body) = place(&m, "40.00").await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        router(&m),
        request("GET", "/api/orders", Some(&m.freelancer), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let stranger = Actor::new(uuid::Uuid::new_v4(), escrow_engine::models::Role::Client);
    let (status, _) = call(
        router(&m),
        request("GET", &format!("/api/orders/{id}"), Some(&stranger), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        router(&m),
        request(
            "GET",
            &format!("/api/orders/{}", uuid::Uuid::new_v4()),
            Some(&m.admin),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        router(&m),
        request("GET", "/api/orders/not-a-uuid", Some(&m.admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");
}
