//! Axum router and HTTP handlers
//!
//! `build_router` is the single entry point. Middleware layers (tracing,
//! CORS) are attached in `main.rs` so tests can drive the bare router.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::debug;
use uuid::Uuid;

use super::{
    dto::{HealthResponse, OrderEventResponse, OrderResponse, PlaceOrderBody, UpdateStatusBody},
    AppState, ApiError, Caller,
};

type ApiResult<T> = Result<T, ApiError>;

/// Build the application router wired to the given state
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/orders", get(list_orders).post(place_order))
        .route("/api/orders/:id", get(get_order).delete(cancel_order))
        .route("/api/orders/:id/events", get(order_history))
        .route("/api/orders/:id/status", put(update_status))
        .route("/api/orders/:id/complete", put(complete_order))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// ---------------------------------------------------------------------------
// /api/orders
// ---------------------------------------------------------------------------

pub(crate) async fn place_order(
    State(st): State<AppState>,
    Caller(caller): Caller,
    body: Result<Json<PlaceOrderBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<OrderResponse>)> {
    let Json(body) = body?;
    let order = st.orders.place_order(&caller, body.into()).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

pub(crate) async fn list_orders(
    State(st): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Json<Vec<OrderResponse>>> {
    let orders = st.orders.list_orders(&caller).await?;
    debug!("Listing {} orders for {}", orders.len(), caller.user_id);
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

pub(crate) async fn get_order(
    State(st): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<OrderResponse>> {
    let Path(id) = id?;
    Ok(Json(st.orders.get_order(&caller, id).await?.into()))
}

pub(crate) async fn order_history(
    State(st): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Vec<OrderEventResponse>>> {
    let Path(id) = id?;
    let events = st.orders.order_history(&caller, id).await?;
    Ok(Json(
        events.into_iter().map(OrderEventResponse::from).collect(),
    ))
}

// ---------------------------------------------------------------------------
// Lifecycle transitions
// ---------------------------------------------------------------------------

pub(crate) async fn update_status(
    State(st): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateStatusBody>, JsonRejection>,
) -> ApiResult<Json<OrderResponse>> {
    let Path(id) = id?;
    let Json(body) = body?;
    let order = st.orders.update_status(&caller, id, body.status).await?;
    Ok(Json(order.into()))
}

pub(crate) async fn complete_order(
    State(st): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<OrderResponse>> {
    let Path(id) = id?;
    Ok(Json(st.orders.complete(&caller, id).await?.into()))
}

pub(crate) async fn cancel_order(
    State(st): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<OrderResponse>> {
    let Path(id) = id?;
    Ok(Json(st.orders.cancel(&caller, id).await?.into()))
}
