//! Request and response bodies

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    models::{Order, OrderEvent, OrderEventKind, OrderStatus},
    order_service::PlaceOrderRequest,
};

#[derive(Debug, Deserialize)]
pub struct PlaceOrderBody {
    pub project_id: Uuid,
    pub freelancer_id: Uuid,
    pub price: Decimal,
}

impl From<PlaceOrderBody> for PlaceOrderRequest {
    fn from(body: PlaceOrderBody) -> Self {
        Self {
            project_id: body.project_id,
            freelancer_id: body.freelancer_id,
            price: body.price,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub client_id: Uuid,
    pub freelancer_id: Uuid,
    /// Serialized as a string with two decimal places
    pub price: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            project_id: order.project_id,
            client_id: order.client_id,
            freelancer_id: order.freelancer_id,
            price: order.price,
            status: order.status,
            created_at: order.created_at,
            updated_at: order.updated_at,
            completed_at: order.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderEventResponse {
    pub id: Uuid,
    pub kind: OrderEventKind,
    pub actor_id: Uuid,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl From<OrderEvent> for OrderEventResponse {
    fn from(event: OrderEvent) -> Self {
        Self {
            id: event.id,
            kind: event.kind,
            actor_id: event.actor_id,
            from_status: event.from_status,
            to_status: event.to_status,
            amount: event.amount,
            created_at: event.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}
