//! HTTP surface
//!
//! Identity is established upstream: the auth gateway forwards the caller's
//! id and role in the `x-user-id` and `x-user-role` headers. Requests that
//! arrive without them are rejected with 401 before any handler runs.

use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::{authz::Actor, models::Role, order_service::OrderLifecycleService};

pub mod dto;
pub mod error;
pub mod routes;

pub use error::ApiError;
pub use routes::build_router;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderLifecycleService>,
}

impl AppState {
    pub fn new(orders: OrderLifecycleService) -> Self {
        Self {
            orders: Arc::new(orders),
        }
    }
}

/// Authenticated caller, read from the gateway headers
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)?
            .parse::<Uuid>()
            .map_err(|_| ApiError::unauthenticated(format!("{USER_ID_HEADER} is not a valid id")))?;
        let role = header(parts, USER_ROLE_HEADER)?
            .parse::<Role>()
            .map_err(|_| ApiError::unauthenticated(format!("{USER_ROLE_HEADER} is not a known role")))?;

        Ok(Caller(Actor::new(user_id, role)))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| ApiError::unauthenticated(format!("missing {name} header")))?
        .to_str()
        .map(str::trim)
        .map_err(|_| ApiError::unauthenticated(format!("{name} is not valid text")))
}
