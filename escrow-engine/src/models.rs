//! Core data models for the escrow system
//!
//! Users own wallets, clients own projects, and orders tie a client, a
//! freelancer and a project together with a price held in escrow.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::EscrowError, EscrowResult};

/// Marketplace role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Client,
    Freelancer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "CLIENT",
            Self::Freelancer => "FREELANCER",
            Self::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = EscrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CLIENT" => Ok(Self::Client),
            "FREELANCER" => Ok(Self::Freelancer),
            "ADMIN" => Ok(Self::Admin),
            other => Err(EscrowError::validation(format!("Unknown role: {other}"))),
        }
    }
}

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Open,
    Closed,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = EscrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Self::Open),
            "CLOSED" => Ok(Self::Closed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(EscrowError::validation(format!(
                "Unknown project status: {other}"
            ))),
        }
    }
}

/// Order state machine enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Placed and funded by the client, awaiting the freelancer
    Pending,
    /// Freelancer agreed to do the work
    Accepted,
    /// Work under way
    InProgress,
    /// Funds released to the freelancer
    Completed,
    /// Funds returned to the client
    Cancelled,
    /// Placeholder for a dispute workflow; funds stay held
    Disputed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        Self::Pending,
        Self::Accepted,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
        Self::Disputed,
    ];

    /// Check if this is a terminal state (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether the order's price is still held in escrow in this state
    pub fn holds_escrow(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Disputed => "DISPUTED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = EscrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| EscrowError::validation(format!("Unknown order status: {s}")))
    }
}

/// Wallet owner. `balance` only changes through the wallet ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with an opening balance
    pub fn new(username: impl Into<String>, role: Role, balance: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            role,
            balance,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Client-owned project. `budget` is advisory and never checked against order prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub client_id: Uuid,
    pub title: String,
    pub budget: Option<Decimal>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Create a new open project
    pub fn new(client_id: Uuid, title: impl Into<String>, budget: Option<Decimal>) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            title: title.into(),
            budget,
            status: ProjectStatus::Open,
            created_at: Utc::now(),
        }
    }
}

/// Order model: a client hiring a freelancer on a project at a fixed price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub project_id: Uuid,
    pub client_id: Uuid,
    pub freelancer_id: Uuid,
    pub price: Decimal,
    pub status: OrderStatus,

    // Timestamps
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Create a new pending order
    pub fn new(project_id: Uuid, client_id: Uuid, freelancer_id: Uuid, price: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            client_id,
            freelancer_id,
            price,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Move to `status`, stamping `updated_at` and, on completion, `completed_at`
    pub fn apply_status(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        self.status = status;
        self.updated_at = at;
        if status == OrderStatus::Completed && self.completed_at.is_none() {
            self.completed_at = Some(at);
        }
    }
}

/// Kind of audit event recorded against an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEventKind {
    #[serde(rename = "order.placed")]
    Placed,
    #[serde(rename = "order.status_changed")]
    StatusChanged,
    #[serde(rename = "order.completed")]
    Completed,
    #[serde(rename = "order.cancelled")]
    Cancelled,
}

impl OrderEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Placed => "order.placed",
            Self::StatusChanged => "order.status_changed",
            Self::Completed => "order.completed",
            Self::Cancelled => "order.cancelled",
        }
    }
}

impl FromStr for OrderEventKind {
    type Err = EscrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order.placed" => Ok(Self::Placed),
            "order.status_changed" => Ok(Self::StatusChanged),
            "order.completed" => Ok(Self::Completed),
            "order.cancelled" => Ok(Self::Cancelled),
            other => Err(EscrowError::internal(format!("Unknown event kind: {other}"))),
        }
    }
}

/// Escrow event for audit trail, written in the same atomic unit as the change it records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub id: Uuid,
    pub order_id: Uuid,
    pub kind: OrderEventKind,
    pub actor_id: Uuid,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    /// Amount debited or credited by the change, if any
    pub amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn new(
        order: &Order,
        kind: OrderEventKind,
        actor_id: Uuid,
        from_status: Option<OrderStatus>,
        amount: Option<Decimal>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id: order.id,
            kind,
            actor_id,
            from_status,
            to_status: order.status,
            amount,
            created_at: order.updated_at,
        }
    }
}

/// Parse a stored enum column, surfacing corruption as an internal error
pub(crate) fn parse_column<T: FromStr<Err = EscrowError>>(raw: &str) -> EscrowResult<T> {
    raw.parse()
        .map_err(|err| EscrowError::internal(format!("Corrupt stored value {raw:?}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("DONE".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Disputed.is_terminal());
        assert!(OrderStatus::Disputed.holds_escrow());
        assert!(!OrderStatus::Completed.holds_escrow());
    }

    #[test]
    fn test_completed_at_is_set_once() {
        let mut order = Order::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), dec!(40.00));
        let first = Utc::now();
        order.apply_status(OrderStatus::Completed, first);
        let later = first + chrono::Duration::seconds(5);
        order.apply_status(OrderStatus::Completed, later);

        assert_eq!(order.completed_at, Some(first));
        assert_eq!(order.updated_at, later);
    }

    #[test]
    fn test_role_parsing_is_case_insensitive() {
        assert_eq!("freelancer".parse::<Role>().unwrap(), Role::Freelancer);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&OrderStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }
}
