//! Persistence ports
//!
//! The lifecycle service only talks to storage through [`EscrowStore`] and the
//! atomic unit it hands out, [`StoreTx`]. A unit either commits every staged
//! write or none: dropping it without calling [`StoreTx::commit`] rolls back.
//!
//! Rows read with `lock_*` stay exclusively locked until the unit ends. The
//! locks never block foreign-key checks, so inserts referencing a locked row
//! still proceed. A unit
//! locks at most one order and then at most one user, which keeps concurrent
//! units deadlock-free.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    models::{Order, OrderEvent, Project, User},
    EscrowResult,
};

#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod postgres;

/// Selection for order listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderFilter {
    All,
    ByClient(Uuid),
    ByFreelancer(Uuid),
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        match self {
            Self::All => true,
            Self::ByClient(id) => order.client_id == *id,
            Self::ByFreelancer(id) => order.freelancer_id == *id,
        }
    }
}

/// Entry point to storage
#[async_trait]
pub trait EscrowStore: Send + Sync {
    /// Open an atomic unit of work
    async fn begin(&self) -> EscrowResult<Box<dyn StoreTx>>;

    async fn find_user(&self, id: Uuid) -> EscrowResult<Option<User>>;

    async fn find_order(&self, id: Uuid) -> EscrowResult<Option<Order>>;

    /// Orders matching `filter`, newest first
    async fn list_orders(&self, filter: OrderFilter) -> EscrowResult<Vec<Order>>;

    /// Audit events for an order, oldest first
    async fn order_events(&self, order_id: Uuid) -> EscrowResult<Vec<OrderEvent>>;
}

/// One atomic unit of work
#[async_trait]
pub trait StoreTx: Send {
    /// Read a user and hold its row lock until the unit ends
    async fn lock_user(&mut self, id: Uuid) -> EscrowResult<Option<User>>;

    /// Read a user without locking
    async fn find_user(&mut self, id: Uuid) -> EscrowResult<Option<User>>;

    async fn find_project(&mut self, id: Uuid) -> EscrowResult<Option<Project>>;

    /// Read an order and hold its row lock until the unit ends
    async fn lock_order(&mut self, id: Uuid) -> EscrowResult<Option<Order>>;

    async fn update_balance(&mut self, user_id: Uuid, balance: Decimal) -> EscrowResult<()>;

    async fn insert_order(&mut self, order: &Order) -> EscrowResult<()>;

    async fn update_order(&mut self, order: &Order) -> EscrowResult<()>;

    async fn append_event(&mut self, event: &OrderEvent) -> EscrowResult<()>;

    /// Durably apply every staged write and release all locks
    async fn commit(self: Box<Self>) -> EscrowResult<()>;
}
