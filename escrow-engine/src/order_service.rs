//! Order Lifecycle Service - Coordinates order creation and status transitions
//!
//! Each mutating operation runs in one [`StoreTx`]: the order row is locked,
//! the state machine authorizes and validates the move, the wallet ledger
//! applies the matching debit or credit, and the status change plus its audit
//! event are written before a single commit. Any failure drops the unit and
//! leaves every row as it was.

use std::{future::Future, sync::Arc};

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    authz::{Actor, Capability},
    config::OrderServiceConfig,
    error::EscrowError,
    ledger::{Amount, WalletLedger},
    models::{Order, OrderEvent, OrderEventKind, OrderStatus, Role},
    state_machine::{OrderStateMachine, SideEffect},
    store::{EscrowStore, OrderFilter},
    EscrowResult,
};

/// Order placement request
#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub project_id: Uuid,
    pub freelancer_id: Uuid,
    pub price: Decimal,
}

/// Main service that coordinates the order lifecycle
pub struct OrderLifecycleService {
    /// Configuration
    config: OrderServiceConfig,
    /// Persistence port
    store: Arc<dyn EscrowStore>,
}

impl OrderLifecycleService {
    /// Create a new order lifecycle service
    pub fn new(config: OrderServiceConfig, store: Arc<dyn EscrowStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &OrderServiceConfig {
        &self.config
    }

    /// Place an order on the caller's project, moving the price from the
    /// caller's wallet into escrow
    pub async fn place_order(
        &self,
        caller: &Actor,
        request: PlaceOrderRequest,
    ) -> EscrowResult<Order> {
        info!(
            "Placing order on project {} for freelancer {}",
            request.project_id, request.freelancer_id
        );
        self.with_conflict_retry("place_order", || self.try_place_order(caller, &request))
            .await
    }

    /// Move an order to `status` following the transition table.
    ///
    /// A request for COMPLETED takes the same path as [`Self::complete`], so the
    /// freelancer is always paid when an order completes.
    pub async fn update_status(
        &self,
        caller: &Actor,
        order_id: Uuid,
        status: OrderStatus,
    ) -> EscrowResult<Order> {
        info!("Updating order {} to {}", order_id, status);
        self.with_conflict_retry("update_status", || {
            self.try_transition(caller, order_id, status)
        })
        .await
    }

    /// Complete an in-progress order and release the escrow to the freelancer
    pub async fn complete(&self, caller: &Actor, order_id: Uuid) -> EscrowResult<Order> {
        info!("Completing order: {}", order_id);
        self.with_conflict_retry("complete", || {
            self.try_transition(caller, order_id, OrderStatus::Completed)
        })
        .await
    }

    /// Cancel an order and return the escrow to the client
    pub async fn cancel(&self, caller: &Actor, order_id: Uuid) -> EscrowResult<Order> {
        info!("Cancelling order: {}", order_id);
        self.with_conflict_retry("cancel", || {
            self.try_transition(caller, order_id, OrderStatus::Cancelled)
        })
        .await
    }

    /// Get an order visible to the caller
    pub async fn get_order(&self, caller: &Actor, order_id: Uuid) -> EscrowResult<Order> {
        let order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or_else(|| order_not_found(order_id))?;

        if !Capability::ViewOrder.granted_to_party(caller.party_to(&order)) {
            return Err(EscrowError::unauthorized(Capability::ViewOrder.describe()));
        }
        Ok(order)
    }

    /// Orders the caller takes part in; admins see every order
    pub async fn list_orders(&self, caller: &Actor) -> EscrowResult<Vec<Order>> {
        let filter = match caller.role {
            Role::Client => OrderFilter::ByClient(caller.user_id),
            Role::Freelancer => OrderFilter::ByFreelancer(caller.user_id),
            Role::Admin => OrderFilter::All,
        };
        self.store.list_orders(filter).await
    }

    /// Audit trail of an order visible to the caller
    pub async fn order_history(
        &self,
        caller: &Actor,
        order_id: Uuid,
    ) -> EscrowResult<Vec<OrderEvent>> {
        let order = self.get_order(caller, order_id).await?;
        self.store.order_events(order.id).await
    }

    async fn try_place_order(
        &self,
        caller: &Actor,
        request: &PlaceOrderRequest,
    ) -> EscrowResult<Order> {
        if !Capability::PlaceOrder.granted_to_role(caller.role) {
            warn!("User {} ({}) may not place orders", caller.user_id, caller.role);
            return Err(EscrowError::unauthorized(Capability::PlaceOrder.describe()));
        }
        let price = self.validate_price(request.price)?;

        let mut tx = self.store.begin().await?;

        let project = tx
            .find_project(request.project_id)
            .await?
            .ok_or_else(|| {
                EscrowError::not_found(format!("Project {} not found", request.project_id))
            })?;

        if project.client_id != caller.user_id {
            warn!(
                "User {} tried to order on project {} owned by {}",
                caller.user_id, project.id, project.client_id
            );
            return Err(EscrowError::unauthorized(
                "You can only create orders for your own projects",
            ));
        }

        let freelancer = tx
            .find_user(request.freelancer_id)
            .await?
            .ok_or_else(|| {
                EscrowError::not_found(format!("Freelancer {} not found", request.freelancer_id))
            })?;

        if freelancer.role != Role::Freelancer {
            return Err(EscrowError::validation(format!(
                "Selected user {} is not a freelancer",
                freelancer.id
            )));
        }

        WalletLedger::debit(tx.as_mut(), caller.user_id, price).await?;

        let order = Order::new(project.id, caller.user_id, freelancer.id, price.value());
        tx.insert_order(&order).await?;
        tx.append_event(&OrderEvent::new(
            &order,
            OrderEventKind::Placed,
            caller.user_id,
            None,
            Some(price.value()),
        ))
        .await?;
        tx.commit().await?;

        info!("Placed order {} ({} held in escrow)", order.id, price);
        Ok(order)
    }

    async fn try_transition(
        &self,
        caller: &Actor,
        order_id: Uuid,
        target: OrderStatus,
    ) -> EscrowResult<Order> {
        let mut tx = self.store.begin().await?;

        let mut order = tx
            .lock_order(order_id)
            .await?
            .ok_or_else(|| order_not_found(order_id))?;

        let transition =
            OrderStateMachine::authorize_and_validate(caller.party_to(&order), order.status, target)
                .inspect_err(|err| {
                    warn!("Rejected {} -> {} on order {}: {}", order.status, target, order_id, err)
                })?;

        let amount = Amount::new(order.price)?;
        let moved = match transition.effect {
            SideEffect::None => None,
            SideEffect::RefundClient => {
                WalletLedger::credit(tx.as_mut(), order.client_id, amount).await?;
                Some(amount.value())
            }
            SideEffect::PayFreelancer => {
                WalletLedger::credit(tx.as_mut(), order.freelancer_id, amount).await?;
                Some(amount.value())
            }
        };

        order.apply_status(target, Utc::now());
        tx.update_order(&order).await?;

        let kind = match target {
            OrderStatus::Completed => OrderEventKind::Completed,
            OrderStatus::Cancelled => OrderEventKind::Cancelled,
            _ => OrderEventKind::StatusChanged,
        };
        tx.append_event(&OrderEvent::new(
            &order,
            kind,
            caller.user_id,
            Some(transition.from),
            moved,
        ))
        .await?;
        tx.commit().await?;

        info!(
            "Order {}: {} -> {} by {}",
            order.id, transition.from, transition.to, caller.user_id
        );
        Ok(order)
    }

    /// Re-run `attempt` when it loses a race, up to the configured limit
    async fn with_conflict_retry<T, F, Fut>(&self, operation: &str, mut attempt: F) -> EscrowResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EscrowResult<T>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err) if err.is_retryable() && retries < self.config.max_conflict_retries => {
                    retries += 1;
                    warn!(
                        "{} hit a conflict, retrying ({}/{}): {}",
                        operation, retries, self.config.max_conflict_retries, err
                    );
                }
                result => return result,
            }
        }
    }

    /// Validate order price
    fn validate_price(&self, price: Decimal) -> EscrowResult<Amount> {
        let amount = Amount::new(price)?;
        if amount.value() < self.config.min_order_price {
            return Err(EscrowError::validation(format!(
                "Price must be at least {}",
                self.config.min_order_price
            )));
        }
        Ok(amount)
    }
}

fn order_not_found(order_id: Uuid) -> EscrowError {
    EscrowError::not_found(format!("Order {} not found", order_id))
}
