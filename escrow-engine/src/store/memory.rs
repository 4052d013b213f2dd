//! In-memory store for tests and local demos
//!
//! Each row id has its own async mutex. A [`MemoryTx`] holds the guards of
//! every row it locked and buffers its writes; `commit` applies the buffer to
//! the shared tables before the guards are released. Dropping the unit
//! discards the buffer.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::EscrowError,
    models::{Order, OrderEvent, Project, User},
    store::{EscrowStore, OrderFilter, StoreTx},
    EscrowResult,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    projects: HashMap<Uuid, Project>,
    orders: HashMap<Uuid, Order>,
    events: Vec<OrderEvent>,
}

/// Shared in-memory tables with per-row locking
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    row_locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user row
    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.insert(user.id, user);
    }

    /// Seed a project row
    pub async fn insert_project(&self, project: Project) {
        self.tables.write().await.projects.insert(project.id, project);
    }

    /// Snapshot of all users
    pub async fn users(&self) -> Vec<User> {
        self.tables.read().await.users.values().cloned().collect()
    }

    /// Snapshot of all orders
    pub async fn orders(&self) -> Vec<Order> {
        self.tables.read().await.orders.values().cloned().collect()
    }

    async fn row_lock(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.row_locks
            .lock()
            .await
            .entry(id)
            .or_default()
            .clone()
    }
}

#[async_trait]
impl EscrowStore for MemoryStore {
    async fn begin(&self) -> EscrowResult<Box<dyn StoreTx>> {
        Ok(Box::new(MemoryTx {
            store: self.clone(),
            held: HashMap::new(),
            users: HashMap::new(),
            orders: HashMap::new(),
            inserted: HashSet::new(),
            events: Vec::new(),
        }))
    }

    async fn find_user(&self, id: Uuid) -> EscrowResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_order(&self, id: Uuid) -> EscrowResult<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self, filter: OrderFilter) -> EscrowResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .tables
            .read()
            .await
            .orders
            .values()
            .filter(|order| filter.matches(order))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn order_events(&self, order_id: Uuid) -> EscrowResult<Vec<OrderEvent>> {
        Ok(self
            .tables
            .read()
            .await
            .events
            .iter()
            .filter(|event| event.order_id == order_id)
            .cloned()
            .collect())
    }
}

/// Unit of work over [`MemoryStore`]
pub struct MemoryTx {
    store: MemoryStore,
    held: HashMap<Uuid, OwnedMutexGuard<()>>,
    users: HashMap<Uuid, User>,
    orders: HashMap<Uuid, Order>,
    inserted: HashSet<Uuid>,
    events: Vec<OrderEvent>,
}

impl MemoryTx {
    async fn acquire(&mut self, id: Uuid) {
        if self.held.contains_key(&id) {
            return;
        }
        let lock = self.store.row_lock(id).await;
        let guard = lock.lock_owned().await;
        debug!("Acquired row lock: {}", id);
        self.held.insert(id, guard);
    }

    fn require_lock(&self, id: Uuid) -> EscrowResult<()> {
        if self.held.contains_key(&id) {
            Ok(())
        } else {
            Err(EscrowError::internal(format!(
                "Write to row {} without holding its lock",
                id
            )))
        }
    }

    async fn current_user(&self, id: Uuid) -> Option<User> {
        match self.users.get(&id) {
            Some(user) => Some(user.clone()),
            None => self.store.tables.read().await.users.get(&id).cloned(),
        }
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_user(&mut self, id: Uuid) -> EscrowResult<Option<User>> {
        self.acquire(id).await;
        Ok(self.current_user(id).await)
    }

    async fn find_user(&mut self, id: Uuid) -> EscrowResult<Option<User>> {
        Ok(self.current_user(id).await)
    }

    async fn find_project(&mut self, id: Uuid) -> EscrowResult<Option<Project>> {
        Ok(self.store.tables.read().await.projects.get(&id).cloned())
    }

    async fn lock_order(&mut self, id: Uuid) -> EscrowResult<Option<Order>> {
        self.acquire(id).await;
        if let Some(order) = self.orders.get(&id) {
            return Ok(Some(order.clone()));
        }
        Ok(self.store.tables.read().await.orders.get(&id).cloned())
    }

    async fn update_balance(&mut self, user_id: Uuid, balance: Decimal) -> EscrowResult<()> {
        self.require_lock(user_id)?;
        let mut user = self
            .current_user(user_id)
            .await
            .ok_or_else(|| EscrowError::not_found(format!("User {} not found", user_id)))?;
        user.balance = balance;
        user.updated_at = Utc::now();
        self.users.insert(user_id, user);
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> EscrowResult<()> {
        if self.store.tables.read().await.orders.contains_key(&order.id) {
            return Err(EscrowError::conflict(format!(
                "Order {} already exists",
                order.id
            )));
        }
        self.inserted.insert(order.id);
        self.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> EscrowResult<()> {
        if !self.inserted.contains(&order.id) {
            self.require_lock(order.id)?;
        }
        self.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn append_event(&mut self, event: &OrderEvent) -> EscrowResult<()> {
        self.events.push(event.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> EscrowResult<()> {
        let MemoryTx {
            store,
            held,
            users,
            orders,
            events,
            ..
        } = *self;

        {
            let mut tables = store.tables.write().await;
            tables.users.extend(users);
            tables.orders.extend(orders);
            tables.events.extend(events);
        }

        debug!("Committed unit, releasing {} row locks", held.len());
        drop(held);
        Ok(())
    }
}
