//! PostgreSQL store
//!
//! Row locks are `SELECT ... FOR NO KEY UPDATE` inside a database transaction,
//! so they cover concurrent requests across every process sharing the
//! database. Only non-key columns are ever updated, and the weaker lock does
//! not conflict with the KEY SHARE locks that foreign-key inserts into
//! `orders` and `order_events` take on `users`.
//! Money columns are `NUMERIC(19,2)`; enums are stored as text.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::DatabaseConfig,
    error::EscrowError,
    models::{parse_column, Order, OrderEvent, Project, User},
    store::{EscrowStore, OrderFilter, StoreTx},
    EscrowResult,
};

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Map a driver error onto the escrow taxonomy; lost races become `Conflict`
pub fn map_db_err(err: sqlx::Error) -> EscrowError {
    let code = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned());

    match code.as_deref() {
        Some(code) if is_lost_race(code) => EscrowError::conflict(err.to_string()),
        _ => EscrowError::Database(err),
    }
}

fn is_lost_race(sqlstate: &str) -> bool {
    matches!(
        sqlstate,
        SERIALIZATION_FAILURE | DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE
    )
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    role: String,
    balance: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = EscrowError;

    fn try_from(row: UserRow) -> EscrowResult<Self> {
        Ok(Self {
            id: row.id,
            username: row.username,
            role: parse_column(&row.role)?,
            balance: row.balance,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ProjectRow {
    id: Uuid,
    client_id: Uuid,
    title: String,
    budget: Option<Decimal>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProjectRow> for Project {
    type Error = EscrowError;

    fn try_from(row: ProjectRow) -> EscrowResult<Self> {
        Ok(Self {
            id: row.id,
            client_id: row.client_id,
            title: row.title,
            budget: row.budget,
            status: parse_column(&row.status)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    project_id: Uuid,
    client_id: Uuid,
    freelancer_id: Uuid,
    price: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for Order {
    type Error = EscrowError;

    fn try_from(row: OrderRow) -> EscrowResult<Self> {
        Ok(Self {
            id: row.id,
            project_id: row.project_id,
            client_id: row.client_id,
            freelancer_id: row.freelancer_id,
            price: row.price,
            status: parse_column(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct EventRow {
    id: Uuid,
    order_id: Uuid,
    kind: String,
    actor_id: Uuid,
    from_status: Option<String>,
    to_status: String,
    amount: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for OrderEvent {
    type Error = EscrowError;

    fn try_from(row: EventRow) -> EscrowResult<Self> {
        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            kind: parse_column(&row.kind)?,
            actor_id: row.actor_id,
            from_status: row.from_status.as_deref().map(parse_column).transpose()?,
            to_status: parse_column(&row.to_status)?,
            amount: row.amount,
            created_at: row.created_at,
        })
    }
}

const USER_COLUMNS: &str = "id, username, role, balance, created_at, updated_at";
const ORDER_COLUMNS: &str =
    "id, project_id, client_id, freelancer_id, price, status, created_at, updated_at, completed_at";

/// Store backed by a Postgres connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect using the database section of the configuration
    pub async fn connect(config: &DatabaseConfig) -> EscrowResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;

        info!(
            "Connected to Postgres (max_connections: {})",
            config.max_connections
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run embedded migrations
    pub async fn migrate(&self) -> EscrowResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| EscrowError::internal(format!("Migration failed: {err}")))?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Insert a user row (account provisioning lives outside the lifecycle engine)
    pub async fn insert_user(&self, user: &User) -> EscrowResult<()> {
        sqlx::query(
            "INSERT INTO users (id, username, role, balance, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(user.role.as_str())
        .bind(user.balance)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    /// Insert a project row
    pub async fn insert_project(&self, project: &Project) -> EscrowResult<()> {
        sqlx::query(
            "INSERT INTO projects (id, client_id, title, budget, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(project.id)
        .bind(project.client_id)
        .bind(&project.title)
        .bind(project.budget)
        .bind(project.status.as_str())
        .bind(project.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }
}

#[async_trait]
impl EscrowStore for PgStore {
    async fn begin(&self) -> EscrowResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await.map_err(map_db_err)?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn find_user(&self, id: Uuid) -> EscrowResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?
            .map(User::try_from)
            .transpose()
    }

    async fn find_order(&self, id: Uuid) -> EscrowResult<Option<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?
            .map(Order::try_from)
            .transpose()
    }

    async fn list_orders(&self, filter: OrderFilter) -> EscrowResult<Vec<Order>> {
        let (predicate, party) = match filter {
            OrderFilter::All => ("", None),
            OrderFilter::ByClient(id) => ("WHERE client_id = $1", Some(id)),
            OrderFilter::ByFreelancer(id) => ("WHERE freelancer_id = $1", Some(id)),
        };
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders {predicate} ORDER BY created_at DESC");

        let mut query = sqlx::query_as::<_, OrderRow>(&sql);
        if let Some(id) = party {
            query = query.bind(id);
        }

        query
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?
            .into_iter()
            .map(Order::try_from)
            .collect()
    }

    async fn order_events(&self, order_id: Uuid) -> EscrowResult<Vec<OrderEvent>> {
        sqlx::query_as::<_, EventRow>(
            "SELECT id, order_id, kind, actor_id, from_status, to_status, amount, created_at
             FROM order_events WHERE order_id = $1 ORDER BY seq",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?
        .into_iter()
        .map(OrderEvent::try_from)
        .collect()
    }
}

/// Unit of work over one Postgres transaction; rolled back on drop
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_user(&mut self, id: Uuid) -> EscrowResult<Option<User>> {
        debug!("Locking user row: {}", id);
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR NO KEY UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)?
        .map(User::try_from)
        .transpose()
    }

    async fn find_user(&mut self, id: Uuid) -> EscrowResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_db_err)?
            .map(User::try_from)
            .transpose()
    }

    async fn find_project(&mut self, id: Uuid) -> EscrowResult<Option<Project>> {
        sqlx::query_as::<_, ProjectRow>(
            "SELECT id, client_id, title, budget, status, created_at FROM projects WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)?
        .map(Project::try_from)
        .transpose()
    }

    async fn lock_order(&mut self, id: Uuid) -> EscrowResult<Option<Order>> {
        debug!("Locking order row: {}", id);
        sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR NO KEY UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_err)?
        .map(Order::try_from)
        .transpose()
    }

    async fn update_balance(&mut self, user_id: Uuid, balance: Decimal) -> EscrowResult<()> {
        let result = sqlx::query("UPDATE users SET balance = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(balance)
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(EscrowError::not_found(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> EscrowResult<()> {
        sqlx::query(
            "INSERT INTO orders
                (id, project_id, client_id, freelancer_id, price, status, created_at, updated_at, completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(order.id)
        .bind(order.project_id)
        .bind(order.client_id)
        .bind(order.freelancer_id)
        .bind(order.price)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.completed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> EscrowResult<()> {
        // Price and parties are immutable after creation; only lifecycle columns change.
        let result = sqlx::query(
            "UPDATE orders SET status = $2, updated_at = $3, completed_at = $4 WHERE id = $1",
        )
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(order.updated_at)
        .bind(order.completed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(EscrowError::not_found(format!("Order {} not found", order.id)));
        }
        Ok(())
    }

    async fn append_event(&mut self, event: &OrderEvent) -> EscrowResult<()> {
        sqlx::query(
            "INSERT INTO order_events
                (id, order_id, kind, actor_id, from_status, to_status, amount, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(event.id)
        .bind(event.order_id)
        .bind(event.kind.as_str())
        .bind(event.actor_id)
        .bind(event.from_status.map(|s| s.as_str()))
        .bind(event.to_status.as_str())
        .bind(event.amount)
        .bind(event.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> EscrowResult<()> {
        self.tx.commit().await.map_err(map_db_err)
    }
}
