//! Shared fixtures for the scenario tests: a marketplace with one client,
//! one freelancer and one project, backed by the in-memory store.

#![allow(dead_code)]

use std::sync::Arc;

use escrow_engine::{
    authz::Actor,
    config::OrderServiceConfig,
    models::{Project, Role, User},
    order_service::{OrderLifecycleService, PlaceOrderRequest},
    store::{memory::MemoryStore, EscrowStore},
};
use rust_decimal::Decimal;
use uuid::Uuid;

pub struct Marketplace {
    pub store: MemoryStore,
    pub service: Arc<OrderLifecycleService>,
    pub client: Actor,
    pub freelancer: Actor,
    pub admin: Actor,
    pub project: Project,
}

impl Marketplace {
    pub async fn new(client_balance: Decimal) -> Self {
        let store = MemoryStore::new();
        let client = User::new("carol", Role::Client, client_balance);
        let freelancer = User::new("frank", Role::Freelancer, Decimal::ZERO);
        let admin = User::new("ada", Role::Admin, Decimal::ZERO);
        let project = Project::new(client.id, "Mobile app", None);

        store.insert_user(client.clone()).await;
        store.insert_user(freelancer.clone()).await;
        store.insert_user(admin.clone()).await;
        store.insert_project(project.clone()).await;

        let service = Arc::new(OrderLifecycleService::new(
            OrderServiceConfig::default(),
            Arc::new(store.clone()),
        ));

        Self {
            store,
            service,
            client: Actor::new(client.id, Role::Client),
            freelancer: Actor::new(freelancer.id, Role::Freelancer),
            admin: Actor::new(admin.id, Role::Admin),
            project,
        }
    }

    pub fn order_request(&self, price: Decimal) -> PlaceOrderRequest {
        PlaceOrderRequest {
            project_id: self.project.id,
            freelancer_id: self.freelancer.user_id,
            price,
        }
    }

    pub async fn balance(&self, user_id: Uuid) -> Decimal {
        self.store
            .find_user(user_id)
            .await
            .unwrap()
            .expect("user exists")
            .balance
    }

    /// Sum of all wallets plus every price still held in escrow
    pub async fn total_value(&self) -> Decimal {
        let wallets: Decimal = self.store.users().await.iter().map(|u| u.balance).sum();
        let held: Decimal = self
            .store
            .orders()
            .await
            .iter()
            .filter(|o| o.status.holds_escrow())
            .map(|o| o.price)
            .sum();
        wallets + held
    }
}
