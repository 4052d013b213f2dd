//! Authorization predicates
//!
//! The caller arrives already authenticated (id + role). Each operation asks
//! for one [`Capability`]; whether the caller holds it depends on the role and,
//! for order-scoped capabilities, on how the caller relates to the order.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Order, Role};

/// Authenticated caller supplied by the identity layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    /// How this actor relates to `order`
    pub fn party_to(&self, order: &Order) -> Party {
        if self.user_id == order.client_id {
            Party::Client
        } else if self.user_id == order.freelancer_id {
            Party::Freelancer
        } else if self.role == Role::Admin {
            Party::Admin
        } else {
            Party::Outsider
        }
    }
}

/// Relation of an actor to a specific order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Client,
    Freelancer,
    Admin,
    Outsider,
}

impl Party {
    pub fn is_participant(&self) -> bool {
        !matches!(self, Self::Outsider)
    }
}

/// Things an actor may be allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Place an order (and fund its escrow)
    PlaceOrder,
    /// Read an order and its history
    ViewOrder,
    /// PENDING -> ACCEPTED
    AcceptOrder,
    /// ACCEPTED -> IN_PROGRESS
    StartWork,
    /// Release escrow to the freelancer
    CompleteOrder,
    /// Return escrow to the client
    CancelOrder,
    /// Park the order in DISPUTED
    FlagDispute,
}

impl Capability {
    /// Role-level check, for capabilities that are not scoped to an order
    pub fn granted_to_role(&self, role: Role) -> bool {
        match self {
            Self::PlaceOrder => role == Role::Client,
            _ => false,
        }
    }

    /// Order-scoped check
    pub fn granted_to_party(&self, party: Party) -> bool {
        match self {
            Self::PlaceOrder => false,
            Self::AcceptOrder => party == Party::Freelancer,
            Self::CompleteOrder | Self::CancelOrder => party == Party::Client,
            Self::ViewOrder | Self::StartWork | Self::FlagDispute => party.is_participant(),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::PlaceOrder => "Only clients can place orders",
            Self::ViewOrder => "You don't have permission to view this order",
            Self::AcceptOrder => "Only the freelancer can accept the order",
            Self::StartWork => "You don't have permission to update this order",
            Self::CompleteOrder => "Only the client can complete the order",
            Self::CancelOrder => "Only the client can cancel the order",
            Self::FlagDispute => "You don't have permission to dispute this order",
        }
    }
}
