//! Order state machine
//!
//! `RULES` is the single table of permitted moves. Every caller, including
//! the dedicated complete/cancel operations, goes through
//! [`OrderStateMachine::authorize_and_validate`], which checks the caller's
//! capability for the target status before looking at the current status.
//!
//! DISPUTED has no resolution workflow. The price stays in escrow while an
//! order sits there, and the only way out is the client cancelling, which
//! refunds them.

use crate::{
    authz::{Capability, Party},
    error::EscrowError,
    models::OrderStatus,
    EscrowResult,
};

/// Wallet movement that must accompany a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    None,
    /// Credit the price back to the client
    RefundClient,
    /// Credit the price to the freelancer
    PayFreelancer,
}

/// A validated move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub effect: SideEffect,
}

struct Rule {
    from: OrderStatus,
    to: OrderStatus,
    effect: SideEffect,
}

const fn rule(from: OrderStatus, to: OrderStatus, effect: SideEffect) -> Rule {
    Rule { from, to, effect }
}

use OrderStatus::{Accepted, Cancelled, Completed, Disputed, InProgress, Pending};

const RULES: &[Rule] = &[
    rule(Pending, Accepted, SideEffect::None),
    rule(Pending, Cancelled, SideEffect::RefundClient),
    rule(Accepted, InProgress, SideEffect::None),
    rule(Accepted, Cancelled, SideEffect::RefundClient),
    rule(InProgress, Cancelled, SideEffect::RefundClient),
    rule(InProgress, Completed, SideEffect::PayFreelancer),
    rule(Pending, Disputed, SideEffect::None),
    rule(Accepted, Disputed, SideEffect::None),
    rule(InProgress, Disputed, SideEffect::None),
    rule(Disputed, Cancelled, SideEffect::RefundClient),
];

pub struct OrderStateMachine;

impl OrderStateMachine {
    /// Capability needed to move an order into `to`
    pub fn required_capability(to: OrderStatus) -> Capability {
        match to {
            Accepted => Capability::AcceptOrder,
            InProgress => Capability::StartWork,
            Completed => Capability::CompleteOrder,
            Cancelled => Capability::CancelOrder,
            Disputed => Capability::FlagDispute,
            // Nothing moves back to PENDING; any participant gets the state error.
            Pending => Capability::ViewOrder,
        }
    }

    /// Authorize `party` for the move and then validate it against the table
    pub fn authorize_and_validate(
        party: Party,
        from: OrderStatus,
        to: OrderStatus,
    ) -> EscrowResult<Transition> {
        let capability = Self::required_capability(to);
        if !capability.granted_to_party(party) {
            return Err(EscrowError::unauthorized(capability.describe()));
        }
        Self::validate(from, to)
    }

    /// Table lookup only, no authorization
    pub fn validate(from: OrderStatus, to: OrderStatus) -> EscrowResult<Transition> {
        if from.is_terminal() {
            return Err(EscrowError::invalid_transition(
                from.as_str(),
                to.as_str(),
                "order is in a terminal state",
            ));
        }

        RULES
            .iter()
            .find(|r| r.from == from && r.to == to)
            .map(|r| Transition {
                from,
                to,
                effect: r.effect,
            })
            .ok_or_else(|| {
                EscrowError::invalid_transition(from.as_str(), to.as_str(), "transition not allowed")
            })
    }

    /// Statuses reachable from `from` in one step
    pub fn successors(from: OrderStatus) -> Vec<OrderStatus> {
        RULES
            .iter()
            .filter(|r| r.from == from)
            .map(|r| r.to)
            .collect()
    }
}
