//! Escrow order lifecycle engine for a freelance marketplace
//!
//! A client places an order on their project and the price moves from their
//! wallet into escrow. The order then walks a fixed state machine until it is
//! either completed (escrow released to the freelancer) or cancelled (escrow
//! returned to the client). This crate implements:
//! - A wallet ledger that never lets a balance go negative
//! - An order state machine with per-party authorization
//! - Atomic lifecycle operations over PostgreSQL row locks
//! - An audit trail of every order change

pub mod api;
pub mod authz;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod order_service;
pub mod state_machine;
pub mod store;
pub mod telemetry;

use error::EscrowError;

/// Result type alias for escrow operations
pub type EscrowResult<T> = Result<T, EscrowError>;
