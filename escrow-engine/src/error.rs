//! Error types for the escrow system
//!
//! Every failure is scoped to a single operation: the atomic unit that
//! produced it is rolled back, so no entity is left half-updated.

use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for escrow operations
#[derive(Error, Debug)]
pub enum EscrowError {
    /// Referenced project, user or order does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller's role or relation to the order does not permit the operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// State machine rejected the move
    #[error("Invalid state transition: {from_state} -> {to_state}: {reason}")]
    InvalidTransition {
        from_state: String,
        to_state: String,
        reason: String,
    },

    /// Wallet balance does not cover the debit
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    /// Lost a concurrency race; the operation left nothing behind and may be retried
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bad input or a domain rule violated by the request itself
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// General internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EscrowError {
    /// Create a not-found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an authorization error
    pub fn unauthorized<S: Into<String>>(msg: S) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Create a state transition error
    pub fn invalid_transition<S: Into<String>>(from_state: S, to_state: S, reason: S) -> Self {
        Self::InvalidTransition {
            from_state: from_state.into(),
            to_state: to_state.into(),
            reason: reason.into(),
        }
    }

    /// Create an insufficient-funds error
    pub fn insufficient_funds(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }

    /// Create a conflict error
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the caller may safely re-run the operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Short machine-readable name, used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::Conflict(_) => "conflict",
            Self::Validation(_) => "validation",
            Self::Config(_) => "config",
            Self::Database(_) => "database",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<config::ConfigError> for EscrowError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
