//! Wallet ledger
//!
//! Balances move only through [`WalletLedger::debit`] and
//! [`WalletLedger::credit`], and only inside a [`StoreTx`]. Both lock the
//! wallet row before reading it, so the balance check and the write see the
//! same value. A transfer is a debit and a credit issued in one unit.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{error::EscrowError, models::User, store::StoreTx, EscrowResult};

/// Currency precision: two decimal places
pub const CURRENCY_SCALE: u32 = 2;

/// Strictly positive money amount with at most two decimal places
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> EscrowResult<Self> {
        if value <= Decimal::ZERO {
            return Err(EscrowError::validation(format!(
                "Amount must be greater than 0, got {}",
                value
            )));
        }
        if value.round_dp(CURRENCY_SCALE) != value {
            return Err(EscrowError::validation(format!(
                "Amount {} has more than {} decimal places",
                value, CURRENCY_SCALE
            )));
        }
        let mut value = value;
        value.rescale(CURRENCY_SCALE);
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = EscrowError;

    fn try_from(value: Decimal) -> EscrowResult<Self> {
        Self::new(value)
    }
}

pub struct WalletLedger;

impl WalletLedger {
    /// Decrease `user_id`'s balance by `amount`, failing with `InsufficientFunds`
    /// when the balance does not cover it. Returns the updated user.
    pub async fn debit(tx: &mut dyn StoreTx, user_id: Uuid, amount: Amount) -> EscrowResult<User> {
        let mut user = Self::lock_wallet(tx, user_id).await?;

        if user.balance < amount.value() {
            warn!(
                "Debit of {} rejected for user {}: balance {}",
                amount, user_id, user.balance
            );
            return Err(EscrowError::insufficient_funds(amount.value(), user.balance));
        }

        user.balance -= amount.value();
        tx.update_balance(user_id, user.balance).await?;
        debug!("Debited {} from user {} (balance: {})", amount, user_id, user.balance);
        Ok(user)
    }

    /// Increase `user_id`'s balance by `amount`. Returns the updated user.
    pub async fn credit(tx: &mut dyn StoreTx, user_id: Uuid, amount: Amount) -> EscrowResult<User> {
        let mut user = Self::lock_wallet(tx, user_id).await?;

        user.balance += amount.value();
        tx.update_balance(user_id, user.balance).await?;
        debug!("Credited {} to user {} (balance: {})", amount, user_id, user.balance);
        Ok(user)
    }

    async fn lock_wallet(tx: &mut dyn StoreTx, user_id: Uuid) -> EscrowResult<User> {
        tx.lock_user(user_id)
            .await?
            .ok_or_else(|| EscrowError::not_found(format!("User {} not found", user_id)))
    }
}
