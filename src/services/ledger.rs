//! Account Ledger
//!
//! The only code path that changes an account balance. Workflows that move
//! money (deposit confirmation, withdrawal approval, trade placement and
//! settlement) call [`credit_in`] / [`debit_in`] inside their own store
//! transaction; admin and tests go through [`Ledger`].

use crate::error::{AppError, Result};
use crate::services::sqlite_store::{self, SqliteStore};
use crate::types::AccountView;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

fn require_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

fn current_balance(conn: &Connection, user_id: &str) -> Result<Decimal> {
    sqlite_store::account_balance(conn, user_id)?
        .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))
}

/// Add `amount` to the balance within an open transaction.
pub fn credit_in(conn: &Connection, user_id: &str, amount: Decimal) -> Result<Decimal> {
    require_positive(amount)?;
    let balance = current_balance(conn, user_id)?
        .checked_add(amount)
        .ok_or_else(|| {
            AppError::Validation(format!("crediting {} would overflow the balance", amount))
        })?;
    sqlite_store::write_balance(conn, user_id, balance)?;
    debug!("Credited {} to {} (balance {})", amount, user_id, balance);
    Ok(balance)
}

/// Subtract `amount` within an open transaction. Never goes below zero.
pub fn debit_in(conn: &Connection, user_id: &str, amount: Decimal) -> Result<Decimal> {
    require_positive(amount)?;
    let available = current_balance(conn, user_id)?;
    if amount > available {
        return Err(AppError::InsufficientFunds {
            needed: amount,
            available,
        });
    }
    let balance = available - amount;
    sqlite_store::write_balance(conn, user_id, balance)?;
    debug!("Debited {} from {} (balance {})", amount, user_id, balance);
    Ok(balance)
}

/// Balance authority for user accounts.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<SqliteStore>,
}

impl Ledger {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }

    /// Atomically add `amount`. Returns the new balance.
    pub fn credit(&self, user_id: &str, amount: Decimal) -> Result<Decimal> {
        let balance = self
            .store
            .transaction(|conn| credit_in(conn, user_id, amount))?;
        info!("Ledger credit {} -> {}: balance {}", amount, user_id, balance);
        Ok(balance)
    }

    /// Atomically subtract `amount`, or fail with `InsufficientFunds` and change nothing.
    pub fn debit(&self, user_id: &str, amount: Decimal) -> Result<Decimal> {
        let balance = self
            .store
            .transaction(|conn| debit_in(conn, user_id, amount))?;
        info!("Ledger debit {} <- {}: balance {}", amount, user_id, balance);
        Ok(balance)
    }

    /// Admin funding: overwrite the balance with a non-negative value.
    pub fn set_balance(&self, user_id: &str, balance: Decimal) -> Result<AccountView> {
        if balance < Decimal::ZERO {
            return Err(AppError::Validation(
                "balance cannot be negative".to_string(),
            ));
        }
        let account = self.store.transaction(|conn| {
            current_balance(conn, user_id)?;
            sqlite_store::write_balance(conn, user_id, balance)?;
            sqlite_store::get_account(conn, user_id)?
                .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))
        })?;
        info!("Balance of {} set to {}", user_id, balance);
        Ok(account.view())
    }

    pub fn balance(&self, user_id: &str) -> Result<Decimal> {
        self.store.read(|conn| current_balance(conn, user_id))
    }
}
