//! Withdrawal Workflow
//!
//! `pending -> approved | rejected`. The balance is checked when the request
//! is filed and again at approval; the debit and the status change commit
//! together.

use crate::config::WithdrawalLimits;
use crate::error::{AppError, Result};
use crate::services::ledger;
use crate::services::sqlite_store::{self, SqliteStore};
use crate::types::{Withdrawal, WithdrawalStatus};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct WithdrawalWorkflow {
    store: Arc<SqliteStore>,
    limits: WithdrawalLimits,
}

impl WithdrawalWorkflow {
    pub fn new(store: Arc<SqliteStore>, limits: WithdrawalLimits) -> Self {
        Self { store, limits }
    }

    fn validate_amount(&self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "withdrawal amount must be positive".to_string(),
            ));
        }
        if amount < self.limits.min {
            return Err(AppError::Validation(format!(
                "minimum withdrawal is {}",
                self.limits.min
            )));
        }
        if amount > self.limits.max {
            return Err(AppError::Validation(format!(
                "maximum withdrawal is {}",
                self.limits.max
            )));
        }
        Ok(())
    }

    /// File a pending withdrawal. Does not reserve funds.
    pub fn create(&self, user_id: &str, amount: Decimal, wallet_address: &str) -> Result<Withdrawal> {
        self.validate_amount(amount)?;
        let wallet_address = wallet_address.trim();
        if wallet_address.is_empty() {
            return Err(AppError::Validation("wallet address is required".to_string()));
        }

        let withdrawal = self.store.transaction(|conn| {
            let account = sqlite_store::get_account(conn, user_id)?
                .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;
            if amount > account.balance {
                return Err(AppError::InsufficientFunds {
                    needed: amount,
                    available: account.balance,
                });
            }
            let mut withdrawal =
                Withdrawal::new(user_id.to_string(), amount, wallet_address.to_string());
            sqlite_store::insert_withdrawal(conn, &withdrawal)?;
            withdrawal.user_name = Some(account.name);
            Ok(withdrawal)
        })?;

        info!(
            "Withdrawal {} of {} requested by {}",
            withdrawal.id, amount, user_id
        );
        Ok(withdrawal)
    }

    /// Move a pending withdrawal to a terminal state.
    ///
    /// Approval fails with `InsufficientFunds` and leaves the request pending
    /// if the balance dropped below the amount since it was filed.
    pub fn transition(&self, id: &str, target: WithdrawalStatus) -> Result<Withdrawal> {
        if !target.is_terminal() {
            return Err(AppError::Validation(format!(
                "cannot move a withdrawal to {}",
                target
            )));
        }

        let result = self.store.transaction(|conn| {
            let current = sqlite_store::get_withdrawal(conn, id)?
                .ok_or_else(|| AppError::NotFound(format!("withdrawal {}", id)))?;
            if current.status != WithdrawalStatus::Pending {
                return Err(AppError::InvalidTransition {
                    from: current.status.to_string(),
                    to: target.to_string(),
                });
            }

            if target == WithdrawalStatus::Approved {
                ledger::debit_in(conn, &current.user_id, current.amount)?;
            }
            let changed = sqlite_store::update_withdrawal_status(
                conn,
                id,
                WithdrawalStatus::Pending,
                target,
            )?;
            if changed == 0 {
                return Err(AppError::InvalidTransition {
                    from: current.status.to_string(),
                    to: target.to_string(),
                });
            }

            sqlite_store::get_withdrawal(conn, id)?
                .ok_or_else(|| AppError::NotFound(format!("withdrawal {}", id)))
        });

        match result {
            Ok(withdrawal) => {
                info!("Withdrawal {} -> {}", withdrawal.id, withdrawal.status);
                Ok(withdrawal)
            }
            Err(e @ AppError::InsufficientFunds { .. }) => {
                warn!("Withdrawal {} not approved: {}", id, e);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub fn get(&self, id: &str) -> Result<Withdrawal> {
        self.store
            .read(|conn| sqlite_store::get_withdrawal(conn, id))?
            .ok_or_else(|| AppError::NotFound(format!("withdrawal {}", id)))
    }

    pub fn list(&self, status: Option<WithdrawalStatus>) -> Result<Vec<Withdrawal>> {
        self.store
            .read(|conn| sqlite_store::list_withdrawals(conn, status, None))
    }

    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<Withdrawal>> {
        self.store
            .read(|conn| sqlite_store::list_withdrawals(conn, None, Some(user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Ledger;
    use crate::types::Account;
    use rust_decimal_macros::dec;

    fn create_test_workflow(balance: Decimal) -> (WithdrawalWorkflow, Ledger, String) {
        let store = Arc::new(SqliteStore::new_in_memory().unwrap());
        let mut account = Account::new(
            "Carol".to_string(),
            "carol@example.com".to_string(),
            "hash".to_string(),
        );
        account.balance = balance;
        let id = account.id.clone();
        store
            .transaction(|c| sqlite_store::insert_account(c, &account))
            .unwrap();
        (
            WithdrawalWorkflow::new(store.clone(), WithdrawalLimits::default()),
            Ledger::new(store),
            id,
        )
    }

    #[test]
    fn test_approve_debits_once() {
        let (workflow, ledger, user) = create_test_workflow(dec!(500));
        let request = workflow.create(&user, dec!(200), "0xabc").unwrap();

        workflow.transition(&request.id, WithdrawalStatus::Approved).unwrap();
        assert_eq!(ledger.balance(&user).unwrap(), dec!(300));

        let again = workflow.transition(&request.id, WithdrawalStatus::Approved);
        assert!(matches!(again, Err(AppError::InvalidTransition { .. })));
        assert_eq!(ledger.balance(&user).unwrap(), dec!(300));
    }

    #[test]
    fn test_approval_rechecks_balance() {
        let (workflow, ledger, user) = create_test_workflow(dec!(100));
        let request = workflow.create(&user, dec!(80), "0xabc").unwrap();
        ledger.debit(&user, dec!(50)).unwrap();

        let result = workflow.transition(&request.id, WithdrawalStatus::Approved);
        assert!(matches!(result, Err(AppError::InsufficientFunds { .. })));
        assert_eq!(workflow.get(&request.id).unwrap().status, WithdrawalStatus::Pending);
        assert_eq!(ledger.balance(&user).unwrap(), dec!(50));

        workflow.transition(&request.id, WithdrawalStatus::Rejected).unwrap();
        assert_eq!(ledger.balance(&user).unwrap(), dec!(50));
    }

    #[test]
    fn test_create_limits() {
        let (workflow, _, user) = create_test_workflow(dec!(100));

        assert!(matches!(workflow.create(&user, dec!(5), "0xabc"), Err(AppError::Validation(_))));
        assert!(matches!(
            workflow.create(&user, dec!(2000000), "0xabc"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(workflow.create(&user, dec!(50), ""), Err(AppError::Validation(_))));
        assert!(matches!(
            workflow.create(&user, dec!(150), "0xabc"),
            Err(AppError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_reject_never_touches_balance() {
        let (workflow, ledger, user) = create_test_workflow(dec!(100));
        let request = workflow.create(&user, dec!(20), "0xabc").unwrap();

        let rejected = workflow.transition(&request.id, WithdrawalStatus::Rejected).unwrap();
        assert_eq!(rejected.status, WithdrawalStatus::Rejected);
        assert!(rejected.reviewed_at.is_some());
        assert_eq!(ledger.balance(&user).unwrap(), dec!(100));
    }
}
