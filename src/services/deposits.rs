//! Deposit Workflow
//!
//! `pending -> confirmed | rejected`. Confirmation credits the ledger in the
//! same transaction as the status change, so a deposit is credited at most once.

use crate::config::DepositLimits;
use crate::error::{AppError, Result};
use crate::services::ledger;
use crate::services::sqlite_store::{self, SqliteStore};
use crate::types::{Deposit, DepositStatus};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct DepositWorkflow {
    store: Arc<SqliteStore>,
    limits: DepositLimits,
}

impl DepositWorkflow {
    pub fn new(store: Arc<SqliteStore>, limits: DepositLimits) -> Self {
        Self { store, limits }
    }

    /// File a pending deposit request.
    pub fn create(&self, user_id: &str, amount: Decimal, method: &str) -> Result<Deposit> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation("deposit amount must be positive".to_string()));
        }
        if amount < self.limits.min {
            return Err(AppError::Validation(format!(
                "minimum deposit is {}",
                self.limits.min
            )));
        }
        if amount > self.limits.max {
            return Err(AppError::Validation(format!(
                "maximum deposit is {}",
                self.limits.max
            )));
        }
        let method = method.trim();
        if method.is_empty() {
            return Err(AppError::Validation("payment method is required".to_string()));
        }

        let deposit = self.store.transaction(|conn| {
            let account = sqlite_store::get_account(conn, user_id)?
                .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;
            let mut deposit = Deposit::new(user_id.to_string(), amount, method.to_string());
            sqlite_store::insert_deposit(conn, &deposit)?;
            deposit.user_name = Some(account.name);
            Ok(deposit)
        })?;

        info!("Deposit {} of {} requested by {}", deposit.id, amount, user_id);
        Ok(deposit)
    }

    /// Move a pending deposit to a terminal state.
    pub fn transition(&self, id: &str, target: DepositStatus) -> Result<Deposit> {
        if !target.is_terminal() {
            return Err(AppError::Validation(format!(
                "cannot move a deposit to {}",
                target
            )));
        }

        let deposit = self.store.transaction(|conn| {
            let current = sqlite_store::get_deposit(conn, id)?
                .ok_or_else(|| AppError::NotFound(format!("deposit {}", id)))?;
            if current.status != DepositStatus::Pending {
                return Err(AppError::InvalidTransition {
                    from: current.status.to_string(),
                    to: target.to_string(),
                });
            }

            let changed =
                sqlite_store::update_deposit_status(conn, id, DepositStatus::Pending, target)?;
            if changed == 0 {
                return Err(AppError::InvalidTransition {
                    from: current.status.to_string(),
                    to: target.to_string(),
                });
            }
            if target == DepositStatus::Confirmed {
                ledger::credit_in(conn, &current.user_id, current.amount)?;
            }

            sqlite_store::get_deposit(conn, id)?
                .ok_or_else(|| AppError::NotFound(format!("deposit {}", id)))
        })?;

        info!("Deposit {} -> {}", deposit.id, deposit.status);
        Ok(deposit)
    }

    pub fn get(&self, id: &str) -> Result<Deposit> {
        self.store
            .read(|conn| sqlite_store::get_deposit(conn, id))?
            .ok_or_else(|| AppError::NotFound(format!("deposit {}", id)))
    }

    /// All deposits, newest first, optionally filtered by status.
    pub fn list(&self, status: Option<DepositStatus>) -> Result<Vec<Deposit>> {
        self.store
            .read(|conn| sqlite_store::list_deposits(conn, status, None))
    }

    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<Deposit>> {
        self.store
            .read(|conn| sqlite_store::list_deposits(conn, None, Some(user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Ledger;
    use crate::types::Account;
    use rust_decimal_macros::dec;

    fn create_test_workflow() -> (DepositWorkflow, Ledger, String) {
        let store = Arc::new(SqliteStore::new_in_memory().unwrap());
        let account = Account::new(
            "Bob".to_string(),
            "bob@example.com".to_string(),
            "hash".to_string(),
        );
        let id = account.id.clone();
        store
            .transaction(|c| sqlite_store::insert_account(c, &account))
            .unwrap();
        (
            DepositWorkflow::new(store.clone(), DepositLimits::default()),
            Ledger::new(store),
            id,
        )
    }

    #[test]
    fn test_confirm_credits_once() {
        let (workflow, ledger, user) = create_test_workflow();
        let deposit = workflow.create(&user, dec!(100), "bank transfer").unwrap();
        assert_eq!(deposit.status, DepositStatus::Pending);
        assert_eq!(deposit.user_name.as_deref(), Some("Bob"));

        let confirmed = workflow.transition(&deposit.id, DepositStatus::Confirmed).unwrap();
        assert_eq!(confirmed.status, DepositStatus::Confirmed);
        assert_eq!(ledger.balance(&user).unwrap(), dec!(100));

        let again = workflow.transition(&deposit.id, DepositStatus::Confirmed);
        assert!(matches!(again, Err(AppError::InvalidTransition { .. })));
        assert_eq!(ledger.balance(&user).unwrap(), dec!(100));
    }

    #[test]
    fn test_reject_leaves_balance() {
        let (workflow, ledger, user) = create_test_workflow();
        let deposit = workflow.create(&user, dec!(40), "card").unwrap();

        workflow.transition(&deposit.id, DepositStatus::Rejected).unwrap();
        assert_eq!(ledger.balance(&user).unwrap(), Decimal::ZERO);

        let late = workflow.transition(&deposit.id, DepositStatus::Confirmed);
        assert!(matches!(late, Err(AppError::InvalidTransition { .. })));
    }

    #[test]
    fn test_create_validation() {
        let (workflow, _, user) = create_test_workflow();

        assert!(matches!(workflow.create(&user, dec!(0), "card"), Err(AppError::Validation(_))));
        assert!(matches!(workflow.create(&user, dec!(5), "  "), Err(AppError::Validation(_))));
        assert!(matches!(workflow.create("ghost", dec!(5), "card"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_oversized_deposit_rejected() {
        let (workflow, ledger, user) = create_test_workflow();

        assert!(matches!(
            workflow.create(&user, Decimal::MAX, "card"),
            Err(AppError::Validation(_))
        ));
        assert!(workflow.list(None).unwrap().is_empty());
        assert_eq!(ledger.balance(&user).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_confirm_overflow_leaves_deposit_pending() {
        let (workflow, ledger, user) = create_test_workflow();
        let deposit = workflow.create(&user, dec!(100), "card").unwrap();
        ledger.set_balance(&user, Decimal::MAX).unwrap();

        let result = workflow.transition(&deposit.id, DepositStatus::Confirmed);
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(workflow.get(&deposit.id).unwrap().status, DepositStatus::Pending);
        assert_eq!(ledger.balance(&user).unwrap(), Decimal::MAX);

        ledger.set_balance(&user, dec!(0)).unwrap();
        workflow.transition(&deposit.id, DepositStatus::Confirmed).unwrap();
        assert_eq!(ledger.balance(&user).unwrap(), dec!(100));
    }

    #[test]
    fn test_back_to_pending_rejected() {
        let (workflow, _, user) = create_test_workflow();
        let deposit = workflow.create(&user, dec!(5), "card").unwrap();

        let result = workflow.transition(&deposit.id, DepositStatus::Pending);
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(matches!(
            workflow.transition("missing", DepositStatus::Confirmed),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_listing_filters() {
        let (workflow, _, user) = create_test_workflow();
        let a = workflow.create(&user, dec!(1), "card").unwrap();
        workflow.create(&user, dec!(2), "card").unwrap();
        workflow.transition(&a.id, DepositStatus::Rejected).unwrap();

        assert_eq!(workflow.list(None).unwrap().len(), 2);
        assert_eq!(workflow.list(Some(DepositStatus::Pending)).unwrap().len(), 1);
        assert_eq!(workflow.list_for_user(&user).unwrap().len(), 2);
        assert!(workflow.list_for_user("someone-else").unwrap().is_empty());
    }
}
