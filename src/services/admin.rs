//! Back-office operations on accounts and the dashboard.
//!
//! Deposit and withdrawal review goes through the workflows directly; this
//! service covers what has no workflow of its own.

use crate::error::{AppError, Result};
use crate::services::sqlite_store::{self, SqliteStore};
use crate::services::AuthService;
use crate::types::{
    AccountStatus, AccountView, ActivityEntry, ActivityKind, Dashboard, DashboardStats,
    DepositStatus, WithdrawalStatus,
};
use std::sync::Arc;
use tracing::info;

/// Entries shown in the dashboard activity feed.
pub const RECENT_ACTIVITY_LIMIT: usize = 5;

#[derive(Clone)]
pub struct AdminService {
    store: Arc<SqliteStore>,
    auth: AuthService,
}

impl AdminService {
    pub fn new(store: Arc<SqliteStore>, auth: AuthService) -> Self {
        Self { store, auth }
    }

    pub fn list_users(&self) -> Result<Vec<AccountView>> {
        let accounts = self.store.read(|conn| sqlite_store::list_accounts(conn))?;
        Ok(accounts.iter().map(|a| a.view()).collect())
    }

    /// Activate or deactivate an account. Deactivation ends its sessions.
    pub fn set_status(&self, user_id: &str, status: AccountStatus) -> Result<AccountView> {
        let account = self.store.transaction(|conn| {
            if sqlite_store::write_account_status(conn, user_id, status)? == 0 {
                return Err(AppError::NotFound(format!("user {}", user_id)));
            }
            sqlite_store::get_account(conn, user_id)?
                .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))
        })?;

        if status == AccountStatus::Inactive {
            let revoked = self.auth.revoke_user_sessions(user_id);
            info!("Deactivated {} ({} sessions revoked)", user_id, revoked);
        } else {
            info!("Activated {}", user_id);
        }
        Ok(account.view())
    }

    /// Delete an account. Its deposits, withdrawals and trades stay on
    /// record and list without a user name.
    pub fn delete_user(&self, user_id: &str) -> Result<()> {
        let removed = self
            .store
            .transaction(|conn| sqlite_store::delete_account(conn, user_id))?;
        if removed == 0 {
            return Err(AppError::NotFound(format!("user {}", user_id)));
        }
        self.auth.revoke_user_sessions(user_id);
        info!("Deleted user {}", user_id);
        Ok(())
    }

    pub fn dashboard(&self) -> Result<Dashboard> {
        let stats = self.store.read(|conn| {
            let (total_users, active_users) = sqlite_store::account_counts(conn)?;
            Ok(DashboardStats {
                total_payments: sqlite_store::sum_confirmed_deposits(conn)?,
                total_users,
                active_users,
                pending_deposits: sqlite_store::count_deposits(conn, DepositStatus::Pending)?,
                pending_withdrawals: sqlite_store::count_withdrawals(
                    conn,
                    WithdrawalStatus::Pending,
                )?,
                open_trades: sqlite_store::count_open_trades(conn)?,
            })
        })?;

        Ok(Dashboard {
            stats,
            recent_activity: self.recent_activity(RECENT_ACTIVITY_LIMIT)?,
        })
    }

    /// Deposits and withdrawals merged, newest first.
    pub fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>> {
        let (deposits, withdrawals) = self.store.read(|conn| {
            Ok((
                sqlite_store::list_deposits(conn, None, None)?,
                sqlite_store::list_withdrawals(conn, None, None)?,
            ))
        })?;

        let mut entries: Vec<ActivityEntry> = deposits
            .into_iter()
            .take(limit)
            .map(|d| ActivityEntry {
                kind: ActivityKind::Deposit,
                id: d.id,
                user_id: d.user_id,
                user_name: d.user_name,
                amount: d.amount,
                status: d.status.to_string(),
                created_at: d.created_at,
            })
            .chain(withdrawals.into_iter().take(limit).map(|w| ActivityEntry {
                kind: ActivityKind::Withdrawal,
                id: w.id,
                user_id: w.user_id,
                user_name: w.user_name,
                amount: w.amount,
                status: w.status.to_string(),
                created_at: w.created_at,
            }))
            .collect();

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        Ok(entries)
    }
}
