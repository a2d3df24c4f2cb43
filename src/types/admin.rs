//! Back-office Types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregate figures for the operator dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Sum of confirmed deposits
    pub total_payments: Decimal,
    pub total_users: u64,
    pub active_users: u64,
    pub pending_deposits: u64,
    pub pending_withdrawals: u64,
    pub open_trades: u64,
}

/// Kind of a recent activity row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Deposit,
    Withdrawal,
}

/// One deposit or withdrawal in the recent activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub id: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub amount: Decimal,
    /// Status as its lower-case label
    pub status: String,
    pub created_at: i64,
}

/// Dashboard payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub recent_activity: Vec<ActivityEntry>,
}
