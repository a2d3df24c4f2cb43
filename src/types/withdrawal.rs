//! Withdrawal Types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Withdrawal review status. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, WithdrawalStatus::Pending)
    }
}

impl std::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WithdrawalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WithdrawalStatus::Pending),
            "approved" => Ok(WithdrawalStatus::Approved),
            "rejected" => Ok(WithdrawalStatus::Rejected),
            other => Err(format!("unknown withdrawal status: {}", other)),
        }
    }
}

/// A withdrawal request awaiting (or past) operator review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    pub id: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub amount: Decimal,
    pub wallet_address: String,
    pub status: WithdrawalStatus,
    pub created_at: i64,
    pub reviewed_at: Option<i64>,
}

impl Withdrawal {
    pub fn new(user_id: String, amount: Decimal, wallet_address: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            user_name: None,
            amount,
            wallet_address,
            status: WithdrawalStatus::Pending,
            created_at: chrono::Utc::now().timestamp_millis(),
            reviewed_at: None,
        }
    }
}

/// Body of `POST /api/withdrawals`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWithdrawalRequest {
    pub amount: Decimal,
    pub wallet_address: String,
}

/// Body of `PATCH /api/admin/withdrawals/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalTransitionRequest {
    pub status: WithdrawalStatus,
}
