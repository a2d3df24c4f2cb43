//! Deposit Types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Deposit review status. `Confirmed` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Pending => "pending",
            DepositStatus::Confirmed => "confirmed",
            DepositStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DepositStatus::Pending)
    }
}

impl std::fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DepositStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DepositStatus::Pending),
            "confirmed" => Ok(DepositStatus::Confirmed),
            "rejected" => Ok(DepositStatus::Rejected),
            other => Err(format!("unknown deposit status: {}", other)),
        }
    }
}

/// A deposit request awaiting (or past) operator review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deposit {
    pub id: String,
    pub user_id: String,
    /// Owner's display name; `None` once the owning account is deleted.
    pub user_name: Option<String>,
    pub amount: Decimal,
    /// Free-text payment method or coin label.
    pub method: String,
    pub status: DepositStatus,
    pub created_at: i64,
    pub reviewed_at: Option<i64>,
}

impl Deposit {
    pub fn new(user_id: String, amount: Decimal, method: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            user_name: None,
            amount,
            method,
            status: DepositStatus::Pending,
            created_at: chrono::Utc::now().timestamp_millis(),
            reviewed_at: None,
        }
    }
}

/// Body of `POST /api/deposits`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDepositRequest {
    pub amount: Decimal,
    pub method: String,
}

/// Body of `PATCH /api/admin/deposits/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositTransitionRequest {
    pub status: DepositStatus,
}
