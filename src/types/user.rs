/**
 * Account Types
 *
 * Registered users and their spendable balance.
 */

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account status.
///
/// Inactive accounts are excluded from the active user count and cannot log in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            other => Err(format!("unknown account status: {}", other)),
        }
    }
}

/// A stored account, including the credential hash.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub name: String,
    /// Lower-cased, unique.
    pub email: String,
    pub password_hash: String,
    pub balance: Decimal,
    pub status: AccountStatus,
    pub created_at: i64,
}

impl Account {
    /// Create a fresh account with zero balance.
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            email: email.to_lowercase(),
            password_hash,
            balance: Decimal::ZERO,
            status: AccountStatus::Active,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Public projection without the credential hash.
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            balance: self.balance,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// Account as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub balance: Decimal,
    pub status: AccountStatus,
    pub created_at: i64,
}

/// Admin request to overwrite a balance.
#[derive(Debug, Clone, Deserialize)]
pub struct SetBalanceRequest {
    pub balance: Decimal,
}

/// Admin request to activate or deactivate an account.
#[derive(Debug, Clone, Deserialize)]
pub struct SetStatusRequest {
    pub status: AccountStatus,
}
