//! Authentication Types
//!
//! Email/password registration and bearer sessions.

use serde::{Deserialize, Serialize};

use super::AccountView;

/// Registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Login request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response on successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Session token for subsequent requests
    pub session_token: String,
    /// When the session expires (ms)
    pub expires_at: i64,
    pub user: AccountView,
}

/// Session held in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user_id: String,
    /// When session was created (ms)
    pub created_at: i64,
    /// When session expires (ms)
    pub expires_at: i64,
}

impl Session {
    /// Create a new session that lives for `ttl_ms`.
    pub fn new(user_id: String, ttl_ms: i64) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let token = uuid::Uuid::new_v4().to_string();

        Self {
            token,
            user_id,
            created_at: now,
            expires_at: now.saturating_add(ttl_ms),
        }
    }

    /// Check if session has expired.
    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp_millis() > self.expires_at
    }
}
