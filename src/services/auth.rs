/**
 * Authentication Service
 *
 * Email/password accounts with bcrypt hashes and bearer sessions.
 *
 * Storage:
 * - SQLite: Accounts (via SqliteStore)
 * - DashMap: Sessions (in-memory, TTL-bounded)
 *
 * The back office authenticates with a single configured admin token.
 */

use crate::error::AppError;
use crate::services::sqlite_store::{self, SqliteStore};
use crate::types::{Account, AuthResponse, LoginRequest, RegisterRequest, Session};
use axum::http::StatusCode;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const MIN_PASSWORD_LEN: usize = 6;

/// Authentication service for accounts and sessions.
#[derive(Clone)]
pub struct AuthService {
    /// Active sessions (session_token -> Session)
    sessions: Arc<DashMap<String, Session>>,
    store: Arc<SqliteStore>,
    admin_token: Arc<str>,
    session_ttl: Duration,
    hash_cost: u32,
}

impl AuthService {
    pub fn new(store: Arc<SqliteStore>, admin_token: String, session_ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            store,
            admin_token: admin_token.into(),
            session_ttl,
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Override the bcrypt cost (tests use the minimum).
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Create an account and open a session for it.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, AuthError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AuthError::Validation("name is required".to_string()));
        }
        let email = request.email.trim().to_lowercase();
        if !looks_like_email(&email) {
            return Err(AuthError::Validation(format!("invalid email: {}", email)));
        }
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let password = request.password.clone();
        let cost = self.hash_cost;
        let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?
            .map_err(|e| AuthError::Hashing(e.to_string()))?;

        let account = Account::new(name.to_string(), email, password_hash);
        self.store
            .transaction(|conn| sqlite_store::insert_account(conn, &account))?;
        info!("Registered account {} <{}>", account.id, account.email);

        Ok(self.open_session(&account))
    }

    /// Verify credentials and open a session.
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AuthError> {
        let account = self
            .store
            .read(|conn| sqlite_store::find_account_by_email(conn, &request.email))?
            .ok_or(AuthError::InvalidCredentials)?;

        let password = request.password.clone();
        let hash = account.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?
            .unwrap_or(false);

        if !valid {
            warn!("Failed login for {}", account.email);
            return Err(AuthError::InvalidCredentials);
        }
        if !account.is_active() {
            warn!("Login refused for inactive account {}", account.id);
            return Err(AuthError::AccountInactive);
        }

        info!("Login: {}", account.email);
        Ok(self.open_session(&account))
    }

    fn open_session(&self, account: &Account) -> AuthResponse {
        let ttl_ms = i64::try_from(self.session_ttl.as_millis()).unwrap_or(i64::MAX);
        let session = Session::new(account.id.clone(), ttl_ms);
        self.sessions.insert(session.token.clone(), session.clone());
        debug!("Opened session for {}", account.id);

        AuthResponse {
            session_token: session.token,
            expires_at: session.expires_at,
            user: account.view(),
        }
    }

    /// Resolve a bearer token to its session and current account.
    pub fn validate_session(&self, token: &str) -> Result<(Session, Account), AuthError> {
        let session = self
            .sessions
            .get(token)
            .map(|s| s.clone())
            .ok_or(AuthError::SessionNotFound)?;

        if session.is_expired() {
            self.sessions.remove(token);
            return Err(AuthError::SessionNotFound);
        }

        let Some(account) = self
            .store
            .read(|conn| sqlite_store::get_account(conn, &session.user_id))?
        else {
            self.sessions.remove(token);
            return Err(AuthError::SessionNotFound);
        };

        if !account.is_active() {
            return Err(AuthError::AccountInactive);
        }
        Ok((session, account))
    }

    pub fn logout(&self, token: &str) {
        if self.sessions.remove(token).is_some() {
            debug!("Session closed");
        }
    }

    /// Drop every session belonging to `user_id`. Returns how many were removed.
    pub fn revoke_user_sessions(&self, user_id: &str) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.user_id != user_id);
        before.saturating_sub(self.sessions.len())
    }

    /// Drop expired sessions. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired());
        before.saturating_sub(self.sessions.len())
    }

    /// `true` if `token` is the configured admin token.
    pub fn is_admin(&self, token: &str) -> bool {
        let expected = self.admin_token.as_bytes();
        let given = token.as_bytes();
        expected.len() == given.len()
            && expected
                .iter()
                .zip(given)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

fn looks_like_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        _ => false,
    }
}

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Admin access required")]
    Forbidden,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("{0}")]
    Validation(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::EmailTaken => "EMAIL_TAKEN",
            AuthError::SessionNotFound => "SESSION_NOT_FOUND",
            AuthError::Unauthorized => "UNAUTHORIZED",
            AuthError::Forbidden => "FORBIDDEN",
            AuthError::AccountInactive => "ACCOUNT_INACTIVE",
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::Hashing(_) => "INTERNAL_ERROR",
            AuthError::Database(_) => "DATABASE_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::SessionNotFound
            | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden | AuthError::AccountInactive => StatusCode::FORBIDDEN,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Hashing(_) | AuthError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AppError> for AuthError {
    fn from(e: AppError) -> Self {
        match e {
            AppError::Conflict(_) => AuthError::EmailTaken,
            AppError::Validation(msg) => AuthError::Validation(msg),
            other => AuthError::Database(other.to_string()),
        }
    }
}

impl axum::response::IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        (self.status(), axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccountStatus;

    fn create_test_service() -> AuthService {
        let store = Arc::new(SqliteStore::new_in_memory().unwrap());
        AuthService::new(store, "admin-secret".to_string(), Duration::from_secs(3600))
            .with_hash_cost(4)
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Erin".to_string(),
            email: email.to_string(),
            password: "hunter22".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_login_round_trip() {
        let service = create_test_service();
        let registered = service
            .register(&register_request("Erin@Example.com"))
            .await
            .unwrap();
        assert_eq!(registered.user.email, "erin@example.com");

        let login = service
            .login(&LoginRequest {
                email: "erin@example.com".to_string(),
                password: "hunter22".to_string(),
            })
            .await
            .unwrap();
        let (session, account) = service.validate_session(&login.session_token).unwrap();
        assert_eq!(session.user_id, registered.user.id);
        assert_eq!(account.name, "Erin");

        service.logout(&login.session_token);
        assert!(matches!(
            service.validate_session(&login.session_token),
            Err(AuthError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let service = create_test_service();
        service.register(&register_request("dup@example.com")).await.unwrap();

        let err = service
            .register(&register_request("DUP@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let service = create_test_service();

        let mut short = register_request("a@example.com");
        short.password = "12345".to_string();
        assert!(matches!(service.register(&short).await, Err(AuthError::Validation(_))));

        let bad_email = register_request("not-an-email");
        assert!(matches!(service.register(&bad_email).await, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let service = create_test_service();
        service.register(&register_request("f@example.com")).await.unwrap();

        let result = service
            .login(&LoginRequest {
                email: "f@example.com".to_string(),
                password: "wrong-password".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_inactive_account_cannot_log_in() {
        let service = create_test_service();
        let registered = service.register(&register_request("g@example.com")).await.unwrap();
        service
            .store
            .transaction(|c| {
                sqlite_store::write_account_status(c, &registered.user.id, AccountStatus::Inactive)
            })
            .unwrap();

        assert!(matches!(
            service.validate_session(&registered.session_token),
            Err(AuthError::AccountInactive)
        ));
        let result = service
            .login(&LoginRequest {
                email: "g@example.com".to_string(),
                password: "hunter22".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AuthError::AccountInactive)));
    }

    #[test]
    fn test_admin_token() {
        let service = create_test_service();
        assert!(service.is_admin("admin-secret"));
        assert!(!service.is_admin("admin-secreT"));
        assert!(!service.is_admin(""));
    }

    #[test]
    fn test_invalid_session() {
        let service = create_test_service();
        assert!(matches!(
            service.validate_session("nonexistent"),
            Err(AuthError::SessionNotFound)
        ));
    }
}
