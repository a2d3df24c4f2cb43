/**
 * Authentication API
 *
 * 1. POST /api/auth/register - Create an account, returns a session
 * 2. POST /api/auth/login - Exchange email/password for a session
 * 3. GET /api/auth/me - Current account (requires auth)
 * 4. POST /api/auth/logout - Invalidate the current session
 *
 * Sessions are sent back as `Authorization: Bearer <token>`. Back-office
 * routes use the same header with the configured admin token.
 */

use axum::{
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::ApiResponse;
use crate::services::AuthError;
use crate::types::{Account, AccountView, AuthResponse, LoginRequest, RegisterRequest};
use crate::AppState;

/// Create auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(get_me))
        .route("/logout", post(logout))
}

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>), AuthError> {
    let response = state.auth.register(&request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(response))))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AuthError> {
    let response = state.auth.login(&request).await?;
    Ok(Json(ApiResponse::new(response)))
}

/// GET /api/auth/me
async fn get_me(auth: Authenticated) -> Json<ApiResponse<AccountView>> {
    Json(ApiResponse::new(auth.account.view()))
}

/// POST /api/auth/logout
async fn logout(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Json<ApiResponse<LogoutResponse>> {
    state.auth.logout(&auth.token);
    Json(ApiResponse::new(LogoutResponse { success: true }))
}

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    parts
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::Unauthorized)
}

/// Authenticated user extractor.
///
/// Use this in route handlers to require a user session:
/// ```ignore
/// async fn my_handler(auth: Authenticated) -> impl IntoResponse {
///     let balance = auth.account.balance;
///     // ...
/// }
/// ```
pub struct Authenticated {
    pub token: String,
    pub account: Account,
}

impl Authenticated {
    pub fn user_id(&self) -> &str {
        &self.account.id
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let (session, account) = state.auth.validate_session(token)?;

        Ok(Authenticated {
            token: session.token,
            account,
        })
    }
}

/// Back-office extractor: the bearer token must equal the admin token.
pub struct AdminAuth;

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        if !state.auth.is_admin(token) {
            return Err(AuthError::Forbidden);
        }
        Ok(AdminAuth)
    }
}

/// Logout response.
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}
