pub mod admin;
pub mod auth;
pub mod currency_pairs;
pub mod deposits;
pub mod health;
pub mod trades;
pub mod withdrawals;

use crate::AppState;
use axum::Router;
use serde::Serialize;

pub use auth::{AdminAuth, Authenticated};

/// API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/auth", auth::router())
        .nest("/api/currency-pairs", currency_pairs::router())
        .nest("/api/deposits", deposits::router())
        .nest("/api/withdrawals", withdrawals::router())
        .nest("/api/trades", trades::router())
        .nest("/api/admin", admin::router())
}
