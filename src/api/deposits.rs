//! Deposit requests for the signed-in user.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};

use crate::api::{ApiResponse, Authenticated};
use crate::error::Result;
use crate::types::{CreateDepositRequest, Deposit};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_deposits).post(create_deposit))
}

/// GET /api/deposits
async fn list_deposits(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<Deposit>>>> {
    let deposits = state.deposits.list_for_user(auth.user_id())?;
    Ok(Json(ApiResponse::new(deposits)))
}

/// POST /api/deposits
async fn create_deposit(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(request): Json<CreateDepositRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Deposit>>)> {
    let deposit = state
        .deposits
        .create(auth.user_id(), request.amount, &request.method)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(deposit))))
}
