//! Withdrawal requests for the signed-in user.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};

use crate::api::{ApiResponse, Authenticated};
use crate::error::Result;
use crate::types::{CreateWithdrawalRequest, Withdrawal};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_withdrawals).post(create_withdrawal))
}

/// GET /api/withdrawals
async fn list_withdrawals(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<Withdrawal>>>> {
    let withdrawals = state.withdrawals.list_for_user(auth.user_id())?;
    Ok(Json(ApiResponse::new(withdrawals)))
}

/// POST /api/withdrawals
async fn create_withdrawal(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(request): Json<CreateWithdrawalRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Withdrawal>>)> {
    let withdrawal =
        state
            .withdrawals
            .create(auth.user_id(), request.amount, &request.wallet_address)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(withdrawal))))
}
