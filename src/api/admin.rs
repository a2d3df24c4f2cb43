//! Back-office API. Every route requires the admin token.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;

use crate::api::{AdminAuth, ApiResponse};
use crate::error::Result;
use crate::types::{
    AccountView, Dashboard, Deposit, DepositStatus, DepositTransitionRequest, SetBalanceRequest,
    SetStatusRequest, Trade, Withdrawal, WithdrawalStatus, WithdrawalTransitionRequest,
};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", axum::routing::delete(delete_user))
        .route("/users/:id/balance", patch(set_balance))
        .route("/users/:id/status", patch(set_status))
        .route("/deposits", get(list_deposits))
        .route("/deposits/:id", patch(transition_deposit))
        .route("/withdrawals", get(list_withdrawals))
        .route("/withdrawals/:id", patch(transition_withdrawal))
        .route("/trades", get(list_trades))
        .route("/dashboard", get(dashboard))
}

#[derive(Debug, Deserialize)]
pub struct DepositFilter {
    pub status: Option<DepositStatus>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalFilter {
    pub status: Option<WithdrawalStatus>,
}

// ===== Users =====

async fn list_users(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> Result<Json<ApiResponse<Vec<AccountView>>>> {
    Ok(Json(ApiResponse::new(state.admin.list_users()?)))
}

/// PATCH /api/admin/users/:id/balance
async fn set_balance(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(id): Path<String>,
    Json(request): Json<SetBalanceRequest>,
) -> Result<Json<ApiResponse<AccountView>>> {
    let view = state.ledger.set_balance(&id, request.balance)?;
    Ok(Json(ApiResponse::new(view)))
}

/// PATCH /api/admin/users/:id/status
async fn set_status(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(id): Path<String>,
    Json(request): Json<SetStatusRequest>,
) -> Result<Json<ApiResponse<AccountView>>> {
    let view = state.admin.set_status(&id, request.status)?;
    Ok(Json(ApiResponse::new(view)))
}

async fn delete_user(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.admin.delete_user(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ===== Review Queues =====

/// GET /api/admin/deposits?status=pending
async fn list_deposits(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Query(filter): Query<DepositFilter>,
) -> Result<Json<ApiResponse<Vec<Deposit>>>> {
    Ok(Json(ApiResponse::new(state.deposits.list(filter.status)?)))
}

/// PATCH /api/admin/deposits/:id
async fn transition_deposit(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(id): Path<String>,
    Json(request): Json<DepositTransitionRequest>,
) -> Result<Json<ApiResponse<Deposit>>> {
    let deposit = state.deposits.transition(&id, request.status)?;
    Ok(Json(ApiResponse::new(deposit)))
}

/// GET /api/admin/withdrawals?status=pending
async fn list_withdrawals(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Query(filter): Query<WithdrawalFilter>,
) -> Result<Json<ApiResponse<Vec<Withdrawal>>>> {
    Ok(Json(ApiResponse::new(state.withdrawals.list(filter.status)?)))
}

/// PATCH /api/admin/withdrawals/:id
async fn transition_withdrawal(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(id): Path<String>,
    Json(request): Json<WithdrawalTransitionRequest>,
) -> Result<Json<ApiResponse<Withdrawal>>> {
    let withdrawal = state.withdrawals.transition(&id, request.status)?;
    Ok(Json(ApiResponse::new(withdrawal)))
}

// ===== Trades & Dashboard =====

async fn list_trades(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> Result<Json<ApiResponse<Vec<Trade>>>> {
    Ok(Json(ApiResponse::new(state.settlement.list_all()?)))
}

async fn dashboard(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> Result<Json<ApiResponse<Dashboard>>> {
    Ok(Json(ApiResponse::new(state.admin.dashboard()?)))
}
