//! Trading panel API.
//!
//! Placing a trade returns the open trade at once; poll `GET /api/trades/:id`
//! for the settled result. There is no cancel route.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::{ApiResponse, Authenticated};
use crate::error::Result;
use crate::types::{PlaceTradeRequest, Trade};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_trades).post(place_trade))
        .route("/:id", get(get_trade))
}

/// GET /api/trades
async fn list_trades(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<Trade>>>> {
    let trades = state.settlement.list_for_user(auth.user_id())?;
    Ok(Json(ApiResponse::new(trades)))
}

/// POST /api/trades
async fn place_trade(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(request): Json<PlaceTradeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Trade>>)> {
    let trade = state.settlement.place(auth.user_id(), request)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(trade))))
}

/// GET /api/trades/:id
async fn get_trade(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Trade>>> {
    let trade = state.settlement.get_for_user(auth.user_id(), &id)?;
    Ok(Json(ApiResponse::new(trade)))
}
