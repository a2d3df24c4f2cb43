//! Currency pair catalog API.
//!
//! Reads are public; every mutation requires the admin token.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::{AdminAuth, ApiResponse};
use crate::error::Result;
use crate::services::RefreshOutcome;
use crate::types::{CreatePairRequest, CurrencyPair, PairCategory, UpdatePairRequest};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_pairs).post(create_pair))
        .route("/dedupe", post(deduplicate))
        .route("/refresh", post(refresh_prices))
        .route("/:id", patch(update_pair).delete(delete_pair).get(get_pair))
        .route("/:id/toggle", post(toggle_pair))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Only listed pairs
    #[serde(default)]
    pub listed: bool,
    /// Group by category
    #[serde(default)]
    pub grouped: bool,
}

/// Either a flat list or pairs keyed by category.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PairListing {
    Flat(Vec<CurrencyPair>),
    Grouped(BTreeMap<PairCategory, Vec<CurrencyPair>>),
}

#[derive(Debug, Serialize)]
pub struct DedupeResponse {
    pub removed: usize,
}

/// GET /api/currency-pairs?listed=true&grouped=true
async fn list_pairs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PairListing>>> {
    let listing = if query.grouped {
        PairListing::Grouped(state.catalog.grouped(query.listed)?)
    } else {
        PairListing::Flat(state.catalog.list(query.listed)?)
    };
    Ok(Json(ApiResponse::new(listing)))
}

/// GET /api/currency-pairs/:id
async fn get_pair(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CurrencyPair>>> {
    Ok(Json(ApiResponse::new(state.catalog.get(&id)?)))
}

/// POST /api/currency-pairs
async fn create_pair(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Json(request): Json<CreatePairRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CurrencyPair>>)> {
    let pair = state.catalog.create(request)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(pair))))
}

/// PATCH /api/currency-pairs/:id
async fn update_pair(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(id): Path<String>,
    Json(patch): Json<UpdatePairRequest>,
) -> Result<Json<ApiResponse<CurrencyPair>>> {
    Ok(Json(ApiResponse::new(state.catalog.update(&id, patch)?)))
}

/// POST /api/currency-pairs/:id/toggle
async fn toggle_pair(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CurrencyPair>>> {
    Ok(Json(ApiResponse::new(state.catalog.toggle(&id)?)))
}

/// DELETE /api/currency-pairs/:id
async fn delete_pair(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.catalog.delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/currency-pairs/dedupe
async fn deduplicate(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> Result<Json<ApiResponse<DedupeResponse>>> {
    let removed = state.catalog.deduplicate()?;
    Ok(Json(ApiResponse::new(DedupeResponse { removed })))
}

/// POST /api/currency-pairs/refresh
async fn refresh_prices(
    State(state): State<AppState>,
    _admin: AdminAuth,
) -> Result<Json<ApiResponse<RefreshOutcome>>> {
    let outcome = state
        .catalog
        .refresh_prices(state.price_feed.as_ref())
        .await?;
    Ok(Json(ApiResponse::new(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouped_listing_uses_category_keys() {
        let mut groups = BTreeMap::new();
        groups.insert(
            PairCategory::Nft,
            vec![CurrencyPair::new(
                "APE/USDT".to_string(),
                PairCategory::Nft,
                "ape".to_string(),
                String::new(),
            )],
        );

        let json = serde_json::to_value(PairListing::Grouped(groups)).unwrap();
        assert_eq!(json["NFT"][0]["name"], "APE/USDT");
    }

    #[test]
    fn test_list_query_defaults() {
        let query: ListQuery = serde_json::from_str("{}").unwrap();
        assert!(!query.listed);
        assert!(!query.grouped);
    }
}
