//! Currency Pair Catalog
//!
//! Listed symbols with category, price and 24h change. Prices come from a
//! [`PriceFeed`] on a best-effort basis; when the feed is down, pairs that
//! have never been priced get a static mock value instead.

use crate::error::{AppError, Result};
use crate::services::sqlite_store::{self, SqliteStore};
use crate::sources::PriceFeed;
use crate::types::{
    base_symbol, CreatePairRequest, CurrencyPair, PairCategory, UpdatePairRequest, DEFAULT_PAIRS,
    MOCK_PRICES,
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the prices of a refresh came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceOrigin {
    Live,
    Fallback,
}

/// Result of a catalog price refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshOutcome {
    pub source: PriceOrigin,
    /// Number of pairs whose price was written
    pub updated: usize,
}

/// Normalize and check a `BASE/QUOTE` pair name.
fn normalize_name(name: &str) -> Result<String> {
    let name = name.trim().to_uppercase();
    let mut parts = name.split('/');
    let valid = match (parts.next(), parts.next(), parts.next()) {
        (Some(base), Some(quote), None) => {
            !base.is_empty()
                && !quote.is_empty()
                && base.chars().chain(quote.chars()).all(|c| c.is_ascii_alphanumeric())
        }
        _ => false,
    };
    if !valid {
        return Err(AppError::Validation(format!(
            "pair name must look like BASE/QUOTE, got '{}'",
            name
        )));
    }
    Ok(name)
}

fn mock_price(symbol: &str) -> Option<(Decimal, Decimal)> {
    let (_, price, change) = MOCK_PRICES.iter().find(|(s, _, _)| *s == symbol)?;
    Some((Decimal::from_str(price).ok()?, Decimal::from_str(change).ok()?))
}

/// Look up a tradable pair and the price trade entry sampling starts from,
/// within an open transaction. A pair that has never been priced reports
/// `fallback`. Unknown and delisted pairs are validation errors.
pub fn reference_price_in(
    conn: &Connection,
    name: &str,
    fallback: Decimal,
) -> Result<(CurrencyPair, Decimal)> {
    let pair = sqlite_store::find_pair_by_name(conn, name)?
        .ok_or_else(|| AppError::Validation(format!("unknown currency pair: {}", name)))?;
    if !pair.status {
        return Err(AppError::Validation(format!(
            "currency pair {} is not listed",
            pair.name
        )));
    }
    let reference = if pair.price.is_zero() {
        fallback
    } else {
        pair.price
    };
    Ok((pair, reference))
}

#[derive(Clone)]
pub struct CurrencyCatalog {
    store: Arc<SqliteStore>,
}

impl CurrencyCatalog {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }

    // ===== Seeding =====

    /// Insert the default pairs into an empty catalog. Returns how many were added.
    pub fn seed_defaults(&self) -> Result<usize> {
        let added = self.store.transaction(|conn| {
            if sqlite_store::count_pairs(conn)? > 0 {
                return Ok(0);
            }
            for (name, category, icon) in DEFAULT_PAIRS {
                let pair = CurrencyPair::new(
                    name.to_string(),
                    *category,
                    icon.to_string(),
                    String::new(),
                );
                sqlite_store::insert_pair(conn, &pair)?;
            }
            Ok(DEFAULT_PAIRS.len())
        })?;

        if added > 0 {
            info!("Seeded {} default currency pairs", added);
        }
        Ok(added)
    }

    // ===== Queries =====

    pub fn list(&self, listed_only: bool) -> Result<Vec<CurrencyPair>> {
        self.store
            .read(|conn| sqlite_store::list_pairs(conn, listed_only))
    }

    /// Pairs grouped by category, each group in catalog order.
    pub fn grouped(&self, listed_only: bool) -> Result<BTreeMap<PairCategory, Vec<CurrencyPair>>> {
        let mut groups: BTreeMap<PairCategory, Vec<CurrencyPair>> = BTreeMap::new();
        for pair in self.list(listed_only)? {
            groups.entry(pair.category).or_default().push(pair);
        }
        Ok(groups)
    }

    pub fn get(&self, id: &str) -> Result<CurrencyPair> {
        self.store
            .read(|conn| sqlite_store::get_pair(conn, id))?
            .ok_or_else(|| AppError::NotFound(format!("currency pair {}", id)))
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<CurrencyPair>> {
        self.store
            .read(|conn| sqlite_store::find_pair_by_name(conn, name))
    }

    // ===== Admin Mutations =====

    pub fn create(&self, request: CreatePairRequest) -> Result<CurrencyPair> {
        let name = normalize_name(&request.name)?;
        let mut pair = CurrencyPair::new(
            name,
            request.category,
            request.icon.unwrap_or_default(),
            request.description.unwrap_or_default(),
        );
        if let Some(price) = request.price {
            if price < Decimal::ZERO {
                return Err(AppError::Validation("price cannot be negative".to_string()));
            }
            pair.price = price;
        }
        if let Some(change) = request.change {
            pair.change = change;
        }

        self.store
            .transaction(|conn| sqlite_store::insert_pair(conn, &pair))?;
        info!("Created currency pair {} ({})", pair.name, pair.category);
        Ok(pair)
    }

    /// Partial update. Renaming onto an existing name is a `Conflict`.
    pub fn update(&self, id: &str, mut patch: UpdatePairRequest) -> Result<CurrencyPair> {
        if let Some(ref name) = patch.name {
            patch.name = Some(normalize_name(name)?);
        }
        if matches!(patch.price, Some(p) if p < Decimal::ZERO) {
            return Err(AppError::Validation("price cannot be negative".to_string()));
        }

        let pair = self.store.transaction(|conn| {
            let mut pair = sqlite_store::get_pair(conn, id)?
                .ok_or_else(|| AppError::NotFound(format!("currency pair {}", id)))?;
            patch.apply_to(&mut pair);
            sqlite_store::update_pair(conn, &pair)?;
            Ok(pair)
        })?;

        info!("Updated currency pair {}", pair.name);
        Ok(pair)
    }

    /// Flip listed/delisted.
    pub fn toggle(&self, id: &str) -> Result<CurrencyPair> {
        let pair = self.store.transaction(|conn| {
            let mut pair = sqlite_store::get_pair(conn, id)?
                .ok_or_else(|| AppError::NotFound(format!("currency pair {}", id)))?;
            pair.status = !pair.status;
            pair.updated_at = chrono::Utc::now().timestamp_millis();
            sqlite_store::update_pair(conn, &pair)?;
            Ok(pair)
        })?;

        info!(
            "Currency pair {} is now {}",
            pair.name,
            if pair.status { "listed" } else { "delisted" }
        );
        Ok(pair)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let removed = self
            .store
            .transaction(|conn| sqlite_store::delete_pair(conn, id))?;
        if removed == 0 {
            return Err(AppError::NotFound(format!("currency pair {}", id)));
        }
        info!("Deleted currency pair {}", id);
        Ok(())
    }

    /// Remove later duplicates by name, keeping the earliest. Returns the count removed.
    pub fn deduplicate(&self) -> Result<usize> {
        let removed = self
            .store
            .transaction(|conn| sqlite_store::remove_duplicate_pairs(conn))?;
        info!("Deduplicated currency pairs: {} removed", removed);
        Ok(removed)
    }

    // ===== Prices =====

    /// Give every zero-priced pair its static mock price. Returns the count updated.
    pub fn apply_mock_prices(&self) -> Result<usize> {
        let updated = self.store.transaction(|conn| {
            let mut updated = 0;
            for pair in sqlite_store::list_pairs(conn, false)? {
                if !pair.price.is_zero() {
                    continue;
                }
                if let Some((price, change)) = mock_price(&pair.base_symbol()) {
                    sqlite_store::write_pair_price(conn, &pair.id, price, change)?;
                    updated += 1;
                }
            }
            Ok(updated)
        })?;

        if updated > 0 {
            debug!("Applied mock prices to {} pairs", updated);
        }
        Ok(updated)
    }

    /// Pull fresh quotes from `feed`. Feed failures fall back to mock prices
    /// and are never returned to the caller.
    pub async fn refresh_prices(&self, feed: &dyn PriceFeed) -> Result<RefreshOutcome> {
        let pairs = self.list(false)?;
        if pairs.is_empty() {
            return Ok(RefreshOutcome {
                source: PriceOrigin::Live,
                updated: 0,
            });
        }

        let mut symbols: Vec<String> = pairs.iter().map(|p| p.base_symbol()).collect();
        symbols.sort();
        symbols.dedup();

        let quotes = match feed.fetch_quotes(&symbols).await {
            Ok(quotes) if !quotes.is_empty() => quotes,
            Ok(_) => {
                warn!("{} returned no quotes, using mock prices", feed.name());
                return self.fallback();
            }
            Err(e) => {
                warn!("{} unavailable, using mock prices: {}", feed.name(), e);
                return self.fallback();
            }
        };

        let by_symbol: HashMap<&str, (Decimal, Decimal)> = quotes
            .iter()
            .map(|q| (q.symbol.as_str(), (q.price, q.percent_change_24h)))
            .collect();

        let updated = self.store.transaction(|conn| {
            let mut updated = 0;
            for pair in &pairs {
                let symbol = base_symbol(&pair.name);
                if let Some((price, change)) = by_symbol.get(symbol.as_str()) {
                    sqlite_store::write_pair_price(conn, &pair.id, *price, *change)?;
                    updated += 1;
                }
            }
            Ok(updated)
        })?;

        info!("Refreshed {} pair prices from {}", updated, feed.name());
        Ok(RefreshOutcome {
            source: PriceOrigin::Live,
            updated,
        })
    }

    fn fallback(&self) -> Result<RefreshOutcome> {
        Ok(RefreshOutcome {
            source: PriceOrigin::Fallback,
            updated: self.apply_mock_prices()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceQuote;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    struct DownFeed;

    #[async_trait]
    impl PriceFeed for DownFeed {
        fn name(&self) -> &'static str {
            "down"
        }

        async fn fetch_quotes(&self, _symbols: &[String]) -> Result<Vec<PriceQuote>> {
            Err(AppError::UpstreamUnavailable("connection refused".to_string()))
        }
    }

    struct BtcOnlyFeed;

    #[async_trait]
    impl PriceFeed for BtcOnlyFeed {
        fn name(&self) -> &'static str {
            "btc-only"
        }

        async fn fetch_quotes(&self, _symbols: &[String]) -> Result<Vec<PriceQuote>> {
            Ok(vec![PriceQuote {
                symbol: "BTC".to_string(),
                price: dec!(91000),
                percent_change_24h: dec!(1.25),
            }])
        }
    }

    fn create_test_catalog() -> CurrencyCatalog {
        CurrencyCatalog::new(Arc::new(SqliteStore::new_in_memory().unwrap()))
    }

    fn create_request(name: &str) -> CreatePairRequest {
        CreatePairRequest {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_seed_only_when_empty() {
        let catalog = create_test_catalog();
        assert_eq!(catalog.seed_defaults().unwrap(), 18);
        assert_eq!(catalog.seed_defaults().unwrap(), 0);

        let groups = catalog.grouped(false).unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[&PairCategory::Web3].len(), 6);
        assert_eq!(groups[&PairCategory::Usdt][0].name, "BTC/USDT");
    }

    #[test]
    fn test_create_rejects_bad_names_and_duplicates() {
        let catalog = create_test_catalog();
        let pair = catalog.create(create_request(" sol/usdt ")).unwrap();
        assert_eq!(pair.name, "SOL/USDT");

        for bad in ["", "SOL", "SOL/", "/USDT", "SOL/USDT/X", "S L/USDT"] {
            assert!(
                matches!(catalog.create(create_request(bad)), Err(AppError::Validation(_))),
                "accepted {:?}",
                bad
            );
        }
        assert!(matches!(
            catalog.create(create_request("SOL/USDT")),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_update_toggle_delete() {
        let catalog = create_test_catalog();
        let sol = catalog.create(create_request("SOL/USDT")).unwrap();
        let avax = catalog.create(create_request("AVAX/USDT")).unwrap();

        let patch = UpdatePairRequest {
            name: Some("AVAX/USDT".to_string()),
            ..Default::default()
        };
        assert!(matches!(catalog.update(&sol.id, patch), Err(AppError::Conflict(_))));

        let patch = UpdatePairRequest {
            category: Some(PairCategory::Web3),
            ..Default::default()
        };
        assert_eq!(catalog.update(&sol.id, patch).unwrap().category, PairCategory::Web3);

        assert!(!catalog.toggle(&avax.id).unwrap().status);
        assert_eq!(catalog.list(true).unwrap().len(), 1);
        assert!(catalog.toggle(&avax.id).unwrap().status);

        catalog.delete(&sol.id).unwrap();
        assert!(matches!(catalog.delete(&sol.id), Err(AppError::NotFound(_))));
        assert!(matches!(catalog.get(&sol.id), Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fallback_only_fills_zero_prices() {
        let catalog = create_test_catalog();
        catalog.seed_defaults().unwrap();
        let btc = catalog.find_by_name("BTC/USDT").unwrap().unwrap();
        let patch = UpdatePairRequest {
            price: Some(dec!(100000)),
            ..Default::default()
        };
        catalog.update(&btc.id, patch).unwrap();

        let outcome = catalog.refresh_prices(&DownFeed).await.unwrap();
        assert_eq!(outcome.source, PriceOrigin::Fallback);
        assert_eq!(outcome.updated, 17);

        let btc = catalog.get(&btc.id).unwrap();
        assert_eq!(btc.price, dec!(100000));
        let eth = catalog.find_by_name("ETH/USDT").unwrap().unwrap();
        assert_eq!(eth.price, dec!(3200));

        // Nothing left at zero, so a second failure changes nothing.
        let outcome = catalog.refresh_prices(&DownFeed).await.unwrap();
        assert_eq!(outcome.updated, 0);
    }

    #[tokio::test]
    async fn test_live_refresh_updates_matching_pairs() {
        let catalog = create_test_catalog();
        catalog.seed_defaults().unwrap();

        let outcome = catalog.refresh_prices(&BtcOnlyFeed).await.unwrap();
        assert_eq!(
            outcome,
            RefreshOutcome {
                source: PriceOrigin::Live,
                updated: 1
            }
        );

        let btc = catalog.find_by_name("btc/usdt").unwrap().unwrap();
        assert_eq!(btc.price, dec!(91000));
        assert_eq!(btc.change, dec!(1.25));
    }

    #[test]
    fn test_reference_price_lookup() {
        let catalog = create_test_catalog();
        catalog.seed_defaults().unwrap();
        let eth = catalog.find_by_name("ETH/USDT").unwrap().unwrap();
        catalog
            .update(
                &eth.id,
                UpdatePairRequest {
                    price: Some(dec!(3100)),
                    ..Default::default()
                },
            )
            .unwrap();
        let chz = catalog.find_by_name("CHZ/USDT").unwrap().unwrap();
        catalog.toggle(&chz.id).unwrap();

        let lookup = |name: &str| {
            catalog
                .store
                .read(|conn| reference_price_in(conn, name, dec!(89446)))
        };
        assert_eq!(lookup("eth/usdt").unwrap().1, dec!(3100));
        assert_eq!(lookup("BTC/USDT").unwrap().1, dec!(89446));
        assert!(matches!(lookup("CHZ/USDT"), Err(AppError::Validation(_))));
        assert!(matches!(lookup("SOL/USDT"), Err(AppError::Validation(_))));
    }
}
