//! External price feeds.

pub mod coingecko;

pub use coingecko::CoinGeckoClient;

use crate::error::Result;
use crate::types::PriceQuote;
use async_trait::async_trait;

/// Source of live quotes for catalog refreshes.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Human-readable source name for logs.
    fn name(&self) -> &'static str;

    /// Fetch quotes for the given upper-case base symbols.
    ///
    /// Symbols the feed doesn't know are skipped. Transport and decoding
    /// failures surface as `AppError::UpstreamUnavailable`.
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<PriceQuote>>;
}
