use crate::error::{AppError, Result};
use crate::sources::PriceFeed;
use crate::types::PriceQuote;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";
const COINGECKO_PRO_API_URL: &str = "https://pro-api.coingecko.com/api/v3";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Symbol to CoinGecko ID mapping.
pub const SYMBOL_TO_ID: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("BNB", "binancecoin"),
    ("BCH", "bitcoin-cash"),
    ("XRP", "ripple"),
    ("DOGE", "dogecoin"),
    ("ADA", "cardano"),
    ("SOL", "solana"),
    ("MATIC", "matic-network"),
    ("DOT", "polkadot"),
    ("AVAX", "avalanche-2"),
    ("LINK", "chainlink"),
    ("UNI", "uniswap"),
    ("AXS", "axie-infinity"),
    ("ALICE", "my-neighbor-alice"),
    ("SAND", "the-sandbox"),
    ("MANA", "decentraland"),
    ("ENJ", "enjincoin"),
    ("YGG", "yield-guild-games"),
    ("APE", "apecoin"),
    ("GMT", "stepn"),
    ("IMX", "immutable-x"),
    ("CHR", "chromia"),
    ("OGN", "origin-protocol"),
    ("CHZ", "chiliz"),
];

pub fn coingecko_id(symbol: &str) -> Option<&'static str> {
    SYMBOL_TO_ID
        .iter()
        .find(|(s, _)| s.eq_ignore_ascii_case(symbol))
        .map(|(_, id)| *id)
}

fn symbol_for_id(id: &str) -> Option<&'static str> {
    SYMBOL_TO_ID
        .iter()
        .find(|(_, gid)| *gid == id)
        .map(|(s, _)| *s)
}

/// Row of `/coins/markets`.
#[derive(Debug, Deserialize)]
struct CoinGeckoMarket {
    id: String,
    current_price: Option<f64>,
    price_change_percentage_24h: Option<f64>,
}

impl CoinGeckoMarket {
    fn into_quote(self) -> Option<PriceQuote> {
        let symbol = symbol_for_id(&self.id)?;
        let price = Decimal::from_f64(self.current_price?)?.round_dp(8);
        let change = self
            .price_change_percentage_24h
            .and_then(Decimal::from_f64)
            .unwrap_or(Decimal::ZERO)
            .round_dp(2);
        Some(PriceQuote {
            symbol: symbol.to_string(),
            price,
            percent_change_24h: change,
        })
    }
}

/// CoinGecko REST client.
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    api_key: Option<String>,
}

impl CoinGeckoClient {
    /// Create a new CoinGecko client.
    pub fn new(api_key: Option<String>) -> Self {
        let client = Client::builder()
            .user_agent("TopTrades/0.1 (Currency Pair Catalog)")
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, api_key }
    }

    fn base_url(&self) -> &str {
        if self.api_key.is_some() {
            COINGECKO_PRO_API_URL
        } else {
            COINGECKO_API_URL
        }
    }

    fn markets_url(&self, symbols: &[String]) -> Option<String> {
        let ids: Vec<&str> = symbols.iter().filter_map(|s| coingecko_id(s)).collect();
        if ids.is_empty() {
            return None;
        }

        let mut url = format!(
            "{}/coins/markets?vs_currency=usd&ids={}&order=market_cap_desc&sparkline=false",
            self.base_url(),
            ids.join(",")
        );
        if let Some(ref key) = self.api_key {
            url.push_str(&format!("&x_cg_pro_api_key={}", key));
        }
        Some(url)
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoClient {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Vec<PriceQuote>> {
        let Some(url) = self.markets_url(symbols) else {
            return Ok(Vec::new());
        };

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            warn!("CoinGecko API returned {}: {}", status, snippet);
            return Err(AppError::UpstreamUnavailable(format!(
                "CoinGecko API error: {}",
                status
            )));
        }

        let markets: Vec<CoinGeckoMarket> = response.json().await?;
        let quotes: Vec<PriceQuote> = markets
            .into_iter()
            .filter_map(CoinGeckoMarket::into_quote)
            .collect();

        debug!("CoinGecko returned {} quotes", quotes.len());
        Ok(quotes)
    }
}
