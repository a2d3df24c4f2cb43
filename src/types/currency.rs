//! Currency Pair Types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Display category of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum PairCategory {
    #[default]
    #[serde(rename = "USDT")]
    Usdt,
    #[serde(rename = "Web3")]
    Web3,
    #[serde(rename = "NFT")]
    Nft,
}

impl PairCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PairCategory::Usdt => "USDT",
            PairCategory::Web3 => "Web3",
            PairCategory::Nft => "NFT",
        }
    }
}

impl std::fmt::Display for PairCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PairCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USDT" => Ok(PairCategory::Usdt),
            "Web3" => Ok(PairCategory::Web3),
            "NFT" => Ok(PairCategory::Nft),
            other => Err(format!("unknown pair category: {}", other)),
        }
    }
}

/// A tradable pair such as `BTC/USDT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyPair {
    pub id: String,
    /// Unique within the catalog
    pub name: String,
    pub category: PairCategory,
    /// Zero until the first live or mock price lands
    pub price: Decimal,
    /// 24h change in percent
    pub change: Decimal,
    pub icon: String,
    pub description: String,
    /// Listed (`true`) or delisted
    pub status: bool,
    pub updated_at: i64,
}

impl CurrencyPair {
    pub fn new(name: String, category: PairCategory, icon: String, description: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            category,
            price: Decimal::ZERO,
            change: Decimal::ZERO,
            icon,
            description,
            status: true,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Symbol before the slash, upper-cased (`BTC` for `BTC/USDT`).
    pub fn base_symbol(&self) -> String {
        base_symbol(&self.name)
    }
}

/// Base symbol of a pair name.
pub fn base_symbol(name: &str) -> String {
    name.split('/').next().unwrap_or(name).trim().to_uppercase()
}

/// Body of `POST /api/currency-pairs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePairRequest {
    pub name: String,
    #[serde(default)]
    pub category: PairCategory,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub change: Option<Decimal>,
}

/// Body of `PATCH /api/currency-pairs/:id`. Only present fields change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePairRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<PairCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<bool>,
}

impl UpdatePairRequest {
    /// Apply the present fields to `pair`.
    pub fn apply_to(&self, pair: &mut CurrencyPair) {
        if let Some(ref name) = self.name {
            pair.name = name.trim().to_string();
        }
        if let Some(category) = self.category {
            pair.category = category;
        }
        if let Some(price) = self.price {
            pair.price = price;
        }
        if let Some(change) = self.change {
            pair.change = change;
        }
        if let Some(ref icon) = self.icon {
            pair.icon = icon.clone();
        }
        if let Some(ref description) = self.description {
            pair.description = description.clone();
        }
        if let Some(status) = self.status {
            pair.status = status;
        }
        pair.updated_at = chrono::Utc::now().timestamp_millis();
    }
}

/// One price observation from an external feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    /// Upper-case base symbol, e.g. `BTC`
    pub symbol: String,
    pub price: Decimal,
    pub percent_change_24h: Decimal,
}

/// Pairs seeded into an empty catalog: (name, category, icon).
pub const DEFAULT_PAIRS: &[(&str, PairCategory, &str)] = &[
    ("BTC/USDT", PairCategory::Usdt, "bitcoin"),
    ("ETH/USDT", PairCategory::Usdt, "eth"),
    ("XRP/USDT", PairCategory::Usdt, "xrp"),
    ("DOGE/USDT", PairCategory::Usdt, "doge"),
    ("ADA/USDT", PairCategory::Usdt, "ada"),
    ("BCH/USDT", PairCategory::Usdt, "bch"),
    ("AXS/USDT", PairCategory::Web3, "axs"),
    ("ALICE/USDT", PairCategory::Web3, "alice"),
    ("SAND/USDT", PairCategory::Web3, "sand"),
    ("MANA/USDT", PairCategory::Web3, "mana"),
    ("ENJ/USDT", PairCategory::Web3, "enj"),
    ("YGG/USDT", PairCategory::Web3, "ygg"),
    ("APE/USDT", PairCategory::Nft, "ape"),
    ("GMT/USDT", PairCategory::Nft, "gmt"),
    ("IMX/USDT", PairCategory::Nft, "imx"),
    ("CHR/USDT", PairCategory::Nft, "chr"),
    ("OGN/USDT", PairCategory::Nft, "ogn"),
    ("CHZ/USDT", PairCategory::Nft, "chz"),
];

/// Static fallback prices: (symbol, price, change%) as decimal strings.
pub const MOCK_PRICES: &[(&str, &str, &str)] = &[
    ("BTC", "89500", "2.5"),
    ("ETH", "3200", "1.8"),
    ("XRP", "0.65", "-0.5"),
    ("DOGE", "0.08", "3.2"),
    ("ADA", "0.45", "1.1"),
    ("BCH", "420", "-1.2"),
    ("AXS", "8.5", "4.5"),
    ("ALICE", "1.2", "2.1"),
    ("SAND", "0.55", "3.8"),
    ("MANA", "0.42", "1.9"),
    ("ENJ", "0.38", "2.3"),
    ("YGG", "0.52", "1.7"),
    ("APE", "1.8", "-0.8"),
    ("GMT", "0.25", "2.9"),
    ("IMX", "1.5", "3.1"),
    ("CHR", "0.18", "1.4"),
    ("OGN", "0.12", "0.9"),
    ("CHZ", "0.09", "2.2"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_symbol() {
        assert_eq!(base_symbol("BTC/USDT"), "BTC");
        assert_eq!(base_symbol("eth/usdt"), "ETH");
        assert_eq!(base_symbol("SOL"), "SOL");
    }

    #[test]
    fn test_category_serialization() {
        assert_eq!(serde_json::to_string(&PairCategory::Usdt).unwrap(), "\"USDT\"");
        assert_eq!(serde_json::to_string(&PairCategory::Nft).unwrap(), "\"NFT\"");
        assert_eq!("Web3".parse::<PairCategory>(), Ok(PairCategory::Web3));
    }

    #[test]
    fn test_partial_update() {
        let mut pair = CurrencyPair::new(
            "BTC/USDT".to_string(),
            PairCategory::Usdt,
            "bitcoin".to_string(),
            String::new(),
        );
        let patch = UpdatePairRequest {
            status: Some(false),
            description: Some("Bitcoin".to_string()),
            ..Default::default()
        };

        patch.apply_to(&mut pair);
        assert!(!pair.status);
        assert_eq!(pair.description, "Bitcoin");
        assert_eq!(pair.name, "BTC/USDT");
    }

    #[test]
    fn test_every_default_pair_has_mock_price() {
        for (name, _, _) in DEFAULT_PAIRS {
            let symbol = base_symbol(name);
            assert!(
                MOCK_PRICES.iter().any(|(s, _, _)| *s == symbol),
                "missing mock price for {}",
                symbol
            );
        }
    }
}
