//! Trade Types
//!
//! Up/down wagers settled after a fixed delay by a random draw.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// Enums
// =============================================================================

/// Wagered direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    Up,
    Down,
}

impl TradeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeDirection::Up => "up",
            TradeDirection::Down => "down",
        }
    }
}

impl std::fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TradeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(TradeDirection::Up),
            "down" => Ok(TradeDirection::Down),
            other => Err(format!("unknown trade direction: {}", other)),
        }
    }
}

/// Trade lifecycle status. `Open` moves exactly once to a closed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    /// Stake debited, awaiting settlement
    Open,
    /// Closed with profit_loss > 0
    Completed,
    /// Closed with profit_loss <= 0
    Failed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Open => "open",
            TradeStatus::Completed => "completed",
            TradeStatus::Failed => "failed",
        }
    }

    pub fn is_closed(&self) -> bool {
        !matches!(self, TradeStatus::Open)
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TradeStatus::Open),
            "completed" => Ok(TradeStatus::Completed),
            "failed" => Ok(TradeStatus::Failed),
            other => Err(format!("unknown trade status: {}", other)),
        }
    }
}

/// Leverage tier selected on the trading panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Leverage {
    #[default]
    #[serde(rename = "1/2")]
    Half,
    #[serde(rename = "X2")]
    Double,
    #[serde(rename = "Max")]
    Max,
}

impl Leverage {
    /// Profit multiplier applied to the stake on a win.
    pub fn multiplier(&self) -> Decimal {
        match self {
            Leverage::Half => Decimal::new(2, 1),
            Leverage::Double => Decimal::new(4, 1),
            Leverage::Max => Decimal::new(8, 1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Leverage::Half => "1/2",
            Leverage::Double => "X2",
            Leverage::Max => "Max",
        }
    }
}

impl std::str::FromStr for Leverage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1/2" => Ok(Leverage::Half),
            "X2" => Ok(Leverage::Double),
            "Max" => Ok(Leverage::Max),
            other => Err(format!("unknown leverage tier: {}", other)),
        }
    }
}

/// Parse a duration label such as `15s`, `1m` or `2h`.
///
/// Returns `None` for anything unrecognized; callers apply their default.
pub fn parse_duration_label(label: &str) -> Option<Duration> {
    let label = label.trim();
    if label.len() < 2 || !label.is_ascii() {
        return None;
    }
    let (digits, unit) = label.split_at(label.len() - 1);
    let value: u64 = digits.parse().ok()?;
    if value == 0 {
        return None;
    }
    let seconds = match unit {
        "s" => value,
        "m" => value.checked_mul(60)?,
        "h" => value.checked_mul(3600)?,
        _ => return None,
    };
    Some(Duration::from_secs(seconds))
}

// =============================================================================
// Trade
// =============================================================================

/// A placed wager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub currency_pair: String,
    #[serde(rename = "type")]
    pub direction: TradeDirection,
    pub leverage: Leverage,
    /// Stake, debited at placement
    pub amount: Decimal,
    pub entry_price: Decimal,
    /// Synthetic price recorded at settlement
    pub current_price: Option<Decimal>,
    /// Zero while open; fixed once closed
    pub profit_loss: Decimal,
    pub status: TradeStatus,
    pub duration_secs: u64,
    /// Due time for settlement (ms)
    pub settle_at: i64,
    pub settlement_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: i64,
    pub closed_at: Option<i64>,
}

impl Trade {
    /// Build an open trade due `duration` from now.
    pub fn open(
        user_id: String,
        currency_pair: String,
        direction: TradeDirection,
        leverage: Leverage,
        amount: Decimal,
        entry_price: Decimal,
        duration: Duration,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let delay = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            user_name: None,
            currency_pair,
            direction,
            leverage,
            amount,
            entry_price,
            current_price: None,
            profit_loss: Decimal::ZERO,
            status: TradeStatus::Open,
            duration_secs: duration.as_secs(),
            settle_at: now.saturating_add(delay),
            settlement_attempts: 0,
            last_error: None,
            created_at: now,
            closed_at: None,
        }
    }
}

/// Body of `POST /api/trades`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceTradeRequest {
    pub currency_pair: String,
    #[serde(rename = "type")]
    pub direction: TradeDirection,
    pub amount: Decimal,
    /// Duration label, e.g. `15s` or `1m`
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub leverage: Leverage,
}

/// Result of a settlement draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeOutcome {
    Win,
    Loss,
}
