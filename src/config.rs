use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Trade placement and settlement parameters.
#[derive(Debug, Clone)]
pub struct TradingConfig {
    /// Minimum stake accepted by `place`.
    pub min_stake: Decimal,
    /// Probability in `[0, 1]` that a settlement draw is a win.
    pub win_probability: f64,
    /// Applied when a duration label is not recognised.
    pub default_duration: Duration,
    /// Longest duration `place` accepts.
    pub max_duration: Duration,
    /// Entry price is sampled uniformly within reference ± jitter.
    pub entry_jitter: Decimal,
    /// Reference price used when a pair has no price yet.
    pub fallback_reference_price: Decimal,
    /// Delay before a failed settlement is retried.
    pub retry_backoff: Duration,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            min_stake: Decimal::new(10, 0),
            win_probability: 0.45,
            default_duration: Duration::from_secs(15),
            max_duration: Duration::from_secs(24 * 60 * 60),
            entry_jitter: Decimal::new(50, 0),
            fallback_reference_price: Decimal::new(89446, 0),
            retry_backoff: Duration::from_secs(5),
        }
    }
}

/// Bounds on withdrawal requests.
#[derive(Debug, Clone)]
pub struct WithdrawalLimits {
    pub min: Decimal,
    pub max: Decimal,
}

impl Default for WithdrawalLimits {
    fn default() -> Self {
        Self {
            min: Decimal::new(10, 0),
            max: Decimal::new(1_000_000, 0),
        }
    }
}

/// Bounds on deposit requests. Amounts must always be positive.
#[derive(Debug, Clone)]
pub struct DepositLimits {
    pub min: Decimal,
    pub max: Decimal,
}

impl Default for DepositLimits {
    fn default() -> Self {
        Self {
            min: Decimal::ZERO,
            max: Decimal::new(1_000_000, 0),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// SQLite database file.
    pub database_path: String,
    /// Bearer token for back-office routes.
    pub admin_token: String,
    /// CoinGecko API key (optional, for pro tier).
    pub coingecko_api_key: Option<String>,
    /// Catalog price refresh period.
    pub price_refresh_interval: Duration,
    /// Due-settlement sweep period.
    pub settlement_sweep_interval: Duration,
    /// Session lifetime.
    pub session_ttl: Duration,
    pub trading: TradingConfig,
    pub withdrawals: WithdrawalLimits,
    pub deposits: DepositLimits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_path: "toptrades.db".to_string(),
            admin_token: uuid::Uuid::new_v4().to_string(),
            coingecko_api_key: None,
            price_refresh_interval: Duration::from_secs(60),
            settlement_sweep_interval: Duration::from_millis(1000),
            session_ttl: Duration::from_secs(24 * 60 * 60),
            trading: TradingConfig::default(),
            withdrawals: WithdrawalLimits::default(),
            deposits: DepositLimits::default(),
        }
    }
}

/// Parse an env var, falling back to `default` when unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse a probability env var. Non-finite values fall back to `default`,
/// finite ones are clamped to `[0, 1]`.
fn env_probability(key: &str, default: f64) -> f64 {
    let value: f64 = env_or(key, default);
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        default
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let trading = TradingConfig::default();

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env_or("PORT", defaults.port),
            database_path: env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            admin_token: env::var("ADMIN_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(defaults.admin_token),
            coingecko_api_key: env::var("COINGECKO_API_KEY").ok(),
            price_refresh_interval: Duration::from_secs(env_or("PRICE_REFRESH_SECS", 60)),
            settlement_sweep_interval: Duration::from_millis(env_or("SETTLEMENT_SWEEP_MS", 1000)),
            session_ttl: Duration::from_secs(
                env_or::<u64>("SESSION_TTL_HOURS", 24).saturating_mul(60 * 60),
            ),
            trading: TradingConfig {
                min_stake: env_or("TRADE_MIN_STAKE", trading.min_stake),
                win_probability: env_probability("TRADE_WIN_PROBABILITY", trading.win_probability),
                default_duration: Duration::from_secs(env_or(
                    "TRADE_DEFAULT_DURATION_SECS",
                    trading.default_duration.as_secs(),
                )),
                max_duration: Duration::from_secs(env_or(
                    "TRADE_MAX_DURATION_SECS",
                    trading.max_duration.as_secs(),
                )),
                entry_jitter: env_or("TRADE_ENTRY_JITTER", trading.entry_jitter),
                fallback_reference_price: env_or(
                    "TRADE_FALLBACK_PRICE",
                    trading.fallback_reference_price,
                ),
                retry_backoff: Duration::from_secs(env_or(
                    "SETTLEMENT_RETRY_SECS",
                    trading.retry_backoff.as_secs(),
                )),
            },
            withdrawals: WithdrawalLimits {
                min: env_or("WITHDRAWAL_MIN", defaults.withdrawals.min),
                max: env_or("WITHDRAWAL_MAX", defaults.withdrawals.max),
            },
            deposits: DepositLimits {
                min: env_or("DEPOSIT_MIN", defaults.deposits.min),
                max: env_or("DEPOSIT_MAX", defaults.deposits.max),
            },
        }
    }

    /// `true` when ADMIN_TOKEN was not supplied and a random one is in use.
    pub fn admin_token_generated() -> bool {
        env::var("ADMIN_TOKEN").map(|t| t.trim().is_empty()).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trading_defaults() {
        let trading = TradingConfig::default();
        assert_eq!(trading.min_stake, Decimal::new(10, 0));
        assert!((trading.win_probability - 0.45).abs() < f64::EPSILON);
        assert_eq!(trading.default_duration, Duration::from_secs(15));
        assert_eq!(trading.entry_jitter, Decimal::new(50, 0));
    }

    #[test]
    fn test_withdrawal_defaults() {
        let limits = WithdrawalLimits::default();
        assert!(limits.min < limits.max);
        assert_eq!(limits.min, Decimal::new(10, 0));
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("TOPTRADES_TEST_GARBAGE_PORT", "not-a-port");
        let port: u16 = env_or("TOPTRADES_TEST_GARBAGE_PORT", 3001);
        assert_eq!(port, 3001);

        env::set_var("TOPTRADES_TEST_DECIMAL", " 12.5 ");
        let value: Decimal = env_or("TOPTRADES_TEST_DECIMAL", Decimal::ZERO);
        assert_eq!(value, Decimal::new(125, 1));
    }

    #[test]
    fn test_probability_rejects_non_finite() {
        env::set_var("TOPTRADES_TEST_NAN_PROBABILITY", "NaN");
        assert_eq!(env_probability("TOPTRADES_TEST_NAN_PROBABILITY", 0.45), 0.45);

        env::set_var("TOPTRADES_TEST_INF_PROBABILITY", "inf");
        assert_eq!(env_probability("TOPTRADES_TEST_INF_PROBABILITY", 0.45), 0.45);

        env::set_var("TOPTRADES_TEST_HIGH_PROBABILITY", "1.7");
        assert_eq!(env_probability("TOPTRADES_TEST_HIGH_PROBABILITY", 0.45), 1.0);
    }

    #[test]
    fn test_deposit_limits_are_bounded() {
        let limits = DepositLimits::default();
        assert_eq!(limits.min, Decimal::ZERO);
        assert_eq!(limits.max, Decimal::new(1_000_000, 0));
    }

    #[test]
    fn test_default_admin_token_is_random() {
        let a = Config::default();
        let b = Config::default();
        assert_ne!(a.admin_token, b.admin_token);
        assert_eq!(a.port, 3001);
    }
}
