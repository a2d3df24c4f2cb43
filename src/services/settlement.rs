//! Trade Settlement Engine
//!
//! Placement debits the stake and stores an open trade with a due time.
//! A background sweep settles due trades by a random draw that ignores
//! direction and price. Trades cannot be cancelled.
//!
//! Settlement is exactly-once: the close is a conditional update on
//! `status = 'open'` and the payout is credited in the same transaction.

use crate::config::TradingConfig;
use crate::error::{AppError, Result};
use crate::services::catalog;
use crate::services::ledger;
use crate::services::sqlite_store::{self, SqliteStore};
use crate::types::{
    parse_duration_label, PlaceTradeRequest, Trade, TradeDirection, TradeOutcome, TradeStatus,
};
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Retry delay multiplier stops growing after this many attempts.
const MAX_BACKOFF_STEPS: u32 = 12;

// =============================================================================
// Outcome Sources
// =============================================================================

/// Decides whether a trade wins.
pub trait OutcomeSource: Send + Sync {
    fn draw(&self) -> TradeOutcome;
}

/// Bernoulli draw with a fixed win probability.
#[derive(Debug, Clone)]
pub struct RandomOutcome {
    win_probability: f64,
}

impl RandomOutcome {
    /// Probabilities outside `[0, 1]` are clamped; NaN never wins.
    pub fn new(win_probability: f64) -> Self {
        let win_probability = if win_probability.is_nan() {
            0.0
        } else {
            win_probability.clamp(0.0, 1.0)
        };
        Self { win_probability }
    }
}

impl OutcomeSource for RandomOutcome {
    fn draw(&self) -> TradeOutcome {
        if rand::thread_rng().gen_bool(self.win_probability) {
            TradeOutcome::Win
        } else {
            TradeOutcome::Loss
        }
    }
}

/// Always returns the same outcome.
#[derive(Debug, Clone, Copy)]
pub struct FixedOutcome(pub TradeOutcome);

impl OutcomeSource for FixedOutcome {
    fn draw(&self) -> TradeOutcome {
        self.0
    }
}

// =============================================================================
// Price Helpers
// =============================================================================

fn display_precision(reference: Decimal) -> u32 {
    if reference >= Decimal::ONE {
        2
    } else {
        8
    }
}

/// Entry price uniformly within `reference ± jitter`. The jitter is capped
/// at 1% of the reference so low-priced pairs stay positive.
pub fn sample_entry_price<R: Rng>(reference: Decimal, jitter: Decimal, rng: &mut R) -> Decimal {
    let cap = reference / Decimal::ONE_HUNDRED;
    let jitter = jitter.min(cap).max(Decimal::ZERO);
    let fraction = Decimal::new(rng.gen_range(-10_000..=10_000), 4);
    (reference + jitter * fraction).round_dp(display_precision(reference))
}

/// Synthetic exit price: moved with the wager on a win, against it on a loss.
pub fn synthetic_exit_price<R: Rng>(
    entry: Decimal,
    direction: TradeDirection,
    outcome: TradeOutcome,
    rng: &mut R,
) -> Decimal {
    let movement = entry * Decimal::new(rng.gen_range(1..=100), 4);
    let rises = matches!(
        (direction, outcome),
        (TradeDirection::Up, TradeOutcome::Win) | (TradeDirection::Down, TradeOutcome::Loss)
    );
    let exit = if rises { entry + movement } else { entry - movement };
    exit.round_dp(display_precision(entry))
}

// =============================================================================
// Engine
// =============================================================================

fn payout_overflow(trade_id: &str) -> AppError {
    AppError::Validation(format!("payout of trade {} overflows", trade_id))
}

/// Counts from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub settled: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct SettlementEngine {
    store: Arc<SqliteStore>,
    outcomes: Arc<dyn OutcomeSource>,
    config: TradingConfig,
}

impl SettlementEngine {
    pub fn new(
        store: Arc<SqliteStore>,
        outcomes: Arc<dyn OutcomeSource>,
        config: TradingConfig,
    ) -> Self {
        Self {
            store,
            outcomes,
            config,
        }
    }

    /// Engine drawing outcomes at the configured win probability.
    pub fn with_random_outcomes(store: Arc<SqliteStore>, config: TradingConfig) -> Self {
        let outcomes = Arc::new(RandomOutcome::new(config.win_probability));
        Self::new(store, outcomes, config)
    }

    /// Debit the stake and open a trade. Returns immediately; the trade
    /// settles once its duration has elapsed.
    pub fn place(&self, user_id: &str, request: PlaceTradeRequest) -> Result<Trade> {
        if request.amount <= Decimal::ZERO {
            return Err(AppError::Validation("stake must be positive".to_string()));
        }
        if request.amount < self.config.min_stake {
            return Err(AppError::Validation(format!(
                "minimum stake is {}",
                self.config.min_stake
            )));
        }

        let duration = request
            .duration
            .as_deref()
            .and_then(parse_duration_label)
            .unwrap_or(self.config.default_duration);
        if duration > self.config.max_duration {
            return Err(AppError::Validation(format!(
                "duration cannot exceed {}s",
                self.config.max_duration.as_secs()
            )));
        }

        let trade = self.store.transaction(|conn| {
            let (pair, reference) = catalog::reference_price_in(
                conn,
                &request.currency_pair,
                self.config.fallback_reference_price,
            )?;
            let entry_price =
                sample_entry_price(reference, self.config.entry_jitter, &mut rand::thread_rng());

            ledger::debit_in(conn, user_id, request.amount)?;

            let trade = Trade::open(
                user_id.to_string(),
                pair.name,
                request.direction,
                request.leverage,
                request.amount,
                entry_price,
                duration,
            );
            sqlite_store::insert_trade(conn, &trade)?;

            sqlite_store::get_trade(conn, &trade.id)?
                .ok_or_else(|| AppError::Internal(format!("trade {} vanished", trade.id)))
        })?;

        info!(
            "Placed trade {} {} {} stake {} at {} ({}s)",
            trade.id,
            trade.currency_pair,
            trade.direction,
            trade.amount,
            trade.entry_price,
            trade.duration_secs
        );
        Ok(trade)
    }

    /// Settle one trade. Settling an already-closed trade returns it unchanged.
    pub fn settle(&self, trade_id: &str) -> Result<Trade> {
        let (trade, newly_closed) = self.store.transaction(|conn| {
            let mut trade = sqlite_store::get_trade(conn, trade_id)?
                .ok_or_else(|| AppError::NotFound(format!("trade {}", trade_id)))?;
            if trade.status.is_closed() {
                return Ok((trade, false));
            }

            let outcome = self.outcomes.draw();
            let mut rng = rand::thread_rng();
            trade.current_price = Some(synthetic_exit_price(
                trade.entry_price,
                trade.direction,
                outcome,
                &mut rng,
            ));
            trade.closed_at = Some(chrono::Utc::now().timestamp_millis());
            match outcome {
                TradeOutcome::Win => {
                    trade.profit_loss = trade
                        .amount
                        .checked_mul(trade.leverage.multiplier())
                        .ok_or_else(|| payout_overflow(&trade.id))?;
                    trade.status = TradeStatus::Completed;
                }
                TradeOutcome::Loss => {
                    trade.profit_loss = -trade.amount;
                    trade.status = TradeStatus::Failed;
                }
            }

            if sqlite_store::close_trade(conn, &trade)? == 0 {
                let current = sqlite_store::get_trade(conn, trade_id)?
                    .ok_or_else(|| AppError::NotFound(format!("trade {}", trade_id)))?;
                return Ok((current, false));
            }
            if outcome == TradeOutcome::Win {
                let payout = trade
                    .amount
                    .checked_add(trade.profit_loss)
                    .ok_or_else(|| payout_overflow(&trade.id))?;
                ledger::credit_in(conn, &trade.user_id, payout)?;
            }
            trade.last_error = None;
            Ok((trade, true))
        })?;

        if newly_closed {
            info!(
                "Settled trade {} as {} (P/L {})",
                trade.id, trade.status, trade.profit_loss
            );
        } else {
            debug!("Trade {} already settled", trade.id);
        }
        Ok(trade)
    }

    /// Settle every open trade due at or before `now` (ms). Failures are
    /// recorded on the trade and retried after a backoff.
    pub fn sweep_due(&self, now: i64) -> Result<SweepReport> {
        let due = self
            .store
            .read(|conn| sqlite_store::due_trade_ids(conn, now))?;
        let mut report = SweepReport::default();

        for id in due {
            match self.settle(&id) {
                Ok(_) => report.settled += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!("Settlement of trade {} failed: {}", id, e);
                    self.record_failure(&id, &e, now)?;
                }
            }
        }
        Ok(report)
    }

    fn record_failure(&self, id: &str, err: &AppError, now: i64) -> Result<()> {
        let attempts = self
            .store
            .read(|conn| sqlite_store::get_trade(conn, id))?
            .map(|t| t.settlement_attempts)
            .unwrap_or(0);
        let steps = (attempts + 1).min(MAX_BACKOFF_STEPS) as i64;
        let backoff = i64::try_from(self.config.retry_backoff.as_millis()).unwrap_or(i64::MAX);
        let retry_at = now.saturating_add(backoff.saturating_mul(steps));
        self.store.transaction(|conn| {
            sqlite_store::record_settlement_failure(conn, id, &err.to_string(), retry_at)
        })?;
        Ok(())
    }

    /// Sweep forever. The first pass runs immediately, which settles any
    /// trade that came due while the process was down.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        info!("Settlement sweeper started (every {:?})", interval);
        loop {
            let now = chrono::Utc::now().timestamp_millis();
            match self.sweep_due(now) {
                Ok(report) if report.settled > 0 || report.failed > 0 => {
                    debug!(
                        "Sweep settled {} trades, {} failed",
                        report.settled, report.failed
                    );
                }
                Ok(_) => {}
                Err(e) => error!("Settlement sweep error: {}", e),
            }
            tokio::time::sleep(interval).await;
        }
    }

    // ===== Queries =====

    pub fn get(&self, id: &str) -> Result<Trade> {
        self.store
            .read(|conn| sqlite_store::get_trade(conn, id))?
            .ok_or_else(|| AppError::NotFound(format!("trade {}", id)))
    }

    /// A trade owned by `user_id`. Other users' trades read as not found.
    pub fn get_for_user(&self, user_id: &str, id: &str) -> Result<Trade> {
        let trade = self.get(id)?;
        if trade.user_id != user_id {
            return Err(AppError::NotFound(format!("trade {}", id)));
        }
        Ok(trade)
    }

    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<Trade>> {
        self.store
            .read(|conn| sqlite_store::list_trades(conn, Some(user_id)))
    }

    pub fn list_all(&self) -> Result<Vec<Trade>> {
        self.store.read(|conn| sqlite_store::list_trades(conn, None))
    }
}
