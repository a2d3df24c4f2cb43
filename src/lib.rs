//! TopTrades - deposit, withdrawal and simulated trade settlement server

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

use axum::Router;
use config::Config;
use services::{
    AdminService, AuthService, CurrencyCatalog, DepositWorkflow, Ledger, OutcomeSource,
    RandomOutcome, SettlementEngine, SqliteStore, WithdrawalWorkflow,
};
use sources::PriceFeed;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<SqliteStore>,
    pub auth: AuthService,
    pub ledger: Ledger,
    pub deposits: DepositWorkflow,
    pub withdrawals: WithdrawalWorkflow,
    pub settlement: Arc<SettlementEngine>,
    pub catalog: CurrencyCatalog,
    pub admin: AdminService,
    pub price_feed: Arc<dyn PriceFeed>,
}

impl AppState {
    /// Wire every service onto one store. Outcomes are drawn at the
    /// configured win probability.
    pub fn new(config: Config, store: Arc<SqliteStore>, price_feed: Arc<dyn PriceFeed>) -> Self {
        let outcomes = Arc::new(RandomOutcome::new(config.trading.win_probability));
        Self::with_outcomes(config, store, price_feed, outcomes)
    }

    pub fn with_outcomes(
        config: Config,
        store: Arc<SqliteStore>,
        price_feed: Arc<dyn PriceFeed>,
        outcomes: Arc<dyn OutcomeSource>,
    ) -> Self {
        let auth = AuthService::new(
            store.clone(),
            config.admin_token.clone(),
            config.session_ttl,
        );
        Self::assemble(config, store, price_feed, outcomes, auth)
    }

    /// Like [`AppState::with_outcomes`] with a caller-built auth service.
    pub fn assemble(
        config: Config,
        store: Arc<SqliteStore>,
        price_feed: Arc<dyn PriceFeed>,
        outcomes: Arc<dyn OutcomeSource>,
        auth: AuthService,
    ) -> Self {
        let settlement = Arc::new(SettlementEngine::new(
            store.clone(),
            outcomes,
            config.trading.clone(),
        ));

        Self {
            ledger: Ledger::new(store.clone()),
            deposits: DepositWorkflow::new(store.clone(), config.deposits.clone()),
            withdrawals: WithdrawalWorkflow::new(store.clone(), config.withdrawals.clone()),
            catalog: CurrencyCatalog::new(store.clone()),
            admin: AdminService::new(store.clone(), auth.clone()),
            settlement,
            auth,
            store,
            price_feed,
            config: Arc::new(config),
        }
    }
}

/// Build the full HTTP application.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
