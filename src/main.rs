use std::sync::Arc;
use toptrades::config::Config;
use toptrades::services::SqliteStore;
use toptrades::sources::CoinGeckoClient;
use toptrades::AppState;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired sessions are dropped.
const SESSION_PURGE_SECS: u64 = 600;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toptrades=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    info!("Starting TopTrades server on {}:{}", config.host, config.port);
    if Config::admin_token_generated() {
        warn!("ADMIN_TOKEN not set; generated admin token {}", config.admin_token);
    }

    let store = Arc::new(SqliteStore::new(&config.database_path)?);
    let feed = Arc::new(CoinGeckoClient::new(config.coingecko_api_key.clone()));
    let state = AppState::new(config.clone(), store, feed);

    // Seed the catalog and give unpriced pairs a mock price until the first refresh
    state.catalog.seed_defaults()?;
    state.catalog.apply_mock_prices()?;

    // Settlement sweeper (first pass recovers trades that came due while offline)
    {
        let engine = state.settlement.clone();
        let interval = config.settlement_sweep_interval;
        tokio::spawn(engine.run(interval));
    }

    // Catalog price refresh
    {
        let catalog = state.catalog.clone();
        let feed = state.price_feed.clone();
        let interval = config.price_refresh_interval;
        tokio::spawn(async move {
            loop {
                match catalog.refresh_prices(feed.as_ref()).await {
                    Ok(outcome) => debug!(
                        "Price refresh: {:?}, {} pairs updated",
                        outcome.source, outcome.updated
                    ),
                    Err(e) => error!("Price refresh failed: {}", e),
                }
                tokio::time::sleep(interval).await;
            }
        });
    }

    // Expired session cleanup
    {
        let auth = state.auth.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(SESSION_PURGE_SECS)).await;
                let purged = auth.purge_expired();
                if purged > 0 {
                    debug!("Purged {} expired sessions", purged);
                }
            }
        });
    }

    let app = toptrades::app(state);

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("TopTrades server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
