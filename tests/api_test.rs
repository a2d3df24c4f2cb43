//! HTTP tests against the in-process router.
//!
//! Each test builds a fresh app on an in-memory store with a fixed trade
//! outcome and a price feed that is always down.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use toptrades::config::Config;
use toptrades::error::{AppError, Result};
use toptrades::services::{AuthService, FixedOutcome, SqliteStore};
use toptrades::sources::PriceFeed;
use toptrades::types::{PriceQuote, TradeOutcome};
use toptrades::AppState;
use tower::ServiceExt;

const ADMIN_TOKEN: &str = "test-admin-token";

/// Money fields are exact decimal strings on the wire.
fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .unwrap_or_else(|| panic!("expected a decimal string, got {}", value))
        .parse()
        .unwrap()
}

struct OfflineFeed;

#[async_trait]
impl PriceFeed for OfflineFeed {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn fetch_quotes(&self, _symbols: &[String]) -> Result<Vec<PriceQuote>> {
        Err(AppError::UpstreamUnavailable("offline".to_string()))
    }
}

struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    fn new(outcome: TradeOutcome) -> Self {
        let config = Config {
            admin_token: ADMIN_TOKEN.to_string(),
            ..Config::default()
        };
        let store = Arc::new(SqliteStore::new_in_memory().unwrap());
        let auth = AuthService::new(
            store.clone(),
            ADMIN_TOKEN.to_string(),
            Duration::from_secs(3600),
        )
        .with_hash_cost(4);
        let state = AppState::assemble(
            config,
            store,
            Arc::new(OfflineFeed),
            Arc::new(FixedOutcome(outcome)),
            auth,
        );
        state.catalog.seed_defaults().unwrap();

        Self {
            router: toptrades::app(state.clone()),
            state,
        }
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Register a user and return (session token, user id).
    async fn register(&self, email: &str) -> (String, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({"name": "Grace", "email": email, "password": "secret1"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        (
            body["data"]["sessionToken"].as_str().unwrap().to_string(),
            body["data"]["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    async fn balance(&self, token: &str) -> Decimal {
        let (status, body) = self.call(Method::GET, "/api/auth/me", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        decimal(&body["data"]["balance"])
    }
}

// ============================================================================
// Health & Auth
// ============================================================================

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::new(TradeOutcome::Loss);
    let (status, body) = app.call(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_login_logout() {
    let app = TestApp::new(TradeOutcome::Loss);
    app.register("grace@example.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"name": "Again", "email": "GRACE@example.com", "password": "secret1"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "EMAIL_TAKEN");

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "grace@example.com", "password": "secret1"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["sessionToken"].as_str().unwrap().to_string();
    assert_eq!(app.balance(&token).await, dec!(0));

    let (status, _) = app.call(Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_require_admin_token() {
    let app = TestApp::new(TradeOutcome::Loss);
    let (user_token, _) = app.register("h@example.com").await;

    let (status, _) = app.call(Method::GET, "/api/admin/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call(Method::GET, "/api/admin/users", Some(&user_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, body) = app
        .call(Method::GET, "/api/admin/users", Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

// ============================================================================
// Money Flows
// ============================================================================

#[tokio::test]
async fn deposit_confirmation_credits_balance() {
    let app = TestApp::new(TradeOutcome::Loss);
    let (token, _) = app.register("i@example.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/deposits",
            Some(&token),
            Some(json!({"amount": 100, "method": "bank transfer"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let deposit_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, queue) = app
        .call(Method::GET, "/api/admin/deposits?status=pending", Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(queue["data"][0]["id"], deposit_id.as_str());
    assert_eq!(queue["data"][0]["userName"], "Grace");

    let uri = format!("/api/admin/deposits/{}", deposit_id);
    let (status, body) = app
        .call(Method::PATCH, &uri, Some(ADMIN_TOKEN), Some(json!({"status": "confirmed"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "confirmed");
    assert_eq!(app.balance(&token).await, dec!(100));

    let (status, body) = app
        .call(Method::PATCH, &uri, Some(ADMIN_TOKEN), Some(json!({"status": "rejected"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_TRANSITION");
    assert_eq!(app.balance(&token).await, dec!(100));
}

#[tokio::test]
async fn withdrawal_over_balance_is_rejected() {
    let app = TestApp::new(TradeOutcome::Loss);
    let (token, user_id) = app.register("j@example.com").await;
    app.state
        .ledger
        .set_balance(&user_id, dec!(100))
        .unwrap();

    let (status, body) = app
        .call(
            Method::POST,
            "/api/withdrawals",
            Some(&token),
            Some(json!({"amount": 150, "walletAddress": "0xfeed"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INSUFFICIENT_FUNDS");
    assert_eq!(app.balance(&token).await, dec!(100));
}

#[tokio::test]
async fn winning_trade_round_trip() {
    let app = TestApp::new(TradeOutcome::Win);
    let (token, user_id) = app.register("k@example.com").await;
    let (status, _) = app
        .call(
            Method::PATCH,
            &format!("/api/admin/users/{}/balance", user_id),
            Some(ADMIN_TOKEN),
            Some(json!({"balance": 100})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/trades",
            Some(&token),
            Some(json!({
                "currencyPair": "BTC/USDT",
                "type": "up",
                "amount": 50,
                "duration": "15s",
                "leverage": "1/2"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["status"], "open");
    let trade_id = body["data"]["id"].as_str().unwrap().to_string();
    let settle_at = body["data"]["settleAt"].as_i64().unwrap();
    assert_eq!(app.balance(&token).await, dec!(50));

    app.state.settlement.sweep_due(settle_at).unwrap();

    let (status, body) = app
        .call(Method::GET, &format!("/api/trades/{}", trade_id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(decimal(&body["data"]["profitLoss"]), dec!(10));
    assert_eq!(app.balance(&token).await, dec!(110));
}

#[tokio::test]
async fn trade_below_minimum_stake_is_rejected() {
    let app = TestApp::new(TradeOutcome::Win);
    let (token, user_id) = app.register("l@example.com").await;
    app.state
        .ledger
        .set_balance(&user_id, dec!(100))
        .unwrap();

    let (status, body) = app
        .call(
            Method::POST,
            "/api/trades",
            Some(&token),
            Some(json!({"currencyPair": "BTC/USDT", "type": "down", "amount": 5})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(app.balance(&token).await, dec!(100));
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn catalog_listing_and_admin_mutations() {
    let app = TestApp::new(TradeOutcome::Loss);

    let (status, body) = app
        .call(Method::GET, "/api/currency-pairs?grouped=true&listed=true", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["USDT"].as_array().unwrap().len(), 6);
    assert_eq!(body["data"]["NFT"].as_array().unwrap().len(), 6);

    let pair = json!({"name": "SOL/USDT", "category": "USDT"});
    let (status, _) = app
        .call(Method::POST, "/api/currency-pairs", None, Some(pair.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call(Method::POST, "/api/currency-pairs", Some(ADMIN_TOKEN), Some(pair.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let sol_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .call(Method::POST, "/api/currency-pairs", Some(ADMIN_TOKEN), Some(pair))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/api/currency-pairs/{}/toggle", sol_id),
            Some(ADMIN_TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], false);

    let (_, body) = app
        .call(Method::GET, "/api/currency-pairs?listed=true", None, None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 18);

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/currency-pairs/{}", sol_id),
            Some(ADMIN_TOKEN),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn refresh_falls_back_when_feed_is_down() {
    let app = TestApp::new(TradeOutcome::Loss);

    let (status, body) = app
        .call(Method::POST, "/api/currency-pairs/refresh", Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["source"], "fallback");
    assert_eq!(body["data"]["updated"], 18);

    let btc = app.state.catalog.find_by_name("BTC/USDT").unwrap().unwrap();
    assert_eq!(btc.price, dec!(89500));
}

#[tokio::test]
async fn dashboard_summarises_activity() {
    let app = TestApp::new(TradeOutcome::Loss);
    let (token, _) = app.register("m@example.com").await;
    app.call(
        Method::POST,
        "/api/deposits",
        Some(&token),
        Some(json!({"amount": 25, "method": "card"})),
    )
    .await;

    let (status, body) = app
        .call(Method::GET, "/api/admin/dashboard", Some(ADMIN_TOKEN), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stats"]["totalUsers"], 1);
    assert_eq!(body["data"]["stats"]["pendingDeposits"], 1);
    assert_eq!(body["data"]["recentActivity"][0]["type"], "deposit");
}

#[tokio::test]
async fn large_balances_keep_every_digit() {
    let app = TestApp::new(TradeOutcome::Loss);
    let (token, user_id) = app.register("n@example.com").await;

    let (status, body) = app
        .call(
            Method::PATCH,
            &format!("/api/admin/users/{}/balance", user_id),
            Some(ADMIN_TOKEN),
            Some(json!({"balance": "12345678901234567.89"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["balance"], "12345678901234567.89");
    assert_eq!(app.balance(&token).await, dec!(12345678901234567.89));
}

#[tokio::test]
async fn oversized_requests_are_rejected_cleanly() {
    let app = TestApp::new(TradeOutcome::Loss);
    let (token, user_id) = app.register("o@example.com").await;
    app.state.ledger.set_balance(&user_id, dec!(100)).unwrap();

    let (status, body) = app
        .call(
            Method::POST,
            "/api/deposits",
            Some(&token),
            Some(json!({"amount": "79228162514264337593543950335", "method": "card"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = app
        .call(
            Method::POST,
            "/api/trades",
            Some(&token),
            Some(json!({
                "currencyPair": "BTC/USDT",
                "type": "up",
                "amount": 10,
                "duration": "9223372036854775s"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    // The store still serves requests afterwards.
    assert_eq!(app.balance(&token).await, dec!(100));
}
