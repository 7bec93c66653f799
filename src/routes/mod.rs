pub mod health;
pub mod leaderboard;
pub mod portfolio;
pub mod stocks;
pub mod watchlist;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth::require_api_key, state::SharedState};

use health::health_check;
use leaderboard::get_leaderboard;
use portfolio::{buy, get_portfolio, get_summary, get_transactions, sell};
use stocks::{feed_status, get_stock, list_indices, list_stocks, refresh_feeds, search_stocks};
use watchlist::{add_to_watchlist, get_watchlist, remove_from_watchlist};

// ─── Router ───────────────────────────────────────────────────────────────────

/// Static segments win over `:param` captures, so `/stocks/all` never reaches
/// `get_stock` and `/portfolio/transactions/:userId` never reaches
/// `get_portfolio`.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health",                          get(health_check))
        // ── Market Data ──────────────────────────────────────────────────────
        .route("/stocks/all",                      get(list_stocks))
        .route("/stocks/search/query",             get(search_stocks))
        .route("/stocks/indices/all",              get(list_indices))
        .route("/stocks/feed/status",              get(feed_status))
        .route("/stocks/refresh",                  post(refresh_feeds))
        .route("/stocks/:symbol",                  get(get_stock))
        // ── Ledger ───────────────────────────────────────────────────────────
        .route("/portfolio/buy",                   post(buy))
        .route("/portfolio/sell",                  post(sell))
        .route("/portfolio/transactions/:userId",  get(get_transactions))
        .route("/portfolio/:userId",               get(get_portfolio))
        .route("/portfolio/:userId/summary",       get(get_summary))
        .route("/watchlist/add",                   post(add_to_watchlist))
        .route("/watchlist/remove",                post(remove_from_watchlist))
        .route("/watchlist/:userId",               get(get_watchlist))
        .route("/leaderboard",                     get(get_leaderboard))
        // ── Middleware ───────────────────────────────────────────────────────
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::clock::ManualClock;
    use crate::engine::PortfolioService;
    use crate::feed::{source::ScriptedSource, FeedError, MarketFeed};
    use crate::state::AppState;
    use crate::store::MemoryStore;

    const STOCKS: &str = "\
SYMBOL,Name,CURRENT PRICE,Sector\n\
INFY,Infosys,50,IT\n\
TCS,Tata Consultancy,100,IT\n\
HDFCBANK,HDFC Bank,75,Banking\n";

    const INDICES: &str = "Symbol,Price\nNIFTY 50,22000\nSENSEX,73000\n";

    struct Harness {
        app:    Router,
        stocks: Arc<ScriptedSource>,
        clock:  ManualClock,
    }

    fn harness_with(stocks: ScriptedSource, api_key: Option<&str>) -> Harness {
        let clock = ManualClock::default();
        let ttl = std::time::Duration::from_secs(30);
        let stocks = Arc::new(stocks);
        let store = Arc::new(MemoryStore::default());

        let state = Arc::new(AppState {
            stocks:    Arc::new(MarketFeed::new(stocks.clone(), Arc::new(clock.clone()), ttl)),
            indices:   Arc::new(MarketFeed::new(
                Arc::new(ScriptedSource::always(INDICES)),
                Arc::new(clock.clone()),
                ttl,
            )),
            portfolio: Arc::new(PortfolioService::new(store.clone(), Arc::new(clock.clone()), 1000.0)),
            watchlist: store,
            api_key:   api_key.map(str::to_string),
        });

        Harness { app: build_router(state), stocks, clock }
    }

    fn harness() -> Harness {
        harness_with(ScriptedSource::always(STOCKS), None)
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        call_with_key(app, method, uri, body, None).await
    }

    async fn call_with_key(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
        key: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            req = req.header("X-API-Key", key);
        }
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };

        let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn trade(user: &str, symbol: &str, quantity: i64, price: f64) -> Option<Value> {
        Some(json!({ "userId": user, "symbol": symbol, "quantity": quantity, "price": price }))
    }

    // ─── Market Data ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_list_stocks() {
        let h = harness();
        let (status, body) = call(&h.app, "GET", "/stocks/all", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 3);
        assert_eq!(body["stale"], false);
        assert_eq!(body["data"][0]["symbol"], "INFY");
        assert_eq!(body["data"][0]["price"], 50.0);
        assert_eq!(body["data"][0]["changePercent"], 0.0);
    }

    #[tokio::test]
    async fn test_get_stock_case_insensitive_and_unknown() {
        let h = harness();

        let (status, body) = call(&h.app, "GET", "/stocks/tcs", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Tata Consultancy");

        let (status, body) = call(&h.app, "GET", "/stocks/NOPE", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_search_stocks() {
        let h = harness();

        let (status, body) = call(&h.app, "GET", "/stocks/search/query?q=bank", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["symbol"], "HDFCBANK");

        let (status, _) = call(&h.app, "GET", "/stocks/search/query?q=%20", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&h.app, "GET", "/stocks/search/query", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_indices() {
        let h = harness();
        let (status, body) = call(&h.app, "GET", "/stocks/indices/all", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["data"][1]["symbol"], "SENSEX");
        assert!(body["data"][1].get("volume").is_none());
    }

    #[tokio::test]
    async fn test_stale_snapshot_served_after_upstream_failure() {
        let h = harness_with(
            ScriptedSource::new(vec![Ok(STOCKS.to_string()), Err(FeedError::Status(503))]),
            None,
        );

        let (_, first) = call(&h.app, "GET", "/stocks/all", None).await;
        h.clock.advance(chrono::Duration::seconds(31));
        let (status, second) = call(&h.app, "GET", "/stocks/all", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["count"], 3);
        assert_eq!(second["stale"], true);
        assert_eq!(second["updatedAt"], first["updatedAt"]);
        assert_eq!(h.stocks.calls(), 2);

        let (_, status_body) = call(&h.app, "GET", "/stocks/feed/status", None).await;
        assert_eq!(status_body["data"]["stocks"]["state"], "STALE");
        assert_eq!(status_body["data"]["stocks"]["consecutiveFailures"], 1);
    }

    #[tokio::test]
    async fn test_unreachable_feed_returns_empty_list() {
        let h = harness_with(ScriptedSource::new(vec![Err(FeedError::Timeout(std::time::Duration::from_secs(10)))]), None);
        let (status, body) = call(&h.app, "GET", "/stocks/all", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
        assert_eq!(body["updatedAt"], Value::Null);
    }

    #[tokio::test]
    async fn test_forced_refresh_reports_per_feed() {
        let h = harness();
        let (status, body) = call(&h.app, "POST", "/stocks/refresh", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["stocks"]["ok"], true);
        assert_eq!(body["data"]["stocks"]["records"], 3);
        assert_eq!(body["data"]["indices"]["records"], 2);
    }

    // ─── Ledger ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_buy_then_sell_round_trip() {
        let h = harness();

        let (status, body) = call(&h.app, "POST", "/portfolio/buy", trade("u1", "infy", 10, 50.0)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["type"], "BUY");
        assert_eq!(body["data"]["symbol"], "INFY");
        assert_eq!(body["data"]["total"], 500.0);

        let (_, body) = call(&h.app, "GET", "/portfolio/u1", None).await;
        assert_eq!(body["data"]["balance"], 500.0);
        assert_eq!(body["data"]["portfolio"][0]["quantity"], 10);
        assert_eq!(body["data"]["portfolio"][0]["avg_price"], 50.0);

        let (status, _) = call(&h.app, "POST", "/portfolio/sell", trade("u1", "INFY", 10, 60.0)).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(&h.app, "GET", "/portfolio/u1", None).await;
        assert_eq!(body["data"]["balance"], 1100.0);
        assert_eq!(body["data"]["portfolio"], json!([]));
    }

    #[tokio::test]
    async fn test_insufficient_balance_rejected_without_side_effects() {
        let h = harness();

        let (status, body) = call(&h.app, "POST", "/portfolio/buy", trade("u1", "TCS", 11, 100.0)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("Insufficient balance"));

        let (_, body) = call(&h.app, "GET", "/portfolio/u1", None).await;
        assert_eq!(body["data"]["balance"], 1000.0);
        let (_, body) = call(&h.app, "GET", "/portfolio/transactions/u1", None).await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_sell_without_holdings_rejected() {
        let h = harness();
        let (status, body) = call(&h.app, "POST", "/portfolio/sell", trade("u1", "INFY", 1, 50.0)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_invalid_trade_inputs() {
        let h = harness();

        let (status, _) = call(&h.app, "POST", "/portfolio/buy", trade("u1", "INFY", 0, 50.0)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&h.app, "POST", "/portfolio/buy", trade("u1", "INFY", -3, 50.0)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&h.app, "POST", "/portfolio/buy", trade("u1", "INFY", 1, 0.0)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&h.app, "POST", "/portfolio/buy", trade(" ", "INFY", 1, 10.0)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&h.app, "POST", "/portfolio/buy", Some(json!({ "userId": "u1" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_buy_without_price_uses_feed_quote() {
        let h = harness();

        let body = Some(json!({ "userId": "u1", "symbol": "TCS", "quantity": 2 }));
        let (status, resp) = call(&h.app, "POST", "/portfolio/buy", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["data"]["price"], 100.0);

        let body = Some(json!({ "userId": "u1", "symbol": "NOPE", "quantity": 2 }));
        let (status, _) = call(&h.app, "POST", "/portfolio/buy", body).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_transactions_newest_first_with_limit() {
        let h = harness();

        call(&h.app, "POST", "/portfolio/buy", trade("u1", "INFY", 1, 50.0)).await;
        h.clock.advance(chrono::Duration::seconds(1));
        call(&h.app, "POST", "/portfolio/buy", trade("u1", "TCS", 1, 100.0)).await;

        let (_, body) = call(&h.app, "GET", "/portfolio/transactions/u1", None).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["data"][0]["symbol"], "TCS");

        let (_, body) = call(&h.app, "GET", "/portfolio/transactions/u1?limit=1", None).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["symbol"], "TCS");
    }

    #[tokio::test]
    async fn test_summary_marks_to_feed_price() {
        let h = harness();
        call(&h.app, "POST", "/portfolio/buy", trade("u1", "INFY", 4, 40.0)).await;

        let (status, body) = call(&h.app, "GET", "/portfolio/u1/summary", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["balance"], 840.0);
        assert_eq!(body["data"]["holdings"][0]["currentPrice"], 50.0);
        assert_eq!(body["data"]["holdings"][0]["marketValue"], 200.0);
    }

    #[tokio::test]
    async fn test_leaderboard_orders_by_balance() {
        let h = harness();
        call(&h.app, "POST", "/portfolio/buy", trade("spender", "TCS", 5, 100.0)).await;
        call(&h.app, "POST", "/portfolio/buy", trade("saver", "INFY", 1, 50.0)).await;

        let (status, body) = call(&h.app, "GET", "/leaderboard?limit=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["userId"], "saver");
        assert_eq!(body["data"][0]["rank"], 1);
        assert_eq!(body["data"][0]["balance"], 950.0);
    }

    #[tokio::test]
    async fn test_unknown_user_reads_are_404_and_open_nothing() {
        let h = harness();

        for uri in ["/portfolio/nobody", "/portfolio/nobody/summary", "/portfolio/transactions/nobody"] {
            let (status, body) = call(&h.app, "GET", uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body["success"], false);
        }

        let (status, body) = call(&h.app, "GET", "/leaderboard", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([]));
    }

    // ─── Watchlist ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_watchlist_add_list_remove() {
        let h = harness();
        let entry = Some(json!({ "userId": "u1", "symbol": "infy" }));

        let (status, _) = call(&h.app, "POST", "/watchlist/add", entry.clone()).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&h.app, "POST", "/watchlist/add", entry.clone()).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(&h.app, "GET", "/watchlist/u1", None).await;
        assert_eq!(body["data"], json!(["INFY"]));

        let (status, _) = call(&h.app, "POST", "/watchlist/remove", entry.clone()).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&h.app, "POST", "/watchlist/remove", entry).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    // ─── Auth ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_api_key_required_when_configured() {
        let h = harness_with(ScriptedSource::always(STOCKS), Some("secret"));

        let (status, body) = call(&h.app, "GET", "/stocks/all", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = call_with_key(&h.app, "GET", "/stocks/all", None, Some("secret")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&h.app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
