//! # state
//!
//! AppState: feed caches, portfolio service และ watchlist store ที่ทุก
//! handler ใช้ร่วมกันผ่าน `State<SharedState>`

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::engine::PortfolioService;
use crate::feed::{FeedSource, HttpFeedSource, MarketFeed};
use crate::models::{IndexRecord, StockRecord};
use crate::store::{LedgerRepository, WatchlistRepository};

// ─── AppState ─────────────────────────────────────────────────────────────────

/// Top-level shared state injected into every Axum handler.
pub struct AppState {
    // ── Market Data ───────────────────────────────────────────────────────────
    /// Process-wide, read-many / write-rare. Snapshot swaps are atomic.
    pub stocks:  Arc<MarketFeed<StockRecord>>,
    pub indices: Arc<MarketFeed<IndexRecord>>,

    // ── Ledger ────────────────────────────────────────────────────────────────
    pub portfolio: Arc<PortfolioService>,
    pub watchlist: Arc<dyn WatchlistRepository>,

    // ── Auth ──────────────────────────────────────────────────────────────────
    pub api_key: Option<String>,
}

/// Convenience type alias
pub type SharedState = Arc<AppState>;

/// Storage backends handed to [`build_state`].
pub struct Stores {
    pub ledgers:   Arc<dyn LedgerRepository>,
    pub watchlist: Arc<dyn WatchlistRepository>,
}

/// Wire the HTTP feed sources, caches and portfolio service from config.
pub fn build_state(
    config: &AppConfig,
    stores: Stores,
    clock:  Arc<dyn Clock>,
    http:   reqwest::Client,
) -> SharedState {
    let stock_source: Arc<dyn FeedSource> =
        Arc::new(HttpFeedSource::new(http.clone(), config.stocks_urls.clone(), config.feed_timeout));
    let index_source: Arc<dyn FeedSource> =
        Arc::new(HttpFeedSource::new(http, config.indices_urls.clone(), config.feed_timeout));

    Arc::new(AppState {
        stocks:    Arc::new(MarketFeed::new(stock_source, clock.clone(), config.feed_ttl)),
        indices:   Arc::new(MarketFeed::new(index_source, clock.clone(), config.feed_ttl)),
        portfolio: Arc::new(PortfolioService::new(stores.ledgers, clock, config.initial_balance)),
        watchlist: stores.watchlist,
        api_key:   config.api_key.clone(),
    })
}
