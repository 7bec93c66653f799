//! # papertrade — server entry point
//!
//! ## Environment Variables
//!
//! | Variable                   | Default         | Description                        |
//! |----------------------------|-----------------|------------------------------------|
//! | `BIND_ADDR`                | `0.0.0.0:5000`  | Address Axum listens on            |
//! | `STOCKS_CSV_URL`           | —               | Published stocks sheet (CSV)       |
//! | `STOCKS_CSV_FALLBACK_URL`  | —               | Tried when the primary fails       |
//! | `INDICES_CSV_URL`          | —               | Published indices sheet (CSV)      |
//! | `INDICES_CSV_FALLBACK_URL` | —               | Tried when the primary fails       |
//! | `FEED_TTL_SECS`            | `30`            | Snapshot freshness window          |
//! | `FEED_TIMEOUT_SECS`        | `10`            | Per-request upstream timeout       |
//! | `FEED_POLL_SECS`           | `0` (off)       | Background refresh interval        |
//! | `INITIAL_BALANCE`          | `100000`        | Starting cash for new users (₹)    |
//! | `API_KEY`                  | —               | Require `X-API-Key` when set       |
//! | `DATABASE_URL`             | —               | PostgreSQL (`postgres` feature)    |
//! | `RUST_LOG`                 | `papertrade=debug` | Tracing filter                  |

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use papertrade::{
    build_router,
    clock::SystemClock,
    config::AppConfig,
    feed::poller::spawn_poller,
    state::{build_state, Stores},
    store::MemoryStore,
};

// ─── Entry Point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env (optional, CI/prod use real env vars) ──────────────
    dotenvy::dotenv().ok();

    // ── 2. Initialise structured logging ─────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env()
            .add_directive("papertrade=debug".parse()?)
            .add_directive("tower_http=info".parse()?))
        .init();

    info!(
        r#"

  ╔═══════════════════════════════════════════════╗
  ║        PAPERTRADE — Paper Trading Backend     ║
  ║        Rust + Axum  ·  CSV Feed & Ledger      ║
  ╚═══════════════════════════════════════════════╝"#
    );

    // ── 3. Config ────────────────────────────────────────────────────────────
    let config = AppConfig::from_env()?;

    if config.stocks_urls.is_empty() {
        warn!("⚠️  STOCKS_CSV_URL not set — stock feed will stay empty");
    }
    if config.indices_urls.is_empty() {
        warn!("⚠️  INDICES_CSV_URL not set — index feed will stay empty");
    }
    if config.api_key.is_none() {
        warn!("⚠️  API_KEY not set — running in dev mode (no auth)");
    }

    // ── 4. Storage ───────────────────────────────────────────────────────────
    let stores = open_stores(&config).await?;

    // ── 5. Build shared state ────────────────────────────────────────────────
    let state = build_state(&config, stores, Arc::new(SystemClock), reqwest::Client::new());

    if let Some(every) = config.feed_poll {
        spawn_poller(state.stocks.clone(), state.indices.clone(), every);
    }

    // ── 6. Router ────────────────────────────────────────────────────────────
    let app = build_router(state);

    info!(addr = ?config.bind_addr, initial_balance = config.initial_balance, "🚀 Papertrade server starting");

    // ── 7. Start the server ──────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "postgres")]
async fn open_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    use papertrade::store::PgStore;

    if let Some(url) = config.database_url.as_deref() {
        let pg = Arc::new(PgStore::connect(url).await?);
        info!("🗄️  Ledger store: PostgreSQL");
        return Ok(Stores { ledgers: pg.clone(), watchlist: pg });
    }
    Ok(memory_stores())
}

#[cfg(not(feature = "postgres"))]
async fn open_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    if config.database_url.is_some() {
        warn!("⚠️  DATABASE_URL ignored — built without the `postgres` feature");
    }
    Ok(memory_stores())
}

fn memory_stores() -> Stores {
    let memory = Arc::new(MemoryStore::default());
    info!("🗄️  Ledger store: in-memory (lost on restart)");
    Stores { ledgers: memory.clone(), watchlist: memory }
}
