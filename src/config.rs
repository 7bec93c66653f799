//! # config — อ่าน Config จาก Environment Variables
//!
//! `.env` is loaded by `main` via `dotenvy` before this runs.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;

/// Starting virtual cash for a new account (₹).
pub const DEFAULT_INITIAL_BALANCE: f64 = 100_000.0;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr:       SocketAddr,
    /// Primary URL first, fallback second. Empty = feed never fetches.
    pub stocks_urls:     Vec<String>,
    pub indices_urls:    Vec<String>,
    pub feed_ttl:        Duration,
    pub feed_timeout:    Duration,
    /// `None` = lazy refresh on read only.
    pub feed_poll:       Option<Duration>,
    pub initial_balance: f64,
    /// `None` = dev mode, no `X-API-Key` check.
    pub api_key:         Option<String>,
    pub database_url:    Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value lookup (tests pass a map).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let secs = |key: &str, default: u64| -> anyhow::Result<u64> {
            match var(key) {
                Some(raw) => raw.parse().with_context(|| format!("{key} must be a whole number of seconds, got '{raw}'")),
                None => Ok(default),
            }
        };

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:5000".to_string())
            .parse()
            .context("BIND_ADDR must be host:port")?;

        let initial_balance = match var("INITIAL_BALANCE") {
            Some(raw) => raw.parse::<f64>().context("INITIAL_BALANCE must be a number")?,
            None => DEFAULT_INITIAL_BALANCE,
        };
        if !initial_balance.is_finite() || initial_balance < 0.0 {
            anyhow::bail!("INITIAL_BALANCE must be a non-negative number, got {initial_balance}");
        }

        let ttl_secs = secs("FEED_TTL_SECS", 30)?;
        if ttl_secs == 0 {
            anyhow::bail!("FEED_TTL_SECS must be greater than zero");
        }

        let poll_secs = secs("FEED_POLL_SECS", 0)?;

        Ok(Self {
            bind_addr,
            stocks_urls:  [var("STOCKS_CSV_URL"), var("STOCKS_CSV_FALLBACK_URL")].into_iter().flatten().collect(),
            indices_urls: [var("INDICES_CSV_URL"), var("INDICES_CSV_FALLBACK_URL")].into_iter().flatten().collect(),
            feed_ttl:     Duration::from_secs(ttl_secs),
            feed_timeout: Duration::from_secs(secs("FEED_TIMEOUT_SECS", 10)?),
            feed_poll:    (poll_secs > 0).then(|| Duration::from_secs(poll_secs)),
            initial_balance,
            api_key:      var("API_KEY"),
            database_url: var("DATABASE_URL"),
        })
    }
}
