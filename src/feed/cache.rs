//! # feed::cache
//!
//! [`MarketFeed`]: last-known-good snapshot ของ feed หนึ่งชุด (stocks หรือ
//! indices) พร้อม TTL
//!
//! ## State Machine
//! ```text
//!   EMPTY ──fetch ok──▶ FRESH ──age ≥ TTL──▶ STALE ──fetch ok──▶ FRESH ...
//!     │                                         │
//!     └──fetch fail──▶ EMPTY (serve [])         └──fetch fail──▶ STALE (serve old)
//! ```
//!
//! * Reads never fail. A failed refresh is logged and recorded in
//!   [`FeedStatus`]; callers keep getting the previous snapshot.
//! * Every read in EMPTY or STALE attempts a refetch, including right after a
//!   failed one. Concurrent readers share that single attempt.
//! * The snapshot is an `Arc` swapped under a write lock. Readers holding the
//!   old `Arc` keep a complete list; nobody ever sees a half-written one.
//! * Refreshes are single-flight via `refresh_lock`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::{parse_feed, FeedError, FeedRecord, FeedSource};
use crate::clock::Clock;

// ─── Snapshot ─────────────────────────────────────────────────────────────────

/// One complete, immutable fetch result.
#[derive(Debug, Clone)]
pub struct FeedSnapshot<T> {
    pub records:    Vec<T>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedState {
    Empty,
    Fresh,
    Stale,
}

/// What a reader gets back: the snapshot (if any) and its freshness at read
/// time.
#[derive(Debug, Clone)]
pub struct FeedRead<T> {
    pub snapshot: Option<Arc<FeedSnapshot<T>>>,
    pub state:    FeedState,
}

impl<T> FeedRead<T> {
    pub fn records(&self) -> &[T] {
        self.snapshot.as_deref().map(|s| s.records.as_slice()).unwrap_or(&[])
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.as_ref().map(|s| s.fetched_at)
    }

    pub fn is_stale(&self) -> bool {
        self.state != FeedState::Fresh
    }
}

// ─── Status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStatus {
    pub kind:                 &'static str,
    pub source:               String,
    pub state:                FeedState,
    pub fetched_at:           Option<DateTime<Utc>>,
    pub age_secs:             Option<i64>,
    pub ttl_secs:             i64,
    pub record_count:         usize,
    pub dropped_rows:         usize,
    pub consecutive_failures: u32,
    pub last_error:           Option<String>,
    pub last_failure_at:      Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Health {
    consecutive_failures: u32,
    last_error:           Option<String>,
    last_failure_at:      Option<DateTime<Utc>>,
    dropped_rows:         usize,
}

// ─── MarketFeed ───────────────────────────────────────────────────────────────

pub struct MarketFeed<T: FeedRecord> {
    source:       Arc<dyn FeedSource>,
    clock:        Arc<dyn Clock>,
    ttl:          Duration,
    snapshot:     RwLock<Option<Arc<FeedSnapshot<T>>>>,
    health:       RwLock<Health>,
    refresh_lock: Mutex<()>,
}

impl<T: FeedRecord> MarketFeed<T> {
    pub fn new(source: Arc<dyn FeedSource>, clock: Arc<dyn Clock>, ttl: std::time::Duration) -> Self {
        Self {
            source,
            clock,
            ttl: Duration::from_std(ttl).unwrap_or(Duration::seconds(30)),
            snapshot: RwLock::new(None),
            health: RwLock::new(Health::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    fn state_at(&self, snapshot: Option<&FeedSnapshot<T>>, now: DateTime<Utc>) -> FeedState {
        match snapshot {
            None => FeedState::Empty,
            Some(s) if now - s.fetched_at < self.ttl => FeedState::Fresh,
            Some(_) => FeedState::Stale,
        }
    }

    /// Current snapshot without triggering a fetch.
    pub async fn peek(&self) -> FeedRead<T> {
        let snapshot = self.snapshot.read().await.clone();
        let state = self.state_at(snapshot.as_deref(), self.clock.now());
        FeedRead { snapshot, state }
    }

    pub async fn state(&self) -> FeedState {
        self.peek().await.state
    }

    /// Read the feed, refreshing first if the snapshot is missing or stale.
    pub async fn read(&self) -> FeedRead<T> {
        if self.needs_refresh().await {
            let _guard = self.refresh_lock.lock().await;
            // อาจมี task อื่น refresh เสร็จไปแล้วระหว่างรอ lock
            if self.needs_refresh().await {
                // Failure is already logged + recorded; serve whatever we hold.
                let _ = self.refresh_locked().await;
            }
        }
        self.peek().await
    }

    /// Look up one record by symbol (case-insensitive) from a fresh-or-stale read.
    pub async fn find(&self, symbol: &str) -> Option<T> {
        let wanted = symbol.trim().to_uppercase();
        self.read()
            .await
            .records()
            .iter()
            .find(|r| r.symbol() == wanted)
            .cloned()
    }

    /// Force a refetch regardless of freshness. Returns the new record count.
    pub async fn refresh(&self) -> Result<usize, FeedError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn needs_refresh(&self) -> bool {
        let now = self.clock.now();
        self.state_at(self.snapshot.read().await.as_deref(), now) != FeedState::Fresh
    }

    /// Caller must hold `refresh_lock`.
    async fn refresh_locked(&self) -> Result<usize, FeedError> {
        let outcome = match self.source.fetch().await {
            Ok(body) => parse_feed::<T>(&body),
            Err(e) => Err(e),
        };
        let now = self.clock.now();

        match outcome {
            Ok(resolution) => {
                let count = resolution.records.len();
                let fresh = Arc::new(FeedSnapshot { records: resolution.records, fetched_at: now });
                *self.snapshot.write().await = Some(fresh);

                let mut health = self.health.write().await;
                let recovered_after = health.consecutive_failures;
                *health = Health { dropped_rows: resolution.dropped, ..Health::default() };

                info!(
                    kind    = T::KIND,
                    records = count,
                    dropped = resolution.dropped,
                    recovered_after,
                    "✅ Feed refreshed"
                );
                Ok(count)
            }
            Err(e) => {
                let serving = self.snapshot.read().await.as_ref().map(|s| s.records.len()).unwrap_or(0);
                let mut health = self.health.write().await;
                health.consecutive_failures += 1;
                health.last_error = Some(e.to_string());
                health.last_failure_at = Some(now);

                warn!(
                    kind     = T::KIND,
                    source   = %self.source.describe(),
                    error    = %e,
                    failures = health.consecutive_failures,
                    serving,
                    "⚠️ Feed refresh failed — serving last good snapshot"
                );
                Err(e)
            }
        }
    }

    pub async fn status(&self) -> FeedStatus {
        let now = self.clock.now();
        let snapshot = self.snapshot.read().await.clone();
        let health = self.health.read().await;

        FeedStatus {
            kind:                 T::KIND,
            source:               self.source.describe(),
            state:                self.state_at(snapshot.as_deref(), now),
            fetched_at:           snapshot.as_ref().map(|s| s.fetched_at),
            age_secs:             snapshot.as_ref().map(|s| (now - s.fetched_at).num_seconds()),
            ttl_secs:             self.ttl.num_seconds(),
            record_count:         snapshot.as_ref().map(|s| s.records.len()).unwrap_or(0),
            dropped_rows:         health.dropped_rows,
            consecutive_failures: health.consecutive_failures,
            last_error:           health.last_error.clone(),
            last_failure_at:      health.last_failure_at,
        }
    }
}
