//! # store — Persistence Ports
//!
//! The ledger engine never touches storage directly. Everything goes through
//! these traits so the backing store (in-memory, PostgreSQL) is swappable.
//!
//! | Impl           | Feature    | Notes                                  |
//! |----------------|------------|----------------------------------------|
//! | [`MemoryStore`]| default    | process-local, lost on restart         |
//! | `PgStore`      | `postgres` | one SQL transaction per trade commit   |

use async_trait::async_trait;
use thiserror::Error;

use crate::engine::ledger::TradeCommit;
use crate::models::UserLedger;

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no ledger for user '{0}'")]
    MissingLedger(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

// ─── Ledger ───────────────────────────────────────────────────────────────────

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn load(&self, user_id: &str) -> Result<Option<UserLedger>, StoreError>;

    /// Create the ledger with `initial_balance` if it doesn't exist yet, then
    /// return whatever is stored.
    async fn open(&self, user_id: &str, initial_balance: f64) -> Result<UserLedger, StoreError>;

    /// Persist balance, holding change and transaction as one unit. Either all
    /// three land or none do.
    async fn commit_trade(&self, user_id: &str, commit: &TradeCommit) -> Result<(), StoreError>;

    /// `(user_id, balance)` pairs, highest balance first, ties by user id.
    async fn top_balances(&self, limit: usize) -> Result<Vec<(String, f64)>, StoreError>;
}

// ─── Watchlist ────────────────────────────────────────────────────────────────

#[async_trait]
pub trait WatchlistRepository: Send + Sync {
    /// Symbols in insertion order.
    async fn list(&self, user_id: &str) -> Result<Vec<String>, StoreError>;

    /// `true` if the symbol was newly added.
    async fn add(&self, user_id: &str, symbol: &str) -> Result<bool, StoreError>;

    /// `true` if the symbol was present.
    async fn remove(&self, user_id: &str, symbol: &str) -> Result<bool, StoreError>;
}
