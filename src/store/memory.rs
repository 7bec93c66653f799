//! # store::memory
//!
//! In-process store: ledger + watchlist อยู่ใน `RwLock<HashMap>`
//! ใช้เป็น default และใน tests

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{LedgerRepository, StoreError, WatchlistRepository};
use crate::engine::ledger::TradeCommit;
use crate::models::UserLedger;

#[derive(Debug, Default)]
pub struct MemoryStore {
    ledgers:    RwLock<HashMap<String, UserLedger>>,
    watchlists: RwLock<HashMap<String, Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerRepository for MemoryStore {
    async fn load(&self, user_id: &str) -> Result<Option<UserLedger>, StoreError> {
        Ok(self.ledgers.read().await.get(user_id).cloned())
    }

    async fn open(&self, user_id: &str, initial_balance: f64) -> Result<UserLedger, StoreError> {
        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers
            .entry(user_id.to_string())
            .or_insert_with(|| UserLedger::new(user_id, initial_balance));
        Ok(ledger.clone())
    }

    async fn commit_trade(&self, user_id: &str, commit: &TradeCommit) -> Result<(), StoreError> {
        let mut ledgers = self.ledgers.write().await;
        let ledger = ledgers
            .get_mut(user_id)
            .ok_or_else(|| StoreError::MissingLedger(user_id.to_string()))?;
        ledger.apply(commit);
        Ok(())
    }

    async fn top_balances(&self, limit: usize) -> Result<Vec<(String, f64)>, StoreError> {
        let ledgers = self.ledgers.read().await;
        let mut rows: Vec<(String, f64)> =
            ledgers.values().map(|l| (l.user_id.clone(), l.balance)).collect();

        rows.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        rows.truncate(limit);
        Ok(rows)
    }
}

#[async_trait]
impl WatchlistRepository for MemoryStore {
    async fn list(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.watchlists.read().await.get(user_id).cloned().unwrap_or_default())
    }

    async fn add(&self, user_id: &str, symbol: &str) -> Result<bool, StoreError> {
        let mut lists = self.watchlists.write().await;
        let list = lists.entry(user_id.to_string()).or_default();
        if list.iter().any(|s| s == symbol) {
            return Ok(false);
        }
        list.push(symbol.to_string());
        Ok(true)
    }

    async fn remove(&self, user_id: &str, symbol: &str) -> Result<bool, StoreError> {
        let mut lists = self.watchlists.write().await;
        let Some(list) = lists.get_mut(user_id) else {
            return Ok(false);
        };
        let before = list.len();
        list.retain(|s| s != symbol);
        Ok(list.len() != before)
    }
}
