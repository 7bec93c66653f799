//! # engine::portfolio
//!
//! [`PortfolioService`]: จุดเดียวที่แก้ ledger ได้
//!
//! Per-user mutex held across load → plan → persist → apply, so two
//! concurrent requests for the same user cannot both spend the same balance.
//! Different users never contend. A lock entry lives only while some trade
//! for that user is in flight.
//!
//! Accounts are opened by the first trade. Reads for a user who never traded
//! are [`PortfolioError::UnknownUser`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::ledger::LedgerError;
use crate::clock::Clock;
use crate::models::{TradeType, Transaction, UserLedger};
use crate::store::{LedgerRepository, StoreError};

#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("User {0} not found")]
    UnknownUser(String),
}

// ─── Views ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank:    usize,
    pub user_id: String,
    pub balance: f64,
}

/// One holding marked to the latest quote.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingValuation {
    pub symbol:        String,
    pub quantity:      u64,
    pub avg_price:     f64,
    /// `None` when the feed has no quote for the symbol; valued at cost then.
    pub current_price: Option<f64>,
    pub invested:      f64,
    pub market_value:  f64,
    pub pnl:           f64,
    pub pnl_percent:   f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub balance:       f64,
    pub invested:      f64,
    pub current_value: f64,
    pub pnl:           f64,
    pub pnl_percent:   f64,
    pub net_worth:     f64,
    pub holdings:      Vec<HoldingValuation>,
}

/// Mark every holding to `quote(symbol)`.
pub fn summarize(ledger: &UserLedger, quote: impl Fn(&str) -> Option<f64>) -> PortfolioSummary {
    let holdings: Vec<HoldingValuation> = ledger
        .holdings
        .iter()
        .map(|h| {
            let current_price = quote(&h.symbol);
            let invested = h.cost_basis();
            let market_value = h.quantity as f64 * current_price.unwrap_or(h.avg_price);
            let pnl = market_value - invested;
            HoldingValuation {
                symbol: h.symbol.clone(),
                quantity: h.quantity,
                avg_price: h.avg_price,
                current_price,
                invested,
                market_value,
                pnl,
                pnl_percent: percent(pnl, invested),
            }
        })
        .collect();

    let invested: f64 = holdings.iter().map(|h| h.invested).sum();
    let current_value: f64 = holdings.iter().map(|h| h.market_value).sum();
    let pnl = current_value - invested;

    PortfolioSummary {
        balance: ledger.balance,
        invested,
        current_value,
        pnl,
        pnl_percent: percent(pnl, invested),
        net_worth: ledger.balance + current_value,
        holdings,
    }
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { part / whole * 100.0 } else { 0.0 }
}

// ─── PortfolioService ─────────────────────────────────────────────────────────

pub struct PortfolioService {
    ledgers:         Arc<dyn LedgerRepository>,
    clock:           Arc<dyn Clock>,
    initial_balance: f64,
    user_locks:      Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl PortfolioService {
    pub fn new(ledgers: Arc<dyn LedgerRepository>, clock: Arc<dyn Clock>, initial_balance: f64) -> Self {
        Self {
            ledgers,
            clock,
            initial_balance,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks.entry(user_id.to_string()).or_default().clone()
    }

    /// Drop the map entry once nobody else holds or waits on it.
    async fn release_user_lock(&self, user_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.user_locks.lock().await;
        // map + ของเรา = 2
        if Arc::strong_count(&lock) == 2 {
            locks.remove(user_id);
        }
    }

    /// Load an existing ledger. Never creates one.
    pub async fn ledger(&self, user_id: &str) -> Result<UserLedger, PortfolioError> {
        self.ledgers
            .load(user_id)
            .await?
            .ok_or_else(|| PortfolioError::UnknownUser(user_id.to_string()))
    }

    async fn ledger_or_open(&self, user_id: &str) -> Result<UserLedger, PortfolioError> {
        if let Some(ledger) = self.ledgers.load(user_id).await? {
            return Ok(ledger);
        }
        let ledger = self.ledgers.open(user_id, self.initial_balance).await?;
        info!(user_id, balance = ledger.balance, "🆕 Ledger opened");
        Ok(ledger)
    }

    pub async fn buy(&self, user_id: &str, symbol: &str, quantity: u64, price: f64) -> Result<Transaction, PortfolioError> {
        self.trade(user_id, TradeType::Buy, symbol, quantity, price).await
    }

    pub async fn sell(&self, user_id: &str, symbol: &str, quantity: u64, price: f64) -> Result<Transaction, PortfolioError> {
        self.trade(user_id, TradeType::Sell, symbol, quantity, price).await
    }

    async fn trade(
        &self,
        user_id:  &str,
        side:     TradeType,
        symbol:   &str,
        quantity: u64,
        price:    f64,
    ) -> Result<Transaction, PortfolioError> {
        let lock = self.user_lock(user_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.trade_locked(user_id, side, symbol, quantity, price).await
        };
        self.release_user_lock(user_id, lock).await;
        result
    }

    /// Caller must hold the user's lock.
    async fn trade_locked(
        &self,
        user_id:  &str,
        side:     TradeType,
        symbol:   &str,
        quantity: u64,
        price:    f64,
    ) -> Result<Transaction, PortfolioError> {
        let ledger = self.ledger_or_open(user_id).await?;
        let now = self.clock.now();
        let planned = match side {
            TradeType::Buy => ledger.plan_buy(symbol, quantity, price, now),
            TradeType::Sell => ledger.plan_sell(symbol, quantity, price, now),
        };

        let commit = match planned {
            Ok(commit) => commit,
            Err(e) => {
                warn!(user_id, %side, symbol, quantity, price, reason = %e, "❌ Trade rejected");
                return Err(e.into());
            }
        };

        self.ledgers.commit_trade(user_id, &commit).await?;

        info!(
            user_id,
            %side,
            symbol   = %commit.transaction.symbol,
            quantity,
            price,
            total    = commit.transaction.total,
            balance  = commit.balance,
            "✅ Trade executed"
        );
        Ok(commit.transaction)
    }

    pub async fn transactions(&self, user_id: &str, limit: Option<usize>) -> Result<Vec<Transaction>, PortfolioError> {
        Ok(self.ledger(user_id).await?.recent_transactions(limit))
    }

    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, PortfolioError> {
        let rows = self.ledgers.top_balances(limit).await?;
        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, (user_id, balance))| LeaderboardEntry { rank: i + 1, user_id, balance })
            .collect())
    }
}
