//! # models::ledger
//!
//! Per-user virtual account: cash balance, open holdings and the append-only
//! transaction log.
//!
//! `UserLedger` = สถานะบัญชีของผู้ใช้ 1 คน
//! `Holding`    = หุ้นที่ถืออยู่ (quantity > 0 เสมอ)
//! `Transaction`= ประวัติการซื้อขาย, ไม่มีวันแก้ไขหรือลบ

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── TradeType ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeType {
    Buy,
    Sell,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Buy => "BUY",
            TradeType::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TradeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(TradeType::Buy),
            "SELL" => Ok(TradeType::Sell),
            other => Err(format!("unknown trade type '{other}'")),
        }
    }
}

// ─── Holding ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    /// Always > 0. A position sold down to zero is removed from the ledger.
    pub quantity: u64,
    /// Weighted average cost per share.
    pub avg_price: f64,
}

impl Holding {
    /// Cost basis: `quantity * avg_price`.
    #[inline]
    pub fn cost_basis(&self) -> f64 {
        self.quantity as f64 * self.avg_price
    }
}

// ─── Transaction ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub symbol: String,
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    pub quantity: u64,
    pub price: f64,
    /// `quantity * price`, fixed at creation time.
    pub total: f64,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        symbol: &str,
        trade_type: TradeType,
        quantity: u64,
        price: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            trade_type,
            quantity,
            price,
            total: quantity as f64 * price,
            created_at,
        }
    }
}

// ─── UserLedger ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLedger {
    pub user_id: String,
    pub balance: f64,
    pub holdings: Vec<Holding>,
    /// Append order (oldest first). Display code reverses it.
    pub transactions: Vec<Transaction>,
}

impl UserLedger {
    /// Fresh account funded with the virtual starting balance.
    pub fn new(user_id: &str, initial_balance: f64) -> Self {
        Self {
            user_id: user_id.to_string(),
            balance: initial_balance,
            holdings: Vec::new(),
            transactions: Vec::new(),
        }
    }

    pub fn holding(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.symbol == symbol)
    }

    /// Transactions newest first, optionally capped.
    pub fn recent_transactions(&self, limit: Option<usize>) -> Vec<Transaction> {
        let iter = self.transactions.iter().rev().cloned();
        match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }

    /// Sum of cost bases across holdings.
    pub fn invested(&self) -> f64 {
        self.holdings.iter().map(Holding::cost_basis).sum()
    }
}
