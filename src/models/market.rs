//! # models::market
//!
//! Canonical quote records produced by the feed resolver.
//!
//! Field names serialise as camelCase because the presentation layer reads
//! `changePercent` / `marketCap` straight off the JSON.

use serde::{Deserialize, Serialize};

// ─── StockRecord ──────────────────────────────────────────────────────────────

/// One row of the stock sheet after alias resolution and coercion.
///
/// Only records with a non-empty `symbol` and `price > 0` ever exist outside
/// the resolver.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRecord {
    /// Upper-cased ticker, unique within a snapshot.
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: u64,
    /// Free text, แต่ละ sheet เขียนไม่เหมือนกัน
    pub sector: String,
    pub market_cap: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub close: f64,
}

// ─── IndexRecord ──────────────────────────────────────────────────────────────

/// Market index quote (NIFTY 50, SENSEX, ...). Same shape as a stock minus
/// sector and volume.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRecord {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub market_cap: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub close: f64,
}

impl StockRecord {
    /// Case-insensitive substring match on symbol or name.
    /// `needle` must already be lower-cased.
    pub fn matches(&self, needle: &str) -> bool {
        self.symbol.to_lowercase().contains(needle) || self.name.to_lowercase().contains(needle)
    }
}
