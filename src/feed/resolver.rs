//! # feed::resolver
//!
//! Header alias resolution + numeric coercion.
//!
//! แต่ละ sheet ตั้งชื่อ column ไม่เหมือนกัน (`SYMBOL` / `Symbol` / `TICKER`)
//! จึงใช้ตาราง alias แบบ declarative: canonical field → รายชื่อ header ตามลำดับ
//! ความสำคัญ ตัวแรกที่มีค่า (ไม่ว่าง) ชนะเสมอ
//!
//! Rows that end up without a symbol or with `price <= 0` are dropped
//! silently. Spreadsheet exports routinely carry blank and footer rows, so a
//! dropped row is not an error.

use std::collections::HashSet;

use serde::Serialize;

use super::csv::RawRow;
use crate::models::{IndexRecord, StockRecord};

// ─── Alias Tables ─────────────────────────────────────────────────────────────

/// Ordered header aliases for each canonical field. Earlier entries win.
#[derive(Debug, Clone, Copy)]
pub struct AliasTable {
    pub symbol:         &'static [&'static str],
    pub name:           &'static [&'static str],
    pub price:          &'static [&'static str],
    pub change:         &'static [&'static str],
    pub change_percent: &'static [&'static str],
    pub volume:         &'static [&'static str],
    pub sector:         &'static [&'static str],
    pub market_cap:     &'static [&'static str],
    pub high:           &'static [&'static str],
    pub low:            &'static [&'static str],
    pub open:           &'static [&'static str],
    pub close:          &'static [&'static str],
}

pub const STOCK_ALIASES: AliasTable = AliasTable {
    symbol:         &["SYMBOL", "Symbol", "TICKER", "Ticker", "symbol"],
    name:           &["NAME", "Name", "COMPANY", "Company", "COMPANY NAME", "Company Name", "name"],
    price:          &["CURRENT PRICE", "Price", "LTP", "PRICE", "price"],
    change:         &["CHANGE", "Change", "CHG", "change"],
    change_percent: &["CHANGE %", "CHANGE%", "% CHANGE", "%CHNG", "Change %", "changePercent"],
    volume:         &["VOLUME", "Volume", "VOL", "volume"],
    sector:         &["SECTOR", "Sector", "INDUSTRY", "Industry", "sector"],
    market_cap:     &["MARKET CAP", "Market Cap", "MCAP", "marketCap"],
    high:           &["HIGH", "High", "DAY HIGH", "high"],
    low:            &["LOW", "Low", "DAY LOW", "low"],
    open:           &["OPEN", "Open", "open"],
    close:          &["PREV CLOSE", "Prev Close", "CLOSE", "Close", "close"],
};

pub const INDEX_ALIASES: AliasTable = AliasTable {
    symbol:         &["Symbol", "SYMBOL", "INDEX", "Index", "symbol"],
    name:           &["Name", "NAME", "INDEX NAME", "Index Name", "name"],
    price:          &["CURRENT PRICE", "Price", "LTP", "VALUE", "Value", "price"],
    change:         &["CHANGE", "Change", "CHG", "change"],
    change_percent: &["CHANGE %", "CHANGE%", "% CHANGE", "%CHNG", "Change %", "changePercent"],
    volume:         &[],
    sector:         &[],
    market_cap:     &["MARKET CAP", "Market Cap", "MCAP", "marketCap"],
    high:           &["HIGH", "High", "DAY HIGH", "high"],
    low:            &["LOW", "Low", "DAY LOW", "low"],
    open:           &["OPEN", "Open", "open"],
    close:          &["PREV CLOSE", "Prev Close", "CLOSE", "Close", "close"],
};

// ─── FeedRecord ───────────────────────────────────────────────────────────────

/// A canonical record that can be built from one raw CSV row.
pub trait FeedRecord: Clone + Send + Sync + Serialize + 'static {
    /// Short label used in logs and status output (`"stocks"`, `"indices"`).
    const KIND: &'static str;

    /// Build the record, or `None` if the row fails the drop policy.
    fn from_row(row: &RawRow) -> Option<Self>;

    fn symbol(&self) -> &str;
}

impl FeedRecord for StockRecord {
    const KIND: &'static str = "stocks";

    fn from_row(row: &RawRow) -> Option<Self> {
        let t = &STOCK_ALIASES;
        let (symbol, price) = keyed_price(row, t)?;
        Some(StockRecord {
            name:           resolve_name(row, t, &symbol),
            price,
            change:         resolve_f64(row, t.change),
            change_percent: resolve_f64(row, t.change_percent),
            volume:         resolve_u64(row, t.volume),
            sector:         resolve(row, t.sector).unwrap_or_default().to_string(),
            market_cap:     resolve_f64(row, t.market_cap),
            high:           resolve_f64(row, t.high),
            low:            resolve_f64(row, t.low),
            open:           resolve_f64(row, t.open),
            close:          resolve_f64(row, t.close),
            symbol,
        })
    }

    fn symbol(&self) -> &str { &self.symbol }
}

impl FeedRecord for IndexRecord {
    const KIND: &'static str = "indices";

    fn from_row(row: &RawRow) -> Option<Self> {
        let t = &INDEX_ALIASES;
        let (symbol, price) = keyed_price(row, t)?;
        Some(IndexRecord {
            name:           resolve_name(row, t, &symbol),
            price,
            change:         resolve_f64(row, t.change),
            change_percent: resolve_f64(row, t.change_percent),
            market_cap:     resolve_f64(row, t.market_cap),
            high:           resolve_f64(row, t.high),
            low:            resolve_f64(row, t.low),
            open:           resolve_f64(row, t.open),
            close:          resolve_f64(row, t.close),
            symbol,
        })
    }

    fn symbol(&self) -> &str { &self.symbol }
}

/// Drop policy gate: symbol non-empty AND price > 0.
fn keyed_price(row: &RawRow, table: &AliasTable) -> Option<(String, f64)> {
    let symbol = resolve(row, table.symbol)?.to_uppercase();
    let price = resolve_f64(row, table.price);
    (price > 0.0).then_some((symbol, price))
}

fn resolve_name(row: &RawRow, table: &AliasTable, symbol: &str) -> String {
    resolve(row, table.name).unwrap_or(symbol).to_string()
}

// ─── Resolution ───────────────────────────────────────────────────────────────

/// Outcome of resolving a batch of rows.
#[derive(Debug, Clone)]
pub struct Resolution<T> {
    pub records: Vec<T>,
    /// Rows rejected by the drop policy or duplicate symbols.
    pub dropped: usize,
}

/// Resolve every row, keeping the first occurrence of each symbol.
pub fn resolve_records<T: FeedRecord>(rows: &[RawRow]) -> Resolution<T> {
    let mut seen = HashSet::with_capacity(rows.len());
    let mut records = Vec::with_capacity(rows.len());
    let mut dropped = 0;

    for row in rows {
        match T::from_row(row) {
            Some(record) if seen.insert(record.symbol().to_string()) => records.push(record),
            _ => dropped += 1,
        }
    }

    Resolution { records, dropped }
}

// ─── Field Lookup & Coercion ──────────────────────────────────────────────────

/// First alias present in `row` with a non-empty value.
pub fn resolve<'a>(row: &'a RawRow, aliases: &[&str]) -> Option<&'a str> {
    aliases
        .iter()
        .filter_map(|alias| row.get(*alias))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

pub fn resolve_f64(row: &RawRow, aliases: &[&str]) -> f64 {
    resolve(row, aliases).map(coerce_f64).unwrap_or(0.0)
}

pub fn resolve_u64(row: &RawRow, aliases: &[&str]) -> u64 {
    resolve(row, aliases).map(coerce_u64).unwrap_or(0)
}

/// Lenient decimal parse, `parseFloat`-style.
///
/// Thousands separators, currency markers and `%` are stripped, then the
/// longest numeric prefix is parsed. Anything unparseable or non-finite is 0.
pub fn coerce_f64(raw: &str) -> f64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '₹' | '$' | '%' | ' ' | '\u{a0}'))
        .collect();

    numeric_prefix(&cleaned)
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Lenient unsigned integer parse. Fractions truncate; negatives become 0.
pub fn coerce_u64(raw: &str) -> u64 {
    let value = coerce_f64(raw);
    if value >= 1.0 {
        value.trunc() as u64
    } else {
        0
    }
}

/// `[+-]digits[.digits][e[+-]digits]`, or `""` when no digits lead the input.
fn numeric_prefix(s: &str) -> &str {
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i = 1;
    }

    let int_end = digits_from(i);
    let mut has_digits = int_end > i;
    i = int_end;

    if bytes.get(i) == Some(&b'.') {
        let frac_end = digits_from(i + 1);
        has_digits |= frac_end > i + 1;
        i = frac_end;
    }

    if !has_digits {
        return "";
    }

    let mut end = i;
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_end = digits_from(j);
        if exp_end > j {
            end = exp_end;
        }
    }

    &s[..end]
}
