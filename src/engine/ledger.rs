//! # engine::ledger
//!
//! Buy / sell against a [`UserLedger`] using average-cost accounting.
//!
//! Every operation runs in two steps:
//!
//! 1. `plan_*` validates against an immutable view and returns a
//!    [`TradeCommit`] (new balance + holding change + transaction) or a
//!    [`LedgerError`]. Nothing is touched on failure.
//! 2. [`UserLedger::apply`] installs the commit. Repositories persist the same
//!    commit as one unit, so balance and holding never drift apart.
//!
//! ไม่มีการกันคำสั่งซ้ำ: เรียก `buy` สองครั้งด้วย argument เดิม = สอง transaction

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Holding, TradeType, Transaction, UserLedger};

/// Float slack when comparing a purchase total to the balance.
///
/// A buy accepted inside this slack can leave the raw difference slightly
/// negative; that dust is clamped to exactly zero, so the clamp never credits
/// more than `BALANCE_EPSILON`.
const BALANCE_EPSILON: f64 = 1e-9;

/// Largest position size the ledger (and the BIGINT column) can hold.
pub const MAX_QUANTITY: u64 = i64::MAX as u64;

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LedgerError {
    #[error("Quantity must be greater than zero")]
    InvalidQuantity,

    #[error("Price must be a positive number, got {0}")]
    InvalidPrice(f64),

    #[error("Symbol must not be empty")]
    InvalidSymbol,

    #[error("Insufficient balance: need ₹{required:.2}, available ₹{available:.2}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("Insufficient holdings: cannot sell {requested} {symbol}, holding {held}")]
    InsufficientHoldings { symbol: String, requested: u64, held: u64 },

    #[error("Position too large: holding {held} {symbol}, cannot add {requested}")]
    QuantityOverflow { symbol: String, requested: u64, held: u64 },
}

// ─── TradeCommit ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum HoldingChange {
    /// Insert or overwrite the holding for its symbol.
    Upsert(Holding),
    /// Position closed, delete the row.
    Remove(String),
}

/// Everything one trade changes, computed up front.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeCommit {
    pub balance:     f64,
    pub holding:     HoldingChange,
    pub transaction: Transaction,
}

// ─── Operations ───────────────────────────────────────────────────────────────

impl UserLedger {
    pub fn plan_buy(
        &self,
        symbol:   &str,
        quantity: u64,
        price:    f64,
        at:       DateTime<Utc>,
    ) -> Result<TradeCommit, LedgerError> {
        let symbol = normalize_symbol(symbol)?;
        validate(quantity, price)?;

        let total = quantity as f64 * price;
        if total > self.balance + BALANCE_EPSILON {
            return Err(LedgerError::InsufficientBalance { required: total, available: self.balance });
        }

        let holding = match self.holding(&symbol) {
            Some(existing) => {
                let new_qty = existing
                    .quantity
                    .checked_add(quantity)
                    .filter(|q| *q <= MAX_QUANTITY)
                    .ok_or_else(|| LedgerError::QuantityOverflow {
                        symbol:    symbol.clone(),
                        requested: quantity,
                        held:      existing.quantity,
                    })?;
                Holding {
                    symbol:    symbol.clone(),
                    quantity:  new_qty,
                    avg_price: (existing.cost_basis() + total) / new_qty as f64,
                }
            }
            None => Holding { symbol: symbol.clone(), quantity, avg_price: price },
        };

        Ok(TradeCommit {
            // dust จาก epsilon → 0
            balance:     (self.balance - total).max(0.0),
            holding:     HoldingChange::Upsert(holding),
            transaction: Transaction::new(&symbol, TradeType::Buy, quantity, price, at),
        })
    }

    pub fn plan_sell(
        &self,
        symbol:   &str,
        quantity: u64,
        price:    f64,
        at:       DateTime<Utc>,
    ) -> Result<TradeCommit, LedgerError> {
        let symbol = normalize_symbol(symbol)?;
        validate(quantity, price)?;

        let held = self.holding(&symbol).map(|h| h.quantity).unwrap_or(0);
        if held < quantity {
            return Err(LedgerError::InsufficientHoldings { symbol, requested: quantity, held });
        }

        let holding = match self.holding(&symbol) {
            Some(existing) if existing.quantity > quantity => HoldingChange::Upsert(Holding {
                quantity: existing.quantity - quantity,
                ..existing.clone()
            }),
            _ => HoldingChange::Remove(symbol.clone()),
        };

        Ok(TradeCommit {
            balance:     self.balance + quantity as f64 * price,
            holding,
            transaction: Transaction::new(&symbol, TradeType::Sell, quantity, price, at),
        })
    }

    /// Install a planned commit. Only call with a commit planned against this
    /// ledger's current state.
    pub fn apply(&mut self, commit: &TradeCommit) {
        self.balance = commit.balance;

        match &commit.holding {
            HoldingChange::Upsert(holding) => {
                match self.holdings.iter_mut().find(|h| h.symbol == holding.symbol) {
                    Some(slot) => *slot = holding.clone(),
                    None => self.holdings.push(holding.clone()),
                }
            }
            HoldingChange::Remove(symbol) => self.holdings.retain(|h| &h.symbol != symbol),
        }

        self.transactions.push(commit.transaction.clone());
    }

    /// Plan + apply in one step.
    pub fn buy(
        &mut self,
        symbol:   &str,
        quantity: u64,
        price:    f64,
        at:       DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        let commit = self.plan_buy(symbol, quantity, price, at)?;
        self.apply(&commit);
        Ok(commit.transaction)
    }

    /// Plan + apply in one step.
    pub fn sell(
        &mut self,
        symbol:   &str,
        quantity: u64,
        price:    f64,
        at:       DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        let commit = self.plan_sell(symbol, quantity, price, at)?;
        self.apply(&commit);
        Ok(commit.transaction)
    }
}

/// Trim + upper-case; empty is rejected.
pub fn normalize_symbol(symbol: &str) -> Result<String, LedgerError> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(LedgerError::InvalidSymbol);
    }
    Ok(symbol)
}

fn validate(quantity: u64, price: f64) -> Result<(), LedgerError> {
    if quantity == 0 || quantity > MAX_QUANTITY {
        return Err(LedgerError::InvalidQuantity);
    }
    if !price.is_finite() || price <= 0.0 {
        return Err(LedgerError::InvalidPrice(price));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn ledger(balance: f64) -> UserLedger {
        UserLedger::new("trader-1", balance)
    }

    #[test]
    fn test_scenario_buy_then_sell() {
        let mut l = ledger(1000.0);
        let now = Utc::now();

        let buy = l.buy("AAPL", 10, 50.0, now).unwrap();
        assert_eq!(l.balance, 500.0);
        assert_eq!(l.holdings, vec![Holding { symbol: "AAPL".into(), quantity: 10, avg_price: 50.0 }]);
        assert_eq!(buy.trade_type, TradeType::Buy);
        assert_eq!(buy.total, 500.0);
        assert_eq!(l.transactions.len(), 1);

        let sell = l.sell("AAPL", 10, 60.0, now).unwrap();
        assert_eq!(l.balance, 1100.0);
        assert!(l.holdings.is_empty());
        assert_eq!(sell.trade_type, TradeType::Sell);
        assert_eq!(sell.total, 600.0);
        assert_eq!(l.transactions.len(), 2);
    }

    #[test]
    fn test_weighted_average_over_buy_sequence() {
        let mut l = ledger(1_000_000.0);
        let buys = [(3u64, 101.5), (7, 99.25), (1, 250.0), (40, 12.125), (9, 100.0)];

        let mut qty_sum = 0u64;
        let mut cost_sum = 0.0;
        for (qty, price) in buys {
            l.buy("tcs", qty, price, Utc::now()).unwrap();
            qty_sum += qty;
            cost_sum += qty as f64 * price;

            let h = l.holding("TCS").unwrap();
            assert_eq!(h.quantity, qty_sum);
            assert!((h.avg_price - cost_sum / qty_sum as f64).abs() < EPS);
        }
    }

    #[test]
    fn test_partial_sell_keeps_avg_price() {
        let mut l = ledger(10_000.0);
        l.buy("INFY", 10, 100.0, Utc::now()).unwrap();
        l.buy("INFY", 10, 200.0, Utc::now()).unwrap();
        l.sell("INFY", 5, 300.0, Utc::now()).unwrap();

        let h = l.holding("INFY").unwrap();
        assert_eq!(h.quantity, 15);
        assert!((h.avg_price - 150.0).abs() < EPS);
    }

    #[test]
    fn test_full_sell_removes_holding() {
        let mut l = ledger(10_000.0);
        l.buy("A", 4, 10.0, Utc::now()).unwrap();
        l.buy("B", 2, 10.0, Utc::now()).unwrap();
        l.sell("A", 1, 10.0, Utc::now()).unwrap();
        l.sell("A", 3, 10.0, Utc::now()).unwrap();

        assert!(l.holding("A").is_none());
        assert!(l.holdings.iter().all(|h| h.quantity > 0));
        assert_eq!(l.holdings.len(), 1);
    }

    #[test]
    fn test_balance_conservation_at_cost() {
        let start = 50_000.0;
        let mut l = ledger(start);
        let now = Utc::now();

        l.buy("X", 10, 120.0, now).unwrap();
        l.buy("Y", 3, 999.99, now).unwrap();
        l.buy("X", 5, 80.0, now).unwrap();
        // ขายที่ราคาทุนเฉลี่ย → ไม่มีกำไร/ขาดทุน
        let x_avg = l.holding("X").unwrap().avg_price;
        l.sell("X", 6, x_avg, now).unwrap();
        l.buy("Z", 1, 0.5, now).unwrap();

        assert!((l.balance + l.invested() - start).abs() < EPS);
    }

    #[test]
    fn test_insufficient_balance_leaves_ledger_untouched() {
        let mut l = ledger(1000.0);
        l.buy("AAPL", 1, 100.0, Utc::now()).unwrap();
        let before = l.clone();

        let err = l.buy("MSFT", 10, 100.0, Utc::now()).unwrap_err();
        assert_eq!(err, LedgerError::InsufficientBalance { required: 1000.0, available: 900.0 });
        assert_eq!(l, before);
    }

    #[test]
    fn test_exact_balance_buy_allowed() {
        let mut l = ledger(0.3);
        l.buy("P", 3, 0.1, Utc::now()).unwrap();
        assert!(l.balance.abs() < EPS);
    }

    #[test]
    fn test_buy_inside_epsilon_lands_on_zero() {
        let mut l = ledger(1.0);
        l.buy("P", 1, 1.0 + 5e-10, Utc::now()).unwrap();
        assert_eq!(l.balance, 0.0);
    }

    #[test]
    fn test_position_overflow_rejected() {
        let mut l = ledger(1.0);
        let now = Utc::now();
        l.buy("A", MAX_QUANTITY, 1e-300, now).unwrap();
        let before = l.clone();

        let err = l.buy("A", MAX_QUANTITY, 1e-300, now).unwrap_err();
        assert_eq!(
            err,
            LedgerError::QuantityOverflow { symbol: "A".into(), requested: MAX_QUANTITY, held: MAX_QUANTITY }
        );
        assert_eq!(l.buy("A", 1, 1e-300, now).unwrap_err(), LedgerError::QuantityOverflow {
            symbol:    "A".into(),
            requested: 1,
            held:      MAX_QUANTITY,
        });
        assert_eq!(l.buy("B", u64::MAX, 1e-300, now), Err(LedgerError::InvalidQuantity));
        assert_eq!(l, before);
    }

    #[test]
    fn test_insufficient_holdings_leaves_ledger_untouched() {
        let mut l = ledger(1000.0);
        l.buy("AAPL", 2, 10.0, Utc::now()).unwrap();
        let before = l.clone();

        let err = l.sell("AAPL", 3, 10.0, Utc::now()).unwrap_err();
        assert_eq!(err, LedgerError::InsufficientHoldings { symbol: "AAPL".into(), requested: 3, held: 2 });

        let err = l.sell("MSFT", 1, 10.0, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientHoldings { held: 0, .. }));
        assert_eq!(l, before);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let mut l = ledger(1000.0);
        let now = Utc::now();
        assert_eq!(l.buy("A", 0, 1.0, now), Err(LedgerError::InvalidQuantity));
        assert_eq!(l.buy("A", 1, 0.0, now), Err(LedgerError::InvalidPrice(0.0)));
        assert_eq!(l.buy("A", 1, -2.0, now), Err(LedgerError::InvalidPrice(-2.0)));
        assert!(matches!(l.buy("A", 1, f64::NAN, now), Err(LedgerError::InvalidPrice(_))));
        assert_eq!(l.buy("  ", 1, 1.0, now), Err(LedgerError::InvalidSymbol));
        assert_eq!(l.sell("A", 0, 1.0, now), Err(LedgerError::InvalidQuantity));
        assert!(l.transactions.is_empty());
    }

    #[test]
    fn test_repeated_buys_are_not_deduplicated() {
        let mut l = ledger(1000.0);
        let now = Utc::now();
        let a = l.buy("A", 1, 10.0, now).unwrap();
        let b = l.buy("A", 1, 10.0, now).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(l.transactions.len(), 2);
        assert_eq!(l.holding("A").unwrap().quantity, 2);
    }

    #[test]
    fn test_plan_does_not_mutate() {
        let l = ledger(1000.0);
        let commit = l.plan_buy("a", 2, 100.0, Utc::now()).unwrap();
        assert_eq!(commit.balance, 800.0);
        assert_eq!(commit.transaction.symbol, "A");
        assert_eq!(l.balance, 1000.0);
        assert!(l.holdings.is_empty());
    }
}
