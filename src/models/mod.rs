//! Domain models shared across the feed pipeline, ledger and HTTP layer.

pub mod ledger;
pub mod market;

pub use ledger::{Holding, TradeType, Transaction, UserLedger};
pub use market::{IndexRecord, StockRecord};
