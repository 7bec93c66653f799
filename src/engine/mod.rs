//! Trading engine: ledger arithmetic and the per-user service around it.

pub mod ledger;
pub mod portfolio;

pub use ledger::{HoldingChange, LedgerError, TradeCommit};
pub use portfolio::{PortfolioError, PortfolioService};
