//! # papertrade — Paper Trading Backend
//!
//! Virtual-cash trading simulator. Quotes come from published CSV sheets
//! (stocks + indices), trades settle against an in-process ledger.
//!
//! ```text
//!  Google Sheet (CSV) ──▶ feed::MarketFeed<StockRecord> ──┐
//!  Google Sheet (CSV) ──▶ feed::MarketFeed<IndexRecord> ──┤
//!                                                         ▼
//!  Frontend ──HTTP──▶ routes ──▶ engine::PortfolioService ──▶ store::{Memory,Pg}Store
//! ```

pub mod auth;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

pub use routes::build_router;
