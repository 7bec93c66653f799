//! # feed — Market Data Ingestion
//!
//! ```text
//!  published sheet (CSV over HTTP)
//!        │  source::HttpFeedSource   (timeout, fallback URL, content-type check)
//!        ▼
//!  csv::parse_csv                    (RFC 4180 rows → header→value maps)
//!        ▼
//!  resolver::resolve_records         (alias table, coercion, drop policy)
//!        ▼
//!  cache::MarketFeed<T>              (TTL, stale-serve, atomic snapshot swap)
//! ```

use std::time::Duration;

use thiserror::Error;

pub mod cache;
pub mod csv;
pub mod poller;
pub mod resolver;
pub mod source;

pub use cache::{FeedRead, FeedSnapshot, FeedState, FeedStatus, MarketFeed};
pub use resolver::{FeedRecord, Resolution};
pub use source::{FeedSource, HttpFeedSource};

/// Why a fetch cycle produced no new snapshot.
///
/// None of these reach an end user: the cache logs them, keeps serving the
/// last good snapshot and reports the latest one through [`FeedStatus`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FeedError {
    #[error("no feed URL configured")]
    NotConfigured,

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("unexpected content type '{0}' (want text/csv or text/plain)")]
    ContentType(String),

    #[error("malformed CSV: {0}")]
    Parse(String),

    #[error("feed contained no usable rows ({dropped} dropped)")]
    Empty { dropped: usize },
}

/// Full pipeline for one fetched body: CSV → rows → canonical records.
///
/// A body that yields zero valid records counts as a failed cycle, so a
/// truncated or header-only export never replaces a good snapshot.
pub fn parse_feed<T: FeedRecord>(text: &str) -> Result<Resolution<T>, FeedError> {
    let rows = csv::parse_csv(text)?;
    let resolution = resolver::resolve_records::<T>(&rows);

    if resolution.records.is_empty() {
        return Err(FeedError::Empty { dropped: resolution.dropped });
    }

    tracing::debug!(
        kind     = T::KIND,
        rows     = rows.len(),
        records  = resolution.records.len(),
        dropped  = resolution.dropped,
        "feed parsed"
    );
    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StockRecord;

    #[test]
    fn test_scenario_bad_row_dropped() {
        let res = parse_feed::<StockRecord>("SYMBOL,Price\nAAPL,175.43\nBAD,\n").unwrap();
        assert_eq!(res.records.len(), 1);
        assert_eq!(
            res.records[0],
            StockRecord {
                symbol: "AAPL".into(),
                name: "AAPL".into(),
                price: 175.43,
                ..Default::default()
            }
        );
        assert_eq!(res.dropped, 1);
    }

    #[test]
    fn test_quoted_name_with_comma_survives_pipeline() {
        let res = parse_feed::<StockRecord>("SYMBOL,NAME,Price\nACME,\"Acme, Inc.\",10.5\n").unwrap();
        assert_eq!(res.records[0].name, "Acme, Inc.");
        assert_eq!(res.records[0].price, 10.5);
    }

    #[test]
    fn test_header_only_is_empty_cycle() {
        let err = parse_feed::<StockRecord>("SYMBOL,Price\n").unwrap_err();
        assert_eq!(err, FeedError::Empty { dropped: 0 });
    }

    #[test]
    fn test_all_rows_invalid_is_empty_cycle() {
        let err = parse_feed::<StockRecord>("SYMBOL,Price\nA,0\nB,-5\n").unwrap_err();
        assert_eq!(err, FeedError::Empty { dropped: 2 });
    }
}
