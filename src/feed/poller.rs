//! # feed::poller
//!
//! Background refresh loop. Optional; without it the feeds refresh lazily
//! on the first read after the TTL lapses.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{FeedRecord, MarketFeed};

/// Spawn a task that force-refreshes both feeds every `every`.
///
/// Failures are already logged by the cache, so the loop just keeps going.
pub fn spawn_poller<A, B>(
    first:  Arc<MarketFeed<A>>,
    second: Arc<MarketFeed<B>>,
    every:  Duration,
) -> JoinHandle<()>
where
    A: FeedRecord,
    B: FeedRecord,
{
    info!(interval = ?every, "🔁 Feed poller started");

    tokio::spawn(async move {
        loop {
            let (a, b) = tokio::join!(first.refresh(), second.refresh());
            debug!(
                first  = A::KIND,
                ok_a   = a.is_ok(),
                second = B::KIND,
                ok_b   = b.is_ok(),
                "poll cycle done"
            );
            tokio::time::sleep(every).await;
        }
    })
}
