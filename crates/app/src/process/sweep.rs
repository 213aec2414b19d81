use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use common::prelude::{CacheValue, MemoryCache};

/// Periodically run the cache's pending maintenance until shutdown.
///
/// Reads already treat expired entries as misses; this only bounds memory.
pub async fn run_sweeper(
    cache: Arc<MemoryCache<CacheValue>>,
    every: Duration,
    mut shutdown_rx: watch::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                cache.sweep();
                tracing::trace!(entries = cache.entry_count(), "swept cache");
            }
            _ = shutdown_rx.changed() => {
                tracing::debug!("cache sweeper stopping");
                return;
            }
        }
    }
}
