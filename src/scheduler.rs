use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::Engine;

/// Periodically move elapsed ACCEPTED reservations to COMPLETED.
pub async fn run_completer(engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let done = engine.complete_elapsed().await;
        debug!("completion sweep: {} reservations", done.len());
    }
}

/// Compact the WAL once enough appends have piled up since the last rewrite.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        engine.notify.prune();
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        info!("compacting WAL after {appends} appends");
        if let Err(e) = engine.compact_wal().await {
            warn!("WAL compaction failed: {e}");
        }
    }
}
