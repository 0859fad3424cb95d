//! The periodic sync loop: one cancellable ticker per process.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::SyncEngine;

/// Spawn the scheduler task. The first pass starts immediately; afterwards
/// one pass runs per interval. Cancelling the token stops the loop cleanly,
/// also between waits of an in-progress pass.
pub fn spawn(
    engine: Arc<SyncEngine>,
    interval: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_loop(engine, interval, token))
}

async fn run_loop(engine: Arc<SyncEngine>, interval: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                tracing::info!("Sync scheduler stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        tracing::info!("Starting scheduled sync pass");
        tokio::select! {
            _ = token.cancelled() => {
                tracing::info!("Sync scheduler cancelled mid-pass");
                return;
            }
            result = engine.run_pass() => match result {
                Ok(summary) => {
                    tracing::info!("Scheduled sync pass completed: {}", summary.folders);
                    for line in &summary.reports {
                        tracing::info!("{}", line);
                    }
                }
                // A failed pass never stops the loop; the next tick retries
                Err(e) => tracing::error!("Scheduled sync pass failed: {}", e),
            }
        }
    }
}
