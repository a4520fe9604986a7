//! Periodic orphaned-upload sweep.

use std::time::Duration;

use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::manager::UploadManager;

/// Extra time a sweep gets past its own budget before it is abandoned.
const OVERRUN_GRACE: Duration = Duration::from_secs(30);

/// Runs a sweep on every tick of `every` until `cancel` fires. The first
/// sweep runs immediately.
pub async fn run_cleanup_loop(
    manager: UploadManager,
    every: Duration,
    older_than: chrono::Duration,
    budget: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(every_secs = every.as_secs(), "upload cleanup worker started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let sweep = manager.cleanup_orphaned_uploads(older_than, budget);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    outcome = timeout(budget + OVERRUN_GRACE, sweep) => match outcome {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => error!("upload cleanup failed: {e}"),
                        Err(_) => warn!("upload cleanup overran its budget and was abandoned"),
                    },
                }
            }
        }
    }

    info!("upload cleanup worker stopped");
}
