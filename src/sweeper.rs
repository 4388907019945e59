//! Background staleness sweep.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::manager::{EvictedSession, SessionManager};

/// Spawns a task that sweeps `manager` every `interval`.
///
/// Each non-empty eviction list is sent on the returned receiver so the caller
/// can announce expired games. The task stops once the receiver is dropped.
#[instrument(skip(manager))]
pub fn spawn_sweeper(
    manager: SessionManager,
    interval: Duration,
    max_idle_secs: u64,
) -> (JoinHandle<()>, mpsc::Receiver<Vec<EvictedSession>>) {
    let (tx, rx) = mpsc::channel(16);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        info!(?interval, max_idle_secs, "Sweeper started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tx.closed() => break,
            }

            // The sweep takes the registry write lock, so keep it off the async workers.
            let sweeping = manager.clone();
            let swept = tokio::task::spawn_blocking(move || {
                sweeping.sweep_stale_at(chrono::Utc::now(), max_idle_secs)
            })
            .await;
            let evicted = match swept {
                Ok(evicted) => evicted,
                Err(e) => {
                    warn!(error = %e, "Sweep task failed");
                    continue;
                }
            };
            if evicted.is_empty() {
                debug!("Sweep found nothing stale");
                continue;
            }
            if tx.send(evicted).await.is_err() {
                break;
            }
        }
        info!("Sweeper stopped");
    });

    (handle, rx)
}
