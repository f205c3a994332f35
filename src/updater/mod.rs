//! Periodic update pipelines.
//!
//! The geo updater installs new MaxMind database versions and asks the lookup
//! service to reload; the Tor updater rebuilds the exit index and hands it
//! over. Both run one cycle at startup and then one per interval until
//! cancelled.

mod geo;
mod tor;

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub(crate) use geo::GeoUpdater;
pub(crate) use tor::TorUpdater;

const MIN_UPDATE_INTERVAL: Duration = Duration::from_millis(1);

/// Runs `cycle` now and then on every tick until `cancel` fires.
///
/// A cycle in progress is abandoned on cancellation; every write a cycle makes
/// goes through a rename, so an abandoned cycle leaves nothing half-written.
async fn run_periodically<F, Fut>(
    name: &str,
    period: Duration,
    cancel: CancellationToken,
    mut cycle: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period.max(MIN_UPDATE_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = cycle() => {}
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
    }

    log::debug!("{} shutting down", name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_runs_immediately_then_per_tick() {
        let cancel = CancellationToken::new();
        let cycles = Arc::new(AtomicUsize::new(0));
        let task = {
            let cancel = cancel.clone();
            let cycles = Arc::clone(&cycles);
            tokio::spawn(async move {
                run_periodically("test", Duration::from_millis(20), cancel, || {
                    let cycles = Arc::clone(&cycles);
                    async move {
                        cycles.fetch_add(1, Ordering::SeqCst);
                    }
                })
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(110)).await;
        cancel.cancel();
        task.await.expect("updater task");
        let ran = cycles.load(Ordering::SeqCst);
        assert!(ran >= 3, "expected several cycles, got {}", ran);
    }

    #[tokio::test]
    async fn test_cancel_abandons_running_cycle() {
        let cancel = CancellationToken::new();
        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                run_periodically("test", Duration::from_secs(3600), cancel, || async {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                })
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("updater stops promptly")
            .expect("updater task");
    }
}
