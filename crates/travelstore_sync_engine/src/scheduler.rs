//! Fixed-interval background sync.

use crate::engine::ReplicationEngine;
use crate::remote::RemoteAuthority;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Runs [`ReplicationEngine::sync`] on a fixed interval.
///
/// The first cycle runs immediately. A cycle still running when the next
/// tick is due delays that tick instead of stacking cycles. Dropping the
/// scheduler signals the task to stop after its current cycle.
pub struct SyncScheduler {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl SyncScheduler {
    /// Spawns the sync loop on the current tokio runtime.
    ///
    /// Uses the engine's configured interval.
    pub fn start<R: RemoteAuthority>(engine: ReplicationEngine<R>) -> Self {
        let interval = engine.config().sync_interval;
        Self::start_with_interval(engine, interval)
    }

    /// Spawns the sync loop with an explicit interval.
    pub fn start_with_interval<R: RemoteAuthority>(
        engine: ReplicationEngine<R>,
        interval: Duration,
    ) -> Self {
        let (shutdown, mut rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = interval.as_millis() as u64, "sync scheduler started");

            loop {
                tokio::select! {
                    biased;
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                        continue;
                    }
                    _ = ticker.tick() => {}
                }

                match engine.sync().await {
                    Ok(result) => debug!(
                        pushed = result.pushed(),
                        pulled = result.pulled(),
                        "scheduled sync finished"
                    ),
                    Err(e) => warn!(error = %e, "scheduled sync failed"),
                }
            }
            info!("sync scheduler stopped");
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Returns true while the background task is alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signals the loop to stop and waits for it to exit.
    ///
    /// A cycle in progress is allowed to finish.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "sync scheduler task ended abnormally");
            }
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::remote::MemoryRemote;
    use std::sync::Arc;
    use travelstore_core::{Store, TableName};

    #[tokio::test]
    async fn runs_immediately_and_stops() {
        let engine = ReplicationEngine::new(
            SyncConfig::new().with_tables([TableName::Airlines]),
            Arc::new(Store::in_memory()),
            Arc::new(MemoryRemote::new()),
        );
        let scheduler = SyncScheduler::start_with_interval(engine.clone(), Duration::from_secs(3600));
        assert!(scheduler.is_running());

        for _ in 0..100 {
            if engine.stats().cycles_completed > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(engine.stats().cycles_completed, 1);

        scheduler.stop().await;
        assert_eq!(engine.stats().cycles_completed, 1);
    }
}
