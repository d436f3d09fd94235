//! Background task that periodically refreshes all mapped items.
//!
//! The [`SyncService`] itself is unaware of timers; this module is the
//! external scheduler collaborator. Each tick re-reads the stored schedule
//! flag, so toggling the schedule takes effect without restarting the task.
//! Runs are fire-and-forget: individual item failures are logged and never
//! surfaced to a user.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::service::{ContentItems, SyncService};
use crate::store::Store;

/// Handle to a running scheduled-refresh task.
///
/// Owns the shutdown signal and the task join handle. Keep it alive for
/// the lifetime of the application and call [`shutdown`](Self::shutdown)
/// before exit.
pub struct ScheduleHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ScheduleHandle {
    /// Gracefully stop the scheduled task.
    ///
    /// A refresh pass already in flight runs to completion first.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Spawn the scheduled-refresh task, ticking at `interval`.
///
/// Ticks where the stored schedule flag is disabled do nothing, and missed
/// ticks are skipped rather than bursted.
pub fn spawn<S: Store, C: ContentItems>(
    service: Arc<SyncService<S, C>>,
    interval: Duration,
) -> ScheduleHandle {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(run(service, shutdown_rx, interval));

    ScheduleHandle {
        shutdown: Some(shutdown_tx),
        task: Some(task),
    }
}

async fn run<S: Store, C: ContentItems>(
    service: Arc<SyncService<S, C>>,
    mut shutdown_rx: oneshot::Receiver<()>,
    interval: Duration,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // Skip the first immediate tick
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown_rx => {
                tracing::info!("Shutdown signal received, stopping scheduled sync");
                return;
            }

            _ = ticker.tick() => {
                refresh_pass(&service).await;
            }
        }
    }
}

async fn refresh_pass<S: Store, C: ContentItems>(service: &SyncService<S, C>) {
    match service.schedule_enabled().await {
        Ok(true) => {}
        Ok(false) => return,
        Err(e) => {
            tracing::error!("Could not read schedule flag: {e}");
            return;
        }
    }

    match service.sync_all(None).await {
        Ok(report) => {
            for error in &report.errors {
                tracing::warn!("Scheduled sync failure: {error}");
            }
            tracing::info!("Scheduled sync finished: {report}");
        }
        Err(e) => tracing::error!("Scheduled sync aborted: {e}"),
    }
}
