//! Background maintenance
//!
//! One task per process runs every registered [`Sweep`] job on a fixed
//! interval. A failed pass is logged and retried after a backoff; the loop
//! only ends when [`MaintenanceTask::shutdown`] is called.

use crate::error::MonitorResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// A periodic cleanup job.
pub trait Sweep: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Remove expired state; returns how many items were dropped.
    fn sweep(&self) -> MonitorResult<usize>;
}

/// Handle to the running maintenance loop.
pub struct MaintenanceTask {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl MaintenanceTask {
    pub fn spawn(jobs: Vec<Arc<dyn Sweep>>, interval: Duration, retry_backoff: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            info!(
                jobs = jobs.len(),
                interval_secs = interval.as_secs(),
                "Maintenance task started"
            );

            loop {
                let delay = match run_pass(&jobs) {
                    Ok(()) => interval,
                    Err(()) => retry_backoff,
                };

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = &mut shutdown_rx => {
                        info!("Maintenance task shutting down");
                        break;
                    }
                }
            }
        });

        Self { shutdown_tx, handle }
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.handle.await {
            error!(error = %e, "Maintenance task did not exit cleanly");
        }
    }
}

fn run_pass(jobs: &[Arc<dyn Sweep>]) -> Result<(), ()> {
    let mut failed = false;
    for job in jobs {
        match job.sweep() {
            Ok(removed) => tracing::debug!(job = job.name(), removed, "Sweep finished"),
            Err(e) => {
                error!(job = job.name(), error = %e, "Sweep failed, will retry after backoff");
                failed = true;
            }
        }
    }
    if failed { Err(()) } else { Ok(()) }
}
