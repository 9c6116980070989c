use std::time::Duration;

use anyhow::anyhow;
use tokio::select;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use scheduler::Scheduler;

/// Poll the scheduler until the job is complete.
///
/// Returns `false` if `shutdown` fired first.
pub async fn wait_for_completion(
    scheduler: &Scheduler,
    poll_interval: Duration,
    shutdown: &CancellationToken,
) -> bool {
    loop {
        if scheduler.is_job_complete().await {
            info!("Job complete");
            return true;
        }
        let status = scheduler.status().await;
        debug!(%status, "Job still running");

        select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested before the job completed");
                return false;
            },
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}

/// Drive the coordinator until the job is done and `server` has stopped.
///
/// Once the job completes the server keeps running for `grace` so polling
/// executors collect their exit instruction. If the server stops on its own
/// first, `shutdown` is cancelled and its outcome is returned right away.
pub async fn run(
    scheduler: &Scheduler,
    mut server: JoinHandle<anyhow::Result<()>>,
    poll_interval: Duration,
    grace: Duration,
    shutdown: &CancellationToken,
) -> anyhow::Result<()> {
    select! {
        result = &mut server => {
            let requested = shutdown.is_cancelled();
            shutdown.cancel();
            if let Err(err) = result? {
                error!("Coordinator server failed: {}", err);
                return Err(err);
            }
            if !requested {
                return Err(anyhow!("Coordinator server stopped before the job completed"));
            }
            return Ok(());
        },
        completed = wait_for_completion(scheduler, poll_interval, shutdown) => {
            if completed {
                select! {
                    result = &mut server => {
                        shutdown.cancel();
                        return result?;
                    },
                    _ = tokio::time::sleep(grace) => {}
                }
                shutdown.cancel();
            }
        }
    }

    server.await?
}
