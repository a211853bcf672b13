//! Background polling loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::pipeline::processor::InquiryPipeline;

/// Spawn the polling loop. Returns the task handle and a shutdown flag;
/// set the flag and the loop exits after the current tick.
pub fn spawn_pipeline_runner(
    pipeline: Arc<InquiryPipeline>,
    poll_interval: Duration,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();

    let handle = tokio::spawn(async move {
        info!(interval_secs = poll_interval.as_secs(), "Pipeline runner started");
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if shutdown_flag.load(Ordering::Relaxed) {
                break;
            }

            // A failed run (e.g. the IMAP server is unreachable) is
            // reported and the loop keeps polling.
            if let Err(e) = pipeline.run_once().await {
                error!(error = %e, "Pipeline run failed");
            }

            if shutdown_flag.load(Ordering::Relaxed) {
                break;
            }
        }

        info!("Pipeline runner stopped");
    });

    (handle, shutdown)
}
