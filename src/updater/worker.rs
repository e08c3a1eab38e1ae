//! Background worker running update cycles on an interval.
//!
//! Errors never stop the worker: a failed or rejected cycle is logged and the
//! next one runs at the following tick.

use std::{sync::Arc, time::Duration};

use super::{UpdateError, UpdateOrchestrator};
use crate::config::UpdaterConfig;

/// Run update cycles until the task is dropped or `shutdown` is cancelled.
pub async fn start_update_worker(
    orchestrator: Arc<UpdateOrchestrator>,
    config: UpdaterConfig,
    shutdown: tokio_util::sync::CancellationToken,
) {
    if !config.enabled {
        tracing::info!("Price catalog updater disabled by configuration");
        return;
    }

    tracing::info!(
        interval_secs = config.interval_secs,
        run_on_startup = config.run_on_startup,
        data_dir = %orchestrator.data_dir().display(),
        "Starting price catalog update worker"
    );

    let period = Duration::from_secs(config.interval_secs);
    let mut interval = if config.run_on_startup {
        tokio::time::interval(period)
    } else {
        tokio::time::interval_at(tokio::time::Instant::now() + period, period)
    };
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Price catalog update worker stopping");
                return;
            }
            _ = interval.tick() => {}
        }

        match orchestrator.run_cycle().await {
            Ok(cycle) => tracing::debug!(
                written = cycle.files_written(),
                failed = cycle.failures(),
                "Scheduled update cycle finished"
            ),
            Err(UpdateError::AlreadyRunning) => {
                tracing::info!("Skipping scheduled update, a manual cycle is running")
            }
        }
    }
}
