use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::LiveDataService;

/// Owner of the background refresh task.
///
/// Dropping the handle stops the loop once the current cycle ends;
/// [`shutdown`] does the same and waits for the task to exit.
///
/// [`shutdown`]: RefreshLoopHandle::shutdown
pub struct RefreshLoopHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshLoopHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            error!("Refresh loop task ended abnormally: {}", e);
        }
    }
}

/// Spawns the refresh loop: one cycle immediately, then one per
/// `interval`. Ticks that come due while a cycle is running are skipped,
/// not queued, so the loop never builds a backlog.
///
/// On-demand cycles go through [`LiveDataService::refresh_now`], which takes
/// the same single-flight lock. The ticker is the loop's only wake-up
/// source, so at most one tick is pending when a cycle ends.
pub fn start_refresh_loop(service: LiveDataService, interval: Duration) -> RefreshLoopHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        info!(
            "Refresh loop started (source={}, interval={:?})",
            service.source().name(),
            interval
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = ticker.tick() => debug!("Refresh tick"),
            }

            // A manual refresh may already hold the cycle; this tick
            // is then redundant.
            if service.try_refresh().await.is_none() {
                debug!("Refresh already in flight, tick coalesced");
            }
        }

        info!("Refresh loop stopped");
    });

    RefreshLoopHandle { shutdown_tx, task }
}
