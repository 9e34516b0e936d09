//! Periodic refresh scheduler.
//!
//! Runs [`RefreshController::refresh`] on a fixed interval in a background task.
//! There is no response channel: failures are logged by the controller and the
//! next tick is the retry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

use crate::refresh::RefreshController;

pub struct RefreshScheduler {
    controller: Arc<RefreshController>,
    period: Duration,
}

impl RefreshScheduler {
    pub fn new(controller: Arc<RefreshController>, period: Duration) -> Self {
        Self { controller, period }
    }

    /// Start the scheduler in a background task.
    ///
    /// The first tick fires one full period after start, since the start-up
    /// refresh already covers time zero. Returns a shutdown sender; sending
    /// `true` stops the loop between ticks.
    pub fn start(self) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            info!(interval_secs = self.period.as_secs(), "refresh scheduler started");

            let mut ticker = interval_at(Instant::now() + self.period, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("scheduled catalog refresh");
                        let _ = self.controller.refresh().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("refresh scheduler shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}
