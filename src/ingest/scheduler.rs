// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::FeedEngine;

/// Background task running update cycles: one right away, then one per
/// `interval`. Cycles never overlap; a slow cycle pushes the next tick back.
pub struct UpdateScheduler {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl UpdateScheduler {
    pub fn start(engine: Arc<FeedEngine>, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; it is the startup cycle.
            ticker.tick().await;

            loop {
                if *stop_rx.borrow() {
                    break;
                }
                if let Err(e) = engine.run_cycle().await {
                    tracing::error!(error = %e, "update cycle failed");
                }

                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = stop_rx.changed() => {
                        // A dropped sender also means stop.
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("update scheduler stopped");
        });

        tracing::info!(interval_secs = interval.as_secs(), "update scheduler started");
        Self { stop_tx, handle }
    }

    /// Ask the task to stop and wait for it. A cycle already running is
    /// allowed to finish; no new one starts.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "update scheduler task failed");
        }
    }
}
