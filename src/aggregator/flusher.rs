//! Periodic flushing on a tokio runtime.

use crate::aggregator::sharded::ShardedAggregator;
use crate::aggregator::time_sampler::FlushReport;
use crate::core::{Result, TesseraError};
use crate::metrics::SerieSender;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Background task flushing an aggregator into a serie channel.
///
/// Flushes run on the blocking pool since they hold shard locks and may wait
/// on a full channel.
pub struct Flusher {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<FlushReport>>,
}

impl Flusher {
    /// Start flushing `aggregator` every `interval`. Must be called within a
    /// tokio runtime.
    pub fn spawn(aggregator: Arc<ShardedAggregator>, interval: Duration, sender: SerieSender) -> Self {
        let (shutdown, mut stop) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            let mut sender = sender;
            let mut total = FlushReport::default();
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let agg = Arc::clone(&aggregator);
                        let (s, report) = tokio::task::spawn_blocking(move || {
                            let mut sender = sender;
                            let report = agg.flush(now_secs(), &mut sender);
                            (sender, report)
                        })
                        .await
                        .map_err(|e| TesseraError::flush(format!("flush task failed: {}", e)))?;

                        sender = s;
                        tracing::debug!(series = report.series, errors = report.errors, "periodic flush");
                        total += report;
                    }
                    _ = &mut stop => break,
                }
            }

            let agg = Arc::clone(&aggregator);
            let report = tokio::task::spawn_blocking(move || {
                let report = agg.flush_all(&mut sender);
                sender.close();
                report
            })
            .await
            .map_err(|e| TesseraError::flush(format!("final flush failed: {}", e)))?;

            tracing::info!(series = report.series, "flusher stopped");
            total += report;
            Ok(total)
        });

        Self {
            shutdown: Some(shutdown),
            handle,
        }
    }

    /// Stop the loop, flush everything left and close the channel. Returns
    /// the totals over the flusher's lifetime.
    pub async fn shutdown(mut self) -> Result<FlushReport> {
        if let Some(tx) = self.shutdown.take() {
            // the task may already be gone; the join below reports why
            let _ = tx.send(());
        }
        self.handle
            .await
            .map_err(|e| TesseraError::flush(format!("flusher task failed: {}", e)))?
    }
}
