//! Periodic cycle trigger.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::engine::{BundlerEngine, TickOutcome};

/// Handle to a running scheduler task.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop issuing ticks. A cycle already in flight runs to completion.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel and wait for the in-flight cycle, if any, to resolve.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        self.cancel.cancel();
        self.task.await
    }
}

/// Spawn a task that ticks `engine` every `period`.
///
/// The first tick fires one period after spawning. Ticks missed while a
/// cycle runs are skipped, not queued.
pub fn spawn_scheduler(engine: Arc<BundlerEngine>, period: Duration) -> SchedulerHandle {
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run(engine, period, cancel.clone()));
    SchedulerHandle { cancel, task }
}

async fn run(engine: Arc<BundlerEngine>, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::info!(interval_ms = period.as_millis() as u64, "scheduler started");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match engine.tick().await {
                    TickOutcome::Empty => {}
                    TickOutcome::Busy => tracing::debug!("tick skipped, cycle busy"),
                    TickOutcome::Completed(summary) => {
                        tracing::debug!(cycle_id = %summary.cycle_id, operations = summary.operations, "cycle completed");
                    }
                    TickOutcome::Failed(summary) => {
                        tracing::debug!(cycle_id = %summary.cycle_id, operations = summary.operations, "cycle failed");
                    }
                }
            }
        }
    }

    tracing::info!(pending = engine.queue().len(), "scheduler stopped");
}
