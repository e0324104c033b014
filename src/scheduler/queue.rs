//! Intake queue: the only state shared between ingress and the cycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

use crate::operation::{OperationId, UserOperation};
use crate::outcome::OperationOutcome;
use crate::telemetry;

/// Sender half of an opt-in outcome channel.
pub type OutcomeTx = tokio::sync::oneshot::Sender<OperationOutcome>;
/// Receiver half handed back to an opted-in submitter.
pub type OutcomeRx = tokio::sync::oneshot::Receiver<OperationOutcome>;

/// An accepted operation waiting for the next cycle.
pub struct QueuedOperation {
    pub id: OperationId,
    pub op: UserOperation,
    pub enqueued_at: Instant,
    /// Present only when the submitter asked to hear the outcome.
    pub outcome_tx: Option<OutcomeTx>,
}

impl std::fmt::Debug for QueuedOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedOperation")
            .field("id", &self.id)
            .field("sender", &self.op.sender)
            .field("nonce", &self.op.nonce)
            .field("max_fee_per_gas", &self.op.max_fee_per_gas)
            .field("awaiting_outcome", &self.outcome_tx.is_some())
            .finish()
    }
}

impl QueuedOperation {
    /// Create a queued operation outside the queue. Used by tests and benches.
    pub fn new(id: u64, op: UserOperation) -> Self {
        Self { id: OperationId(id), op, enqueued_at: Instant::now(), outcome_tx: None }
    }

    /// Deliver an outcome to the submitter, if it is listening.
    pub fn resolve(self, outcome: OperationOutcome) {
        if let Some(tx) = self.outcome_tx {
            let _ = tx.send(outcome);
        }
    }
}

/// Arrival-ordered buffer of pending operations.
///
/// Appends and drains take the same lock, so a drain observes a prefix of
/// arrivals and anything appended afterwards waits for the next drain.
pub struct IntakeQueue {
    pending: Mutex<Vec<QueuedOperation>>,
    next_id: AtomicU64,
}

impl IntakeQueue {
    pub fn new() -> Self {
        Self { pending: Mutex::new(Vec::new()), next_id: AtomicU64::new(1) }
    }

    /// Append an operation. No validation, no deduplication.
    pub fn enqueue(&self, op: UserOperation) -> OperationId {
        self.push(op, None)
    }

    /// Append an operation and receive its outcome once its cycle resolves.
    pub fn enqueue_with_outcome(&self, op: UserOperation) -> (OperationId, OutcomeRx) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let id = self.push(op, Some(tx));
        (id, rx)
    }

    fn push(&self, op: UserOperation, outcome_tx: Option<OutcomeTx>) -> OperationId {
        let mut pending = self.pending.lock();
        let id = OperationId(self.next_id.fetch_add(1, Ordering::SeqCst));
        pending.push(QueuedOperation { id, op, enqueued_at: Instant::now(), outcome_tx });
        let depth = pending.len();
        drop(pending);

        telemetry::record_enqueued(depth);
        id
    }

    /// Remove and return everything queued, in arrival order.
    pub fn drain_all(&self) -> Vec<QueuedOperation> {
        let drained = std::mem::take(&mut *self.pending.lock());
        telemetry::record_queue_depth(0);
        drained
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl Default for IntakeQueue {
    fn default() -> Self {
        Self::new()
    }
}
