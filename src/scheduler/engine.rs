//! The bundling cycle.
//!
//! `Idle -> Assembling -> Submitting -> Resolving -> Idle`. A tick that
//! finds the engine outside `Idle` is dropped. Whatever happens inside a
//! cycle, its drained snapshot is discarded when the cycle ends.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use parking_lot::Mutex;
use tracing::Instrument;
use uuid::Uuid;

use super::batch::{Batch, BatchAssembler, PreparedBatch};
use super::priority::order_by_fee;
use super::queue::{IntakeQueue, QueuedOperation};
use crate::chain::abi::describe_call;
use crate::chain::{ExecutionClient, Receipt, SubmitError};
use crate::outcome::{
    CorrelationReport, CorrelationStrategy, ErrorClassifier, OperationOutcome, OutcomeCorrelator,
};
use crate::telemetry::{self, CycleSpan, SpanExt};

/// Gas ceiling for a batch transaction when none is configured.
pub const DEFAULT_GAS_LIMIT: u64 = 3_000_000;

/// Cycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Assembling,
    Submitting,
    Resolving,
}

/// What one tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// A cycle was already running; the tick was dropped.
    Busy,
    /// Nothing was queued.
    Empty,
    /// The batch was confirmed and its events correlated.
    Completed(CycleSummary),
    /// The batch failed and was discarded.
    Failed(CycleSummary),
}

/// Result of a finished cycle.
#[derive(Debug)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    pub operations: usize,
    pub tx_hash: Option<B256>,
    pub gas_used: Option<U256>,
    pub report: Option<CorrelationReport>,
    pub error: Option<SubmitError>,
}

/// Engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub entry_point: Address,
    /// Inner target whose calls are named in traces.
    pub target: Option<Address>,
    pub gas_limit: u64,
    pub correlation: CorrelationStrategy,
}

impl EngineConfig {
    pub fn new(entry_point: Address) -> Self {
        Self {
            entry_point,
            target: None,
            gas_limit: DEFAULT_GAS_LIMIT,
            correlation: CorrelationStrategy::default(),
        }
    }
}

/// Owns the intake queue and drives one cycle at a time.
pub struct BundlerEngine {
    queue: Arc<IntakeQueue>,
    state: Mutex<CycleState>,
    client: Arc<dyn ExecutionClient>,
    assembler: BatchAssembler,
    correlator: OutcomeCorrelator,
    classifier: ErrorClassifier,
    target: Option<Address>,
    gas_limit: u64,
}

/// Holds the engine out of `Idle` for one cycle.
///
/// Dropping it returns the engine to `Idle`, including when a cycle unwinds.
struct CycleGuard<'a> {
    state: &'a Mutex<CycleState>,
}

impl CycleGuard<'_> {
    fn advance(&self, next: CycleState) {
        *self.state.lock() = next;
        tracing::debug!(state = ?next, "cycle state");
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock() = CycleState::Idle;
    }
}

enum Begin<'a> {
    Busy,
    Empty,
    Started(CycleGuard<'a>, Vec<QueuedOperation>),
}

struct SubmissionFailure {
    tx_hash: Option<B256>,
    error: SubmitError,
}

impl BundlerEngine {
    pub fn new(
        config: EngineConfig,
        queue: Arc<IntakeQueue>,
        client: Arc<dyn ExecutionClient>,
        classifier: ErrorClassifier,
    ) -> Self {
        let assembler = BatchAssembler::new(config.entry_point, client.operator());
        Self {
            queue,
            state: Mutex::new(CycleState::Idle),
            client,
            assembler,
            correlator: OutcomeCorrelator::new(config.correlation),
            classifier,
            target: config.target,
            gas_limit: config.gas_limit,
        }
    }

    pub fn queue(&self) -> &Arc<IntakeQueue> {
        &self.queue
    }

    pub fn state(&self) -> CycleState {
        *self.state.lock()
    }

    /// Run one cycle if the engine is idle and operations are waiting.
    pub async fn tick(&self) -> TickOutcome {
        let (guard, drained) = match self.begin() {
            Begin::Busy => {
                tracing::debug!("cycle in flight, tick dropped");
                return TickOutcome::Busy;
            }
            Begin::Empty => return TickOutcome::Empty,
            Begin::Started(guard, drained) => (guard, drained),
        };

        let cycle_id = Uuid::new_v4();
        let span = CycleSpan::new(&cycle_id, drained.len());
        let outcome = self
            .run_cycle(&guard, cycle_id, drained)
            .instrument(span.clone())
            .await;

        match &outcome {
            TickOutcome::Completed(summary) => {
                if let Some(hash) = summary.tx_hash {
                    span.record("tx_hash", tracing::field::display(hash));
                }
                span.record_result::<(), String>(&Ok(()));
            }
            TickOutcome::Failed(summary) => {
                let message = summary.error.as_ref().map(ToString::to_string).unwrap_or_default();
                span.record_result::<(), String>(&Err(message));
            }
            TickOutcome::Busy | TickOutcome::Empty => {}
        }
        drop(guard);
        outcome
    }

    fn begin(&self) -> Begin<'_> {
        let mut state = self.state.lock();
        if *state != CycleState::Idle {
            return Begin::Busy;
        }
        let drained = self.queue.drain_all();
        if drained.is_empty() {
            return Begin::Empty;
        }
        *state = CycleState::Assembling;
        Begin::Started(CycleGuard { state: &self.state }, drained)
    }

    async fn run_cycle(
        &self,
        guard: &CycleGuard<'_>,
        cycle_id: Uuid,
        drained: Vec<QueuedOperation>,
    ) -> TickOutcome {
        let ordered = order_by_fee(drained);
        self.trace_ordered(&ordered);
        let prepared = self.assembler.assemble(cycle_id, ordered);

        guard.advance(CycleState::Submitting);
        let submitted = self.submit(&prepared).await;

        guard.advance(CycleState::Resolving);
        match submitted {
            Ok(receipt) => self.resolve_confirmed(prepared.batch, receipt),
            Err(failure) => self.resolve_failed(prepared.batch, failure),
        }
    }

    async fn submit(&self, prepared: &PreparedBatch) -> Result<Receipt, SubmissionFailure> {
        let tx = self.assembler.transaction(prepared, self.gas_limit);
        let tx_hash = self
            .client
            .send_transaction(tx)
            .await
            .map_err(|error| SubmissionFailure { tx_hash: None, error })?;

        tracing::info!(
            operations = prepared.batch.len(),
            %tx_hash,
            "batch sent"
        );

        self.client
            .wait_for_receipt(tx_hash)
            .await
            .map_err(|error| SubmissionFailure { tx_hash: Some(tx_hash), error })
    }

    fn resolve_confirmed(&self, batch: Batch, receipt: Receipt) -> TickOutcome {
        tracing::info!(gas_used = %receipt.gas_used, tx_hash = %receipt.tx_hash, "batch confirmed");

        let report = self.correlator.correlate(&batch.submitted(), &receipt.logs);
        trace_report(&report);
        telemetry::record_cycle("confirmed", batch.len());
        telemetry::record_uncorrelated(report.uncorrelated.len());

        let mut handled: HashMap<_, _> = report
            .correlated
            .iter()
            .map(|c| (c.operation_id, (c.success, c.reason.clone())))
            .collect();
        let operations = batch.len();
        for queued in batch.operations {
            let outcome = match handled.remove(&queued.id) {
                Some((success, reason)) => {
                    OperationOutcome::Handled { success, reason, tx_hash: receipt.tx_hash }
                }
                None => OperationOutcome::Unresolved { tx_hash: receipt.tx_hash },
            };
            queued.resolve(outcome);
        }

        TickOutcome::Completed(CycleSummary {
            cycle_id: batch.cycle_id,
            operations,
            tx_hash: Some(receipt.tx_hash),
            gas_used: Some(receipt.gas_used),
            report: Some(report),
            error: None,
        })
    }

    fn resolve_failed(&self, batch: Batch, failure: SubmissionFailure) -> TickOutcome {
        let operations = batch.len();
        self.classifier.record(batch.cycle_id, operations, &failure.error);
        telemetry::record_cycle("failed", operations);

        let reason = failure.error.to_string();
        for queued in batch.operations {
            queued.resolve(OperationOutcome::BatchFailed { reason: reason.clone() });
        }
        tracing::info!(operations, "discarding failed batch");

        TickOutcome::Failed(CycleSummary {
            cycle_id: batch.cycle_id,
            operations,
            tx_hash: failure.tx_hash,
            gas_used: None,
            report: None,
            error: Some(failure.error),
        })
    }

    fn trace_ordered(&self, ordered: &[QueuedOperation]) {
        tracing::info!(operations = ordered.len(), "assembling batch by maxFeePerGas");
        for (index, queued) in ordered.iter().enumerate() {
            let op = &queued.op;
            tracing::info!(
                index,
                operation = %queued.id,
                nonce = %op.nonce,
                call = %describe_call(&op.call_data, self.target),
                max_fee_per_gas = %op.max_fee_per_gas,
                meta_tx_id = %op.meta_tx_id,
                meta_tx_order_id = %op.meta_tx_order_id,
                user_ops_count = op.user_ops_count,
                call_data_hash = %op.call_data_hash(),
                "batched operation"
            );
        }
    }
}

fn trace_report(report: &CorrelationReport) {
    for event in &report.target_events {
        tracing::info!(action = %event.action, new_value = %event.new_value, "target event");
    }
    for c in &report.correlated {
        tracing::info!(
            operation = %c.operation_id,
            sender = %c.event_sender,
            meta_tx_id = %c.meta_tx_id,
            meta_tx_order_id = %c.meta_tx_order_id,
            user_ops_count = c.user_ops_count,
            success = c.success,
            reason = %c.reason,
            "operation handled"
        );
    }
    for group in &report.groups {
        tracing::info!(
            meta_tx_id = %group.meta_tx_id,
            success = group.success,
            "meta transaction handled"
        );
    }
    for sender in &report.unmatched_events {
        tracing::warn!(%sender, "outcome event matched no batched operation");
    }
    for id in &report.uncorrelated {
        tracing::warn!(operation = %id, "no outcome event for operation");
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
