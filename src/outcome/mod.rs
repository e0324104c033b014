//! Batch outcome handling.
//!
//! After a cycle's submission resolves, either the receipt's events are
//! correlated back to the submitted operations, or the failure is
//! classified and appended to the failure log.

pub mod classifier;
mod correlator;
mod failure_log;

use alloy_primitives::B256;

pub use classifier::{classify_rpc_error, ErrorClassifier};
pub use correlator::{
    CorrelatedOutcome, CorrelationReport, CorrelationStrategy, GroupOutcome, OutcomeCorrelator,
    TargetEvent, UnknownStrategy,
};
pub use failure_log::FailureLog;

/// What an opted-in submitter learns about its operation.
///
/// Operations enqueued without a receiver get none of this: their fate is
/// only visible in the bundler's own logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// The batch was confirmed and an outcome event was matched to this operation.
    Handled { success: bool, reason: String, tx_hash: B256 },
    /// The whole batch failed before confirmation.
    BatchFailed { reason: String },
    /// The batch was confirmed but no outcome event was matched to this operation.
    Unresolved { tx_hash: B256 },
}
