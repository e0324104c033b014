//! Span utilities for bundling cycles.

use tracing::{info_span, Span};
use uuid::Uuid;

/// Extension trait for adding context to spans.
pub trait SpanExt {
    /// Record the result of an operation into the span.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for cycle spans.
pub struct CycleSpan;

impl CycleSpan {
    /// Create a span for one bundling cycle.
    ///
    /// Fields included:
    /// - `cycle_id`: Unique identifier for the cycle
    /// - `operations`: Size of the drained snapshot
    /// - `status`: To be filled in by `SpanExt::record_result`
    /// - `error.message`: To be filled in on failure
    /// - `tx_hash`: To be filled in once the batch is confirmed
    pub fn new(cycle_id: &Uuid, operations: usize) -> Span {
        info_span!(
            "cycle",
            cycle_id = %cycle_id,
            operations = operations,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            tx_hash = tracing::field::Empty,
        )
    }
}
