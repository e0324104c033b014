//! Submission failure classification.
//!
//! `classify_rpc_error` runs at the transport boundary and turns a raw
//! JSON-RPC error (message plus optional `data`) into a tagged
//! [`SubmitError`]. `ErrorClassifier` turns that tag into a failure-log
//! line. Neither step can fail: decode problems degrade to the raw payload.

use alloy_primitives::hex;
use alloy_sol_types::{Revert, SolError};
use serde_json::Value;
use uuid::Uuid;

use super::failure_log::FailureLog;
use crate::chain::SubmitError;

/// Hex prefix of an ABI-encoded `Error(string)` payload.
const ERROR_STRING_PREFIX: &str = "0x08c379a0";

/// Classify a JSON-RPC error by the shape of its `data` payload.
pub fn classify_rpc_error(message: &str, data: Option<&Value>) -> SubmitError {
    match data {
        None | Some(Value::Null) => SubmitError::Submission(message.to_string()),
        Some(Value::String(raw)) => classify_revert_data(raw),
        Some(other) => SubmitError::Opaque(other.clone()),
    }
}

fn classify_revert_data(raw: &str) -> SubmitError {
    let is_error_string = raw
        .get(..ERROR_STRING_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(ERROR_STRING_PREFIX));
    if !is_error_string {
        return SubmitError::UndecodedRevert { raw: raw.to_string() };
    }

    match decode_error_string(raw) {
        Some(reason) => SubmitError::Revert { reason },
        None => SubmitError::UndecodedRevert { raw: raw.to_string() },
    }
}

fn decode_error_string(raw: &str) -> Option<String> {
    let bytes = hex::decode(raw).ok()?;
    Revert::abi_decode(&bytes, false).ok().map(|r| r.reason)
}

/// Render the failure-log message for a classified failure.
pub fn failure_message(err: &SubmitError) -> String {
    match err {
        SubmitError::Submission(msg) => format!("batch submission failed: {msg}"),
        SubmitError::Revert { reason } => format!("batch reverted: {reason}"),
        SubmitError::UndecodedRevert { raw } => {
            format!("batch reverted, revert data could not be decoded: {raw}")
        }
        SubmitError::Opaque(detail) => format!("batch failed with opaque error: {detail}"),
    }
}

/// Records submission failures to the persistent failure log.
#[derive(Debug)]
pub struct ErrorClassifier {
    log: FailureLog,
}

impl ErrorClassifier {
    pub fn new(log: FailureLog) -> Self {
        Self { log }
    }

    /// Append a line describing `err` and return the message written.
    ///
    /// A failure to write the log is reported through tracing only.
    pub fn record(&self, cycle_id: Uuid, operations: usize, err: &SubmitError) -> String {
        let message = format!("cycle {cycle_id} ({operations} ops): {}", failure_message(err));

        match err {
            SubmitError::Revert { reason } => {
                tracing::error!(%cycle_id, %reason, "batch reverted");
            }
            SubmitError::UndecodedRevert { raw } => {
                tracing::error!(%cycle_id, %raw, "batch reverted, undecodable revert data");
            }
            SubmitError::Opaque(detail) => {
                tracing::error!(%cycle_id, %detail, "batch failed with opaque error");
            }
            SubmitError::Submission(msg) => {
                tracing::error!(%cycle_id, error = %msg, "batch submission failed");
            }
        }

        if let Err(e) = self.log.append(&message) {
            tracing::error!(
                path = %self.log.path().display(),
                error = %e,
                "failed to append to failure log"
            );
        }
        message
    }
}
