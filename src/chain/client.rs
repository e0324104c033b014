//! Submission seam between the scheduler and the execution layer.

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// A transaction the operator wants included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub to: Address,
    pub data: Bytes,
    /// Fixed ceiling, not an estimate.
    pub gas_limit: u64,
}

/// One emitted event record, in emission order within its receipt.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogRecord {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Confirmation of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: B256,
    pub success: bool,
    pub gas_used: U256,
    pub logs: Vec<LogRecord>,
}

/// Failure of a whole-batch submission, tagged by payload shape at the
/// boundary so nothing downstream has to sniff raw error objects.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmitError {
    /// Transport or consensus-level rejection with no structured payload.
    #[error("submission failed: {0}")]
    Submission(String),

    /// Logical rejection carrying a decoded `Error(string)` reason.
    #[error("execution reverted: {reason}")]
    Revert { reason: String },

    /// A string payload that could not be decoded as a revert reason.
    #[error("execution reverted with undecodable payload: {raw}")]
    UndecodedRevert { raw: String },

    /// A structured payload that is not a string.
    #[error("opaque failure: {0}")]
    Opaque(serde_json::Value),
}

/// Signing and submission client for the operator account.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// The operator identity, credited as batch beneficiary.
    fn operator(&self) -> Address;

    /// Submit a signed transaction. Returns its hash once accepted.
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, SubmitError>;

    /// Block until the transaction is included and return its receipt.
    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<Receipt, SubmitError>;
}
