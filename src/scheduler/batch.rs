//! Batch assembly.

use alloy_primitives::{Address, Bytes};
use uuid::Uuid;

use super::queue::QueuedOperation;
use crate::chain::abi::encode_handle_ops;
use crate::chain::TransactionRequest;
use crate::operation::{OperationId, UserOperation};

/// One cycle's snapshot, in submitted order. Never mutated after assembly.
#[derive(Debug)]
pub struct Batch {
    pub cycle_id: Uuid,
    pub operations: Vec<QueuedOperation>,
    pub beneficiary: Address,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Operations as encoded, for correlation.
    pub fn submitted(&self) -> Vec<(OperationId, &UserOperation)> {
        self.operations.iter().map(|q| (q.id, &q.op)).collect()
    }
}

/// A batch together with its encoded `handleOps` call.
#[derive(Debug)]
pub struct PreparedBatch {
    pub batch: Batch,
    pub calldata: Bytes,
}

/// Encodes ordered operations into a single EntryPoint call.
#[derive(Debug, Clone)]
pub struct BatchAssembler {
    entry_point: Address,
    beneficiary: Address,
}

impl BatchAssembler {
    /// `beneficiary` is the operator identity credited with residual value.
    pub fn new(entry_point: Address, beneficiary: Address) -> Self {
        Self { entry_point, beneficiary }
    }

    /// Encode `ordered` as-is. Ordering is the caller's concern.
    pub fn assemble(&self, cycle_id: Uuid, ordered: Vec<QueuedOperation>) -> PreparedBatch {
        let calldata = encode_handle_ops(ordered.iter().map(|q| &q.op), self.beneficiary);
        PreparedBatch {
            batch: Batch { cycle_id, operations: ordered, beneficiary: self.beneficiary },
            calldata,
        }
    }

    /// The transaction carrying `prepared` to the EntryPoint.
    pub fn transaction(&self, prepared: &PreparedBatch, gas_limit: u64) -> TransactionRequest {
        TransactionRequest { to: self.entry_point, data: prepared.calldata.clone(), gas_limit }
    }
}
