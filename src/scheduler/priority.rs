//! Fee prioritization.

use alloy_primitives::U256;

use super::queue::QueuedOperation;

/// Sort key for batch inclusion.
pub fn fee_key(op: &QueuedOperation) -> U256 {
    op.op.max_fee_per_gas
}

/// Order a drained snapshot by descending `maxFeePerGas`.
///
/// The sort is stable, so equal fees keep arrival order. Nothing is
/// dropped: the output has exactly the input's operations.
pub fn order_by_fee(mut ops: Vec<QueuedOperation>) -> Vec<QueuedOperation> {
    ops.sort_by(|a, b| fee_key(b).cmp(&fee_key(a)));
    ops
}
