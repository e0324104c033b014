//! Scheduler building blocks through the public API.

mod common;

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;

use common::{user_op, ENTRY_POINT, OPERATOR};
use meta_bundler::chain::abi::handleOpsCall;
use meta_bundler::outcome::OperationOutcome;
use meta_bundler::scheduler::{order_by_fee, BatchAssembler, IntakeQueue};
use uuid::Uuid;

#[test]
fn queue_assigns_increasing_ids() {
    let queue = IntakeQueue::new();
    let ids: Vec<_> = (1..=5).map(|i| queue.enqueue(user_op(i, 1))).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn drain_then_order_then_assemble() {
    let queue = IntakeQueue::new();
    queue.enqueue(user_op(0xa, 5));
    queue.enqueue(user_op(0xb, 10));
    queue.enqueue(user_op(0xc, 5));

    let ordered = order_by_fee(queue.drain_all());
    assert!(queue.is_empty());

    let assembler = BatchAssembler::new(ENTRY_POINT, OPERATOR);
    let prepared = assembler.assemble(Uuid::new_v4(), ordered);
    let call = handleOpsCall::abi_decode(&prepared.calldata, true).unwrap();

    let senders: Vec<_> = call.ops.iter().map(|o| o.sender).collect();
    assert_eq!(
        senders,
        vec![Address::repeat_byte(0xb), Address::repeat_byte(0xa), Address::repeat_byte(0xc)]
    );
    assert_eq!(call.beneficiary, OPERATOR);

    let tx = assembler.transaction(&prepared, 3_000_000);
    assert_eq!(tx.to, ENTRY_POINT);
    assert_eq!(tx.gas_limit, 3_000_000);
}

#[test]
fn ordering_keeps_every_operation() {
    let queue = IntakeQueue::new();
    for i in 0..100u8 {
        queue.enqueue(user_op(i, u64::from(i % 7)));
    }
    let ordered = order_by_fee(queue.drain_all());
    assert_eq!(ordered.len(), 100);
    assert!(ordered.windows(2).all(|w| w[0].op.max_fee_per_gas >= w[1].op.max_fee_per_gas));
    // Equal fees keep arrival order.
    assert!(ordered
        .windows(2)
        .filter(|w| w[0].op.max_fee_per_gas == w[1].op.max_fee_per_gas)
        .all(|w| w[0].id < w[1].id));
    assert_eq!(ordered[0].op.max_fee_per_gas, U256::from(6));
}

#[tokio::test]
async fn discarded_operation_closes_outcome_channel() {
    let queue = IntakeQueue::new();
    let (_, rx) = queue.enqueue_with_outcome(user_op(1, 1));
    let (_, rx2) = queue.enqueue_with_outcome(user_op(2, 1));

    let mut drained = queue.drain_all();
    drained.remove(0).resolve(OperationOutcome::BatchFailed { reason: "nonce too low".into() });
    drop(drained);

    assert_eq!(rx.await.unwrap(), OperationOutcome::BatchFailed { reason: "nonce too low".into() });
    assert!(rx2.await.is_err());
}
