//! End-to-end cycle behavior through the public API.

mod common;

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use serde_json::json;

use common::{handled_log, user_op, Script, ScriptedClient, ENTRY_POINT};
use meta_bundler::chain::SubmitError;
use meta_bundler::outcome::{CorrelationStrategy, FailureLog};
use meta_bundler::scheduler::{CycleState, EngineConfig, TickOutcome};
use meta_bundler::Bundler;

fn bundler(client: Arc<ScriptedClient>, config: EngineConfig) -> (Bundler, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let log = FailureLog::new(dir.path().join("failures.log"));
    (Bundler::new(config, client, log), dir)
}

fn read_log(dir: &tempfile::TempDir) -> String {
    std::fs::read_to_string(dir.path().join("failures.log")).unwrap_or_default()
}

#[tokio::test]
async fn assembled_order_is_b_a_c() {
    let client = Arc::new(ScriptedClient::new(Script::HandleAll));
    let (bundler, _dir) = bundler(client.clone(), EngineConfig::new(ENTRY_POINT));

    bundler.queue.enqueue(user_op(0xa, 5));
    bundler.queue.enqueue(user_op(0xb, 10));
    bundler.queue.enqueue(user_op(0xc, 5));
    assert!(matches!(bundler.engine.tick().await, TickOutcome::Completed(_)));

    assert_eq!(
        client.batches(),
        vec![vec![Address::repeat_byte(0xb), Address::repeat_byte(0xa), Address::repeat_byte(0xc)]]
    );
}

#[tokio::test]
async fn batch_is_whole_queue_stably_sorted() {
    let client = Arc::new(ScriptedClient::new(Script::HandleAll));
    let (bundler, _dir) = bundler(client.clone(), EngineConfig::new(ENTRY_POINT));

    let fees = [3u64, 9, 3, 1, 9, 7, 3, 0];
    for (i, fee) in fees.iter().enumerate() {
        bundler.queue.enqueue(user_op(i as u8 + 1, *fee));
    }
    bundler.engine.tick().await;

    let mut expected: Vec<(u64, u8)> =
        fees.iter().enumerate().map(|(i, fee)| (*fee, i as u8 + 1)).collect();
    expected.sort_by(|a, b| b.0.cmp(&a.0));
    let expected: Vec<_> = expected.into_iter().map(|(_, s)| Address::repeat_byte(s)).collect();

    assert_eq!(client.batches(), vec![expected]);
    assert!(bundler.queue.is_empty());
}

#[tokio::test]
async fn fees_above_64_bits_sort_numerically() {
    let client = Arc::new(ScriptedClient::new(Script::HandleAll));
    let (bundler, _dir) = bundler(client.clone(), EngineConfig::new(ENTRY_POINT));

    let mut big = user_op(0xb, 0);
    big.max_fee_per_gas = U256::from(1u8) << 200;
    bundler.queue.enqueue(user_op(0xa, u64::MAX));
    bundler.queue.enqueue(big);
    bundler.engine.tick().await;

    assert_eq!(client.batches()[0], vec![Address::repeat_byte(0xb), Address::repeat_byte(0xa)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cycles_never_overlap() {
    let client = Arc::new(ScriptedClient::new(Script::HandleAll).with_delay(Duration::from_millis(20)));
    let (bundler, _dir) = bundler(client.clone(), EngineConfig::new(ENTRY_POINT));

    let mut tasks = Vec::new();
    for round in 0..20u8 {
        bundler.queue.enqueue(user_op(round + 1, round as u64));
        let engine = bundler.engine.clone();
        tasks.push(tokio::spawn(async move { engine.tick().await }));
    }
    let mut busy = 0;
    for task in tasks {
        if matches!(task.await.unwrap(), TickOutcome::Busy) {
            busy += 1;
        }
    }

    assert_eq!(client.max_in_flight(), 1);
    assert!(busy > 0);
    assert_eq!(bundler.engine.state(), CycleState::Idle);

    // Whatever was not drained by a winning tick is still queued, exactly once.
    let submitted: usize = client.batches().iter().map(Vec::len).sum();
    assert_eq!(submitted + bundler.queue.len(), 20);
}

#[tokio::test]
async fn scheduler_ticks_drain_everything_exactly_once() {
    let client = Arc::new(ScriptedClient::new(Script::HandleAll).with_delay(Duration::from_millis(5)));
    let (bundler, _dir) = bundler(client.clone(), EngineConfig::new(ENTRY_POINT));
    let scheduler = bundler.start_scheduler(Duration::from_millis(2));

    for i in 0..30u8 {
        bundler.queue.enqueue(user_op(i + 1, (i % 5) as u64));
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    tokio::time::timeout(Duration::from_secs(5), async {
        while !bundler.queue.is_empty() || bundler.engine.state() != CycleState::Idle {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    scheduler.shutdown().await.unwrap();

    let mut senders: Vec<_> = client.batches().into_iter().flatten().collect();
    assert_eq!(senders.len(), 30);
    senders.sort();
    senders.dedup();
    assert_eq!(senders.len(), 30);
    assert_eq!(client.max_in_flight(), 1);
}

#[tokio::test]
async fn revert_reason_reaches_failure_log() {
    let payload = "0x08c379a0\
        0000000000000000000000000000000000000000000000000000000000000020\
        0000000000000000000000000000000000000000000000000000000000000014\
        696e73756666696369656e742062616c616e6365000000000000000000000000";
    let err = meta_bundler::outcome::classify_rpc_error("execution reverted", Some(&json!(payload)));
    let client = Arc::new(ScriptedClient::new(Script::Reject(err)));
    let (bundler, dir) = bundler(client, EngineConfig::new(ENTRY_POINT));

    bundler.queue.enqueue(user_op(0xa, 1));
    assert!(matches!(bundler.engine.tick().await, TickOutcome::Failed(_)));

    let log = read_log(&dir);
    assert_eq!(log.lines().count(), 1);
    assert!(log.contains("insufficient balance"));
    assert!(bundler.queue.is_empty());
}

#[tokio::test]
async fn object_payload_is_logged_serialized() {
    let detail = json!({ "code": 3, "message": "out of gas", "data": { "gasUsed": 21000 } });
    let err = meta_bundler::outcome::classify_rpc_error("failed", Some(&detail));
    assert_eq!(err, SubmitError::Opaque(detail.clone()));

    let client = Arc::new(ScriptedClient::new(Script::Reject(err)));
    let (bundler, dir) = bundler(client, EngineConfig::new(ENTRY_POINT));
    bundler.queue.enqueue(user_op(0xa, 1));
    bundler.engine.tick().await;

    assert!(read_log(&dir).contains(&detail.to_string()));
}

#[tokio::test]
async fn queue_after_failure_holds_only_late_arrivals() {
    let client = Arc::new(
        ScriptedClient::new(Script::Reject(SubmitError::Submission("nonce too low".into())))
            .with_delay(Duration::from_millis(10)),
    );
    let (bundler, _dir) = bundler(client, EngineConfig::new(ENTRY_POINT));
    bundler.queue.enqueue(user_op(0xa, 1));
    bundler.queue.enqueue(user_op(0xb, 2));

    bundler.engine.tick().await;
    bundler.queue.enqueue(user_op(0xc, 3));
    assert_eq!(bundler.queue.len(), 1);
}

/// Two events, three operations: with positional correlation the events
/// are reported against the first two operations taken from the tracking
/// list, in emission order.
#[tokio::test]
async fn positional_strategies_consume_tracking_list_front() {
    let logs = vec![
        handled_log(Address::repeat_byte(0xb), true),
        handled_log(Address::repeat_byte(0xa), false),
    ];

    for (strategy, expected) in [
        (CorrelationStrategy::SubmissionOrder, [0xb, 0xa]),
        (CorrelationStrategy::ArrivalOrder, [0xa, 0xb]),
    ] {
        let client = Arc::new(ScriptedClient::new(Script::Logs(logs.clone())));
        let mut config = EngineConfig::new(ENTRY_POINT);
        config.correlation = strategy;
        let (bundler, _dir) = bundler(client, config);
        bundler.queue.enqueue(user_op(0xa, 5));
        bundler.queue.enqueue(user_op(0xb, 10));
        bundler.queue.enqueue(user_op(0xc, 5));

        let TickOutcome::Completed(summary) = bundler.engine.tick().await else {
            panic!("cycle did not complete");
        };
        let report = summary.report.unwrap();
        let senders: Vec<_> = report.correlated.iter().map(|c| c.sender).collect();
        assert_eq!(
            senders,
            vec![Address::repeat_byte(expected[0]), Address::repeat_byte(expected[1])],
            "{strategy}"
        );
        assert_eq!(report.uncorrelated.len(), 1);
    }
}
