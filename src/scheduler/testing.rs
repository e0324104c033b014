//! Shared fixtures for scheduler unit tests.

use std::collections::BTreeSet;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::engine::{BundlerEngine, EngineConfig};
use super::queue::IntakeQueue;
use crate::chain::abi::{handleOpsCall, MetaTransactionHandled, UserOpHandled};
use crate::chain::{ExecutionClient, LogRecord, Receipt, SubmitError, TransactionRequest};
use crate::operation::UserOperation;
use crate::outcome::{ErrorClassifier, FailureLog};

pub(crate) const ENTRY_POINT: Address = Address::repeat_byte(0xe0);
pub(crate) const OPERATOR: Address = Address::repeat_byte(0x0f);

pub(crate) fn op(sender: u8, fee: u64) -> UserOperation {
    UserOperation {
        sender: Address::repeat_byte(sender),
        nonce: U256::ZERO,
        init_code: Bytes::new(),
        call_data: Bytes::new(),
        call_gas_limit: U256::from(100_000),
        verification_gas_limit: U256::from(100_000),
        pre_verification_gas: U256::from(21_000),
        max_fee_per_gas: U256::from(fee),
        max_priority_fee_per_gas: U256::from(1),
        paymaster_and_data: Bytes::new(),
        signature: Bytes::new(),
        meta_tx_id: U256::from(sender),
        meta_tx_order_id: U256::ZERO,
        user_ops_count: 1,
    }
}

#[derive(Clone)]
enum Behavior {
    /// Handle every operation successfully, in submitted order.
    Emit,
    /// Confirm the batch with no events.
    Silent,
    RejectSend(SubmitError),
    RejectReceipt(SubmitError),
}

/// In-memory EntryPoint stand-in.
pub(crate) struct MockClient {
    behavior: Behavior,
    sent: Mutex<Vec<TransactionRequest>>,
    /// When set, receipts are held until notified.
    gate: Option<Arc<Notify>>,
}

impl MockClient {
    fn with(behavior: Behavior) -> Self {
        Self { behavior, sent: Mutex::new(Vec::new()), gate: None }
    }

    pub(crate) fn emitting() -> Self {
        Self::with(Behavior::Emit)
    }

    pub(crate) fn silent() -> Self {
        Self::with(Behavior::Silent)
    }

    pub(crate) fn rejecting_send(err: SubmitError) -> Self {
        Self::with(Behavior::RejectSend(err))
    }

    pub(crate) fn rejecting_receipt(err: SubmitError) -> Self {
        Self::with(Behavior::RejectReceipt(err))
    }

    pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn sent(&self) -> Vec<TransactionRequest> {
        self.sent.lock().clone()
    }

    /// Senders of the most recent batch, in encoded order.
    pub(crate) fn last_senders(&self) -> Vec<Address> {
        self.sent
            .lock()
            .last()
            .map(|tx| decode_ops(&tx.data).into_iter().map(|o| o.0).collect())
            .unwrap_or_default()
    }
}

fn decode_ops(data: &[u8]) -> Vec<(Address, U256)> {
    handleOpsCall::abi_decode(data, true)
        .map(|call| call.ops.iter().map(|o| (o.sender, o.meta_tx_id)).collect())
        .unwrap_or_default()
}

fn log_of<E: SolEvent>(event: &E) -> LogRecord {
    let data = event.encode_log_data();
    LogRecord { address: ENTRY_POINT, topics: data.topics().to_vec(), data: data.data }
}

#[async_trait]
impl ExecutionClient for MockClient {
    fn operator(&self) -> Address {
        OPERATOR
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, SubmitError> {
        if let Behavior::RejectSend(err) = &self.behavior {
            return Err(err.clone());
        }
        let mut sent = self.sent.lock();
        sent.push(tx);
        Ok(B256::with_last_byte(sent.len() as u8))
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<Receipt, SubmitError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let logs = match &self.behavior {
            Behavior::RejectReceipt(err) => return Err(err.clone()),
            Behavior::RejectSend(_) | Behavior::Silent => Vec::new(),
            Behavior::Emit => {
                let data = self.sent.lock().last().map(|tx| tx.data.clone()).unwrap_or_default();
                let ops = decode_ops(&data);
                let mut logs: Vec<_> = ops
                    .iter()
                    .map(|(sender, _)| {
                        log_of(&UserOpHandled { sender: *sender, success: true, reason: String::new() })
                    })
                    .collect();
                let groups: BTreeSet<U256> = ops.iter().map(|o| o.1).collect();
                logs.extend(groups.into_iter().map(|meta_tx_id| {
                    log_of(&MetaTransactionHandled { meta_tx_id, success: true })
                }));
                logs
            }
        };
        Ok(Receipt { tx_hash, success: true, gas_used: U256::from(90_000), logs })
    }
}

/// An engine over `client`, logging failures into a temp dir.
pub(crate) struct Harness {
    pub engine: Arc<BundlerEngine>,
    pub client: Arc<MockClient>,
    pub log_path: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

impl Harness {
    pub(crate) fn new(client: MockClient) -> Self {
        Self::with_config(client, EngineConfig::new(ENTRY_POINT))
    }

    pub(crate) fn with_config(client: MockClient, config: EngineConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("failures.log");
        let client = Arc::new(client);
        let engine = BundlerEngine::new(
            config,
            Arc::new(IntakeQueue::new()),
            client.clone(),
            ErrorClassifier::new(FailureLog::new(&log_path)),
        );
        Self { engine: Arc::new(engine), client, log_path, _dir: dir }
    }

    pub(crate) fn failure_log(&self) -> String {
        std::fs::read_to_string(&self.log_path).unwrap_or_default()
    }
}
