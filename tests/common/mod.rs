//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use parking_lot::Mutex;

use meta_bundler::chain::abi::{handleOpsCall, UserOpHandled};
use meta_bundler::chain::{ExecutionClient, LogRecord, Receipt, SubmitError, TransactionRequest};
use meta_bundler::operation::UserOperation;

pub const ENTRY_POINT: Address = Address::repeat_byte(0xe0);
pub const OPERATOR: Address = Address::repeat_byte(0x0f);

pub fn user_op(sender: u8, fee: u64) -> UserOperation {
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
        meta_tx_id: U256::ZERO,
        meta_tx_order_id: U256::ZERO,
        user_ops_count: 1,
    }
}

pub fn handled_log(sender: Address, success: bool) -> LogRecord {
    let data = UserOpHandled { sender, success, reason: String::new() }.encode_log_data();
    LogRecord { address: ENTRY_POINT, topics: data.topics().to_vec(), data: data.data }
}

/// What the execution layer does with each batch.
#[derive(Clone)]
pub enum Script {
    /// One successful `UserOpHandled` per operation, in encoded order.
    HandleAll,
    /// Confirm with exactly these logs.
    Logs(Vec<LogRecord>),
    /// Reject the submission.
    Reject(SubmitError),
}

/// Scripted [`ExecutionClient`] recording every batch it receives.
pub struct ScriptedClient {
    script: Script,
    delay: Duration,
    batches: Mutex<Vec<Vec<Address>>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            batches: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Hold each receipt for `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Senders of each submitted batch, in encoded order.
    pub fn batches(&self) -> Vec<Vec<Address>> {
        self.batches.lock().clone()
    }

    /// Most submissions ever in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionClient for ScriptedClient {
    fn operator(&self) -> Address {
        OPERATOR
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, SubmitError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let senders = handleOpsCall::abi_decode(&tx.data, true)
            .map(|call| call.ops.iter().map(|o| o.sender).collect())
            .unwrap_or_default();
        let mut batches = self.batches.lock();
        batches.push(senders);
        let hash = B256::with_last_byte(batches.len() as u8);
        drop(batches);

        if let Script::Reject(err) = &self.script {
            self.active.fetch_sub(1, Ordering::SeqCst);
            return Err(err.clone());
        }
        Ok(hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<Receipt, SubmitError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let logs = match &self.script {
            Script::HandleAll => self
                .batches
                .lock()
                .last()
                .map(|senders| senders.iter().map(|s| handled_log(*s, true)).collect())
                .unwrap_or_default(),
            Script::Logs(logs) => logs.clone(),
            Script::Reject(_) => Vec::new(),
        };
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(Receipt { tx_hash, success: true, gas_used: U256::from(50_000), logs })
    }
}
