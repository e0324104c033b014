//! JSON-RPC execution client.
//!
//! Submits through `eth_sendTransaction` from the operator account, so the
//! node holds the operator key, then polls `eth_getTransactionReceipt`
//! until the transaction is included. There is no confirmation deadline.
//! A poll that fails in transit is retried; only an error object from the
//! node or a failed receipt ends the wait.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, B256, U256, U64};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::client::{ExecutionClient, LogRecord, Receipt, SubmitError, TransactionRequest};
use crate::outcome::classify_rpc_error;

/// Connection settings for [`JsonRpcClient`].
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    pub url: String,
    pub operator: Address,
    pub receipt_poll_interval: Duration,
}

/// [`ExecutionClient`] over HTTP JSON-RPC.
pub struct JsonRpcClient {
    http: reqwest::Client,
    config: RpcClientConfig,
    next_id: AtomicU64,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    #[serde(default)]
    status: Option<U64>,
    gas_used: U256,
    #[serde(default)]
    logs: Vec<LogRecord>,
}

impl From<RpcReceipt> for Receipt {
    fn from(r: RpcReceipt) -> Self {
        Self {
            tx_hash: r.transaction_hash,
            // Pre-byzantium receipts carry no status; treat as included.
            success: r.status.map_or(true, |s| s == U64::from(1)),
            gas_used: r.gas_used,
            logs: r.logs,
        }
    }
}

impl RpcResponse {
    /// Split a response into its result or a classified failure.
    pub(crate) fn into_result(self) -> Result<Value, SubmitError> {
        if let Some(err) = self.error {
            return Err(classify_rpc_error(&err.message, err.data.as_ref()));
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// Parse a receipt result. `Ok(None)` while the transaction is pending.
pub(crate) fn parse_receipt(value: Value) -> Result<Option<Receipt>, SubmitError> {
    if value.is_null() {
        return Ok(None);
    }
    let receipt: RpcReceipt = serde_json::from_value(value)
        .map_err(|e| SubmitError::Submission(format!("malformed receipt: {e}")))?;
    Ok(Some(receipt.into()))
}

/// Why a JSON-RPC call produced no result.
#[derive(Debug)]
enum CallError {
    /// The request never got a well-formed JSON-RPC answer.
    Transport(String),
    /// The node answered with an error object.
    Rpc(SubmitError),
}

impl From<CallError> for SubmitError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Transport(message) => SubmitError::Submission(message),
            CallError::Rpc(err) => err,
        }
    }
}

impl JsonRpcClient {
    pub fn new(config: RpcClientConfig) -> Self {
        Self { http: reqwest::Client::new(), config, next_id: AtomicU64::new(1) }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, CallError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .http
            .post(&self.config.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CallError::Transport(format!("{method}: {e}")))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| CallError::Transport(format!("{method}: {e}")))?;

        // Some nodes pair error objects with a non-2xx status.
        match serde_json::from_slice::<RpcResponse>(&body) {
            Ok(parsed) if parsed.error.is_some() || status.is_success() => {
                parsed.into_result().map_err(CallError::Rpc)
            }
            Ok(_) => Err(CallError::Transport(format!("{method}: HTTP {status}"))),
            Err(e) if status.is_success() => {
                Err(CallError::Transport(format!("{method}: invalid response: {e}")))
            }
            Err(_) => Err(CallError::Transport(format!("{method}: HTTP {status}"))),
        }
    }

    /// One receipt poll. `Ok(None)` while pending or when the poll itself
    /// failed in transit.
    async fn poll_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>, SubmitError> {
        let result = match self.call("eth_getTransactionReceipt", json!([tx_hash])).await {
            Ok(result) => result,
            Err(CallError::Rpc(err)) => return Err(err),
            Err(CallError::Transport(message)) => {
                tracing::warn!(%tx_hash, error = %message, "receipt poll failed, retrying");
                return Ok(None);
            }
        };
        match parse_receipt(result) {
            Ok(receipt) => Ok(receipt),
            Err(err) => {
                tracing::warn!(%tx_hash, error = %err, "unreadable receipt, retrying");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ExecutionClient for JsonRpcClient {
    fn operator(&self) -> Address {
        self.config.operator
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256, SubmitError> {
        let params = json!([{
            "from": self.config.operator,
            "to": tx.to,
            "data": tx.data,
            "gas": U64::from(tx.gas_limit),
        }]);
        let result = self.call("eth_sendTransaction", params).await?;
        serde_json::from_value(result)
            .map_err(|e| SubmitError::Submission(format!("invalid transaction hash: {e}")))
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<Receipt, SubmitError> {
        loop {
            if let Some(receipt) = self.poll_receipt(tx_hash).await? {
                if !receipt.success {
                    return Err(SubmitError::Submission(format!(
                        "transaction {tx_hash} reverted on-chain"
                    )));
                }
                return Ok(receipt);
            }
            tokio::time::sleep(self.config.receipt_poll_interval).await;
        }
    }
}
