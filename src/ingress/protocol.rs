//! Wire format for the ingress endpoint.
//!
//! Requests are `{"method": ..., "params": [operation, entryPoint]}`.
//! Responses are `{"result": ...}` on acceptance and `{"error": ...}`
//! otherwise.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The only supported method.
pub const SEND_USER_OPERATION: &str = "eth_sendUserOperation";

/// Result string returned for every accepted operation.
pub const QUEUED: &str = "UserOperation queued";

const MAX_REQUEST_SIZE: usize = 1024 * 1024; // 1 MiB

/// Reasons an ingress request is rejected. Rejections never reach the queue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngressError {
    #[error("Only eth_sendUserOperation is supported")]
    UnsupportedMethod(String),

    #[error("EntryPoint address mismatch")]
    EntryPointMismatch { received: String, expected: String },

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("Request too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
}

/// A JSON-RPC style ingress request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

/// Ingress response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcResponse {
    Result { result: String },
    Error { error: String },
}

impl RpcResponse {
    pub fn queued() -> Self {
        Self::Result { result: QUEUED.to_string() }
    }

    pub fn rejected(err: &IngressError) -> Self {
        Self::Error { error: err.to_string() }
    }
}

/// Decode a request body, checking its size before parsing.
pub fn decode_request(bytes: &[u8]) -> Result<RpcRequest, IngressError> {
    if bytes.len() > MAX_REQUEST_SIZE {
        return Err(IngressError::TooLarge { size: bytes.len(), max: MAX_REQUEST_SIZE });
    }
    serde_json::from_slice(bytes).map_err(|e| IngressError::Malformed(e.to_string()))
}
