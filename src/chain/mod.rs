//! Execution-layer boundary.
//!
//! The ABI codec for the EntryPoint, the `ExecutionClient` seam the
//! scheduler submits through, and a JSON-RPC implementation of it.

pub mod abi;
mod client;
mod rpc;

pub use client::{ExecutionClient, LogRecord, Receipt, SubmitError, TransactionRequest};
pub use rpc::{JsonRpcClient, RpcClientConfig};
