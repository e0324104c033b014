//! Inbound operation surface.
//!
//! A single JSON endpoint that checks the method and the expected
//! EntryPoint address, then hands the operation to the intake queue.

mod handler;
pub mod protocol;

pub use handler::{router, IngressHandler};
pub use protocol::{decode_request, IngressError, RpcRequest, RpcResponse};
