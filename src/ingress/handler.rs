//! Request handling and the HTTP router.

use std::sync::Arc;

use alloy_primitives::Address;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

use super::protocol::{decode_request, IngressError, RpcRequest, RpcResponse, SEND_USER_OPERATION};
use crate::operation::{OperationId, UserOperation};
use crate::scheduler::IntakeQueue;

/// Accepts operations addressed to the configured EntryPoint.
pub struct IngressHandler {
    queue: Arc<IntakeQueue>,
    entry_point: Address,
}

impl IngressHandler {
    pub fn new(queue: Arc<IntakeQueue>, entry_point: Address) -> Self {
        Self { queue, entry_point }
    }

    pub fn entry_point(&self) -> Address {
        self.entry_point
    }

    /// Validate `request` and enqueue its operation.
    ///
    /// The method and the expected EntryPoint are the only checks; the
    /// operation itself is accepted as sent.
    pub fn handle(&self, request: RpcRequest) -> Result<OperationId, IngressError> {
        if request.method != SEND_USER_OPERATION {
            return Err(IngressError::UnsupportedMethod(request.method));
        }

        let mut params = request.params.into_iter();
        let (Some(op), Some(expected)) = (params.next(), params.next()) else {
            return Err(IngressError::InvalidParams(
                "expected [userOperation, entryPoint]".to_string(),
            ));
        };

        let Value::String(received) = expected else {
            return Err(IngressError::InvalidParams("entryPoint must be a string".to_string()));
        };
        let configured = self.entry_point.to_string();
        if !received.eq_ignore_ascii_case(&configured) {
            tracing::error!(%received, expected = %configured, "EntryPoint mismatch");
            return Err(IngressError::EntryPointMismatch { received, expected: configured });
        }

        let op: UserOperation =
            serde_json::from_value(op).map_err(|e| IngressError::InvalidParams(e.to_string()))?;
        let sender = op.sender;
        let id = self.queue.enqueue(op);
        tracing::info!(operation = %id, %sender, "operation queued");
        Ok(id)
    }
}

/// Build the ingress router: a single `POST /`.
pub fn router(handler: Arc<IngressHandler>) -> Router {
    Router::new().route("/", post(submit)).with_state(handler)
}

async fn submit(
    State(handler): State<Arc<IngressHandler>>,
    body: Bytes,
) -> (StatusCode, Json<RpcResponse>) {
    match decode_request(&body).and_then(|request| handler.handle(request)) {
        Ok(_) => (StatusCode::OK, Json(RpcResponse::queued())),
        Err(e) => {
            tracing::warn!(error = %e, "ingress request rejected");
            (StatusCode::BAD_REQUEST, Json(RpcResponse::rejected(&e)))
        }
    }
}
