//! Meta-transaction bundler.
//!
//! Accepts client-submitted user operations, accumulates them, and on a
//! fixed interval submits everything accumulated as one `handleOps` call,
//! ordered by `maxFeePerGas`. The receipt's per-operation events are
//! correlated back to the submitted operations; failed batches are
//! classified and appended to a plaintext failure log.
//!
//! # Pipeline
//!
//! - **Ingress**: `POST /` with `eth_sendUserOperation`, checked against the configured EntryPoint
//! - **Queue**: arrival-ordered, drained whole at the start of a cycle
//! - **Cycle**: order, assemble, submit, await receipt, correlate or classify
//! - **Delivery**: best-effort; a failed batch is discarded, never retried
//!
//! Signing is delegated to the node holding the operator key.

pub mod chain;
pub mod config;
pub mod ingress;
pub mod operation;
pub mod outcome;
pub mod scheduler;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use chain::ExecutionClient;
use ingress::IngressHandler;
use outcome::{ErrorClassifier, FailureLog};
use scheduler::{BundlerEngine, EngineConfig, IntakeQueue, SchedulerHandle};

/// A wired bundler: queue, cycle engine, and ingress sharing one queue.
pub struct Bundler {
    pub queue: Arc<IntakeQueue>,
    pub engine: Arc<BundlerEngine>,
    pub ingress: Arc<IngressHandler>,
}

impl Bundler {
    pub fn new(config: EngineConfig, client: Arc<dyn ExecutionClient>, failure_log: FailureLog) -> Self {
        let queue = Arc::new(IntakeQueue::new());
        let ingress = Arc::new(IngressHandler::new(queue.clone(), config.entry_point));
        let engine = Arc::new(BundlerEngine::new(
            config,
            queue.clone(),
            client,
            ErrorClassifier::new(failure_log),
        ));

        Self { queue, engine, ingress }
    }

    /// The HTTP router for the ingress endpoint.
    pub fn router(&self) -> axum::Router {
        ingress::router(self.ingress.clone())
    }

    /// Start ticking the engine every `interval`.
    pub fn start_scheduler(&self, interval: Duration) -> SchedulerHandle {
        scheduler::spawn_scheduler(self.engine.clone(), interval)
    }
}
