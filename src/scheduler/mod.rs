//! Operation scheduling for the bundler.
//!
//! Manages the intake queue, fee ordering, batch assembly, the cycle state
//! machine, and the periodic ticker that drives it.

mod batch;
mod engine;
mod priority;
mod queue;
#[cfg(test)]
mod testing;
mod ticker;

pub use batch::{Batch, BatchAssembler, PreparedBatch};
pub use engine::{
    BundlerEngine, CycleState, CycleSummary, EngineConfig, TickOutcome, DEFAULT_GAS_LIMIT,
};
pub use priority::{fee_key, order_by_fee};
pub use queue::{IntakeQueue, OutcomeRx, OutcomeTx, QueuedOperation};
pub use ticker::{spawn_scheduler, SchedulerHandle};
