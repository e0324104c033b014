//! Telemetry for the bundler.
//!
//! Structured logging, cycle spans, and metrics through the `metrics` facade.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use metrics::{record_cycle, record_enqueued, record_queue_depth, record_uncorrelated};
pub use spans::{CycleSpan, SpanExt};
