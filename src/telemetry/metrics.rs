//! Metric recording through the `metrics` facade.
//!
//! Nothing is exported unless the embedding process installs a recorder;
//! without one every call here is a no-op.

use metrics::{counter, gauge, histogram};

/// Queue depth after an append, plus the enqueue counter.
pub fn record_enqueued(depth: usize) {
    counter!("bundler_operations_enqueued_total").increment(1);
    record_queue_depth(depth);
}

pub fn record_queue_depth(depth: usize) {
    gauge!("bundler_queue_depth").set(depth as f64);
}

/// A finished cycle. `result` is `confirmed` or `failed`.
pub fn record_cycle(result: &'static str, batch_size: usize) {
    counter!("bundler_cycles_total", "result" => result).increment(1);
    histogram!("bundler_batch_size").record(batch_size as f64);
}

pub fn record_uncorrelated(count: usize) {
    if count > 0 {
        counter!("bundler_uncorrelated_operations_total").increment(count as u64);
    }
}
