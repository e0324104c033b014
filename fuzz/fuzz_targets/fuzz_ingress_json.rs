//! Fuzz target for ingress request decoding.
//!
//! Arbitrary request bodies must be accepted or rejected, never panic, and
//! must never reach the queue unless the EntryPoint matches.

#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use meta_bundler::ingress::{decode_request, IngressHandler};
use meta_bundler::scheduler::IntakeQueue;

fuzz_target!(|data: &[u8]| {
    let Ok(request) = decode_request(data) else {
        return;
    };
    let queue = Arc::new(IntakeQueue::new());
    let handler = IngressHandler::new(queue.clone(), Default::default());
    if handler.handle(request).is_err() {
        assert!(queue.is_empty());
    }
});
