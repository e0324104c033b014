//! Fuzz target for revert payload classification.
//!
//! Classification must succeed for any string payload, including ones that
//! carry the `Error(string)` selector followed by garbage.

#![no_main]

use libfuzzer_sys::fuzz_target;
use meta_bundler::outcome::classifier::failure_message;
use meta_bundler::outcome::classify_rpc_error;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let hex: String = data.iter().map(|b| format!("{b:02x}")).collect();
    for raw in [format!("0x08c379a0{hex}"), String::from_utf8_lossy(data).into_owned()] {
        let err = classify_rpc_error("execution reverted", Some(&Value::String(raw)));
        let _ = failure_message(&err);
    }
});
