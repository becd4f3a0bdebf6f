//! Fuzz target for engine.json configuration parsing.
//!
//! Tests that JSON engine configuration parsing and validation handle
//! arbitrary input without panicking.

#![no_main]

use bn_config::{validate_engine, EngineConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Try to parse as JSON - should never panic, only return an error
    if let Ok(config) = serde_json::from_slice::<EngineConfig>(data) {
        let _ = validate_engine(&config);
    }
});
