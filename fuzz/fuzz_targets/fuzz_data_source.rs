//! Fuzz target for tabular data loading.
//!
//! Tests that header/row parsing and frequency counting handle arbitrary input
//! without panicking.

#![no_main]

use bn_core::data::{Condition, FrequencyStore};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(store) = FrequencyStore::from_text(text) else {
        return;
    };
    for variable in store.variables() {
        let _ = store.frequency(variable, &Condition::new(), true);
    }
});
