//! Fuzz target for query expression parsing.
//!
//! Tests that `P(C|A=1,...)` parsing handles arbitrary input without panicking
//! and that accepted queries survive a canonical round trip.

#![no_main]

use bn_core::query::parse_query;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(query) = parse_query(text) {
        let again = parse_query(&query.canonical()).expect("canonical form must parse");
        assert_eq!(query, again);
    }
});
