//! Fuzz target for adjacency table parsing.
//!
//! Tests that the `,A,B` grid parser handles arbitrary input without panicking.

#![no_main]

use bn_core::structure::AdjacencyTable;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(table) = AdjacencyTable::parse(text, ',') {
        // acyclicity check must terminate on any parsed grid
        let _ = table.topological_order();
        if let Ok(rendered) = table.render(',') {
            assert_eq!(AdjacencyTable::parse(&rendered, ',').ok(), Some(table));
        }
    }
});
