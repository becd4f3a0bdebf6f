//! Discrete Bayesian Network Core Library
//!
//! This library provides:
//! - A column-major frequency store over categorical tabular data
//! - Pearl π/λ message passing on singly-connected networks
//! - K2 structure learning over a fixed variable ordering
//! - The adjacency-table structure format
//! - Logging setup and stable exit codes for the `bn` binary
//!
//! The binary entry point is in `main.rs`.

pub mod data;
pub mod exit_codes;
pub mod inference;
pub mod learn;
pub mod logging;
pub mod query;
pub mod structure;

pub use data::{Condition, DataSource, Frequency, FrequencyStore, Record};
pub use inference::{BeliefNetwork, BeliefNode, PropagationTrace, StateMap};
pub use learn::{K2Config, LearnedStructure, StructureLearner};
pub use query::{parse_query, Query};
pub use structure::AdjacencyTable;
