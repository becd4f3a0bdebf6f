//! Structure learning from data.

pub mod k2;

pub use k2::{K2Config, K2Step, LearnedStructure, StructureLearner, VariableReport};
