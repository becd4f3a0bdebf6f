//! Belief propagation over a singly-connected discrete network.

pub mod network;
pub mod node;

pub use network::{BeliefNetwork, NetworkSnapshot, PropagationTrace};
pub use node::{BeliefNode, NodeSnapshot, StateMap};
