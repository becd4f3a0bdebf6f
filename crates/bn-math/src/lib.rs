//! Numerical primitives for discrete Bayesian network learning and inference.

pub mod math;

pub use math::stable::*;
pub use math::dirichlet;
pub use math::k2::*;
