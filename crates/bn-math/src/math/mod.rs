//! Core math modules.

pub mod stable;
pub mod dirichlet;
pub mod k2;
