//! # Block Code Generation
//!
//! Program source generation for live block graphs.

mod generator;
pub mod order;

pub use generator::*;
pub use order::Order;
