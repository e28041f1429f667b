//! Shared types and models for the Stockroom inventory platform
//!
//! This crate contains the domain model and the pure business rules
//! (subtotals, running balances, stock movements) used by the backend
//! workflows. It performs no I/O.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
