//! Shared types and models for the warehouse inventory system
//!
//! Domain records, request/result shapes, pagination, and the pure rules
//! (validation, totals, numbering) used by the backend.

pub mod models;
pub mod numbering;
pub mod types;
pub mod validation;

pub use models::*;
pub use numbering::*;
pub use types::*;
pub use validation::*;
