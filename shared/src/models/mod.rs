//! Domain models for the warehouse inventory system

mod document;
mod item;
mod stock;

pub use document::*;
pub use item::*;
pub use stock::*;
