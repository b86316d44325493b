//! Domain operations for the sales dashboard.
//!
//! `web` and the binaries depend on this crate rather than on `entity_api`
//! directly, so entity errors are always translated into `domain::error::Error`
//! before they reach a caller.

// Re-exports from `entity` crate via `entity_api`
pub use entity_api::{orders, products, sales, Id, UNIT_PRICE};

pub mod error;
pub mod order;
pub mod product;
pub mod sale;
pub mod simulation;
