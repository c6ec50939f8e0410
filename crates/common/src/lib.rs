//! Shared identifier types used across the goods reservation workspace.

pub mod types;

pub use types::{NomenclatureId, OrderId, ReserveStatus};
