//! Storage for stock availability and per-order reservation ledgers.
//!
//! The crate defines the contracts the reservation orchestrator consumes
//! ([`AvailabilityStore`], [`ReservationLedger`], [`UnitOfWork`],
//! [`StockStorage`]) and ships two adapters:
//! - [`InMemoryStockStore`] for tests and local runs
//! - [`PostgresStockStore`] backed by sqlx

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{NomenclatureId, OrderId};
pub use error::{Result, StoreError};
pub use memory::{FailPoint, InMemoryStockStore, InMemoryUnitOfWork, StockSnapshot};
pub use model::{GoodsItem, ReservationLine};
pub use postgres::{PostgresStockStore, PostgresUnitOfWork};
pub use store::{AvailabilityStore, ReservationLedger, StockStorage, UnitOfWork};
