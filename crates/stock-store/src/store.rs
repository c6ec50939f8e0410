use std::collections::HashMap;

use async_trait::async_trait;

use crate::{NomenclatureId, OrderId, ReservationLine, Result};

/// Per-item available quantities with conditional decrement and increment.
#[async_trait]
pub trait AvailabilityStore: Send {
    /// Reads the available quantity of every requested item.
    ///
    /// Items without a stock row are absent from the map. Absence is not the
    /// same as zero: it means the item is unknown to the store.
    async fn get_available(
        &mut self,
        ids: &[NomenclatureId],
    ) -> Result<HashMap<NomenclatureId, i32>>;

    /// Decreases the available quantity of an item by `amount`.
    ///
    /// Implementations must check and write in one storage step so two
    /// concurrent callers cannot both pass a stale check. Fails with
    /// `InsufficientStock` if the quantity would drop below zero or the item
    /// has no stock row.
    async fn decrease(&mut self, id: NomenclatureId, amount: i32) -> Result<()>;

    /// Increases the available quantity of an item by `amount`.
    async fn increase(&mut self, id: NomenclatureId, amount: i32) -> Result<()>;
}

/// Per-order set of reserved line items.
#[async_trait]
pub trait ReservationLedger: Send {
    /// Lists the lines of an order in insertion order. An empty list means
    /// the order has no active reservation.
    ///
    /// The returned lines stay locked against other units of work until this
    /// one ends, so two releases of the same order cannot both see them.
    async fn list_lines(&mut self, order_id: &OrderId) -> Result<Vec<ReservationLine>>;

    /// Appends one line. No deduplication is performed.
    async fn insert_line(&mut self, line: &ReservationLine) -> Result<()>;

    /// Removes every line of an order, returning how many were removed.
    async fn delete_lines(&mut self, order_id: &OrderId) -> Result<u64>;
}

/// An atomic, all-or-nothing group of stock and ledger operations.
///
/// Dropping a unit of work without committing discards everything it did.
#[async_trait]
pub trait UnitOfWork: AvailabilityStore + ReservationLedger + Sized {
    /// Makes every change of this unit of work visible at once.
    async fn commit(self) -> Result<()>;

    /// Discards every change of this unit of work.
    async fn rollback(self) -> Result<()>;
}

/// Entry point into a transactional stock storage.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait StockStorage: Send + Sync {
    type Tx: UnitOfWork + 'static;

    /// Opens a new unit of work.
    async fn begin(&self) -> Result<Self::Tx>;

    /// Consistent read of an order's ledger lines outside any unit of work.
    async fn order_lines(&self, order_id: &OrderId) -> Result<Vec<ReservationLine>>;
}
