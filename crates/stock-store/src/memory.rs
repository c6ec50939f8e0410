use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::ensure_positive;
use crate::{
    GoodsItem, NomenclatureId, OrderId, ReservationLine, Result, StoreError,
    store::{AvailabilityStore, ReservationLedger, StockStorage, UnitOfWork},
};

/// Storage steps at which a failure or a stall can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Begin,
    GetAvailable,
    Decrease,
    Increase,
    ListLines,
    InsertLine,
    DeleteLines,
    Commit,
    Rollback,
}

impl std::fmt::Display for FailPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailPoint::Begin => "begin",
            FailPoint::GetAvailable => "get_available",
            FailPoint::Decrease => "decrease",
            FailPoint::Increase => "increase",
            FailPoint::ListLines => "list_lines",
            FailPoint::InsertLine => "insert_line",
            FailPoint::DeleteLines => "delete_lines",
            FailPoint::Commit => "commit",
            FailPoint::Rollback => "rollback",
        };
        f.write_str(name)
    }
}

/// Point-in-time copy of everything the store holds.
///
/// Two snapshots compare equal only if stock and ledger are identical,
/// including ledger line order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockSnapshot {
    pub goods: BTreeMap<NomenclatureId, i32>,
    pub lines: Vec<ReservationLine>,
}

impl StockSnapshot {
    pub fn lines_for(&self, order_id: &OrderId) -> Vec<ReservationLine> {
        self.lines
            .iter()
            .filter(|l| &l.order_id == order_id)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Default)]
struct Injections {
    failures: Vec<FailPoint>,
    stalls: HashMap<FailPoint, Duration>,
}

impl Injections {
    /// Consumes a pending failure for `point`, if any.
    fn take_failure(&mut self, point: FailPoint) -> Result<()> {
        if let Some(pos) = self.failures.iter().position(|p| *p == point) {
            self.failures.remove(pos);
            return Err(StoreError::Injected(point.to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Shared {
    committed: StockSnapshot,
    injections: Injections,
}

/// In-memory stock store for tests and local runs.
///
/// Units of work are serialised behind a single async mutex and operate on a
/// staged copy of the data, which replaces the committed data on commit.
/// This gives every unit of work full isolation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStockStore {
    shared: Arc<Mutex<Shared>>,
}

impl InMemoryStockStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with the given stock rows.
    pub fn with_goods(goods: impl IntoIterator<Item = GoodsItem>) -> Self {
        let committed = StockSnapshot {
            goods: goods
                .into_iter()
                .map(|g| (g.id, g.available_quantity))
                .collect(),
            lines: Vec::new(),
        };
        Self {
            shared: Arc::new(Mutex::new(Shared {
                committed,
                injections: Injections::default(),
            })),
        }
    }

    /// Creates or overwrites a stock row.
    pub async fn set_available(&self, id: impl Into<NomenclatureId>, quantity: i32) {
        let mut shared = self.shared.lock().await;
        shared.committed.goods.insert(id.into(), quantity);
    }

    /// Returns the committed available quantity of an item.
    pub async fn available(&self, id: impl Into<NomenclatureId>) -> Option<i32> {
        let shared = self.shared.lock().await;
        shared.committed.goods.get(&id.into()).copied()
    }

    /// Returns a copy of all committed data.
    pub async fn snapshot(&self) -> StockSnapshot {
        self.shared.lock().await.committed.clone()
    }

    /// Makes the next call at `point` fail with [`StoreError::Injected`].
    pub async fn fail_next(&self, point: FailPoint) {
        self.shared.lock().await.injections.failures.push(point);
    }

    /// Makes every call at `point` sleep for `delay` before proceeding.
    pub async fn stall_at(&self, point: FailPoint, delay: Duration) {
        self.shared
            .lock()
            .await
            .injections
            .stalls
            .insert(point, delay);
    }

    /// Removes every pending failure and stall.
    pub async fn clear_injections(&self) {
        self.shared.lock().await.injections = Injections::default();
    }
}

#[async_trait]
impl StockStorage for InMemoryStockStore {
    type Tx = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<InMemoryUnitOfWork> {
        let mut guard = self.shared.clone().lock_owned().await;
        guard.injections.take_failure(FailPoint::Begin)?;
        let staged = guard.committed.clone();
        Ok(InMemoryUnitOfWork { guard, staged })
    }

    async fn order_lines(&self, order_id: &OrderId) -> Result<Vec<ReservationLine>> {
        let mut shared = self.shared.lock().await;
        shared.injections.take_failure(FailPoint::ListLines)?;
        Ok(shared.committed.lines_for(order_id))
    }
}

/// A unit of work over [`InMemoryStockStore`].
///
/// Holds the store's lock for its whole lifetime.
pub struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<Shared>,
    staged: StockSnapshot,
}

impl InMemoryUnitOfWork {
    async fn enter(&mut self, point: FailPoint) -> Result<()> {
        if let Some(delay) = self.guard.injections.stalls.get(&point).copied() {
            tokio::time::sleep(delay).await;
        }
        self.guard.injections.take_failure(point)
    }
}

#[async_trait]
impl AvailabilityStore for InMemoryUnitOfWork {
    async fn get_available(
        &mut self,
        ids: &[NomenclatureId],
    ) -> Result<HashMap<NomenclatureId, i32>> {
        self.enter(FailPoint::GetAvailable).await?;

        let mut found = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(&quantity) = self.staged.goods.get(id) {
                if quantity < 0 {
                    return Err(StoreError::InvariantViolation(format!(
                        "nomenclature {id} has negative available quantity {quantity}"
                    )));
                }
                found.insert(*id, quantity);
            }
        }
        Ok(found)
    }

    async fn decrease(&mut self, id: NomenclatureId, amount: i32) -> Result<()> {
        ensure_positive(id, amount)?;
        self.enter(FailPoint::Decrease).await?;

        match self.staged.goods.get_mut(&id) {
            Some(quantity) if *quantity >= amount => {
                *quantity -= amount;
                Ok(())
            }
            _ => Err(StoreError::InsufficientStock {
                nomenclature_id: id,
                requested: amount,
            }),
        }
    }

    async fn increase(&mut self, id: NomenclatureId, amount: i32) -> Result<()> {
        ensure_positive(id, amount)?;
        self.enter(FailPoint::Increase).await?;

        let quantity = self.staged.goods.get_mut(&id).ok_or_else(|| {
            StoreError::InvariantViolation(format!("nomenclature {id} has no stock row"))
        })?;
        *quantity = quantity.checked_add(amount).ok_or_else(|| {
            StoreError::InvariantViolation(format!("available quantity of {id} overflows"))
        })?;
        Ok(())
    }
}

#[async_trait]
impl ReservationLedger for InMemoryUnitOfWork {
    async fn list_lines(&mut self, order_id: &OrderId) -> Result<Vec<ReservationLine>> {
        self.enter(FailPoint::ListLines).await?;
        Ok(self.staged.lines_for(order_id))
    }

    async fn insert_line(&mut self, line: &ReservationLine) -> Result<()> {
        ensure_positive(line.nomenclature_id, line.quantity_reserved)?;
        self.enter(FailPoint::InsertLine).await?;

        if !self.staged.goods.contains_key(&line.nomenclature_id) {
            return Err(StoreError::InvariantViolation(format!(
                "nomenclature {} has no stock row",
                line.nomenclature_id
            )));
        }
        self.staged.lines.push(line.clone());
        Ok(())
    }

    async fn delete_lines(&mut self, order_id: &OrderId) -> Result<u64> {
        self.enter(FailPoint::DeleteLines).await?;

        let before = self.staged.lines.len();
        self.staged.lines.retain(|l| &l.order_id != order_id);
        Ok((before - self.staged.lines.len()) as u64)
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn commit(mut self) -> Result<()> {
        self.enter(FailPoint::Commit).await?;
        let staged = std::mem::take(&mut self.staged);
        self.guard.committed = staged;
        Ok(())
    }

    async fn rollback(mut self) -> Result<()> {
        self.enter(FailPoint::Rollback).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(items: &[(i32, i32)]) -> InMemoryStockStore {
        InMemoryStockStore::with_goods(items.iter().map(|&(id, q)| GoodsItem::new(id, q)))
    }

    #[tokio::test]
    async fn get_available_omits_unknown_ids() {
        let store = store_with(&[(101, 5), (102, 0)]);
        let mut tx = store.begin().await.unwrap();

        let found = tx
            .get_available(&[101.into(), 102.into(), 999.into()])
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[&NomenclatureId::new(101)], 5);
        assert_eq!(found[&NomenclatureId::new(102)], 0);
        assert!(!found.contains_key(&NomenclatureId::new(999)));
    }

    #[tokio::test]
    async fn decrease_rejects_going_negative() {
        let store = store_with(&[(101, 3)]);
        let mut tx = store.begin().await.unwrap();

        let result = tx.decrease(101.into(), 4).await;
        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock { requested: 4, .. })
        ));

        tx.decrease(101.into(), 3).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.available(101).await, Some(0));
    }

    #[tokio::test]
    async fn decrease_unknown_item_is_insufficient() {
        let store = store_with(&[]);
        let mut tx = store.begin().await.unwrap();

        let result = tx.decrease(7.into(), 1).await;
        assert!(matches!(result, Err(StoreError::InsufficientStock { .. })));
    }

    #[tokio::test]
    async fn non_positive_amounts_rejected() {
        let store = store_with(&[(101, 3)]);
        let mut tx = store.begin().await.unwrap();

        assert!(matches!(
            tx.decrease(101.into(), 0).await,
            Err(StoreError::InvalidAmount { amount: 0, .. })
        ));
        assert!(matches!(
            tx.increase(101.into(), -2).await,
            Err(StoreError::InvalidAmount { amount: -2, .. })
        ));
    }

    #[tokio::test]
    async fn dropped_unit_of_work_discards_changes() {
        let store = store_with(&[(101, 5)]);
        let before = store.snapshot().await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.decrease(101.into(), 2).await.unwrap();
            tx.insert_line(&ReservationLine::new("A", 101, 2))
                .await
                .unwrap();
        }

        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn explicit_rollback_discards_changes() {
        let store = store_with(&[(101, 5)]);

        let mut tx = store.begin().await.unwrap();
        tx.increase(101.into(), 10).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.available(101).await, Some(5));
    }

    #[tokio::test]
    async fn ledger_lines_are_not_deduplicated() {
        let store = store_with(&[(101, 5)]);
        let order = OrderId::new("A");

        let mut tx = store.begin().await.unwrap();
        tx.insert_line(&ReservationLine::new("A", 101, 1))
            .await
            .unwrap();
        tx.insert_line(&ReservationLine::new("A", 101, 1))
            .await
            .unwrap();
        tx.insert_line(&ReservationLine::new("B", 101, 2))
            .await
            .unwrap();
        assert_eq!(tx.list_lines(&order).await.unwrap().len(), 2);

        assert_eq!(tx.delete_lines(&order).await.unwrap(), 2);
        assert!(tx.list_lines(&order).await.unwrap().is_empty());
        tx.commit().await.unwrap();

        let lines = store.order_lines(&OrderId::new("B")).await.unwrap();
        assert_eq!(lines, vec![ReservationLine::new("B", 101, 2)]);
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let store = store_with(&[(101, 5)]);
        store.fail_next(FailPoint::Decrease).await;

        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.decrease(101.into(), 1).await,
            Err(StoreError::Injected(_))
        ));
        tx.decrease(101.into(), 1).await.unwrap();
    }

    #[tokio::test]
    async fn failed_commit_leaves_committed_data() {
        let store = store_with(&[(101, 5)]);
        store.fail_next(FailPoint::Commit).await;

        let mut tx = store.begin().await.unwrap();
        tx.decrease(101.into(), 5).await.unwrap();
        assert!(tx.commit().await.is_err());

        assert_eq!(store.available(101).await, Some(5));
    }

    #[tokio::test]
    async fn units_of_work_are_serialised() {
        let store = store_with(&[(101, 5)]);

        let mut first = store.begin().await.unwrap();
        first.decrease(101.into(), 5).await.unwrap();

        let second = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut tx = store.begin().await.unwrap();
                let result = tx.decrease(101.into(), 1).await;
                tx.rollback().await.unwrap();
                result
            })
        };

        first.commit().await.unwrap();
        let result = second.await.unwrap();
        assert!(matches!(result, Err(StoreError::InsufficientStock { .. })));
    }
}
