//! Reservation orchestrator.

use std::collections::HashSet;
use std::future::Future;
use std::time::{Duration, Instant};

use common::{NomenclatureId, OrderId, ReserveStatus};
use stock_store::{ReservationLine, StockStorage, UnitOfWork};

use crate::error::{ReservationError, Result};
use crate::request::{OrderReserveStatus, RequestedLine, ReserveRequest};

/// Coordinates the availability store and the reservation ledger.
///
/// Every call runs as exactly one unit of work on the underlying storage.
/// The service holds no locks of its own; mutual exclusion between
/// concurrent callers comes from the storage's isolation guarantees and its
/// conditional decrement.
pub struct ReservationService<S: StockStorage> {
    storage: S,
    timeout: Option<Duration>,
}

impl<S: StockStorage> ReservationService<S> {
    /// Creates a service without a deadline.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            timeout: None,
        }
    }

    /// Bounds every operation by `timeout`. An operation that exceeds it is
    /// dropped, its unit of work rolled back, and `Cancelled` returned.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns a reference to the underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Reserves every requested item for the order, or nothing at all.
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id, lines = request.goods.len()))]
    pub async fn reserve_goods_for_order(&self, request: &ReserveRequest) -> Result<()> {
        let record = OperationRecord::start("reserve");
        let result = match request.parse_lines() {
            Ok(lines) => {
                self.with_deadline(self.reserve_lines(&request.order_id, &lines))
                    .await
            }
            Err(err) => Err(err),
        };

        record.finish(&result);
        match &result {
            Ok(()) => tracing::info!("goods reserved"),
            Err(err) => log_failure("reserve", err),
        }
        result
    }

    /// Releases every reservation line of the order and restores stock.
    ///
    /// Idempotent: an order without lines is a successful no-op.
    #[tracing::instrument(skip(self, order_id), fields(order_id = %order_id))]
    pub async fn unreserve_goods_for_order(&self, order_id: &OrderId) -> Result<()> {
        let record = OperationRecord::start("unreserve");
        let result = self.with_deadline(self.release_lines(order_id)).await;

        record.finish(&result);
        match &result {
            Ok(0) => tracing::debug!("no active reservation, nothing to release"),
            Ok(released) => tracing::info!(released, "goods unreserved"),
            Err(err) => log_failure("unreserve", err),
        }
        result.map(|_| ())
    }

    /// Derives the reservation status of the order from its ledger lines.
    #[tracing::instrument(skip(self, order_id), fields(order_id = %order_id))]
    pub async fn check_order_reserve(&self, order_id: &OrderId) -> Result<OrderReserveStatus> {
        let record = OperationRecord::start("status");
        let result = self
            .with_deadline(async {
                self.storage
                    .order_lines(order_id)
                    .await
                    .map_err(ReservationError::Storage)
            })
            .await
            .map(|lines| OrderReserveStatus {
                order_id: order_id.clone(),
                status: ReserveStatus::from_line_count(lines.len()),
            });

        record.finish(&result);
        if let Err(err) = &result {
            log_failure("status", err);
        }
        result
    }

    async fn reserve_lines(&self, order_id: &OrderId, lines: &[RequestedLine]) -> Result<()> {
        let mut tx = self.storage.begin().await.map_err(ReservationError::Storage)?;

        match apply_reservation(&mut tx, order_id, lines).await {
            Ok(()) => tx.commit().await.map_err(ReservationError::from),
            Err(err) => {
                rollback(tx, "reserve").await;
                Err(err)
            }
        }
    }

    async fn release_lines(&self, order_id: &OrderId) -> Result<usize> {
        let mut tx = self.storage.begin().await.map_err(ReservationError::Storage)?;

        match apply_release(&mut tx, order_id).await {
            Ok(0) => {
                rollback(tx, "unreserve").await;
                Ok(0)
            }
            Ok(released) => tx
                .commit()
                .await
                .map(|()| released)
                .map_err(ReservationError::from),
            Err(err) => {
                rollback(tx, "unreserve").await;
                Err(err)
            }
        }
    }

    async fn with_deadline<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, operation)
                .await
                .unwrap_or(Err(ReservationError::Cancelled)),
            None => operation.await,
        }
    }
}

/// Checks the batch against one snapshot and applies it line by line.
///
/// Sufficiency is always judged against the initial snapshot, even when the
/// same nomenclature appears on several lines. The conditional decrement
/// still rejects any line that would take real stock below zero.
async fn apply_reservation<T: UnitOfWork>(
    tx: &mut T,
    order_id: &OrderId,
    lines: &[RequestedLine],
) -> Result<()> {
    let mut seen = HashSet::with_capacity(lines.len());
    let ids: Vec<NomenclatureId> = lines
        .iter()
        .map(|l| l.nomenclature_id)
        .filter(|id| seen.insert(*id))
        .collect();

    let snapshot = tx.get_available(&ids).await?;
    if snapshot.is_empty() {
        return Err(ReservationError::InsufficientStock {
            nomenclature_id: None,
        });
    }

    for line in lines {
        let available = snapshot.get(&line.nomenclature_id).copied().unwrap_or(0);
        if available - line.quantity < 0 {
            return Err(ReservationError::InsufficientStock {
                nomenclature_id: Some(line.nomenclature_id),
            });
        }

        tx.decrease(line.nomenclature_id, line.quantity).await?;
        tx.insert_line(&ReservationLine {
            order_id: order_id.clone(),
            nomenclature_id: line.nomenclature_id,
            quantity_reserved: line.quantity,
        })
        .await?;
    }
    Ok(())
}

/// Restores stock for every line of the order and clears them. Returns the
/// number of lines released.
async fn apply_release<T: UnitOfWork>(tx: &mut T, order_id: &OrderId) -> Result<usize> {
    let lines = tx.list_lines(order_id).await?;
    if lines.is_empty() {
        return Ok(0);
    }

    for line in &lines {
        tx.increase(line.nomenclature_id, line.quantity_reserved)
            .await?;
    }

    let removed = tx.delete_lines(order_id).await?;
    if removed != lines.len() as u64 {
        return Err(ReservationError::ConsistencyViolation(format!(
            "restored stock for {} lines of order {order_id} but removed {removed}",
            lines.len()
        )));
    }
    Ok(lines.len())
}

/// Rolls back a unit of work. A rollback failure is logged and never
/// replaces the error that triggered it.
async fn rollback<T: UnitOfWork>(tx: T, operation: &'static str) {
    if let Err(err) = tx.rollback().await {
        tracing::error!(operation, error = %err, "failed to rollback the unit of work");
    }
}

/// Records the outcome of one operation.
///
/// A record dropped before [`OperationRecord::finish`] means the caller
/// dropped the operation future mid-flight. Its unit of work was dropped with
/// it, so it is counted as cancelled.
struct OperationRecord {
    operation: &'static str,
    started: Instant,
    finished: bool,
}

impl OperationRecord {
    fn start(operation: &'static str) -> Self {
        Self {
            operation,
            started: Instant::now(),
            finished: false,
        }
    }

    fn finish<T>(mut self, result: &Result<T>) {
        self.finished = true;
        let outcome = match result {
            Ok(_) => "success",
            Err(err) => err.kind(),
        };
        record_outcome(self.operation, self.started, outcome);
    }
}

impl Drop for OperationRecord {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                operation = self.operation,
                "operation dropped by caller, unit of work rolled back"
            );
            record_outcome(
                self.operation,
                self.started,
                ReservationError::Cancelled.kind(),
            );
        }
    }
}

fn record_outcome(operation: &'static str, started: Instant, outcome: &'static str) {
    metrics::counter!("reservation_operations_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
    metrics::histogram!("reservation_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}

fn log_failure(operation: &'static str, err: &ReservationError) {
    if err.is_caller_recoverable() {
        tracing::warn!(operation, error = %err, "request rejected");
        return;
    }
    match err {
        ReservationError::Cancelled => {
            tracing::warn!(operation, "operation cancelled, unit of work rolled back");
        }
        ReservationError::ConsistencyViolation(_) => {
            tracing::error!(operation, error = %err, "stock invariant violated");
        }
        _ => tracing::error!(operation, error = %err, "storage failure"),
    }
}

#[cfg(test)]
mod tests {
    use stock_store::{FailPoint, GoodsItem, InMemoryStockStore};

    use super::*;

    fn service_with(items: &[(i32, i32)]) -> ReservationService<InMemoryStockStore> {
        ReservationService::new(InMemoryStockStore::with_goods(
            items.iter().map(|&(id, q)| GoodsItem::new(id, q)),
        ))
    }

    #[tokio::test]
    async fn reserve_then_status_confirmed() {
        let service = service_with(&[(101, 5)]);
        let order = OrderId::new("A");

        service
            .reserve_goods_for_order(&ReserveRequest::new("A").item("101", 5))
            .await
            .unwrap();

        assert_eq!(service.storage().available(101).await, Some(0));
        let status = service.check_order_reserve(&order).await.unwrap();
        assert_eq!(status.status, ReserveStatus::Confirmed);
    }

    #[tokio::test]
    async fn invalid_nomenclature_touches_nothing() {
        let service = service_with(&[(101, 5)]);
        service.storage().fail_next(FailPoint::Begin).await;

        let err = service
            .reserve_goods_for_order(&ReserveRequest::new("A").item("101", 1).item("x1", 1))
            .await
            .unwrap_err();

        // Parsing fails before the unit of work is opened, so the injected
        // begin failure is still pending.
        assert!(matches!(err, ReservationError::InvalidInput(_)));
        assert!(service.storage().begin().await.is_err());
    }

    #[tokio::test]
    async fn empty_snapshot_rejects_batch() {
        let service = service_with(&[(101, 5)]);

        let err = service
            .reserve_goods_for_order(&ReserveRequest::new("A").item("999", 1))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReservationError::InsufficientStock {
                nomenclature_id: None
            }
        ));
    }

    #[tokio::test]
    async fn unknown_id_next_to_known_one_rejects_batch() {
        let service = service_with(&[(101, 5)]);
        let before = service.storage().snapshot().await;

        let err = service
            .reserve_goods_for_order(&ReserveRequest::new("A").item("101", 1).item("999", 1))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReservationError::InsufficientStock {
                nomenclature_id: Some(id)
            } if id == NomenclatureId::new(999)
        ));
        assert_eq!(service.storage().snapshot().await, before);
    }

    #[tokio::test]
    async fn unreserve_without_lines_is_noop() {
        let service = service_with(&[(101, 5)]);
        let before = service.storage().snapshot().await;

        service
            .unreserve_goods_for_order(&OrderId::new("never"))
            .await
            .unwrap();

        assert_eq!(service.storage().snapshot().await, before);
    }

    #[tokio::test]
    async fn begin_failure_is_storage_failure() {
        let service = service_with(&[(101, 5)]);
        service.storage().fail_next(FailPoint::Begin).await;

        let err = service
            .unreserve_goods_for_order(&OrderId::new("A"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "storage_failure");
    }

    #[tokio::test]
    async fn rollback_failure_keeps_original_error() {
        let service = service_with(&[(101, 5)]);
        service.storage().fail_next(FailPoint::InsertLine).await;
        service.storage().fail_next(FailPoint::Rollback).await;

        let err = service
            .reserve_goods_for_order(&ReserveRequest::new("A").item("101", 2))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Storage failure: Injected failure at insert_line"
        );
        assert_eq!(service.storage().available(101).await, Some(5));
    }

    #[tokio::test]
    async fn status_read_failure_is_storage_failure() {
        let service = service_with(&[]);
        service.storage().fail_next(FailPoint::ListLines).await;

        let err = service
            .check_order_reserve(&OrderId::new("A"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReservationError::Storage(_)));
    }
}
