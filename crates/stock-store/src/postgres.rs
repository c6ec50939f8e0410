use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::error::ensure_positive;
use crate::{
    NomenclatureId, OrderId, ReservationLine, Result, StoreError,
    store::{AvailabilityStore, ReservationLedger, StockStorage, UnitOfWork},
};

const NON_NEGATIVE_CONSTRAINT: &str = "goods_available_quantity_non_negative";
const CHECK_VIOLATION: &str = "23514";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const NUMERIC_OUT_OF_RANGE: &str = "22003";

/// PostgreSQL-backed stock store.
///
/// Every unit of work is a database transaction at the server's default
/// isolation level (READ COMMITTED). Concurrent decrements of the same item
/// are serialised by the row lock taken by the conditional `UPDATE`.
#[derive(Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
}

impl PostgresStockStore {
    /// Creates a new PostgreSQL stock store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Creates or overwrites a stock row. Used for seeding, never by the
    /// reservation workflow.
    pub async fn upsert_goods(&self, id: NomenclatureId, available_quantity: i32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO goods (id, available_quantity)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET available_quantity = EXCLUDED.available_quantity
            "#,
        )
        .bind(id.as_i32())
        .bind(available_quantity)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, id))?;

        Ok(())
    }

    /// Returns the committed available quantity of an item.
    pub async fn available(&self, id: NomenclatureId) -> Result<Option<i32>> {
        let quantity: Option<i32> =
            sqlx::query_scalar("SELECT available_quantity FROM goods WHERE id = $1")
                .bind(id.as_i32())
                .fetch_optional(&self.pool)
                .await?;

        Ok(quantity)
    }

    fn row_to_line(row: PgRow) -> Result<ReservationLine> {
        Ok(ReservationLine {
            order_id: OrderId::new(row.try_get::<String, _>("order_id")?),
            nomenclature_id: NomenclatureId::new(row.try_get("nomenclature_id")?),
            quantity_reserved: row.try_get("quantity_reserved")?,
        })
    }
}

/// Translates constraint and range errors raised by a write into invariant
/// violations, leaving every other database error as is.
fn map_write_error(err: sqlx::Error, id: NomenclatureId) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        let code = db_err.code();
        if db_err.constraint() == Some(NON_NEGATIVE_CONSTRAINT)
            || code.as_deref() == Some(CHECK_VIOLATION)
        {
            return StoreError::InvariantViolation(format!(
                "check constraint rejected write for nomenclature {id}: {}",
                db_err.message()
            ));
        }
        if code.as_deref() == Some(FOREIGN_KEY_VIOLATION) {
            return StoreError::InvariantViolation(format!("nomenclature {id} has no stock row"));
        }
        if code.as_deref() == Some(NUMERIC_OUT_OF_RANGE) {
            return StoreError::InvariantViolation(format!(
                "available quantity of {id} overflows"
            ));
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl StockStorage for PostgresStockStore {
    type Tx = PostgresUnitOfWork;

    async fn begin(&self) -> Result<PostgresUnitOfWork> {
        let tx = self.pool.begin().await?;
        Ok(PostgresUnitOfWork { tx })
    }

    async fn order_lines(&self, order_id: &OrderId) -> Result<Vec<ReservationLine>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, nomenclature_id, quantity_reserved
            FROM goods_reservations
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(order_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PostgresStockStore::row_to_line).collect()
    }
}

/// A unit of work over [`PostgresStockStore`], wrapping one transaction.
///
/// Dropping it without calling [`UnitOfWork::commit`] rolls the transaction
/// back.
pub struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl AvailabilityStore for PostgresUnitOfWork {
    async fn get_available(
        &mut self,
        ids: &[NomenclatureId],
    ) -> Result<HashMap<NomenclatureId, i32>> {
        let raw_ids: Vec<i32> = ids.iter().map(NomenclatureId::as_i32).collect();

        let rows = sqlx::query("SELECT id, available_quantity FROM goods WHERE id = ANY($1)")
            .bind(raw_ids)
            .fetch_all(&mut *self.tx)
            .await?;

        let mut found = HashMap::with_capacity(rows.len());
        for row in rows {
            let id = NomenclatureId::new(row.try_get("id")?);
            let quantity: i32 = row.try_get("available_quantity")?;
            if quantity < 0 {
                return Err(StoreError::InvariantViolation(format!(
                    "nomenclature {id} has negative available quantity {quantity}"
                )));
            }
            found.insert(id, quantity);
        }
        Ok(found)
    }

    async fn decrease(&mut self, id: NomenclatureId, amount: i32) -> Result<()> {
        ensure_positive(id, amount)?;

        // Check and write in one statement: the row lock makes a concurrent
        // decrement re-evaluate the predicate against the committed value.
        let result = sqlx::query(
            r#"
            UPDATE goods
            SET available_quantity = available_quantity - $1
            WHERE id = $2 AND available_quantity >= $1
            "#,
        )
        .bind(amount)
        .bind(id.as_i32())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, id))?;

        if result.rows_affected() == 0 {
            tracing::debug!(nomenclature_id = %id, amount, "conditional decrement rejected");
            return Err(StoreError::InsufficientStock {
                nomenclature_id: id,
                requested: amount,
            });
        }
        Ok(())
    }

    async fn increase(&mut self, id: NomenclatureId, amount: i32) -> Result<()> {
        ensure_positive(id, amount)?;

        let result = sqlx::query(
            "UPDATE goods SET available_quantity = available_quantity + $1 WHERE id = $2",
        )
        .bind(amount)
        .bind(id.as_i32())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, id))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InvariantViolation(format!(
                "nomenclature {id} has no stock row"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ReservationLedger for PostgresUnitOfWork {
    async fn list_lines(&mut self, order_id: &OrderId) -> Result<Vec<ReservationLine>> {
        // Row locks make a concurrent release of the same order wait here.
        // Once the holder commits, rows it deleted are skipped on re-check.
        let rows = sqlx::query(
            r#"
            SELECT order_id, nomenclature_id, quantity_reserved
            FROM goods_reservations
            WHERE order_id = $1
            ORDER BY id ASC
            FOR UPDATE
            "#,
        )
        .bind(order_id.as_str())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(PostgresStockStore::row_to_line).collect()
    }

    async fn insert_line(&mut self, line: &ReservationLine) -> Result<()> {
        ensure_positive(line.nomenclature_id, line.quantity_reserved)?;

        sqlx::query(
            r#"
            INSERT INTO goods_reservations (order_id, nomenclature_id, quantity_reserved)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(line.order_id.as_str())
        .bind(line.nomenclature_id.as_i32())
        .bind(line.quantity_reserved)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, line.nomenclature_id))?;

        Ok(())
    }

    async fn delete_lines(&mut self, order_id: &OrderId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM goods_reservations WHERE order_id = $1")
            .bind(order_id.as_str())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
