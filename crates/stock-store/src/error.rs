use thiserror::Error;

use crate::NomenclatureId;

/// Errors that can occur when interacting with the stock storage.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional decrement was rejected because the stock row is missing
    /// or holds less than the requested amount.
    #[error("Insufficient stock for nomenclature {nomenclature_id}: requested {requested}")]
    InsufficientStock {
        nomenclature_id: NomenclatureId,
        requested: i32,
    },

    /// Quantities passed to the store must be strictly positive.
    #[error("Invalid amount {amount} for nomenclature {nomenclature_id}")]
    InvalidAmount {
        nomenclature_id: NomenclatureId,
        amount: i32,
    },

    /// Stored data breaks a stock invariant (negative quantity, ledger line
    /// pointing at a missing stock row, check constraint fired).
    #[error("Stock invariant violated: {0}")]
    InvariantViolation(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A failure injected into the in-memory store.
    #[error("Injected failure at {0}")]
    Injected(String),
}

/// Result type for stock storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

pub(crate) fn ensure_positive(nomenclature_id: NomenclatureId, amount: i32) -> Result<()> {
    if amount <= 0 {
        return Err(StoreError::InvalidAmount {
            nomenclature_id,
            amount,
        });
    }
    Ok(())
}
