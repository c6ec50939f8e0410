//! Reservation error types.

use common::NomenclatureId;
use stock_store::StoreError;
use thiserror::Error;

/// Errors that can occur during reservation operations.
#[derive(Debug, Error)]
pub enum ReservationError {
    /// The request is malformed (bad item identifier, non-positive quantity,
    /// blank order id). Nothing was touched.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Not enough stock for the batch. The whole call was rolled back.
    #[error("Not enough goods for reserve")]
    InsufficientStock {
        nomenclature_id: Option<NomenclatureId>,
    },

    /// The unit of work could not be opened, used or committed.
    #[error("Storage failure: {0}")]
    Storage(#[source] StoreError),

    /// Stored data broke a stock invariant. Never caller-correctable.
    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    /// The operation exceeded its deadline and was rolled back.
    #[error("Operation cancelled")]
    Cancelled,
}

impl ReservationError {
    /// Short, stable label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ReservationError::InvalidInput(_) => "invalid_input",
            ReservationError::InsufficientStock { .. } => "insufficient_stock",
            ReservationError::Storage(_) => "storage_failure",
            ReservationError::ConsistencyViolation(_) => "consistency_violation",
            ReservationError::Cancelled => "cancelled",
        }
    }

    /// Returns true for errors the caller can fix by changing the request or
    /// waiting for stock.
    pub fn is_caller_recoverable(&self) -> bool {
        matches!(
            self,
            ReservationError::InvalidInput(_) | ReservationError::InsufficientStock { .. }
        )
    }
}

impl From<StoreError> for ReservationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientStock {
                nomenclature_id, ..
            } => ReservationError::InsufficientStock {
                nomenclature_id: Some(nomenclature_id),
            },
            StoreError::InvalidAmount { .. } => ReservationError::InvalidInput(err.to_string()),
            StoreError::InvariantViolation(msg) => ReservationError::ConsistencyViolation(msg),
            other => ReservationError::Storage(other),
        }
    }
}

/// Convenience type alias for reservation results.
pub type Result<T> = std::result::Result<T, ReservationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_insufficient_stock_maps_to_insufficient_stock() {
        let err: ReservationError = StoreError::InsufficientStock {
            nomenclature_id: NomenclatureId::new(101),
            requested: 3,
        }
        .into();
        assert!(matches!(
            err,
            ReservationError::InsufficientStock {
                nomenclature_id: Some(id)
            } if id == NomenclatureId::new(101)
        ));
        assert!(err.is_caller_recoverable());
    }

    #[test]
    fn invariant_violation_maps_to_consistency_violation() {
        let err: ReservationError =
            StoreError::InvariantViolation("negative quantity".to_string()).into();
        assert_eq!(err.kind(), "consistency_violation");
        assert!(!err.is_caller_recoverable());
    }

    #[test]
    fn other_store_errors_are_storage_failures() {
        let err: ReservationError = StoreError::Injected("commit".to_string()).into();
        assert_eq!(err.kind(), "storage_failure");
        assert_eq!(
            err.to_string(),
            "Storage failure: Injected failure at commit"
        );
    }

    #[test]
    fn insufficient_stock_message_matches_wire_text() {
        let err = ReservationError::InsufficientStock {
            nomenclature_id: None,
        };
        assert_eq!(err.to_string(), "Not enough goods for reserve");
    }
}
