//! Reservation orchestrator for the goods reservation service.
//!
//! [`ReservationService`] coordinates the stock availability store and the
//! reservation ledger inside one unit of work per call:
//! - reserve: check a snapshot, decrement stock, record ledger lines
//! - unreserve: restore stock and clear the order's ledger lines
//! - status: derive `confirmed` / `cancelled` from the ledger
//!
//! Any failure leaves stock and ledger exactly as they were before the call.

pub mod error;
pub mod request;
pub mod service;

pub use common::{NomenclatureId, OrderId, ReserveStatus};
pub use error::{ReservationError, Result};
pub use request::{OrderReserveStatus, RequestedLine, ReserveItem, ReserveRequest};
pub use service::ReservationService;
