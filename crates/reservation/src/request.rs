//! Request and response types of the reservation operations.

use common::{NomenclatureId, OrderId, ReserveStatus};
use serde::{Deserialize, Serialize};

use crate::error::{ReservationError, Result};

/// One requested item: a nomenclature given as a numeric string and the
/// quantity to reserve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveItem {
    pub nomenclature: String,
    pub quantity: i64,
}

impl ReserveItem {
    pub fn new(nomenclature: impl Into<String>, quantity: i64) -> Self {
        Self {
            nomenclature: nomenclature.into(),
            quantity,
        }
    }
}

/// Request to reserve an ordered list of items for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveRequest {
    pub order_id: OrderId,
    #[serde(default)]
    pub goods: Vec<ReserveItem>,
}

impl ReserveRequest {
    pub fn new(order_id: impl Into<OrderId>) -> Self {
        Self {
            order_id: order_id.into(),
            goods: Vec::new(),
        }
    }

    /// Appends an item, keeping caller order.
    pub fn item(mut self, nomenclature: impl Into<String>, quantity: i64) -> Self {
        self.goods.push(ReserveItem::new(nomenclature, quantity));
        self
    }

    /// Validates the request and converts every item into a typed line.
    ///
    /// Caller order and repeated nomenclatures are preserved.
    pub fn parse_lines(&self) -> Result<Vec<RequestedLine>> {
        if self.order_id.is_blank() {
            return Err(ReservationError::InvalidInput(
                "order_id must not be empty".to_string(),
            ));
        }

        self.goods.iter().map(RequestedLine::try_from).collect()
    }
}

/// A validated request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedLine {
    pub nomenclature_id: NomenclatureId,
    pub quantity: i32,
}

impl TryFrom<&ReserveItem> for RequestedLine {
    type Error = ReservationError;

    fn try_from(item: &ReserveItem) -> Result<Self> {
        let nomenclature_id = item.nomenclature.parse::<NomenclatureId>().map_err(|e| {
            ReservationError::InvalidInput(format!(
                "parsing goods id {:?}: {e}",
                item.nomenclature
            ))
        })?;

        let quantity = i32::try_from(item.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| {
                ReservationError::InvalidInput(format!(
                    "quantity {} for goods {nomenclature_id} must be a positive 32-bit integer",
                    item.quantity
                ))
            })?;

        Ok(Self {
            nomenclature_id,
            quantity,
        })
    }
}

/// Reservation status of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReserveStatus {
    pub order_id: OrderId,
    #[serde(rename = "reserve_status")]
    pub status: ReserveStatus,
}
