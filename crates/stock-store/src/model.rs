use crate::{NomenclatureId, OrderId};

/// A catalog item together with its available quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoodsItem {
    pub id: NomenclatureId,
    pub available_quantity: i32,
}

impl GoodsItem {
    pub fn new(id: impl Into<NomenclatureId>, available_quantity: i32) -> Self {
        Self {
            id: id.into(),
            available_quantity,
        }
    }
}

/// One persisted reservation of a quantity of a single item for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationLine {
    pub order_id: OrderId,
    pub nomenclature_id: NomenclatureId,
    pub quantity_reserved: i32,
}

impl ReservationLine {
    pub fn new(
        order_id: impl Into<OrderId>,
        nomenclature_id: impl Into<NomenclatureId>,
        quantity_reserved: i32,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            nomenclature_id: nomenclature_id.into(),
            quantity_reserved,
        }
    }
}
