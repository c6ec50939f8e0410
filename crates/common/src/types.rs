use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of an order that goods are reserved for.
///
/// Orders are owned by an external system, so the identifier is an opaque
/// string rather than something this service generates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Creates an order ID from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the order ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Catalog identifier of a goods item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NomenclatureId(i32);

impl NomenclatureId {
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for NomenclatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for NomenclatureId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl From<NomenclatureId> for i32 {
    fn from(id: NomenclatureId) -> Self {
        id.0
    }
}

impl FromStr for NomenclatureId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i32>().map(Self)
    }
}

/// Reservation status of an order, derived from its ledger lines.
///
/// An order with at least one ledger line is `Confirmed`. Everything else is
/// `Cancelled`, which covers both "never reserved" and "already unreserved".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReserveStatus {
    Confirmed,
    Cancelled,
}

impl ReserveStatus {
    /// Derives the status from whether the order has any ledger lines.
    pub fn from_line_count(lines: usize) -> Self {
        if lines == 0 {
            ReserveStatus::Cancelled
        } else {
            ReserveStatus::Confirmed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReserveStatus::Confirmed => "confirmed",
            ReserveStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ReserveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
