//! Stock ledger models: current stock per item and the history trail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current stock aggregate for one item (mstok)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockRecord {
    pub id: i32,
    pub item_id: i32,
    pub opening_qty: i32,
    /// Cumulative quantity received
    pub qty_in: i32,
    /// Cumulative quantity issued
    pub qty_out: i32,
    pub current_qty: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockRecord {
    /// Quantity implied by the cumulative counters
    pub fn expected_qty(&self) -> i64 {
        i64::from(self.opening_qty) + i64::from(self.qty_in) - i64::from(self.qty_out)
    }

    pub fn is_balanced(&self) -> bool {
        self.expected_qty() == i64::from(self.current_qty)
    }
}

/// Stock record with display fields of its item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockWithItem {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub stock: StockRecord,
    pub item_code: String,
    pub item_name: String,
    pub item_unit: String,
}

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "VARCHAR", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    In,
    Out,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::In => "in",
            MovementKind::Out => "out",
        }
    }

    /// Split a quantity into `(qty_in, qty_out)` deltas
    pub fn deltas(&self, quantity: i32) -> (i32, i32) {
        match self {
            MovementKind::In => (quantity, 0),
            MovementKind::Out => (0, quantity),
        }
    }

    pub fn signed(&self, quantity: i32) -> i64 {
        match self {
            MovementKind::In => i64::from(quantity),
            MovementKind::Out => -i64::from(quantity),
        }
    }

    /// Stock level after moving `quantity`, or `None` if it would go
    /// negative or overflow
    pub fn apply(&self, before: i32, quantity: i32) -> Option<i32> {
        let after = match self {
            MovementKind::In => before.checked_add(quantity)?,
            MovementKind::Out => before.checked_sub(quantity)?,
        };
        (after >= 0).then_some(after)
    }
}

/// Document type a history entry points back to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "VARCHAR", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Purchase,
    Sale,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Purchase => "purchase",
            ReferenceKind::Sale => "sale",
        }
    }
}

/// One immutable audit record of a stock-affecting event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct HistoryEntry {
    pub id: i32,
    pub item_id: i32,
    pub kind: MovementKind,
    pub quantity: i32,
    pub qty_before: i32,
    pub qty_after: i32,
    pub note: String,
    pub reference_id: Option<i32>,
    pub reference_kind: ReferenceKind,
    pub created_at: DateTime<Utc>,
}

/// History entry with the item's code and name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct HistoryWithItem {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub entry: HistoryEntry,
    pub item_code: String,
    pub item_name: String,
}

/// History entry to append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub item_id: i32,
    pub kind: MovementKind,
    pub quantity: i32,
    pub qty_before: i32,
    pub qty_after: i32,
    pub note: String,
    pub reference_id: Option<i32>,
    pub reference_kind: ReferenceKind,
}

/// Per-item ledger figures used by the consistency audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LedgerTotals {
    pub item_id: i32,
    pub opening_qty: i32,
    pub qty_in: i32,
    pub qty_out: i32,
    pub current_qty: i32,
    pub history_in: i64,
    pub history_out: i64,
}

impl LedgerTotals {
    /// Stock level implied by replaying the history trail
    pub fn replayed_qty(&self) -> i64 {
        i64::from(self.opening_qty) + self.history_in - self.history_out
    }

    pub fn counters_qty(&self) -> i64 {
        i64::from(self.opening_qty) + i64::from(self.qty_in) - i64::from(self.qty_out)
    }
}
