//! Item catalog models (master barang)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A tradeable good held in the warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Item {
    pub id: i32,
    /// Unique item code (e.g., "BRG001"); fixed once the item exists
    pub code: String,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Item joined with its stock figures; items never purchased report zeros
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ItemWithStock {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub item: Item,
    pub qty_in: i32,
    pub qty_out: i32,
    pub current_qty: i32,
}

/// Input for creating an item
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateItemInput {
    /// Generated when absent or blank
    #[serde(default)]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Item name is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "Category is too long"))]
    pub category: String,
    #[validate(length(min = 1, max = 30, message = "Unit is required"))]
    pub unit: String,
    #[serde(default)]
    pub buy_price: Decimal,
    #[serde(default)]
    pub sell_price: Decimal,
}

/// Input for updating an item. The code is not updatable.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateItemInput {
    #[validate(length(min = 1, max = 200, message = "Item name is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "Category is too long"))]
    pub category: String,
    #[validate(length(min = 1, max = 30, message = "Unit is required"))]
    pub unit: String,
    #[serde(default)]
    pub buy_price: Decimal,
    #[serde(default)]
    pub sell_price: Decimal,
}

/// Row to insert once the code is settled
#[derive(Debug, Clone)]
pub struct NewItem {
    pub code: String,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
}

impl NewItem {
    pub fn from_input(code: String, input: &CreateItemInput) -> Self {
        Self {
            code,
            name: input.name.trim().to_string(),
            category: input.category.trim().to_string(),
            unit: input.unit.trim().to_string(),
            buy_price: input.buy_price,
            sell_price: input.sell_price,
        }
    }
}
