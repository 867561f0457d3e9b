//! Test fixtures shared by the integration tests

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::{CreateItemInput, CreatePurchaseInput, CreateSaleInput, Item, LineInput};
use warehouse::store::{MemoryStore, Store};
use warehouse::AppState;

pub const USER_ID: i32 = 1;

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

pub fn setup() -> (MemoryStore, AppState) {
    let store = MemoryStore::new();
    let state = AppState::new(Arc::new(store.clone()));
    (store, state)
}

pub async fn create_item(state: &AppState, name: &str) -> Item {
    state
        .items()
        .create_item(CreateItemInput {
            name: name.to_string(),
            unit: "pcs".to_string(),
            buy_price: dec("100"),
            sell_price: dec("125"),
            ..Default::default()
        })
        .await
        .unwrap()
}

pub fn line(item_id: i32, quantity: i32, unit_price: &str) -> LineInput {
    LineInput::new(item_id, quantity, dec(unit_price))
}

pub fn purchase_input(lines: Vec<LineInput>) -> CreatePurchaseInput {
    CreatePurchaseInput {
        document_number: None,
        document_date: Some(day()),
        supplier: "PT Sumber Makmur".to_string(),
        note: String::new(),
        lines,
    }
}

pub fn sale_input(lines: Vec<LineInput>) -> CreateSaleInput {
    CreateSaleInput {
        document_number: None,
        document_date: Some(day()),
        customer: "Toko Sejahtera".to_string(),
        note: String::new(),
        lines,
    }
}

/// Purchase `quantity` units of the item at 100 each
pub async fn stock_up(state: &AppState, item_id: i32, quantity: i32) {
    state
        .purchases()
        .create_purchase(purchase_input(vec![line(item_id, quantity, "100")]), USER_ID)
        .await
        .unwrap();
}

/// Current quantity, `None` when the item has no stock record
pub async fn current_qty(store: &MemoryStore, item_id: i32) -> Option<i32> {
    store
        .find_stock(item_id)
        .await
        .unwrap()
        .map(|s| s.current_qty)
}
