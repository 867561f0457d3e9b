//! Stock ledger: current stock per item and the append-only history
//!
//! Mutations run on the caller's transaction handle and never open or
//! finish a transaction themselves.

use std::sync::Arc;

use shared::{
    HistoryEntry, HistoryWithItem, MovementKind, NewHistoryEntry, Page, PageRequest,
    ReferenceKind, StockRecord, StockWithItem,
};

use crate::error::{AppError, AppResult};
use crate::store::{Store, StoreTx};

/// One stock movement to record against an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movement {
    pub item_id: i32,
    pub kind: MovementKind,
    pub quantity: i32,
    pub note: String,
    pub reference_id: Option<i32>,
    pub reference_kind: ReferenceKind,
}

/// Stock ledger service
#[derive(Clone)]
pub struct StockLedger {
    store: Arc<dyn Store>,
}

impl StockLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Current stock record of an item, `None` if it was never stocked
    pub async fn get_current_stock(&self, item_id: i32) -> AppResult<Option<StockRecord>> {
        self.store.find_stock(item_id).await
    }

    /// All stock records with their item's code, name and unit
    pub async fn list_stock(&self) -> AppResult<Vec<StockWithItem>> {
        self.store.list_stock().await
    }

    /// History of all items, newest first
    pub async fn list_history(&self, page: &PageRequest) -> AppResult<Page<HistoryWithItem>> {
        self.store.list_history(page).await
    }

    /// History of one item, newest first
    pub async fn list_item_history(
        &self,
        item_id: i32,
        page: &PageRequest,
    ) -> AppResult<Page<HistoryEntry>> {
        if self.store.find_item(item_id).await?.is_none() {
            return Err(AppError::not_found("Item", item_id));
        }
        self.store.list_item_history(item_id, page).await
    }

    // ========================================================================
    // Transactional operations
    // ========================================================================

    /// Create an all-zero stock record for the item if it has none
    pub async fn ensure_stock_record(tx: &mut dyn StoreTx, item_id: i32) -> AppResult<()> {
        tx.ensure_stock(item_id).await
    }

    /// Add to the cumulative in/out counters. Refuses to drive the current
    /// quantity negative.
    pub async fn apply_delta(
        tx: &mut dyn StoreTx,
        item_id: i32,
        qty_in: i32,
        qty_out: i32,
    ) -> AppResult<StockRecord> {
        if qty_in < 0 || qty_out < 0 {
            return Err(AppError::validation("quantity", "Stock deltas cannot be negative"));
        }
        tx.apply_delta(item_id, qty_in, qty_out).await
    }

    pub async fn append_history(
        tx: &mut dyn StoreTx,
        entry: &NewHistoryEntry,
    ) -> AppResult<HistoryEntry> {
        tx.insert_history(entry).await
    }

    /// Lock the item's stock row, apply the movement and append its
    /// history entry. Incoming movements create the stock record when
    /// missing; outgoing movements on an item without one fail with
    /// nothing available.
    pub async fn record_movement(
        tx: &mut dyn StoreTx,
        movement: &Movement,
    ) -> AppResult<HistoryEntry> {
        let item_id = movement.item_id;

        if movement.kind == MovementKind::In {
            Self::ensure_stock_record(tx, item_id).await?;
        }

        let qty_before = match tx.lock_stock(item_id).await? {
            Some(stock) => stock.current_qty,
            None if movement.kind == MovementKind::Out => {
                return Err(AppError::InsufficientStock {
                    item_id,
                    requested: movement.quantity,
                    available: 0,
                });
            }
            None => return Err(AppError::not_found("Stock record", item_id)),
        };

        if movement.kind.apply(qty_before, movement.quantity).is_none() {
            return Err(match movement.kind {
                MovementKind::Out => AppError::InsufficientStock {
                    item_id,
                    requested: movement.quantity,
                    available: qty_before,
                },
                MovementKind::In => {
                    AppError::Internal(format!("Stock counter overflow for item {}", item_id))
                }
            });
        }

        let (qty_in, qty_out) = movement.kind.deltas(movement.quantity);
        let stock = Self::apply_delta(tx, item_id, qty_in, qty_out).await?;

        tracing::debug!(
            item_id,
            kind = movement.kind.as_str(),
            quantity = movement.quantity,
            qty_before,
            qty_after = stock.current_qty,
            "Stock movement applied"
        );

        Self::append_history(
            tx,
            &NewHistoryEntry {
                item_id,
                kind: movement.kind,
                quantity: movement.quantity,
                qty_before,
                qty_after: stock.current_qty,
                note: movement.note.clone(),
                reference_id: movement.reference_id,
                reference_kind: movement.reference_kind,
            },
        )
        .await
    }
}
