//! Persistence seam
//!
//! [`Store`] serves reads outside any transaction and opens transactions.
//! [`StoreTx`] is the handle every write of one orchestrator call goes
//! through. Dropping a handle without calling `commit` rolls it back.

use async_trait::async_trait;
use shared::{
    DocumentHeader, DocumentKind, DocumentLine, DocumentWithLines, HistoryEntry, HistoryWithItem,
    Item, ItemWithStock, LedgerTotals, NewDocumentHeader, NewDocumentLine, NewHistoryEntry,
    NewItem, NumberScope, Page, PageRequest, StockRecord, StockWithItem, UpdateItemInput,
};

use crate::error::{AppError, AppResult};

pub mod memory;
pub mod postgres;

pub use memory::{FailurePoint, MemoryStore};
pub use postgres::PgStore;

/// Every number of `scope` up to `MAX_SEQUENCE` is in use
pub(crate) fn sequence_exhausted(scope: &NumberScope) -> AppError {
    AppError::Conflict {
        resource: "number_sequence".to_string(),
        message: format!("No numbers left for {}", scope.key()),
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Open a transaction
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>>;

    // Items

    async fn find_item(&self, id: i32) -> AppResult<Option<Item>>;

    /// Items whose name or code contains `search` (case-insensitive),
    /// newest first
    async fn list_items(&self, search: Option<&str>, page: &PageRequest) -> AppResult<Page<Item>>;

    async fn list_items_with_stock(
        &self,
        search: Option<&str>,
        page: &PageRequest,
    ) -> AppResult<Page<ItemWithStock>>;

    /// `None` if the item does not exist
    async fn update_item(&self, id: i32, input: &UpdateItemInput) -> AppResult<Option<Item>>;

    /// `false` if the item does not exist; `Conflict` while referenced
    async fn delete_item(&self, id: i32) -> AppResult<bool>;

    // Stock ledger

    async fn find_stock(&self, item_id: i32) -> AppResult<Option<StockRecord>>;

    async fn list_stock(&self) -> AppResult<Vec<StockWithItem>>;

    async fn list_history(&self, page: &PageRequest) -> AppResult<Page<HistoryWithItem>>;

    async fn list_item_history(
        &self,
        item_id: i32,
        page: &PageRequest,
    ) -> AppResult<Page<HistoryEntry>>;

    /// Per-item counters and history sums for every stock record
    async fn ledger_totals(&self) -> AppResult<Vec<LedgerTotals>>;

    // Documents

    async fn find_document(&self, kind: DocumentKind, id: i32)
        -> AppResult<Option<DocumentWithLines>>;

    async fn list_documents(
        &self,
        kind: DocumentKind,
        page: &PageRequest,
    ) -> AppResult<Page<DocumentHeader>>;
}

#[async_trait]
pub trait StoreTx: Send {
    async fn find_item(&mut self, id: i32) -> AppResult<Option<Item>>;

    /// `DuplicateEntry` when the code is taken
    async fn insert_item(&mut self, item: &NewItem) -> AppResult<Item>;

    /// Reserve the next sequence number of `scope`. The reservation is
    /// held until the transaction ends. `Conflict` once the scope is
    /// exhausted.
    async fn next_number(&mut self, scope: &NumberScope) -> AppResult<i32>;

    /// Read the stock record and hold its row lock until the transaction
    /// ends
    async fn lock_stock(&mut self, item_id: i32) -> AppResult<Option<StockRecord>>;

    /// Create an all-zero stock record if none exists
    async fn ensure_stock(&mut self, item_id: i32) -> AppResult<()>;

    /// Add to the cumulative counters and recompute the current quantity.
    /// `InsufficientStock` if the result would be negative, `NotFound` if
    /// the item has no record.
    async fn apply_delta(&mut self, item_id: i32, qty_in: i32, qty_out: i32)
        -> AppResult<StockRecord>;

    async fn insert_history(&mut self, entry: &NewHistoryEntry) -> AppResult<HistoryEntry>;

    /// `DuplicateEntry` when the document number is taken
    async fn insert_header(
        &mut self,
        kind: DocumentKind,
        header: &NewDocumentHeader,
    ) -> AppResult<DocumentHeader>;

    async fn insert_line(
        &mut self,
        kind: DocumentKind,
        line: &NewDocumentLine,
    ) -> AppResult<DocumentLine>;

    async fn commit(self: Box<Self>) -> AppResult<()>;

    async fn rollback(self: Box<Self>) -> AppResult<()>;
}
