//! In-memory store
//!
//! A transaction takes the state lock for its whole lifetime and works on
//! a private copy; `commit` swaps the copy in, anything else discards it.
//! Failure points can be armed to exercise rollback paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use shared::{
    max_sequence, next_sequence, DocumentHeader, DocumentKind, DocumentLine,
    DocumentLineWithItem, DocumentWithLines, HistoryEntry, HistoryWithItem, Item, ItemWithStock,
    LedgerTotals, MovementKind, NewDocumentHeader, NewDocumentLine, NewHistoryEntry, NewItem,
    NumberScope, Page, PageRequest, StockRecord, StockWithItem, UpdateItemInput,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::{sequence_exhausted, Store, StoreTx};
use crate::error::{AppError, AppResult};

/// Operation an injected failure can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    InsertItem,
    NextNumber,
    InsertHeader,
    InsertLine,
    ApplyDelta,
    InsertHistory,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct State {
    items: BTreeMap<i32, Item>,
    /// Keyed by item id
    stock: BTreeMap<i32, StockRecord>,
    history: Vec<HistoryEntry>,
    headers: HashMap<DocumentKind, BTreeMap<i32, DocumentHeader>>,
    lines: HashMap<DocumentKind, Vec<DocumentLine>>,
    sequences: HashMap<String, i32>,
    ids: HashMap<&'static str, i32>,
}

impl State {
    fn next_id(&mut self, table: &'static str) -> i32 {
        let id = self.ids.entry(table).or_insert(0);
        *id += 1;
        *id
    }

    fn item_referenced(&self, item_id: i32) -> bool {
        self.stock.contains_key(&item_id)
            || self.history.iter().any(|h| h.item_id == item_id)
            || self
                .lines
                .values()
                .flatten()
                .any(|l| l.item_id == item_id)
    }

    fn stock_with_item(&self, item: &Item) -> ItemWithStock {
        let stock = self.stock.get(&item.id);
        ItemWithStock {
            item: item.clone(),
            qty_in: stock.map(|s| s.qty_in).unwrap_or(0),
            qty_out: stock.map(|s| s.qty_out).unwrap_or(0),
            current_qty: stock.map(|s| s.current_qty).unwrap_or(0),
        }
    }

    fn document(&self, kind: DocumentKind, id: i32) -> Option<DocumentWithLines> {
        let header = self.headers.get(&kind)?.get(&id)?.clone();
        let lines = self
            .lines
            .get(&kind)
            .map(|lines| {
                lines
                    .iter()
                    .filter(|l| l.header_id == id)
                    .filter_map(|l| {
                        let item = self.items.get(&l.item_id)?;
                        Some(DocumentLineWithItem {
                            line: l.clone(),
                            item_code: item.code.clone(),
                            item_name: item.name.clone(),
                            item_unit: item.unit.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(DocumentWithLines { header, lines })
    }
}

fn matches_search(item: &Item, search: Option<&str>) -> bool {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(needle) => {
            let needle = needle.to_lowercase();
            item.name.to_lowercase().contains(&needle) || item.code.to_lowercase().contains(&needle)
        }
        None => true,
    }
}

fn paginate<T>(rows: Vec<T>, page: &PageRequest) -> Page<T> {
    let total = rows.len() as i64;
    let items = rows
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    page.into_page(items, total)
}

struct Inner {
    state: Arc<Mutex<State>>,
    faults: RwLock<HashMap<FailurePoint, usize>>,
    transactions: AtomicUsize,
    commits: AtomicUsize,
}

impl Inner {
    async fn check(&self, point: FailurePoint) -> AppResult<()> {
        let mut faults = self.faults.write().await;
        if let Some(remaining) = faults.get_mut(&point) {
            if *remaining == 0 {
                faults.remove(&point);
                return Err(AppError::Storage(format!("injected failure at {:?}", point)));
            }
            *remaining -= 1;
        }
        Ok(())
    }
}

/// Store kept entirely in process memory
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Arc::new(Mutex::new(State::default())),
                faults: RwLock::new(HashMap::new()),
                transactions: AtomicUsize::new(0),
                commits: AtomicUsize::new(0),
            }),
        }
    }

    /// Fail the next `point` operation after `successes` successful ones.
    /// The failure fires once.
    pub async fn fail_after(&self, point: FailurePoint, successes: usize) {
        self.inner.faults.write().await.insert(point, successes);
    }

    pub async fn clear_failures(&self) {
        self.inner.faults.write().await.clear();
    }

    pub fn transactions_started(&self) -> usize {
        self.inner.transactions.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.inner.commits.load(Ordering::SeqCst)
    }

    /// Write a stock record as-is, bypassing the ledger
    pub async fn put_stock_record(
        &self,
        item_id: i32,
        opening_qty: i32,
        qty_in: i32,
        qty_out: i32,
        current_qty: i32,
    ) -> StockRecord {
        let mut state = self.inner.state.lock().await;
        let now = Utc::now();
        let id = match state.stock.get(&item_id) {
            Some(existing) => existing.id,
            None => state.next_id("stock_records"),
        };
        let record = StockRecord {
            id,
            item_id,
            opening_qty,
            qty_in,
            qty_out,
            current_qty,
            created_at: now,
            updated_at: now,
        };
        state.stock.insert(item_id, record.clone());
        record
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let guard = self.inner.state.clone().lock_owned().await;
        let work = guard.clone();
        self.inner.transactions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryTx {
            guard,
            work,
            inner: self.inner.clone(),
        }))
    }

    async fn find_item(&self, id: i32) -> AppResult<Option<Item>> {
        Ok(self.inner.state.lock().await.items.get(&id).cloned())
    }

    async fn list_items(&self, search: Option<&str>, page: &PageRequest) -> AppResult<Page<Item>> {
        let state = self.inner.state.lock().await;
        let rows: Vec<Item> = state
            .items
            .values()
            .rev()
            .filter(|i| matches_search(i, search))
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    async fn list_items_with_stock(
        &self,
        search: Option<&str>,
        page: &PageRequest,
    ) -> AppResult<Page<ItemWithStock>> {
        let state = self.inner.state.lock().await;
        let rows: Vec<ItemWithStock> = state
            .items
            .values()
            .rev()
            .filter(|i| matches_search(i, search))
            .map(|i| state.stock_with_item(i))
            .collect();
        Ok(paginate(rows, page))
    }

    async fn update_item(&self, id: i32, input: &UpdateItemInput) -> AppResult<Option<Item>> {
        let mut state = self.inner.state.lock().await;
        let Some(item) = state.items.get_mut(&id) else {
            return Ok(None);
        };
        item.name = input.name.clone();
        item.category = input.category.clone();
        item.unit = input.unit.clone();
        item.buy_price = input.buy_price;
        item.sell_price = input.sell_price;
        item.updated_at = Utc::now();
        Ok(Some(item.clone()))
    }

    async fn delete_item(&self, id: i32) -> AppResult<bool> {
        let mut state = self.inner.state.lock().await;
        if !state.items.contains_key(&id) {
            return Ok(false);
        }
        if state.item_referenced(id) {
            return Err(AppError::Conflict {
                resource: "item".to_string(),
                message: "Item is referenced by stock or documents".to_string(),
            });
        }
        state.items.remove(&id);
        Ok(true)
    }

    async fn find_stock(&self, item_id: i32) -> AppResult<Option<StockRecord>> {
        Ok(self.inner.state.lock().await.stock.get(&item_id).cloned())
    }

    async fn list_stock(&self) -> AppResult<Vec<StockWithItem>> {
        let state = self.inner.state.lock().await;
        let mut rows: Vec<StockWithItem> = state
            .stock
            .values()
            .filter_map(|s| {
                let item = state.items.get(&s.item_id)?;
                Some(StockWithItem {
                    stock: s.clone(),
                    item_code: item.code.clone(),
                    item_name: item.name.clone(),
                    item_unit: item.unit.clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            a.item_name
                .cmp(&b.item_name)
                .then(a.stock.item_id.cmp(&b.stock.item_id))
        });
        Ok(rows)
    }

    async fn list_history(&self, page: &PageRequest) -> AppResult<Page<HistoryWithItem>> {
        let state = self.inner.state.lock().await;
        let rows: Vec<HistoryWithItem> = state
            .history
            .iter()
            .rev()
            .filter_map(|h| {
                let item = state.items.get(&h.item_id)?;
                Some(HistoryWithItem {
                    entry: h.clone(),
                    item_code: item.code.clone(),
                    item_name: item.name.clone(),
                })
            })
            .collect();
        Ok(paginate(rows, page))
    }

    async fn list_item_history(
        &self,
        item_id: i32,
        page: &PageRequest,
    ) -> AppResult<Page<HistoryEntry>> {
        let state = self.inner.state.lock().await;
        let rows: Vec<HistoryEntry> = state
            .history
            .iter()
            .rev()
            .filter(|h| h.item_id == item_id)
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    async fn ledger_totals(&self) -> AppResult<Vec<LedgerTotals>> {
        let state = self.inner.state.lock().await;
        let totals = state
            .stock
            .values()
            .map(|s| {
                let (history_in, history_out) = state
                    .history
                    .iter()
                    .filter(|h| h.item_id == s.item_id)
                    .fold((0i64, 0i64), |(i, o), h| match h.kind {
                        MovementKind::In => (i + i64::from(h.quantity), o),
                        MovementKind::Out => (i, o + i64::from(h.quantity)),
                    });
                LedgerTotals {
                    item_id: s.item_id,
                    opening_qty: s.opening_qty,
                    qty_in: s.qty_in,
                    qty_out: s.qty_out,
                    current_qty: s.current_qty,
                    history_in,
                    history_out,
                }
            })
            .collect();
        Ok(totals)
    }

    async fn find_document(
        &self,
        kind: DocumentKind,
        id: i32,
    ) -> AppResult<Option<DocumentWithLines>> {
        Ok(self.inner.state.lock().await.document(kind, id))
    }

    async fn list_documents(
        &self,
        kind: DocumentKind,
        page: &PageRequest,
    ) -> AppResult<Page<DocumentHeader>> {
        let state = self.inner.state.lock().await;
        let rows: Vec<DocumentHeader> = state
            .headers
            .get(&kind)
            .map(|h| h.values().rev().cloned().collect())
            .unwrap_or_default();
        Ok(paginate(rows, page))
    }
}

/// Open in-memory transaction
pub struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    work: State,
    inner: Arc<Inner>,
}

impl MemoryTx {
    fn require_item(&self, item_id: i32) -> AppResult<()> {
        if self.work.items.contains_key(&item_id) {
            Ok(())
        } else {
            Err(AppError::Conflict {
                resource: "item_id".to_string(),
                message: format!("Item {} does not exist", item_id),
            })
        }
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_item(&mut self, id: i32) -> AppResult<Option<Item>> {
        Ok(self.work.items.get(&id).cloned())
    }

    async fn insert_item(&mut self, item: &NewItem) -> AppResult<Item> {
        self.inner.check(FailurePoint::InsertItem).await?;

        if self.work.items.values().any(|i| i.code == item.code) {
            return Err(AppError::DuplicateEntry("code".to_string()));
        }

        let now = Utc::now();
        let item = Item {
            id: self.work.next_id("items"),
            code: item.code.clone(),
            name: item.name.clone(),
            category: item.category.clone(),
            unit: item.unit.clone(),
            buy_price: item.buy_price,
            sell_price: item.sell_price,
            created_at: now,
            updated_at: now,
        };
        self.work.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn next_number(&mut self, scope: &NumberScope) -> AppResult<i32> {
        self.inner.check(FailurePoint::NextNumber).await?;

        let max_existing = match scope {
            NumberScope::ItemCode => {
                max_sequence(scope, self.work.items.values().map(|i| i.code.as_str()))
            }
            NumberScope::Document { kind, .. } => max_sequence(
                scope,
                self.work
                    .headers
                    .get(kind)
                    .into_iter()
                    .flat_map(|h| h.values())
                    .map(|h| h.document_number.as_str()),
            ),
        };

        let key = scope.key();
        let next = next_sequence(self.work.sequences.get(&key).copied(), max_existing)
            .ok_or_else(|| sequence_exhausted(scope))?;
        self.work.sequences.insert(key, next);
        Ok(next)
    }

    async fn lock_stock(&mut self, item_id: i32) -> AppResult<Option<StockRecord>> {
        Ok(self.work.stock.get(&item_id).cloned())
    }

    async fn ensure_stock(&mut self, item_id: i32) -> AppResult<()> {
        if self.work.stock.contains_key(&item_id) {
            return Ok(());
        }
        self.require_item(item_id)?;

        let now = Utc::now();
        let record = StockRecord {
            id: self.work.next_id("stock_records"),
            item_id,
            opening_qty: 0,
            qty_in: 0,
            qty_out: 0,
            current_qty: 0,
            created_at: now,
            updated_at: now,
        };
        self.work.stock.insert(item_id, record);
        Ok(())
    }

    async fn apply_delta(
        &mut self,
        item_id: i32,
        qty_in: i32,
        qty_out: i32,
    ) -> AppResult<StockRecord> {
        self.inner.check(FailurePoint::ApplyDelta).await?;

        let record = self
            .work
            .stock
            .get_mut(&item_id)
            .ok_or_else(|| AppError::not_found("Stock record", item_id))?;

        let after = i64::from(record.current_qty) + i64::from(qty_in) - i64::from(qty_out);
        if after < 0 {
            return Err(AppError::InsufficientStock {
                item_id,
                requested: qty_out,
                available: record.current_qty,
            });
        }

        let overflow = || AppError::Internal(format!("Stock counter overflow for item {}", item_id));
        record.qty_in = record.qty_in.checked_add(qty_in).ok_or_else(overflow)?;
        record.qty_out = record.qty_out.checked_add(qty_out).ok_or_else(overflow)?;
        record.current_qty = i32::try_from(after).map_err(|_| overflow())?;
        record.updated_at = Utc::now();

        Ok(record.clone())
    }

    async fn insert_history(&mut self, entry: &NewHistoryEntry) -> AppResult<HistoryEntry> {
        self.inner.check(FailurePoint::InsertHistory).await?;
        self.require_item(entry.item_id)?;

        let entry = HistoryEntry {
            id: self.work.next_id("stock_history"),
            item_id: entry.item_id,
            kind: entry.kind,
            quantity: entry.quantity,
            qty_before: entry.qty_before,
            qty_after: entry.qty_after,
            note: entry.note.clone(),
            reference_id: entry.reference_id,
            reference_kind: entry.reference_kind,
            created_at: Utc::now(),
        };
        self.work.history.push(entry.clone());
        Ok(entry)
    }

    async fn insert_header(
        &mut self,
        kind: DocumentKind,
        header: &NewDocumentHeader,
    ) -> AppResult<DocumentHeader> {
        self.inner.check(FailurePoint::InsertHeader).await?;

        let table_key = match kind {
            DocumentKind::Purchase => "purchase_headers",
            DocumentKind::Sale => "sale_headers",
        };
        let id = self.work.next_id(table_key);
        let headers = self.work.headers.entry(kind).or_default();
        if headers
            .values()
            .any(|h| h.document_number == header.document_number)
        {
            return Err(AppError::DuplicateEntry("document_number".to_string()));
        }

        let now = Utc::now();
        let header = DocumentHeader {
            id,
            document_number: header.document_number.clone(),
            document_date: header.document_date,
            counterparty: header.counterparty.clone(),
            total: header.total,
            note: header.note.clone(),
            created_by: header.created_by,
            created_at: now,
            updated_at: now,
        };
        headers.insert(id, header.clone());
        Ok(header)
    }

    async fn insert_line(
        &mut self,
        kind: DocumentKind,
        line: &NewDocumentLine,
    ) -> AppResult<DocumentLine> {
        self.inner.check(FailurePoint::InsertLine).await?;
        self.require_item(line.item_id)?;

        let header_exists = self
            .work
            .headers
            .get(&kind)
            .map(|h| h.contains_key(&line.header_id))
            .unwrap_or(false);
        if !header_exists {
            return Err(AppError::Conflict {
                resource: "header_id".to_string(),
                message: format!("{} {} does not exist", kind, line.header_id),
            });
        }

        let table_key = match kind {
            DocumentKind::Purchase => "purchase_lines",
            DocumentKind::Sale => "sale_lines",
        };
        let line = DocumentLine {
            id: self.work.next_id(table_key),
            header_id: line.header_id,
            item_id: line.item_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            subtotal: line.subtotal,
            created_at: Utc::now(),
        };
        self.work.lines.entry(kind).or_default().push(line.clone());
        Ok(line)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.inner.check(FailurePoint::Commit).await?;

        let MemoryTx {
            mut guard,
            work,
            inner,
        } = *self;
        *guard = work;
        inner.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}
