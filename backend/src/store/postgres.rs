//! PostgreSQL store backed by a `sqlx` pool

use async_trait::async_trait;
use shared::{
    DocumentHeader, DocumentKind, DocumentLine, DocumentLineWithItem, DocumentWithLines,
    HistoryEntry, HistoryWithItem, Item, ItemWithStock, LedgerTotals, NewDocumentHeader,
    NewDocumentLine, NewHistoryEntry, NewItem, NumberScope, Page, PageRequest, StockRecord,
    StockWithItem, UpdateItemInput, ITEM_CODE_PREFIX, MAX_SEQUENCE,
};
use sqlx::{PgPool, Postgres, Transaction};

use super::{sequence_exhausted, Store, StoreTx};
use crate::error::{AppError, AppResult};

const ITEM_COLUMNS: &str =
    "i.id, i.code, i.name, i.category, i.unit, i.buy_price, i.sell_price, i.created_at, i.updated_at";

const STOCK_COLUMNS: &str =
    "s.id, s.item_id, s.opening_qty, s.qty_in, s.qty_out, s.current_qty, s.created_at, s.updated_at";

const HISTORY_COLUMNS: &str = "h.id, h.item_id, h.kind, h.quantity, h.qty_before, h.qty_after, \
     h.note, h.reference_id, h.reference_kind, h.created_at";

/// Table and column names of one document kind
struct DocumentTables {
    header: &'static str,
    lines: &'static str,
    counterparty: &'static str,
}

fn tables(kind: DocumentKind) -> DocumentTables {
    match kind {
        DocumentKind::Purchase => DocumentTables {
            header: "purchase_headers",
            lines: "purchase_lines",
            counterparty: "supplier",
        },
        DocumentKind::Sale => DocumentTables {
            header: "sale_headers",
            lines: "sale_lines",
            counterparty: "customer",
        },
    }
}

fn header_columns(kind: DocumentKind) -> String {
    format!(
        "d.id, d.document_number, d.document_date, d.{} AS counterparty, d.total, d.note, \
         d.created_by, d.created_at, d.updated_at",
        tables(kind).counterparty
    )
}

fn search_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s))
}

/// Map constraint violations onto domain errors
fn classify(err: sqlx::Error, field: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return AppError::DuplicateEntry(field.to_string());
        }
        if db_err.is_foreign_key_violation() {
            return AppError::Conflict {
                resource: field.to_string(),
                message: db_err
                    .constraint()
                    .map(|c| format!("Violates {}", c))
                    .unwrap_or_else(|| "Still referenced".to_string()),
            };
        }
    }
    AppError::DatabaseError(err)
}

/// Store over a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }

    /// Apply the embedded migrations
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations").run(&self.db).await?;
        Ok(())
    }

    async fn document_lines(
        &self,
        kind: DocumentKind,
        header_id: i32,
    ) -> AppResult<Vec<DocumentLineWithItem>> {
        let sql = format!(
            "SELECT l.id, l.header_id, l.item_id, l.quantity, l.unit_price, l.subtotal, l.created_at, \
                    i.code AS item_code, i.name AS item_name, i.unit AS item_unit \
             FROM {} l JOIN items i ON i.id = l.item_id \
             WHERE l.header_id = $1 ORDER BY l.id",
            tables(kind).lines
        );

        let lines = sqlx::query_as::<_, DocumentLineWithItem>(&sql)
            .bind(header_id)
            .fetch_all(&self.db)
            .await?;

        Ok(lines)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTx>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgStoreTx { tx }))
    }

    async fn find_item(&self, id: i32) -> AppResult<Option<Item>> {
        let sql = format!("SELECT {} FROM items i WHERE i.id = $1", ITEM_COLUMNS);
        let item = sqlx::query_as::<_, Item>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(item)
    }

    async fn list_items(&self, search: Option<&str>, page: &PageRequest) -> AppResult<Page<Item>> {
        let pattern = search_pattern(search);

        let sql = format!(
            "SELECT {} FROM items i \
             WHERE ($1::TEXT IS NULL OR i.name ILIKE $1 OR i.code ILIKE $1) \
             ORDER BY i.created_at DESC, i.id DESC LIMIT $2 OFFSET $3",
            ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, Item>(&sql)
            .bind(&pattern)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.db)
            .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM items i \
             WHERE ($1::TEXT IS NULL OR i.name ILIKE $1 OR i.code ILIKE $1)",
        )
        .bind(&pattern)
        .fetch_one(&self.db)
        .await?;

        Ok(page.into_page(items, total))
    }

    async fn list_items_with_stock(
        &self,
        search: Option<&str>,
        page: &PageRequest,
    ) -> AppResult<Page<ItemWithStock>> {
        let pattern = search_pattern(search);

        let sql = format!(
            "SELECT {}, COALESCE(s.qty_in, 0) AS qty_in, COALESCE(s.qty_out, 0) AS qty_out, \
                    COALESCE(s.current_qty, 0) AS current_qty \
             FROM items i LEFT JOIN stock_records s ON s.item_id = i.id \
             WHERE ($1::TEXT IS NULL OR i.name ILIKE $1 OR i.code ILIKE $1) \
             ORDER BY i.created_at DESC, i.id DESC LIMIT $2 OFFSET $3",
            ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, ItemWithStock>(&sql)
            .bind(&pattern)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.db)
            .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM items i \
             WHERE ($1::TEXT IS NULL OR i.name ILIKE $1 OR i.code ILIKE $1)",
        )
        .bind(&pattern)
        .fetch_one(&self.db)
        .await?;

        Ok(page.into_page(items, total))
    }

    async fn update_item(&self, id: i32, input: &UpdateItemInput) -> AppResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            UPDATE items
            SET name = $2, category = $3, unit = $4, buy_price = $5, sell_price = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, code, name, category, unit, buy_price, sell_price, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.category)
        .bind(&input.unit)
        .bind(input.buy_price)
        .bind(input.sell_price)
        .fetch_optional(&self.db)
        .await?;

        Ok(item)
    }

    async fn delete_item(&self, id: i32) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| classify(e, "item"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_stock(&self, item_id: i32) -> AppResult<Option<StockRecord>> {
        let sql = format!("SELECT {} FROM stock_records s WHERE s.item_id = $1", STOCK_COLUMNS);
        let stock = sqlx::query_as::<_, StockRecord>(&sql)
            .bind(item_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(stock)
    }

    async fn list_stock(&self) -> AppResult<Vec<StockWithItem>> {
        let sql = format!(
            "SELECT {}, i.code AS item_code, i.name AS item_name, i.unit AS item_unit \
             FROM stock_records s JOIN items i ON i.id = s.item_id \
             ORDER BY i.name, i.id",
            STOCK_COLUMNS
        );
        let stock = sqlx::query_as::<_, StockWithItem>(&sql)
            .fetch_all(&self.db)
            .await?;
        Ok(stock)
    }

    async fn list_history(&self, page: &PageRequest) -> AppResult<Page<HistoryWithItem>> {
        let sql = format!(
            "SELECT {}, i.code AS item_code, i.name AS item_name \
             FROM stock_history h JOIN items i ON i.id = h.item_id \
             ORDER BY h.created_at DESC, h.id DESC LIMIT $1 OFFSET $2",
            HISTORY_COLUMNS
        );
        let entries = sqlx::query_as::<_, HistoryWithItem>(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.db)
            .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_history")
            .fetch_one(&self.db)
            .await?;

        Ok(page.into_page(entries, total))
    }

    async fn list_item_history(
        &self,
        item_id: i32,
        page: &PageRequest,
    ) -> AppResult<Page<HistoryEntry>> {
        let sql = format!(
            "SELECT {} FROM stock_history h WHERE h.item_id = $1 \
             ORDER BY h.created_at DESC, h.id DESC LIMIT $2 OFFSET $3",
            HISTORY_COLUMNS
        );
        let entries = sqlx::query_as::<_, HistoryEntry>(&sql)
            .bind(item_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.db)
            .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_history WHERE item_id = $1")
            .bind(item_id)
            .fetch_one(&self.db)
            .await?;

        Ok(page.into_page(entries, total))
    }

    async fn ledger_totals(&self) -> AppResult<Vec<LedgerTotals>> {
        let totals = sqlx::query_as::<_, LedgerTotals>(
            r#"
            SELECT s.item_id, s.opening_qty, s.qty_in, s.qty_out, s.current_qty,
                   COALESCE(SUM(h.quantity) FILTER (WHERE h.kind = 'in'), 0)::BIGINT AS history_in,
                   COALESCE(SUM(h.quantity) FILTER (WHERE h.kind = 'out'), 0)::BIGINT AS history_out
            FROM stock_records s
            LEFT JOIN stock_history h ON h.item_id = s.item_id
            GROUP BY s.id
            ORDER BY s.item_id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(totals)
    }

    async fn find_document(
        &self,
        kind: DocumentKind,
        id: i32,
    ) -> AppResult<Option<DocumentWithLines>> {
        let sql = format!(
            "SELECT {} FROM {} d WHERE d.id = $1",
            header_columns(kind),
            tables(kind).header
        );
        let header = sqlx::query_as::<_, DocumentHeader>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        match header {
            Some(header) => {
                let lines = self.document_lines(kind, header.id).await?;
                Ok(Some(DocumentWithLines { header, lines }))
            }
            None => Ok(None),
        }
    }

    async fn list_documents(
        &self,
        kind: DocumentKind,
        page: &PageRequest,
    ) -> AppResult<Page<DocumentHeader>> {
        let t = tables(kind);

        let sql = format!(
            "SELECT {} FROM {} d ORDER BY d.created_at DESC, d.id DESC LIMIT $1 OFFSET $2",
            header_columns(kind),
            t.header
        );
        let headers = sqlx::query_as::<_, DocumentHeader>(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.db)
            .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", t.header))
            .fetch_one(&self.db)
            .await?;

        Ok(page.into_page(headers, total))
    }
}

/// Open PostgreSQL transaction; rolls back on drop unless committed
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn find_item(&mut self, id: i32) -> AppResult<Option<Item>> {
        let sql = format!("SELECT {} FROM items i WHERE i.id = $1", ITEM_COLUMNS);
        let item = sqlx::query_as::<_, Item>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(item)
    }

    async fn insert_item(&mut self, item: &NewItem) -> AppResult<Item> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (code, name, category, unit, buy_price, sell_price)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, code, name, category, unit, buy_price, sell_price, created_at, updated_at
            "#,
        )
        .bind(&item.code)
        .bind(&item.name)
        .bind(&item.category)
        .bind(&item.unit)
        .bind(item.buy_price)
        .bind(item.sell_price)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| classify(e, "code"))?;

        Ok(item)
    }

    async fn next_number(&mut self, scope: &NumberScope) -> AppResult<i32> {
        let max_sql = match scope {
            NumberScope::ItemCode => format!(
                "SELECT COALESCE(MAX(CAST(SUBSTRING(code FROM {}) AS INTEGER)), 0) \
                 FROM items WHERE code ~ $1",
                ITEM_CODE_PREFIX.len() + 1
            ),
            NumberScope::Document { kind, .. } => format!(
                "SELECT COALESCE(MAX(CAST(split_part(document_number, '/', 3) AS INTEGER)), 0) \
                 FROM {} WHERE document_number ~ $1",
                tables(*kind).header
            ),
        };

        // Matches carry at most nine digits
        let max_existing: i32 = sqlx::query_scalar(&max_sql)
            .bind(scope.sql_pattern())
            .fetch_one(&mut *self.tx)
            .await?;
        let floor = shared::next_sequence(None, max_existing)
            .ok_or_else(|| sequence_exhausted(scope))?;

        // The upsert holds the counter row lock until this transaction ends
        let next: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO number_sequences (scope, last_value)
            VALUES ($1, $2)
            ON CONFLICT (scope) DO UPDATE
            SET last_value = GREATEST(number_sequences.last_value + 1, EXCLUDED.last_value),
                updated_at = NOW()
            RETURNING last_value
            "#,
        )
        .bind(scope.key())
        .bind(floor)
        .fetch_one(&mut *self.tx)
        .await?;

        if next > MAX_SEQUENCE {
            return Err(sequence_exhausted(scope));
        }

        Ok(next)
    }

    async fn lock_stock(&mut self, item_id: i32) -> AppResult<Option<StockRecord>> {
        let sql = format!(
            "SELECT {} FROM stock_records s WHERE s.item_id = $1 FOR UPDATE",
            STOCK_COLUMNS
        );
        let stock = sqlx::query_as::<_, StockRecord>(&sql)
            .bind(item_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(stock)
    }

    async fn ensure_stock(&mut self, item_id: i32) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO stock_records (item_id) VALUES ($1) ON CONFLICT (item_id) DO NOTHING",
        )
        .bind(item_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| classify(e, "item_id"))?;

        Ok(())
    }

    async fn apply_delta(
        &mut self,
        item_id: i32,
        qty_in: i32,
        qty_out: i32,
    ) -> AppResult<StockRecord> {
        let updated = sqlx::query_as::<_, StockRecord>(
            r#"
            UPDATE stock_records
            SET qty_in = qty_in + $2,
                qty_out = qty_out + $3,
                current_qty = current_qty + $2 - $3,
                updated_at = NOW()
            WHERE item_id = $1 AND current_qty + $2 - $3 >= 0
            RETURNING id, item_id, opening_qty, qty_in, qty_out, current_qty, created_at, updated_at
            "#,
        )
        .bind(item_id)
        .bind(qty_in)
        .bind(qty_out)
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(stock) = updated {
            return Ok(stock);
        }

        let available: Option<i32> =
            sqlx::query_scalar("SELECT current_qty FROM stock_records WHERE item_id = $1")
                .bind(item_id)
                .fetch_optional(&mut *self.tx)
                .await?;

        match available {
            Some(available) => Err(AppError::InsufficientStock {
                item_id,
                requested: qty_out,
                available,
            }),
            None => Err(AppError::not_found("Stock record", item_id)),
        }
    }

    async fn insert_history(&mut self, entry: &NewHistoryEntry) -> AppResult<HistoryEntry> {
        let entry = sqlx::query_as::<_, HistoryEntry>(
            r#"
            INSERT INTO stock_history
                (item_id, kind, quantity, qty_before, qty_after, note, reference_id, reference_kind)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, item_id, kind, quantity, qty_before, qty_after, note,
                      reference_id, reference_kind, created_at
            "#,
        )
        .bind(entry.item_id)
        .bind(entry.kind)
        .bind(entry.quantity)
        .bind(entry.qty_before)
        .bind(entry.qty_after)
        .bind(&entry.note)
        .bind(entry.reference_id)
        .bind(entry.reference_kind)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(entry)
    }

    async fn insert_header(
        &mut self,
        kind: DocumentKind,
        header: &NewDocumentHeader,
    ) -> AppResult<DocumentHeader> {
        let t = tables(kind);
        let sql = format!(
            "INSERT INTO {table} AS d (document_number, document_date, {cp}, total, note, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {columns}",
            table = t.header,
            cp = t.counterparty,
            columns = header_columns(kind),
        );

        let header = sqlx::query_as::<_, DocumentHeader>(&sql)
            .bind(&header.document_number)
            .bind(header.document_date)
            .bind(&header.counterparty)
            .bind(header.total)
            .bind(&header.note)
            .bind(header.created_by)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| classify(e, "document_number"))?;

        Ok(header)
    }

    async fn insert_line(
        &mut self,
        kind: DocumentKind,
        line: &NewDocumentLine,
    ) -> AppResult<DocumentLine> {
        let sql = format!(
            "INSERT INTO {} (header_id, item_id, quantity, unit_price, subtotal) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, header_id, item_id, quantity, unit_price, subtotal, created_at",
            tables(kind).lines
        );

        let line = sqlx::query_as::<_, DocumentLine>(&sql)
            .bind(line.header_id)
            .bind(line.item_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.subtotal)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| classify(e, "item_id"))?;

        Ok(line)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
