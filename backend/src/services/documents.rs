//! Shared machinery of the purchase and sale orchestrators

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use shared::{
    line_subtotal, DocumentHeader, DocumentKind, DocumentLine, DocumentLineWithItem,
    DocumentWithLines, Item, LineInput, NewDocumentHeader, NewDocumentLine, Page, PageRequest,
    ValidatedDocument,
};

use crate::error::{AppError, AppResult};
use crate::services::{Movement, NumberAllocator, StockLedger};
use crate::store::{Store, StoreTx};

/// Create and read documents of one kind
#[derive(Clone)]
pub struct DocumentService {
    store: Arc<dyn Store>,
    kind: DocumentKind,
}

impl DocumentService {
    pub fn new(store: Arc<dyn Store>, kind: DocumentKind) -> Self {
        Self { store, kind }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Look up every item the lines reference
    pub async fn resolve_items(&self, lines: &[LineInput]) -> AppResult<HashMap<i32, Item>> {
        let mut items = HashMap::new();
        for line in lines {
            if items.contains_key(&line.item_id) {
                continue;
            }
            let item = self
                .store
                .find_item(line.item_id)
                .await?
                .ok_or_else(|| AppError::not_found("Item", line.item_id))?;
            items.insert(item.id, item);
        }
        Ok(items)
    }

    /// Write the header, its lines and their stock movements in one
    /// transaction. Any failure rolls the whole document back.
    pub async fn persist(
        &self,
        doc: ValidatedDocument,
        items: &HashMap<i32, Item>,
        user_id: i32,
    ) -> AppResult<DocumentWithLines> {
        let mut tx = self.store.begin().await?;

        let written = Self::write(tx.as_mut(), &doc, user_id).await;
        let (header, lines) = match written {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!(
                    kind = %self.kind,
                    error = %e,
                    "Document rejected, rolling back"
                );
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!("Rollback failed: {:?}", rollback_err);
                }
                return Err(e);
            }
        };

        tx.commit().await?;

        tracing::info!(
            kind = %self.kind,
            id = header.id,
            number = %header.document_number,
            lines = lines.len(),
            total = %header.total,
            "Document recorded"
        );

        let lines = lines
            .into_iter()
            .map(|line| with_item(line, items))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(DocumentWithLines { header, lines })
    }

    async fn write(
        tx: &mut dyn StoreTx,
        doc: &ValidatedDocument,
        user_id: i32,
    ) -> AppResult<(DocumentHeader, Vec<DocumentLine>)> {
        let kind = doc.kind;

        let document_number = match &doc.document_number {
            Some(number) => number.clone(),
            None => NumberAllocator::document_number(tx, kind, doc.document_date).await?,
        };

        let header = tx
            .insert_header(
                kind,
                &NewDocumentHeader {
                    document_number,
                    document_date: doc.document_date,
                    counterparty: doc.counterparty.clone(),
                    total: doc.total,
                    note: doc.note.clone(),
                    created_by: user_id,
                },
            )
            .await?;

        let note = kind.history_note(&header.document_number);
        let mut lines = Vec::with_capacity(doc.lines.len());

        for (idx, input) in doc.lines.iter().enumerate() {
            let subtotal = line_subtotal(input.quantity, input.unit_price).ok_or_else(|| {
                AppError::validation(format!("lines[{}].unit_price", idx), "Amount is too large")
            })?;

            let line = tx
                .insert_line(
                    kind,
                    &NewDocumentLine {
                        header_id: header.id,
                        item_id: input.item_id,
                        quantity: input.quantity,
                        unit_price: input.unit_price,
                        subtotal,
                    },
                )
                .await?;

            StockLedger::record_movement(
                tx,
                &Movement {
                    item_id: input.item_id,
                    kind: kind.movement(),
                    quantity: input.quantity,
                    note: note.clone(),
                    reference_id: Some(header.id),
                    reference_kind: kind.reference_kind(),
                },
            )
            .await?;

            lines.push(line);
        }

        Ok((header, lines))
    }

    /// Header and lines with the items' current code, name and unit
    pub async fn get(&self, id: i32) -> AppResult<DocumentWithLines> {
        self.store
            .find_document(self.kind, id)
            .await?
            .ok_or_else(|| AppError::not_found(self.kind.to_string(), id))
    }

    /// Headers newest first
    pub async fn list(&self, page: &PageRequest) -> AppResult<Page<DocumentHeader>> {
        self.store.list_documents(self.kind, page).await
    }

    /// Number the next generated document dated `date` would receive.
    /// Nothing is reserved.
    pub async fn next_number(&self, date: NaiveDate) -> AppResult<String> {
        let mut tx = self.store.begin().await?;
        let number = NumberAllocator::document_number(tx.as_mut(), self.kind, date).await;
        tx.rollback().await?;
        number
    }
}

fn with_item(line: DocumentLine, items: &HashMap<i32, Item>) -> AppResult<DocumentLineWithItem> {
    let item = items
        .get(&line.item_id)
        .ok_or_else(|| AppError::Internal(format!("Item {} was not resolved", line.item_id)))?;

    Ok(DocumentLineWithItem {
        item_code: item.code.clone(),
        item_name: item.name.clone(),
        item_unit: item.unit.clone(),
        line,
    })
}
