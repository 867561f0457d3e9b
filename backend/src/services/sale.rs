//! Sale (penjualan) orchestration

use std::sync::Arc;

use chrono::NaiveDate;
use shared::{
    require_user, validate_document, CreateSaleInput, DocumentHeader, DocumentKind,
    DocumentWithLines, Page, PageRequest, ValidatedDocument,
};

use crate::error::{AppError, AppResult};
use crate::services::DocumentService;
use crate::store::Store;

/// Records outgoing goods
#[derive(Clone)]
pub struct SaleService {
    documents: DocumentService,
}

impl SaleService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            documents: DocumentService::new(store, DocumentKind::Sale),
        }
    }

    /// Record a sale: header, lines, stock decreases and one `out` history
    /// entry per line, all in one transaction. Fails with
    /// `InsufficientStock` when any line asks for more than is on hand.
    pub async fn create_sale(
        &self,
        input: CreateSaleInput,
        user_id: i32,
    ) -> AppResult<DocumentWithLines> {
        require_user(user_id)?;
        let doc = validate_document(input.into())?;
        let items = self.documents.resolve_items(&doc.lines).await?;
        self.check_availability(&doc).await?;
        self.documents.persist(doc, &items, user_id).await
    }

    /// Fast-fail stock check before any transaction is opened. The guarded
    /// update inside the transaction remains the authority.
    async fn check_availability(&self, doc: &ValidatedDocument) -> AppResult<()> {
        for line in &doc.lines {
            let available = self
                .documents
                .store()
                .find_stock(line.item_id)
                .await?
                .map(|s| s.current_qty)
                .unwrap_or(0);

            if available < line.quantity {
                tracing::warn!(
                    item_id = line.item_id,
                    requested = line.quantity,
                    available,
                    "Sale rejected: insufficient stock"
                );
                return Err(AppError::InsufficientStock {
                    item_id: line.item_id,
                    requested: line.quantity,
                    available,
                });
            }
        }
        Ok(())
    }

    pub async fn get_sale(&self, id: i32) -> AppResult<DocumentWithLines> {
        self.documents.get(id).await
    }

    pub async fn list_sales(&self, page: &PageRequest) -> AppResult<Page<DocumentHeader>> {
        self.documents.list(page).await
    }

    pub async fn next_sale_number(&self, date: NaiveDate) -> AppResult<String> {
        self.documents.next_number(date).await
    }
}
