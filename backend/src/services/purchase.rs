//! Purchase (pembelian) orchestration

use std::sync::Arc;

use chrono::NaiveDate;
use shared::{
    require_user, validate_document, CreatePurchaseInput, DocumentHeader, DocumentKind,
    DocumentWithLines, Page, PageRequest,
};

use crate::error::AppResult;
use crate::services::DocumentService;
use crate::store::Store;

/// Records incoming goods
#[derive(Clone)]
pub struct PurchaseService {
    documents: DocumentService,
}

impl PurchaseService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            documents: DocumentService::new(store, DocumentKind::Purchase),
        }
    }

    /// Record a purchase: header, lines, stock increases and one `in`
    /// history entry per line, all in one transaction
    pub async fn create_purchase(
        &self,
        input: CreatePurchaseInput,
        user_id: i32,
    ) -> AppResult<DocumentWithLines> {
        require_user(user_id)?;
        let doc = validate_document(input.into())?;
        let items = self.documents.resolve_items(&doc.lines).await?;
        self.documents.persist(doc, &items, user_id).await
    }

    pub async fn get_purchase(&self, id: i32) -> AppResult<DocumentWithLines> {
        self.documents.get(id).await
    }

    pub async fn list_purchases(&self, page: &PageRequest) -> AppResult<Page<DocumentHeader>> {
        self.documents.list(page).await
    }

    pub async fn next_purchase_number(&self, date: NaiveDate) -> AppResult<String> {
        self.documents.next_number(date).await
    }
}
