//! Item catalog service

use std::sync::Arc;

use shared::{
    validate_create_item, validate_update_item, CreateItemInput, Item, ItemWithStock, NewItem,
    Page, PageRequest, UpdateItemInput,
};

use crate::error::{AppError, AppResult};
use crate::services::NumberAllocator;
use crate::store::{Store, StoreTx};

/// Item catalog service
#[derive(Clone)]
pub struct ItemService {
    store: Arc<dyn Store>,
}

impl ItemService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Catalog lookup used by the document orchestrators
    pub async fn find_item(&self, id: i32) -> AppResult<Option<Item>> {
        self.store.find_item(id).await
    }

    pub async fn get_item(&self, id: i32) -> AppResult<Item> {
        self.store
            .find_item(id)
            .await?
            .ok_or_else(|| AppError::not_found("Item", id))
    }

    /// Create an item. A blank code is replaced by the next `BRG###` code,
    /// allocated in the same transaction as the insert.
    pub async fn create_item(&self, input: CreateItemInput) -> AppResult<Item> {
        validate_create_item(&input)?;

        let mut tx = self.store.begin().await?;
        let inserted = Self::insert(tx.as_mut(), &input).await;
        match inserted {
            Ok(item) => {
                tx.commit().await?;
                tracing::info!(item_id = item.id, code = %item.code, "Item created");
                Ok(item)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!("Rollback failed: {:?}", rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn insert(tx: &mut dyn StoreTx, input: &CreateItemInput) -> AppResult<Item> {
        let supplied = input
            .code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let code = match supplied {
            Some(code) => code.to_string(),
            None => NumberAllocator::item_code(tx).await?,
        };

        tx.insert_item(&NewItem::from_input(code, input)).await
    }

    /// Update name, category, unit and prices. The code never changes.
    pub async fn update_item(&self, id: i32, input: UpdateItemInput) -> AppResult<Item> {
        validate_update_item(&input)?;

        let input = UpdateItemInput {
            name: input.name.trim().to_string(),
            category: input.category.trim().to_string(),
            unit: input.unit.trim().to_string(),
            ..input
        };

        let item = self
            .store
            .update_item(id, &input)
            .await?
            .ok_or_else(|| AppError::not_found("Item", id))?;

        tracing::info!(item_id = id, "Item updated");
        Ok(item)
    }

    /// Delete an item that no stock record, history entry or document
    /// line refers to
    pub async fn delete_item(&self, id: i32) -> AppResult<()> {
        if !self.store.delete_item(id).await? {
            return Err(AppError::not_found("Item", id));
        }
        tracing::info!(item_id = id, "Item deleted");
        Ok(())
    }

    pub async fn list_items(
        &self,
        search: Option<&str>,
        page: &PageRequest,
    ) -> AppResult<Page<Item>> {
        self.store.list_items(search, page).await
    }

    /// Items with qty in/out and current quantity; zeros when never stocked
    pub async fn list_items_with_stock(
        &self,
        search: Option<&str>,
        page: &PageRequest,
    ) -> AppResult<Page<ItemWithStock>> {
        self.store.list_items_with_stock(search, page).await
    }

    /// Code the next generated item would receive. Nothing is reserved.
    pub async fn next_item_code(&self) -> AppResult<String> {
        let mut tx = self.store.begin().await?;
        let code = NumberAllocator::item_code(tx.as_mut()).await;
        tx.rollback().await?;
        code
    }
}
