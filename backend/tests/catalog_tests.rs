//! Item catalog tests
//!
//! Tests for item management including:
//! - Item code generation (BRG###)
//! - Consecutive allocations differ by exactly one
//! - Update keeps the code
//! - Delete refuses referenced items
//! - Search and pagination

mod common;

use common::*;
use shared::{CreateItemInput, DocumentKind, NumberScope, PageRequest, UpdateItemInput};
use warehouse::services::NumberAllocator;
use warehouse::store::{FailurePoint, Store};
use warehouse::AppError;

fn item_input(name: &str, code: Option<&str>) -> CreateItemInput {
    CreateItemInput {
        code: code.map(str::to_string),
        name: name.to_string(),
        category: "Sembako".to_string(),
        unit: "pcs".to_string(),
        buy_price: dec("1000"),
        sell_price: dec("1200"),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[tokio::test]
    async fn test_generated_codes_are_sequential() {
        let (_store, state) = setup();
        let items = state.items();

        let first = items.create_item(item_input("Beras", None)).await.unwrap();
        let second = items.create_item(item_input("Gula", Some("  "))).await.unwrap();

        assert_eq!(first.code, "BRG001");
        assert_eq!(second.code, "BRG002");
        assert_eq!(second.category, "Sembako");
    }

    #[tokio::test]
    async fn test_generation_continues_after_highest_code() {
        let (_store, state) = setup();
        let items = state.items();

        let custom = items
            .create_item(item_input("Minyak", Some("BRG010")))
            .await
            .unwrap();
        assert_eq!(custom.code, "BRG010");

        items
            .create_item(item_input("Sabun", Some("SBN-01")))
            .await
            .unwrap();

        let generated = items.create_item(item_input("Kopi", None)).await.unwrap();
        assert_eq!(generated.code, "BRG011");
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let (_store, state) = setup();
        let items = state.items();

        items
            .create_item(item_input("Teh", Some("TEH-1")))
            .await
            .unwrap();
        let err = items
            .create_item(item_input("Teh Hijau", Some("TEH-1")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEntry(ref f) if f == "code"));
    }

    #[tokio::test]
    async fn test_next_item_code_does_not_reserve() {
        let (_store, state) = setup();
        let items = state.items();

        assert_eq!(items.next_item_code().await.unwrap(), "BRG001");
        assert_eq!(items.next_item_code().await.unwrap(), "BRG001");

        let item = items.create_item(item_input("Garam", None)).await.unwrap();
        assert_eq!(item.code, "BRG001");
    }

    /// Two allocations with no write between them are N and N+1, and a
    /// rollback hands both back
    #[tokio::test]
    async fn test_allocations_in_one_transaction_are_consecutive() {
        let (store, state) = setup();
        let items = state.items();
        items.create_item(item_input("Beras", None)).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let first = NumberAllocator::item_code(tx.as_mut()).await.unwrap();
        let second = NumberAllocator::item_code(tx.as_mut()).await.unwrap();

        let scope = NumberScope::ItemCode;
        let n = scope.parse_sequence(&first).unwrap();
        assert_eq!(n, 2);
        assert_eq!(scope.parse_sequence(&second), Some(n + 1));

        let scope = NumberScope::document(DocumentKind::Sale, day());
        let first = NumberAllocator::document_number(tx.as_mut(), DocumentKind::Sale, day())
            .await
            .unwrap();
        let second = NumberAllocator::document_number(tx.as_mut(), DocumentKind::Sale, day())
            .await
            .unwrap();
        assert_eq!(first, "JL/20240301/001");
        assert_eq!(
            scope.parse_sequence(&second),
            scope.parse_sequence(&first).map(|n| n + 1)
        );

        tx.rollback().await.unwrap();

        assert_eq!(items.next_item_code().await.unwrap(), "BRG002");
        assert_eq!(
            state.sales().next_sale_number(day()).await.unwrap(),
            "JL/20240301/001"
        );
    }

    /// Codes longer than nine digits are accepted but do not move generation
    #[tokio::test]
    async fn test_long_codes_ignored_by_generation() {
        let (_store, state) = setup();
        let items = state.items();

        items
            .create_item(item_input("Jagung", Some("BRG2147483647")))
            .await
            .unwrap();
        items
            .create_item(item_input("Kedelai", Some("BRG99999999999")))
            .await
            .unwrap();

        let generated = items.create_item(item_input("Kacang", None)).await.unwrap();
        assert_eq!(generated.code, "BRG001");
    }

    #[tokio::test]
    async fn test_exhausted_code_space() {
        let (_store, state) = setup();
        let items = state.items();

        items
            .create_item(item_input("Terakhir", Some("BRG999999999")))
            .await
            .unwrap();

        let err = items.create_item(item_input("Lagi", None)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
        assert!(matches!(
            items.next_item_code().await,
            Err(AppError::Conflict { .. })
        ));

        let listed = items.list_items(None, &PageRequest::default()).await.unwrap();
        assert_eq!(listed.total, 1);
    }

    #[tokio::test]
    async fn test_failed_insert_releases_code() {
        let (store, state) = setup();
        let items = state.items();

        store.fail_after(FailurePoint::InsertItem, 0).await;
        let err = items.create_item(item_input("Kecap", None)).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));

        let item = items.create_item(item_input("Kecap", None)).await.unwrap();
        assert_eq!(item.code, "BRG001");
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (_store, state) = setup();
        let items = state.items();

        let err = items.create_item(item_input("", None)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "name"));

        let mut negative = item_input("Susu", None);
        negative.sell_price = dec("-5");
        let err = items.create_item(negative).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "sell_price"));
    }

    #[tokio::test]
    async fn test_update_keeps_code() {
        let (_store, state) = setup();
        let items = state.items();
        let item = items.create_item(item_input("Tepung", None)).await.unwrap();

        let updated = items
            .update_item(
                item.id,
                UpdateItemInput {
                    name: "  Tepung Terigu 1kg ".to_string(),
                    category: "Bahan Kue".to_string(),
                    unit: "bks".to_string(),
                    buy_price: dec("11000"),
                    sell_price: dec("13500"),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.code, item.code);
        assert_eq!(updated.name, "Tepung Terigu 1kg");
        assert_eq!(updated.sell_price, dec("13500"));
        assert_eq!(items.get_item(item.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_missing_item() {
        let (_store, state) = setup();
        let err = state
            .items()
            .update_item(
                5,
                UpdateItemInput {
                    name: "Apa Saja".to_string(),
                    unit: "pcs".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let (_store, state) = setup();
        let items = state.items();

        let unused = items.create_item(item_input("Lilin", None)).await.unwrap();
        items.delete_item(unused.id).await.unwrap();
        assert!(matches!(
            items.get_item(unused.id).await,
            Err(AppError::NotFound { .. })
        ));
        assert!(matches!(
            items.delete_item(unused.id).await,
            Err(AppError::NotFound { .. })
        ));

        let stocked = items.create_item(item_input("Korek Api", None)).await.unwrap();
        stock_up(&state, stocked.id, 3).await;
        let err = items.delete_item(stocked.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
        assert!(items.get_item(stocked.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_search_and_pagination() {
        let (_store, state) = setup();
        let items = state.items();
        for name in ["Beras Merah", "Beras Putih", "Gula Aren", "Minyak Kelapa"] {
            items.create_item(item_input(name, None)).await.unwrap();
        }

        let found = items
            .list_items(Some("beras"), &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(found.total, 2);
        // Newest first
        assert_eq!(found.items[0].name, "Beras Putih");

        let by_code = items
            .list_items(Some("brg003"), &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(by_code.total, 1);
        assert_eq!(by_code.items[0].name, "Gula Aren");

        let page = items.list_items(None, &PageRequest::new(2, 3)).await.unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].code, "BRG001");
        assert_eq!(page.total_pages(), 2);
    }

    #[tokio::test]
    async fn test_list_with_stock_defaults_to_zero() {
        let (_store, state) = setup();
        let stocked = create_item(&state, "Mie Instan").await;
        let fresh = create_item(&state, "Saus Sambal").await;
        stock_up(&state, stocked.id, 40).await;

        let listed = state
            .items()
            .list_items_with_stock(None, &PageRequest::default())
            .await
            .unwrap();

        let find = |id: i32| listed.items.iter().find(|i| i.item.id == id).unwrap();
        assert_eq!(find(stocked.id).current_qty, 40);
        assert_eq!(find(stocked.id).qty_in, 40);
        assert_eq!(find(fresh.id).current_qty, 0);
        assert_eq!(find(fresh.id).qty_out, 0);
    }
}
