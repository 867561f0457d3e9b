//! Stock ledger tests
//!
//! Tests for the stock ledger including:
//! - Lazy stock record creation on incoming movements
//! - Guarded deltas and locked before/after figures
//! - Current stock always equals the replayed history
//! - Ledger audit

mod common;

use common::*;
use proptest::prelude::*;
use shared::{MovementKind, PageRequest, ReferenceKind};
use warehouse::services::{Movement, StockLedger};
use warehouse::store::Store;
use warehouse::AppError;

fn movement(item_id: i32, kind: MovementKind, quantity: i32) -> Movement {
    Movement {
        item_id,
        kind,
        quantity,
        note: "Penyesuaian".to_string(),
        reference_id: None,
        reference_kind: match kind {
            MovementKind::In => ReferenceKind::Purchase,
            MovementKind::Out => ReferenceKind::Sale,
        },
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[tokio::test]
    async fn test_incoming_movement_creates_record() {
        let (store, state) = setup();
        let item = create_item(&state, "Gas Elpiji 3kg").await;

        let mut tx = store.begin().await.unwrap();
        let entry = StockLedger::record_movement(tx.as_mut(), &movement(item.id, MovementKind::In, 4))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!((entry.qty_before, entry.qty_after), (0, 4));
        let stock = state.ledger().get_current_stock(item.id).await.unwrap().unwrap();
        assert_eq!(stock.opening_qty, 0);
        assert_eq!(stock.current_qty, 4);
        assert!(stock.is_balanced());
    }

    #[tokio::test]
    async fn test_outgoing_movement_without_record() {
        let (store, state) = setup();
        let item = create_item(&state, "Galon Air").await;

        let mut tx = store.begin().await.unwrap();
        let err = StockLedger::record_movement(tx.as_mut(), &movement(item.id, MovementKind::Out, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientStock { available: 0, requested: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_ensure_stock_record_is_idempotent() {
        let (store, state) = setup();
        let item = create_item(&state, "Pensil 2B").await;
        stock_up(&state, item.id, 12).await;

        let mut tx = store.begin().await.unwrap();
        StockLedger::ensure_stock_record(tx.as_mut(), item.id).await.unwrap();
        StockLedger::ensure_stock_record(tx.as_mut(), item.id).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(current_qty(&store, item.id).await, Some(12));
    }

    #[tokio::test]
    async fn test_apply_delta_guards() {
        let (store, state) = setup();
        let item = create_item(&state, "Buku Tulis").await;
        stock_up(&state, item.id, 5).await;

        let mut tx = store.begin().await.unwrap();

        let err = StockLedger::apply_delta(tx.as_mut(), item.id, -1, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = StockLedger::apply_delta(tx.as_mut(), item.id, 0, 6)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientStock { requested: 6, available: 5, .. }
        ));

        let err = StockLedger::apply_delta(tx.as_mut(), 404, 1, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));

        let stock = StockLedger::apply_delta(tx.as_mut(), item.id, 2, 7)
            .await
            .unwrap();
        assert_eq!(stock.current_qty, 0);
        assert_eq!((stock.qty_in, stock.qty_out), (7, 7));
    }

    /// Dropping the handle without committing discards its writes
    #[tokio::test]
    async fn test_uncommitted_transaction_discarded() {
        let (store, state) = setup();
        let item = create_item(&state, "Penghapus").await;

        {
            let mut tx = store.begin().await.unwrap();
            StockLedger::record_movement(tx.as_mut(), &movement(item.id, MovementKind::In, 9))
                .await
                .unwrap();
        }

        assert_eq!(current_qty(&store, item.id).await, None);
    }

    #[tokio::test]
    async fn test_history_listing() {
        let (_store, state) = setup();
        let a = create_item(&state, "Spidol").await;
        let b = create_item(&state, "Map Plastik").await;
        stock_up(&state, a.id, 3).await;
        stock_up(&state, b.id, 2).await;
        stock_up(&state, a.id, 1).await;

        let ledger = state.ledger();

        let all = ledger.list_history(&PageRequest::default()).await.unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.items[0].item_code, a.code);
        assert_eq!((all.items[0].entry.qty_before, all.items[0].entry.qty_after), (3, 4));
        assert_eq!(all.items[1].item_name, "Map Plastik");

        let only_a = ledger
            .list_item_history(a.id, &PageRequest::new(1, 1))
            .await
            .unwrap();
        assert_eq!(only_a.total, 2);
        assert_eq!(only_a.items.len(), 1);

        assert!(matches!(
            ledger.list_item_history(999, &PageRequest::default()).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_stock_joins_items() {
        let (_store, state) = setup();
        let a = create_item(&state, "Amplop Coklat").await;
        let _unstocked = create_item(&state, "Lem Kertas").await;
        stock_up(&state, a.id, 50).await;

        let stock = state.ledger().list_stock().await.unwrap();
        assert_eq!(stock.len(), 1);
        assert_eq!(stock[0].item_code, a.code);
        assert_eq!(stock[0].item_unit, "pcs");
        assert_eq!(stock[0].stock.current_qty, 50);
    }

    #[tokio::test]
    async fn test_audit_clean_after_documents() {
        let (_store, state) = setup();
        let a = create_item(&state, "Baterai AA").await;
        stock_up(&state, a.id, 20).await;
        state
            .sales()
            .create_sale(sale_input(vec![line(a.id, 8, "5000")]), USER_ID)
            .await
            .unwrap();

        assert!(state.audit().run().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_audit_reports_tampered_record() {
        let (store, state) = setup();
        let a = create_item(&state, "Lampu LED").await;
        let b = create_item(&state, "Kabel Roll").await;
        stock_up(&state, a.id, 6).await;
        stock_up(&state, b.id, 6).await;

        store.put_stock_record(b.id, 0, 6, 0, 9).await;

        let discrepancies = state.audit().run().await.unwrap();
        assert_eq!(discrepancies.len(), 1);
        assert_eq!(discrepancies[0].item_id, b.id);
        assert_eq!(discrepancies[0].current_qty, 9);
        assert_eq!(discrepancies[0].counters_qty, 6);
        assert_eq!(discrepancies[0].history_qty, 6);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(40))]

        /// Any mix of purchases and sales keeps stock non-negative, equal to
        /// the replayed history, and audit-clean
        #[test]
        fn prop_stock_matches_history(
            ops in prop::collection::vec((any::<bool>(), 0usize..2, 1i32..20), 1..25)
        ) {
            tokio_test::block_on(async {
                let (store, state) = setup();
                let items = [
                    create_item(&state, "Barang A").await,
                    create_item(&state, "Barang B").await,
                ];
                let mut expected = [0i32; 2];

                for (is_purchase, idx, qty) in ops {
                    let item_id = items[idx].id;
                    if is_purchase {
                        state
                            .purchases()
                            .create_purchase(purchase_input(vec![line(item_id, qty, "10")]), USER_ID)
                            .await
                            .unwrap();
                        expected[idx] += qty;
                    } else {
                        let result = state
                            .sales()
                            .create_sale(sale_input(vec![line(item_id, qty, "12")]), USER_ID)
                            .await;
                        if qty <= expected[idx] {
                            assert!(result.is_ok());
                            expected[idx] -= qty;
                        } else {
                            assert!(matches!(result, Err(AppError::InsufficientStock { .. })));
                        }
                    }
                }

                for (idx, item) in items.iter().enumerate() {
                    let qty = current_qty(&store, item.id).await.unwrap_or(0);
                    assert_eq!(qty, expected[idx]);
                    assert!(qty >= 0);

                    let history = state
                        .ledger()
                        .list_item_history(item.id, &PageRequest::new(1, 1000))
                        .await
                        .unwrap();
                    let replayed: i64 = history
                        .items
                        .iter()
                        .map(|h| h.kind.signed(h.quantity))
                        .sum();
                    assert_eq!(replayed, i64::from(qty));
                }

                assert!(state.audit().run().await.unwrap().is_empty());
            });
        }
    }
}
