//! Number allocation for item codes and document numbers

use chrono::NaiveDate;
use shared::{DocumentKind, NumberScope};

use crate::error::AppResult;
use crate::store::StoreTx;

/// Allocates numbers inside the transaction that will use them, so a
/// rolled-back transaction releases its number.
pub struct NumberAllocator;

impl NumberAllocator {
    pub async fn allocate(tx: &mut dyn StoreTx, scope: NumberScope) -> AppResult<String> {
        let seq = tx.next_number(&scope).await?;
        let number = scope.format(seq);
        tracing::debug!(scope = %scope.key(), %number, "Number allocated");
        Ok(number)
    }

    /// Next `BRG###` item code
    pub async fn item_code(tx: &mut dyn StoreTx) -> AppResult<String> {
        Self::allocate(tx, NumberScope::ItemCode).await
    }

    /// Next `BL/YYYYMMDD/###` or `JL/YYYYMMDD/###` number for `date`
    pub async fn document_number(
        tx: &mut dyn StoreTx,
        kind: DocumentKind,
        date: NaiveDate,
    ) -> AppResult<String> {
        Self::allocate(tx, NumberScope::document(kind, date)).await
    }
}
