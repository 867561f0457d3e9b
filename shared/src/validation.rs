//! Validation utilities for the warehouse inventory system
//!
//! Everything here runs before any storage access.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::models::{
    CreateItemInput, DocumentDraft, DocumentKind, LineInput, UpdateItemInput,
};

/// A rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    fn prefixed(self, prefix: &str) -> Self {
        Self {
            field: format!("{}.{}", prefix, self.field),
            message: self.message,
        }
    }
}

impl From<ValidationErrors> for FieldError {
    fn from(errors: ValidationErrors) -> Self {
        // Deterministic pick: the alphabetically first failing field
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);

        match fields.first() {
            Some((field, errs)) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "Invalid value".to_string());
                FieldError::new(*field, message)
            }
            None => FieldError::new("input", "Invalid input"),
        }
    }
}

// ============================================================================
// Documents
// ============================================================================

/// A purchase or sale request that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDocument {
    pub kind: DocumentKind,
    /// Caller-supplied number; `None` means generate one
    pub document_number: Option<String>,
    pub document_date: NaiveDate,
    pub counterparty: String,
    pub note: String,
    pub lines: Vec<LineInput>,
    pub total: Decimal,
}

/// Validate a document request: date and counterparty required, at least
/// one line, every line with a positive item id and quantity and a
/// non-negative unit price.
pub fn validate_document(draft: DocumentDraft) -> Result<ValidatedDocument, FieldError> {
    let document_date = draft
        .document_date
        .ok_or_else(|| FieldError::new("document_date", "Document date is required"))?;

    let counterparty = require_text(draft.kind.counterparty_field(), &draft.counterparty)?;

    validate_lines(&draft.lines)?;

    let document_number = draft
        .document_number
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let total = document_total(&draft.lines)?;

    Ok(ValidatedDocument {
        kind: draft.kind,
        document_number,
        document_date,
        counterparty,
        note: draft.note.trim().to_string(),
        lines: draft.lines,
        total,
    })
}

/// Validate the line list of a document
pub fn validate_lines(lines: &[LineInput]) -> Result<(), FieldError> {
    if lines.is_empty() {
        return Err(FieldError::new("lines", "Lines cannot be empty"));
    }

    for (idx, line) in lines.iter().enumerate() {
        let prefix = format!("lines[{}]", idx);
        line.validate()
            .map_err(|e| FieldError::from(e).prefixed(&prefix))?;
        validate_price("unit_price", line.unit_price).map_err(|e| e.prefixed(&prefix))?;
    }

    Ok(())
}

/// Subtotal of one line: quantity × unit price, `None` on overflow
pub fn line_subtotal(quantity: i32, unit_price: Decimal) -> Option<Decimal> {
    Decimal::from(quantity).checked_mul(unit_price)
}

/// Sum of line subtotals. Overflow is reported against the unit price of
/// the line that caused it.
pub fn document_total(lines: &[LineInput]) -> Result<Decimal, FieldError> {
    lines
        .iter()
        .enumerate()
        .try_fold(Decimal::ZERO, |total, (idx, line)| {
            line_subtotal(line.quantity, line.unit_price)
                .and_then(|subtotal| total.checked_add(subtotal))
                .ok_or_else(|| {
                    FieldError::new(
                        format!("lines[{}].unit_price", idx),
                        "Amount is too large",
                    )
                })
        })
}

// ============================================================================
// Items
// ============================================================================

pub fn validate_create_item(input: &CreateItemInput) -> Result<(), FieldError> {
    input.validate()?;
    require_text("name", &input.name)?;
    require_text("unit", &input.unit)?;
    validate_price("buy_price", input.buy_price)?;
    validate_price("sell_price", input.sell_price)?;
    Ok(())
}

pub fn validate_update_item(input: &UpdateItemInput) -> Result<(), FieldError> {
    input.validate()?;
    require_text("name", &input.name)?;
    require_text("unit", &input.unit)?;
    validate_price("buy_price", input.buy_price)?;
    validate_price("sell_price", input.sell_price)?;
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Trimmed value of a required text field
pub fn require_text(field: &str, value: &str) -> Result<String, FieldError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FieldError::new(field, format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// The acting user recorded as `created_by`
pub fn require_user(user_id: i32) -> Result<(), FieldError> {
    if user_id <= 0 {
        return Err(FieldError::new("created_by", "Acting user is required"));
    }
    Ok(())
}

pub fn validate_price(field: &str, price: Decimal) -> Result<(), FieldError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(FieldError::new(field, "Price cannot be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreatePurchaseInput;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn purchase(lines: Vec<LineInput>) -> DocumentDraft {
        CreatePurchaseInput {
            document_number: None,
            document_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            supplier: "PT Sumber Makmur".to_string(),
            note: String::new(),
            lines,
        }
        .into()
    }

    #[test]
    fn test_empty_lines_rejected() {
        let err = validate_document(purchase(vec![])).unwrap_err();
        assert_eq!(err.field, "lines");
    }

    #[test]
    fn test_missing_date_rejected() {
        let mut draft = purchase(vec![LineInput::new(1, 1, dec("10"))]);
        draft.document_date = None;
        let err = validate_document(draft).unwrap_err();
        assert_eq!(err.field, "document_date");
    }

    #[test]
    fn test_blank_supplier_rejected() {
        let mut draft = purchase(vec![LineInput::new(1, 1, dec("10"))]);
        draft.counterparty = "   ".to_string();
        let err = validate_document(draft).unwrap_err();
        assert_eq!(err.field, "supplier");
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let draft = purchase(vec![
            LineInput::new(1, 2, dec("10")),
            LineInput::new(2, 0, dec("10")),
        ]);
        let err = validate_document(draft).unwrap_err();
        assert_eq!(err.field, "lines[1].quantity");
    }

    #[test]
    fn test_negative_price_rejected() {
        let draft = purchase(vec![LineInput::new(1, 2, dec("-0.01"))]);
        let err = validate_document(draft).unwrap_err();
        assert_eq!(err.field, "lines[0].unit_price");
    }

    #[test]
    fn test_zero_price_accepted() {
        let draft = purchase(vec![LineInput::new(1, 2, Decimal::ZERO)]);
        assert!(validate_document(draft).is_ok());
    }

    #[test]
    fn test_blank_document_number_means_generate() {
        let mut draft = purchase(vec![LineInput::new(1, 1, dec("5"))]);
        draft.document_number = Some("  ".to_string());
        let doc = validate_document(draft).unwrap();
        assert_eq!(doc.document_number, None);
    }

    #[test]
    fn test_total_is_sum_of_subtotals() {
        let draft = purchase(vec![
            LineInput::new(1, 5, dec("100")),
            LineInput::new(1, 3, dec("100")),
        ]);
        let doc = validate_document(draft).unwrap();
        assert_eq!(doc.total, dec("800"));
    }

    #[test]
    fn test_line_subtotal() {
        assert_eq!(line_subtotal(3, dec("12.50")), Some(dec("37.50")));
        assert_eq!(line_subtotal(2, Decimal::MAX), None);
    }

    #[test]
    fn test_subtotal_overflow_rejected() {
        let draft = purchase(vec![
            LineInput::new(1, 1, dec("10")),
            LineInput::new(2, 2, Decimal::MAX),
        ]);
        let err = validate_document(draft).unwrap_err();
        assert_eq!(err.field, "lines[1].unit_price");
    }

    #[test]
    fn test_total_overflow_rejected() {
        let draft = purchase(vec![
            LineInput::new(1, 1, Decimal::MAX),
            LineInput::new(2, 1, Decimal::MAX),
        ]);
        let err = validate_document(draft).unwrap_err();
        assert_eq!(err.field, "lines[1].unit_price");
    }

    #[test]
    fn test_require_user() {
        assert!(require_user(1).is_ok());
        assert_eq!(require_user(0).unwrap_err().field, "created_by");
        assert_eq!(require_user(-4).unwrap_err().field, "created_by");
    }

    #[test]
    fn test_item_requires_name_and_unit() {
        let input = CreateItemInput {
            name: "Beras 5kg".to_string(),
            unit: " ".to_string(),
            ..Default::default()
        };
        assert_eq!(validate_create_item(&input).unwrap_err().field, "unit");

        let input = CreateItemInput {
            unit: "pcs".to_string(),
            ..Default::default()
        };
        assert_eq!(validate_create_item(&input).unwrap_err().field, "name");
    }
}
