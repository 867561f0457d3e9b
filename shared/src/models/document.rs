//! Purchase (pembelian) and sale (penjualan) documents

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{MovementKind, ReferenceKind};

/// Kind of multi-line stock document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Purchase,
    Sale,
}

impl DocumentKind {
    /// Prefix of generated document numbers
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Purchase => "BL",
            DocumentKind::Sale => "JL",
        }
    }

    pub fn movement(&self) -> MovementKind {
        match self {
            DocumentKind::Purchase => MovementKind::In,
            DocumentKind::Sale => MovementKind::Out,
        }
    }

    pub fn reference_kind(&self) -> ReferenceKind {
        match self {
            DocumentKind::Purchase => ReferenceKind::Purchase,
            DocumentKind::Sale => ReferenceKind::Sale,
        }
    }

    /// Field name of the counterparty on input shapes
    pub fn counterparty_field(&self) -> &'static str {
        match self {
            DocumentKind::Purchase => "supplier",
            DocumentKind::Sale => "customer",
        }
    }

    /// Note written on each history entry of a document
    pub fn history_note(&self, document_number: &str) -> String {
        match self {
            DocumentKind::Purchase => format!("Pembelian - {}", document_number),
            DocumentKind::Sale => format!("Penjualan - {}", document_number),
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::Purchase => write!(f, "Purchase"),
            DocumentKind::Sale => write!(f, "Sale"),
        }
    }
}

/// Document header (beli_header / jual_header)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DocumentHeader {
    pub id: i32,
    pub document_number: String,
    pub document_date: NaiveDate,
    /// Supplier for purchases, customer for sales
    pub counterparty: String,
    pub total: Decimal,
    pub note: String,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Document line (beli_detail / jual_detail)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DocumentLine {
    pub id: i32,
    pub header_id: i32,
    pub item_id: i32,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Line with the item's display fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DocumentLineWithItem {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub line: DocumentLine,
    pub item_code: String,
    pub item_name: String,
    pub item_unit: String,
}

/// Header aggregate returned by create and get operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentWithLines {
    #[serde(flatten)]
    pub header: DocumentHeader,
    pub lines: Vec<DocumentLineWithItem>,
}

impl DocumentWithLines {
    pub fn lines_total(&self) -> Decimal {
        self.lines.iter().map(|l| l.line.subtotal).sum()
    }
}

/// One requested line of a purchase or sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LineInput {
    #[validate(range(min = 1, message = "Item id must be positive"))]
    pub item_id: i32,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl LineInput {
    pub fn new(item_id: i32, quantity: i32, unit_price: Decimal) -> Self {
        Self {
            item_id,
            quantity,
            unit_price,
        }
    }
}

/// Input for recording a purchase
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePurchaseInput {
    /// Generated (`BL/YYYYMMDD/NNN`) when absent or blank
    #[serde(default)]
    pub document_number: Option<String>,
    #[serde(default)]
    pub document_date: Option<NaiveDate>,
    #[serde(default)]
    pub supplier: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub lines: Vec<LineInput>,
}

/// Input for recording a sale
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSaleInput {
    /// Generated (`JL/YYYYMMDD/NNN`) when absent or blank
    #[serde(default)]
    pub document_number: Option<String>,
    #[serde(default)]
    pub document_date: Option<NaiveDate>,
    #[serde(default)]
    pub customer: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub lines: Vec<LineInput>,
}

/// Kind-independent, not yet validated document request
#[derive(Debug, Clone)]
pub struct DocumentDraft {
    pub kind: DocumentKind,
    pub document_number: Option<String>,
    pub document_date: Option<NaiveDate>,
    pub counterparty: String,
    pub note: String,
    pub lines: Vec<LineInput>,
}

impl From<CreatePurchaseInput> for DocumentDraft {
    fn from(input: CreatePurchaseInput) -> Self {
        Self {
            kind: DocumentKind::Purchase,
            document_number: input.document_number,
            document_date: input.document_date,
            counterparty: input.supplier,
            note: input.note,
            lines: input.lines,
        }
    }
}

impl From<CreateSaleInput> for DocumentDraft {
    fn from(input: CreateSaleInput) -> Self {
        Self {
            kind: DocumentKind::Sale,
            document_number: input.document_number,
            document_date: input.document_date,
            counterparty: input.customer,
            note: input.note,
            lines: input.lines,
        }
    }
}

/// Header row to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocumentHeader {
    pub document_number: String,
    pub document_date: NaiveDate,
    pub counterparty: String,
    pub total: Decimal,
    pub note: String,
    pub created_by: i32,
}

/// Line row to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocumentLine {
    pub header_id: i32,
    pub item_id: i32,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}
