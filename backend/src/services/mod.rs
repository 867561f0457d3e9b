//! Business logic services for the warehouse inventory core

pub mod audit;
pub mod catalog;
pub mod documents;
pub mod ledger;
pub mod numbering;
pub mod purchase;
pub mod sale;

pub use audit::{LedgerAudit, LedgerDiscrepancy};
pub use catalog::ItemService;
pub use documents::DocumentService;
pub use ledger::{Movement, StockLedger};
pub use numbering::NumberAllocator;
pub use purchase::PurchaseService;
pub use sale::SaleService;
