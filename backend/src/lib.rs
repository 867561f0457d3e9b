//! Warehouse inventory core
//!
//! Items, a stock ledger with an append-only history, and purchase and
//! sale documents that move stock inside a single transaction.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod services;
pub mod store;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, AppResult, ErrorKind};

use services::{ItemService, LedgerAudit, PurchaseService, SaleService, StockLedger};
use store::Store;

/// Services sharing one store
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn items(&self) -> ItemService {
        ItemService::new(self.store.clone())
    }

    pub fn ledger(&self) -> StockLedger {
        StockLedger::new(self.store.clone())
    }

    pub fn purchases(&self) -> PurchaseService {
        PurchaseService::new(self.store.clone())
    }

    pub fn sales(&self) -> SaleService {
        SaleService::new(self.store.clone())
    }

    pub fn audit(&self) -> LedgerAudit {
        LedgerAudit::new(self.store.clone())
    }
}
