//! Error handling for the warehouse inventory backend
//!
//! Every failure carries a stable kind and code so a boundary can map it
//! without inspecting message text.

use shared::FieldError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{resource} {id} not found")]
    NotFound { resource: String, id: String },

    // Business logic errors
    #[error("Insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: i32,
        requested: i32,
        available: i32,
    },

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    // Persistence errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Storage error: {0}")]
    Storage(String),

    // Internal errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an [`AppError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InsufficientStock,
    Conflict,
    Persistence,
    Internal,
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>, id: impl ToString) -> Self {
        AppError::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation { .. } => ErrorKind::Validation,
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            AppError::DuplicateEntry(_) | AppError::Conflict { .. } => ErrorKind::Conflict,
            AppError::DatabaseError(_) | AppError::Migration(_) | AppError::Storage(_) => {
                ErrorKind::Persistence
            }
            AppError::Configuration(_) | AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::DuplicateEntry(_) => "DUPLICATE_ENTRY",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Migration(_) => "MIGRATION_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<FieldError> for AppError {
    fn from(err: FieldError) -> Self {
        AppError::Validation {
            field: err.field,
            message: err.message,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias for services
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_codes() {
        let err = AppError::InsufficientStock {
            item_id: 1,
            requested: 15,
            available: 10,
        };
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");

        let err = AppError::DuplicateEntry("document_number".into());
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = AppError::Storage("disk full".into());
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn test_field_error_conversion() {
        let err: AppError = FieldError::new("lines", "Lines cannot be empty").into();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "lines"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(AppError::not_found("Item", 7).to_string(), "Item 7 not found");
    }
}
