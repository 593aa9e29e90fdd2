//! Infra and service-boundary errors.

use stockroom_core::DomainError;
use stockroom_inventory::CountSheetError;
use thiserror::Error;

/// Storage failure. Messages are passed through to callers unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} store lock poisoned")]
    Poisoned(&'static str),

    #[error("database error in {operation}: {message}")]
    Database { operation: String, message: String },

    #[error("stored record is unreadable: {0}")]
    Corrupt(String),

    /// The batch would break a ledger rule; nothing was written.
    #[error("ledger rejected batch: {0}")]
    Rejected(#[from] DomainError),
}

/// Everything a service operation can fail with.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    UploadFormat(#[from] CountSheetError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::Domain(DomainError::not_found(what))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
