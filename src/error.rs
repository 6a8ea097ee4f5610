//! # Error handling utilities.
//! The crate uses the generic anyhow error type for propagation. Failures a
//! caller may want to branch on are raised as [`StoreError`] and can be
//! recovered with `err.downcast_ref::<StoreError>()`.

use thiserror::Error;

pub type Result<T> = anyhow::Result<T>;

/// Typed failures of the record stores.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    /// The requested scan, network, issue or report does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Input rejected before anything was written.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The storage backend answered with an error.
    #[error("backend request failed: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        StoreError::NotFound { entity, id }
    }

    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        StoreError::Validation { field, reason: reason.into() }
    }
}

/// Returns true when `err` carries a [`StoreError::NotFound`].
pub fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<StoreError>(), Some(StoreError::NotFound { .. }))
}
