//! Billing domain errors

use thiserror::Error;

use core_kernel::ValidationErrors;

use crate::invoice::InvoiceStatus;

/// Failures reported by an [`InvoiceStore`](crate::ports::InvoiceStore) adapter
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or timed out
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A concurrent writer got there first: the record changed since it was
    /// read, or the database aborted the transaction
    #[error("Concurrent write conflict: {0}")]
    Conflict(String),

    /// Stored data could not be mapped back to domain types
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Any other backend failure
    #[error("Store failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns true if retrying the whole operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Conflict(_))
    }
}

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Request rejected before anything was persisted
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Entity not found (or hidden by soft delete)
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Status change not permitted by the invoice lifecycle
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },

    /// Items can no longer be edited in this status
    #[error("Items of an invoice in status {0} cannot be edited")]
    ItemsLocked(InvoiceStatus),

    /// The caller may not see this invoice
    #[error("Access denied to {0}")]
    Forbidden(String),

    /// Storage failure; nothing was partially written
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BillingError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        BillingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns true if the caller may retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingError::Store(e) if e.is_retryable())
    }
}
