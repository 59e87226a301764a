//! Store adapters shipped with the billing domain
//!
//! The PostgreSQL adapter lives in `infra_db`; this module only holds the
//! process-local store used by tests and the `memory` storage mode.
//!
//! ```rust,ignore
//! use domain_billing::adapters::InMemoryInvoiceStore;
//! use domain_billing::InvoiceStore;
//! use std::sync::Arc;
//!
//! let store: Arc<dyn InvoiceStore> = Arc::new(InMemoryInvoiceStore::new());
//! ```

pub mod in_memory;

pub use in_memory::InMemoryInvoiceStore;
