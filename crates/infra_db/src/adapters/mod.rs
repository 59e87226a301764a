//! Domain Adapters
//!
//! This module provides adapter implementations for domain ports,
//! connecting domain interfaces to the PostgreSQL database layer.
//!
//! Each adapter:
//! - Implements the domain's port trait
//! - Translates between domain models and database row types
//! - Uses the repository layer for database operations
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresInvoiceStore;
//! use domain_billing::InvoiceStore;
//!
//! let store = PostgresInvoiceStore::new(pool);
//! let invoice = store.get(invoice_id).await?;
//! ```

pub mod invoice;

pub use invoice::PostgresInvoiceStore;
