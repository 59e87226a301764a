//! Infrastructure Database Layer
//!
//! This crate provides PostgreSQL persistence for the invoice ledger using SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern: repositories hold the SQL and
//! map rows, adapters implement the billing domain's ports on top of them.
//!
//! # Numbering
//!
//! Invoice sequences live in one counter row per prefix and year,
//! incremented inside the transaction that inserts the invoice. The row lock
//! taken by the increment serializes concurrent creators.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresInvoiceStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/invoice_ledger")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresInvoiceStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, create_pool, run_migrations, DatabaseConfig, MIGRATOR};
pub use error::DatabaseError;
pub use adapters::PostgresInvoiceStore;
