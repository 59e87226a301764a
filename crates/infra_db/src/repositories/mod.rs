//! Repository implementations for billing entities
//!
//! Repositories encapsulate SQL queries and map between database rows and
//! plain row structs. Conversion to domain types happens in the adapters.
//!
//! # Architecture
//!
//! Each repository follows these principles:
//! - Runtime-checked queries with `FromRow` row types
//! - Write methods take a connection so they compose inside one transaction
//! - PostgreSQL enums mirrored as `sqlx::Type` enums

pub mod invoice;
pub mod project;

pub use invoice::{InvoiceRepository, InvoiceQuery, InvoiceRow, InvoiceItemRow};
pub use project::{ProjectRepository, ClientRow, ProjectRow, ProjectWithClientRow};
