//! Core Kernel - Foundational types for the invoice ledger
//!
//! This crate provides the fundamental building blocks used across all crates:
//! - Money and rate types with precise decimal arithmetic
//! - Strongly-typed identifiers
//! - Field-level validation errors

pub mod money;
pub mod identifiers;
pub mod error;

pub use money::{Money, Rate, MINOR_UNIT_DECIMAL_PLACES};
pub use identifiers::{InvoiceId, InvoiceItemId, ClientId, ProjectId};
pub use error::{FieldError, ValidationErrors};
