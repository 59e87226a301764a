//! Billing Domain - Invoice Ledger
//!
//! This crate implements invoicing for client projects: every invoice gets a
//! human-readable number that is unique within its calendar year, and its
//! financial fields are derived from its items on every read.
//!
//! # Invoice Numbers
//!
//! Numbers have the form `{PREFIX}/{YEAR}/{SEQ}` (e.g. `BH/2025/3`). The
//! sequence restarts at 1 each year and is never reused, even after the
//! invoice is cancelled or deleted. Allocation happens inside the store in
//! the same atomic unit that persists the invoice.
//!
//! # Financial Fields
//!
//! - **subtotal**: Σ quantity × unit price
//! - **tax_amount**: subtotal × tax percentage / 100
//! - **total_ttc**: subtotal + tax_amount
//! - **net_to_pay**: total_ttc − advance payment (may be negative)
//!
//! Amounts are kept at full precision and rounded to cents only for display.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{CreateInvoiceRequest, InvoiceItemInput, InvoiceService};
//!
//! let service = InvoiceService::new(store, notifier);
//!
//! let request = CreateInvoiceRequest::new(project_id, "Gros oeuvre", due_date)
//!     .with_tax_percentage(dec!(18))
//!     .with_item(InvoiceItemInput::new("Maçonnerie", dec!(405.25), dec!(12000)));
//!
//! let view = service.create_invoice("staff-1", request).await?;
//! println!("{} due {}", view.invoice.invoice_number, view.totals.rounded().net_to_pay);
//! ```

pub mod adapters;
pub mod error;
pub mod events;
pub mod invoice;
pub mod numbering;
pub mod ports;
pub mod project;
pub mod service;
pub mod totals;
pub mod validation;

pub use adapters::InMemoryInvoiceStore;
pub use error::{BillingError, StoreError};
pub use events::InvoiceCreated;
pub use invoice::{
    ClientSnapshot, Invoice, InvoiceItem, InvoiceStatus, InvoiceType, NewInvoice, PaymentMode,
};
pub use numbering::{InvoiceNumber, InvoicePrefix, NumberingError, DEFAULT_INVOICE_PREFIX};
pub use ports::{
    Clock, FixedClock, InvoiceFilter, InvoiceNotifier, InvoiceOrdering, InvoiceSortField,
    InvoiceStore, NoopNotifier, NotificationError, OrderingParseError, SystemClock,
};
pub use project::{ClientProfile, Project, ProjectContext};
pub use service::{
    CreateInvoiceRequest, InvoiceItemInput, InvoiceService, InvoiceView, UpdateInvoiceRequest,
};
pub use totals::InvoiceTotals;
