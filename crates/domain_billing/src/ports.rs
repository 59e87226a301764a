//! Billing Domain Ports
//!
//! The billing service depends on three collaborators, each behind a trait so
//! adapters can be swapped:
//!
//! - **InvoiceStore**: persistence, implemented for PostgreSQL in `infra_db`
//!   and in memory in [`crate::adapters`]
//! - **InvoiceNotifier**: receives "invoice created" events
//! - **Clock**: source of the current time, fixed in tests
//!
//! ```rust,ignore
//! let service = InvoiceService::new(
//!     Arc::new(PostgresInvoiceStore::new(pool)),
//!     Arc::new(LogNotifier),
//! );
//! ```

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::str::FromStr;
use std::sync::Mutex;
use thiserror::Error;

use core_kernel::{ClientId, InvoiceId, ProjectId};

use crate::error::StoreError;
use crate::events::InvoiceCreated;
use crate::invoice::{Invoice, InvoiceStatus, NewInvoice};
use crate::numbering::InvoicePrefix;
use crate::project::ProjectContext;

/// Query parameters for listing invoices
///
/// Soft-deleted invoices are hidden unless `include_deleted` is set. Stores
/// apply exactly the filter they are given and never hide rows on their own.
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub project_id: Option<ProjectId>,
    pub client_id: Option<ClientId>,
    /// Matches the stored status
    pub status: Option<InvoiceStatus>,
    pub include_deleted: bool,
    /// Case-insensitive term matched against the invoice number prefix, the
    /// snapshot client name and the project name
    pub search: Option<String>,
    /// Applied by the service once totals are known
    pub ordering: InvoiceOrdering,
}

impl InvoiceFilter {
    /// Creates a filter for one project
    pub fn by_project(project_id: ProjectId) -> Self {
        Self {
            project_id: Some(project_id),
            ..Default::default()
        }
    }

    /// Search term with surrounding blanks removed, if any remains
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Returns true if `invoice` passes every criterion
    ///
    /// `project_name` is the name of the invoice's project when the caller
    /// knows it; the search term is then matched against it too.
    pub fn matches(&self, invoice: &Invoice, project_name: Option<&str>) -> bool {
        (self.include_deleted || !invoice.is_deleted)
            && self.project_id.map_or(true, |id| invoice.project_id == id)
            && self.client_id.map_or(true, |id| invoice.client_id == id)
            && self.status.map_or(true, |s| invoice.status == s)
            && self.search_term().map_or(true, |term| search_matches(term, invoice, project_name))
    }
}

fn search_matches(term: &str, invoice: &Invoice, project_name: Option<&str>) -> bool {
    let term = term.to_lowercase();
    invoice.invoice_number.to_string().to_lowercase().starts_with(&term)
        || invoice.client.name.to_lowercase().contains(&term)
        || project_name.is_some_and(|name| name.to_lowercase().contains(&term))
}

/// Column an invoice listing is sorted on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvoiceSortField {
    #[default]
    IssueDate,
    DueDate,
    TotalTtc,
    CreatedAt,
}

/// Listing order, `-issue_date` unless asked otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceOrdering {
    pub field: InvoiceSortField,
    pub descending: bool,
}

impl Default for InvoiceOrdering {
    fn default() -> Self {
        Self {
            field: InvoiceSortField::IssueDate,
            descending: true,
        }
    }
}

impl InvoiceOrdering {
    /// Sorts `invoices` in place; ties go newest-created first
    pub fn sort(&self, invoices: &mut [Invoice]) {
        invoices.sort_by(|a, b| {
            let ordering = match self.field {
                InvoiceSortField::IssueDate => a.issue_date.cmp(&b.issue_date),
                InvoiceSortField::DueDate => a.due_date.cmp(&b.due_date),
                InvoiceSortField::TotalTtc => a.totals().total_ttc.cmp(&b.totals().total_ttc),
                InvoiceSortField::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            let ordering = if self.descending { ordering.reverse() } else { ordering };
            ordering.then_with(|| b.created_at.cmp(&a.created_at))
        });
    }
}

/// Unknown ordering key
#[derive(Debug, Error)]
#[error("Unknown ordering '{0}'; expected issue_date, due_date, total_ttc or created_at, optionally prefixed with '-'")]
pub struct OrderingParseError(String);

impl FromStr for InvoiceOrdering {
    type Err = OrderingParseError;

    /// Parses `field` (ascending) or `-field` (descending)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (descending, key) = match s.strip_prefix('-') {
            Some(key) => (true, key),
            None => (false, s),
        };
        let field = match key {
            "issue_date" => InvoiceSortField::IssueDate,
            "due_date" => InvoiceSortField::DueDate,
            "total_ttc" => InvoiceSortField::TotalTtc,
            "created_at" => InvoiceSortField::CreatedAt,
            _ => return Err(OrderingParseError(s.to_string())),
        };
        Ok(Self { field, descending })
    }
}

/// Persistence port for invoices
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Loads a project with its client's live profile
    async fn project_context(&self, project_id: ProjectId) -> Result<Option<ProjectContext>, StoreError>;

    /// Allocates the next sequence of `prefix`/`year` and persists the invoice
    ///
    /// Allocation and insertion form one atomic unit: two concurrent calls
    /// for the same year never receive the same sequence, and a failure
    /// leaves neither the invoice, its items nor a consumed sequence behind.
    async fn insert_numbered(
        &self,
        prefix: &InvoicePrefix,
        year: i32,
        invoice: NewInvoice,
    ) -> Result<Invoice, StoreError>;

    /// Fetches an invoice, soft-deleted or not
    async fn get(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError>;

    /// Lists invoices matching `filter`, newest issue date first
    async fn list(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, StoreError>;

    /// Saves header fields, soft-delete state and the full item list
    ///
    /// The write only succeeds while the stored version still equals
    /// `invoice.version`; otherwise nothing is written and `Conflict` is
    /// returned. Returns the new version. The invoice number and the client
    /// snapshot are never rewritten.
    async fn update(&self, invoice: &Invoice) -> Result<i64, StoreError>;

    /// Physically removes an invoice and its items; returns false if absent
    async fn hard_delete(&self, id: InvoiceId) -> Result<bool, StoreError>;

    /// Verifies the store is reachable
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Notification delivery failures
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Receives invoice events once they are committed
#[async_trait]
pub trait InvoiceNotifier: Send + Sync {
    async fn invoice_created(&self, event: &InvoiceCreated) -> Result<(), NotificationError>;
}

/// Notifier that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl InvoiceNotifier for NoopNotifier {
    async fn invoice_created(&self, _event: &InvoiceCreated) -> Result<(), NotificationError> {
        Ok(())
    }
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Moves the clock to `now`
    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
