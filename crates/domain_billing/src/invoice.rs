//! Invoice management
//!
//! An invoice belongs to exactly one client project. It carries a
//! human-readable number assigned at creation, a snapshot of the client's
//! contact details taken at the same moment, and an ordered list of items.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{ClientId, InvoiceId, InvoiceItemId, Money, ProjectId};

use crate::error::BillingError;
use crate::numbering::InvoiceNumber;
use crate::project::ClientProfile;
use crate::totals::InvoiceTotals;

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// Invoice is being drafted
    Draft,
    /// Invoice has been sent to the client
    Sent,
    /// Fully paid
    Paid,
    /// Past due date
    Overdue,
    /// Cancelled/voided
    Cancelled,
}

impl InvoiceStatus {
    /// Returns true if a staff member may move an invoice from `self` to `next`
    ///
    /// Paid and Cancelled are terminal. Staying in the same status is always
    /// allowed.
    pub fn can_transition_to(self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;

        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Draft, Sent | Paid | Overdue | Cancelled)
                | (Sent, Draft | Paid | Overdue | Cancelled)
                | (Overdue, Sent | Paid | Cancelled)
        )
    }

    /// Items may only be edited while the invoice is a draft or has just been sent
    pub fn allows_item_edits(self) -> bool {
        matches!(self, InvoiceStatus::Draft | InvoiceStatus::Sent)
    }

    /// Statuses that still expect a payment
    pub fn is_open(self) -> bool {
        matches!(
            self,
            InvoiceStatus::Draft | InvoiceStatus::Sent | InvoiceStatus::Overdue
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Overdue => "OVERDUE",
            InvoiceStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of document the invoice represents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceType {
    #[default]
    Proforma,
    Quote,
    Invoice,
}

/// How the client settles the invoice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMode {
    #[default]
    Cash,
    Transfer,
    Check,
}

/// Client contact details frozen at invoice creation
///
/// Later edits to the client's profile never reach an existing snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSnapshot {
    pub name: String,
    pub address: String,
    pub phone: String,
}

impl From<&ClientProfile> for ClientSnapshot {
    fn from(client: &ClientProfile) -> Self {
        Self {
            name: client.full_name.clone(),
            address: client.address.clone(),
            phone: client.phone.clone(),
        }
    }
}

/// A line item on an invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    /// Item ID
    pub id: InvoiceItemId,
    /// Description of the work
    pub description: String,
    /// Quantity (strictly positive)
    pub quantity: Decimal,
    /// Unit price (non-negative)
    pub unit_price: Money,
    /// Rendering position
    pub display_order: i32,
}

impl InvoiceItem {
    pub fn new(
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Money,
        display_order: i32,
    ) -> Self {
        Self {
            id: InvoiceItemId::new_v7(),
            description: description.into(),
            quantity,
            unit_price,
            display_order,
        }
    }

    /// Calculates the total for this item
    pub fn total_price(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// Everything needed to persist an invoice except its number
///
/// The store turns a `NewInvoice` into an [`Invoice`] while allocating the
/// next sequence number of the creation year in the same atomic unit.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub id: InvoiceId,
    pub project_id: ProjectId,
    pub client_id: ClientId,
    pub invoice_type: InvoiceType,
    pub subject: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub tax_percentage: Decimal,
    pub advance_payment: Money,
    pub payment_mode: PaymentMode,
    pub client: ClientSnapshot,
    pub notes: String,
    pub items: Vec<InvoiceItem>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewInvoice {
    /// Attaches the allocated number, producing a Draft invoice
    pub fn into_invoice(self, invoice_number: InvoiceNumber) -> Invoice {
        Invoice {
            id: self.id,
            invoice_number,
            project_id: self.project_id,
            client_id: self.client_id,
            invoice_type: self.invoice_type,
            subject: self.subject,
            status: InvoiceStatus::Draft,
            issue_date: self.issue_date,
            due_date: self.due_date,
            tax_percentage: self.tax_percentage,
            advance_payment: self.advance_payment,
            payment_mode: self.payment_mode,
            client: self.client,
            notes: self.notes,
            items: self.items,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
            created_by: self.created_by.clone(),
            updated_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.created_at,
            version: 1,
        }
    }
}

/// An invoice for a client project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    /// Human-readable number, immutable once assigned
    pub invoice_number: InvoiceNumber,
    pub project_id: ProjectId,
    pub client_id: ClientId,
    pub invoice_type: InvoiceType,
    pub subject: String,
    /// Stored status; see [`Invoice::effective_status`] for what readers see
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub tax_percentage: Decimal,
    pub advance_payment: Money,
    pub payment_mode: PaymentMode,
    pub client: ClientSnapshot,
    pub notes: String,
    pub items: Vec<InvoiceItem>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by the store on every successful update; a write carrying an
    /// older version is refused
    pub version: i64,
}

impl Invoice {
    /// Computes subtotal, tax, total and net-to-pay from the current items
    pub fn totals(&self) -> InvoiceTotals {
        InvoiceTotals::calculate(self.tax_percentage, self.advance_payment, &self.items)
    }

    /// Checks if the invoice is past its due date and still unpaid
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        today > self.due_date && self.status.is_open()
    }

    /// Status as seen by readers on `today`
    ///
    /// An open invoice whose due date has passed reads as Overdue without
    /// any background job rewriting the stored status.
    pub fn effective_status(&self, today: NaiveDate) -> InvoiceStatus {
        if self.is_overdue(today) {
            InvoiceStatus::Overdue
        } else {
            self.status
        }
    }

    /// Items sorted for rendering
    pub fn ordered_items(&self) -> Vec<&InvoiceItem> {
        let mut items: Vec<&InvoiceItem> = self.items.iter().collect();
        // Stable sort keeps insertion order among equal display orders
        items.sort_by_key(|item| item.display_order);
        items
    }

    /// Moves the invoice to `next` on behalf of a staff member
    pub fn transition_to(
        &mut self,
        next: InvoiceStatus,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<(), BillingError> {
        if !self.status.can_transition_to(next) {
            return Err(BillingError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch(actor, now);
        Ok(())
    }

    /// Replaces every item, allowed only while Draft or Sent
    pub fn replace_items(
        &mut self,
        items: Vec<InvoiceItem>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<(), BillingError> {
        if !self.status.allows_item_edits() {
            return Err(BillingError::ItemsLocked(self.status));
        }
        self.items = items;
        self.touch(actor, now);
        Ok(())
    }

    /// Hides the invoice from default queries without removing it
    pub fn soft_delete(&mut self, actor: &str, now: DateTime<Utc>) {
        self.is_deleted = true;
        self.deleted_at = Some(now);
        self.deleted_by = Some(actor.to_string());
        self.updated_at = now;
    }

    /// Brings a soft-deleted invoice back
    pub fn restore(&mut self, actor: &str, now: DateTime<Utc>) {
        self.is_deleted = false;
        self.deleted_at = None;
        self.deleted_by = None;
        self.touch(actor, now);
    }

    pub(crate) fn touch(&mut self, actor: &str, now: DateTime<Utc>) {
        self.updated_by = Some(actor.to_string());
        self.updated_at = now;
    }
}
