//! Billing service
//!
//! `InvoiceService` implements the billing operations on top of the
//! [`InvoiceStore`] port. It owns validation, snapshotting, status rules and
//! notification; the store owns atomic numbering and persistence.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use core_kernel::{ClientId, InvoiceId, Money, ProjectId, ValidationErrors};

use crate::error::BillingError;
use crate::events::InvoiceCreated;
use crate::invoice::{
    ClientSnapshot, Invoice, InvoiceItem, InvoiceStatus, InvoiceType, NewInvoice, PaymentMode,
};
use crate::numbering::InvoicePrefix;
use crate::ports::{Clock, InvoiceFilter, InvoiceNotifier, InvoiceStore, SystemClock};
use crate::totals::InvoiceTotals;
use crate::validation;

/// A line item as submitted by a caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceItemInput {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Defaults to the item's position in the submitted list
    pub display_order: Option<i32>,
}

impl InvoiceItemInput {
    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
            display_order: None,
        }
    }

    pub fn with_display_order(mut self, order: i32) -> Self {
        self.display_order = Some(order);
        self
    }
}

/// Request to create an invoice
#[derive(Debug, Clone)]
pub struct CreateInvoiceRequest {
    pub project_id: ProjectId,
    pub invoice_type: InvoiceType,
    pub subject: String,
    /// Defaults to the current date
    pub issue_date: Option<NaiveDate>,
    pub due_date: NaiveDate,
    pub tax_percentage: Decimal,
    pub advance_payment: Decimal,
    pub payment_mode: PaymentMode,
    pub notes: String,
    /// Snapshot override; when blank the project's client is copied
    pub client_name: Option<String>,
    pub client_address: Option<String>,
    pub client_phone: Option<String>,
    pub items: Vec<InvoiceItemInput>,
}

impl CreateInvoiceRequest {
    /// Creates a request with no tax, no advance and no items
    pub fn new(project_id: ProjectId, subject: impl Into<String>, due_date: NaiveDate) -> Self {
        Self {
            project_id,
            invoice_type: InvoiceType::default(),
            subject: subject.into(),
            issue_date: None,
            due_date,
            tax_percentage: Decimal::ZERO,
            advance_payment: Decimal::ZERO,
            payment_mode: PaymentMode::default(),
            notes: String::new(),
            client_name: None,
            client_address: None,
            client_phone: None,
            items: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: InvoiceItemInput) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_tax_percentage(mut self, tax: Decimal) -> Self {
        self.tax_percentage = tax;
        self
    }

    pub fn with_advance_payment(mut self, advance: Decimal) -> Self {
        self.advance_payment = advance;
        self
    }

    pub fn with_issue_date(mut self, issue_date: NaiveDate) -> Self {
        self.issue_date = Some(issue_date);
        self
    }

    fn snapshot_override(&self) -> Option<ClientSnapshot> {
        let name = self.client_name.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
        Some(ClientSnapshot {
            name: name.to_string(),
            address: self.client_address.clone().unwrap_or_default(),
            phone: self.client_phone.clone().unwrap_or_default(),
        })
    }
}

/// Partial update of an invoice; absent fields are left untouched
///
/// `items`, when present, replaces the whole item list.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoiceRequest {
    pub invoice_type: Option<InvoiceType>,
    pub subject: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub tax_percentage: Option<Decimal>,
    pub advance_payment: Option<Decimal>,
    pub payment_mode: Option<PaymentMode>,
    pub notes: Option<String>,
    pub items: Option<Vec<InvoiceItemInput>>,
}

/// An invoice together with what readers see of it today
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceView {
    pub invoice: Invoice,
    /// Full precision; round at display
    pub totals: InvoiceTotals,
    /// Stored status, or Overdue when an open invoice is past due
    pub status: InvoiceStatus,
}

impl InvoiceView {
    pub fn new(invoice: Invoice, today: NaiveDate) -> Self {
        Self {
            totals: invoice.totals(),
            status: invoice.effective_status(today),
            invoice,
        }
    }
}

/// Application service for the invoice ledger
pub struct InvoiceService {
    store: Arc<dyn InvoiceStore>,
    notifier: Arc<dyn InvoiceNotifier>,
    clock: Arc<dyn Clock>,
    prefix: InvoicePrefix,
    notifications_enabled: bool,
}

impl InvoiceService {
    /// Creates a service numbering with the default prefix on the wall clock
    pub fn new(store: Arc<dyn InvoiceStore>, notifier: Arc<dyn InvoiceNotifier>) -> Self {
        Self {
            store,
            notifier,
            clock: Arc::new(SystemClock),
            prefix: InvoicePrefix::default(),
            notifications_enabled: true,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_prefix(mut self, prefix: InvoicePrefix) -> Self {
        self.prefix = prefix;
        self
    }

    /// Enables or disables "invoice created" notifications
    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notifications_enabled = enabled;
        self
    }

    pub fn prefix(&self) -> &InvoicePrefix {
        &self.prefix
    }

    /// Creates and numbers a new Draft invoice
    ///
    /// The number is allocated by the store in the same atomic unit that
    /// persists the invoice, so a rejected or failed creation consumes no
    /// sequence. The client snapshot is copied from the project's client
    /// unless the request names one explicitly.
    ///
    /// # Errors
    ///
    /// - `Validation` if any field is invalid or the project does not exist
    /// - `Store` if persistence failed; nothing was written
    #[instrument(skip(self, request), fields(project_id = %request.project_id))]
    pub async fn create_invoice(
        &self,
        actor: &str,
        request: CreateInvoiceRequest,
    ) -> Result<InvoiceView, BillingError> {
        validation::validate_create(&request)?;

        let context = self
            .store
            .project_context(request.project_id)
            .await?
            .ok_or_else(|| ValidationErrors::single("project_id", "project does not exist"))?;

        let now = self.clock.now();
        let today = now.date_naive();
        let client = request
            .snapshot_override()
            .unwrap_or_else(|| ClientSnapshot::from(&context.client));

        let new_invoice = NewInvoice {
            id: InvoiceId::new_v7(),
            project_id: context.project.id,
            client_id: context.client.id,
            invoice_type: request.invoice_type,
            subject: request.subject.trim().to_string(),
            issue_date: request.issue_date.unwrap_or(today),
            due_date: request.due_date,
            tax_percentage: request.tax_percentage,
            advance_payment: Money::new(request.advance_payment),
            payment_mode: request.payment_mode,
            client,
            notes: request.notes,
            items: build_items(request.items),
            created_by: Some(actor.to_string()),
            created_at: now,
        };

        let invoice = self
            .store
            .insert_numbered(&self.prefix, now.year(), new_invoice)
            .await?;

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            "Invoice created"
        );

        self.notify_created(&invoice).await;

        Ok(InvoiceView::new(invoice, today))
    }

    /// Reads a non-deleted invoice with its computed fields
    #[instrument(skip(self))]
    pub async fn read_invoice(&self, id: InvoiceId) -> Result<InvoiceView, BillingError> {
        let invoice = self.load_live(id).await?;
        Ok(self.view(invoice))
    }

    /// Lists invoices matching `filter` in the filter's order
    #[instrument(skip(self))]
    pub async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<InvoiceView>, BillingError> {
        let today = self.clock.today();
        let mut invoices = self.store.list(filter).await?;
        filter.ordering.sort(&mut invoices);
        debug!(count = invoices.len(), "Listed invoices");
        Ok(invoices.into_iter().map(|i| InvoiceView::new(i, today)).collect())
    }

    /// Lists the live invoices of one of the client's own projects
    ///
    /// A project of another client is refused like another client's invoice.
    #[instrument(skip(self))]
    pub async fn list_own_invoices(
        &self,
        client_id: ClientId,
        project_id: ProjectId,
    ) -> Result<Vec<InvoiceView>, BillingError> {
        let context = self
            .store
            .project_context(project_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Project", project_id))?;
        if context.project.client_id != client_id {
            warn!(project_id = %project_id, client_id = %client_id, "Client attempted to list another client's project");
            return Err(BillingError::Forbidden(format!("project {project_id}")));
        }

        let filter = InvoiceFilter {
            project_id: Some(project_id),
            client_id: Some(client_id),
            ..Default::default()
        };
        self.list_invoices(&filter).await
    }

    /// Reads an invoice on behalf of a client
    ///
    /// Soft-deleted invoices are invisible to clients, and an invoice of
    /// another client is refused.
    #[instrument(skip(self))]
    pub async fn read_own_invoice(
        &self,
        client_id: ClientId,
        id: InvoiceId,
    ) -> Result<InvoiceView, BillingError> {
        let invoice = self.load_live(id).await?;
        if invoice.client_id != client_id {
            warn!(invoice_id = %id, client_id = %client_id, "Client attempted to read another client's invoice");
            return Err(BillingError::Forbidden(format!("invoice {id}")));
        }
        Ok(self.view(invoice))
    }

    /// Applies a partial update
    ///
    /// Items are checked against the status stored before the update, the
    /// status change is checked against the lifecycle, and the invoice
    /// number and client snapshot are never touched.
    #[instrument(skip(self, patch))]
    pub async fn update_invoice(
        &self,
        actor: &str,
        id: InvoiceId,
        patch: UpdateInvoiceRequest,
    ) -> Result<InvoiceView, BillingError> {
        validation::validate_update(&patch)?;

        let mut invoice = self.load_live(id).await?;
        let now = self.clock.now();

        if let Some(items) = patch.items {
            invoice.replace_items(build_items(items), actor, now)?;
        }
        if let Some(invoice_type) = patch.invoice_type {
            invoice.invoice_type = invoice_type;
        }
        if let Some(subject) = patch.subject {
            invoice.subject = subject.trim().to_string();
        }
        if let Some(issue_date) = patch.issue_date {
            invoice.issue_date = issue_date;
        }
        if let Some(due_date) = patch.due_date {
            invoice.due_date = due_date;
        }
        if let Some(tax) = patch.tax_percentage {
            invoice.tax_percentage = tax;
        }
        if let Some(advance) = patch.advance_payment {
            invoice.advance_payment = Money::new(advance);
        }
        if let Some(payment_mode) = patch.payment_mode {
            invoice.payment_mode = payment_mode;
        }
        if let Some(notes) = patch.notes {
            invoice.notes = notes;
        }
        if let Some(status) = patch.status {
            invoice.transition_to(status, actor, now)?;
        }

        validation::require_items_unless_draft(invoice.status, invoice.items.len())?;
        invoice.touch(actor, now);

        invoice.version = self.store.update(&invoice).await?;
        info!(invoice_number = %invoice.invoice_number, status = %invoice.status, "Invoice updated");

        Ok(self.view(invoice))
    }

    /// Marks an invoice as paid
    pub async fn mark_paid(&self, actor: &str, id: InvoiceId) -> Result<InvoiceView, BillingError> {
        self.transition(actor, id, InvoiceStatus::Paid).await
    }

    /// Cancels an invoice; its number stays consumed
    pub async fn cancel(&self, actor: &str, id: InvoiceId) -> Result<InvoiceView, BillingError> {
        self.transition(actor, id, InvoiceStatus::Cancelled).await
    }

    /// Hides an invoice from default queries
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, actor: &str, id: InvoiceId) -> Result<(), BillingError> {
        let mut invoice = self.load_live(id).await?;
        invoice.soft_delete(actor, self.clock.now());
        invoice.version = self.store.update(&invoice).await?;

        info!(invoice_number = %invoice.invoice_number, "Invoice soft-deleted");
        Ok(())
    }

    /// Brings back a soft-deleted invoice; restoring a live invoice is a no-op
    #[instrument(skip(self))]
    pub async fn restore(&self, actor: &str, id: InvoiceId) -> Result<InvoiceView, BillingError> {
        let mut invoice = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| BillingError::not_found("Invoice", id))?;

        if invoice.is_deleted {
            invoice.restore(actor, self.clock.now());
            invoice.version = self.store.update(&invoice).await?;
            info!(invoice_number = %invoice.invoice_number, "Invoice restored");
        }

        Ok(self.view(invoice))
    }

    /// Physically removes an invoice and its items
    ///
    /// Its number is never handed out again: the year's counter is left as is.
    #[instrument(skip(self))]
    pub async fn hard_delete(&self, id: InvoiceId) -> Result<(), BillingError> {
        if !self.store.hard_delete(id).await? {
            return Err(BillingError::not_found("Invoice", id));
        }
        info!(invoice_id = %id, "Invoice permanently deleted");
        Ok(())
    }

    /// Checks the store is reachable
    pub async fn ready(&self) -> Result<(), BillingError> {
        self.store.ping().await?;
        Ok(())
    }

    async fn transition(
        &self,
        actor: &str,
        id: InvoiceId,
        next: InvoiceStatus,
    ) -> Result<InvoiceView, BillingError> {
        let mut invoice = self.load_live(id).await?;
        let previous = invoice.status;

        invoice.transition_to(next, actor, self.clock.now())?;
        validation::require_items_unless_draft(invoice.status, invoice.items.len())?;
        invoice.version = self.store.update(&invoice).await?;

        info!(
            invoice_number = %invoice.invoice_number,
            from = %previous,
            to = %next,
            "Invoice status changed"
        );
        Ok(self.view(invoice))
    }

    async fn load_live(&self, id: InvoiceId) -> Result<Invoice, BillingError> {
        match self.store.get(id).await? {
            Some(invoice) if !invoice.is_deleted => Ok(invoice),
            _ => Err(BillingError::not_found("Invoice", id)),
        }
    }

    async fn notify_created(&self, invoice: &Invoice) {
        if !self.notifications_enabled {
            debug!(invoice_number = %invoice.invoice_number, "Notifications disabled");
            return;
        }

        let event = InvoiceCreated::from_invoice(invoice, self.clock.now());
        if let Err(e) = self.notifier.invoice_created(&event).await {
            warn!(
                invoice_number = %invoice.invoice_number,
                error = %e,
                "Failed to deliver invoice notification"
            );
        }
    }

    fn view(&self, invoice: Invoice) -> InvoiceView {
        InvoiceView::new(invoice, self.clock.today())
    }
}

fn build_items(inputs: Vec<InvoiceItemInput>) -> Vec<InvoiceItem> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(position, input)| {
            let order = input
                .display_order
                .unwrap_or_else(|| i32::try_from(position).unwrap_or(i32::MAX));
            InvoiceItem::new(input.description.trim(), input.quantity, Money::new(input.unit_price), order)
        })
        .collect()
}
