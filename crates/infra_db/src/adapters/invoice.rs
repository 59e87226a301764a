//! PostgreSQL Invoice Store
//!
//! This module provides the database adapter for the billing domain,
//! implementing the `InvoiceStore` port on top of the `InvoiceRepository`
//! and `ProjectRepository`.
//!
//! # Numbering
//!
//! Each `(prefix, year)` pair owns one row in `invoice_sequences`. Creating
//! an invoice runs, in one transaction:
//!
//! 1. seed the counter row from existing invoice numbers if it is missing
//!    (`INSERT … ON CONFLICT DO NOTHING`)
//! 2. `UPDATE … SET last_value = last_value + 1 RETURNING last_value`, which
//!    row-locks the counter until commit
//! 3. if that number is already stored, move the counter past the highest
//!    stored number of the year
//! 4. insert the invoice and its items
//!
//! A failure at any step rolls everything back, the counter included.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresInvoiceStore;
//! use domain_billing::{InvoiceService, InvoiceStore};
//! use std::sync::Arc;
//!
//! let store: Arc<dyn InvoiceStore> = Arc::new(PostgresInvoiceStore::new(pool));
//! let service = InvoiceService::new(store, notifier);
//! ```

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use core_kernel::{ClientId, InvoiceId, InvoiceItemId, Money, ProjectId};
use domain_billing::numbering::highest_sequence;
use domain_billing::{
    ClientProfile, ClientSnapshot, Invoice, InvoiceFilter, InvoiceItem, InvoiceNumber,
    InvoicePrefix, InvoiceStatus, InvoiceStore, InvoiceType, NewInvoice, PaymentMode, Project,
    ProjectContext, StoreError,
};

use crate::error::DatabaseError;
use crate::repositories::invoice::{
    InvoiceItemRow, InvoiceQuery, InvoiceRepository, InvoiceRow,
    InvoiceStatus as DbInvoiceStatus, InvoiceType as DbInvoiceType,
    PaymentMode as DbPaymentMode,
};
use crate::repositories::project::{ClientRow, ProjectRepository, ProjectRow, ProjectWithClientRow};

/// PostgreSQL-backed implementation of the InvoiceStore port
#[derive(Debug, Clone)]
pub struct PostgresInvoiceStore {
    invoices: InvoiceRepository,
    projects: ProjectRepository,
    pool: PgPool,
}

impl PostgresInvoiceStore {
    /// Creates a new store over the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            invoices: InvoiceRepository::new(pool.clone()),
            projects: ProjectRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns the underlying invoice repository
    pub fn repository(&self) -> &InvoiceRepository {
        &self.invoices
    }

    /// Inserts or replaces a client profile
    pub async fn register_client(&self, client: &ClientProfile) -> Result<(), StoreError> {
        let row = ClientRow {
            client_id: *client.id.as_uuid(),
            full_name: client.full_name.clone(),
            address: client.address.clone(),
            phone: client.phone.clone(),
        };
        self.projects.upsert_client(&row).await?;
        Ok(())
    }

    /// Inserts a project for an already registered client
    pub async fn register_project(&self, project: &Project) -> Result<(), StoreError> {
        let row = ProjectRow {
            project_id: *project.id.as_uuid(),
            client_id: *project.client_id.as_uuid(),
            name: project.name.clone(),
        };
        self.projects.insert_project(&row).await?;
        Ok(())
    }

    /// Changes a client's live address; existing snapshots are unaffected
    pub async fn update_client_address(&self, client_id: ClientId, address: &str) -> Result<(), StoreError> {
        self.projects.update_client_address(*client_id.as_uuid(), address).await?;
        Ok(())
    }

    /// Returns the next sequence for `prefix`/`year`, seeding the counter first if needed
    async fn allocate_sequence(
        &self,
        conn: &mut PgConnection,
        prefix: &InvoicePrefix,
        year: i32,
    ) -> Result<u64, DatabaseError> {
        if self.invoices.find_sequence(conn, prefix.as_str(), year).await?.is_none() {
            let numbers = self.invoices.numbers_in_scope(conn, &prefix.scope(year)).await?;
            let seed = highest_sequence(prefix, year, numbers.iter().map(String::as_str));
            let seed = i64::try_from(seed)
                .map_err(|_| DatabaseError::CorruptRow(format!("sequence {seed} out of range")))?;

            self.invoices.seed_sequence(conn, prefix.as_str(), year, seed).await?;
            info!(prefix = %prefix, year, seed, "Seeded invoice sequence");
        }

        let mut next = self.invoices.increment_sequence(conn, prefix.as_str(), year).await?;

        // Numbers stored outside the counter: skip past them under the row lock
        let candidate = format!("{}{next}", prefix.scope(year));
        if self.invoices.number_exists(conn, &candidate).await? {
            let numbers = self.invoices.numbers_in_scope(conn, &prefix.scope(year)).await?;
            let highest = highest_sequence(prefix, year, numbers.iter().map(String::as_str));
            let floor = i64::try_from(highest)
                .map_err(|_| DatabaseError::CorruptRow(format!("sequence {highest} out of range")))?;

            next = self.invoices.advance_sequence(conn, prefix.as_str(), year, floor).await?;
            warn!(
                prefix = %prefix,
                year,
                clashed = %candidate,
                highest_stored = highest,
                next,
                "Invoice counter behind stored numbers, advanced past them"
            );
        }

        u64::try_from(next).map_err(|_| DatabaseError::CorruptRow(format!("negative sequence {next}")))
    }

    async fn load_items(&self, invoice_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<InvoiceItemRow>>, DatabaseError> {
        let mut by_invoice: HashMap<Uuid, Vec<InvoiceItemRow>> = HashMap::new();
        for item in self.invoices.find_items(invoice_ids).await? {
            by_invoice.entry(item.invoice_id).or_default().push(item);
        }
        Ok(by_invoice)
    }
}

#[async_trait]
impl InvoiceStore for PostgresInvoiceStore {
    #[instrument(skip(self), fields(project_id = %project_id))]
    async fn project_context(&self, project_id: ProjectId) -> Result<Option<ProjectContext>, StoreError> {
        let row = self.projects.find_with_client(*project_id.as_uuid()).await?;
        Ok(row.map(row_to_project_context))
    }

    #[instrument(skip(self, invoice), fields(prefix = %prefix, year = year))]
    async fn insert_numbered(
        &self,
        prefix: &InvoicePrefix,
        year: i32,
        invoice: NewInvoice,
    ) -> Result<Invoice, StoreError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        let sequence = self.allocate_sequence(&mut tx, prefix, year).await?;
        let number = InvoiceNumber::new(prefix.clone(), year, sequence)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let invoice = invoice.into_invoice(number);

        self.invoices.insert(&mut tx, &invoice_to_row(&invoice)).await?;
        self.invoices.insert_items(&mut tx, &items_to_rows(&invoice)).await?;

        tx.commit().await.map_err(DatabaseError::from)?;

        debug!(invoice_number = %invoice.invoice_number, "Invoice persisted");
        Ok(invoice)
    }

    #[instrument(skip(self), fields(invoice_id = %id))]
    async fn get(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        let Some(row) = self.invoices.find_by_id(*id.as_uuid()).await? else {
            return Ok(None);
        };
        let items = self.invoices.find_items(&[row.invoice_id]).await?;
        Ok(Some(row_to_invoice(row, items)?))
    }

    #[instrument(skip(self))]
    async fn list(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, StoreError> {
        let query = InvoiceQuery {
            project_id: filter.project_id.map(|id| *id.as_uuid()),
            client_id: filter.client_id.map(|id| *id.as_uuid()),
            status: filter.status.map(domain_to_db_status),
            include_deleted: filter.include_deleted,
            search: filter.search_term().map(str::to_string),
        };
        let rows = self.invoices.list(&query).await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.invoice_id).collect();
        let mut items = self.load_items(&ids).await?;

        let mut invoices = Vec::with_capacity(rows.len());
        for row in rows {
            let row_items = items.remove(&row.invoice_id).unwrap_or_default();
            let invoice_number = row.invoice_number.clone();
            match row_to_invoice(row, row_items) {
                Ok(invoice) => invoices.push(invoice),
                Err(e) => warn!(invoice_number = %invoice_number, error = %e, "Skipping unreadable invoice"),
            }
        }
        Ok(invoices)
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id))]
    async fn update(&self, invoice: &Invoice) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from)?;

        let version = self.invoices.update(&mut tx, &invoice_to_row(invoice)).await?;
        self.invoices.delete_items(&mut tx, *invoice.id.as_uuid()).await?;
        self.invoices.insert_items(&mut tx, &items_to_rows(invoice)).await?;

        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(version)
    }

    #[instrument(skip(self), fields(invoice_id = %id))]
    async fn hard_delete(&self, id: InvoiceId) -> Result<bool, StoreError> {
        Ok(self.invoices.delete(*id.as_uuid()).await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.invoices.ping().await?;
        Ok(())
    }
}

// =============================================================================
// Conversion Functions
// =============================================================================

fn row_to_project_context(row: ProjectWithClientRow) -> ProjectContext {
    let client_id = ClientId::from(row.client_id);
    ProjectContext {
        project: Project {
            id: ProjectId::from(row.project_id),
            name: row.project_name,
            client_id,
        },
        client: ClientProfile {
            id: client_id,
            full_name: row.full_name,
            address: row.address,
            phone: row.phone,
        },
    }
}

fn row_to_invoice(row: InvoiceRow, items: Vec<InvoiceItemRow>) -> Result<Invoice, DatabaseError> {
    let invoice_number: InvoiceNumber = row
        .invoice_number
        .parse()
        .map_err(|e: domain_billing::NumberingError| DatabaseError::CorruptRow(e.to_string()))?;

    Ok(Invoice {
        id: InvoiceId::from(row.invoice_id),
        invoice_number,
        project_id: ProjectId::from(row.project_id),
        client_id: ClientId::from(row.client_id),
        invoice_type: db_to_domain_type(row.invoice_type),
        subject: row.subject,
        status: db_to_domain_status(row.status),
        issue_date: row.issue_date,
        due_date: row.due_date,
        tax_percentage: row.tax_percentage,
        advance_payment: Money::new(row.advance_payment),
        payment_mode: db_to_domain_payment_mode(row.payment_mode),
        client: ClientSnapshot {
            name: row.client_name,
            address: row.client_address,
            phone: row.client_phone,
        },
        notes: row.notes,
        items: items.into_iter().map(row_to_item).collect(),
        is_deleted: row.is_deleted,
        deleted_at: row.deleted_at,
        deleted_by: row.deleted_by,
        created_by: row.created_by,
        updated_by: row.updated_by,
        created_at: row.created_at,
        updated_at: row.updated_at,
        version: row.version,
    })
}

fn row_to_item(row: InvoiceItemRow) -> InvoiceItem {
    InvoiceItem {
        id: InvoiceItemId::from(row.item_id),
        description: row.description,
        quantity: row.quantity,
        unit_price: Money::new(row.unit_price),
        display_order: row.display_order,
    }
}

fn invoice_to_row(invoice: &Invoice) -> InvoiceRow {
    InvoiceRow {
        invoice_id: *invoice.id.as_uuid(),
        invoice_number: invoice.invoice_number.to_string(),
        project_id: *invoice.project_id.as_uuid(),
        client_id: *invoice.client_id.as_uuid(),
        invoice_type: domain_to_db_type(invoice.invoice_type),
        subject: invoice.subject.clone(),
        status: domain_to_db_status(invoice.status),
        issue_date: invoice.issue_date,
        due_date: invoice.due_date,
        tax_percentage: invoice.tax_percentage,
        advance_payment: invoice.advance_payment.amount(),
        payment_mode: domain_to_db_payment_mode(invoice.payment_mode),
        client_name: invoice.client.name.clone(),
        client_address: invoice.client.address.clone(),
        client_phone: invoice.client.phone.clone(),
        notes: invoice.notes.clone(),
        is_deleted: invoice.is_deleted,
        deleted_at: invoice.deleted_at,
        deleted_by: invoice.deleted_by.clone(),
        created_by: invoice.created_by.clone(),
        updated_by: invoice.updated_by.clone(),
        created_at: invoice.created_at,
        updated_at: invoice.updated_at,
        version: invoice.version,
    }
}

fn items_to_rows(invoice: &Invoice) -> Vec<InvoiceItemRow> {
    invoice
        .items
        .iter()
        .zip(0i32..)
        .map(|(item, position)| InvoiceItemRow {
            item_id: *item.id.as_uuid(),
            invoice_id: *invoice.id.as_uuid(),
            position,
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price.amount(),
            display_order: item.display_order,
        })
        .collect()
}

fn domain_to_db_status(status: InvoiceStatus) -> DbInvoiceStatus {
    match status {
        InvoiceStatus::Draft => DbInvoiceStatus::Draft,
        InvoiceStatus::Sent => DbInvoiceStatus::Sent,
        InvoiceStatus::Paid => DbInvoiceStatus::Paid,
        InvoiceStatus::Overdue => DbInvoiceStatus::Overdue,
        InvoiceStatus::Cancelled => DbInvoiceStatus::Cancelled,
    }
}

fn db_to_domain_status(status: DbInvoiceStatus) -> InvoiceStatus {
    match status {
        DbInvoiceStatus::Draft => InvoiceStatus::Draft,
        DbInvoiceStatus::Sent => InvoiceStatus::Sent,
        DbInvoiceStatus::Paid => InvoiceStatus::Paid,
        DbInvoiceStatus::Overdue => InvoiceStatus::Overdue,
        DbInvoiceStatus::Cancelled => InvoiceStatus::Cancelled,
    }
}

fn domain_to_db_type(invoice_type: InvoiceType) -> DbInvoiceType {
    match invoice_type {
        InvoiceType::Proforma => DbInvoiceType::Proforma,
        InvoiceType::Quote => DbInvoiceType::Quote,
        InvoiceType::Invoice => DbInvoiceType::Invoice,
    }
}

fn db_to_domain_type(invoice_type: DbInvoiceType) -> InvoiceType {
    match invoice_type {
        DbInvoiceType::Proforma => InvoiceType::Proforma,
        DbInvoiceType::Quote => InvoiceType::Quote,
        DbInvoiceType::Invoice => InvoiceType::Invoice,
    }
}

fn domain_to_db_payment_mode(mode: PaymentMode) -> DbPaymentMode {
    match mode {
        PaymentMode::Cash => DbPaymentMode::Cash,
        PaymentMode::Transfer => DbPaymentMode::Transfer,
        PaymentMode::Check => DbPaymentMode::Check,
    }
}

fn db_to_domain_payment_mode(mode: DbPaymentMode) -> PaymentMode {
    match mode {
        DbPaymentMode::Cash => PaymentMode::Cash,
        DbPaymentMode::Transfer => PaymentMode::Transfer,
        DbPaymentMode::Check => PaymentMode::Check,
    }
}
