//! Invoice repository implementation
//!
//! This module provides database access for invoices, their items and the
//! per-year sequence counters. Write methods take a connection so callers can
//! compose them inside one transaction; reads go straight to the pool.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::DatabaseError;

const INVOICE_COLUMNS: &str = r#"
    invoice_id, invoice_number, project_id, client_id, invoice_type, subject,
    status, issue_date, due_date, tax_percentage, advance_payment, payment_mode,
    client_name, client_address, client_phone, notes, is_deleted, deleted_at,
    deleted_by, created_by, updated_by, created_at, updated_at, version
"#;

/// Repository for invoices and invoice sequence counters
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: PgPool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // -------------------------------------------------------------------------
    // Sequence counters
    // -------------------------------------------------------------------------

    /// Reads the last sequence handed out for `prefix`/`year`, if the counter exists
    pub async fn find_sequence(
        &self,
        conn: &mut PgConnection,
        prefix: &str,
        year: i32,
    ) -> Result<Option<i64>, DatabaseError> {
        let last = sqlx::query_scalar::<_, i64>(
            "SELECT last_value FROM invoice_sequences WHERE prefix = $1 AND year = $2",
        )
        .bind(prefix)
        .bind(year)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(last)
    }

    /// Returns every invoice number starting with `scope`, soft-deleted rows included
    pub async fn numbers_in_scope(
        &self,
        conn: &mut PgConnection,
        scope: &str,
    ) -> Result<Vec<String>, DatabaseError> {
        let numbers = sqlx::query_scalar::<_, String>(
            "SELECT invoice_number FROM invoices WHERE invoice_number LIKE $1 || '%'",
        )
        .bind(scope)
        .fetch_all(&mut *conn)
        .await?;

        Ok(numbers)
    }

    /// Creates the counter row at `last_value` unless a concurrent writer already did
    pub async fn seed_sequence(
        &self,
        conn: &mut PgConnection,
        prefix: &str,
        year: i32,
        last_value: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO invoice_sequences (prefix, year, last_value)
            VALUES ($1, $2, $3)
            ON CONFLICT (prefix, year) DO NOTHING
            "#,
        )
        .bind(prefix)
        .bind(year)
        .bind(last_value)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Moves the counter to at least `floor` and then one past it
    ///
    /// Used when the plain increment landed on a number that is already
    /// stored. Must run after [`Self::increment_sequence`] in the same
    /// transaction so the row lock is already held.
    pub async fn advance_sequence(
        &self,
        conn: &mut PgConnection,
        prefix: &str,
        year: i32,
        floor: i64,
    ) -> Result<i64, DatabaseError> {
        let next = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE invoice_sequences
            SET last_value = GREATEST(last_value, $3) + 1, updated_at = now()
            WHERE prefix = $1 AND year = $2
            RETURNING last_value
            "#,
        )
        .bind(prefix)
        .bind(year)
        .bind(floor)
        .fetch_optional(&mut *conn)
        .await?;

        next.ok_or_else(|| DatabaseError::not_found("Invoice sequence", format!("{prefix}/{year}")))
    }

    /// Returns true if an invoice, soft-deleted or not, already carries `number`
    pub async fn number_exists(&self, conn: &mut PgConnection, number: &str) -> Result<bool, DatabaseError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM invoices WHERE invoice_number = $1)",
        )
        .bind(number)
        .fetch_one(&mut *conn)
        .await?;

        Ok(exists)
    }

    /// Increments the counter and returns the new value
    ///
    /// The UPDATE takes a row lock held until the surrounding transaction
    /// ends, which serializes concurrent creators of the same year.
    pub async fn increment_sequence(
        &self,
        conn: &mut PgConnection,
        prefix: &str,
        year: i32,
    ) -> Result<i64, DatabaseError> {
        let next = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE invoice_sequences
            SET last_value = last_value + 1, updated_at = now()
            WHERE prefix = $1 AND year = $2
            RETURNING last_value
            "#,
        )
        .bind(prefix)
        .bind(year)
        .fetch_optional(&mut *conn)
        .await?;

        next.ok_or_else(|| DatabaseError::not_found("Invoice sequence", format!("{prefix}/{year}")))
    }

    // -------------------------------------------------------------------------
    // Invoices
    // -------------------------------------------------------------------------

    /// Inserts an invoice header
    pub async fn insert(&self, conn: &mut PgConnection, row: &InvoiceRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO invoices (
                invoice_id, invoice_number, project_id, client_id, invoice_type, subject,
                status, issue_date, due_date, tax_percentage, advance_payment, payment_mode,
                client_name, client_address, client_phone, notes, is_deleted, deleted_at,
                deleted_by, created_by, updated_by, created_at, updated_at, version
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24
            )
            "#,
        )
        .bind(row.invoice_id)
        .bind(&row.invoice_number)
        .bind(row.project_id)
        .bind(row.client_id)
        .bind(row.invoice_type)
        .bind(&row.subject)
        .bind(row.status)
        .bind(row.issue_date)
        .bind(row.due_date)
        .bind(row.tax_percentage)
        .bind(row.advance_payment)
        .bind(row.payment_mode)
        .bind(&row.client_name)
        .bind(&row.client_address)
        .bind(&row.client_phone)
        .bind(&row.notes)
        .bind(row.is_deleted)
        .bind(row.deleted_at)
        .bind(&row.deleted_by)
        .bind(&row.created_by)
        .bind(&row.updated_by)
        .bind(row.created_at)
        .bind(row.updated_at)
        .bind(row.version)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Saves the mutable columns of an invoice header and returns its new version
    ///
    /// The row is only written while its stored version equals `row.version`.
    /// `invoice_number`, `project_id`, `client_id` and the client snapshot
    /// columns are never written after insertion.
    pub async fn update(&self, conn: &mut PgConnection, row: &InvoiceRow) -> Result<i64, DatabaseError> {
        let version = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE invoices SET
                invoice_type = $2,
                subject = $3,
                status = $4,
                issue_date = $5,
                due_date = $6,
                tax_percentage = $7,
                advance_payment = $8,
                payment_mode = $9,
                notes = $10,
                is_deleted = $11,
                deleted_at = $12,
                deleted_by = $13,
                updated_by = $14,
                updated_at = $15,
                version = version + 1
            WHERE invoice_id = $1 AND version = $16
            RETURNING version
            "#,
        )
        .bind(row.invoice_id)
        .bind(row.invoice_type)
        .bind(&row.subject)
        .bind(row.status)
        .bind(row.issue_date)
        .bind(row.due_date)
        .bind(row.tax_percentage)
        .bind(row.advance_payment)
        .bind(row.payment_mode)
        .bind(&row.notes)
        .bind(row.is_deleted)
        .bind(row.deleted_at)
        .bind(&row.deleted_by)
        .bind(&row.updated_by)
        .bind(row.updated_at)
        .bind(row.version)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(version) = version {
            return Ok(version);
        }

        let current = sqlx::query_scalar::<_, i64>("SELECT version FROM invoices WHERE invoice_id = $1")
            .bind(row.invoice_id)
            .fetch_optional(&mut *conn)
            .await?;
        match current {
            Some(current) => Err(DatabaseError::StaleWrite(format!(
                "invoice {} is at version {current}, write was based on {}",
                row.invoice_number, row.version
            ))),
            None => Err(DatabaseError::not_found("Invoice", row.invoice_id)),
        }
    }

    /// Inserts items of one invoice
    pub async fn insert_items(
        &self,
        conn: &mut PgConnection,
        items: &[InvoiceItemRow],
    ) -> Result<(), DatabaseError> {
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (
                    item_id, invoice_id, position, description, quantity, unit_price, display_order
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.item_id)
            .bind(item.invoice_id)
            .bind(item.position)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.display_order)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Deletes every item of an invoice
    pub async fn delete_items(&self, conn: &mut PgConnection, invoice_id: Uuid) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Finds an invoice by id, soft-deleted or not
    pub async fn find_by_id(&self, invoice_id: Uuid) -> Result<Option<InvoiceRow>, DatabaseError> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = $1"
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Lists invoices matching `query`, newest issue date first
    pub async fn list(&self, query: &InvoiceQuery) -> Result<Vec<InvoiceRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE ($1::uuid IS NULL OR project_id = $1)
              AND ($2::uuid IS NULL OR client_id = $2)
              AND ($3::invoice_status IS NULL OR status = $3)
              AND ($4 OR NOT is_deleted)
              AND (
                $5::text IS NULL
                OR invoice_number ILIKE $5 || '%'
                OR client_name ILIKE '%' || $5 || '%'
                OR EXISTS (
                    SELECT 1 FROM projects p
                    WHERE p.project_id = invoices.project_id
                      AND p.name ILIKE '%' || $5 || '%'
                )
              )
            ORDER BY issue_date DESC, created_at DESC, invoice_id DESC
            "#
        ))
        .bind(query.project_id)
        .bind(query.client_id)
        .bind(query.status)
        .bind(query.include_deleted)
        .bind(query.search.as_deref().map(escape_like))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Loads the items of several invoices, in insertion order
    pub async fn find_items(&self, invoice_ids: &[Uuid]) -> Result<Vec<InvoiceItemRow>, DatabaseError> {
        let items = sqlx::query_as::<_, InvoiceItemRow>(
            r#"
            SELECT item_id, invoice_id, position, description, quantity, unit_price, display_order
            FROM invoice_items
            WHERE invoice_id = ANY($1)
            ORDER BY invoice_id, position
            "#,
        )
        .bind(invoice_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Physically deletes an invoice; items follow by cascade
    pub async fn delete(&self, invoice_id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM invoices WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Runs a trivial query to check connectivity
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Row Types
// =============================================================================

/// Invoice status stored as the `invoice_status` enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

/// Document kind stored as the `invoice_type` enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "invoice_type", rename_all = "snake_case")]
pub enum InvoiceType {
    Proforma,
    Quote,
    Invoice,
}

/// Settlement mode stored as the `payment_mode` enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "payment_mode", rename_all = "snake_case")]
pub enum PaymentMode {
    Cash,
    Transfer,
    Check,
}

/// Database row of an invoice header
#[derive(Debug, Clone, FromRow)]
pub struct InvoiceRow {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub project_id: Uuid,
    pub client_id: Uuid,
    pub invoice_type: InvoiceType,
    pub subject: String,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub tax_percentage: Decimal,
    pub advance_payment: Decimal,
    pub payment_mode: PaymentMode,
    pub client_name: String,
    pub client_address: String,
    pub client_phone: String,
    pub notes: String,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

/// Database row of an invoice item
#[derive(Debug, Clone, FromRow)]
pub struct InvoiceItemRow {
    pub item_id: Uuid,
    pub invoice_id: Uuid,
    /// Insertion position, breaks ties between equal display orders
    pub position: i32,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub display_order: i32,
}

/// Filter for [`InvoiceRepository::list`]
#[derive(Debug, Clone, Default)]
pub struct InvoiceQuery {
    pub project_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub status: Option<InvoiceStatus>,
    pub include_deleted: bool,
    /// Matched literally: LIKE wildcards in the term are escaped
    pub search: Option<String>,
}

/// Escapes `%`, `_` and `\` so a search term matches only itself
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
