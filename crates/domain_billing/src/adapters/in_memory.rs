//! In-memory invoice store
//!
//! Keeps clients, projects, invoices and per-year counters in one map set
//! behind a single async mutex. Numbering holds the guard for the whole
//! "read last sequence, compute next, insert" section, so concurrent
//! creators in the same year are serialized exactly like the row lock of
//! the PostgreSQL adapter serializes them.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use core_kernel::{ClientId, InvoiceId, ProjectId};

use crate::error::StoreError;
use crate::invoice::{Invoice, NewInvoice};
use crate::numbering::{InvoiceNumber, InvoicePrefix};
use crate::ports::{InvoiceFilter, InvoiceStore};
use crate::project::{ClientProfile, Project, ProjectContext};

#[derive(Debug, Default)]
struct State {
    clients: HashMap<ClientId, ClientProfile>,
    projects: HashMap<ProjectId, Project>,
    invoices: HashMap<InvoiceId, Invoice>,
    /// Last sequence handed out per (prefix, year)
    sequences: HashMap<(String, i32), u64>,
}

/// Process-local [`InvoiceStore`] for tests and single-node development
#[derive(Debug, Default)]
pub struct InMemoryInvoiceStore {
    state: Mutex<State>,
}

impl InMemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a client profile
    pub async fn register_client(&self, client: ClientProfile) {
        self.state.lock().await.clients.insert(client.id, client);
    }

    /// Adds or replaces a project
    pub async fn register_project(&self, project: Project) {
        self.state.lock().await.projects.insert(project.id, project);
    }

    /// Changes a client's live address; existing snapshots are unaffected
    pub async fn update_client_address(
        &self,
        client_id: ClientId,
        address: impl Into<String>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let client = state
            .clients
            .get_mut(&client_id)
            .ok_or_else(|| StoreError::Backend(format!("unknown client {client_id}")))?;
        client.address = address.into();
        Ok(())
    }

    /// Inserts an invoice as-is, bypassing the counters
    ///
    /// Used to load invoices numbered outside the counters; the next
    /// allocation of their year moves past them.
    pub async fn import_invoice(&self, invoice: Invoice) {
        self.state.lock().await.invoices.insert(invoice.id, invoice);
    }

    /// Last sequence handed out for `prefix`/`year`, if the counter exists
    pub async fn last_sequence(&self, prefix: &InvoicePrefix, year: i32) -> Option<u64> {
        self.state
            .lock()
            .await
            .sequences
            .get(&(prefix.as_str().to_string(), year))
            .copied()
    }
}

#[async_trait]
impl InvoiceStore for InMemoryInvoiceStore {
    async fn project_context(&self, project_id: ProjectId) -> Result<Option<ProjectContext>, StoreError> {
        let state = self.state.lock().await;
        let Some(project) = state.projects.get(&project_id) else {
            return Ok(None);
        };
        let client = state.clients.get(&project.client_id).cloned().ok_or_else(|| {
            StoreError::Corrupt(format!("project {project_id} references a missing client"))
        })?;

        Ok(Some(ProjectContext {
            project: project.clone(),
            client,
        }))
    }

    async fn insert_numbered(
        &self,
        prefix: &InvoicePrefix,
        year: i32,
        invoice: NewInvoice,
    ) -> Result<Invoice, StoreError> {
        let mut state = self.state.lock().await;
        let State {
            invoices, sequences, ..
        } = &mut *state;

        let key = (prefix.as_str().to_string(), year);
        let stored = invoices
            .values()
            .map(|i| &i.invoice_number)
            .filter(|n| n.prefix() == prefix && n.year() == year)
            .map(InvoiceNumber::sequence)
            .max()
            .unwrap_or(0);
        let last = match sequences.get(&key) {
            Some(&last) if last < stored => {
                warn!(
                    prefix = %prefix,
                    year,
                    counter = last,
                    highest_stored = stored,
                    "Invoice counter behind stored numbers, advancing past them"
                );
                stored
            }
            Some(&last) => last,
            None => stored,
        };
        let sequence = last + 1;

        let number = InvoiceNumber::new(prefix.clone(), year, sequence)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let invoice = invoice.into_invoice(number);
        sequences.insert(key, sequence);
        invoices.insert(invoice.id, invoice.clone());

        debug!(invoice_number = %invoice.invoice_number, "Allocated invoice number");
        Ok(invoice)
    }

    async fn get(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        Ok(self.state.lock().await.invoices.get(&id).cloned())
    }

    async fn list(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, StoreError> {
        let state = self.state.lock().await;
        let mut invoices: Vec<Invoice> = state
            .invoices
            .values()
            .filter(|i| {
                let project_name = state.projects.get(&i.project_id).map(|p| p.name.as_str());
                filter.matches(i, project_name)
            })
            .cloned()
            .collect();

        invoices.sort_by(|a, b| {
            b.issue_date
                .cmp(&a.issue_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(invoices)
    }

    async fn update(&self, invoice: &Invoice) -> Result<i64, StoreError> {
        let mut state = self.state.lock().await;
        let stored = state
            .invoices
            .get_mut(&invoice.id)
            .ok_or_else(|| StoreError::Backend(format!("invoice {} does not exist", invoice.id)))?;

        if stored.version != invoice.version {
            return Err(StoreError::Conflict(format!(
                "invoice {} was modified concurrently (version {} is now {})",
                stored.invoice_number, invoice.version, stored.version
            )));
        }

        let invoice_number = stored.invoice_number.clone();
        let client = stored.client.clone();
        let version = stored.version + 1;
        *stored = invoice.clone();
        stored.invoice_number = invoice_number;
        stored.client = client;
        stored.version = version;
        Ok(version)
    }

    async fn hard_delete(&self, id: InvoiceId) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.invoices.remove(&id).is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use core_kernel::Money;
    use rust_decimal::Decimal;

    use crate::invoice::{ClientSnapshot, InvoiceType, PaymentMode};

    fn new_invoice() -> NewInvoice {
        NewInvoice {
            id: InvoiceId::new_v7(),
            project_id: ProjectId::new(),
            client_id: ClientId::new(),
            invoice_type: InvoiceType::default(),
            subject: "Suivi".to_string(),
            issue_date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2025, 2, 2).unwrap(),
            tax_percentage: Decimal::ZERO,
            advance_payment: Money::zero(),
            payment_mode: PaymentMode::default(),
            client: ClientSnapshot::default(),
            notes: String::new(),
            items: Vec::new(),
            created_by: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_sequence_starts_at_one() {
        let store = InMemoryInvoiceStore::new();
        let prefix = InvoicePrefix::default();

        let first = store.insert_numbered(&prefix, 2025, new_invoice()).await.unwrap();
        let second = store.insert_numbered(&prefix, 2025, new_invoice()).await.unwrap();

        assert_eq!(first.invoice_number.to_string(), "BH/2025/1");
        assert_eq!(second.invoice_number.to_string(), "BH/2025/2");
        assert_eq!(store.last_sequence(&prefix, 2025).await, Some(2));
    }

    #[tokio::test]
    async fn test_counter_seeded_from_history() {
        let store = InMemoryInvoiceStore::new();
        let prefix = InvoicePrefix::default();
        store
            .import_invoice(new_invoice().into_invoice("BH/2025/41".parse().unwrap()))
            .await;

        let next = store.insert_numbered(&prefix, 2025, new_invoice()).await.unwrap();
        assert_eq!(next.invoice_number.sequence(), 42);
    }

    #[tokio::test]
    async fn test_hard_delete_keeps_counter() {
        let store = InMemoryInvoiceStore::new();
        let prefix = InvoicePrefix::default();

        let first = store.insert_numbered(&prefix, 2025, new_invoice()).await.unwrap();
        assert!(store.hard_delete(first.id).await.unwrap());
        assert!(!store.hard_delete(first.id).await.unwrap());

        let next = store.insert_numbered(&prefix, 2025, new_invoice()).await.unwrap();
        assert_eq!(next.invoice_number.sequence(), 2);
    }

    #[tokio::test]
    async fn test_update_never_rewrites_number_or_snapshot() {
        let store = InMemoryInvoiceStore::new();
        let prefix = InvoicePrefix::default();
        let invoice = store.insert_numbered(&prefix, 2025, new_invoice()).await.unwrap();

        let mut changed = invoice.clone();
        changed.invoice_number = "BH/2025/99".parse().unwrap();
        changed.client.name = "Someone else".to_string();
        changed.subject = "Nouveau".to_string();
        assert_eq!(store.update(&changed).await.unwrap(), 2);

        let stored = store.get(invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.invoice_number, invoice.invoice_number);
        assert_eq!(stored.client, invoice.client);
        assert_eq!(stored.subject, "Nouveau");
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_update_from_stale_read_is_refused() {
        let store = InMemoryInvoiceStore::new();
        let invoice = store
            .insert_numbered(&InvoicePrefix::default(), 2025, new_invoice())
            .await
            .unwrap();

        let mut first = invoice.clone();
        first.subject = "Premier".to_string();
        store.update(&first).await.unwrap();

        let mut second = invoice;
        second.subject = "Second".to_string();
        let result = store.update(&second).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let stored = store.get(second.id).await.unwrap().unwrap();
        assert_eq!(stored.subject, "Premier");
    }

    #[tokio::test]
    async fn test_counter_advances_past_imported_number() {
        let store = InMemoryInvoiceStore::new();
        let prefix = InvoicePrefix::default();

        let first = store.insert_numbered(&prefix, 2025, new_invoice()).await.unwrap();
        assert_eq!(first.invoice_number.sequence(), 1);
        store
            .import_invoice(new_invoice().into_invoice("BH/2025/2".parse().unwrap()))
            .await;

        let next = store.insert_numbered(&prefix, 2025, new_invoice()).await.unwrap();
        let after = store.insert_numbered(&prefix, 2025, new_invoice()).await.unwrap();
        assert_eq!(next.invoice_number.to_string(), "BH/2025/3");
        assert_eq!(after.invoice_number.to_string(), "BH/2025/4");
        assert_eq!(store.last_sequence(&prefix, 2025).await, Some(4));
    }
}
