//! Domain events for invoices
//!
//! Events are handed to the notification collaborator after the change they
//! describe has been committed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClientId, InvoiceId, Money, ProjectId};

use crate::invoice::Invoice;

/// A new invoice has been created and numbered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCreated {
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub project_id: ProjectId,
    pub client_id: ClientId,
    /// Total including tax, rounded to the minor unit
    pub total_ttc: Money,
    /// Amount still due after the advance, rounded to the minor unit
    pub net_to_pay: Money,
    pub timestamp: DateTime<Utc>,
}

impl InvoiceCreated {
    pub fn from_invoice(invoice: &Invoice, timestamp: DateTime<Utc>) -> Self {
        let totals = invoice.totals().rounded();
        Self {
            invoice_id: invoice.id,
            invoice_number: invoice.invoice_number.to_string(),
            project_id: invoice.project_id,
            client_id: invoice.client_id,
            total_ttc: totals.total_ttc,
            net_to_pay: totals.net_to_pay,
            timestamp,
        }
    }

    pub fn event_type(&self) -> &'static str {
        "invoice.created"
    }
}
