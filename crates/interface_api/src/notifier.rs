//! Notification adapter that writes events to the log

use async_trait::async_trait;
use tracing::info;

use domain_billing::{InvoiceCreated, InvoiceNotifier, NotificationError};

/// Logs every "invoice created" event as a structured record
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl InvoiceNotifier for LogNotifier {
    async fn invoice_created(&self, event: &InvoiceCreated) -> Result<(), NotificationError> {
        info!(
            event_type = event.event_type(),
            invoice_id = %event.invoice_id,
            invoice_number = %event.invoice_number,
            project_id = %event.project_id,
            client_id = %event.client_id,
            total_ttc = %event.total_ttc.amount(),
            net_to_pay = %event.net_to_pay.amount(),
            "Invoice created"
        );
        Ok(())
    }
}
