//! Recording notifier
//!
//! Stands in for the notification collaborator and keeps every event it is
//! handed, optionally failing each delivery.

use async_trait::async_trait;
use tokio::sync::Mutex;

use domain_billing::{InvoiceCreated, InvoiceNotifier, NotificationError};

/// Notifier that records the events it receives
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<InvoiceCreated>>,
    failing: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that records each event and then reports a delivery failure
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    /// Events received so far, in delivery order
    pub async fn events(&self) -> Vec<InvoiceCreated> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl InvoiceNotifier for RecordingNotifier {
    async fn invoice_created(&self, event: &InvoiceCreated) -> Result<(), NotificationError> {
        self.events.lock().await.push(event.clone());
        if self.failing {
            return Err(NotificationError::Delivery("recording notifier set to fail".into()));
        }
        Ok(())
    }
}
