//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible defaults.
//! These builders allow tests to specify only the relevant fields while using
//! defaults (or fake data) for everything else.

use chrono::NaiveDate;
use fake::faker::address::en::{CityName, StreetName};
use fake::faker::lorem::en::Words;
use fake::faker::name::en::Name;
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use rust_decimal::Decimal;

use core_kernel::{ClientId, ProjectId};
use domain_billing::{
    ClientProfile, CreateInvoiceRequest, InMemoryInvoiceStore, InvoiceItemInput, Project,
    ProjectContext,
};

use crate::fixtures::{ClientFixtures, DecimalFixtures, ItemFixtures, TemporalFixtures};

/// Builder for client profiles filled with fake contact details
pub struct TestClientBuilder {
    id: ClientId,
    full_name: String,
    address: String,
    phone: String,
}

impl Default for TestClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClientBuilder {
    /// Creates a builder with a random name, address and phone
    pub fn new() -> Self {
        let street: String = StreetName().fake();
        let city: String = CityName().fake();
        Self {
            id: ClientId::new_v7(),
            full_name: Name().fake(),
            address: format!("{street}, {city}"),
            phone: PhoneNumber().fake(),
        }
    }

    pub fn build(self) -> ClientProfile {
        ClientProfile {
            id: self.id,
            full_name: self.full_name,
            address: self.address,
            phone: self.phone,
        }
    }
}

/// Builder for invoice creation requests
///
/// Defaults to the documented sample items at 18% tax, due one month after
/// the fixture "now".
pub struct TestInvoiceRequestBuilder {
    request: CreateInvoiceRequest,
}

impl TestInvoiceRequestBuilder {
    /// Creates a builder for an invoice of `project_id`
    pub fn new(project_id: ProjectId) -> Self {
        let subject: Vec<String> = Words(2..5).fake();
        let mut request =
            CreateInvoiceRequest::new(project_id, subject.join(" "), TemporalFixtures::due_date())
                .with_tax_percentage(DecimalFixtures::standard_tax());
        request.items = ItemFixtures::documented_sample();

        Self { request }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.request.subject = subject.into();
        self
    }

    pub fn with_item(mut self, item: InvoiceItemInput) -> Self {
        self.request.items.push(item);
        self
    }

    pub fn with_tax_percentage(mut self, tax: Decimal) -> Self {
        self.request.tax_percentage = tax;
        self
    }

    pub fn with_advance_payment(mut self, advance: Decimal) -> Self {
        self.request.advance_payment = advance;
        self
    }

    pub fn with_issue_date(mut self, date: NaiveDate) -> Self {
        self.request.issue_date = Some(date);
        self
    }

    /// Overrides the client snapshot
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.request.client_name = Some(name.into());
        self
    }

    pub fn build(self) -> CreateInvoiceRequest {
        self.request
    }
}

/// Registers a fixture client and one of its projects in `store`
pub async fn seed_project(store: &InMemoryInvoiceStore) -> ProjectContext {
    seed_project_for(store, ClientFixtures::moussa()).await
}

/// Registers `client` and a new project of theirs in `store`
pub async fn seed_project_for(store: &InMemoryInvoiceStore, client: ClientProfile) -> ProjectContext {
    let project: Project = ClientFixtures::project_for(&client);
    store.register_client(client.clone()).await;
    store.register_project(project.clone()).await;
    ProjectContext { project, client }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builder_fills_contact_details() {
        let client = TestClientBuilder::new().build();
        assert!(!client.full_name.is_empty());
        assert!(!client.address.is_empty());
    }

    #[test]
    fn test_request_builder_defaults() {
        let request = TestInvoiceRequestBuilder::new(ProjectId::new())
            .with_subject("Etude de sol")
            .build();
        assert_eq!(request.subject, "Etude de sol");
        assert_eq!(request.items.len(), 2);
        assert_eq!(request.tax_percentage, DecimalFixtures::standard_tax());
    }

    #[tokio::test]
    async fn test_seed_project() {
        use domain_billing::InvoiceStore;

        let store = InMemoryInvoiceStore::new();
        let context = seed_project(&store).await;
        let loaded = store.project_context(context.project.id).await.unwrap();
        assert_eq!(loaded, Some(context));
    }
}
