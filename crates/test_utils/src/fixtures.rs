//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for common entities of the invoice ledger.
//! These fixtures are designed to be consistent and predictable for unit tests.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use core_kernel::{ClientId, ProjectId};
use domain_billing::{ClientProfile, InvoiceItemInput, Project};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Mid-March 2025, the default "now" of service tests
    pub fn now_2025() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    /// Last second of 2025
    pub fn end_of_2025() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap()
    }

    /// First second of 2026
    pub fn start_of_2026() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    /// Due date one month after [`TemporalFixtures::now_2025`]
    pub fn due_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 10).unwrap()
    }

    /// First day after [`TemporalFixtures::due_date`]
    pub fn after_due_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 11, 8, 0, 0).unwrap()
    }
}

/// Fixture for clients and projects
pub struct ClientFixtures;

impl ClientFixtures {
    /// A client with a complete profile
    pub fn moussa() -> ClientProfile {
        ClientProfile {
            id: ClientId::new_v7(),
            full_name: "Moussa Ndiaye".to_string(),
            address: "12 rue Carnot, Dakar".to_string(),
            phone: "+221 77 123 45 67".to_string(),
        }
    }

    /// A project owned by `client`
    pub fn project_for(client: &ClientProfile) -> Project {
        Project {
            id: ProjectId::new_v7(),
            name: "Villa Almadies".to_string(),
            client_id: client.id,
        }
    }
}

/// Fixture for invoice line items
pub struct ItemFixtures;

impl ItemFixtures {
    /// Items whose totals are 7203389.83 before tax and 8500000.00 at 18%
    pub fn documented_sample() -> Vec<InvoiceItemInput> {
        vec![
            InvoiceItemInput::new("Maçonnerie", dec!(405.25), dec!(12000)),
            InvoiceItemInput::new("Charpente", dec!(1), dec!(2340389.83)),
        ]
    }
}

/// Decimal constants used across tests
pub struct DecimalFixtures;

impl DecimalFixtures {
    pub fn standard_tax() -> Decimal {
        dec!(18.00)
    }

    pub fn documented_subtotal() -> Decimal {
        dec!(7203389.83)
    }

    pub fn documented_total() -> Decimal {
        dec!(8500000.00)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_belongs_to_client() {
        let client = ClientFixtures::moussa();
        let project = ClientFixtures::project_for(&client);
        assert_eq!(project.client_id, client.id);
    }

    #[test]
    fn test_documented_sample_subtotal() {
        let subtotal: Decimal = ItemFixtures::documented_sample()
            .iter()
            .map(|i| i.quantity * i.unit_price)
            .sum();
        assert_eq!(subtotal, DecimalFixtures::documented_subtotal());
    }

    #[test]
    fn test_due_date_precedes_overdue_day() {
        assert!(TemporalFixtures::after_due_date().date_naive() > TemporalFixtures::due_date());
    }
}
