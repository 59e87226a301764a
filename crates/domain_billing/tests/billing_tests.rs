//! Tests for invoice totals, numbering and lifecycle

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{ClientId, InvoiceId, Money, ProjectId};

use domain_billing::invoice::{
    ClientSnapshot, Invoice, InvoiceItem, InvoiceStatus, InvoiceType, NewInvoice, PaymentMode,
};
use domain_billing::numbering::{highest_sequence, InvoiceNumber, InvoicePrefix};
use domain_billing::totals::InvoiceTotals;
use domain_billing::{BillingError, InvoiceCreated};

fn item(quantity: Decimal, unit_price: Decimal) -> InvoiceItem {
    InvoiceItem::new("Prestation", quantity, Money::new(unit_price), 0)
}

fn invoice_with(items: Vec<InvoiceItem>, tax: Decimal, advance: Decimal) -> Invoice {
    NewInvoice {
        id: InvoiceId::new_v7(),
        project_id: ProjectId::new(),
        client_id: ClientId::new(),
        invoice_type: InvoiceType::Invoice,
        subject: "Villa R+1".to_string(),
        issue_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
        due_date: NaiveDate::from_ymd_opt(2025, 5, 31).unwrap(),
        tax_percentage: tax,
        advance_payment: Money::new(advance),
        payment_mode: PaymentMode::Transfer,
        client: ClientSnapshot {
            name: "Awa Diop".to_string(),
            address: "Dakar".to_string(),
            phone: "+221 77 000 00 00".to_string(),
        },
        notes: String::new(),
        items,
        created_by: Some("staff-1".to_string()),
        created_at: Utc::now(),
    }
    .into_invoice("BH/2025/7".parse().unwrap())
}

// ============================================================================
// Totals Tests
// ============================================================================

mod totals_tests {
    use super::*;

    #[test]
    fn test_tax_rates() {
        let items = vec![item(dec!(3), dec!(1000)), item(dec!(0.5), dec!(250.50))];
        let subtotal = dec!(3125.25);

        for (tax, expected_tax) in [
            (dec!(0), dec!(0)),
            (dec!(18), dec!(562.545)),
            (dec!(100), dec!(3125.25)),
        ] {
            let totals = InvoiceTotals::calculate(tax, Money::zero(), &items);
            assert_eq!(totals.subtotal.amount(), subtotal);
            assert_eq!((totals.total_ttc - totals.subtotal).amount(), expected_tax, "tax {tax}");
        }
    }

    #[test]
    fn test_overpaid_invoice_has_negative_net() {
        let invoice = invoice_with(vec![item(dec!(1), dec!(100))], dec!(18), dec!(200));
        let totals = invoice.totals();

        assert_eq!(totals.total_ttc.amount(), dec!(118));
        assert_eq!(totals.net_to_pay.amount(), dec!(-82));
        assert!(totals.net_to_pay.is_negative());
    }

    #[test]
    fn test_empty_invoice_owes_minus_advance() {
        let invoice = invoice_with(Vec::new(), dec!(18), dec!(50));
        let totals = invoice.totals();

        assert!(totals.subtotal.is_zero());
        assert!(totals.total_ttc.is_zero());
        assert_eq!(totals.net_to_pay.amount(), dec!(-50));
    }

    #[test]
    fn test_bankers_rounding_at_display() {
        // 0.125 and 0.135 sit exactly between two cents
        let down = InvoiceTotals::calculate(dec!(0), Money::zero(), &[item(dec!(1), dec!(0.125))]);
        let up = InvoiceTotals::calculate(dec!(0), Money::zero(), &[item(dec!(1), dec!(0.135))]);

        assert_eq!(down.rounded().subtotal.amount(), dec!(0.12));
        assert_eq!(up.rounded().subtotal.amount(), dec!(0.14));
    }

    #[test]
    fn test_item_total_price() {
        let line = item(dec!(405.25), dec!(12000));
        assert_eq!(line.total_price().amount(), dec!(4863000));
    }

    fn amount() -> impl Strategy<Value = Decimal> {
        (0i64..1_000_000_000).prop_map(|cents| Decimal::new(cents, 2))
    }

    fn quantity() -> impl Strategy<Value = Decimal> {
        (1i64..100_000).prop_map(|hundredths| Decimal::new(hundredths, 2))
    }

    proptest! {
        #[test]
        fn subtotal_is_sum_of_lines(lines in prop::collection::vec((quantity(), amount()), 0..12)) {
            let items: Vec<InvoiceItem> = lines.iter().map(|(q, p)| item(*q, *p)).collect();
            let expected: Decimal = lines.iter().map(|(q, p)| q * p).sum();

            let totals = InvoiceTotals::calculate(dec!(18), Money::zero(), &items);
            prop_assert_eq!(totals.subtotal.amount(), expected);
        }

        #[test]
        fn net_is_total_minus_advance(
            lines in prop::collection::vec((quantity(), amount()), 0..6),
            tax in (0i64..10_000).prop_map(|t| Decimal::new(t, 2)),
            advance in amount(),
        ) {
            let items: Vec<InvoiceItem> = lines.iter().map(|(q, p)| item(*q, *p)).collect();
            let totals = InvoiceTotals::calculate(tax, Money::new(advance), &items);

            prop_assert_eq!(totals.total_ttc, totals.subtotal + totals.tax_amount);
            prop_assert_eq!(totals.net_to_pay.amount(), totals.total_ttc.amount() - advance);
        }
    }
}

// ============================================================================
// Numbering Tests
// ============================================================================

mod numbering_tests {
    use super::*;

    #[test]
    fn test_identifier_format() {
        let number = InvoiceNumber::new(InvoicePrefix::default(), 2026, 120).unwrap();
        assert_eq!(number.to_string(), "BH/2026/120");
    }

    #[test]
    fn test_configured_prefix() {
        let prefix: InvoicePrefix = "XY".parse().unwrap();
        assert_eq!(highest_sequence(&prefix, 2025, ["XY/2025/3", "BH/2025/9"]), 3);
    }

    #[test]
    fn test_number_serializes_as_string() {
        let number: InvoiceNumber = "BH/2025/3".parse().unwrap();
        assert_eq!(serde_json::to_string(&number).unwrap(), "\"BH/2025/3\"");

        let parsed: Result<InvoiceNumber, _> = serde_json::from_str("\"BH/2025/03x\"");
        assert!(parsed.is_err());
    }
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_same_status_is_noop() {
        let mut invoice = invoice_with(vec![item(dec!(1), dec!(1))], dec!(0), dec!(0));
        invoice.transition_to(InvoiceStatus::Draft, "staff-1", Utc::now()).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Draft);
    }

    #[test]
    fn test_cancelled_is_terminal() {
        let mut invoice = invoice_with(vec![item(dec!(1), dec!(1))], dec!(0), dec!(0));
        invoice.transition_to(InvoiceStatus::Cancelled, "staff-1", Utc::now()).unwrap();

        let result = invoice.transition_to(InvoiceStatus::Sent, "staff-1", Utc::now());
        assert!(matches!(
            result,
            Err(BillingError::InvalidStatusTransition {
                from: InvoiceStatus::Cancelled,
                to: InvoiceStatus::Sent
            })
        ));
    }

    #[test]
    fn test_sent_items_still_editable() {
        let mut invoice = invoice_with(vec![item(dec!(1), dec!(1))], dec!(0), dec!(0));
        invoice.transition_to(InvoiceStatus::Sent, "staff-1", Utc::now()).unwrap();

        invoice
            .replace_items(vec![item(dec!(2), dec!(5))], "staff-2", Utc::now())
            .unwrap();
        assert_eq!(invoice.totals().subtotal.amount(), dec!(10));
        assert_eq!(invoice.updated_by.as_deref(), Some("staff-2"));
    }

    #[test]
    fn test_soft_delete_and_restore() {
        let mut invoice = invoice_with(Vec::new(), dec!(0), dec!(0));
        invoice.soft_delete("staff-1", Utc::now());
        assert!(invoice.is_deleted);
        assert_eq!(invoice.deleted_by.as_deref(), Some("staff-1"));

        invoice.restore("staff-1", Utc::now());
        assert!(!invoice.is_deleted);
        assert!(invoice.deleted_at.is_none());
    }

    #[test]
    fn test_created_event_carries_rounded_amounts() {
        let invoice = invoice_with(
            vec![item(dec!(405.25), dec!(12000)), item(dec!(1), dec!(2340389.83))],
            dec!(18),
            dec!(0),
        );
        let event = InvoiceCreated::from_invoice(&invoice, Utc::now());

        assert_eq!(event.invoice_number, "BH/2025/7");
        assert_eq!(event.total_ttc.amount(), dec!(8500000.00));
        assert_eq!(event.net_to_pay.amount(), dec!(8500000.00));
        assert_eq!(event.event_type(), "invoice.created");
    }
}
