//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that respects the invoice ledger's validation rules.

use proptest::prelude::*;
use rust_decimal::Decimal;

use domain_billing::InvoiceItemInput;

/// Strategy for non-negative amounts with two decimal places, below 10^7
pub fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for strictly positive quantities with two decimal places
pub fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|hundredths| Decimal::new(hundredths, 2))
}

/// Strategy for tax percentages between 0 and 100
pub fn tax_percentage_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000i64).prop_map(|basis| Decimal::new(basis, 2))
}

/// Strategy for valid item inputs
pub fn item_input_strategy() -> impl Strategy<Value = InvoiceItemInput> {
    ("[A-Z][a-z]{3,12}", quantity_strategy(), amount_strategy(), 0i32..20)
        .prop_map(|(description, quantity, unit_price, order)| {
            InvoiceItemInput::new(description, quantity, unit_price).with_display_order(order)
        })
}

/// Strategy for item lists of up to `max` entries
pub fn items_strategy(max: usize) -> impl Strategy<Value = Vec<InvoiceItemInput>> {
    prop::collection::vec(item_input_strategy(), 0..=max)
}

/// Strategy for well-formed invoice numbers of `prefix`/`year`
pub fn invoice_number_strategy(prefix: &'static str, year: i32) -> impl Strategy<Value = String> {
    (1u64..100_000).prop_map(move |seq| format!("{prefix}/{year}/{seq}"))
}

/// Strategy for identifiers inside the `prefix`/`year` scope that do not parse
pub fn malformed_number_strategy(prefix: &'static str, year: i32) -> impl Strategy<Value = String> {
    prop_oneof![
        Just(format!("{prefix}/{year}/")),
        "[a-z]{1,4}".prop_map(move |tail| format!("{prefix}/{year}/{tail}")),
        (1u32..999).prop_map(move |n| format!("{prefix}/{year}/{n}/bis")),
        (1u32..999).prop_map(move |n| format!("{prefix}/{year}/{n}-A")),
    ]
}
