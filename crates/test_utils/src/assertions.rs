//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for ledger types that give
//! more meaningful error messages than standard assertions.

use core_kernel::{Money, ValidationErrors};
use domain_billing::{BillingError, InvoiceNumber};
use rust_decimal::Decimal;

/// Asserts that a Money value equals `expected` once rounded to the minor unit
pub fn assert_money_rounds_to(actual: &Money, expected: Decimal) {
    let rounded = actual.round_to_minor_unit().amount();
    assert_eq!(
        rounded,
        expected,
        "Money {} rounds to {}, expected {}",
        actual.amount(),
        rounded,
        expected
    );
}

/// Asserts that the sequences of `numbers` are exactly 1..=n in some order
///
/// # Panics
///
/// Panics on duplicates, gaps, or a sequence that does not start at 1
pub fn assert_gapless(numbers: &[InvoiceNumber]) {
    let mut sequences: Vec<u64> = numbers.iter().map(InvoiceNumber::sequence).collect();
    sequences.sort_unstable();

    let expected: Vec<u64> = (1..=numbers.len() as u64).collect();
    assert_eq!(
        sequences, expected,
        "Sequences are not gapless and unique: {:?}",
        sequences
    );
}

/// Asserts that `errors` reports a problem on `field`
pub fn assert_validation_field(errors: &ValidationErrors, field: &str) {
    assert!(
        errors.has_field(field),
        "Expected a validation error on '{}', got {:?}",
        field,
        errors.errors()
    );
}

/// Asserts that a billing error is a validation failure on `field`
pub fn assert_rejected_field(error: &BillingError, field: &str) {
    match error {
        BillingError::Validation(errors) => assert_validation_field(errors, field),
        other => panic!("Expected a validation error on '{}', got {:?}", field, other),
    }
}

/// Asserts that an error matches a specific variant
#[macro_export]
macro_rules! assert_err_variant {
    ($result:expr, $pattern:pat) => {
        match $result {
            Ok(value) => panic!("Expected Err matching {}, got Ok({:?})", stringify!($pattern), value),
            Err(ref e) => {
                assert!(
                    matches!(e, $pattern),
                    "Error {:?} does not match pattern {}",
                    e,
                    stringify!($pattern)
                );
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_billing::InvoicePrefix;
    use rust_decimal_macros::dec;

    fn numbers(sequences: &[u64]) -> Vec<InvoiceNumber> {
        sequences
            .iter()
            .map(|s| InvoiceNumber::new(InvoicePrefix::default(), 2025, *s).unwrap())
            .collect()
    }

    #[test]
    fn test_money_rounds_half_to_even() {
        assert_money_rounds_to(&Money::new(dec!(0.125)), dec!(0.12));
        assert_money_rounds_to(&Money::new(dec!(8499999.9994)), dec!(8500000.00));
    }

    #[test]
    fn test_gapless_accepts_any_order() {
        assert_gapless(&numbers(&[3, 1, 2]));
    }

    #[test]
    #[should_panic(expected = "not gapless")]
    fn test_gapless_rejects_gap() {
        assert_gapless(&numbers(&[1, 3]));
    }

    #[test]
    #[should_panic(expected = "not gapless")]
    fn test_gapless_rejects_duplicate() {
        assert_gapless(&numbers(&[1, 1, 2]));
    }

    #[test]
    fn test_rejected_field() {
        let error = BillingError::from(ValidationErrors::single("subject", "required"));
        assert_rejected_field(&error, "subject");
    }

    #[test]
    fn test_assert_err_variant() {
        let result: Result<(), BillingError> = Err(BillingError::not_found("Invoice", "x"));
        assert_err_variant!(result, BillingError::NotFound { .. });
    }
}
