//! Invoice request validation
//!
//! Every rule is checked and every failure recorded, so a rejected request
//! reports all offending fields at once. Limits mirror the storage precision
//! of the ledger columns.
//!
//! ## Rules
//! - subject: non-blank, at most 255 characters
//! - tax percentage: 0 ≤ t < 1000, two decimal places
//! - advance payment, unit price: 0 ≤ x < 10^13, two decimal places
//! - quantity: 0 < q < 10^8, two decimal places
//! - description: non-blank
//! - display order: non-negative
//! - a non-draft invoice must have at least one item

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::ValidationErrors;

use crate::invoice::InvoiceStatus;
use crate::service::{CreateInvoiceRequest, InvoiceItemInput, UpdateInvoiceRequest};

const MAX_SUBJECT_LEN: usize = 255;
const MAX_DECIMAL_PLACES: u32 = 2;
const TAX_PERCENTAGE_LIMIT: Decimal = dec!(1000);
const AMOUNT_LIMIT: Decimal = dec!(10000000000000);
const QUANTITY_LIMIT: Decimal = dec!(100000000);

/// Validates a creation request
pub fn validate_create(request: &CreateInvoiceRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    check_subject(&mut errors, &request.subject);
    check_tax_percentage(&mut errors, request.tax_percentage);
    check_non_negative_amount(&mut errors, "advance_payment", request.advance_payment);
    check_items(&mut errors, &request.items);

    errors.into_result()
}

/// Validates the fields present in an update request
pub fn validate_update(request: &UpdateInvoiceRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if let Some(subject) = &request.subject {
        check_subject(&mut errors, subject);
    }
    if let Some(tax) = request.tax_percentage {
        check_tax_percentage(&mut errors, tax);
    }
    if let Some(advance) = request.advance_payment {
        check_non_negative_amount(&mut errors, "advance_payment", advance);
    }
    if let Some(items) = &request.items {
        check_items(&mut errors, items);
    }

    errors.into_result()
}

/// Rejects an invoice that left the Draft status without any item
pub fn require_items_unless_draft(status: InvoiceStatus, item_count: usize) -> Result<(), ValidationErrors> {
    if status != InvoiceStatus::Draft && item_count == 0 {
        return Err(ValidationErrors::single(
            "items",
            format!("an invoice in status {status} needs at least one item"),
        ));
    }
    Ok(())
}

fn check_subject(errors: &mut ValidationErrors, subject: &str) {
    if subject.trim().is_empty() {
        errors.add("subject", "must not be blank");
    } else if subject.chars().count() > MAX_SUBJECT_LEN {
        errors.add("subject", format!("must be at most {MAX_SUBJECT_LEN} characters"));
    }
}

fn check_tax_percentage(errors: &mut ValidationErrors, tax: Decimal) {
    if tax.is_sign_negative() && !tax.is_zero() {
        errors.add("tax_percentage", "must not be negative");
    } else if tax >= TAX_PERCENTAGE_LIMIT {
        errors.add("tax_percentage", format!("must be below {TAX_PERCENTAGE_LIMIT}"));
    }
    check_precision(errors, "tax_percentage", tax);
}

fn check_non_negative_amount(errors: &mut ValidationErrors, field: &str, amount: Decimal) {
    if amount.is_sign_negative() && !amount.is_zero() {
        errors.add(field, "must not be negative");
    } else if amount >= AMOUNT_LIMIT {
        errors.add(field, format!("must be below {AMOUNT_LIMIT}"));
    }
    check_precision(errors, field, amount);
}

fn check_items(errors: &mut ValidationErrors, items: &[InvoiceItemInput]) {
    for (index, item) in items.iter().enumerate() {
        let field = |name: &str| format!("items[{index}].{name}");

        if item.description.trim().is_empty() {
            errors.add(field("description"), "must not be blank");
        }

        if item.quantity <= Decimal::ZERO {
            errors.add(field("quantity"), "must be greater than zero");
        } else if item.quantity >= QUANTITY_LIMIT {
            errors.add(field("quantity"), format!("must be below {QUANTITY_LIMIT}"));
        }
        check_precision(errors, &field("quantity"), item.quantity);

        check_non_negative_amount(errors, &field("unit_price"), item.unit_price);

        if matches!(item.display_order, Some(order) if order < 0) {
            errors.add(field("display_order"), "must not be negative");
        }
    }
}

fn check_precision(errors: &mut ValidationErrors, field: &str, value: Decimal) {
    if value.normalize().scale() > MAX_DECIMAL_PLACES {
        errors.add(field, format!("must have at most {MAX_DECIMAL_PLACES} decimal places"));
    }
}
