//! Financial field calculator
//!
//! Derives the computed amounts of an invoice from its tax percentage,
//! advance payment and line items. Nothing here is persisted: totals are
//! recomputed on every read so item or tax edits are always reflected.
//!
//! ```text
//! subtotal   = Σ quantity_i × unit_price_i
//! tax_amount = subtotal × tax_percentage / 100
//! total_ttc  = subtotal + tax_amount
//! net_to_pay = total_ttc − advance_payment      (never clamped)
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Money, Rate};

use crate::invoice::InvoiceItem;

/// Computed financial fields of an invoice, at full precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: Money,
    pub tax_amount: Money,
    pub total_ttc: Money,
    pub net_to_pay: Money,
}

impl InvoiceTotals {
    /// Computes the totals of an item list
    ///
    /// With no items every amount is zero except `net_to_pay`, which is the
    /// negated advance payment.
    pub fn calculate(tax_percentage: Decimal, advance_payment: Money, items: &[InvoiceItem]) -> Self {
        let subtotal: Money = items.iter().map(InvoiceItem::total_price).sum();
        let tax_amount = Rate::from_percentage(tax_percentage).apply(&subtotal);
        let total_ttc = subtotal + tax_amount;

        Self {
            subtotal,
            tax_amount,
            total_ttc,
            net_to_pay: total_ttc - advance_payment,
        }
    }

    /// Rounds every field to the minor unit for display
    pub fn rounded(&self) -> Self {
        Self {
            subtotal: self.subtotal.round_to_minor_unit(),
            tax_amount: self.tax_amount.round_to_minor_unit(),
            total_ttc: self.total_ttc.round_to_minor_unit(),
            net_to_pay: self.net_to_pay.round_to_minor_unit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(quantity: Decimal, unit_price: Decimal) -> InvoiceItem {
        InvoiceItem::new("Travaux", quantity, Money::new(unit_price), 0)
    }

    #[test]
    fn test_no_items() {
        let totals = InvoiceTotals::calculate(dec!(18), Money::zero(), &[]);
        assert!(totals.subtotal.is_zero());
        assert!(totals.tax_amount.is_zero());
        assert!(totals.total_ttc.is_zero());
        assert!(totals.net_to_pay.is_zero());
    }

    #[test]
    fn test_documented_sample() {
        let items = [item(dec!(405.25), dec!(12000)), item(dec!(1), dec!(2340389.83))];
        let totals = InvoiceTotals::calculate(dec!(18.00), Money::zero(), &items);

        assert_eq!(totals.subtotal.amount(), dec!(7203389.83));
        assert_eq!(totals.tax_amount.amount(), dec!(1296610.1694));

        let shown = totals.rounded();
        assert_eq!(shown.tax_amount.amount(), dec!(1296610.17));
        assert_eq!(shown.total_ttc.amount(), dec!(8500000.00));
        assert_eq!(shown.net_to_pay.amount(), dec!(8500000.00));
    }

    #[test]
    fn test_rounding_happens_once() {
        // 3 × 0.333 rounded per line would be 0.99; kept exact it is 0.999 → 1.00
        let items = [item(dec!(1), dec!(0.333)), item(dec!(1), dec!(0.333)), item(dec!(1), dec!(0.333))];
        let totals = InvoiceTotals::calculate(Decimal::ZERO, Money::zero(), &items);
        assert_eq!(totals.rounded().subtotal.amount(), dec!(1.00));
    }
}
