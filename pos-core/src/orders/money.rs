//! Money arithmetic
//!
//! All calculation happens in `Decimal`; records store `f64` rounded
//! to two decimal places. Quoted prices are tax-inclusive, so the VAT
//! share of a line is `gross * rate / (100 + rate)`.

use rust_decimal::prelude::*;

use shared::order::{Order, OrderItem, Payment};

/// Rounding for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Maximum allowed price per unit
pub const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum allowed quantity per line
pub const MAX_QUANTITY: i32 = 999;
/// Maximum allowed payment amount
pub const MAX_PAYMENT_AMOUNT: f64 = 1_000_000.0;

/// Convert f64 to Decimal for calculation.
///
/// Inputs are validated finite at the operation boundary. If NaN or
/// infinity reaches here anyway, log and treat as zero rather than
/// corrupt a total.
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_else(|| {
        tracing::error!(value = ?value, "Non-finite f64 in monetary calculation, defaulting to zero");
        Decimal::ZERO
    })
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        // SAFETY: Decimal rounded to 2dp with inputs bounded by MAX_PRICE /
        // MAX_PAYMENT_AMOUNT is always within f64 representable range
        .expect("Decimal rounded to 2dp is always representable as f64")
}

/// Effective per-unit price: zero when waived, otherwise the original
/// price minus the per-unit discount, clamped non-negative.
pub fn unit_price(item: &OrderItem) -> Decimal {
    if item.is_fully_waived {
        return Decimal::ZERO;
    }
    (to_decimal(item.original_unit_price) - to_decimal(item.discount_amount))
        .max(Decimal::ZERO)
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Line gross total: unit price times quantity
pub fn line_total(item: &OrderItem) -> Decimal {
    (unit_price(item) * Decimal::from(item.quantity))
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// VAT contained in a tax-inclusive gross amount
pub fn tax_portion(gross: Decimal, rate_percent: Decimal) -> Decimal {
    if rate_percent > Decimal::ZERO {
        gross * rate_percent / (Decimal::ONE_HUNDRED + rate_percent)
    } else {
        Decimal::ZERO
    }
}

/// Recompute every derived money field of an order from its items and
/// payment log. Idempotent: discounts are always re-derived from
/// `original_unit_price`, so applying it twice changes nothing.
pub fn recalculate_totals(order: &mut Order) {
    let mut subtotal = Decimal::ZERO;
    let mut tax_total = Decimal::ZERO;

    for item in &mut order.items {
        let unit = unit_price(item);
        item.unit_price = to_f64(unit);

        let line = (unit * Decimal::from(item.quantity))
            .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
        subtotal += line;
        tax_total += tax_portion(line, to_decimal(item.tax_rate_percent));
    }

    order.subtotal = to_f64(subtotal.max(Decimal::ZERO));
    order.tax_total = to_f64(tax_total);
    order.paid_amount = sum_payments(&order.payments);
}

/// Sum the payment log with precise arithmetic
pub fn sum_payments(payments: &[Payment]) -> f64 {
    let total: Decimal = payments.iter().map(|p| to_decimal(p.amount)).sum();
    to_f64(total)
}

/// True when paid covers required within the 0.01 tolerance
pub fn is_payment_sufficient(paid: f64, required: f64) -> bool {
    to_decimal(paid) >= to_decimal(required) - MONEY_TOLERANCE
}

/// Compare two monetary values for equality (within 0.01 tolerance)
pub fn money_eq(a: f64, b: f64) -> bool {
    (to_decimal(a) - to_decimal(b)).abs() < MONEY_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{OrderItem, Payment, PaymentMethod};

    fn item(price: f64, quantity: i32, rate: f64) -> OrderItem {
        OrderItem {
            product_id: "p1".into(),
            name: "Test".into(),
            unit_price: price,
            original_unit_price: price,
            quantity,
            paid_quantity: 0,
            tax_rate_percent: rate,
            discount_amount: 0.0,
            is_fully_waived: false,
            course: 1,
            category: "Food".into(),
        }
    }

    #[test]
    fn unit_price_applies_discount_from_original() {
        let mut line = item(12.0, 1, 10.0);
        line.discount_amount = 3.0;
        line.unit_price = 0.0; // stale on purpose
        assert_eq!(unit_price(&line), Decimal::new(900, 2));
    }

    #[test]
    fn waived_item_is_free_regardless_of_discount() {
        let mut line = item(12.0, 2, 10.0);
        line.is_fully_waived = true;
        line.discount_amount = 1.0;
        assert_eq!(unit_price(&line), Decimal::ZERO);
        assert_eq!(line_total(&line), Decimal::ZERO);
    }

    #[test]
    fn tax_is_extracted_from_gross() {
        // 11.00 gross at 10% contains exactly 1.00 of VAT
        let tax = tax_portion(Decimal::new(1100, 2), Decimal::from(10));
        assert_eq!(to_f64(tax), 1.0);
        assert_eq!(tax_portion(Decimal::new(1100, 2), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn recalculate_is_idempotent() {
        let mut order = shared::order::Order::open("t1", "s1", "Ana");
        let mut line = item(20.0, 2, 10.0);
        line.discount_amount = 5.0;
        order.items.push(line);
        order.payments.push(Payment::new(PaymentMethod::Cash, 10.0));

        recalculate_totals(&mut order);
        let first = (order.subtotal, order.tax_total, order.paid_amount);
        recalculate_totals(&mut order);
        assert_eq!(first, (order.subtotal, order.tax_total, order.paid_amount));

        assert_eq!(order.subtotal, 30.0);
        assert_eq!(order.items[0].unit_price, 15.0);
        assert_eq!(order.paid_amount, 10.0);
    }

    #[test]
    fn sufficiency_uses_cent_tolerance() {
        assert!(is_payment_sufficient(9.99, 10.0));
        assert!(is_payment_sufficient(10.0, 10.0));
        assert!(!is_payment_sufficient(9.98, 10.0));
    }

    #[test]
    fn money_eq_tolerates_sub_cent_drift() {
        assert!(money_eq(10.0, 10.004));
        assert!(!money_eq(10.0, 10.02));
    }

    #[test]
    fn sum_payments_avoids_float_drift() {
        let payments: Vec<Payment> = (0..10)
            .map(|_| Payment::new(PaymentMethod::Cash, 0.1))
            .collect();
        assert_eq!(sum_payments(&payments), 1.0);
    }
}
