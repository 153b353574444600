//! # Totals Calculator
//!
//! Pure recomputation of an order's derived money fields from its line
//! items, tip and discount. Invoked after any items/discount/tip change;
//! deterministic and free of I/O, so it is testable without a database.
//!
//! ## Per-Line Tax With Proportional Discount
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  items_total = Σ line_total                 (non-voided lines)          │
//! │                                                                         │
//! │  For each line:                                                         │
//! │    line_discount = discount × line_total / items_total                  │
//! │    line_tax      = round(max(0, line_total − line_discount) × rate)     │
//! │                                                                         │
//! │  total_tax    = Σ line_tax                                              │
//! │  total_amount = max(0, items_total + total_tax + tip − discount)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tax must be computed per line because menu categories carry different tax
//! rates; a flat discount-then-tax on the order total would misallocate tax
//! across categories. The order-level discount is therefore distributed
//! across lines by each line's share of the pre-discount items total.

use crate::money::Money;
use crate::types::OrderItem;

/// The derived money fields of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub items_total: Money,
    pub total_tax: Money,
    pub total_tip: Money,
    pub total_discount: Money,
    pub total_amount: Money,
}

impl Totals {
    /// Totals of an empty order.
    pub fn zero() -> Self {
        Totals {
            items_total: Money::zero(),
            total_tax: Money::zero(),
            total_tip: Money::zero(),
            total_discount: Money::zero(),
            total_amount: Money::zero(),
        }
    }
}

/// Recomputes order totals from line items, tip and combined discount.
///
/// `discount` is the combined order-level discount (manual + auto-applied);
/// distribution across lines is proportional to each line's share of the
/// items total. Voided lines are excluded entirely.
///
/// The computation only reads each line independently and sums, so it is
/// order-independent and idempotent: recomputing with unchanged inputs
/// yields identical results.
pub fn compute(items: &[OrderItem], tip: Money, discount: Money) -> Totals {
    let lines: Vec<&OrderItem> = items
        .iter()
        .filter(|i| i.counts_towards_totals())
        .collect();

    let items_total: Money = lines.iter().map(|i| i.line_total()).sum();

    let mut total_tax = Money::zero();
    for line in &lines {
        let line_total = line.line_total();
        let line_discount = discount.proportional(line_total, items_total);
        let taxable = (line_total - line_discount).clamp_zero();
        total_tax += taxable.tax_at_bps(line.snap_tax_rate_bps);
    }

    let total_amount = (items_total + total_tax + tip - discount).clamp_zero();

    Totals {
        items_total,
        total_tax,
        total_tip: tip,
        total_discount: discount,
        total_amount,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderItemStatus;
    use chrono::Utc;

    fn line(line_total_cents: i64, tax_rate_bps: u32) -> OrderItem {
        OrderItem {
            id: "i".into(),
            order_id: "o".into(),
            menu_item_id: "m".into(),
            snap_name: "Item".into(),
            snap_base_price_cents: line_total_cents,
            snap_tax_rate_bps: tax_rate_bps,
            unit_sale_price_cents: line_total_cents,
            quantity: 1,
            status: OrderItemStatus::Pending,
            line_total_cents,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_order_is_all_zero() {
        let t = compute(&[], Money::zero(), Money::zero());
        assert_eq!(t, Totals::zero());
    }

    /// Spec scenario: base 10.00, variation +2.00, quantity 2 → line 24.00;
    /// 10% tax, no discount/tip → tax 2.40, total 26.40.
    #[test]
    fn test_single_line_with_tax() {
        let mut item = line(2400, 1000);
        item.snap_base_price_cents = 1000;
        item.unit_sale_price_cents = 1200;
        item.quantity = 2;

        let t = compute(&[item], Money::zero(), Money::zero());
        assert_eq!(t.items_total.cents(), 2400);
        assert_eq!(t.total_tax.cents(), 240);
        assert_eq!(t.total_amount.cents(), 2640);
    }

    #[test]
    fn test_discount_distributed_proportionally_across_rates() {
        // Two lines, equal totals, different category rates. A $6.00
        // discount splits $3.00 to each line before tax.
        let items = vec![line(1200, 1000), line(1200, 2000)];
        let t = compute(&items, Money::zero(), Money::from_cents(600));

        // Line 1: (1200 - 300) * 10% = 90
        // Line 2: (1200 - 300) * 20% = 180
        assert_eq!(t.total_tax.cents(), 270);
        assert_eq!(t.total_amount.cents(), 2400 + 270 - 600);
    }

    #[test]
    fn test_discount_share_follows_line_weight() {
        // $9.00 discount over $30.00: the $20.00 line takes $6.00, the
        // $10.00 line $3.00.
        let items = vec![line(2000, 1000), line(1000, 1000)];
        let t = compute(&items, Money::zero(), Money::from_cents(900));

        // (2000-600)*10% + (1000-300)*10% = 140 + 70
        assert_eq!(t.total_tax.cents(), 210);
    }

    #[test]
    fn test_tip_adds_untaxed() {
        let items = vec![line(1000, 1000)];
        let t = compute(&items, Money::from_cents(500), Money::zero());
        assert_eq!(t.total_tax.cents(), 100);
        assert_eq!(t.total_amount.cents(), 1600);
        assert_eq!(t.total_tip.cents(), 500);
    }

    #[test]
    fn test_total_clamped_to_zero() {
        // Discount larger than everything owed.
        let items = vec![line(1000, 0)];
        let t = compute(&items, Money::zero(), Money::from_cents(5000));
        assert_eq!(t.total_amount.cents(), 0);
        // Per-line taxable is clamped too, never negative tax.
        assert_eq!(t.total_tax.cents(), 0);
    }

    #[test]
    fn test_voided_lines_excluded() {
        let mut voided = line(9900, 1000);
        voided.status = OrderItemStatus::Voided;
        let items = vec![line(1000, 1000), voided];

        let t = compute(&items, Money::zero(), Money::zero());
        assert_eq!(t.items_total.cents(), 1000);
        assert_eq!(t.total_tax.cents(), 100);
    }

    #[test]
    fn test_recompute_is_deterministic() {
        let items = vec![line(1234, 825), line(5678, 1000), line(910, 0)];
        let a = compute(&items, Money::from_cents(300), Money::from_cents(450));
        let b = compute(&items, Money::from_cents(300), Money::from_cents(450));
        assert_eq!(a, b);
    }
}
