//! # Money & Quantity
//!
//! Fixed-point numeric types for everything financial or stock-related.
//!
//! ## Why Integer Fixed-Point?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                             │
//! │                                                                         │
//! │  A stock level is the running sum of thousands of signed deltas; a      │
//! │  float drifts, an integer never does.                                   │
//! │                                                                         │
//! │  OUR SOLUTION:                                                          │
//! │    Money    = integer cents        (2 fractional digits)                │
//! │    Quantity = integer milli-units  (3 fractional digits)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is deliberately no `from_float` constructor on either type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

// =============================================================================
// Money
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: refunds and discounts need negative values
/// - **Single field tuple struct**: zero-cost abstraction over i64
///
/// Every monetary value in the engine flows through this type: snapshot
/// prices, line totals, taxes, tips, discounts, payment amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Clamps negative amounts to zero.
    ///
    /// Discount/tip combinations can otherwise drive a payable total below
    /// zero; the engine never charges negative money.
    #[inline]
    pub const fn clamp_zero(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Returns the smaller of two amounts.
    #[inline]
    pub const fn min(self, other: Self) -> Self {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// Multiplies by an item quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Calculates tax at a basis-point rate, rounding half-up.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`. The `+5000` provides
    /// the half-up rounding (5000/10000 = 0.5). i128 intermediate prevents
    /// overflow on large amounts.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let taxable = Money::from_cents(2400); // $24.00
    /// assert_eq!(taxable.tax_at_bps(1000).cents(), 240); // 10% → $2.40
    /// ```
    pub fn tax_at_bps(&self, rate_bps: u32) -> Money {
        let tax_cents = (self.0 as i128 * rate_bps as i128 + 5000) / 10000;
        Money::from_cents(tax_cents as i64)
    }

    /// Returns this amount's proportional share `numerator / denominator`,
    /// rounding half-up.
    ///
    /// Used to distribute an order-level discount across lines by each
    /// line's share of the items total:
    /// `line_discount = discount.proportional(line_total, items_total)`.
    ///
    /// Returns zero when the denominator is zero or not positive.
    pub fn proportional(&self, numerator: Money, denominator: Money) -> Money {
        if denominator.0 <= 0 {
            return Money::zero();
        }
        let scaled = self.0 as i128 * numerator.0 as i128;
        let d = denominator.0 as i128;
        // Round half away from zero; all practical inputs are non-negative.
        let share = if scaled >= 0 {
            (scaled + d / 2) / d
        } else {
            (scaled - d / 2) / d
        };
        Money::from_cents(share as i64)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Quantity
// =============================================================================

/// A stock quantity in milli-units (3 fractional digits).
///
/// The stock ledger is a running sum of signed deltas per product; the same
/// integer fixed-point treatment as [`Money`], one more digit of precision
/// because recipes measure ingredients in fractional units (0.125 kg flour).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Quantity(i64);

impl Quantity {
    /// Creates a Quantity from milli-units: `from_milli(1_500)` is 1.5.
    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    /// Creates a Quantity from whole units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * 1000)
    }

    /// Returns the value in milli-units.
    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by an item count (recipe quantity × items ordered).
    #[inline]
    pub const fn multiply_count(&self, count: i64) -> Self {
        Quantity(self.0 * count)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:03}", sign, (self.0 / 1000).abs(), (self.0 % 1000).abs())
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Quantity::zero()
    }
}

impl Add for Quantity {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Quantity(self.0 + other.0)
    }
}

impl AddAssign for Quantity {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Quantity {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Quantity(self.0 - other.0)
    }
}

impl SubAssign for Quantity {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Quantity {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Quantity(-self.0)
    }
}

impl std::iter::Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Quantity {
        iter.fold(Quantity::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
