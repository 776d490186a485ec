//! Decimal price type with cent-exact arithmetic.
//!
//! The remote service serializes every monetary value as a decimal string
//! (e.g. `"12.50"`), and cart math must not drift the way binary floats do.
//! [`Price`] wraps [`rust_decimal::Decimal`] and rounds to cents only at the
//! points the user actually sees an amount: per-line totals and the order
//! total.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A monetary amount in the shop currency.
///
/// Serialized as a decimal string on the wire (`"12.50"`), matching the
/// remote service's representation.
///
/// ## Examples
///
/// ```
/// use blossom_core::Price;
/// use rust_decimal::Decimal;
///
/// let unit = Price::new(Decimal::new(1250, 2)); // 12.50
/// assert_eq!(unit.line_total(2).to_string(), "$25.00");
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(#[serde(with = "rust_decimal::serde::str")] Decimal);

impl Price {
    /// A zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a raw decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from an integer number of cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// This amount rounded to cents (half-away-from-zero).
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Total for `quantity` units at this unit price, rounded to cents.
    ///
    /// Each line is rounded independently so the cart total matches the sum
    /// of the per-line amounts the user sees.
    #[must_use]
    pub fn line_total(&self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity)).rounded()
    }

    /// Whether this amount is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}
