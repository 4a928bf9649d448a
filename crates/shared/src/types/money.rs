//! Money held as an integer count of minor currency units.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! All ledger arithmetic happens on `i64` minor units (cents). Decimal values
//! only appear at the edges, when amounts enter from or leave towards callers.

use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Number of fractional digits carried by a currency amount.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Minor units per whole currency unit.
pub const MINOR_UNITS_PER_UNIT: i64 = 100;

/// Largest magnitude a single amount may carry, in minor units.
///
/// One hundred billion currency units. Sums of amounts below this bound
/// saturate instead of overflowing.
pub const MAX_MINOR_UNITS: i64 = 10_000_000_000_000;

/// Errors raised when converting a decimal amount into [`Money`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// The amount has more fractional digits than the currency supports.
    #[error("Amount {0} has more than 2 decimal places")]
    TooPrecise(Decimal),

    /// The amount exceeds [`MAX_MINOR_UNITS`] in magnitude.
    #[error("Amount {0} is out of range")]
    OutOfRange(Decimal),
}

/// A signed monetary amount in minor currency units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Largest accepted single amount.
    pub const MAX: Self = Self(MAX_MINOR_UNITS);

    /// Creates an amount from minor units (e.g. cents).
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Creates an amount from whole currency units.
    #[must_use]
    pub const fn from_units(units: i64) -> Self {
        Self(units.saturating_mul(MINOR_UNITS_PER_UNIT))
    }

    /// Converts a decimal amount, rejecting sub-cent precision.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::TooPrecise` if the value has more than two
    /// fractional digits and `MoneyError::OutOfRange` if its magnitude
    /// exceeds [`MAX_MINOR_UNITS`].
    pub fn from_decimal(amount: Decimal) -> Result<Self, MoneyError> {
        let scaled = amount
            .checked_mul(Decimal::from(MINOR_UNITS_PER_UNIT))
            .ok_or(MoneyError::OutOfRange(amount))?;

        if !scaled.fract().is_zero() {
            return Err(MoneyError::TooPrecise(amount));
        }

        let money = scaled
            .to_i64()
            .map(Self)
            .ok_or(MoneyError::OutOfRange(amount))?;
        if !money.is_within_limit() {
            return Err(MoneyError::OutOfRange(amount));
        }
        Ok(money)
    }

    /// Returns the amount in minor units.
    #[must_use]
    pub const fn minor_units(self) -> i64 {
        self.0
    }

    /// Returns the exact decimal value with two fractional digits.
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, MINOR_UNIT_SCALE)
    }

    /// Rounds to whole currency units, half-up towards positive infinity.
    ///
    /// `12.50` becomes `13`, `-12.50` becomes `-12`.
    #[must_use]
    pub const fn round_to_units(self) -> i64 {
        self.0
            .saturating_add(MINOR_UNITS_PER_UNIT / 2)
            .div_euclid(MINOR_UNITS_PER_UNIT)
    }

    /// Returns true if the magnitude is at most [`MAX_MINOR_UNITS`].
    #[must_use]
    pub const fn is_within_limit(self) -> bool {
        self.0.unsigned_abs() <= MAX_MINOR_UNITS.unsigned_abs()
    }

    /// Clamps negative amounts to zero.
    #[must_use]
    pub fn non_negative(self) -> Self {
        self.max(Self::ZERO)
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns true if the amount is strictly positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }
}

// Arithmetic saturates at the `i64` bounds.

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Serialize::serialize(&self.to_decimal(), serializer)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        Self::from_decimal(amount).map_err(serde::de::Error::custom)
    }
}
