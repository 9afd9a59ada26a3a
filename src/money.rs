//! Currency-agnostic signed integer cents, used for every amount that
//! crosses a module boundary in the pipeline (`amountCents`, `minAmountCents`,
//! `maxAmountCents`, ...).
//!
//! Generalizes the teacher's `GbpValue`/`UnsignedGbpValue` pair: the data
//! model carries a `currency` string per account rather than a single
//! hard-coded commodity, so the type itself no longer bakes in "GBP".

use std::convert::TryFrom;
use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MoneyError {
    #[error("overflow converting value {value} to unsigned cents")]
    Overflow { value: i64 },
    #[error("negative value {value} cents in a context requiring non-negative")]
    Negative { value: i64 },
}

/// Signed amount in minor units (cents). Positive is `in`, non-positive is `out`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Cents(pub i64);

impl Cents {
    pub fn from_parts(units: i64, minor: i64) -> Self {
        Cents(units * 100 + minor)
    }

    pub fn parts(&self) -> (i64, i64) {
        (self.0 / 100, self.0.abs() % 100)
    }

    /// Per the sign/direction invariant: `sign(amountCents) <= 0 <=> direction == out`.
    pub fn is_outflow(&self) -> bool {
        self.0 <= 0
    }

    pub fn abs(&self) -> UnsignedCents {
        UnsignedCents(self.0.unsigned_abs())
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (units, minor) = self.parts();
        write!(f, "{}.{:02}", units, minor)
    }
}

impl std::ops::Neg for Cents {
    type Output = Self;

    fn neg(self) -> Self {
        Cents(-self.0)
    }
}

impl std::ops::Sub for Cents {
    type Output = i64;

    fn sub(self, rhs: Self) -> i64 {
        self.0 - rhs.0
    }
}

/// Non-negative amount in minor units, used for thresholds
/// (`minAmountCents`/`maxAmountCents`) where a negative value is nonsensical.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct UnsignedCents(pub u64);

impl UnsignedCents {
    pub fn new(value: u64) -> Self {
        UnsignedCents(value)
    }
}

impl fmt::Display for UnsignedCents {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl TryFrom<Cents> for UnsignedCents {
    type Error = MoneyError;

    fn try_from(value: Cents) -> Result<Self, Self::Error> {
        u64::try_from(value.0)
            .map(UnsignedCents)
            .map_err(|_| MoneyError::Negative { value: value.0 })
    }
}

impl TryFrom<UnsignedCents> for Cents {
    type Error = MoneyError;

    fn try_from(value: UnsignedCents) -> Result<Self, Self::Error> {
        i64::try_from(value.0)
            .map(Cents)
            .map_err(|_| MoneyError::Overflow {
                value: value.0 as i64,
            })
    }
}
