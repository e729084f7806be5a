//! Money types
//!
//! All amounts are integer cents. Balances, rates, and charges never touch
//! floating point; commission splits use basis points so the advisor/platform
//! division is exact integer math.

use serde::{Deserialize, Serialize};

/// A monetary amount in integer cents
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(pub i64);

impl Amount {
    /// Zero cents
    pub const ZERO: Self = Self(0);

    /// Create an amount from integer cents
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// The amount in integer cents
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Whether the amount is below zero
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Whether the amount is exactly zero
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Checked multiplication by a scalar (e.g. minutes billed)
    pub fn checked_mul(self, factor: i64) -> Option<Self> {
        self.0.checked_mul(factor).map(Self)
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// Platform commission rate in basis points (1/100th of a percent)
///
/// Stored as basis points so e.g. a 20% commission is exactly 2000 and the
/// advisor share of any charge is computed without rounding surprises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommissionRate(u32);

impl CommissionRate {
    /// Create a commission rate from basis points (0..=10000)
    pub fn from_basis_points(bps: u32) -> Result<Self, InvalidCommission> {
        if bps > 10_000 {
            return Err(InvalidCommission(bps));
        }
        Ok(Self(bps))
    }

    /// The rate in basis points
    pub const fn basis_points(self) -> u32 {
        self.0
    }

    /// The advisor's share of a charge, net of commission (floor division)
    ///
    /// `charge` is non-negative; the share never exceeds the charge, so the
    /// narrowing cast is lossless.
    pub fn advisor_share(self, charge: Amount) -> Amount {
        let keep = i128::from(10_000 - self.0);
        let cents = (i128::from(charge.cents()) * keep) / 10_000;
        Amount(cents as i64)
    }

    /// The platform's share of a charge (the remainder after the advisor
    /// share)
    pub fn platform_fee(self, charge: Amount) -> Amount {
        Amount(charge.cents() - self.advisor_share(charge).cents())
    }
}

impl std::fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

/// Commission rate outside the valid basis-point range
#[derive(Debug, thiserror::Error)]
#[error("commission rate {0} basis points exceeds the 10000 maximum")]
pub struct InvalidCommission(pub u32);
