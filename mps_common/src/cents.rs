use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// Currency the gateway debits and settles in.
pub const LOCAL_CURRENCY_CODE: &str = "VES";
/// Currency the marketplace prices its catalogue in.
pub const REFERENCE_CURRENCY_CODE: &str = "USD";

//--------------------------------------       Cents         ---------------------------------------------------------
/// An amount of money in hundredths of a currency unit.
///
/// Every amount that is matched, compared or written to the ledger is a `Cents`. Keeping money as an integer means that
/// "equal to two decimal places" is plain equality and that repeated fee applications never drift.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
op!(inplace Cents, AddAssign, add_assign);
op!(inplace Cents, SubAssign, sub_assign);
op!(unary Cents, Neg, neg);

impl Mul<i64> for Cents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a Cents> for Cents {
    fn sum<I: Iterator<Item = &'a Cents>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Value cannot be represented as an amount in cents: {0}")]
pub struct CentsConversionError(String);

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<f64> for Cents {
    type Error = CentsConversionError;

    /// Rounds to the nearest cent, halves away from zero.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let scaled = (value * 100.0).round();
        if !scaled.is_finite() || scaled.abs() > i64::MAX as f64 {
            return Err(CentsConversionError(format!("{value} is out of range")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(scaled as i64))
    }
}

impl FromStr for Cents {
    type Err = CentsConversionError;

    /// Parses a plain decimal string such as `1500`, `1500.5` or `-12.345`. Digits beyond the second decimal place
    /// are rounded, halves away from zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
            return Err(CentsConversionError(format!("'{s}' is not a decimal amount")));
        }
        let whole = if whole.is_empty() {
            0
        } else {
            whole.parse::<i64>().map_err(|e| CentsConversionError(format!("'{s}': {e}")))?
        };
        let mut frac_digits = frac.bytes().map(|b| i64::from(b - b'0'));
        let tenths = frac_digits.next().unwrap_or(0);
        let hundredths = frac_digits.next().unwrap_or(0);
        let round_up = i64::from(frac_digits.next().is_some_and(|d| d >= 5));
        let cents = whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(tenths * 10 + hundredths + round_up))
            .ok_or_else(|| CentsConversionError(format!("'{s}' is out of range")))?;
        Ok(Self(if negative { -cents } else { cents }))
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Cents {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Whole currency units, e.g. `Cents::from_units(15) == Cents::from(1500)`
    pub fn from_units(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// The absolute difference between two amounts. Saturates at `i64::MAX` cents.
    pub fn abs_diff(&self, other: Cents) -> Cents {
        Self(i64::try_from(self.0.abs_diff(other.0)).unwrap_or(i64::MAX))
    }

    /// Multiplies the amount by `numerator / denominator` and rounds to the nearest cent, halves away from zero.
    ///
    /// `denominator` must be positive. Fails if the result does not fit in an `i64`.
    pub fn scale(&self, numerator: i64, denominator: i64) -> Result<Cents, CentsConversionError> {
        let rounded = scale_rounded(self.0, numerator, denominator);
        i64::try_from(rounded)
            .map(Self)
            .map_err(|_| CentsConversionError(format!("{self} * {numerator} / {denominator} is out of range")))
    }

    /// Applies a rate expressed in basis points (1/100th of a percent). 6.8% is 680 bps.
    ///
    /// The rate is clamped to 0..=10000 bps, so the result is never larger in magnitude than the amount.
    pub fn apply_bps(&self, bps: i64) -> Cents {
        let rounded = scale_rounded(self.0, bps.clamp(0, MAX_BPS), MAX_BPS);
        #[allow(clippy::cast_possible_truncation)]
        Self(rounded as i64)
    }
}

/// 100%, in basis points.
const MAX_BPS: i64 = 10_000;

fn scale_rounded(value: i64, numerator: i64, denominator: i64) -> i128 {
    let n = i128::from(value) * i128::from(numerator);
    let d = i128::from(denominator.max(1));
    let q = n / d;
    let r = n % d;
    if r.abs() * 2 >= d {
        q + n.signum()
    } else {
        q
    }
}
