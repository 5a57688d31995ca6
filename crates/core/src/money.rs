//! Monetary amounts and fractional rates.
//!
//! Amounts are held as integer minor units (two decimal places) and rates as
//! integer ten-thousandths, so every calculation is exact. The only place a
//! rounding decision is made is [`Money::apply_rate`], which rounds half-up
//! (ties away from zero) to the cent. Fee and commission calculations both go
//! through it, which keeps quotes, frozen order fees and report totals in the
//! same rounded domain.

use core::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

const MONEY_DECIMALS: u32 = 2;
const RATE_DECIMALS: u32 = 4;

/// An amount in minor currency units (1 major unit = 100 minor units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Whole major units, e.g. `from_major(1000)` is `1000.00`.
    pub const fn from_major(major: i64) -> Self {
        Self(major * 100)
    }

    pub const fn minor_units(&self) -> i64 {
        self.0
    }

    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parse a decimal string with at most two fractional digits.
    pub fn parse(s: &str) -> DomainResult<Self> {
        let minor = parse_fixed(s, MONEY_DECIMALS, "amount")?;
        let minor = i64::try_from(minor)
            .map_err(|_| DomainError::validation(format!("amount out of range: {s}")))?;
        Ok(Self(minor))
    }

    /// Parse and require the amount to be `>= 0`.
    pub fn parse_non_negative(s: &str) -> DomainResult<Self> {
        let money = Self::parse(s)?;
        if money.is_negative() {
            return Err(DomainError::validation("amount must not be negative"));
        }
        Ok(money)
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::invariant("monetary overflow"))
    }

    pub fn checked_mul(self, quantity: u32) -> DomainResult<Money> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Money)
            .ok_or_else(|| DomainError::invariant("monetary overflow"))
    }

    /// `self * rate`, rounded half-up to the cent.
    pub fn apply_rate(self, rate: Rate) -> Money {
        let product = i128::from(self.0) * i128::from(rate.0);
        let scale = i128::from(Rate::SCALE);
        let quotient = product / scale;
        let remainder = product % scale;
        let rounded = if remainder.abs() * 2 >= scale {
            quotient + product.signum()
        } else {
            quotient
        };
        // |rate| <= 1, so the result never exceeds |self|.
        Money(rounded as i64)
    }

    /// Sum amounts, failing on overflow.
    pub fn sum<I: IntoIterator<Item = Money>>(items: I) -> DomainResult<Money> {
        items
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = deserializer.deserialize_any(DecimalVisitor)?;
        Money::parse(&raw).map_err(de::Error::custom)
    }
}

/// A fraction in `[0, 1]` with four decimal places (e.g. `0.0500` for 5%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Rate(u32);

impl ValueObject for Rate {}

impl Rate {
    pub const SCALE: u32 = 10_000;
    pub const ZERO: Rate = Rate(0);

    pub fn from_ten_thousandths(units: u32) -> DomainResult<Self> {
        if units > Self::SCALE {
            return Err(DomainError::validation("rate must be between 0 and 1"));
        }
        Ok(Self(units))
    }

    pub const fn ten_thousandths(&self) -> u32 {
        self.0
    }

    /// Parse a fraction such as `"0.05"`.
    pub fn parse(s: &str) -> DomainResult<Self> {
        let units = parse_fixed(s, RATE_DECIMALS, "rate")?;
        let units = u32::try_from(units)
            .map_err(|_| DomainError::validation("rate must be between 0 and 1"))?;
        Self::from_ten_thousandths(units)
    }

    /// Parse a percentage in `[0, 100]` with at most two decimals (`"12.5"` is `0.1250`).
    pub fn parse_percent(s: &str) -> DomainResult<Self> {
        let hundredths = parse_fixed(s, 2, "percentage")?;
        if !(0..=10_000).contains(&hundredths) {
            return Err(DomainError::validation("percentage must be between 0 and 100"));
        }
        Self::from_ten_thousandths(hundredths as u32)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:04}", self.0 / Self::SCALE, self.0 % Self::SCALE)
    }
}

impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = deserializer.deserialize_any(DecimalVisitor)?;
        Rate::parse(&raw).map_err(de::Error::custom)
    }
}

/// Accepts JSON numbers or strings and hands back their decimal text.
struct DecimalVisitor;

impl<'de> Visitor<'de> for DecimalVisitor {
    type Value = String;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal number or decimal string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
        if !v.is_finite() {
            return Err(E::custom("decimal must be finite"));
        }
        Ok(v.to_string())
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
        Ok(v.to_string())
    }
}

/// Parse a decimal string into an integer scaled by `10^decimals`.
fn parse_fixed(s: &str, decimals: u32, what: &str) -> DomainResult<i128> {
    let s = s.trim();
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    let (whole, frac) = match body.split_once('.') {
        Some((w, f)) => (w, f),
        None => (body, ""),
    };

    let digits_only = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !digits_only(whole) || !digits_only(frac) {
        return Err(DomainError::validation(format!("{what} is not a decimal number: {s:?}")));
    }
    if frac.len() > decimals as usize {
        return Err(DomainError::validation(format!(
            "{what} allows at most {decimals} decimal places: {s:?}"
        )));
    }

    let overflow = || DomainError::validation(format!("{what} out of range: {s:?}"));
    let mut value: i128 = 0;
    for b in whole.bytes().chain(frac.bytes()) {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(i128::from(b - b'0')))
            .ok_or_else(overflow)?;
    }
    for _ in frac.len()..decimals as usize {
        value = value.checked_mul(10).ok_or_else(overflow)?;
    }

    Ok(if negative { -value } else { value })
}
