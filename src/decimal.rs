//! Fixed-point decimal numbers
//!
//! Stock levels, bill-of-material quantities and monetary values are all held
//! as an integer mantissa plus a count of fractional digits. Nothing in the
//! planner touches floating point, so a plan computed on one machine is
//! bit-identical to the same plan computed anywhere else.
//!
//! ```text
//!   "12.345"  ->  Decimal { mantissa: 12345, scale: 3 }
//!   "100"     ->  Decimal { mantissa: 100,   scale: 0 }
//! ```
//!
//! Addition, subtraction and multiplication are exact. Anything that has to
//! drop digits names its rounding mode: [`Decimal::floor_to`],
//! [`Decimal::round_half_up`] and [`Decimal::checked_div_floor`].
//!
//! The mantissa never wraps. An operation whose result does not fit in an
//! `i128` panics with `decimal overflow`; the catalog caps every stored value
//! at ten significant digits so planning stays far below that bound.

use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Most fractional digits accepted when parsing text.
pub const MAX_PARSE_SCALE: u32 = 9;

/// Most digits (integer + fractional) accepted when parsing text.
const MAX_PARSE_DIGITS: usize = 28;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecimalError {
    #[error("empty decimal")]
    Empty,
    #[error("invalid decimal: {0:?}")]
    Invalid(String),
    #[error("too many fractional digits in {0:?} (max {MAX_PARSE_SCALE})")]
    ScaleTooLarge(String),
    #[error("decimal out of range: {0:?}")]
    OutOfRange(String),
}

/// Exact decimal: `mantissa / 10^scale`.
///
/// Equality and ordering are numeric, so `1.50 == 1.5`. The scale is kept
/// as-is through arithmetic and only shows up in [`fmt::Display`] output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decimal {
    mantissa: i128,
    scale: u32,
}

/// Overflowing the mantissa means a value escaped catalog validation.
#[track_caller]
fn overflow(op: &str) -> ! {
    panic!("decimal overflow in {op}")
}

#[track_caller]
fn pow10(exp: u32) -> i128 {
    10i128.checked_pow(exp).unwrap_or_else(|| overflow("pow10"))
}

impl Decimal {
    pub const ZERO: Decimal = Decimal { mantissa: 0, scale: 0 };

    pub const fn new(mantissa: i128, scale: u32) -> Self {
        Self { mantissa, scale }
    }

    pub const fn scale(&self) -> u32 {
        self.scale
    }

    pub const fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    pub const fn is_positive(&self) -> bool {
        self.mantissa > 0
    }

    pub const fn is_negative(&self) -> bool {
        self.mantissa < 0
    }

    /// Same value with trailing fractional zeros removed.
    pub fn normalize(self) -> Self {
        let mut mantissa = self.mantissa;
        let mut scale = self.scale;
        while scale > 0 && mantissa % 10 == 0 {
            mantissa /= 10;
            scale -= 1;
        }
        Self { mantissa, scale }
    }

    /// Total number of digits in the mantissa, at the current scale.
    ///
    /// `123.450` has precision 6, `0.005` has precision 1.
    pub fn precision(&self) -> u32 {
        self.mantissa.unsigned_abs().checked_ilog10().map_or(1, |d| d + 1)
    }

    /// Number of fractional digits that actually carry information.
    pub fn significant_scale(&self) -> u32 {
        self.normalize().scale
    }

    /// Same value expressed with at least `scale` fractional digits.
    fn widen(self, scale: u32) -> Self {
        if scale <= self.scale {
            return self;
        }
        Self {
            mantissa: self
                .mantissa
                .checked_mul(pow10(scale - self.scale))
                .unwrap_or_else(|| overflow("rescale")),
            scale,
        }
    }

    /// Rewrite both operands at their common (larger) scale.
    fn aligned(self, other: Self) -> (i128, i128, u32) {
        let scale = self.scale.max(other.scale);
        (self.widen(scale).mantissa, other.widen(scale).mantissa, scale)
    }

    /// Round toward negative infinity to exactly `scale` fractional digits.
    pub fn floor_to(self, scale: u32) -> Self {
        if scale >= self.scale {
            return self.widen(scale);
        }
        let divisor = pow10(self.scale - scale);
        Self {
            mantissa: self.mantissa.div_euclid(divisor),
            scale,
        }
    }

    /// Round to exactly `scale` fractional digits, ties away from zero.
    pub fn round_half_up(self, scale: u32) -> Self {
        if scale >= self.scale {
            return self.widen(scale);
        }
        let divisor = pow10(self.scale - scale);
        let mut quotient = self.mantissa / divisor;
        let remainder = self.mantissa % divisor;
        if remainder.abs() * 2 >= divisor {
            quotient += self.mantissa.signum();
        }
        Self {
            mantissa: quotient,
            scale,
        }
    }

    /// `floor(self / rhs)` to exactly `scale` fractional digits.
    ///
    /// Returns `None` when `rhs` is zero.
    ///
    /// # Panics
    ///
    /// Panics if an intermediate value overflows the mantissa.
    pub fn checked_div_floor(self, rhs: Self, scale: u32) -> Option<Self> {
        if rhs.is_zero() {
            return None;
        }
        // self / rhs * 10^scale == (m1 * 10^(s2 + scale)) / (m2 * 10^s1)
        let mut numerator = self
            .mantissa
            .checked_mul(pow10(rhs.scale + scale))
            .unwrap_or_else(|| overflow("division"));
        let mut denominator = rhs
            .mantissa
            .checked_mul(pow10(self.scale))
            .unwrap_or_else(|| overflow("division"));
        if denominator < 0 {
            numerator = -numerator;
            denominator = -denominator;
        }
        Some(Self {
            mantissa: numerator.div_euclid(denominator),
            scale,
        })
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self::new(value as i128, 0)
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b, _) = self.aligned(*other);
        a.cmp(&b)
    }
}

impl Add for Decimal {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        let (a, b, scale) = self.aligned(other);
        Self::new(
            a.checked_add(b).unwrap_or_else(|| overflow("addition")),
            scale,
        )
    }
}

impl AddAssign for Decimal {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Decimal {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        let (a, b, scale) = self.aligned(other);
        Self::new(
            a.checked_sub(b).unwrap_or_else(|| overflow("subtraction")),
            scale,
        )
    }
}

impl SubAssign for Decimal {
    fn sub_assign(&mut self, other: Self) {
        *self = *self - other;
    }
}

impl Mul for Decimal {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        let mantissa = self
            .mantissa
            .checked_mul(other.mantissa)
            .unwrap_or_else(|| overflow("multiplication"));
        Self::new(mantissa, self.scale + other.scale)
    }
}

impl Neg for Decimal {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.mantissa, self.scale)
    }
}

impl Sum for Decimal {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Decimal::ZERO, |acc, d| acc + d)
    }
}

impl<'a> Sum<&'a Decimal> for Decimal {
    fn sum<I: Iterator<Item = &'a Decimal>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let abs = self.mantissa.unsigned_abs();
        if self.scale == 0 {
            return write!(f, "{}{}", sign, abs);
        }
        let divisor = 10u128.pow(self.scale);
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            abs / divisor,
            abs % divisor,
            width = self.scale as usize
        )
    }
}

impl FromStr for Decimal {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.is_empty() {
            return Err(DecimalError::Empty);
        }

        let (negative, unsigned) = match text.as_bytes()[0] {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };

        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((int_part, frac_part)) => (int_part, frac_part),
            None => (unsigned, ""),
        };

        let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if int_part.is_empty()
            || !is_digits(int_part)
            || !is_digits(frac_part)
            || (unsigned.contains('.') && frac_part.is_empty())
        {
            return Err(DecimalError::Invalid(s.to_string()));
        }
        if frac_part.len() > MAX_PARSE_SCALE as usize {
            return Err(DecimalError::ScaleTooLarge(s.to_string()));
        }
        if int_part.len() + frac_part.len() > MAX_PARSE_DIGITS {
            return Err(DecimalError::OutOfRange(s.to_string()));
        }

        let mut mantissa: i128 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            mantissa = mantissa * 10 + i128::from(b - b'0');
        }
        if negative {
            mantissa = -mantissa;
        }

        Ok(Self::new(mantissa, frac_part.len() as u32))
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

impl ToSql for Decimal {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Decimal {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Text(_) => value
                .as_str()?
                .parse()
                .map_err(|e| FromSqlError::Other(Box::new(e))),
            ValueRef::Integer(i) => Ok(Decimal::from(i)),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn parse_and_display_keep_scale() {
        assert_eq!(d("12.345").to_string(), "12.345");
        assert_eq!(d("100").to_string(), "100");
        assert_eq!(d("0.050").to_string(), "0.050");
        assert_eq!(d("-0.5").to_string(), "-0.5");
        assert_eq!(d("+7.25").to_string(), "7.25");
        assert_eq!(d("  3.0 ").scale(), 1);
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert_eq!("".parse::<Decimal>(), Err(DecimalError::Empty));
        assert!(matches!("abc".parse::<Decimal>(), Err(DecimalError::Invalid(_))));
        assert!(matches!("1.".parse::<Decimal>(), Err(DecimalError::Invalid(_))));
        assert!(matches!(".5".parse::<Decimal>(), Err(DecimalError::Invalid(_))));
        assert!(matches!("--1".parse::<Decimal>(), Err(DecimalError::Invalid(_))));
        assert!(matches!("1.2.3".parse::<Decimal>(), Err(DecimalError::Invalid(_))));
        assert!(matches!(
            "0.0000000001".parse::<Decimal>(),
            Err(DecimalError::ScaleTooLarge(_))
        ));
        assert!(matches!(
            "12345678901234567890123456789".parse::<Decimal>(),
            Err(DecimalError::OutOfRange(_))
        ));
    }

    #[test]
    fn equality_ignores_scale() {
        assert_eq!(d("1.50"), d("1.5"));
        assert_eq!(d("10.000"), Decimal::from(10));
        assert!(d("0.999") < d("1"));
        assert!(d("-2") < d("-1.5"));
        assert_eq!(d("2.500").significant_scale(), 1);
    }

    #[test]
    fn arithmetic_is_exact() {
        assert_eq!((d("0.1") + d("0.2")).to_string(), "0.3");
        assert_eq!((d("100") - d("33.333")).to_string(), "66.667");
        assert_eq!((d("10.000") * d("2.5")).to_string(), "25.0000");
        let total: Decimal = [d("1.25"), d("2.50"), d("0.25")].iter().sum();
        assert_eq!(total.to_string(), "4.00");
    }

    #[test]
    fn floor_truncates_toward_negative_infinity() {
        assert_eq!(d("3.3339").floor_to(3).to_string(), "3.333");
        assert_eq!(d("-3.3331").floor_to(3).to_string(), "-3.334");
        assert_eq!(d("5").floor_to(3).to_string(), "5.000");
    }

    #[test]
    fn round_half_up_breaks_ties_away_from_zero() {
        assert_eq!(d("0.125").round_half_up(2).to_string(), "0.13");
        assert_eq!(d("0.124").round_half_up(2).to_string(), "0.12");
        assert_eq!(d("-0.125").round_half_up(2).to_string(), "-0.13");
        assert_eq!(d("1000.00000").round_half_up(2).to_string(), "1000.00");
        assert_eq!(d("7").round_half_up(2).to_string(), "7.00");
    }

    #[test]
    fn division_floors_to_requested_scale() {
        let q = d("100").checked_div_floor(d("3"), 3).unwrap();
        assert_eq!(q.to_string(), "33.333");

        let q = d("150.000").checked_div_floor(d("10.000"), 3).unwrap();
        assert_eq!(q.to_string(), "15.000");

        let q = d("2").checked_div_floor(d("3"), 3).unwrap();
        assert_eq!(q.to_string(), "0.666");

        let q = d("0.000").checked_div_floor(d("10"), 3).unwrap();
        assert_eq!(q.to_string(), "0.000");

        assert_eq!(d("1").checked_div_floor(Decimal::ZERO, 3), None);
    }

    #[test]
    fn precision_counts_mantissa_digits() {
        assert_eq!(d("123.450").precision(), 6);
        assert_eq!(d("0.005").precision(), 1);
        assert_eq!(d("0").precision(), 1);
        assert_eq!(d("-99999999.99").precision(), 10);
    }

    #[test]
    #[should_panic(expected = "decimal overflow in multiplication")]
    fn multiplication_overflow_panics_instead_of_wrapping() {
        let big = d("9999999999999999999999999.99");
        let _ = big * d("9999999999999999999999.999");
    }

    #[test]
    #[should_panic(expected = "decimal overflow")]
    fn division_overflow_panics_instead_of_wrapping() {
        let big = d("9999999999999999999999999999");
        let _ = big.checked_div_floor(d("0.000000001"), 9);
    }

    #[test]
    fn serde_uses_strings() {
        let json = serde_json::to_string(&d("1000.00")).unwrap();
        assert_eq!(json, "\"1000.00\"");
        let back: Decimal = serde_json::from_str("\"12.500\"").unwrap();
        assert_eq!(back.to_string(), "12.500");
        assert!(serde_json::from_str::<Decimal>("\"x\"").is_err());
    }
}
