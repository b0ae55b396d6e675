//! Exact decimal numbers using dashu
//!
//! Cell arithmetic never goes through binary floating point. Values are
//! held as dashu-float `DBig` (base 10, round half away from zero) at a
//! fixed working precision, and rendered back to text digit by digit.

use dashu_float::DBig;
use dashu_int::IBig;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use thiserror::Error;

/// Error type for number operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumberError {
    #[error("Invalid number format: {0}")]
    ParseError(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Overflow: result too large")]
    Overflow,
}

/// Working precision for calculations (decimal digits)
const DEFAULT_PRECISION: usize = 50;

/// Significant digits kept on a quotient unless configured otherwise
pub const DEFAULT_DIVISION_DIGITS: usize = 20;

/// Largest decimal exponent accepted when parsing. Rendering writes every
/// digit out, so the exponent bounds the size of the text.
pub const MAX_EXPONENT: isize = 1000;

/// Arbitrary precision decimal number
#[derive(Debug, Clone)]
pub struct Number {
    inner: DBig,
}

impl Number {
    // ========== Construction ==========

    fn with_work_precision(val: DBig) -> DBig {
        val.with_precision(DEFAULT_PRECISION).value()
    }

    /// Parse a plain decimal: optional sign, digits with an optional
    /// fraction, optional exponent. `"12"`, `"-0.5"`, `".25"`, `"1.5e3"`.
    pub fn from_str(s: &str) -> Result<Self, NumberError> {
        let text = s.trim();
        let invalid = || NumberError::ParseError(text.to_string());

        let (negative, unsigned) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };

        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(pos) => {
                let exp: isize = unsigned[pos + 1..].parse().map_err(|_| invalid())?;
                if exp.unsigned_abs() > MAX_EXPONENT.unsigned_abs() {
                    return Err(NumberError::Overflow);
                }
                (&unsigned[..pos], exp)
            }
            None => (unsigned, 0),
        };

        let (integer, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (integer.is_empty() && fraction.is_empty()) || !all_digits(integer) || !all_digits(fraction) {
            return Err(invalid());
        }

        let sign = if negative { "-" } else { "" };
        let significand: IBig = format!("{}{}{}", sign, integer, fraction)
            .parse()
            .map_err(|_| invalid())?;
        let exponent = isize::try_from(fraction.len())
            .ok()
            .and_then(|scale| exponent.checked_sub(scale))
            .ok_or(NumberError::Overflow)?;

        Ok(Self { inner: Self::with_work_precision(DBig::from_parts(significand, exponent)) })
    }

    /// Create from i64 with working precision
    pub fn from_i64(n: i64) -> Self {
        Self { inner: Self::with_work_precision(DBig::from(n)) }
    }

    pub fn zero() -> Self {
        Self::from_i64(0)
    }

    // ========== Predicates ==========

    pub fn is_zero(&self) -> bool {
        self.inner == DBig::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.inner < DBig::ZERO
    }

    pub fn is_integer(&self) -> bool {
        let floor_val = self.inner.clone().floor();
        self.inner == floor_val
    }

    // ========== Basic Arithmetic ==========

    pub fn add(&self, other: &Self) -> Self {
        Self { inner: &self.inner + &other.inner }
    }

    pub fn sub(&self, other: &Self) -> Self {
        Self { inner: &self.inner - &other.inner }
    }

    pub fn mul(&self, other: &Self) -> Self {
        Self { inner: &self.inner * &other.inner }
    }

    /// Division at working precision
    pub fn checked_div(&self, other: &Self) -> Result<Self, NumberError> {
        if other.is_zero() {
            Err(NumberError::DivisionByZero)
        } else {
            Ok(Self { inner: &self.inner / &other.inner })
        }
    }

    /// Division rounded half away from zero to `digits` significant digits.
    ///
    /// `1 / 7` at 20 digits is `0.14285714285714285714`.
    pub fn div_rounded(&self, other: &Self, digits: usize) -> Result<Self, NumberError> {
        let quotient = self.checked_div(other)?;
        let rounded = quotient.inner.with_precision(digits.max(1)).value();
        Ok(Self { inner: Self::with_work_precision(rounded) })
    }

    // ========== Other Operations ==========

    /// Floor - largest integer <= x
    pub fn floor(&self) -> Self {
        Self { inner: self.inner.clone().floor() }
    }

    /// Ceiling - smallest integer >= x
    pub fn ceil(&self) -> Self {
        Self { inner: self.inner.clone().ceil() }
    }

    /// Drop the fractional part, rounding toward zero
    pub fn trunc(&self) -> Self {
        if self.is_negative() {
            self.ceil()
        } else {
            self.floor()
        }
    }

    /// Try to convert to i64
    pub fn to_i64(&self) -> Option<i64> {
        if !self.is_integer() {
            return None;
        }

        // DBig stores as significand * 10^exponent
        let (significand, exponent) = self.inner.clone().into_repr().into_parts();
        let sig_i64: i64 = significand.try_into().ok()?;

        if exponent == 0 {
            Some(sig_i64)
        } else if exponent > 0 && exponent <= 18 {
            sig_i64.checked_mul(10_i64.checked_pow(exponent as u32)?)
        } else if exponent < 0 && exponent >= -18 {
            let divisor = 10_i64.checked_pow((-exponent) as u32)?;
            if sig_i64 % divisor == 0 {
                Some(sig_i64 / divisor)
            } else {
                None
            }
        } else if sig_i64 == 0 {
            Some(0)
        } else {
            None
        }
    }

    // ========== Display ==========

    /// Sign, integer digits and fraction digits of the exact value.
    fn decimal_parts(&self) -> (bool, String, String) {
        let (significand, exponent) = self.inner.clone().into_repr().into_parts();
        let text = significand.to_string();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest.to_string()),
            None => (false, text),
        };

        if exponent >= 0 {
            let mut integer = digits;
            integer.push_str(&"0".repeat(exponent.unsigned_abs()));
            return (negative, integer, String::new());
        }

        let scale = exponent.unsigned_abs();
        if digits.len() > scale {
            let (integer, fraction) = digits.split_at(digits.len() - scale);
            (negative, integer.to_string(), fraction.to_string())
        } else {
            let mut fraction = "0".repeat(scale - digits.len());
            fraction.push_str(&digits);
            (negative, "0".to_string(), fraction)
        }
    }

    /// Canonical decimal text: no exponent, no trailing fraction zeros,
    /// no negative zero. `4.50` renders as `4.5`, `9.0` as `9`.
    pub fn to_canonical_string(&self) -> String {
        let (negative, integer, fraction) = self.decimal_parts();
        let integer = match integer.trim_start_matches('0') {
            "" => "0",
            trimmed => trimmed,
        };
        let fraction = fraction.trim_end_matches('0');

        let mut out = String::new();
        if negative && !(integer == "0" && fraction.is_empty()) {
            out.push('-');
        }
        out.push_str(integer);
        if !fraction.is_empty() {
            out.push('.');
            out.push_str(fraction);
        }
        out
    }

    /// Exactly `places` fraction digits, rounded half away from zero.
    pub fn to_fixed(&self, places: usize) -> String {
        let (negative, integer, mut fraction) = self.decimal_parts();
        let round_up = fraction.as_bytes().get(places).is_some_and(|d| *d >= b'5');
        fraction.truncate(places);
        while fraction.len() < places {
            fraction.push('0');
        }

        let mut digits: Vec<u8> = integer.bytes().chain(fraction.bytes()).collect();
        if round_up {
            let mut carried = true;
            for digit in digits.iter_mut().rev() {
                if *digit == b'9' {
                    *digit = b'0';
                } else {
                    *digit += 1;
                    carried = false;
                    break;
                }
            }
            if carried {
                digits.insert(0, b'1');
            }
        }

        let split = digits.len() - places;
        let integer: String = digits[..split].iter().map(|d| *d as char).collect();
        let integer = match integer.trim_start_matches('0') {
            "" => "0".to_string(),
            trimmed => trimmed.to_string(),
        };
        let fraction: String = digits[split..].iter().map(|d| *d as char).collect();

        let mut out = String::new();
        if negative && digits.iter().any(|d| *d != b'0') {
            out.push('-');
        }
        out.push_str(&integer);
        if places > 0 {
            out.push('.');
            out.push_str(&fraction);
        }
        out
    }
}

// ========== Trait Implementations ==========

impl std::str::FromStr for Number {
    type Err = NumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Number::from_str(s)
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical_string())
    }
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        // DBig implements PartialOrd, use it and treat None as Equal
        self.inner.partial_cmp(&other.inner).unwrap_or(Ordering::Equal)
    }
}
