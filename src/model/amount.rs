//! Amount type for handling monetary values as they arrive from the accounting service and as they
//! are written to reports.
//!
//! This module provides the `Amount` type which wraps `Decimal` and handles parsing values that may
//! or may not include a euro sign and thousands separators.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Represents how euro amounts were (or should be) formatted.
///
/// # Examples
///  - `AmountFormat{ euro: true, commas: true }` -> `-60,000.00 €`
///  - `AmountFormat{ euro: false, commas: true }` -> `-60,000.00`
///  - `AmountFormat{ euro: false, commas: false }` -> `-60000.00`
///  - `AmountFormat{ euro: true, commas: false }` -> `-60000.00 €`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AmountFormat {
    /// Whether a euro sign is present in the formatting.
    euro: bool,
    /// Whether commas are present as thousands separators in the formatting.
    commas: bool,
}

impl Default for AmountFormat {
    fn default() -> Self {
        PLAIN_FORMAT
    }
}

/// The format used by the sevDesk API: e.g. `-60000.00`.
const PLAIN_FORMAT: AmountFormat = AmountFormat {
    euro: false,
    commas: false,
};

/// The format used in reports: e.g. `-60,000.00 €`.
pub const REPORT_FORMAT: AmountFormat = AmountFormat {
    euro: true,
    commas: true,
};

/// Represents a signed euro amount. Positive amounts are incoming money.
///
/// Formatting is considered significant for the purposes of equality, so for numeric comparisons,
/// you should access the `Decimal` value and use that.
///
/// # Examples
///
/// ```
/// # use voucher_sync::model::Amount;
/// # use std::str::FromStr;
/// let a = Amount::from_str("-5000.00").unwrap();
/// let b = Amount::from_str("-5,000.00 €").unwrap();
/// assert_ne!(a, b);
/// assert_eq!(a.value(), b.value());
/// assert_eq!(b.to_string(), "-5,000.00 €");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount {
    /// The parsed numerical value.
    value: Decimal,
    /// The way the numerical value was parsed from, or should be written to, a `String`.
    format: AmountFormat,
}

impl Amount {
    /// Creates a new Amount from a Decimal value with the plain API formatting.
    pub const fn new(value: Decimal) -> Self {
        Self {
            value,
            format: PLAIN_FORMAT,
        }
    }

    /// Creates a new Amount from a Decimal value with the specified formatting.
    pub const fn new_with_format(value: Decimal, format: AmountFormat) -> Self {
        Self { value, format }
    }

    /// Returns the same value with a different format.
    pub fn with_format(self, format: AmountFormat) -> Self {
        Self { format, ..self }
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Returns the absolute value, keeping the format.
    pub fn abs(&self) -> Self {
        Self {
            value: self.value.abs(),
            format: self.format,
        }
    }

    /// Returns the value as an `f64` for JSON payloads, rounded to cents.
    pub fn to_f64(&self) -> f64 {
        self.value.round_dp(2).to_f64().unwrap_or_default()
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.value().is_zero()
    }

    /// Returns true if the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.value().is_sign_positive()
    }

    /// Returns true if the amount is strictly negative.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.value().is_sign_negative()
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Amount::new_with_format(self.value + rhs.value, self.format)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::default(), |acc, a| acc + a)
    }
}

/// An error that can occur when parsing strings into `Decimal` values.
pub struct AmountError(rust_decimal::Error);

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Ok(Amount::default());
        }

        // The euro sign may trail ("50.00 €") or lead ("€50.00").
        let without_euro = trimmed
            .trim_end_matches('€')
            .trim_end()
            .replacen('€', "", 1);
        let euro = without_euro.len() < trimmed.len();

        // Remove commas (thousand separators)
        let without_commas = without_euro.replace(',', "");
        let commas = without_commas.len() < without_euro.len();

        let value = Decimal::from_str(without_commas.trim()).map_err(AmountError)?;
        Ok(Amount {
            value,
            format: AmountFormat { euro, commas },
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sign, num) = if self.is_negative() {
            ("-", self.value().abs())
        } else {
            ("", self.value())
        };

        let euro = if self.format.euro { " €" } else { "" };

        if self.format.commas {
            write!(
                f,
                "{sign}{}{euro}",
                format_num::format_num!(",.2", num.to_f64().unwrap_or_default())
            )
        } else {
            write!(f, "{sign}{:.2}{euro}", num)
        }
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}
