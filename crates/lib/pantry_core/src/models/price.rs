//! Fixed-point recipe price.
//!
//! Prices are decimals with at most 5 digits, 2 of them after the decimal
//! point, and are never negative. They are held as integer cents and rendered
//! with exactly two decimal places (`"3.50"`).

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Maximum total number of significant digits.
pub const MAX_DIGITS: usize = 5;

/// Maximum number of digits after the decimal point.
pub const DECIMAL_PLACES: usize = 2;

/// A non-negative price stored as cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(i32);

/// Reasons a price string is rejected. Messages are client-facing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error("A valid number is required.")]
    Invalid,

    #[error("Ensure that there are no more than 5 digits in total.")]
    TooManyDigits,

    #[error("Ensure that there are no more than 2 decimal places.")]
    TooManyDecimalPlaces,

    #[error("Ensure that there are no more than 3 digits before the decimal point.")]
    TooManyWholeDigits,

    #[error("Ensure this value is greater than or equal to 0.")]
    Negative,
}

impl Price {
    /// Build a price from cents. Fails for negative or out-of-range amounts.
    pub fn from_cents(cents: i32) -> Result<Self, PriceError> {
        if cents < 0 {
            return Err(PriceError::Negative);
        }
        if cents >= 10_i32.pow(MAX_DIGITS as u32) {
            return Err(PriceError::TooManyWholeDigits);
        }
        Ok(Price(cents))
    }

    pub fn cents(self) -> i32 {
        self.0
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, unsigned) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };

        let (whole, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
            return Err(PriceError::Invalid);
        }

        let significant_whole = whole.trim_start_matches('0');
        if significant_whole.len() + frac.len() > MAX_DIGITS {
            return Err(PriceError::TooManyDigits);
        }
        if frac.len() > DECIMAL_PLACES {
            return Err(PriceError::TooManyDecimalPlaces);
        }
        if significant_whole.len() > MAX_DIGITS - DECIMAL_PLACES {
            return Err(PriceError::TooManyWholeDigits);
        }

        let whole_value: i32 = if significant_whole.is_empty() {
            0
        } else {
            significant_whole.parse().map_err(|_| PriceError::Invalid)?
        };
        let frac_value: i32 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i32>().map_err(|_| PriceError::Invalid)? * 10,
            _ => frac.parse().map_err(|_| PriceError::Invalid)?,
        };

        let cents = whole_value * 100 + frac_value;
        if negative && cents > 0 {
            return Err(PriceError::Negative);
        }
        Ok(Price(cents))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
