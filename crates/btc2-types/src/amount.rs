//! BTC2 amounts in atomic units.
//!
//! The backend speaks JSON decimals in whole coins; everything inside the
//! wallet works on integer atomic units so fee checks are exact.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Atomic units per coin (10^8).
pub const COIN: u64 = 100_000_000;

/// Number of decimal places for display.
pub const DISPLAY_DECIMAL_POINT: u32 = 8;

/// Reasons an amount string or number is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("not a decimal number: {0}")]
    Malformed(String),

    #[error("more than {} decimal places", DISPLAY_DECIMAL_POINT)]
    TooPrecise,

    #[error("amount out of range")]
    Overflow,

    #[error("amount must not be negative")]
    Negative,
}

/// A non-negative amount of BTC2, stored in atomic units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_atomic(atomic: u64) -> Self {
        Self(atomic)
    }

    pub const fn atomic(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Convert a coin-denominated float from the backend, rounding to the
    /// nearest atomic unit.
    pub fn from_coins(coins: f64) -> Result<Self, AmountError> {
        if !coins.is_finite() {
            return Err(AmountError::Malformed(coins.to_string()));
        }
        if coins < 0.0 {
            return Err(AmountError::Negative);
        }
        let atomic = (coins * COIN as f64).round();
        if atomic > u64::MAX as f64 {
            return Err(AmountError::Overflow);
        }
        Ok(Self(atomic as u64))
    }

    /// Coin-denominated float for the wire.
    pub fn to_coins(self) -> f64 {
        self.0 as f64 / COIN as f64
    }

    /// Parse user input such as `"1.5"` or `"0.00010000"`.
    pub fn parse(s: &str) -> Result<Self, AmountError> {
        parse_amount(s).map(Self)
    }

    /// Fixed eight-decimal rendering used wherever a fee or total is quoted.
    pub fn to_fixed(self) -> String {
        format!("{}.{:08}", self.0 / COIN, self.0 % COIN)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_amount(self.0))
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_coins())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let coins = deserializer.deserialize_any(CoinsVisitor)?;
        Amount::from_coins(coins).map_err(de::Error::custom)
    }
}

/// A signed amount, as found in transaction history (sends are negative).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SignedAmount(i64);

impl SignedAmount {
    pub const fn from_atomic(atomic: i64) -> Self {
        Self(atomic)
    }

    pub const fn atomic(self) -> i64 {
        self.0
    }

    pub fn abs(self) -> Amount {
        Amount(self.0.unsigned_abs())
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn from_coins(coins: f64) -> Result<Self, AmountError> {
        let magnitude = Amount::from_coins(coins.abs())?;
        let atomic = i64::try_from(magnitude.atomic()).map_err(|_| AmountError::Overflow)?;
        Ok(Self(if coins < 0.0 { -atomic } else { atomic }))
    }

    pub fn to_coins(self) -> f64 {
        self.0 as f64 / COIN as f64
    }
}

impl fmt::Display for SignedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            f.write_str("-")?;
        }
        f.write_str(&format_amount(self.0.unsigned_abs()))
    }
}

impl Serialize for SignedAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_coins())
    }
}

impl<'de> Deserialize<'de> for SignedAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let coins = deserializer.deserialize_any(CoinsVisitor)?;
        SignedAmount::from_coins(coins).map_err(de::Error::custom)
    }
}

/// Accepts JSON numbers or numeric strings.
struct CoinsVisitor;

impl<'de> Visitor<'de> for CoinsVisitor {
    type Value = f64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a coin amount as a number or numeric string")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
        v.trim().parse::<f64>().map_err(E::custom)
    }
}

/// Format an atomic amount as a trimmed human-readable string (e.g. 1.5).
pub fn format_amount(atomic: u64) -> String {
    let whole = atomic / COIN;
    let frac = atomic % COIN;
    if frac == 0 {
        format!("{}.0", whole)
    } else {
        let frac_str = format!("{:08}", frac);
        let trimmed = frac_str.trim_end_matches('0');
        format!("{}.{}", whole, trimmed)
    }
}

/// Parse a human-readable amount string to atomic units.
pub fn parse_amount(s: &str) -> Result<u64, AmountError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }
    if s.starts_with('-') {
        return Err(AmountError::Negative);
    }

    let (whole_str, frac_str) = match s.find('.') {
        Some(dot_pos) => (&s[..dot_pos], &s[dot_pos + 1..]),
        None => (s, ""),
    };

    if whole_str.is_empty() && frac_str.is_empty() {
        return Err(AmountError::Malformed(s.to_string()));
    }
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole_str) || !all_digits(frac_str) {
        return Err(AmountError::Malformed(s.to_string()));
    }
    if frac_str.len() > DISPLAY_DECIMAL_POINT as usize {
        return Err(AmountError::TooPrecise);
    }

    let whole: u64 = if whole_str.is_empty() {
        0
    } else {
        whole_str.parse().map_err(|_| AmountError::Overflow)?
    };
    let frac: u64 = if frac_str.is_empty() {
        0
    } else {
        let padded = format!("{:0<8}", frac_str);
        padded
            .parse()
            .map_err(|_| AmountError::Malformed(s.to_string()))?
    };

    whole
        .checked_mul(COIN)
        .and_then(|w| w.checked_add(frac))
        .ok_or(AmountError::Overflow)
}
