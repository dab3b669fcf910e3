//! Fixed-point money value object.
//!
//! All balances and amounts are carried as `rust_decimal::Decimal` rescaled to
//! exactly [`MONEY_SCALE`] fractional digits. Floating point never enters the
//! domain: JSON numbers are read from their exact source text (serde_json's
//! `arbitrary_precision`), and values with more than four fractional digits are
//! rejected instead of rounded.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DomainError, DomainResult};

/// Number of fractional digits carried by every `Money` value.
pub const MONEY_SCALE: u32 = 4;

/// Map key serde_json uses to hand over a number's source text when
/// `arbitrary_precision` is enabled.
const JSON_NUMBER_TOKEN: &str = "$serde_json::private::Number";

/// Largest representable magnitude: 14 integer digits + 4 fractional digits
/// (matches the `NUMERIC(18, 4)` storage columns).
fn max_magnitude() -> Decimal {
    Decimal::new(999_999_999_999_999_999, MONEY_SCALE)
}

/// Signed fixed-point quantity with four fractional digits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Money(Decimal);

impl Money {
    pub fn zero() -> Self {
        let mut d = Decimal::ZERO;
        d.rescale(MONEY_SCALE);
        Self(d)
    }

    /// Build from an arbitrary decimal, enforcing scale and range.
    pub fn from_decimal(value: Decimal) -> DomainResult<Self> {
        if value.normalize().scale() > MONEY_SCALE {
            return Err(too_many_places());
        }
        if value.abs() > max_magnitude() {
            return Err(DomainError::validation("amount is out of range"));
        }
        if value.is_zero() {
            return Ok(Self::zero());
        }

        let mut scaled = value;
        scaled.rescale(MONEY_SCALE);
        Ok(Self(scaled))
    }

    /// Build from a count of the smallest unit (0.0001).
    pub fn from_units(units: i64) -> DomainResult<Self> {
        Self::from_decimal(Decimal::new(units, MONEY_SCALE))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn negate(&self) -> Self {
        if self.is_zero() { *self } else { Self(-self.0) }
    }

    /// Add two amounts; fails if the result leaves the representable range.
    pub fn checked_add(&self, other: Money) -> DomainResult<Self> {
        let sum = self
            .0
            .checked_add(other.0)
            .ok_or_else(|| DomainError::validation("amount is out of range"))?;
        Self::from_decimal(sum)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // `Decimal::from_str` rounds past 28 significant digits, so the scale
        // has to be checked on the text itself.
        if fractional_digits(trimmed) > MONEY_SCALE as usize {
            return Err(too_many_places());
        }
        let parsed = if trimmed.contains(['e', 'E']) {
            Decimal::from_scientific(trimmed)
        } else {
            Decimal::from_str(trimmed)
        };
        let value =
            parsed.map_err(|_| DomainError::validation(format!("'{trimmed}' is not a decimal amount")))?;
        Self::from_decimal(value)
    }
}

fn too_many_places() -> DomainError {
    DomainError::validation(format!("amount must have at most {MONEY_SCALE} decimal places"))
}

/// Significant fractional digits in a decimal literal (trailing zeros
/// ignored). Exponent forms are checked after parsing instead.
fn fractional_digits(text: &str) -> usize {
    if text.contains(['e', 'E']) {
        return 0;
    }
    text.split_once('.')
        .map(|(_, frac)| {
            frac.trim_end_matches(['0', '_'])
                .chars()
                .filter(char::is_ascii_digit)
                .count()
        })
        .unwrap_or(0)
}

impl TryFrom<Decimal> for Money {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::from_decimal(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

// Serialized as a decimal string ("150.2500") so clients never see float drift.
impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal amount as a number or string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        Money::from_decimal(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        Money::from_decimal(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        v.parse::<Money>().map_err(E::custom)
    }

    // serde_json with `arbitrary_precision` delivers numbers as a one-entry
    // map holding the literal.
    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Money, A::Error> {
        match map.next_key::<String>()? {
            Some(key) if key == JSON_NUMBER_TOKEN => {
                let literal: String = map.next_value()?;
                literal.parse::<Money>().map_err(de::Error::custom)
            }
            _ => Err(de::Error::invalid_type(de::Unexpected::Map, &self)),
        }
    }
}
