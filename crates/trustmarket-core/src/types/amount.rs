use crate::error::{ErrorOrigin, InternalError};
use derive_more::Display;
use rust_decimal::Decimal as WrappedDecimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::str::FromStr;
use thiserror::Error as ThisError;

///
/// AmountParseError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum AmountParseError {
    #[error("'{input}' is not a decimal number")]
    NotDecimal { input: String },

    #[error("'{input}' is negative")]
    Negative { input: String },
}

impl From<AmountParseError> for InternalError {
    fn from(err: AmountParseError) -> Self {
        Self::invalid_argument(ErrorOrigin::Sanitize, err.to_string())
    }
}

///
/// Amount
///
/// Non-negative decimal quantity (relation cost and time terms).
/// Persisted as its canonical decimal string so records stay readable.
///

#[derive(Clone, Copy, Debug, Default, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Amount(WrappedDecimal);

impl Amount {
    pub const ZERO: Self = Self(WrappedDecimal::ZERO);

    /// Construct from an unsigned mantissa and a decimal scale.
    ///
    /// # Panics
    /// Panics if `scale` exceeds 28, the largest scale a decimal can carry.
    #[must_use]
    pub fn new(num: u64, scale: u32) -> Self {
        Self(WrappedDecimal::from_i128_with_scale(i128::from(num), scale).normalize())
    }

    #[must_use]
    pub const fn inner(&self) -> WrappedDecimal {
        self.0
    }
}

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = WrappedDecimal::from_str(s.trim()).map_err(|_| AmountParseError::NotDecimal {
            input: s.to_string(),
        })?;

        if value.is_sign_negative() && !value.is_zero() {
            return Err(AmountParseError::Negative {
                input: s.to_string(),
            });
        }

        Ok(Self(value.normalize()))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;

        raw.parse().map_err(de::Error::custom)
    }
}

///
/// TESTS
///
