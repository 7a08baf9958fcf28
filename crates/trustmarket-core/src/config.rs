//! Runtime configuration for the marketplace layer.
//!
//! Loaded from TOML; every field has a default so an empty document is valid.

use crate::error::{ErrorClass, ErrorOrigin, InternalError};
use serde::Deserialize;
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("toml parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("limits.{field} must be greater than zero")]
    ZeroLimit { field: &'static str },

    #[error("reputation.executer_weight {weight} must be within [0, 1]")]
    WeightOutOfRange { weight: f64 },

    #[error("reputation rating range [{min}, {max}] is empty or not finite")]
    InvalidRatingRange { min: f64, max: f64 },

    #[error("reputation.default_reputation {value} lies outside [{min}, {max}]")]
    DefaultOutOfRange { value: f64, min: f64, max: f64 },
}

impl From<ConfigError> for InternalError {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorClass::InvalidArgument, ErrorOrigin::Config, err.to_string())
    }
}

///
/// MarketConfig
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MarketConfig {
    pub limits: LimitsConfig,
    pub reputation: ReputationConfig,
}

impl MarketConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.limits.validate()?;
        self.reputation.validate()
    }
}

///
/// LimitsConfig
/// Length bounds applied by the argument sanitizer.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Max bytes for identifiers and any indexed field.
    pub max_key_len: usize,
    /// Max bytes for free-text fields.
    pub max_text_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_key_len: 64,
            max_text_len: 512,
        }
    }
}

impl LimitsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_key_len == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "max_key_len",
            });
        }
        if self.max_text_len == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "max_text_len",
            });
        }

        Ok(())
    }
}

///
/// ReputationConfig
///

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReputationConfig {
    /// Share of the executer-role mean in the blended score.
    /// The demander-role mean receives `1 - executer_weight`.
    pub executer_weight: f64,
    /// Reputation assigned to a relation before any evaluation lands.
    pub default_reputation: f64,
    pub min_rating: f64,
    pub max_rating: f64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            executer_weight: 0.5,
            default_reputation: 0.0,
            min_rating: 0.0,
            max_rating: 10.0,
        }
    }
}

impl ReputationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.executer_weight) {
            return Err(ConfigError::WeightOutOfRange {
                weight: self.executer_weight,
            });
        }
        if !self.min_rating.is_finite()
            || !self.max_rating.is_finite()
            || self.min_rating >= self.max_rating
        {
            return Err(ConfigError::InvalidRatingRange {
                min: self.min_rating,
                max: self.max_rating,
            });
        }
        if !self.rating_in_range(self.default_reputation) {
            return Err(ConfigError::DefaultOutOfRange {
                value: self.default_reputation,
                min: self.min_rating,
                max: self.max_rating,
            });
        }

        Ok(())
    }

    #[must_use]
    pub fn rating_in_range(&self, rating: f64) -> bool {
        rating.is_finite() && (self.min_rating..=self.max_rating).contains(&rating)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = MarketConfig::from_toml_str("").expect("empty config");

        assert_eq!(config, MarketConfig::default());
        assert!((config.reputation.executer_weight - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_document_overrides_named_fields() {
        let config = MarketConfig::from_toml_str(
            r"
            [limits]
            max_key_len = 16

            [reputation]
            executer_weight = 0.75
            ",
        )
        .expect("partial config");

        assert_eq!(config.limits.max_key_len, 16);
        assert_eq!(config.limits.max_text_len, 512);
        assert!((config.reputation.executer_weight - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn weight_outside_unit_interval_is_rejected() {
        let err = MarketConfig::from_toml_str("[reputation]\nexecuter_weight = 1.5\n").unwrap_err();

        assert!(matches!(err, ConfigError::WeightOutOfRange { .. }));
    }

    #[test]
    fn default_reputation_must_sit_inside_rating_range() {
        let err = MarketConfig::from_toml_str(
            "[reputation]\nmin_rating = 1.0\nmax_rating = 5.0\ndefault_reputation = 0.0\n",
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::DefaultOutOfRange { .. }));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = MarketConfig::from_toml_str("[limits]\nmax_id_len = 3\n").unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn config_errors_map_to_invalid_argument() {
        let err: InternalError = ConfigError::ZeroLimit {
            field: "max_key_len",
        }
        .into();

        assert_eq!(err.class, ErrorClass::InvalidArgument);
        assert_eq!(err.origin, ErrorOrigin::Config);
    }
}
