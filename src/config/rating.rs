//! Rating system configuration
//!
//! Every constant used by the update rules, the strength-of-field adjuster
//! and the inactivity rule lives here so none of them are embedded in
//! formulas.

use crate::error::{RatingError, Result};
use crate::types::PlayerRating;
use serde::{Deserialize, Serialize};

/// Pairwise update rule used by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateRuleKind {
    /// Plain Elo expected-outcome update, zero-sum
    Elo,
    /// Deviation-aware update, uncertain players move more
    Glicko,
}

impl std::fmt::Display for UpdateRuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateRuleKind::Elo => write!(f, "elo"),
            UpdateRuleKind::Glicko => write!(f, "glicko"),
        }
    }
}

/// What the engine does when a match participant is missing from its round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownInputPolicy {
    /// Refuse the match with `UnknownAdjustmentInput`
    Reject,
    /// Apply a neutral factor of 1.0 and log a warning
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Rating assigned to players with no history
    pub default_rating: f64,
    /// Deviation assigned to players with no history
    pub default_deviation: f64,
    /// Sensitivity of a single result
    pub k_factor: f64,
    /// Deviation never shrinks below this value
    pub deviation_floor: f64,
    /// Deviation never grows above this value
    pub max_deviation: f64,
    /// Inactivity longer than this triggers a deviation bump
    pub stale_window_days: f64,
    /// Deviation added per day of inactivity once stale
    pub inflation_per_day: f64,
    /// Field mean at which the field contributes no adjustment
    pub baseline_rating: f64,
    /// Rating distance that moves the field term by `field_weight`
    pub rating_scale: f64,
    /// Weight of the field term. A field whose mean sits one `rating_scale`
    /// above `baseline_rating` raises the factor by this much; zero ignores
    /// field strength.
    pub field_weight: f64,
    /// Weight of the opponent term. An opponent whose deviation is twice
    /// `default_deviation` raises the factor by this much; zero ignores
    /// opponent uncertainty.
    pub deviation_weight: f64,
    /// Lowest factor a rating change can be scaled by, in `(0, 1]`
    pub sof_min_factor: f64,
    /// Highest factor a rating change can be scaled by, at least 1
    pub sof_max_factor: f64,
    pub update_rule: UpdateRuleKind,
    pub unknown_input: UnknownInputPolicy,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            default_rating: 1500.0,
            default_deviation: 200.0,
            k_factor: 32.0,
            deviation_floor: 50.0,
            max_deviation: 350.0,
            stale_window_days: 90.0,
            inflation_per_day: 0.5,
            baseline_rating: 1500.0,
            rating_scale: 400.0,
            field_weight: 1.0,
            deviation_weight: 0.25,
            sof_min_factor: 0.5,
            sof_max_factor: 2.0,
            update_rule: UpdateRuleKind::Elo,
            unknown_input: UnknownInputPolicy::Reject,
        }
    }
}

impl RatingConfig {
    /// Slower rating movement, narrower adjustment band
    pub fn conservative() -> Self {
        Self {
            k_factor: 16.0,
            inflation_per_day: 0.25,
            sof_min_factor: 0.75,
            sof_max_factor: 1.5,
            ..Self::default()
        }
    }

    /// Faster rating movement, wider adjustment band
    pub fn aggressive() -> Self {
        Self {
            k_factor: 48.0,
            inflation_per_day: 1.0,
            sof_min_factor: 0.5,
            sof_max_factor: 2.5,
            ..Self::default()
        }
    }

    /// Rating and deviation of a player with no history
    pub fn initial_rating(&self) -> PlayerRating {
        PlayerRating {
            rating: self.default_rating,
            deviation: self.default_deviation,
        }
    }

    /// Clamp a deviation into `[deviation_floor, max_deviation]`
    pub fn clamp_deviation(&self, deviation: f64) -> f64 {
        deviation.clamp(self.deviation_floor, self.max_deviation)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        let finite = [
            self.default_rating,
            self.default_deviation,
            self.k_factor,
            self.deviation_floor,
            self.max_deviation,
            self.stale_window_days,
            self.inflation_per_day,
            self.baseline_rating,
            self.rating_scale,
            self.field_weight,
            self.deviation_weight,
            self.sof_min_factor,
            self.sof_max_factor,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(config_error("All rating parameters must be finite"));
        }

        if self.k_factor <= 0.0 {
            return Err(config_error("K-factor must be positive"));
        }
        if self.deviation_floor <= 0.0 {
            return Err(config_error("Deviation floor must be positive"));
        }
        if self.max_deviation < self.deviation_floor {
            return Err(config_error(
                "Maximum deviation must not be below the deviation floor",
            ));
        }
        if self.default_deviation < self.deviation_floor
            || self.default_deviation > self.max_deviation
        {
            return Err(config_error(
                "Default deviation must lie between the floor and the maximum",
            ));
        }
        if self.stale_window_days < 0.0 {
            return Err(config_error("Staleness window must be non-negative"));
        }
        if self.inflation_per_day < 0.0 {
            return Err(config_error("Inflation rate must be non-negative"));
        }
        if self.rating_scale <= 0.0 {
            return Err(config_error("Rating scale must be positive"));
        }
        if self.field_weight < 0.0 || self.deviation_weight < 0.0 {
            return Err(config_error(
                "Strength-of-field weights must be non-negative",
            ));
        }
        if self.sof_min_factor <= 0.0 {
            return Err(config_error(
                "Strength-of-field lower bound must be positive",
            ));
        }
        if self.sof_min_factor > 1.0 || self.sof_max_factor < 1.0 {
            return Err(config_error(
                "Strength-of-field bounds must include the neutral factor 1.0",
            ));
        }

        Ok(())
    }
}

fn config_error(message: &str) -> RatingError {
    RatingError::Configuration {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RatingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.initial_rating().rating, 1500.0);
        assert_eq!(config.initial_rating().deviation, 200.0);
        assert_eq!(config.update_rule, UpdateRuleKind::Elo);
    }

    #[test]
    fn test_presets_are_valid() {
        let conservative = RatingConfig::conservative();
        let aggressive = RatingConfig::aggressive();

        assert!(conservative.validate().is_ok());
        assert!(aggressive.validate().is_ok());
        assert!(conservative.k_factor < aggressive.k_factor);
        assert!(
            conservative.sof_max_factor - conservative.sof_min_factor
                < aggressive.sof_max_factor - aggressive.sof_min_factor
        );
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = RatingConfig::default();
        config.k_factor = 0.0;
        assert!(config.validate().is_err());

        config = RatingConfig::default();
        config.max_deviation = 10.0;
        assert!(config.validate().is_err());

        config = RatingConfig::default();
        config.sof_min_factor = 1.2;
        assert!(config.validate().is_err());

        config = RatingConfig::default();
        config.default_rating = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_field_weights_scale_the_factor() {
        use crate::rating::{FieldRatings, StrengthOfFieldAdjuster, StrengthOfFieldConfig};
        use crate::types::TournamentRound;

        let round = TournamentRound::new("r1", ["a", "b"]);
        let rated = |rating, deviation| PlayerRating { rating, deviation };
        let factor = |config: &RatingConfig, field: &FieldRatings| {
            StrengthOfFieldAdjuster::new(StrengthOfFieldConfig::from(config))
                .unwrap()
                .adjust(&round, field, "a", "b")
                .unwrap()
                .unclamped
        };

        // Field one scale above the baseline, opponent at the default deviation
        let strong: FieldRatings = [
            ("a".to_string(), rated(1900.0, 200.0)),
            ("b".to_string(), rated(1900.0, 200.0)),
        ]
        .into_iter()
        .collect();
        // Baseline field, opponent at twice the default deviation
        let uncertain: FieldRatings = [
            ("a".to_string(), rated(1500.0, 200.0)),
            ("b".to_string(), rated(1500.0, 400.0)),
        ]
        .into_iter()
        .collect();

        let mut config = RatingConfig {
            field_weight: 0.3,
            deviation_weight: 0.2,
            ..RatingConfig::default()
        };
        assert!((factor(&config, &strong) - 1.3).abs() < 1e-12);
        assert!((factor(&config, &uncertain) - 1.2).abs() < 1e-12);

        config.field_weight = 0.0;
        config.deviation_weight = 0.0;
        assert!((factor(&config, &strong) - 1.0).abs() < 1e-12);
        assert!((factor(&config, &uncertain) - 1.0).abs() < 1e-12);

        config.field_weight = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clamp_deviation() {
        let config = RatingConfig::default();
        assert_eq!(config.clamp_deviation(10.0), 50.0);
        assert_eq!(config.clamp_deviation(500.0), 350.0);
        assert_eq!(config.clamp_deviation(120.0), 120.0);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: RatingConfig = toml::from_str(
            r#"
            k_factor = 24.0
            update_rule = "glicko"
            unknown_input = "neutral"
            "#,
        )
        .unwrap();

        assert_eq!(config.k_factor, 24.0);
        assert_eq!(config.update_rule, UpdateRuleKind::Glicko);
        assert_eq!(config.unknown_input, UnknownInputPolicy::Neutral);
        assert_eq!(config.default_rating, 1500.0);
    }
}
