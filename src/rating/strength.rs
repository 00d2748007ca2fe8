//! Strength-of-field adjustment
//!
//! Scales a match's base rating change by how strong the round's field was
//! and how uncertain the opponent is. Beating a player from a strong or
//! poorly-known field moves ratings more than beating one from a weak,
//! well-known field.
//!
//! The adjuster is a pure function of the round, the field's ratings and the
//! two participants. It keeps no state and performs no I/O.

use crate::config::RatingConfig;
use crate::error::{RatingError, Result};
use crate::types::{PlayerId, PlayerRating, TournamentRound};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current ratings of a round's participants
pub type FieldRatings = BTreeMap<PlayerId, PlayerRating>;

/// Parameters of the adjustment policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrengthOfFieldConfig {
    pub baseline_rating: f64,
    pub rating_scale: f64,
    /// Opponent deviation at which the deviation term is zero
    pub reference_deviation: f64,
    pub field_weight: f64,
    pub deviation_weight: f64,
    pub min_factor: f64,
    pub max_factor: f64,
}

impl From<&RatingConfig> for StrengthOfFieldConfig {
    fn from(config: &RatingConfig) -> Self {
        Self {
            baseline_rating: config.baseline_rating,
            rating_scale: config.rating_scale,
            reference_deviation: config.default_deviation,
            field_weight: config.field_weight,
            deviation_weight: config.deviation_weight,
            min_factor: config.sof_min_factor,
            max_factor: config.sof_max_factor,
        }
    }
}

impl Default for StrengthOfFieldConfig {
    fn default() -> Self {
        Self::from(&RatingConfig::default())
    }
}

/// Factor applied to one participant's base change, with its inputs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub factor: f64,
    /// Factor before clamping
    pub unclamped: f64,
    pub field_mean: f64,
}

impl Adjustment {
    pub fn neutral() -> Self {
        Self {
            factor: 1.0,
            unclamped: 1.0,
            field_mean: f64::NAN,
        }
    }

    pub fn was_clamped(&self) -> bool {
        self.factor != self.unclamped
    }
}

#[derive(Debug, Clone)]
pub struct StrengthOfFieldAdjuster {
    config: StrengthOfFieldConfig,
}

impl StrengthOfFieldAdjuster {
    pub fn new(config: StrengthOfFieldConfig) -> Result<Self> {
        let bad = |message: &str| {
            Err(RatingError::Configuration {
                message: message.to_string(),
            })
        };
        if !(config.rating_scale > 0.0) {
            return bad("Rating scale must be positive");
        }
        if !(config.reference_deviation > 0.0) {
            return bad("Reference deviation must be positive");
        }
        if !(config.min_factor > 0.0) || !(config.max_factor >= config.min_factor) {
            return bad("Adjustment bounds must satisfy 0 < min <= max");
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &StrengthOfFieldConfig {
        &self.config
    }

    /// Compute the factor for `player`'s rating change against `opponent`
    pub fn adjust(
        &self,
        round: &TournamentRound,
        field: &FieldRatings,
        player: &str,
        opponent: &str,
    ) -> Result<Adjustment> {
        if round.is_empty() {
            return Err(unknown_input(format!("round {} has no participants", round.id)));
        }
        if round.len() < 2 {
            return Err(unknown_input(format!(
                "round {} has fewer than two participants",
                round.id
            )));
        }
        for id in [player, opponent] {
            if !round.contains(id) {
                return Err(unknown_input(format!(
                    "player {} is not part of round {}",
                    id, round.id
                )));
            }
        }

        let field_mean = field_mean(round, field)?;
        let opponent_rating = field
            .get(opponent)
            .ok_or_else(|| unknown_input(format!("no rating for participant {}", opponent)))?;

        let cfg = &self.config;
        let field_term = cfg.field_weight * (field_mean - cfg.baseline_rating) / cfg.rating_scale;
        let deviation_term = cfg.deviation_weight
            * (opponent_rating.deviation - cfg.reference_deviation)
            / cfg.reference_deviation;
        let unclamped = 1.0 + field_term + deviation_term;

        if !unclamped.is_finite() {
            return Err(unknown_input(format!(
                "non-finite adjustment for {} in round {}",
                player, round.id
            )));
        }

        Ok(Adjustment {
            factor: unclamped.clamp(cfg.min_factor, cfg.max_factor),
            unclamped,
            field_mean,
        })
    }
}

/// Mean rating of every participant of the round
pub fn field_mean(round: &TournamentRound, field: &FieldRatings) -> Result<f64> {
    let mut total = 0.0;
    for participant in &round.participants {
        let rating = field
            .get(participant)
            .ok_or_else(|| unknown_input(format!("no rating for participant {}", participant)))?;
        if !rating.rating.is_finite() || !rating.deviation.is_finite() || rating.deviation < 0.0 {
            return Err(unknown_input(format!(
                "unusable rating for participant {}",
                participant
            )));
        }
        total += rating.rating;
    }
    Ok(total / round.len() as f64)
}

fn unknown_input(reason: String) -> RatingError {
    RatingError::UnknownAdjustmentInput { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn adjuster() -> StrengthOfFieldAdjuster {
        StrengthOfFieldAdjuster::new(StrengthOfFieldConfig::default()).unwrap()
    }

    fn field(entries: &[(&str, f64, f64)]) -> (TournamentRound, FieldRatings) {
        let round = TournamentRound::new("r1", entries.iter().map(|(id, _, _)| *id));
        let ratings = entries
            .iter()
            .map(|(id, rating, deviation)| {
                (
                    id.to_string(),
                    PlayerRating {
                        rating: *rating,
                        deviation: *deviation,
                    },
                )
            })
            .collect();
        (round, ratings)
    }

    #[test]
    fn test_baseline_field_is_neutral() {
        let (round, ratings) = field(&[("a", 1500.0, 200.0), ("b", 1500.0, 200.0)]);
        let adjustment = adjuster().adjust(&round, &ratings, "a", "b").unwrap();

        assert!((adjustment.factor - 1.0).abs() < 1e-12);
        assert_eq!(adjustment.field_mean, 1500.0);
        assert!(!adjustment.was_clamped());
    }

    #[test]
    fn test_stronger_field_increases_factor() {
        let (weak_round, weak) = field(&[
            ("a", 1500.0, 200.0),
            ("b", 1500.0, 200.0),
            ("c", 1300.0, 200.0),
            ("d", 1300.0, 200.0),
        ]);
        let (strong_round, strong) = field(&[
            ("a", 1500.0, 200.0),
            ("b", 1500.0, 200.0),
            ("c", 1800.0, 200.0),
            ("d", 1800.0, 200.0),
        ]);

        let weak = adjuster().adjust(&weak_round, &weak, "a", "b").unwrap();
        let strong = adjuster().adjust(&strong_round, &strong, "a", "b").unwrap();
        assert!(weak.factor < 1.0);
        assert!(strong.factor > 1.0);
    }

    #[test]
    fn test_uncertain_opponent_increases_factor() {
        let (round, ratings) = field(&[("a", 1500.0, 200.0), ("b", 1500.0, 320.0)]);
        let against_uncertain = adjuster().adjust(&round, &ratings, "a", "b").unwrap();
        let against_settled = adjuster().adjust(&round, &ratings, "b", "a").unwrap();

        assert!(against_uncertain.factor > 1.0);
        assert!((against_settled.factor - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_extreme_field_is_clamped() {
        let (round, ratings) = field(&[("a", 3900.0, 200.0), ("b", 3900.0, 200.0)]);
        let adjustment = adjuster().adjust(&round, &ratings, "a", "b").unwrap();

        assert_eq!(adjustment.factor, 2.0);
        assert!(adjustment.was_clamped());
    }

    #[test]
    fn test_empty_round_is_an_error() {
        let round = TournamentRound::new("r1", Vec::<String>::new());
        let err = adjuster()
            .adjust(&round, &FieldRatings::new(), "a", "b")
            .unwrap_err();
        assert!(matches!(err, RatingError::UnknownAdjustmentInput { .. }));
    }

    #[test]
    fn test_single_player_round_is_an_error() {
        let (round, ratings) = field(&[("a", 1500.0, 200.0)]);
        assert!(adjuster().adjust(&round, &ratings, "a", "a").is_err());
    }

    #[test]
    fn test_participant_outside_round_is_an_error() {
        let (round, ratings) = field(&[("a", 1500.0, 200.0), ("b", 1500.0, 200.0)]);
        let err = adjuster()
            .adjust(&round, &ratings, "a", "stranger")
            .unwrap_err();
        assert!(matches!(err, RatingError::UnknownAdjustmentInput { .. }));
    }

    #[test]
    fn test_missing_field_rating_is_an_error() {
        let (round, mut ratings) = field(&[
            ("a", 1500.0, 200.0),
            ("b", 1500.0, 200.0),
            ("c", 1500.0, 200.0),
        ]);
        ratings.remove("c");
        assert!(adjuster().adjust(&round, &ratings, "a", "b").is_err());
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let config = StrengthOfFieldConfig {
            min_factor: 2.0,
            max_factor: 1.0,
            ..StrengthOfFieldConfig::default()
        };
        assert!(StrengthOfFieldAdjuster::new(config).is_err());
    }

    proptest! {
        #[test]
        fn prop_factor_within_bounds(
            entries in prop::collection::vec((0.0f64..4000.0, 1.0f64..1000.0), 2..24),
            min_factor in 0.1f64..1.0,
            spread in 0.0f64..3.0,
        ) {
            let config = StrengthOfFieldConfig {
                min_factor,
                max_factor: min_factor + spread,
                ..StrengthOfFieldConfig::default()
            };
            let adjuster = StrengthOfFieldAdjuster::new(config.clone()).unwrap();

            let ids: Vec<String> = (0..entries.len()).map(|i| format!("p{i}")).collect();
            let round = TournamentRound::new("r", ids.clone());
            let ratings: FieldRatings = ids
                .iter()
                .cloned()
                .zip(entries.iter().map(|(rating, deviation)| PlayerRating {
                    rating: *rating,
                    deviation: *deviation,
                }))
                .collect();

            let adjustment = adjuster.adjust(&round, &ratings, &ids[0], &ids[1]).unwrap();
            prop_assert!(adjustment.factor >= config.min_factor);
            prop_assert!(adjustment.factor <= config.max_factor);
        }
    }
}
