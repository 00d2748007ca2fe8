//! Update rule trait and shared rating math
//!
//! An update rule turns a decided pairing into a raw rating change and a new
//! deviation for each side. The engine applies the strength-of-field factor
//! and the deviation bounds afterwards, so rules stay free of policy.

use crate::config::{RatingConfig, UpdateRuleKind};
use crate::error::{RatingError, Result};
use crate::rating::elo::EloRule;
use crate::rating::glicko::GlickoRule;
use crate::types::PlayerRating;
use serde::{Deserialize, Serialize};
use std::f64::consts::{LN_10, PI};
use std::sync::Arc;

/// Glicko scale constant `ln(10) / 400`
pub const Q: f64 = LN_10 / 400.0;

/// Result of rating one side of a match
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideUpdate {
    /// Probability the rule assigned to this side winning
    pub expected: f64,
    /// Rating change before any field adjustment
    pub raw_change: f64,
    /// Deviation after the match, before clamping
    pub deviation: f64,
}

/// Result of rating a decided match
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub winner: SideUpdate,
    pub loser: SideUpdate,
}

/// Trait for pairwise rating update rules
pub trait UpdateRule: Send + Sync + std::fmt::Debug {
    /// Rule name for logs and reports
    fn name(&self) -> &'static str;

    /// Probability that `player` beats `opponent`
    fn expected_score(&self, player: &PlayerRating, opponent: &PlayerRating) -> f64;

    /// Rate a match that `winner` won against `loser`
    fn rate(&self, winner: &PlayerRating, loser: &PlayerRating) -> Result<RuleOutcome>;
}

/// Build the update rule selected in the configuration
pub fn build_rule(config: &RatingConfig) -> Arc<dyn UpdateRule> {
    match config.update_rule {
        UpdateRuleKind::Elo => Arc::new(EloRule::new(config.k_factor)),
        UpdateRuleKind::Glicko => Arc::new(GlickoRule::new(config.k_factor)),
    }
}

/// Attenuation of a rating difference by the opponent's deviation
pub fn g(deviation: f64) -> f64 {
    1.0 / (1.0 + 3.0 * Q * Q * deviation * deviation / (PI * PI)).sqrt()
}

/// Inverse of the information a single result carries, `d^2`
pub fn result_variance(opponent_deviation: f64, expected: f64) -> f64 {
    let g = g(opponent_deviation);
    1.0 / (Q * Q * g * g * expected * (1.0 - expected))
}

/// Deviation after observing one result: `1 / sqrt(1/RD^2 + 1/d^2)`
pub fn shrink_deviation(deviation: f64, opponent_deviation: f64, expected: f64) -> f64 {
    let d_squared = result_variance(opponent_deviation, expected);
    1.0 / (1.0 / (deviation * deviation) + 1.0 / d_squared).sqrt()
}

pub(crate) fn ensure_rated(side: &str, rating: &PlayerRating) -> Result<()> {
    if !rating.rating.is_finite() || !rating.deviation.is_finite() || rating.deviation <= 0.0 {
        return Err(RatingError::Internal {
            message: format!(
                "{} has an unusable rating ({}, {})",
                side, rating.rating, rating.deviation
            ),
        });
    }
    Ok(())
}
