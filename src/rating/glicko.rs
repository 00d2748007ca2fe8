//! Glicko-style update rule
//!
//! Single-result Glicko update: the opponent's deviation attenuates the
//! rating difference, and the player's own deviation scales the step, so
//! uncertain players move more. The step is scaled by `K / 32` so the
//! configured K-factor keeps its meaning across rules.

use crate::error::Result;
use crate::rating::rule::{
    ensure_rated, g, result_variance, shrink_deviation, RuleOutcome, SideUpdate, UpdateRule, Q,
};
use crate::types::PlayerRating;

const REFERENCE_K: f64 = 32.0;

/// Deviation-aware rule
#[derive(Debug, Clone)]
pub struct GlickoRule {
    k_factor: f64,
}

impl GlickoRule {
    pub fn new(k_factor: f64) -> Self {
        Self { k_factor }
    }

    fn side(&self, player: &PlayerRating, opponent: &PlayerRating, score: f64) -> SideUpdate {
        let expected = self.expected_score(player, opponent);
        let d_squared = result_variance(opponent.deviation, expected);
        let precision = 1.0 / (player.deviation * player.deviation) + 1.0 / d_squared;
        let step = (self.k_factor / REFERENCE_K) * Q / precision;

        SideUpdate {
            expected,
            raw_change: step * g(opponent.deviation) * (score - expected),
            deviation: shrink_deviation(player.deviation, opponent.deviation, expected),
        }
    }
}

impl Default for GlickoRule {
    fn default() -> Self {
        Self::new(REFERENCE_K)
    }
}

impl UpdateRule for GlickoRule {
    fn name(&self) -> &'static str {
        "glicko"
    }

    fn expected_score(&self, player: &PlayerRating, opponent: &PlayerRating) -> f64 {
        let exponent = -g(opponent.deviation) * (player.rating - opponent.rating) / 400.0;
        1.0 / (1.0 + 10f64.powf(exponent))
    }

    fn rate(&self, winner: &PlayerRating, loser: &PlayerRating) -> Result<RuleOutcome> {
        ensure_rated("winner", winner)?;
        ensure_rated("loser", loser)?;

        Ok(RuleOutcome {
            winner: self.side(winner, loser, 1.0),
            loser: self.side(loser, winner, 0.0),
        })
    }
}
