//! Elo update rule
//!
//! Expected score and rating update come from the skillratings Elo
//! implementation. Elo itself carries no deviation, so deviations shrink with
//! the same information formula the Glicko-style rule uses.

use crate::error::Result;
use crate::rating::rule::{ensure_rated, shrink_deviation, RuleOutcome, SideUpdate, UpdateRule};
use crate::types::PlayerRating;
use skillratings::elo::{elo, expected_score, EloConfig, EloRating};
use skillratings::Outcomes;

/// Zero-sum Elo rule with a fixed K-factor
#[derive(Debug, Clone)]
pub struct EloRule {
    config: EloConfig,
}

impl EloRule {
    pub fn new(k_factor: f64) -> Self {
        Self {
            config: EloConfig { k: k_factor },
        }
    }

    pub fn k_factor(&self) -> f64 {
        self.config.k
    }
}

impl Default for EloRule {
    fn default() -> Self {
        Self::new(32.0)
    }
}

fn to_elo(rating: &PlayerRating) -> EloRating {
    EloRating {
        rating: rating.rating,
    }
}

impl UpdateRule for EloRule {
    fn name(&self) -> &'static str {
        "elo"
    }

    fn expected_score(&self, player: &PlayerRating, opponent: &PlayerRating) -> f64 {
        expected_score(&to_elo(player), &to_elo(opponent)).0
    }

    fn rate(&self, winner: &PlayerRating, loser: &PlayerRating) -> Result<RuleOutcome> {
        ensure_rated("winner", winner)?;
        ensure_rated("loser", loser)?;

        let (winner_elo, loser_elo) = (to_elo(winner), to_elo(loser));
        let (expected_winner, expected_loser) = expected_score(&winner_elo, &loser_elo);
        let (new_winner, new_loser) = elo(&winner_elo, &loser_elo, &Outcomes::WIN, &self.config);

        Ok(RuleOutcome {
            winner: SideUpdate {
                expected: expected_winner,
                raw_change: new_winner.rating - winner.rating,
                deviation: shrink_deviation(winner.deviation, loser.deviation, expected_winner),
            },
            loser: SideUpdate {
                expected: expected_loser,
                raw_change: new_loser.rating - loser.rating,
                deviation: shrink_deviation(loser.deviation, winner.deviation, expected_loser),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating(rating: f64, deviation: f64) -> PlayerRating {
        PlayerRating { rating, deviation }
    }

    #[test]
    fn test_equal_players_move_by_half_k() {
        let rule = EloRule::new(32.0);
        let outcome = rule
            .rate(&rating(1500.0, 200.0), &rating(1500.0, 200.0))
            .unwrap();

        assert_eq!(outcome.winner.expected, 0.5);
        assert!((outcome.winner.raw_change - 16.0).abs() < 1e-9);
        assert!((outcome.loser.raw_change + 16.0).abs() < 1e-9);
        assert!(outcome.winner.deviation < 200.0);
        assert!(outcome.loser.deviation < 200.0);
    }

    #[test]
    fn test_upset_moves_more_than_expected_win() {
        let rule = EloRule::default();
        let favourite = rating(1700.0, 150.0);
        let underdog = rating(1400.0, 150.0);

        let expected_win = rule.rate(&favourite, &underdog).unwrap();
        let upset = rule.rate(&underdog, &favourite).unwrap();

        assert!(upset.winner.raw_change > expected_win.winner.raw_change);
        assert!(rule.expected_score(&favourite, &underdog) > 0.8);
    }

    #[test]
    fn test_changes_are_zero_sum() {
        let rule = EloRule::new(24.0);
        let outcome = rule
            .rate(&rating(1612.0, 90.0), &rating(1488.0, 310.0))
            .unwrap();
        assert!((outcome.winner.raw_change + outcome.loser.raw_change).abs() < 1e-9);
    }
}
