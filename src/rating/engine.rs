//! Rating engine
//!
//! Turns decided matches into rating deltas. For each match the engine reads
//! both participants' latest snapshots, applies the inactivity bump, runs the
//! configured update rule, scales the result by the strength of the round's
//! field and commits both new snapshots and deltas in one store call.

use crate::config::{RatingConfig, UnknownInputPolicy};
use crate::error::{RatingError, Result};
use crate::rating::decay::InactivityPolicy;
use crate::rating::locks::{lock_all, PlayerLocks};
use crate::rating::rule::{build_rule, SideUpdate, UpdateRule};
use crate::rating::store::{MatchCommit, RatingStore};
use crate::rating::strength::{Adjustment, FieldRatings, StrengthOfFieldAdjuster};
use crate::types::{
    Match, MatchId, MatchOutcome, PlayerRating, RatingDelta, RatingSnapshot, TournamentRound,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of replaying a sequence of matches
#[derive(Debug, Clone, Default)]
pub struct ReplaySummary {
    /// Outcomes committed before the first failure, in input order
    pub outcomes: Vec<MatchOutcome>,
    /// The match that stopped the replay, if any
    pub failure: Option<(MatchId, RatingError)>,
}

impl ReplaySummary {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// One participant going into the update
struct Side<'a> {
    id: &'a str,
    latest: RatingSnapshot,
    pre: PlayerRating,
}

pub struct RatingEngine {
    store: Arc<dyn RatingStore>,
    rule: Arc<dyn UpdateRule>,
    adjuster: StrengthOfFieldAdjuster,
    inactivity: InactivityPolicy,
    locks: PlayerLocks,
    config: RatingConfig,
}

impl std::fmt::Debug for RatingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatingEngine")
            .field("rule", &self.rule.name())
            .field("config", &self.config)
            .finish()
    }
}

impl RatingEngine {
    /// Create an engine using the update rule selected in `config`
    pub fn new(config: RatingConfig, store: Arc<dyn RatingStore>) -> Result<Self> {
        let rule = build_rule(&config);
        Self::with_rule(config, store, rule)
    }

    /// Create an engine with an explicit update rule
    pub fn with_rule(
        config: RatingConfig,
        store: Arc<dyn RatingStore>,
        rule: Arc<dyn UpdateRule>,
    ) -> Result<Self> {
        config.validate()?;
        let adjuster = StrengthOfFieldAdjuster::new((&config).into())?;

        Ok(Self {
            store,
            rule,
            adjuster,
            inactivity: InactivityPolicy::from(&config),
            locks: PlayerLocks::new(),
            config,
        })
    }

    pub fn store(&self) -> &Arc<dyn RatingStore> {
        &self.store
    }

    pub fn config(&self) -> &RatingConfig {
        &self.config
    }

    pub fn rule_name(&self) -> &'static str {
        self.rule.name()
    }

    /// Register the field of a round before its matches are processed
    pub fn record_round(&self, round: TournamentRound) -> Result<()> {
        debug!(
            "Recording round {} with {} participants",
            round.id,
            round.len()
        );
        self.store.record_round(round)
    }

    /// Process one decided match and commit its rating changes.
    ///
    /// On error nothing is written for either participant.
    pub fn process_match(&self, game: &Match) -> Result<MatchOutcome> {
        let (winner_id, loser_id) = validate(game)?;

        let handles = self.locks.handles(&[winner_id, loser_id]);
        let _guards = lock_all(&handles);

        let winner = self.side(winner_id, game)?;
        let loser = self.side(loser_id, game)?;

        let outcome = self.rule.rate(&winner.pre, &loser.pre)?;
        let (winner_adj, loser_adj) = self.adjustments(game, &winner, &loser)?;

        let winner_delta = self.delta(game, &winner, loser_id, true, &outcome.winner, &winner_adj);
        let loser_delta = self.delta(game, &loser, winner_id, false, &outcome.loser, &loser_adj);

        let snapshot_of = |delta: &RatingDelta| {
            RatingSnapshot::after_match(
                PlayerRating {
                    rating: delta.post_rating,
                    deviation: delta.post_deviation,
                },
                game.timestamp,
                &game.id,
            )
        };

        self.store.commit_match(MatchCommit {
            snapshots: vec![
                (winner_id.to_string(), snapshot_of(&winner_delta)),
                (loser_id.to_string(), snapshot_of(&loser_delta)),
            ],
            deltas: vec![winner_delta.clone(), loser_delta.clone()],
        })?;

        debug!(
            "Match {} ({}): {} {:.1} -> {:.1} (x{:.3}), {} {:.1} -> {:.1} (x{:.3})",
            game.id,
            self.rule.name(),
            winner_id,
            winner_delta.pre_rating,
            winner_delta.post_rating,
            winner_adj.factor,
            loser_id,
            loser_delta.pre_rating,
            loser_delta.post_rating,
            loser_adj.factor
        );

        Ok(MatchOutcome {
            match_id: game.id.clone(),
            timestamp: game.timestamp,
            deltas: vec![winner_delta, loser_delta],
        })
    }

    /// Process matches in the given order, stopping at the first failure
    pub fn replay<'a, I>(&self, matches: I) -> ReplaySummary
    where
        I: IntoIterator<Item = &'a Match>,
    {
        let mut summary = ReplaySummary::default();
        for game in matches {
            match self.process_match(game) {
                Ok(outcome) => summary.outcomes.push(outcome),
                Err(e) => {
                    warn!("Replay stopped at match {}: {}", game.id, e);
                    summary.failure = Some((game.id.clone(), e));
                    break;
                }
            }
        }
        summary
    }

    fn side<'a>(&self, player_id: &'a str, game: &Match) -> Result<Side<'a>> {
        let latest = self.store.get_current(player_id)?;
        if game.timestamp < latest.timestamp {
            return Err(RatingError::InvalidTimestampOrder {
                player_id: player_id.to_string(),
                latest: latest.timestamp,
                attempted: game.timestamp,
            });
        }

        let deviation = self.inactivity.effective_deviation(&latest, game.timestamp);
        if deviation != latest.deviation {
            debug!(
                "Player {} inactive since {}, deviation {:.1} -> {:.1}",
                player_id, latest.timestamp, latest.deviation, deviation
            );
        }

        Ok(Side {
            id: player_id,
            pre: PlayerRating {
                rating: latest.rating,
                deviation,
            },
            latest,
        })
    }

    fn adjustments(
        &self,
        game: &Match,
        winner: &Side<'_>,
        loser: &Side<'_>,
    ) -> Result<(Adjustment, Adjustment)> {
        let Some(round) = self.store.round(&game.round_id)? else {
            return self.missing_context(
                game,
                format!("round {} was never recorded", game.round_id),
            );
        };

        if round.len() >= 2 {
            if let Some(outsider) = [winner.id, loser.id].into_iter().find(|id| !round.contains(id)) {
                return self.missing_context(
                    game,
                    format!("player {} is not part of round {}", outsider, round.id),
                );
            }
        }

        let mut field = FieldRatings::new();
        for participant in &round.participants {
            let rating = if participant == winner.id {
                winner.pre
            } else if participant == loser.id {
                loser.pre
            } else {
                self.store.get_current(participant)?.player_rating()
            };
            field.insert(participant.clone(), rating);
        }

        Ok((
            self.adjuster.adjust(&round, &field, winner.id, loser.id)?,
            self.adjuster.adjust(&round, &field, loser.id, winner.id)?,
        ))
    }

    fn missing_context(&self, game: &Match, reason: String) -> Result<(Adjustment, Adjustment)> {
        match self.config.unknown_input {
            UnknownInputPolicy::Reject => Err(RatingError::UnknownAdjustmentInput { reason }),
            UnknownInputPolicy::Neutral => {
                warn!(
                    "Match {}: {}, applying neutral adjustment",
                    game.id, reason
                );
                Ok((Adjustment::neutral(), Adjustment::neutral()))
            }
        }
    }

    fn delta(
        &self,
        game: &Match,
        side: &Side<'_>,
        opponent_id: &str,
        won: bool,
        update: &SideUpdate,
        adjustment: &Adjustment,
    ) -> RatingDelta {
        RatingDelta {
            match_id: game.id.clone(),
            round_id: game.round_id.clone(),
            player_id: side.id.to_string(),
            opponent_ids: vec![opponent_id.to_string()],
            won,
            pre_rating: side.latest.rating,
            post_rating: side.pre.rating + update.raw_change * adjustment.factor,
            pre_deviation: side.latest.deviation,
            post_deviation: self.config.clamp_deviation(update.deviation),
            raw_change: update.raw_change,
            adjustment_factor: adjustment.factor,
            timestamp: game.timestamp,
            games: game
                .score
                .map(|score| score.for_side(game.player_a == side.id)),
        }
    }
}

/// Returns `(winner, loser)` of a well-formed decided match
fn validate(game: &Match) -> Result<(&str, &str)> {
    if game.player_a == game.player_b {
        return Err(RatingError::InvalidMatch {
            match_id: game.id.clone(),
            reason: format!("player {} cannot face themselves", game.player_a),
        });
    }

    let winner = game.winner.as_deref().ok_or_else(|| RatingError::UndecidedMatch {
        match_id: game.id.clone(),
    })?;

    let loser = game
        .opponent_of(winner)
        .ok_or_else(|| RatingError::InvalidMatch {
            match_id: game.id.clone(),
            reason: format!("winner {} did not play in the match", winner),
        })?;

    Ok((winner, loser.as_str()))
}
