//! Inactivity rule: deviation grows while a player is away

use crate::config::RatingConfig;
use crate::types::RatingSnapshot;
use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, PartialEq)]
pub struct InactivityPolicy {
    pub stale_window_days: f64,
    pub inflation_per_day: f64,
    pub deviation_floor: f64,
    pub max_deviation: f64,
}

impl From<&RatingConfig> for InactivityPolicy {
    fn from(config: &RatingConfig) -> Self {
        Self {
            stale_window_days: config.stale_window_days,
            inflation_per_day: config.inflation_per_day,
            deviation_floor: config.deviation_floor,
            max_deviation: config.max_deviation,
        }
    }
}

impl InactivityPolicy {
    /// Deviation to use for a match at `at`, given the player's latest snapshot.
    ///
    /// Players who were inactive longer than the staleness window get
    /// `inflation_per_day` added for every elapsed day, clamped to
    /// `[deviation_floor, max_deviation]`. The initial snapshot never decays.
    pub fn effective_deviation(&self, latest: &RatingSnapshot, at: DateTime<Utc>) -> f64 {
        if latest.is_initial() {
            return latest.deviation;
        }

        let days = elapsed_days(latest.timestamp, at);
        if days <= self.stale_window_days {
            return latest.deviation;
        }

        (latest.deviation + self.inflation_per_day * days)
            .clamp(self.deviation_floor, self.max_deviation)
    }

    pub fn is_stale(&self, latest: &RatingSnapshot, at: DateTime<Utc>) -> bool {
        !latest.is_initial() && elapsed_days(latest.timestamp, at) > self.stale_window_days
    }
}

fn elapsed_days(since: DateTime<Utc>, at: DateTime<Utc>) -> f64 {
    let seconds = at.signed_duration_since(since).num_seconds().max(0);
    seconds as f64 / SECONDS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlayerRating;
    use chrono::{Duration, TimeZone};

    fn policy() -> InactivityPolicy {
        InactivityPolicy::from(&RatingConfig::default())
    }

    fn played(deviation: f64, at: DateTime<Utc>) -> RatingSnapshot {
        RatingSnapshot::after_match(
            PlayerRating {
                rating: 1500.0,
                deviation,
            },
            at,
            "m1",
        )
    }

    #[test]
    fn test_recent_player_unchanged() {
        let last = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let snapshot = played(120.0, last);

        let at = last + Duration::days(30);
        assert_eq!(policy().effective_deviation(&snapshot, at), 120.0);
        assert!(!policy().is_stale(&snapshot, at));
    }

    #[test]
    fn test_stale_player_inflated_proportionally() {
        let last = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let snapshot = played(120.0, last);

        let at = last + Duration::days(100);
        let inflated = policy().effective_deviation(&snapshot, at);
        assert!((inflated - 170.0).abs() < 1e-9);
        assert!(policy().is_stale(&snapshot, at));
    }

    #[test]
    fn test_inflation_clamped_to_maximum() {
        let last = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let snapshot = played(300.0, last);

        let at = last + Duration::days(1000);
        assert_eq!(policy().effective_deviation(&snapshot, at), 350.0);
    }

    #[test]
    fn test_initial_snapshot_never_decays() {
        let snapshot = RatingSnapshot::initial(PlayerRating::default());
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(policy().effective_deviation(&snapshot, at), 200.0);
        assert!(!policy().is_stale(&snapshot, at));
    }
}
