//! Splitting a feed into independent groups

use crate::types::{Match, PlayerId, RoundId, TournamentRound};
use std::collections::HashMap;

/// Disjoint sets over player ids
#[derive(Debug, Default)]
struct PlayerGroups {
    slots: HashMap<PlayerId, usize>,
    parent: Vec<usize>,
}

impl PlayerGroups {
    fn slot(&mut self, player_id: &str) -> usize {
        if let Some(&slot) = self.slots.get(player_id) {
            return slot;
        }
        let slot = self.parent.len();
        self.parent.push(slot);
        self.slots.insert(player_id.to_string(), slot);
        slot
    }

    fn find(&mut self, mut slot: usize) -> usize {
        while self.parent[slot] != slot {
            self.parent[slot] = self.parent[self.parent[slot]];
            slot = self.parent[slot];
        }
        slot
    }

    fn union(&mut self, a: &str, b: &str) {
        let (a, b) = (self.slot(a), self.slot(b));
        let (root_a, root_b) = (self.find(a), self.find(b));
        if root_a != root_b {
            self.parent[root_b.max(root_a)] = root_a.min(root_b);
        }
    }

    fn root_of(&mut self, player_id: &str) -> usize {
        let slot = self.slot(player_id);
        self.find(slot)
    }
}

/// Split matches into groups that share no player.
///
/// Players sharing a round are joined too, because a round's field ratings
/// feed into every match of that round. Each group keeps the input order of
/// its matches; groups are ordered by their first match.
pub fn partition(
    matches: Vec<Match>,
    rounds: &HashMap<RoundId, TournamentRound>,
) -> Vec<Vec<Match>> {
    let mut sets = PlayerGroups::default();

    for game in &matches {
        sets.union(&game.player_a, &game.player_b);
        if let Some(round) = rounds.get(&game.round_id) {
            for participant in &round.participants {
                sets.union(&game.player_a, participant);
            }
        }
    }

    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<Vec<Match>> = Vec::new();
    for game in matches {
        let root = sets.root_of(&game.player_a);
        let index = *group_of_root.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[index].push(game);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn game(id: &str, a: &str, b: &str, round: &str, minute: i64) -> Match {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap() + Duration::minutes(minute);
        Match::decided(id, a, b, a, at, round)
    }

    fn ids(group: &[Match]) -> Vec<&str> {
        group.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn test_disjoint_players_split() {
        let matches = vec![
            game("m1", "a", "b", "r1", 0),
            game("m2", "c", "d", "r2", 1),
            game("m3", "b", "e", "r3", 2),
        ];

        let groups = partition(matches, &HashMap::new());
        assert_eq!(groups.len(), 2);
        assert_eq!(ids(&groups[0]), vec!["m1", "m3"]);
        assert_eq!(ids(&groups[1]), vec!["m2"]);
    }

    #[test]
    fn test_transitive_connection_merges() {
        let matches = vec![
            game("m1", "a", "b", "r", 0),
            game("m2", "c", "d", "r", 1),
            game("m3", "b", "c", "r", 2),
        ];

        let groups = partition(matches, &HashMap::new());
        assert_eq!(groups.len(), 1);
        assert_eq!(ids(&groups[0]), vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn test_shared_round_merges() {
        let mut rounds = HashMap::new();
        rounds.insert(
            "r1".to_string(),
            TournamentRound::new("r1", ["a", "b", "c", "d"]),
        );
        let matches = vec![game("m1", "a", "b", "r1", 0), game("m2", "c", "d", "r1", 0)];

        let groups = partition(matches, &rounds);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_empty_feed() {
        assert!(partition(Vec::new(), &HashMap::new()).is_empty());
    }
}
