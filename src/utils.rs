//! Utility functions for the rating service

use crate::types::RunId;
use uuid::Uuid;

/// Generate a new unique batch run ID
pub fn generate_run_id() -> RunId {
    Uuid::new_v4()
}

/// Rating minus two deviations, the value a player is very likely above
pub fn conservative_rating(rating: f64, deviation: f64) -> f64 {
    rating - 2.0 * deviation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_run_id();
        let id2 = generate_run_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_conservative_rating() {
        assert_eq!(conservative_rating(1500.0, 200.0), 1100.0);
        assert_eq!(conservative_rating(1800.0, 50.0), 1700.0);
    }
}
