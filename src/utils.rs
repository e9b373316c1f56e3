//! Utility functions for the matchmaking core

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique session ID
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a new in-match player handle (distinct from the account id)
pub fn generate_player_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a new unique match ID
pub fn generate_match_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a short squad ID, e.g. `squad-3fa9c2`
pub fn generate_squad_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("squad-{}", &hex[..6])
}

/// Generate a player handle for a bot participant
pub fn generate_bot_id() -> String {
    format!("bot-{}", Uuid::new_v4())
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Round to two decimal places (map coordinates)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to three decimal places (rotations)
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        assert_ne!(generate_session_id(), generate_session_id());
        assert_ne!(generate_match_id(), generate_match_id());
        assert_ne!(generate_player_id(), generate_player_id());
    }

    #[test]
    fn test_squad_id_shape() {
        let id = generate_squad_id();
        assert!(id.starts_with("squad-"));
        assert_eq!(id.len(), "squad-".len() + 6);
    }

    #[test]
    fn test_bot_id_prefix() {
        assert!(generate_bot_id().starts_with("bot-"));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round2(949.99999), 950.0);
        assert_eq!(round2(-12.346), -12.35);
        assert_eq!(round3(1.04719755), 1.047);
    }
}
