//! Mode rule configuration
//!
//! A mode is a named matchmaking pool. Its rule fixes the squad size and the
//! number of participants (humans plus bots) in every match it produces.

use crate::error::{MatchmakingError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Static per-mode configuration, immutable after process start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeRule {
    /// Queue partition key used by `enqueue`
    pub key: String,
    /// Human-readable label
    pub label: String,
    /// Squad capacity
    pub team_size: usize,
    /// Match capacity
    pub players_per_match: usize,
}

impl ModeRule {
    pub fn new(key: &str, label: &str, team_size: usize, players_per_match: usize) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            team_size,
            players_per_match,
        }
    }

    pub fn solo() -> Self {
        Self::new("solo", "Solo", 1, 12)
    }

    pub fn duo() -> Self {
        Self::new("duo", "Duo", 2, 12)
    }

    pub fn squad() -> Self {
        Self::new("squad", "Squad", 4, 8)
    }

    /// Default mode catalog
    pub fn defaults() -> Vec<Self> {
        vec![Self::solo(), Self::duo(), Self::squad()]
    }

    /// Number of squads in a full match
    pub fn squad_count(&self) -> usize {
        self.players_per_match.div_ceil(self.team_size)
    }

    /// Validate rule values
    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(MatchmakingError::ConfigurationError {
                message: "Mode key cannot be empty".to_string(),
            }
            .into());
        }

        if self.team_size == 0 {
            return Err(MatchmakingError::ConfigurationError {
                message: format!("Mode '{}': team_size must be at least 1", self.key),
            }
            .into());
        }

        if self.players_per_match < self.team_size {
            return Err(MatchmakingError::ConfigurationError {
                message: format!(
                    "Mode '{}': players_per_match ({}) cannot be below team_size ({})",
                    self.key, self.players_per_match, self.team_size
                ),
            }
            .into());
        }

        if self.players_per_match % self.team_size != 0 {
            warn!(
                "Mode '{}': players_per_match {} is not a multiple of team_size {}, last squad will be partial",
                self.key, self.players_per_match, self.team_size
            );
        }

        Ok(())
    }
}
