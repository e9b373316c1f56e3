//! Common types used throughout the matchmaking core

use crate::battlefield::MapLayout;
use crate::lobby::perspective::MatchView;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::time::{Duration, Instant};

/// Opaque handle for a queued/matched session
pub type SessionId = String;

/// Account identifier supplied by the caller
pub type UserId = u64;

/// Unique identifier for matches
pub type MatchId = String;

/// Unique identifier for squads within a match
pub type SquadId = String;

/// Cosmetic payload supplied by the caller, passed through unmodified
pub type CosmeticProfile = serde_json::Value;

/// Lifecycle status of a player session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Matched,
    Playing,
    Closed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Waiting => write!(f, "waiting"),
            SessionStatus::Matched => write!(f, "matched"),
            SessionStatus::Playing => write!(f, "playing"),
            SessionStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Behavior tag handed to bot participants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotBehavior {
    Aggressive,
    Balanced,
    Defensive,
}

impl BotBehavior {
    pub const ALL: [BotBehavior; 3] = [
        BotBehavior::Aggressive,
        BotBehavior::Balanced,
        BotBehavior::Defensive,
    ];
}

/// One participant (human or bot) inside a squad
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub player_id: String,
    pub display_name: String,
    pub is_bot: bool,
    pub cosmetics: CosmeticProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavior: Option<BotBehavior>,
}

/// Sub-team within a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Squad {
    pub squad_id: SquadId,
    pub members: Vec<Member>,
    /// True iff the squad has zero human members
    pub is_bot_squad: bool,
    pub team_color: String,
}

impl Squad {
    pub fn human_count(&self) -> usize {
        self.members.iter().filter(|m| !m.is_bot).count()
    }

    pub fn bot_count(&self) -> usize {
        self.members.len() - self.human_count()
    }
}

/// An assembled game instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub match_id: MatchId,
    /// Display label, picked from the flavor catalog
    pub mode: String,
    /// Queue partition the participants came from
    pub queue_mode: String,
    pub map_name: String,
    pub capacity: usize,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub squads: Vec<Squad>,
    pub map_layout: MapLayout,
}

impl Match {
    pub fn player_count(&self) -> usize {
        self.squads.iter().map(|s| s.members.len()).sum()
    }

    pub fn human_count(&self) -> usize {
        self.squads.iter().map(Squad::human_count).sum()
    }

    pub fn bot_count(&self) -> usize {
        self.player_count() - self.human_count()
    }

    pub fn squad(&self, squad_id: &str) -> Option<&Squad> {
        self.squads.iter().find(|s| s.squad_id == squad_id)
    }
}

/// One queued/matched/playing participant
#[derive(Debug, Clone)]
pub struct PlayerSession {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub player_id: String,
    pub display_name: String,
    pub mode: String,
    pub team_size: usize,
    pub capacity: usize,
    /// Monotonic join time, used by the scheduler's wait policies
    pub joined_at: Instant,
    pub status: SessionStatus,
    pub match_id: Option<MatchId>,
    pub squad_id: Option<SquadId>,
    pub cosmetic_profile: CosmeticProfile,
    pub last_update: DateTime<Utc>,
    /// Perspective view of the match rendered when the session was matched
    pub(crate) match_view: Option<MatchView>,
}

impl PlayerSession {
    pub fn is_waiting(&self) -> bool {
        self.status == SessionStatus::Waiting
    }

    /// Time spent since enqueue, saturating at zero
    pub fn waited(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.joined_at)
    }

    /// Bind the session to a match; match and squad are always set together
    pub(crate) fn assign_match(&mut self, match_id: MatchId, squad_id: SquadId) {
        self.status = SessionStatus::Matched;
        self.match_id = Some(match_id);
        self.squad_id = Some(squad_id);
        self.last_update = crate::utils::current_timestamp();
    }
}

/// Aggregate lobby activity counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbySnapshot {
    pub online_players: usize,
    pub searching: usize,
    pub active_matches: usize,
}

/// Status per user id
pub type PresenceSnapshot = HashMap<UserId, SessionStatus>;
