//! Viewer-specific rendering of session and match state
//!
//! A perspective view highlights the viewer's own squad and echoes the
//! viewer's cosmetic profile back as `playerAgent`.

use crate::battlefield::MapLayout;
use crate::cosmetics::CosmeticsProvider;
use crate::types::{CosmeticProfile, Match, PlayerSession, SessionStatus, Squad, UserId};
use crate::utils::current_timestamp;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Lead time of the synthetic start estimate shown on match creation
pub const ESTIMATED_START_DELAY_SECONDS: i64 = 3;

/// Client-facing match payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchView {
    pub match_id: String,
    pub mode: String,
    #[serde(rename = "map")]
    pub map_name: String,
    pub squads: Vec<Squad>,
    pub capacity: usize,
    pub player_count: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub map_layout: MapLayout,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_squad_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_squad: Option<Squad>,
    pub player_agent: CosmeticProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_start: Option<DateTime<Utc>>,
}

/// Client-facing session payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub status: SessionStatus,
    pub player_id: String,
    pub display_name: String,
    pub user_id: UserId,
    pub mode: String,
    pub squad_id: Option<String>,
    pub cosmetics: CosmeticProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub players_searching: Option<usize>,
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_view: Option<MatchView>,
}

/// Sentinel pushed to subscribers of a session that no longer exists
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedView {
    pub session_id: String,
    pub status: SessionStatus,
}

impl ClosedView {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            status: SessionStatus::Closed,
        }
    }
}

fn has_profile(profile: &CosmeticProfile) -> bool {
    match profile {
        CosmeticProfile::Null => false,
        CosmeticProfile::Object(map) => !map.is_empty(),
        _ => true,
    }
}

/// Render a match, optionally from a participant's point of view
pub fn serialize_match(
    game: &Match,
    viewer: Option<&PlayerSession>,
    cosmetics: &dyn CosmeticsProvider,
    include_estimate: bool,
) -> MatchView {
    let player_squad_id = viewer.and_then(|v| v.squad_id.clone());
    let player_squad = player_squad_id
        .as_deref()
        .and_then(|id| game.squad(id))
        .cloned();

    let player_agent = match viewer {
        Some(v) if has_profile(&v.cosmetic_profile) => v.cosmetic_profile.clone(),
        _ => cosmetics.player_agent_payload(),
    };

    MatchView {
        match_id: game.match_id.clone(),
        mode: game.mode.clone(),
        map_name: game.map_name.clone(),
        squads: game.squads.clone(),
        capacity: game.capacity,
        player_count: game.player_count(),
        started_at: game.started_at,
        map_layout: game.map_layout.clone(),
        player_squad_id,
        player_squad,
        player_agent,
        estimated_start: include_estimate
            .then(|| current_timestamp() + Duration::seconds(ESTIMATED_START_DELAY_SECONDS)),
    }
}

/// Render a session; queue info is only attached while waiting
pub fn serialize_session(session: &PlayerSession, queue: Option<(usize, usize)>) -> SessionView {
    let queue = queue.filter(|_| session.is_waiting());

    SessionView {
        session_id: session.session_id.clone(),
        status: session.status,
        player_id: session.player_id.clone(),
        display_name: session.display_name.clone(),
        user_id: session.user_id,
        mode: session.mode.clone(),
        squad_id: session.squad_id.clone(),
        cosmetics: session.cosmetic_profile.clone(),
        queue_position: queue.map(|(position, _)| position),
        players_searching: queue.map(|(_, size)| size),
        match_view: session.match_view.clone(),
    }
}
