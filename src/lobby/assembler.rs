//! Match assembly
//!
//! Turns an ordered list of waiting sessions into a [`Match`]: humans fill
//! squads in order, bots take the remaining slots, and every human gets a
//! cached perspective view of the result.

use crate::battlefield;
use crate::bot::BotFiller;
use crate::config::ModeRule;
use crate::cosmetics::CosmeticsProvider;
use crate::lobby::perspective::serialize_match;
use crate::lobby::registry::SessionRegistry;
use crate::types::{Match, Member, PlayerSession, SessionId, Squad};
use crate::utils::{current_timestamp, generate_match_id, generate_squad_id};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, info};

/// Cosmetic (mode label, map name) pairs a match is dressed up with
pub const MATCH_FLAVORS: [(&str, &str); 3] = [
    ("Orbital Assault", "Nova Prime Station"),
    ("Data Rush", "Suspended Citadel"),
    ("Dominion", "Electric Canyon"),
];

/// Squad colors, indexed by squad order
pub const TEAM_COLORS: [&str; 6] = [
    "#5ffff1", "#ff6ad5", "#ffd166", "#7b8bff", "#50fa7b", "#ff5555",
];

pub fn team_color(index: usize) -> &'static str {
    TEAM_COLORS[index % TEAM_COLORS.len()]
}

fn human_member(session: &PlayerSession) -> Member {
    Member {
        player_id: session.player_id.clone(),
        display_name: session.display_name.clone(),
        is_bot: false,
        cosmetics: session.cosmetic_profile.clone(),
        behavior: None,
    }
}

pub struct MatchAssembler {
    cosmetics: Arc<dyn CosmeticsProvider>,
    bot_filler: BotFiller,
}

impl MatchAssembler {
    pub fn new(cosmetics: Arc<dyn CosmeticsProvider>) -> Self {
        Self {
            bot_filler: BotFiller::new(cosmetics.clone()),
            cosmetics,
        }
    }

    pub fn with_bot_filler(cosmetics: Arc<dyn CosmeticsProvider>, bot_filler: BotFiller) -> Self {
        Self {
            cosmetics,
            bot_filler,
        }
    }

    /// Assemble a match from the given waiting sessions, oldest first
    ///
    /// Participants are moved to `Matched` and leave their queue. Unknown ids
    /// are skipped; callers pass ids they just read from the registry.
    ///
    /// # Panics
    ///
    /// If `participants` is empty or exceeds the mode's capacity.
    pub fn create_match(
        &self,
        registry: &mut SessionRegistry,
        participants: &[SessionId],
        rule: &ModeRule,
        rng: &mut StdRng,
    ) -> Match {
        assert!(!participants.is_empty(), "cannot assemble a match without participants");
        assert!(
            participants.len() <= rule.players_per_match,
            "{} participants exceed capacity {} of mode '{}'",
            participants.len(),
            rule.players_per_match,
            rule.key
        );

        let match_id = generate_match_id();
        let (label, map_name) = MATCH_FLAVORS
            .choose(rng)
            .copied()
            .unwrap_or(MATCH_FLAVORS[0]);
        let capacity = rule.players_per_match;
        let team_size = rule.team_size;

        let mut squads: Vec<Squad> = Vec::new();
        let mut humans: Vec<SessionId> = Vec::with_capacity(participants.len());

        for session_id in participants {
            let Some(session) = registry.get_mut(session_id) else {
                debug!("Skipping vanished participant {}", session_id);
                continue;
            };
            let squad = squad_slot(&mut squads, humans.len() / team_size);
            squad.members.push(human_member(session));
            squad.is_bot_squad = false;
            session.assign_match(match_id.clone(), squad.squad_id.clone());
            humans.push(session_id.clone());
            registry.dequeue(session_id);
        }

        let bots = self
            .bot_filler
            .draft(capacity.saturating_sub(humans.len()), rng);
        let bot_count = bots.len();
        for (offset, bot) in bots.into_iter().enumerate() {
            let squad = squad_slot(&mut squads, (humans.len() + offset) / team_size);
            squad.members.push(bot);
        }

        let map_layout = battlefield::generate(squads.len(), capacity, rng);
        let game = Match {
            match_id: match_id.clone(),
            mode: label.to_string(),
            queue_mode: rule.key.clone(),
            map_name: map_name.to_string(),
            capacity,
            created_at: current_timestamp(),
            started_at: None,
            squads,
            map_layout,
        };

        for session_id in &humans {
            if let Some(session) = registry.get_mut(session_id) {
                let view = serialize_match(&game, Some(&*session), self.cosmetics.as_ref(), true);
                session.match_view = Some(view);
            }
        }

        info!(
            "Assembled match {} for mode '{}': {} humans, {} bots, {} squads on {}",
            match_id,
            rule.key,
            humans.len(),
            bot_count,
            game.squads.len(),
            map_name
        );

        game
    }
}

/// Squad at `index`, opening new squads as needed
fn squad_slot(squads: &mut Vec<Squad>, index: usize) -> &mut Squad {
    while squads.len() <= index {
        squads.push(Squad {
            squad_id: generate_squad_id(),
            members: Vec::new(),
            is_bot_squad: true,
            team_color: team_color(squads.len()).to_string(),
        });
    }
    &mut squads[index]
}
