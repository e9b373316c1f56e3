//! Bot fill for under-capacity matches
//!
//! When too few humans are queued, the remaining slots of a match are taken
//! by bots drafted here: names come from a shuffled pool (wrapping when the
//! pool is exhausted), behavior is uniform over the fixed tag set, and the
//! outfit is delegated to the cosmetics collaborator.

use crate::cosmetics::CosmeticsProvider;
use crate::types::{BotBehavior, Member};
use crate::utils::generate_bot_id;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use tracing::debug;

/// Default bot name pool
pub const BOT_NAMES: [&str; 10] = [
    "Specter-09",
    "NovaWarden",
    "PulseShade",
    "Vector Lynx",
    "Iris Vanguard",
    "EchoMancer",
    "Zephyr Fang",
    "Atlas Ronin",
    "Sable Riot",
    "Quantum Viper",
];

/// Drafts bot members for match fill
#[derive(Clone)]
pub struct BotFiller {
    names: Vec<String>,
    cosmetics: Arc<dyn CosmeticsProvider>,
}

impl BotFiller {
    pub fn new(cosmetics: Arc<dyn CosmeticsProvider>) -> Self {
        Self::with_names(cosmetics, BOT_NAMES.iter().map(|n| n.to_string()).collect())
    }

    /// Use a custom name pool; an empty pool falls back to the default one
    pub fn with_names(cosmetics: Arc<dyn CosmeticsProvider>, names: Vec<String>) -> Self {
        let names = if names.is_empty() {
            BOT_NAMES.iter().map(|n| n.to_string()).collect()
        } else {
            names
        };
        Self { names, cosmetics }
    }

    /// Draft `count` bot members
    pub fn draft<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<Member> {
        if count == 0 {
            return Vec::new();
        }

        let mut pool = self.names.clone();
        pool.shuffle(rng);

        let bots: Vec<Member> = (0..count)
            .map(|slot| {
                let behavior = BotBehavior::ALL
                    .choose(rng)
                    .copied()
                    .unwrap_or(BotBehavior::Balanced);
                Member {
                    player_id: generate_bot_id(),
                    display_name: pool[slot % pool.len()].clone(),
                    is_bot: true,
                    cosmetics: self.cosmetics.random_outfit(),
                    behavior: Some(behavior),
                }
            })
            .collect();

        debug!("Drafted {} bots from a pool of {}", bots.len(), pool.len());
        bots
    }
}
