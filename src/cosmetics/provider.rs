//! Cosmetics collaborator interface and the static catalog implementation
//!
//! The matchmaking core only reads agent profiles: one for bot fill and one
//! default profile for viewers that did not supply their own.

use crate::types::CosmeticProfile;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

/// Read-only cosmetics lookups used by the matchmaking core
#[cfg_attr(test, mockall::automock)]
pub trait CosmeticsProvider: Send + Sync {
    /// Agent profile for a bot participant
    fn random_outfit(&self) -> CosmeticProfile;

    /// Default agent profile for viewers without their own
    fn player_agent_payload(&self) -> CosmeticProfile;
}

/// Collection of animation clip bindings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationSet {
    pub id: String,
    pub name: String,
    pub clips: HashMap<String, String>,
}

/// A playable outfit bound to an animation set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outfit {
    pub id: String,
    pub name: String,
    pub rarity: String,
    pub model_url: String,
    pub thumbnail_url: String,
    pub animation_set_id: String,
}

/// In-memory catalog seeded with the default outfits
pub struct StaticCosmeticsProvider {
    outfits: Vec<Outfit>,
    animation_sets: HashMap<String, AnimationSet>,
    equipped_outfit: usize,
    rng: Mutex<StdRng>,
}

fn clips(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl StaticCosmeticsProvider {
    /// Create the default catalog with an entropy-seeded rng
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create the default catalog with a fixed seed
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let tactical = AnimationSet {
            id: "anim-tactical".to_string(),
            name: "Tactical".to_string(),
            clips: clips(&[
                ("idle", "Idle"),
                ("run", "Run"),
                ("sprint", "Run"),
                ("aim", "Aim"),
                ("fire", "Aim_Shoot"),
                ("hit", "HitReact"),
            ]),
        };
        let recon = AnimationSet {
            id: "anim-recon".to_string(),
            name: "Recon".to_string(),
            clips: clips(&[
                ("idle", "Idle"),
                ("run", "Walk"),
                ("sprint", "Run"),
                ("aim", "Aim"),
                ("fire", "Aim_Shoot"),
                ("hit", "HitReact"),
            ]),
        };

        let outfits = vec![
            Outfit {
                id: "outfit-sentinel".to_string(),
                name: "Prism Sentinel".to_string(),
                rarity: "epic".to_string(),
                model_url: "https://cdn.jsdelivr.net/gh/KhronosGroup/glTF-Sample-Models@master/2.0/Soldier/glTF/Soldier.glb".to_string(),
                thumbnail_url: "/static/img/outfit-sentinel.png".to_string(),
                animation_set_id: tactical.id.clone(),
            },
            Outfit {
                id: "outfit-striker".to_string(),
                name: "Eclipse Striker".to_string(),
                rarity: "legendary".to_string(),
                model_url: "https://cdn.jsdelivr.net/gh/KhronosGroup/glTF-Sample-Models@master/2.0/RiggedSimple/glTF/RiggedSimple.gltf".to_string(),
                thumbnail_url: "/static/img/outfit-striker.png".to_string(),
                animation_set_id: recon.id.clone(),
            },
        ];

        let animation_sets = [tactical, recon]
            .into_iter()
            .map(|set| (set.id.clone(), set))
            .collect();

        Self {
            outfits,
            animation_sets,
            equipped_outfit: 0,
            rng: Mutex::new(rng),
        }
    }

    /// All catalog outfits
    pub fn outfits(&self) -> &[Outfit] {
        &self.outfits
    }

    fn agent_payload(&self, outfit: &Outfit) -> CosmeticProfile {
        let bindings = self
            .animation_sets
            .get(&outfit.animation_set_id)
            .map(|set| set.clips.clone())
            .unwrap_or_default();

        json!({
            "outfitId": outfit.id,
            "name": outfit.name,
            "modelUrl": outfit.model_url,
            "thumbnailUrl": outfit.thumbnail_url,
            "animationSetId": outfit.animation_set_id,
            "animationBindings": bindings,
        })
    }
}

impl Default for StaticCosmeticsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CosmeticsProvider for StaticCosmeticsProvider {
    fn random_outfit(&self) -> CosmeticProfile {
        // A poisoned rng is still a usable rng
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        match self.outfits.choose(&mut *rng) {
            Some(outfit) => self.agent_payload(outfit),
            None => CosmeticProfile::Null,
        }
    }

    fn player_agent_payload(&self) -> CosmeticProfile {
        match self.outfits.get(self.equipped_outfit) {
            Some(outfit) => self.agent_payload(outfit),
            None => CosmeticProfile::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_agent_payload_uses_equipped_outfit() {
        let provider = StaticCosmeticsProvider::with_seed(1);
        let payload = provider.player_agent_payload();
        assert_eq!(payload["outfitId"], "outfit-sentinel");
        assert_eq!(payload["animationSetId"], "anim-tactical");
        assert_eq!(payload["animationBindings"]["fire"], "Aim_Shoot");
    }

    #[test]
    fn test_random_outfit_comes_from_catalog() {
        let provider = StaticCosmeticsProvider::with_seed(42);
        let ids: Vec<&str> = provider.outfits().iter().map(|o| o.id.as_str()).collect();

        for _ in 0..20 {
            let payload = provider.random_outfit();
            let id = payload["outfitId"].as_str().unwrap();
            assert!(ids.contains(&id));
        }
    }

    #[test]
    fn test_seeded_catalog_is_reproducible() {
        let a = StaticCosmeticsProvider::with_seed(9);
        let b = StaticCosmeticsProvider::with_seed(9);
        for _ in 0..10 {
            assert_eq!(a.random_outfit(), b.random_outfit());
        }
    }
}
