//! Procedural battlefield layout generation
//!
//! The shape of a layout is fixed by the squad count and capacity; only the
//! safe-zone drift depends on the random source.

use crate::utils::{round2, round3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Radius of the spawn ring
pub const SPAWN_RADIUS: f64 = 950.0;
/// Radius the first shrink step starts from
pub const BASE_SAFE_RADIUS: f64 = 1100.0;
/// Radius lost per phase
pub const SHRINK_STEP: f64 = 160.0;
/// Smallest allowed safe-zone radius
pub const MIN_SAFE_RADIUS: f64 = 220.0;
/// Number of shrink phases, independent of capacity
pub const PHASE_COUNT: u32 = 5;
/// Per-axis bound of the safe-zone center drift per phase
pub const CENTER_JITTER: f64 = 120.0;

pub const BIOME: &str = "Apex Expanse";

/// Spawn location on the ring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub id: String,
    pub position: [f64; 3],
    /// Yaw facing the ring center
    pub rotation: [f64; 3],
    /// Squad index, assigned round-robin
    pub squad: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LootRarity {
    Rare,
    Epic,
    Legendary,
}

/// Named loot area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootZone {
    pub name: String,
    pub position: [f64; 3],
    pub radius: f64,
    pub rarity: LootRarity,
}

/// One step of the shrinking play area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafePhase {
    pub phase: u32,
    pub radius: f64,
    /// Phase length in seconds
    pub duration: u32,
    pub center: [f64; 3],
}

/// Complete map payload attached to a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapLayout {
    pub spawn_points: Vec<SpawnPoint>,
    pub loot_zones: Vec<LootZone>,
    pub safe_phases: Vec<SafePhase>,
    pub biome: String,
}

/// Generate a battlefield for `capacity` participants split into `squad_count` squads
pub fn generate<R: Rng + ?Sized>(squad_count: usize, capacity: usize, rng: &mut R) -> MapLayout {
    MapLayout {
        spawn_points: spawn_ring(squad_count, capacity),
        loot_zones: loot_zones(),
        safe_phases: safe_phases(rng),
        biome: BIOME.to_string(),
    }
}

fn spawn_ring(squad_count: usize, capacity: usize) -> Vec<SpawnPoint> {
    let squads = squad_count.max(1);
    (0..capacity)
        .map(|index| {
            let angle = 2.0 * PI * index as f64 / capacity as f64;
            SpawnPoint {
                id: format!("spawn-{}", index),
                position: [
                    round2(angle.cos() * SPAWN_RADIUS),
                    0.0,
                    round2(angle.sin() * SPAWN_RADIUS),
                ],
                rotation: [0.0, round3(-angle), 0.0],
                squad: index % squads,
            }
        })
        .collect()
}

fn loot_zones() -> Vec<LootZone> {
    vec![
        LootZone {
            name: "Zenith Dome".to_string(),
            position: [0.0, 0.0, 0.0],
            radius: 140.0,
            rarity: LootRarity::Legendary,
        },
        LootZone {
            name: "Orbital Market".to_string(),
            position: [420.0, 0.0, -260.0],
            radius: 110.0,
            rarity: LootRarity::Rare,
        },
        LootZone {
            name: "Prism Hangar".to_string(),
            position: [-360.0, 0.0, 340.0],
            radius: 130.0,
            rarity: LootRarity::Epic,
        },
    ]
}

fn safe_phases<R: Rng + ?Sized>(rng: &mut R) -> Vec<SafePhase> {
    let mut phases = Vec::with_capacity(PHASE_COUNT as usize);
    let mut center = (0.0_f64, 0.0_f64);
    let mut previous_radius = BASE_SAFE_RADIUS;

    for phase in 1..=PHASE_COUNT {
        let radius = (BASE_SAFE_RADIUS - phase as f64 * SHRINK_STEP).max(MIN_SAFE_RADIUS);

        // The new circle stays inside the previous one
        let max_shift = (previous_radius - radius).clamp(0.0, CENTER_JITTER);
        let mut dx = rng.gen_range(-CENTER_JITTER..=CENTER_JITTER);
        let mut dz = rng.gen_range(-CENTER_JITTER..=CENTER_JITTER);
        let shift = (dx * dx + dz * dz).sqrt();
        if shift > max_shift {
            let scale = if shift > 0.0 { max_shift / shift } else { 0.0 };
            dx *= scale;
            dz *= scale;
        }
        center = (center.0 + dx, center.1 + dz);

        phases.push(SafePhase {
            phase,
            radius: round2(radius),
            duration: 120 + phase * 30,
            center: [round2(center.0), 0.0, round2(center.1)],
        });
        previous_radius = radius;
    }

    phases
}
