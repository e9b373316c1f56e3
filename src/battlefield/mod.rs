//! Battlefield generator
//!
//! Produces the map payload bound to every match: a spawn ring, loot zones
//! and the shrinking safe-zone phases.

pub mod generator;

pub use generator::{generate, LootRarity, LootZone, MapLayout, SafePhase, SpawnPoint};
