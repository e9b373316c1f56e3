//! Cosmetics collaborator
//!
//! Supplies agent profiles for bot fill and for viewers without their own
//! profile. The matchmaking core never mutates cosmetic state.

pub mod provider;

pub use provider::{AnimationSet, CosmeticsProvider, Outfit, StaticCosmeticsProvider};
