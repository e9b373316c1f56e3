//! Dropzone Matchmaker - lobby matchmaking core for squad-based matches
//!
//! This crate queues player sessions per game mode, assembles matches on a
//! periodic schedule (filling empty slots with bots), generates a battlefield
//! for each match and pushes per-player views to live connections.

pub mod battlefield;
pub mod bot;
pub mod config;
pub mod cosmetics;
pub mod error;
pub mod lobby;
pub mod metrics;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use cosmetics::{CosmeticsProvider, StaticCosmeticsProvider};
pub use lobby::{Matchmaker, MatchmakerConfig, ModeProvider, StaticModeProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
