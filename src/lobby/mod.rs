//! Lobby matchmaking core
//!
//! This module handles session queueing, match assembly and live updates.
//! All state lives in [`Matchmaker`], which serializes access through a
//! single lock and is driven by the periodic scheduler.

pub mod assembler;
pub mod fanout;
pub mod manager;
pub mod perspective;
pub mod provider;
pub mod queue;
pub mod registry;
pub mod scheduler;

// Re-export commonly used types
pub use assembler::MatchAssembler;
pub use fanout::{
    ChannelConnection, ConnectionId, DeliveryReport, FanoutError, LiveConnection, LiveFrame,
};
pub use manager::{Matchmaker, MatchmakerConfig, MatchmakerStats, TickReport};
pub use perspective::{ClosedView, MatchView, SessionView};
pub use provider::{ModeProvider, StaticModeProvider};
pub use scheduler::{AssemblyTrigger, SchedulerPolicy};
