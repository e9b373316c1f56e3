//! Bot integration
//!
//! Bots never queue on their own; they are drafted by the match assembler to
//! fill the slots humans left open.

pub mod backfill;

pub use backfill::{BotFiller, BOT_NAMES};
