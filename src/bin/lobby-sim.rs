//! Lobby Simulator CLI Tool
//!
//! Drives an in-process matchmaker with synthetic players on a virtual clock
//! and prints the assembled matches.
//!
//! Usage:
//!   cargo run --bin lobby-sim -- --help
//!   cargo run --bin lobby-sim -- --mode squad --players 13 --seed 42
//!   cargo run --bin lobby-sim -- --mode duo --players 5 --step-ms 1000 --full-views

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use dropzone_matchmaker::config::{validate_config, AppConfig};
use dropzone_matchmaker::lobby::{Matchmaker, MatchmakerConfig, StaticModeProvider};
use dropzone_matchmaker::StaticCosmeticsProvider;
use serde_json::json;
use tokio::time::Instant;

#[derive(Parser)]
#[command(name = "lobby-sim")]
#[command(about = "Simulate matchmaking for a burst of players on a virtual clock")]
struct Cli {
    /// Mode key to queue into
    #[arg(short, long, default_value = "squad")]
    mode: String,

    /// Number of players to enqueue
    #[arg(short, long, default_value = "8")]
    players: usize,

    /// RNG seed for reproducible matches
    #[arg(short, long)]
    seed: Option<u64>,

    /// Virtual time between scheduler ticks
    #[arg(long, default_value = "500")]
    step_ms: u64,

    /// Stop after this many ticks even if players are still waiting
    #[arg(long, default_value = "64")]
    max_ticks: u32,

    /// Quick start threshold override
    #[arg(long)]
    quick_start_ms: Option<u64>,

    /// Max wait threshold override
    #[arg(long)]
    max_wait_ms: Option<u64>,

    /// Print the full match views instead of a summary
    #[arg(long)]
    full_views: bool,
}

/// Default modes with the command line overrides applied
fn build_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::with_default_modes();
    config.matchmaking.rng_seed = cli.seed;
    if let Some(quick_start) = cli.quick_start_ms {
        config.matchmaking.quick_start_ms = quick_start;
    }
    if let Some(max_wait) = cli.max_wait_ms {
        config.matchmaking.max_wait_ms = max_wait;
    }
    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();
    if cli.step_ms == 0 {
        bail!("--step-ms must be greater than 0");
    }

    let config = build_config(&cli)?;

    let cosmetics = match cli.seed {
        Some(seed) => StaticCosmeticsProvider::with_seed(seed),
        None => StaticCosmeticsProvider::new(),
    };
    let matchmaker = Matchmaker::new(
        Arc::new(StaticModeProvider::with_rules(config.modes.clone())?),
        Arc::new(cosmetics),
        MatchmakerConfig::from(&config),
    )?;

    println!(
        "🎮 Simulating {} players in mode '{}' (quick start {}ms, max wait {}ms)",
        cli.players, cli.mode, config.matchmaking.quick_start_ms, config.matchmaking.max_wait_ms
    );

    for i in 0..cli.players {
        matchmaker
            .enqueue(
                i as u64 + 1,
                &format!("Pilot {:02}", i + 1),
                json!({ "outfitId": "outfit-sentinel" }),
                &cli.mode,
            )
            .await?;
    }

    let start = Instant::now();
    let step = Duration::from_millis(cli.step_ms);
    let mut match_ids = Vec::new();

    for tick in 1..=cli.max_ticks {
        let now = start + step * tick;
        let report = matchmaker.tick_at(now).await?;

        for match_id in &report.match_ids {
            println!("⏱️  t+{:?}: match {} assembled", now - start, match_id);
        }
        match_ids.extend(report.match_ids);

        if matchmaker.lobby_snapshot().await?.searching == 0 {
            break;
        }
    }

    for match_id in &match_ids {
        let Some(view) = matchmaker.serialize_match(match_id).await? else {
            continue;
        };

        if cli.full_views {
            println!("{}", serde_json::to_string_pretty(&view)?);
            continue;
        }

        println!("\n🗺️  {} on {} ({})", view.mode, view.map_name, view.match_id);
        for (i, squad) in view.squads.iter().enumerate() {
            let members: Vec<String> = squad
                .members
                .iter()
                .map(|m| {
                    if m.is_bot {
                        format!("{} [bot]", m.display_name)
                    } else {
                        m.display_name.clone()
                    }
                })
                .collect();
            println!("   Squad {} ({}): {}", i + 1, squad.team_color, members.join(", "));
        }
    }

    let snapshot = matchmaker.lobby_snapshot().await?;
    let stats = matchmaker.get_stats().await?;
    println!("\n📊 Lobby: {}", serde_json::to_string(&snapshot)?);
    println!("📊 Stats: {}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_overrides_are_validated() {
        let cli = Cli::parse_from(["lobby-sim", "--quick-start-ms", "1000", "--max-wait-ms", "4000"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.matchmaking.quick_start_ms, 1000);
        assert_eq!(config.matchmaking.max_wait_ms, 4000);

        let cli = Cli::parse_from(["lobby-sim", "--quick-start-ms", "20000"]);
        assert!(build_config(&cli).is_err());
    }
}
