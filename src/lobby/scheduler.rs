//! Matchmaking scheduler
//!
//! Each tick evaluates every mode's queue against three policies in priority
//! order: capacity fill, quick start, then max-wait fallback. Capacity fill
//! drains the queue completely before the other two look at the remainder.

use crate::config::{AppConfig, ModeRule};
use crate::error::{MatchmakingError, Result};
use crate::lobby::manager::Matchmaker;
use crate::lobby::registry::ReadySession;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

/// Scheduler thresholds, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerPolicy {
    pub tick_interval: Duration,
    /// Oldest-wait threshold for an under-capacity match with a full team
    pub quick_start: Duration,
    /// Oldest-wait threshold after which any waiting humans are matched
    pub max_wait: Duration,
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(500),
            quick_start: Duration::from_secs(3),
            max_wait: Duration::from_secs(15),
        }
    }
}

impl SchedulerPolicy {
    /// Reject thresholds the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(MatchmakingError::ConfigurationError {
                message: "Tick interval must be greater than 0".to_string(),
            }
            .into());
        }

        if self.quick_start >= self.max_wait {
            return Err(MatchmakingError::ConfigurationError {
                message: format!(
                    "Quick start threshold ({:?}) must be shorter than max wait ({:?})",
                    self.quick_start, self.max_wait
                ),
            }
            .into());
        }

        Ok(())
    }
}

impl From<&AppConfig> for SchedulerPolicy {
    fn from(config: &AppConfig) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            quick_start: config.quick_start(),
            max_wait: config.max_wait(),
        }
    }
}

/// Which policy caused an assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssemblyTrigger {
    CapacityFill,
    QuickStart,
    MaxWait,
}

impl AssemblyTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssemblyTrigger::CapacityFill => "capacity_fill",
            AssemblyTrigger::QuickStart => "quick_start",
            AssemblyTrigger::MaxWait => "max_wait",
        }
    }
}

impl std::fmt::Display for AssemblyTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide whether the ready queue of a mode should be assembled now
pub fn decide(
    ready_count: usize,
    oldest_wait: Duration,
    rule: &ModeRule,
    policy: &SchedulerPolicy,
) -> Option<AssemblyTrigger> {
    if ready_count == 0 {
        return None;
    }
    if ready_count >= rule.players_per_match {
        return Some(AssemblyTrigger::CapacityFill);
    }
    if ready_count >= rule.team_size && oldest_wait >= policy.quick_start {
        return Some(AssemblyTrigger::QuickStart);
    }
    if oldest_wait >= policy.max_wait {
        return Some(AssemblyTrigger::MaxWait);
    }
    None
}

/// Next assembly for a ready queue: the trigger and how many of the oldest
/// sessions go into the match
pub fn next_assembly(
    ready: &[ReadySession],
    rule: &ModeRule,
    policy: &SchedulerPolicy,
) -> Option<(AssemblyTrigger, usize)> {
    let oldest_wait = ready.first().map(|r| r.waited).unwrap_or_default();
    decide(ready.len(), oldest_wait, rule, policy).map(|trigger| {
        let take = match trigger {
            AssemblyTrigger::CapacityFill => rule.players_per_match,
            AssemblyTrigger::QuickStart | AssemblyTrigger::MaxWait => ready.len(),
        };
        (trigger, take)
    })
}

/// Drive `Matchmaker::tick` on a fixed cadence until shutdown
pub async fn run_scheduler(
    matchmaker: Arc<Matchmaker>,
    policy: SchedulerPolicy,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(policy.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Matchmaking scheduler started (tick {:?}, quick start {:?}, max wait {:?})",
        policy.tick_interval, policy.quick_start, policy.max_wait
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match matchmaker.tick().await {
                    Ok(report) if report.matches_created > 0 => {
                        debug!("Tick assembled {} matches", report.matches_created);
                    }
                    Ok(_) => {}
                    Err(e) => error!("Scheduler tick failed: {}", e),
                }
            }
            _ = shutdown.recv() => {
                info!("Matchmaking scheduler shutting down");
                break;
            }
        }
    }
}
