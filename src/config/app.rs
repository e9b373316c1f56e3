//! Main application configuration
//!
//! This module defines the primary configuration structures for the dropzone
//! matchmaker, including TOML/environment loading and validation.

use crate::config::mode::ModeRule;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub matchmaking: MatchmakingSettings,
    pub modes: Vec<ModeRule>,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check and metrics endpoint
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Scheduler tick interval in milliseconds
    pub tick_interval_ms: u64,
    /// Oldest-wait threshold for an under-capacity quick start
    pub quick_start_ms: u64,
    /// Oldest-wait threshold after which a match is forced
    pub max_wait_ms: u64,
    /// How long after start a match still counts as active in the lobby snapshot
    pub active_match_window_seconds: u64,
    /// Per-connection outbound buffer (frames)
    pub subscriber_buffer: usize,
    /// Fixed seed for reproducible flavor, bot and map randomness
    pub rng_seed: Option<u64>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "dropzone-matchmaker".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
            quick_start_ms: 3_000,
            max_wait_ms: 15_000,
            active_match_window_seconds: 900, // 15 minutes
            subscriber_buffer: 32,
            rng_seed: None,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("Invalid {} value: {}", name, value))
}

impl AppConfig {
    /// Default settings with the default mode catalog
    pub fn with_default_modes() -> Self {
        Self {
            modes: ModeRule::defaults(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Parse configuration from TOML text (no environment overrides)
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: AppConfig = toml::from_str(raw).context("Failed to parse TOML config")?;
        if config.modes.is_empty() {
            config.modes = ModeRule::defaults();
        }
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::with_default_modes();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            self.service.health_port = parse_var("HEALTH_PORT", &port)?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds =
                parse_var("SHUTDOWN_TIMEOUT_SECONDS", &timeout)?;
        }

        // Matchmaking settings
        if let Ok(tick) = env::var("TICK_INTERVAL_MS") {
            self.matchmaking.tick_interval_ms = parse_var("TICK_INTERVAL_MS", &tick)?;
        }
        if let Ok(quick) = env::var("QUICK_START_MS") {
            self.matchmaking.quick_start_ms = parse_var("QUICK_START_MS", &quick)?;
        }
        if let Ok(max_wait) = env::var("MAX_WAIT_MS") {
            self.matchmaking.max_wait_ms = parse_var("MAX_WAIT_MS", &max_wait)?;
        }
        if let Ok(window) = env::var("ACTIVE_MATCH_WINDOW_SECONDS") {
            self.matchmaking.active_match_window_seconds =
                parse_var("ACTIVE_MATCH_WINDOW_SECONDS", &window)?;
        }
        if let Ok(buffer) = env::var("SUBSCRIBER_BUFFER") {
            self.matchmaking.subscriber_buffer = parse_var("SUBSCRIBER_BUFFER", &buffer)?;
        }
        if let Ok(seed) = env::var("RNG_SEED") {
            self.matchmaking.rng_seed = Some(parse_var("RNG_SEED", &seed)?);
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get scheduler tick interval as Duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.matchmaking.tick_interval_ms)
    }

    /// Get quick start threshold as Duration
    pub fn quick_start(&self) -> Duration {
        Duration::from_millis(self.matchmaking.quick_start_ms)
    }

    /// Get max wait threshold as Duration
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.matchmaking.max_wait_ms)
    }

    /// Get active match window as Duration
    pub fn active_match_window(&self) -> Duration {
        Duration::from_secs(self.matchmaking.active_match_window_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate scheduler thresholds
    let mm = &config.matchmaking;
    if mm.tick_interval_ms == 0 {
        return Err(anyhow!("Tick interval must be greater than 0"));
    }
    if mm.max_wait_ms == 0 {
        return Err(anyhow!("Max wait time must be greater than 0"));
    }
    if mm.quick_start_ms >= mm.max_wait_ms {
        return Err(anyhow!(
            "Quick start threshold ({}ms) must be shorter than max wait ({}ms)",
            mm.quick_start_ms,
            mm.max_wait_ms
        ));
    }
    if mm.subscriber_buffer == 0 {
        return Err(anyhow!("Subscriber buffer must be greater than 0"));
    }

    // Validate mode rules
    if config.modes.is_empty() {
        return Err(anyhow!("At least one mode must be configured"));
    }
    let mut seen = HashSet::new();
    for rule in &config.modes {
        rule.validate()?;
        if !seen.insert(rule.key.as_str()) {
            return Err(anyhow!("Duplicate mode key: {}", rule.key));
        }
    }

    Ok(())
}
