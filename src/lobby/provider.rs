//! Mode provider traits and implementations
//!
//! This module defines the interface for looking up mode rules, along with
//! the static implementation built from configuration at startup.

use crate::config::ModeRule;
use crate::error::{MatchmakingError, Result};
use std::collections::HashMap;

/// Trait for providing mode rules by queue key
pub trait ModeProvider: Send + Sync {
    /// Get the rule for a mode, failing with `InvalidMode` if unknown
    fn get_mode_rule(&self, mode: &str) -> Result<ModeRule>;

    /// Get all configured modes, in configuration order
    fn available_modes(&self) -> Vec<ModeRule>;

    /// Check whether a mode key is configured
    fn has_mode(&self, mode: &str) -> bool {
        self.get_mode_rule(mode).is_ok()
    }
}

/// Static mode provider, immutable after construction
#[derive(Debug, Clone)]
pub struct StaticModeProvider {
    rules: HashMap<String, ModeRule>,
    order: Vec<String>,
}

impl StaticModeProvider {
    /// Create a provider with the default solo/duo/squad catalog
    pub fn new() -> Self {
        Self::from_valid_rules(ModeRule::defaults())
    }

    /// Create with custom rules
    pub fn with_rules(rules: Vec<ModeRule>) -> Result<Self> {
        if rules.is_empty() {
            return Err(MatchmakingError::ConfigurationError {
                message: "At least one mode rule is required".to_string(),
            }
            .into());
        }

        for rule in &rules {
            rule.validate()?;
        }

        let provider = Self::from_valid_rules(rules);
        if provider.rules.len() != provider.order.len() {
            return Err(MatchmakingError::ConfigurationError {
                message: "Mode keys must be unique".to_string(),
            }
            .into());
        }

        Ok(provider)
    }

    fn from_valid_rules(rules: Vec<ModeRule>) -> Self {
        let order = rules.iter().map(|r| r.key.clone()).collect();
        let rules = rules.into_iter().map(|r| (r.key.clone(), r)).collect();
        Self { rules, order }
    }
}

impl Default for StaticModeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeProvider for StaticModeProvider {
    fn get_mode_rule(&self, mode: &str) -> Result<ModeRule> {
        self.rules.get(mode).cloned().ok_or_else(|| {
            MatchmakingError::InvalidMode {
                mode: mode.to_string(),
            }
            .into()
        })
    }

    fn available_modes(&self) -> Vec<ModeRule> {
        self.order
            .iter()
            .filter_map(|key| self.rules.get(key).cloned())
            .collect()
    }
}
