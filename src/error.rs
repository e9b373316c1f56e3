//! Error types for the matchmaking core
//!
//! User-facing failures are either a rejected request (`InvalidMode`) or a
//! lookup miss, which the public API reports as `Ok(None)` / `Ok(false)`
//! rather than as an error.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Invalid mode: {mode}")]
    InvalidMode { mode: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl MatchmakingError {
    /// Whether the error was caused by the caller's input
    pub fn is_bad_request(&self) -> bool {
        matches!(self, MatchmakingError::InvalidMode { .. })
    }

    pub(crate) fn lock_poisoned(what: &str) -> Self {
        MatchmakingError::InternalError {
            message: format!("Failed to acquire {} lock", what),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_request_classification() {
        let invalid = MatchmakingError::InvalidMode {
            mode: "trios".to_string(),
        };
        assert!(invalid.is_bad_request());
        assert_eq!(invalid.to_string(), "Invalid mode: trios");

        assert!(!MatchmakingError::lock_poisoned("state").is_bad_request());
    }
}
