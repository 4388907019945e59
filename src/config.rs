//! Bot configuration loaded from TOML.

use crate::error::ConfigError;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Tunables for the chess bot.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct BotConfig {
    /// Skill (1-10) of the engine attached to each new session.
    #[serde(default = "default_skill")]
    default_skill: u8,

    /// Number of entries returned by a suggestion request.
    #[serde(default = "default_suggestion_count")]
    suggestion_count: usize,

    /// Prefix of the legal-move list scored when ranking moves.
    #[serde(default = "default_candidate_limit")]
    candidate_limit: usize,

    /// Seconds between background staleness sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    sweep_interval_secs: u64,

    /// Seconds without a move before a session is abandoned.
    #[serde(default = "default_max_idle_secs")]
    max_idle_secs: u64,

    /// Event label written into exported game records.
    #[serde(default = "default_event_name")]
    event_name: String,
}

#[instrument]
fn default_skill() -> u8 {
    5
}

#[instrument]
fn default_suggestion_count() -> usize {
    3
}

#[instrument]
fn default_candidate_limit() -> usize {
    10
}

#[instrument]
fn default_sweep_interval_secs() -> u64 {
    60
}

#[instrument]
fn default_max_idle_secs() -> u64 {
    3600
}

#[instrument]
fn default_event_name() -> String {
    "Chess Game".to_string()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            default_skill: default_skill(),
            suggestion_count: default_suggestion_count(),
            candidate_limit: default_candidate_limit(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_idle_secs: default_max_idle_secs(),
            event_name: default_event_name(),
        }
    }
}

impl BotConfig {
    /// Loads configuration from a TOML file.
    ///
    /// Missing keys fall back to their defaults. Skill must be in 1..=10.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        if !(1..=10).contains(&config.default_skill) {
            return Err(ConfigError::new(format!(
                "default_skill must be between 1 and 10, got {}",
                config.default_skill
            )));
        }

        info!(
            skill = config.default_skill,
            max_idle_secs = config.max_idle_secs,
            "Config loaded successfully"
        );
        Ok(config)
    }

    /// Returns a copy with a different default skill.
    pub fn with_skill(mut self, skill: u8) -> Self {
        self.default_skill = skill;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_skill = 8").unwrap();
        writeln!(file, "event_name = \"Club Night\"").unwrap();

        let config = BotConfig::from_file(file.path()).unwrap();
        assert_eq!(*config.default_skill(), 8);
        assert_eq!(config.event_name(), "Club Night");
        assert_eq!(*config.max_idle_secs(), 3600);
        assert_eq!(*config.sweep_interval_secs(), 60);
        assert_eq!(*config.candidate_limit(), 10);
    }

    #[test]
    fn out_of_range_skill_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_skill = 11").unwrap();

        let err = BotConfig::from_file(file.path()).unwrap_err();
        assert!(err.message.contains("default_skill"));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = BotConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(err.message.starts_with("Failed to read"));
    }
}
