//! Hierarchical configuration loading: defaults, then an optional project
//! YAML file, then the literal recognized environment variables (no shared
//! prefix — the names themselves are part of the public configuration
//! surface, so an explicit override pass is clearer than a generic nested
//! `Env::split` mapping).

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::Config;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid session_ttl_seconds: {0}. Must be positive")]
    InvalidSessionTtl(i64),

    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("database url cannot be empty")]
    EmptyDatabaseUrl,

    #[error("invalid api port: {0}")]
    InvalidApiPort(u16),

    #[error("invalid orchestrator.poll_seconds: {0}. Must be at least 1")]
    InvalidOrchestratorPoll(u64),

    #[error("invalid adapter.poll_seconds: {0}. Must be at least 1")]
    InvalidAdapterPoll(u64),

    #[error("invalid summarizer.poll_seconds: {0}. Must be at least 5")]
    InvalidSummarizerPoll(u64),

    #[error("invalid adapter.max_tasks_per_agent_cycle: {0}. Must be at least 1")]
    InvalidMaxTasksPerAgentCycle(i64),

    #[error("invalid adapter.default_timeout_seconds: {0}. Must be at least 1")]
    InvalidAdapterTimeout(u64),

    #[error("invalid environment override for {0}: {1}")]
    BadEnvValue(&'static str, String),
}

/// Loads and validates a [`Config`] from defaults, an optional project YAML
/// file, and environment variables, in that order of increasing priority.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Looks for `repomesh.yaml` in the working directory; absent is fine,
    /// defaults and env overrides still apply.
    pub fn load() -> Result<Config> {
        let config = Self::load_figment(Yaml::file("repomesh.yaml"))?;
        let config = Self::apply_env_overrides(config)?;
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config = Self::load_figment(Yaml::file(path.as_ref()))?;
        let config = Self::apply_env_overrides(config)?;
        Self::validate(&config)?;
        Ok(config)
    }

    fn load_figment(file: Yaml) -> Result<Config> {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(file)
            .extract()
            .context("failed to extract configuration")
    }

    /// Applies the literal recognized environment variables over whatever
    /// the file/defaults produced. Unset variables leave their field alone.
    fn apply_env_overrides(mut config: Config) -> Result<Config, ConfigError> {
        use std::env::var;

        if let Ok(v) = var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = var("API_HOST") {
            config.api.host = v;
        }
        if let Ok(v) = var("API_PORT") {
            config.api.port = parse_env("API_PORT", &v)?;
        }
        if let Ok(v) = var("REPO_MESH_LOCAL_TOKEN") {
            config.api.local_token = v;
        }
        if let Ok(v) = var("SESSION_TTL_SECONDS") {
            config.session_ttl_seconds = parse_env("SESSION_TTL_SECONDS", &v)?;
        }

        if let Ok(v) = var("ORCHESTRATOR_AUTOSTART") {
            config.orchestrator.autostart = parse_env("ORCHESTRATOR_AUTOSTART", &v)?;
        }
        if let Ok(v) = var("ORCHESTRATOR_POLL_SECONDS") {
            config.orchestrator.poll_seconds = parse_env("ORCHESTRATOR_POLL_SECONDS", &v)?;
        }
        if let Ok(v) = var("ORCHESTRATOR_DISPATCH_LIMIT") {
            config.orchestrator.dispatch_limit = parse_env("ORCHESTRATOR_DISPATCH_LIMIT", &v)?;
        }

        if let Ok(v) = var("ADAPTER_AUTOSTART") {
            config.adapter.autostart = parse_env("ADAPTER_AUTOSTART", &v)?;
        }
        if let Ok(v) = var("ADAPTER_POLL_SECONDS") {
            config.adapter.poll_seconds = parse_env("ADAPTER_POLL_SECONDS", &v)?;
        }
        if let Ok(v) = var("ADAPTER_MAX_TASKS_PER_AGENT_CYCLE") {
            config.adapter.max_tasks_per_agent_cycle = parse_env("ADAPTER_MAX_TASKS_PER_AGENT_CYCLE", &v)?;
        }
        if let Ok(v) = var("ADAPTER_DEFAULT_TIMEOUT_SECONDS") {
            config.adapter.default_timeout_seconds = parse_env("ADAPTER_DEFAULT_TIMEOUT_SECONDS", &v)?;
        }
        if let Ok(v) = var("ADAPTER_WORKSPACE_ROOT") {
            config.adapter.workspace_root = v;
        }
        if let Ok(v) = var("ADAPTER_ALLOWED_COMMANDS") {
            config.adapter.allowed_commands = v;
        }
        if let Ok(v) = var("ADAPTER_PREPASS_COMMANDS") {
            config.adapter.prepass_commands = v;
        }

        if let Ok(v) = var("SUMMARIZER_AUTOSTART") {
            config.summarizer.autostart = parse_env("SUMMARIZER_AUTOSTART", &v)?;
        }
        if let Ok(v) = var("SUMMARIZER_POLL_SECONDS") {
            config.summarizer.poll_seconds = parse_env("SUMMARIZER_POLL_SECONDS", &v)?;
        }
        if let Ok(v) = var("SUMMARIZER_MAX_TASKS_CYCLE") {
            config.summarizer.max_tasks_cycle = parse_env("SUMMARIZER_MAX_TASKS_CYCLE", &v)?;
        }

        if let Ok(v) = var("LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = var("LOG_FORMAT") {
            config.logging.format = v;
        }

        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.session_ttl_seconds <= 0 {
            return Err(ConfigError::InvalidSessionTtl(config.session_ttl_seconds));
        }

        if config.database.url.is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }

        if config.api.port == 0 {
            return Err(ConfigError::InvalidApiPort(config.api.port));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.orchestrator.poll_seconds == 0 {
            return Err(ConfigError::InvalidOrchestratorPoll(config.orchestrator.poll_seconds));
        }

        if config.adapter.poll_seconds == 0 {
            return Err(ConfigError::InvalidAdapterPoll(config.adapter.poll_seconds));
        }

        if config.summarizer.poll_seconds < 5 {
            return Err(ConfigError::InvalidSummarizerPoll(config.summarizer.poll_seconds));
        }

        if config.adapter.max_tasks_per_agent_cycle < 1 {
            return Err(ConfigError::InvalidMaxTasksPerAgentCycle(config.adapter.max_tasks_per_agent_cycle));
        }

        if config.adapter.default_timeout_seconds == 0 {
            return Err(ConfigError::InvalidAdapterTimeout(config.adapter.default_timeout_seconds));
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::BadEnvValue(name, raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.session_ttl_seconds, 120);
        assert_eq!(config.orchestrator.poll_seconds, 5);
        assert_eq!(config.summarizer.poll_seconds, 30);
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn yaml_overrides_defaults() {
        let yaml = r"
session_ttl_seconds: 300
database:
  url: sqlite:///tmp/custom.db
orchestrator:
  autostart: true
  poll_seconds: 10
";
        let config: Config = serde_yaml::from_str(yaml).expect("yaml should parse");
        assert_eq!(config.session_ttl_seconds, 300);
        assert_eq!(config.database.url, "sqlite:///tmp/custom.db");
        assert!(config.orchestrator.autostart);
        assert_eq!(config.orchestrator.poll_seconds, 10);
        ConfigLoader::validate(&config).expect("parsed config should be valid");
    }

    #[test]
    fn rejects_zero_session_ttl() {
        let config = Config { session_ttl_seconds: 0, ..Config::default() };
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidSessionTtl(0))));
    }

    #[test]
    fn rejects_empty_database_url() {
        let mut config = Config::default();
        config.database.url = String::new();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::EmptyDatabaseUrl)));
    }

    #[test]
    fn rejects_bad_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidLogLevel(_))));
    }

    #[test]
    fn rejects_summarizer_poll_below_minimum() {
        let mut config = Config::default();
        config.summarizer.poll_seconds = 1;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidSummarizerPoll(1))));
    }

    #[test]
    fn env_override_wins_over_file_value() {
        let mut config = Config::default();
        config.session_ttl_seconds = 200;

        unsafe {
            std::env::set_var("SESSION_TTL_SECONDS", "400");
        }
        let result = ConfigLoader::apply_env_overrides(config);
        unsafe {
            std::env::remove_var("SESSION_TTL_SECONDS");
        }

        assert_eq!(result.unwrap().session_ttl_seconds, 400);
    }

    #[test]
    fn bad_env_value_is_reported() {
        unsafe {
            std::env::set_var("API_PORT", "not-a-number");
        }
        let result = ConfigLoader::apply_env_overrides(Config::default());
        unsafe {
            std::env::remove_var("API_PORT");
        }
        assert!(matches!(result, Err(ConfigError::BadEnvValue("API_PORT", _))));
    }
}
