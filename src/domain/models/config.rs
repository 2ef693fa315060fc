//! Top-level configuration structure.
//!
//! Loaded by `infrastructure::config::ConfigLoader`; the field set here is
//! exactly the recognized options enumerated for environment overrides — see
//! `ConfigLoader::validate`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default = "default_session_ttl_seconds")]
    pub session_ttl_seconds: i64,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub adapter: AdapterConfig,

    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

const fn default_session_ttl_seconds() -> i64 {
    120
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
            session_ttl_seconds: default_session_ttl_seconds(),
            orchestrator: OrchestratorConfig::default(),
            adapter: AdapterConfig::default(),
            summarizer: SummarizerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "sqlite://repomesh.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: default_database_url() }
    }
}

/// `host`/`port`/`local_token` are carried even though the HTTP transport
/// that would read them is out of core scope — the config shape the core's
/// auth-check interface expects is still part of this crate's contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_local_token")]
    pub local_token: String,
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_api_port() -> u16 {
    8787
}

fn default_local_token() -> String {
    "repomesh-local-token".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            local_token: default_local_token(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub autostart: bool,
    #[serde(default = "default_orchestrator_poll_seconds")]
    pub poll_seconds: u64,
    #[serde(default = "default_orchestrator_dispatch_limit")]
    pub dispatch_limit: i64,
}

const fn default_orchestrator_poll_seconds() -> u64 {
    5
}

const fn default_orchestrator_dispatch_limit() -> i64 {
    10
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            autostart: false,
            poll_seconds: default_orchestrator_poll_seconds(),
            dispatch_limit: default_orchestrator_dispatch_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AdapterConfig {
    #[serde(default)]
    pub autostart: bool,
    #[serde(default = "default_adapter_poll_seconds")]
    pub poll_seconds: u64,
    #[serde(default = "default_max_tasks_per_agent_cycle")]
    pub max_tasks_per_agent_cycle: i64,
    #[serde(default = "default_adapter_timeout_seconds")]
    pub default_timeout_seconds: u64,
    #[serde(default = "default_workspace_root")]
    pub workspace_root: String,
    /// CSV of allowed command prefixes; empty string permits all.
    #[serde(default)]
    pub allowed_commands: String,
    /// CSV of default pre-pass commands, used when a task doesn't specify its own.
    #[serde(default)]
    pub prepass_commands: String,
}

const fn default_adapter_poll_seconds() -> u64 {
    5
}

const fn default_max_tasks_per_agent_cycle() -> i64 {
    2
}

const fn default_adapter_timeout_seconds() -> u64 {
    600
}

fn default_workspace_root() -> String {
    ".".to_string()
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            autostart: false,
            poll_seconds: default_adapter_poll_seconds(),
            max_tasks_per_agent_cycle: default_max_tasks_per_agent_cycle(),
            default_timeout_seconds: default_adapter_timeout_seconds(),
            workspace_root: default_workspace_root(),
            allowed_commands: String::new(),
            prepass_commands: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SummarizerConfig {
    #[serde(default)]
    pub autostart: bool,
    #[serde(default = "default_summarizer_poll_seconds")]
    pub poll_seconds: u64,
    #[serde(default = "default_summarizer_max_tasks_cycle")]
    pub max_tasks_cycle: i64,
}

const fn default_summarizer_poll_seconds() -> u64 {
    30
}

const fn default_summarizer_max_tasks_cycle() -> i64 {
    10
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            autostart: false,
            poll_seconds: default_summarizer_poll_seconds(),
            max_tasks_cycle: default_summarizer_max_tasks_cycle(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_recognized_options() {
        let config = Config::default();
        assert_eq!(config.session_ttl_seconds, 120);
        assert_eq!(config.orchestrator.poll_seconds, 5);
        assert_eq!(config.orchestrator.dispatch_limit, 10);
        assert_eq!(config.adapter.max_tasks_per_agent_cycle, 2);
        assert_eq!(config.adapter.default_timeout_seconds, 600);
        assert_eq!(config.summarizer.poll_seconds, 30);
        assert_eq!(config.summarizer.max_tasks_cycle, 10);
    }
}
