use config::{Config, ConfigError, Environment};
use fleet_shared::limits;
use serde::Deserialize;
use std::time::Duration;

/// Server settings, read from `FLEET_*` environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address the TCP listener binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// How long a new action stays PENDING before the worker picks it up
    #[serde(default = "default_action_start_delay_ms")]
    pub action_start_delay_ms: u64,

    /// Duration of a simulated action
    #[serde(default = "default_action_duration_ms")]
    pub action_duration_ms: u64,

    /// Longest accepted action parameter, in bytes
    #[serde(default = "default_max_action_param_len")]
    pub max_action_param_len: usize,
}

fn default_listen_addr() -> String {
    format!("0.0.0.0:{}", limits::DEFAULT_PORT)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_action_start_delay_ms() -> u64 {
    500
}

fn default_action_duration_ms() -> u64 {
    3000
}

fn default_max_action_param_len() -> usize {
    limits::MAX_ACTION_PARAM_LEN
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
            action_start_delay_ms: default_action_start_delay_ms(),
            action_duration_ms: default_action_duration_ms(),
            max_action_param_len: default_max_action_param_len(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("FLEET"))
            .build()?
            .try_deserialize()
    }

    pub fn action_start_delay(&self) -> Duration {
        Duration::from_millis(self.action_start_delay_ms)
    }

    pub fn action_duration(&self) -> Duration {
        Duration::from_millis(self.action_duration_ms)
    }
}
