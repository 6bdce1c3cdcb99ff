use config::{Config, ConfigError, Environment as EnvironmentSource, File};
use serde::Deserialize;

use super::Environment;
use crate::application::services::{DEFAULT_FALLBACK_MESSAGE, HISTORY_STORAGE_KEY};
use crate::protocol::MAX_HISTORY_MESSAGES;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub upstream: UpstreamSettings,
    pub relay: RelaySettings,
    pub client: ClientSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// The answer-generation service the relay forwards to.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamSettings {
    pub base_url: String,
    pub chat_path: String,
    pub health_path: String,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelaySettings {
    pub max_history: usize,
    pub fallback_message: String,
    pub fallback_token_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSettings {
    pub relay_url: String,
    pub data_dir: String,
    pub storage_key: String,
    pub history_window: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub enable_json: bool,
}

impl Settings {
    /// Layers built-in defaults, `appsettings.toml`,
    /// `appsettings.{environment}.toml` and `APP__*` variables, in that order.
    pub fn load(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("upstream.base_url", "http://localhost:8000")?
            .set_default("upstream.chat_path", "/chat")?
            .set_default("upstream.health_path", "/health")?
            .set_default("upstream.connect_timeout_secs", 5)?
            .set_default("relay.max_history", MAX_HISTORY_MESSAGES as u64)?
            .set_default("relay.fallback_message", DEFAULT_FALLBACK_MESSAGE)?
            .set_default("relay.fallback_token_delay_ms", 40)?
            .set_default("client.relay_url", "http://localhost:3000")?
            .set_default("client.data_dir", ".bullpen")?
            .set_default("client.storage_key", HISTORY_STORAGE_KEY)?
            .set_default("client.history_window", MAX_HISTORY_MESSAGES as u64)?
            .set_default("logging.level", "info,bullpen=debug,tower_http=debug")?
            .set_default("logging.enable_json", false)?
            .add_source(File::with_name("appsettings").required(false))
            .add_source(
                File::with_name(&format!("appsettings.{}", environment.as_str().to_lowercase()))
                    .required(false),
            )
            .add_source(
                EnvironmentSource::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}
