use crate::presentation::config::LoggingSettings;

/// Configuration for tracing initialization.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub environment: String,
    pub json_format: bool,
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: String,
    /// Interactive front ends keep stdout for the conversation.
    pub log_to_stderr: bool,
}

impl TracingConfig {
    pub fn from_settings(settings: &LoggingSettings, environment: &str) -> Self {
        Self {
            environment: environment.to_string(),
            json_format: settings.enable_json || json_requested(),
            default_filter: settings.level.clone(),
            log_to_stderr: false,
        }
    }

    /// Quiet stderr logging for interactive use; `RUST_LOG` still overrides.
    pub fn for_terminal(mut self) -> Self {
        self.log_to_stderr = true;
        self.default_filter = "warn".to_string();
        self
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            environment: std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "local".to_string()),
            json_format: json_requested(),
            default_filter: "info,bullpen=debug,tower_http=debug".to_string(),
            log_to_stderr: false,
        }
    }
}

fn json_requested() -> bool {
    std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false)
}
