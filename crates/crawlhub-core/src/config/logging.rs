//! Logging configuration.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Logging and tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `"trace"`, `"debug"`, `"info"`, `"warn"`, `"error"`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Log format: `"json"` or `"pretty"`.
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

impl LoggingConfig {
    /// Install a global tracing subscriber from this configuration.
    ///
    /// `RUST_LOG` takes precedence over the configured level. Fails if a
    /// global subscriber is already installed.
    pub fn init_tracing(&self) -> Result<(), AppError> {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.clone()));

        let result = if self.format == "json" {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .try_init()
        } else {
            tracing_subscriber::fmt().with_env_filter(filter).try_init()
        };

        result.map_err(|e| AppError::configuration(format!("Failed to init tracing: {e}")))
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "json".to_string()
}
