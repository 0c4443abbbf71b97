//! Client settings loaded from TOML.
//!
//! - `parse_settings_toml(content)` parses and validates a settings document
//! - `Settings::default()` uses the TOML embedded via
//!   `include_str!("default_settings.toml")`
//! - `TransportSettings::apply_env()` lets the environment point the client
//!   at an engine process without editing files
//!
//! Settings are plain values handed to whoever bootstraps the executor.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::protocol::Capability;

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

pub const ENV_USE_REMOTE: &str = "IME_USE_REMOTE";
pub const ENV_HOST: &str = "IME_HOST";
pub const ENV_PORT: &str = "IME_PORT";

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub transport: TransportSettings,
    pub session: SessionSettings,
    pub worker: WorkerSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportSettings {
    pub use_remote: bool,
    #[serde(default)]
    pub host: Option<String>,
    /// Kept as text; parsing happens at transport selection.
    #[serde(default)]
    pub port: Option<String>,
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
}

impl TransportSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// Apply `IME_USE_REMOTE` / `IME_HOST` / `IME_PORT` overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup(ENV_USE_REMOTE) {
            self.use_remote = matches!(v.trim(), "1" | "true" | "yes" | "on");
        }
        if let Some(host) = lookup(ENV_HOST) {
            self.host = Some(host);
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.port = Some(port);
        }
    }

    /// Numeric port, if the configured text is one.
    pub fn parsed_port(&self) -> Option<u16> {
        self.port.as_deref().and_then(|p| p.trim().parse().ok())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    pub thread_name: String,
    pub callback_thread_name: String,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        parse_settings_toml(&content)
    }
}

impl Default for Settings {
    fn default() -> Self {
        parse_settings_toml(DEFAULT_SETTINGS_TOML).expect("default settings TOML must be valid")
    }
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn validate(s: &Settings) -> Result<(), SettingsError> {
    macro_rules! check_positive {
        ($section:ident . $field:ident) => {
            if s.$section.$field == 0 {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        };
    }
    macro_rules! check_non_empty {
        ($section:ident . $field:ident) => {
            if s.$section.$field.trim().is_empty() {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
        };
    }

    check_positive!(transport.connect_timeout_ms);
    check_positive!(transport.io_timeout_ms);
    check_non_empty!(worker.thread_name);
    check_non_empty!(worker.callback_thread_name);

    Ok(())
}
