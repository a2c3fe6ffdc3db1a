//! Client configuration loaded from `~/.config/onegate/config.toml`.
//!
//! Every section is optional; a missing file yields defaults that point at a
//! backend on `localhost:8000`. `ONEGATE_BACKEND_URL` and `ONEGATE_USER_ID`
//! override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::paths;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_BASE_DELAY_MS: u64 = 1000;

pub const ENV_BACKEND_URL: &str = "ONEGATE_BACKEND_URL";
pub const ENV_USER_ID: &str = "ONEGATE_USER_ID";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the records API, without a trailing slash.
    pub base_url: String,
    /// Timeout applied to every REST call (not to the event stream).
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Account whose records are synchronized.
    pub user_id: String,
}

/// Reconnect policy for the event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Reconnect attempts before giving up on live updates.
    pub max_attempts: u32,
    /// First reconnect delay; doubles on each further attempt.
    pub base_delay_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }
}

impl StreamConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write logs to `{state_dir}/logs/gate-<timestamp>.log`.
    pub file: bool,
}

impl GateConfig {
    /// Load from the default location and apply environment overrides.
    ///
    /// Returns defaults when the file does not exist or the config directory
    /// cannot be determined (e.g., no HOME in containers).
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Ok(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally `std::env::var`).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_BACKEND_URL).filter(|v| !v.trim().is_empty()) {
            self.backend.base_url = url.trim().to_string();
        }
        if let Some(user_id) = lookup(ENV_USER_ID).filter(|v| !v.trim().is_empty()) {
            self.session.user_id = user_id.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.backend.base_url.trim();
        if url.is_empty() {
            bail!("backend.base_url must not be empty");
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("backend.base_url must start with http:// or https:// (got '{url}')");
        }
        if self.backend.request_timeout_secs == 0 {
            bail!("backend.request_timeout_secs must be greater than 0");
        }
        if self.stream.base_delay_ms == 0 {
            bail!("stream.base_delay_ms must be greater than 0");
        }
        Ok(())
    }

    /// The configured user id, or an error telling the user how to set one.
    pub fn require_user_id(&self) -> Result<&str> {
        let user_id = self.session.user_id.trim();
        if user_id.is_empty() {
            bail!(
                "No user id configured. Set session.user_id in {} or export {ENV_USER_ID}.",
                Self::config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| "config.toml".to_string())
            );
        }
        Ok(user_id)
    }

    /// Path to the config file: `~/.config/onegate/config.toml`.
    pub fn config_path() -> Result<PathBuf> {
        paths::config_file().context("Failed to determine config directory")
    }

    /// Write the commented template to `path` unless a file already exists.
    ///
    /// Returns `false` when an existing file was left untouched.
    pub fn write_template(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, Self::default_template())
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(true)
    }

    /// Generate default config TOML with comments as a template.
    pub fn default_template() -> String {
        r#"# OneGate client configuration
# Location: ~/.config/onegate/config.toml

[backend]
base_url = "http://localhost:8000"
request_timeout_secs = 30  # applies to REST calls, not the event stream

[session]
user_id = ""  # or export ONEGATE_USER_ID

[stream]
max_attempts = 5      # reconnects before live updates stop
base_delay_ms = 1000  # doubles on each attempt: 1s, 2s, 4s, 8s, 16s

[logging]
file = false  # also log to the state directory
"#
        .to_string()
    }
}
