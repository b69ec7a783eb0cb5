//! Plugin metadata and timing configuration
//!
//! Built once at startup and passed to the components that need it.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default location of the plugin configuration file
pub const CONFIG_FILE: &str = "config/plugin.yaml";

/// Static description of the running plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginInfo {
    /// Display name used in update notices
    pub name: String,
    /// Running version; versions containing `dev` never check for updates
    pub version: String,
    /// Release repository as `owner/name`
    pub repository: Option<String>,
    /// Seconds between update checks
    pub update_interval_secs: u64,
    /// Scheduler polling granularity in milliseconds
    pub poll_granularity_ms: u64,
}

impl Default for PluginInfo {
    fn default() -> Self {
        Self {
            name: "Auto Reply".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            repository: None,
            update_interval_secs: 3600,
            poll_granularity_ms: 1000,
        }
    }
}

impl PluginInfo {
    /// Load the configuration from a YAML file.
    ///
    /// A missing file silently yields the defaults, an unreadable or malformed
    /// one yields the defaults with a warning.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!("Could not read {}: {e}, using defaults", path.display());
                return Self::default();
            }
        };

        match serde_yaml::from_str(&content) {
            Ok(info) => info,
            Err(e) => {
                warn!("Could not parse {}: {e}, using defaults", path.display());
                Self::default()
            }
        }
    }

    #[must_use]
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    #[must_use]
    pub fn poll_granularity(&self) -> Duration {
        Duration::from_millis(self.poll_granularity_ms)
    }

    /// Development builds never look for updates
    #[must_use]
    pub fn is_dev_build(&self) -> bool {
        self.version.contains("dev")
    }
}
