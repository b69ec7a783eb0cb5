//! In-process settings storage
//!
//! A concurrent key/value map with YAML persistence, used by the Discord host
//! as its settings backend.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use super::{SettingValue, SettingsSnapshot};

/// Errors from loading or saving settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings format error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Shared, concurrently writable settings map
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    values: Arc<DashMap<String, SettingValue>>,
}

impl SettingsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `defaults`
    #[must_use]
    pub fn with_defaults(defaults: &SettingsSnapshot) -> Self {
        let store = Self::new();
        store.merge_defaults(defaults);
        store
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<SettingValue> {
        self.values.get(key).map(|entry| entry.value().clone())
    }

    /// Text value of `key`, or an empty string when unset or not text
    #[must_use]
    pub fn get_text(&self, key: &str) -> String {
        self.get(key)
            .and_then(|value| value.as_text().map(ToString::to_string))
            .unwrap_or_default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<SettingValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Insert every default whose key is not set yet
    pub fn merge_defaults(&self, defaults: &SettingsSnapshot) {
        for (key, value) in defaults {
            self.values
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Copy of all current values
    #[must_use]
    pub fn snapshot(&self) -> SettingsSnapshot {
        self.values
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Load settings from a YAML file on top of `defaults`.
    ///
    /// A missing file yields just the defaults.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>, defaults: &SettingsSnapshot) -> Result<Self, SettingsError> {
        let store = Self::new();

        match tokio::fs::read_to_string(path.as_ref()).await {
            Ok(content) => {
                let values: SettingsSnapshot = serde_yaml::from_str(&content)?;
                for (key, value) in values {
                    store.set(key, value);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        store.merge_defaults(defaults);
        Ok(store)
    }

    /// Save all settings to a YAML file, creating its directory if needed.
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be written.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }

        let yaml = serde_yaml::to_string(&self.snapshot())?;
        tokio::fs::write(path, yaml).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{CHECK_UPDATE, PUBLIC_REPLIES};

    fn defaults() -> SettingsSnapshot {
        let mut defaults = SettingsSnapshot::new();
        defaults.insert(CHECK_UPDATE.to_string(), true.into());
        defaults.insert(PUBLIC_REPLIES.to_string(), "i/test=Test failed".into());
        defaults
    }

    #[test]
    fn test_defaults_do_not_override() {
        let store = SettingsStore::new();
        store.set(CHECK_UPDATE, false);
        store.merge_defaults(&defaults());

        assert_eq!(store.get(CHECK_UPDATE), Some(SettingValue::Bool(false)));
        assert_eq!(store.get_text(PUBLIC_REPLIES), "i/test=Test failed");
    }

    #[test]
    fn test_get_text_of_missing_or_non_text() {
        let store = SettingsStore::with_defaults(&defaults());
        assert_eq!(store.get_text("missing"), "");
        assert_eq!(store.get_text(CHECK_UPDATE), "");
    }

    #[test]
    fn test_clones_share_values() {
        let store = SettingsStore::new();
        let other = store.clone();
        other.set("key", "value");
        assert_eq!(store.get_text("key"), "value");
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("chat-autoreply-{}", uuid::Uuid::new_v4()))
            .join("settings.yaml");

        let store = SettingsStore::with_defaults(&defaults());
        store.set(PUBLIC_REPLIES, "hey=Hello {sender}");
        store.save(&path).await.expect("Failed to save");

        let loaded = SettingsStore::load(&path, &defaults()).await.expect("Failed to load");
        assert_eq!(loaded.snapshot(), store.snapshot());

        if let Some(dir) = path.parent() {
            let _ = tokio::fs::remove_dir_all(dir).await;
        }
    }

    #[tokio::test]
    async fn test_load_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!("chat-autoreply-missing-{}.yaml", uuid::Uuid::new_v4()));
        let loaded = SettingsStore::load(&path, &defaults()).await.expect("Failed to load");
        assert_eq!(loaded.snapshot(), defaults());
    }
}
