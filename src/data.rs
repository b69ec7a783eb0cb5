use std::{
    ops::Deref,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::info;

use crate::{AutoReplyPlugin, ChatScope, EVENT_TARGET, settings::SettingsStore};

/// Default location of the persisted settings
pub const SETTINGS_FILE: &str = "data/settings.yaml";

/// Centralized data structure for the bot
#[derive(Clone)]
pub struct Data(pub Arc<DataInner>);

impl Deref for Data {
    type Target = DataInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("settings", &self.settings)
            .field("settings_path", &self.settings_path)
            .field("plugin", &self.plugin.info().name)
            .finish()
    }
}

impl Data {
    #[must_use]
    pub fn new(settings: SettingsStore, settings_path: impl AsRef<Path>, plugin: AutoReplyPlugin) -> Self {
        Self(Arc::new(DataInner {
            settings,
            settings_path: settings_path.as_ref().to_path_buf(),
            plugin,
        }))
    }

    /// Current rule text for `scope`
    #[must_use]
    pub fn reply_text(&self, scope: ChatScope) -> String {
        self.settings.get_text(scope.setting_key())
    }

    /// Persist the settings to their YAML file
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The data directory cannot be created
    /// - The settings cannot be serialized or written
    pub async fn save_settings(&self) -> Result<(), crate::Error> {
        self.settings.save(&self.settings_path).await?;
        info!(
            target: EVENT_TARGET,
            path = %self.settings_path.display(),
            "Saved settings"
        );
        Ok(())
    }
}

/// Shared state behind [`Data`]
pub struct DataInner {
    // Settings edited by commands and watched by the plugin
    pub settings: SettingsStore,
    // Where the settings are persisted
    pub settings_path: PathBuf,
    pub plugin: AutoReplyPlugin,
}
