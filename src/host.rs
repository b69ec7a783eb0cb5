//! The host chat client, as seen by the plugin

use crate::Error;
use crate::settings::{SettingValue, SettingsSnapshot};

/// Services the host chat client provides to the plugin
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Host: Send + Sync {
    /// Write one diagnostic line to the host's log
    fn log(&self, message: &str);

    /// The bot's own display name
    fn current_login(&self) -> String;

    /// All current settings
    fn settings(&self) -> SettingsSnapshot;

    fn setting(&self, key: &str) -> Option<SettingValue>;

    fn set_setting(&self, key: &str, value: SettingValue);

    /// Send `text` to a public room
    async fn send_public(&self, room: &str, text: &str) -> Result<(), Error>;

    /// Send `text` to a user privately
    async fn send_private(&self, user: &str, text: &str) -> Result<(), Error>;
}
