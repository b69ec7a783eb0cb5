use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use poise::serenity_prelude::{
    self as serenity, ChannelId, Context, CreateMessage, EventHandler, GuildId, Http, Message,
    Ready, UserId,
};
use tracing::{debug, info, warn};

use crate::host::Host;
use crate::settings::{SettingValue, SettingsSnapshot, SettingsStore};
use crate::{AutoReplyPlugin, EVENT_TARGET, Error, logging};

/// Discord side of the [`Host`] interface
///
/// Rooms and users are addressed by name, so the ids behind every name seen
/// in incoming messages are remembered for replies.
pub struct DiscordHost {
    http: Arc<Http>,
    settings: SettingsStore,
    login: RwLock<String>,
    rooms: DashMap<String, ChannelId>,
    users: DashMap<String, UserId>,
}

impl DiscordHost {
    #[must_use]
    pub fn new(http: Arc<Http>, settings: SettingsStore) -> Self {
        Self {
            http,
            settings,
            login: RwLock::new(String::new()),
            rooms: DashMap::new(),
            users: DashMap::new(),
        }
    }

    pub fn set_login(&self, name: impl Into<String>) {
        *self.login.write() = name.into();
    }

    pub fn remember_room(&self, name: impl Into<String>, id: ChannelId) {
        self.rooms.insert(name.into(), id);
    }

    pub fn remember_user(&self, name: impl Into<String>, id: UserId) {
        self.users.insert(name.into(), id);
    }
}

#[serenity::async_trait]
impl Host for DiscordHost {
    fn log(&self, message: &str) {
        logging::log_console(message);
    }

    fn current_login(&self) -> String {
        self.login.read().clone()
    }

    fn settings(&self) -> SettingsSnapshot {
        self.settings.snapshot()
    }

    fn setting(&self, key: &str) -> Option<SettingValue> {
        self.settings.get(key)
    }

    fn set_setting(&self, key: &str, value: SettingValue) {
        self.settings.set(key, value);
    }

    async fn send_public(&self, room: &str, text: &str) -> Result<(), Error> {
        let channel = self
            .rooms
            .get(room)
            .map(|entry| *entry.value())
            .ok_or_else(|| format!("Unknown room #{room}"))?;
        channel.say(self.http.as_ref(), text).await?;
        Ok(())
    }

    async fn send_private(&self, user: &str, text: &str) -> Result<(), Error> {
        let user_id = self
            .users
            .get(user)
            .map(|entry| *entry.value())
            .ok_or_else(|| format!("Unknown user \"{user}\""))?;
        user_id
            .direct_message(self.http.as_ref(), CreateMessage::new().content(text))
            .await?;
        Ok(())
    }
}

/// Forwards gateway events to the plugin
pub struct Handler {
    pub host: Arc<DiscordHost>,
    pub plugin: AutoReplyPlugin,
}

#[serenity::async_trait]
impl EventHandler for Handler {
    /// Called when the bot is ready, but the cache may not be fully populated yet.
    async fn ready(&self, ctx: Context, ready: Ready) {
        let user_name = ready.user.name.clone();
        let shard_id = ctx.shard_id;
        self.host.set_login(user_name.clone());
        info!("Connected as {user_name}, shard {shard_id}");
    }

    /// Called when the cache is fully populated.
    async fn cache_ready(&self, ctx: Context, guilds: Vec<GuildId>) {
        let guild_count_cache = ctx.cache.guild_count();
        let guild_count = guilds.len();
        if guild_count != guild_count_cache {
            warn!(
                "Cache guild count mismatch: {guild_count_cache} (cache) vs {guild_count} (actual)"
            );
        }
        info!("Cache ready! The bot is in {guild_count} guild(s)");
    }

    /// Guild messages are public lines, direct messages private ones.
    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let user = msg.author.name.clone();
        if msg.guild_id.is_some() {
            let room = msg
                .channel_id
                .name(&ctx)
                .await
                .unwrap_or_else(|_| msg.channel_id.to_string());
            debug!(target: EVENT_TARGET, room = %room, user = %user, "Public message");
            self.host.remember_room(room.clone(), msg.channel_id);
            self.plugin.on_public_message(&room, &user, &msg.content).await;
        } else {
            debug!(target: EVENT_TARGET, user = %user, "Private message");
            self.host.remember_user(user.clone(), msg.author.id);
            self.plugin.on_private_message(&user, &msg.content).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::CHECK_UPDATE;

    fn host() -> DiscordHost {
        DiscordHost::new(Arc::new(Http::new("")), SettingsStore::new())
    }

    #[test]
    fn test_handler_implements_event_handler() {
        // This test verifies at compile time that Handler implements EventHandler
        fn assert_impl<T: EventHandler>() {}
        assert_impl::<Handler>();
    }

    #[test]
    fn test_login_and_settings() {
        let host = host();
        assert_eq!(host.current_login(), "");
        host.set_login("autoreply");
        assert_eq!(host.current_login(), "autoreply");

        host.set_setting(CHECK_UPDATE, SettingValue::Bool(false));
        assert_eq!(host.setting(CHECK_UPDATE), Some(SettingValue::Bool(false)));
        assert_eq!(host.settings().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_destinations_fail_without_network() {
        let host = host();
        let error = host
            .send_public("lobby", "hello")
            .await
            .expect_err("Room was never seen");
        assert_eq!(error.to_string(), "Unknown room #lobby");

        let error = host
            .send_private("alice", "hello")
            .await
            .expect_err("User was never seen");
        assert_eq!(error.to_string(), "Unknown user \"alice\"");
    }
}
