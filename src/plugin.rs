//! The autoresponder plugin
//!
//! Owns the compiled rule tables and the background tasks, and turns incoming
//! chat lines into replies sent through the [`Host`].

use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::PluginInfo;
use crate::host::Host;
use crate::rules::{self, ReplyContext, RuleTable};
use crate::scheduler::{Job, Scheduler, TaskHandle};
use crate::settings::{
    CHECK_UPDATE, PRIVATE_REPLIES, PUBLIC_REPLIES, SettingValue, SettingsEvent, SettingsSnapshot,
    SettingsWatcher,
};
use crate::update::{ReleaseSource, UpdateChecker};
use crate::{EVENT_TARGET, REPLY_TARGET};

/// Name of the update check task
pub const UPDATE_TASK: &str = "AutoUpdate";
/// Name of the settings watcher task
pub const WATCHER_TASK: &str = "SettingsWatcher";

/// Which rule table a message is answered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatScope {
    Public,
    Private,
}

impl ChatScope {
    /// Settings key holding the rule text for this scope
    #[must_use]
    pub const fn setting_key(self) -> &'static str {
        match self {
            Self::Public => PUBLIC_REPLIES,
            Self::Private => PRIVATE_REPLIES,
        }
    }
}

impl Display for ChatScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
        }
    }
}

struct PluginInner {
    host: Arc<dyn Host>,
    info: PluginInfo,
    scheduler: Scheduler,
    public: RwLock<Arc<RuleTable>>,
    private: RwLock<Arc<RuleTable>>,
    updates: Arc<UpdateChecker>,
}

impl PluginInner {
    fn table(&self, scope: ChatScope) -> &RwLock<Arc<RuleTable>> {
        match scope {
            ChatScope::Public => &self.public,
            ChatScope::Private => &self.private,
        }
    }

    /// Recompile both rule tables from the current settings
    fn parse_settings(&self) {
        for scope in [ChatScope::Public, ChatScope::Private] {
            let text = self
                .host
                .setting(scope.setting_key())
                .and_then(|value| value.as_text().map(str::to_owned))
                .unwrap_or_default();

            let output = rules::compile(&text);
            for error in &output.errors {
                warn!(target: EVENT_TARGET, scope = %scope, error = %error, "Skipped rule line");
                self.host.log(&error.to_string());
            }

            for rule in output.table.rules() {
                for template in &rule.templates {
                    for name in rules::unknown_placeholders(template) {
                        warn!(target: EVENT_TARGET, scope = %scope, placeholder = %name, "Unknown placeholder");
                        self.host
                            .log(&format!("Unknown placeholder {{{name}}} in reply \"{template}\""));
                    }
                }
            }

            info!(
                target: EVENT_TARGET,
                scope = %scope,
                rules = output.table.len(),
                errors = output.errors.len(),
                "Compiled reply rules"
            );
            *self.table(scope).write() = Arc::new(output.table);
        }
    }

    fn settings_changed(&self, event: &SettingsEvent) {
        match serde_json::to_string(&event.change) {
            Ok(json) => self.host.log(&format!("Settings change: {json}")),
            Err(e) => warn!(target: EVENT_TARGET, error = %e, "Could not serialize settings change"),
        }
        self.parse_settings();
    }
}

/// Chat autoresponder bound to one host
#[derive(Clone)]
pub struct AutoReplyPlugin {
    inner: Arc<PluginInner>,
}

impl AutoReplyPlugin {
    pub fn new(host: Arc<dyn Host>, info: PluginInfo, source: Arc<dyn ReleaseSource>) -> Self {
        let sink_host = Arc::clone(&host);
        let scheduler = Scheduler::new(info.poll_granularity())
            .with_error_sink(move |e| sink_host.log(&format!("ERROR: {e}")));
        let updates = Arc::new(UpdateChecker::new(info.clone(), Arc::clone(&host), source));

        Self {
            inner: Arc::new(PluginInner {
                host,
                info,
                scheduler,
                public: RwLock::new(Arc::default()),
                private: RwLock::new(Arc::default()),
                updates,
            }),
        }
    }

    /// Settings every host starts with
    #[must_use]
    pub fn default_settings() -> SettingsSnapshot {
        SettingsSnapshot::from([
            (CHECK_UPDATE.to_string(), SettingValue::Bool(true)),
            (
                PUBLIC_REPLIES.to_string(),
                SettingValue::from("i/test=Test failed"),
            ),
            (PRIVATE_REPLIES.to_string(), SettingValue::from("")),
        ])
    }

    /// Fill in missing settings, compile the rules and start the background
    /// tasks. Must be called from within a tokio runtime.
    pub fn init(&self) {
        let inner = &self.inner;
        for (key, value) in Self::default_settings() {
            if inner.host.setting(&key).is_none() {
                inner.host.set_setting(&key, value);
            }
        }
        inner.parse_settings();

        let updates: Arc<dyn Job> = Arc::clone(&inner.updates) as Arc<dyn Job>;
        inner
            .scheduler
            .schedule(UPDATE_TASK, inner.info.update_interval(), updates, false);

        let source_host = Arc::clone(&inner.host);
        let listener: Weak<PluginInner> = Arc::downgrade(inner);
        let watcher = SettingsWatcher::new(
            move || source_host.settings(),
            move |event| {
                if let Some(inner) = listener.upgrade() {
                    inner.settings_changed(&event);
                }
            },
        );
        // Shorter than the granularity so every poll picks up edits
        inner.scheduler.schedule(
            WATCHER_TASK,
            inner.scheduler.granularity() / 2,
            Arc::new(watcher),
            false,
        );

        inner
            .host
            .log(&format!("Running version {}", inner.info.version));
    }

    /// Stop the background tasks without waiting for them. Safe to call
    /// more than once.
    pub async fn disable(&self) {
        let running = self.inner.scheduler.tasks().len();
        self.inner.scheduler.shutdown(false).await;
        if running > 0 {
            info!(target: EVENT_TARGET, stopped = running, "Plugin disabled");
        }
    }

    /// Recompile both rule tables from the current settings
    pub fn parse_settings(&self) {
        self.inner.parse_settings();
    }

    /// React to a settings change reported by the host
    pub fn settings_changed(&self, event: &SettingsEvent) {
        self.inner.settings_changed(event);
    }

    /// The rule table currently answering `scope`
    #[must_use]
    pub fn rules(&self, scope: ChatScope) -> Arc<RuleTable> {
        Arc::clone(&*self.inner.table(scope).read())
    }

    /// Pick and render a reply to `line`, if any rule matches
    #[must_use]
    pub fn compose_reply(&self, scope: ChatScope, user: &str, line: &str, room: &str) -> Option<String> {
        let table = self.rules(scope);
        let selection = table.find_reply(line)?;
        let own_name = self.inner.host.current_login();
        let context = ReplyContext {
            own_name: &own_name,
            sender: user,
            room,
        };
        Some(rules::render(selection.template, &context, &selection.groups))
    }

    pub async fn on_public_message(&self, room: &str, user: &str, line: &str) {
        let Some(reply) = self.compose_reply(ChatScope::Public, user, line, room) else {
            return;
        };

        match self.inner.host.send_public(room, &reply).await {
            Ok(()) => {
                info!(target: REPLY_TARGET, scope = "public", room = %room, user = %user, "Sent reply");
                self.inner.host.log(&format!(
                    "Sent message \"{reply}\" to room #{room} as a reply to \"{line}\" from \"{user}\""
                ));
            }
            Err(e) => {
                warn!(target: REPLY_TARGET, room = %room, error = %e, "Could not send reply");
                self.inner
                    .host
                    .log(&format!("ERROR: Could not send message to room #{room}: {e}"));
            }
        }
    }

    pub async fn on_private_message(&self, user: &str, line: &str) {
        let Some(reply) = self.compose_reply(ChatScope::Private, user, line, "") else {
            return;
        };

        match self.inner.host.send_private(user, &reply).await {
            Ok(()) => {
                info!(target: REPLY_TARGET, scope = "private", user = %user, "Sent reply");
                self.inner.host.log(&format!(
                    "Sent message \"{reply}\" to user \"{user}\" as a reply to \"{line}\""
                ));
            }
            Err(e) => {
                warn!(target: REPLY_TARGET, user = %user, error = %e, "Could not send reply");
                self.inner
                    .host
                    .log(&format!("ERROR: Could not send message to user \"{user}\": {e}"));
            }
        }
    }

    /// Newer release found by the last update check
    #[must_use]
    pub fn available_update(&self) -> Option<String> {
        self.inner.updates.available_update()
    }

    #[must_use]
    pub fn info(&self) -> &PluginInfo {
        &self.inner.info
    }

    /// Handles of the running background tasks
    #[must_use]
    pub fn tasks(&self) -> Vec<TaskHandle> {
        let tasks = self.inner.scheduler.tasks();
        debug!(target: EVENT_TARGET, count = tasks.len(), "Listing tasks");
        tasks
    }
}
