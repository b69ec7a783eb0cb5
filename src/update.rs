//! Periodic check for a newer released version

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::PluginInfo;
use crate::host::Host;
use crate::scheduler::Job;
use crate::settings::CHECK_UPDATE;
use crate::{BOT_NAME, Error};

/// Default GitHub API root
pub const GITHUB_API: &str = "https://api.github.com";

/// Errors from fetching release metadata
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Release service returned {0}")]
    Status(reqwest::StatusCode),
}

/// Where released versions are published
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Name of the newest tag of `repository`, if it has any
    async fn latest_version_tag(&self, repository: &str) -> Result<Option<String>, UpdateError>;
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

/// Reads tags from the GitHub REST API
#[derive(Debug, Clone)]
pub struct GithubTags {
    client: reqwest::Client,
    api_base: String,
}

impl Default for GithubTags {
    fn default() -> Self {
        Self::new(GITHUB_API)
    }
}

impl GithubTags {
    #[must_use]
    pub fn new(api_base: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(BOT_NAME)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_base: api_base.into(),
        }
    }
}

#[async_trait::async_trait]
impl ReleaseSource for GithubTags {
    async fn latest_version_tag(&self, repository: &str) -> Result<Option<String>, UpdateError> {
        let url = format!("{}/repos/{repository}/tags", self.api_base);
        let response = self
            .client
            .get(&url)
            .header("accept", "application/vnd.github+json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UpdateError::Status(response.status()));
        }

        let tags: Vec<Tag> = response.json().await?;
        Ok(tags.into_iter().next().map(|tag| tag.name))
    }
}

/// Job that looks for a newer release and announces it through the host
pub struct UpdateChecker {
    info: PluginInfo,
    host: Arc<dyn Host>,
    source: Arc<dyn ReleaseSource>,
    available: RwLock<Option<String>>,
    last_checked: RwLock<Option<DateTime<Utc>>>,
}

impl UpdateChecker {
    pub fn new(info: PluginInfo, host: Arc<dyn Host>, source: Arc<dyn ReleaseSource>) -> Self {
        Self {
            info,
            host,
            source,
            available: RwLock::new(None),
            last_checked: RwLock::new(None),
        }
    }

    /// Tag of a newer release found by the last check
    #[must_use]
    pub fn available_update(&self) -> Option<String> {
        self.available.read().clone()
    }

    /// When the release service was last asked
    #[must_use]
    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        *self.last_checked.read()
    }

    /// Check once. Failures are logged and clear any known update.
    pub async fn check(&self) {
        let enabled = self
            .host
            .setting(CHECK_UPDATE)
            .and_then(|value| value.as_bool())
            .unwrap_or(true);

        let repository = match self.info.repository.as_deref() {
            Some(repository) if enabled && !self.info.is_dev_build() => repository,
            _ => {
                debug!(version = %self.info.version, enabled = enabled, "Skipping update check");
                *self.available.write() = None;
                return;
            }
        };

        let result = self.source.latest_version_tag(repository).await;
        *self.last_checked.write() = Some(Utc::now());

        match result {
            Ok(Some(tag)) if tag.replace('v', "") != self.info.version => {
                info!(current = %self.info.version, latest = %tag, "Newer version available");
                self.announce(repository, &tag);
                *self.available.write() = Some(tag);
            }
            Ok(_) => {
                debug!(version = %self.info.version, "Running the latest version");
                *self.available.write() = None;
            }
            Err(e) => {
                warn!(error = %e, "Update check failed");
                self.host.log(&format!("ERROR: Could not fetch update: {e}"));
                *self.available.write() = None;
            }
        }
    }

    fn announce(&self, repository: &str, tag: &str) {
        let message = format!(
            "# A new version of \"{}\" is available: {tag} https://github.com/{repository}/releases/tag/{tag}",
            self.info.name
        );
        let border = "#".repeat(message.chars().count());
        self.host.log(&format!("\n{border}\n{message}\n{border}"));
    }
}

#[async_trait::async_trait]
impl Job for UpdateChecker {
    async fn run(&self) -> Result<(), Error> {
        self.check().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MockHost;
    use crate::settings::SettingValue;
    use mockall::predicate::eq;

    fn info(version: &str, repository: Option<&str>) -> PluginInfo {
        PluginInfo {
            name: "Auto Reply".to_string(),
            version: version.to_string(),
            repository: repository.map(ToString::to_string),
            ..Default::default()
        }
    }

    fn host_with_check_update(enabled: bool) -> MockHost {
        let mut host = MockHost::new();
        host.expect_setting()
            .with(eq(CHECK_UPDATE))
            .returning(move |_| Some(SettingValue::Bool(enabled)));
        host
    }

    #[tokio::test]
    async fn test_newer_tag_is_announced() {
        let mut host = host_with_check_update(true);
        host.expect_log()
            .withf(|message| {
                message.contains("A new version of \"Auto Reply\" is available: v1.1.0")
                    && message.contains("https://github.com/someone/autoreply/releases/tag/v1.1.0")
            })
            .times(1)
            .return_const(());

        let mut source = MockReleaseSource::new();
        source
            .expect_latest_version_tag()
            .with(eq("someone/autoreply"))
            .times(1)
            .returning(|_| Ok(Some("v1.1.0".to_string())));

        let checker = UpdateChecker::new(info("1.0.0", Some("someone/autoreply")), Arc::new(host), Arc::new(source));
        checker.check().await;

        assert_eq!(checker.available_update().as_deref(), Some("v1.1.0"));
        assert!(checker.last_checked().is_some());
    }

    #[tokio::test]
    async fn test_same_version_is_not_an_update() {
        let host = host_with_check_update(true);
        let mut source = MockReleaseSource::new();
        source
            .expect_latest_version_tag()
            .returning(|_| Ok(Some("v1.0.0".to_string())));

        let checker = UpdateChecker::new(info("1.0.0", Some("someone/autoreply")), Arc::new(host), Arc::new(source));
        checker.check().await;
        assert!(checker.available_update().is_none());
    }

    #[tokio::test]
    async fn test_network_failure_resets_update() {
        let logged = Arc::new(parking_lot::Mutex::new(Vec::<String>::new()));
        let mut host = host_with_check_update(true);
        let sink = Arc::clone(&logged);
        host.expect_log()
            .returning(move |message| sink.lock().push(message.to_string()));

        let mut source = MockReleaseSource::new();
        let mut calls = 0;
        source.expect_latest_version_tag().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(Some("v2.0.0".to_string()))
            } else {
                Err(UpdateError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE))
            }
        });

        let checker = UpdateChecker::new(info("1.0.0", Some("someone/autoreply")), Arc::new(host), Arc::new(source));
        checker.check().await;
        assert_eq!(checker.available_update().as_deref(), Some("v2.0.0"));

        checker.check().await;
        assert!(checker.available_update().is_none());

        let logged = logged.lock();
        assert_eq!(logged.len(), 2);
        assert!(logged[1].starts_with("ERROR: Could not fetch update: "));
    }

    #[tokio::test]
    async fn test_skipped_when_disabled_dev_or_unconfigured() {
        for (version, repository, enabled) in [
            ("1.0.0", Some("someone/autoreply"), false),
            ("1.0.0.dev1", Some("someone/autoreply"), true),
            ("1.0.0", None, true),
        ] {
            let host = host_with_check_update(enabled);
            let mut source = MockReleaseSource::new();
            source.expect_latest_version_tag().never();

            let checker = UpdateChecker::new(info(version, repository), Arc::new(host), Arc::new(source));
            checker.check().await;
            assert!(checker.available_update().is_none());
            assert!(checker.last_checked().is_none());
        }
    }

    #[tokio::test]
    async fn test_repository_without_tags() {
        let host = host_with_check_update(true);
        let mut source = MockReleaseSource::new();
        source.expect_latest_version_tag().returning(|_| Ok(None));

        let checker = UpdateChecker::new(info("1.0.0", Some("someone/autoreply")), Arc::new(host), Arc::new(source));
        checker.run().await.expect("Job should not fail");
        assert!(checker.available_update().is_none());
    }
}
