//! Settings change detection
//!
//! The watcher is a scheduled job: each run diffs the current settings against
//! the last snapshot it saw and reports what changed.

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use super::SettingsSnapshot;
use crate::scheduler::Job;
use crate::{EVENT_TARGET, Error};

/// The pairs that differ between two snapshots
///
/// `before` holds the old values of changed keys, `after` the new ones. A key
/// that was removed only shows up in `before`, a new key only in `after`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettingsChange {
    pub before: SettingsSnapshot,
    pub after: SettingsSnapshot,
}

impl SettingsChange {
    /// Symmetric difference of the key/value pairs, or `None` if equal
    #[must_use]
    pub fn between(before: &SettingsSnapshot, after: &SettingsSnapshot) -> Option<Self> {
        let changed_before: SettingsSnapshot = before
            .iter()
            .filter(|(key, value)| after.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let changed_after: SettingsSnapshot = after
            .iter()
            .filter(|(key, value)| before.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        if changed_before.is_empty() && changed_after.is_empty() {
            None
        } else {
            Some(Self {
                before: changed_before,
                after: changed_after,
            })
        }
    }
}

/// Full-state notification raised when settings change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsEvent {
    pub before: SettingsSnapshot,
    pub after: SettingsSnapshot,
    pub change: SettingsChange,
}

type SnapshotFn = Box<dyn Fn() -> SettingsSnapshot + Send + Sync>;
type ListenerFn = Box<dyn Fn(SettingsEvent) + Send + Sync>;

/// Job that raises a [`SettingsEvent`] whenever the settings differ from the
/// previous observation
pub struct SettingsWatcher {
    source: SnapshotFn,
    listener: ListenerFn,
    baseline: Mutex<Option<SettingsSnapshot>>,
}

impl SettingsWatcher {
    /// Watch the snapshots produced by `source`, reporting to `listener`
    pub fn new(
        source: impl Fn() -> SettingsSnapshot + Send + Sync + 'static,
        listener: impl Fn(SettingsEvent) + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: Box::new(source),
            listener: Box::new(listener),
            baseline: Mutex::new(None),
        }
    }

    /// Compare the current settings with the baseline and advance it.
    ///
    /// The first call only records the baseline.
    pub fn poll(&self) -> Option<SettingsEvent> {
        let current = (self.source)();
        let mut baseline = self.baseline.lock();

        let Some(previous) = baseline.as_ref() else {
            debug!(target: EVENT_TARGET, keys = current.len(), "Recorded settings baseline");
            *baseline = Some(current);
            return None;
        };

        let change = SettingsChange::between(previous, &current)?;
        let event = SettingsEvent {
            before: previous.clone(),
            after: current.clone(),
            change,
        };
        *baseline = Some(current);
        Some(event)
    }
}

#[async_trait::async_trait]
impl Job for SettingsWatcher {
    async fn run(&self) -> Result<(), Error> {
        if let Some(event) = self.poll() {
            debug!(
                target: EVENT_TARGET,
                changed = event.change.after.len() + event.change.before.len(),
                "Settings changed"
            );
            (self.listener)(event);
        }
        Ok(())
    }
}
