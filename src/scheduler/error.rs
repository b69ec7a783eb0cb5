//! Error types for the scheduler
//!
//! Failures raised while running a scheduled job. None of these ever stop a
//! task's loop; they are reported and the task carries on.

use thiserror::Error;

/// Errors that can occur while executing a scheduled job
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The job returned an error
    #[error("Task {task} failed: {message}")]
    ActionFailed { task: String, message: String },

    /// The job panicked
    #[error("Task {task} panicked")]
    Panicked { task: String },

    /// The job's execution context was torn down before it finished
    #[error("Task {task} was aborted: {message}")]
    Aborted { task: String, message: String },
}

impl SchedulerError {
    /// Name of the task that produced the error
    #[must_use]
    pub fn task(&self) -> &str {
        match self {
            Self::ActionFailed { task, .. } | Self::Panicked { task } | Self::Aborted { task, .. } => {
                task
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SchedulerError::ActionFailed {
            task: "AutoUpdate".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(error.to_string(), "Task AutoUpdate failed: connection refused");
        assert_eq!(error.task(), "AutoUpdate");

        let error = SchedulerError::Panicked {
            task: "SettingsWatcher".to_string(),
        };
        assert_eq!(error.to_string(), "Task SettingsWatcher panicked");
    }
}
