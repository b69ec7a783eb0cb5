//! Units of recurring work and their pacing

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::Error;

/// Work performed each time a scheduled task becomes due
#[async_trait::async_trait]
pub trait Job: Send + Sync + 'static {
    /// Run the work once
    async fn run(&self) -> Result<(), Error>;
}

/// A job backed by an async closure
pub struct FnJob<F>(F);

/// Wrap an async closure as a [`Job`]
pub fn job_fn<F, Fut>(f: F) -> FnJob<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    FnJob(f)
}

#[async_trait::async_trait]
impl<F, Fut> Job for FnJob<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    async fn run(&self) -> Result<(), Error> {
        (self.0)().await
    }
}

/// How long a task waits between runs
///
/// Dynamic intervals are re-evaluated on every polling cycle, so a job can
/// back off after failures. A zero duration means the task is never due.
#[derive(Clone)]
pub enum Interval {
    Fixed(Duration),
    Dynamic(Arc<dyn Fn() -> Duration + Send + Sync>),
}

impl Interval {
    /// Create an interval that is computed on every poll
    pub fn dynamic(f: impl Fn() -> Duration + Send + Sync + 'static) -> Self {
        Self::Dynamic(Arc::new(f))
    }

    /// The interval's current value
    #[must_use]
    pub fn current(&self) -> Duration {
        match self {
            Self::Fixed(duration) => *duration,
            Self::Dynamic(f) => f(),
        }
    }
}

impl From<Duration> for Interval {
    fn from(duration: Duration) -> Self {
        Self::Fixed(duration)
    }
}

impl fmt::Debug for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(duration) => f.debug_tuple("Fixed").field(duration).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_fixed_interval() {
        let interval = Interval::from(Duration::from_secs(5));
        assert_eq!(interval.current(), Duration::from_secs(5));
        assert_eq!(format!("{interval:?}"), "Fixed(5s)");
    }

    #[test]
    fn test_dynamic_interval_is_reevaluated() {
        let backoff = Arc::new(AtomicU64::new(1));
        let source = Arc::clone(&backoff);
        let interval = Interval::dynamic(move || Duration::from_secs(source.load(Ordering::SeqCst)));

        assert_eq!(interval.current(), Duration::from_secs(1));
        backoff.store(30, Ordering::SeqCst);
        assert_eq!(interval.current(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_job_fn_runs_closure() {
        let job = job_fn(|| async { Err::<(), Error>("boom".into()) });
        let result = job.run().await;
        assert_eq!(result.unwrap_err().to_string(), "boom");
    }
}
