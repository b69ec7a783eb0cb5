//! Periodic job scheduler
//!
//! Every scheduled task gets its own tokio task that polls at a fixed
//! granularity and runs the job whenever it is due. Tasks never block each
//! other, and a failing or panicking job never ends its loop.

mod error;
mod job;

pub use error::SchedulerError;
pub use job::{FnJob, Interval, Job, job_fn};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::SCHEDULER_TARGET;

/// Default polling granularity
pub const DEFAULT_GRANULARITY: Duration = Duration::from_secs(1);

/// Callback receiving job failures
pub type ErrorSink = Arc<dyn Fn(&SchedulerError) + Send + Sync>;

/// Shared state of one scheduled task
#[derive(Debug)]
struct TaskState {
    name: String,
    interval: Interval,
    paused: AtomicBool,
    last_run: Mutex<Option<Instant>>,
    started: watch::Sender<bool>,
}

impl TaskState {
    fn new(name: String, interval: Interval, paused: bool) -> Self {
        let (started, _) = watch::channel(false);
        Self {
            name,
            interval,
            paused: AtomicBool::new(paused),
            last_run: Mutex::new(None),
            started,
        }
    }

    /// A task is due when it is running, has a non-zero interval, and has
    /// either never run or last ran more than one interval ago.
    fn is_due(&self, now: Instant) -> bool {
        if self.paused.load(Ordering::SeqCst) {
            return false;
        }

        let interval = self.interval.current();
        if interval.is_zero() {
            return false;
        }

        match *self.last_run.lock() {
            None => true,
            Some(last_run) => now.saturating_duration_since(last_run) > interval,
        }
    }

    fn record_run(&self, at: Instant) {
        *self.last_run.lock() = Some(at);
    }

    fn mark_started(&self) {
        if !*self.started.borrow() {
            self.started.send_replace(true);
        }
    }
}

/// Handle to a scheduled task
///
/// Cloning the handle is cheap; all clones control the same task.
#[derive(Clone)]
pub struct TaskHandle {
    state: Arc<TaskState>,
    cancel: CancellationToken,
    join: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.state.name)
            .field("interval", &self.state.interval)
            .field("paused", &self.is_paused())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl TaskHandle {
    /// Name of the task
    #[must_use]
    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Stop the task from becoming due. The last run time is kept.
    pub fn pause(&self) {
        self.state.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.state.paused.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state.paused.load(Ordering::SeqCst)
    }

    /// When the job last finished running, if ever
    #[must_use]
    pub fn last_run(&self) -> Option<Instant> {
        *self.state.last_run.lock()
    }

    /// Whether the task would run if polled right now
    #[must_use]
    pub fn is_due(&self) -> bool {
        self.state.is_due(Instant::now())
    }

    /// Whether the task's loop has completed at least one pass
    #[must_use]
    pub fn has_started(&self) -> bool {
        *self.state.started.borrow()
    }

    /// Wait until the task's loop has completed at least one pass,
    /// whether or not the job was due during that pass.
    pub async fn wait_started(&self) {
        let mut started = self.state.started.subscribe();
        // The sender lives in the shared state, so this only fails if the
        // state itself is gone.
        let _ = started.wait_for(|started| *started).await;
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Ask the task to stop.
    ///
    /// With `wait` set, returns once the task's loop has exited, which may
    /// mean waiting for an in-flight job to finish. Otherwise returns at once.
    pub async fn stop(&self, wait: bool) {
        self.cancel.cancel();
        if !wait {
            return;
        }

        let join = self.join.lock().take();
        if let Some(join) = join {
            if let Err(e) = join.await {
                warn!(target: SCHEDULER_TARGET, task = %self.state.name, error = %e, "Task loop did not exit cleanly");
            }
        }
    }
}

/// Runs named jobs on independent intervals
pub struct Scheduler {
    granularity: Duration,
    error_sink: Option<ErrorSink>,
    tasks: Mutex<Vec<TaskHandle>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_GRANULARITY)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("granularity", &self.granularity)
            .field("tasks", &*self.tasks.lock())
            .finish()
    }
}

impl Scheduler {
    /// Create a scheduler that polls its tasks every `granularity`
    #[must_use]
    pub fn new(granularity: Duration) -> Self {
        let granularity = if granularity.is_zero() {
            DEFAULT_GRANULARITY
        } else {
            granularity
        };

        Self {
            granularity,
            error_sink: None,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Report job failures to `sink` in addition to the tracing log
    #[must_use]
    pub fn with_error_sink(mut self, sink: impl Fn(&SchedulerError) + Send + Sync + 'static) -> Self {
        self.error_sink = Some(Arc::new(sink));
        self
    }

    #[must_use]
    pub fn granularity(&self) -> Duration {
        self.granularity
    }

    /// Start running `job` every `interval` on its own tokio task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(
        &self,
        name: impl Into<String>,
        interval: impl Into<Interval>,
        job: Arc<dyn Job>,
        paused: bool,
    ) -> TaskHandle {
        let state = Arc::new(TaskState::new(name.into(), interval.into(), paused));
        let cancel = CancellationToken::new();

        info!(
            target: SCHEDULER_TARGET,
            task = %state.name,
            interval = ?state.interval,
            paused = paused,
            "Scheduling task"
        );

        let join = tokio::spawn(run_task(
            Arc::clone(&state),
            job,
            self.granularity,
            self.error_sink.clone(),
            cancel.clone(),
        ));

        let handle = TaskHandle {
            state,
            cancel,
            join: Arc::new(Mutex::new(Some(join))),
        };
        self.tasks.lock().push(handle.clone());
        handle
    }

    /// Handles of every task started by this scheduler
    #[must_use]
    pub fn tasks(&self) -> Vec<TaskHandle> {
        self.tasks.lock().clone()
    }

    /// Stop every task
    pub async fn shutdown(&self, wait: bool) {
        let tasks: Vec<TaskHandle> = self.tasks.lock().drain(..).collect();
        for task in &tasks {
            task.stop(wait).await;
        }
    }
}

/// The polling loop of one task
async fn run_task(
    state: Arc<TaskState>,
    job: Arc<dyn Job>,
    granularity: Duration,
    error_sink: Option<ErrorSink>,
    cancel: CancellationToken,
) {
    debug!(target: SCHEDULER_TARGET, task = %state.name, "Task loop started");

    while !cancel.is_cancelled() {
        if state.is_due(Instant::now()) {
            if let Err(e) = execute(&state, &job).await {
                error!(target: SCHEDULER_TARGET, task = %state.name, error = %e, "Scheduled job failed");
                if let Some(sink) = &error_sink {
                    sink(&e);
                }
            }
        }
        state.mark_started();

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(granularity) => {}
        }
    }

    debug!(target: SCHEDULER_TARGET, task = %state.name, "Task loop exited");
}

/// Run the job once on its own tokio task so a panic is contained.
/// The run time is recorded even on failure to avoid a retry storm.
async fn execute(state: &TaskState, job: &Arc<dyn Job>) -> Result<(), SchedulerError> {
    let run_id = Uuid::new_v4();
    let started = Instant::now();

    let job = Arc::clone(job);
    let outcome = tokio::spawn(async move { job.run().await }).await;
    state.record_run(Instant::now());

    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or_default();
    match outcome {
        Ok(Ok(())) => {
            debug!(
                target: SCHEDULER_TARGET,
                task = %state.name,
                run_id = %run_id,
                duration_ms = duration_ms,
                "Scheduled job completed"
            );
            Ok(())
        }
        Ok(Err(e)) => Err(SchedulerError::ActionFailed {
            task: state.name.clone(),
            message: e.to_string(),
        }),
        Err(e) if e.is_panic() => Err(SchedulerError::Panicked {
            task: state.name.clone(),
        }),
        Err(e) => Err(SchedulerError::Aborted {
            task: state.name.clone(),
            message: e.to_string(),
        }),
    }
}
