//! ---
//! hsup_section: "01-core-functionality"
//! hsup_subsection: "module"
//! hsup_type: "source"
//! hsup_scope: "code"
//! hsup_description: "Runtime helpers supporting the orchestrator."
//! hsup_version: "v0.0.0-prealpha"
//! hsup_owner: "tbd"
//! ---
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Shortest recurrence accepted by [`Scheduler::register_task`].
pub const MIN_TASK_INTERVAL: Duration = Duration::from_millis(1);

type TaskFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// A named callable executed on every scheduler tick.
#[derive(Clone)]
pub struct ScheduledTask {
    name: String,
    run: TaskFn,
}

impl ScheduledTask {
    pub fn new<F, Fut>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            run: Arc::new(move || run().boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self) -> BoxFuture<'static, ()> {
        (self.run)()
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Runs registered tasks on their own tokio tasks until shut down.
///
/// Each registration owns an interval timer. Registrations are never cancelled
/// individually; [`Scheduler::shutdown`] stops all of them at once and waits for
/// any in-flight execution to finish.
#[derive(Debug)]
pub struct Scheduler {
    shutdown: broadcast::Sender<()>,
    tasks: Mutex<Vec<(String, JoinHandle<()>)>>,
    stopped: AtomicBool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown, _) = broadcast::channel(4);
        Self {
            shutdown,
            tasks: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        }
    }

    /// Register `task` to run every `interval`.
    ///
    /// With `first_run` the task executes immediately, ahead of the first
    /// interval, and concurrently with whatever the caller does next.
    pub fn register_task(&self, task: ScheduledTask, interval: Duration, first_run: bool) {
        if self.stopped.load(Ordering::SeqCst) {
            warn!(task = %task.name(), "scheduler already stopped; registration ignored");
            return;
        }
        let period = interval.max(MIN_TASK_INTERVAL);
        let start = if first_run {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut shutdown = self.shutdown.subscribe();
        let name = task.name().to_owned();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        debug!(task = %task.name(), "scheduled task stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        debug!(task = %task.name(), "running scheduled task");
                        task.invoke().await;
                    }
                }
            }
        });
        info!(
            task = %name,
            interval_secs = period.as_secs(),
            first_run,
            "scheduled task registered"
        );
        self.tasks.lock().push((name, handle));
    }

    /// Number of registrations currently owned by the scheduler.
    pub fn task_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Stop every registered task and wait for them to wind down.
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown.send(());
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for (name, handle) in tasks {
            if let Err(err) = handle.await {
                error!(task = %name, error = %err, "scheduled task join error");
            }
        }
        info!("scheduler stopped");
    }
}
