//! Cooperative scheduler for periodic probes
//!
//! Every periodic task runs on the attached tokio runtime and executes each
//! tick inside its own fault boundary: an `Err` or a panic from one tick is
//! logged and counted, the task keeps its schedule, and other tasks are not
//! affected.

use crate::error::{ProbeError, WatchdogError};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use ulid::Ulid;

/// Periodic task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub Ulid);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who registered a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskOwner {
    /// The watchdog's own probes
    Watchdog,
    /// Application timers (polling, autosave, ...)
    Application,
}

/// Description of a registered task
#[derive(Debug, Clone)]
pub struct TaskInfo {
    /// Task id
    pub id: TaskId,
    /// Human-readable name
    pub name: String,
    /// Owner
    pub owner: TaskOwner,
    /// Tick period
    pub period: Duration,
}

struct TaskEntry {
    info: TaskInfo,
    abort: AbortHandle,
}

/// Registry of periodic tasks
#[derive(Default)]
pub struct Scheduler {
    runtime: Mutex<Option<Handle>>,
    tasks: DashMap<TaskId, TaskEntry>,
    faults: Arc<AtomicU64>,
}

impl Scheduler {
    /// Scheduler with no runtime attached
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to a runtime
    pub fn attach(&self, handle: Handle) {
        *self.runtime.lock() = Some(handle);
    }

    /// Attach to the runtime the caller is running on
    ///
    /// # Errors
    /// [`WatchdogError::NoRuntime`] outside a tokio context.
    pub fn attach_current(&self) -> Result<(), WatchdogError> {
        let handle = Handle::try_current().map_err(|_| WatchdogError::NoRuntime)?;
        self.attach(handle);
        Ok(())
    }

    /// Whether a runtime is attached
    #[inline]
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.runtime.lock().is_some()
    }

    /// Run `tick` every `period`, first tick one period from now
    ///
    /// # Errors
    /// - [`WatchdogError::NoRuntime`] if no runtime is attached
    /// - [`WatchdogError::ZeroPeriod`] if `period` is zero
    pub fn every<F>(
        &self,
        name: impl Into<String>,
        owner: TaskOwner,
        period: Duration,
        tick: F,
    ) -> Result<TaskId, WatchdogError>
    where
        F: Fn() -> Result<(), ProbeError> + Send + Sync + 'static,
    {
        let name = name.into();
        if period.is_zero() {
            return Err(WatchdogError::ZeroPeriod(name));
        }
        let handle = self
            .runtime
            .lock()
            .clone()
            .ok_or(WatchdogError::NoRuntime)?;

        let id = TaskId(Ulid::new());
        let faults = Arc::clone(&self.faults);
        let task_name = name.clone();

        let join = handle.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                run_tick(&task_name, &tick, &faults);
            }
        });

        tracing::debug!(task = %name, ?period, ?owner, "periodic task armed");
        self.tasks.insert(
            id,
            TaskEntry {
                info: TaskInfo {
                    id,
                    name,
                    owner,
                    period,
                },
                abort: join.abort_handle(),
            },
        );

        Ok(id)
    }

    /// Cancel one task
    pub fn cancel(&self, id: TaskId) -> bool {
        match self.tasks.remove(&id) {
            Some((_, entry)) => {
                entry.abort.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every outstanding task, returning how many were cancelled
    pub fn cancel_all(&self) -> usize {
        self.cancel_where(|_| true)
    }

    /// Cancel the tasks registered by `owner`
    pub fn cancel_owned_by(&self, owner: TaskOwner) -> usize {
        self.cancel_where(|info| info.owner == owner)
    }

    fn cancel_where(&self, predicate: impl Fn(&TaskInfo) -> bool) -> usize {
        let ids: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|entry| predicate(&entry.info))
            .map(|entry| *entry.key())
            .collect();

        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    /// Snapshot of registered tasks
    #[must_use]
    pub fn tasks(&self) -> Vec<TaskInfo> {
        self.tasks.iter().map(|entry| entry.info.clone()).collect()
    }

    /// Number of registered tasks
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no tasks are registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Ticks that failed or panicked since creation
    #[inline]
    #[must_use]
    pub fn fault_count(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("attached", &self.is_attached())
            .field("tasks", &self.tasks.len())
            .field("faults", &self.fault_count())
            .finish()
    }
}

fn run_tick<F>(name: &str, tick: &F, faults: &AtomicU64)
where
    F: Fn() -> Result<(), ProbeError>,
{
    match panic::catch_unwind(AssertUnwindSafe(tick)) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            faults.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(task = name, error = %err, "periodic task tick failed");
        }
        Err(_) => {
            faults.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(task = name, "periodic task tick panicked");
        }
    }
}
