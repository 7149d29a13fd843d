//! Spawn counters of the executor.

use core::fmt;

use metrics::Counter;

#[derive(Clone)]
pub(crate) struct TaskExecutorMetrics {
    critical_spawned: Counter,
    critical_finished: Counter,
}

impl Default for TaskExecutorMetrics {
    fn default() -> Self {
        Self {
            critical_spawned: metrics::counter!("executor.spawn.critical_tasks_total"),
            critical_finished: metrics::counter!("executor.spawn.finished_critical_tasks_total"),
        }
    }
}

impl fmt::Debug for TaskExecutorMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskExecutorMetrics").finish_non_exhaustive()
    }
}

impl TaskExecutorMetrics {
    /// Counts a spawn. The returned guard counts the finish when the task
    /// ends, however it ends.
    pub(crate) fn spawned_critical(&self) -> FinishedOnDrop {
        self.critical_spawned.increment(1);
        FinishedOnDrop(self.critical_finished.clone())
    }
}

pub(crate) struct FinishedOnDrop(Counter);

impl fmt::Debug for FinishedOnDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FinishedOnDrop")
    }
}

impl Drop for FinishedOnDrop {
    fn drop(&mut self) {
        self.0.increment(1);
    }
}
