//! Task management
//!
//! [`TaskManager`] owns the shutdown signal and collects critical task
//! failures. [`TaskExecutor`] is the cloneable handle components use to spawn
//! work on the runtime.
//!
//! Critical tasks report an error or a panic through
//! [`TaskManager::wait_for_critical_failure`]; the process is expected to exit
//! non-zero and be restarted by its supervisor. Plain critical tasks are
//! dropped when shutdown is signaled, graceful ones observe the signal and
//! are awaited.

use core::fmt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

mod metrics;
mod shutdown;

use crate::metrics::TaskExecutorMetrics;
use crate::shutdown::GracefulShutdownGuard;
pub use shutdown::Shutdown;

/// A critical task returned an error or panicked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("critical task `{task_name}` failed: {error}")]
pub struct CriticalTaskError {
    task_name: &'static str,
    error: String,
}

impl CriticalTaskError {
    pub fn task_name(&self) -> &'static str {
        self.task_name
    }

    pub fn error(&self) -> &str {
        &self.error
    }
}

/// Owner of the shutdown signal.
#[derive(Debug)]
pub struct TaskManager {
    handle: Handle,
    signal: watch::Sender<bool>,
    failures_tx: mpsc::UnboundedSender<CriticalTaskError>,
    failures_rx: mpsc::UnboundedReceiver<CriticalTaskError>,
    graceful_tasks: Arc<AtomicUsize>,
}

impl TaskManager {
    pub fn new(handle: Handle) -> Self {
        let (signal, _) = watch::channel(false);
        let (failures_tx, failures_rx) = mpsc::unbounded_channel();
        Self {
            handle,
            signal,
            failures_tx,
            failures_rx,
            graceful_tasks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Task manager on the current runtime. Panics outside a runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    pub fn executor(&self) -> TaskExecutor {
        TaskExecutor {
            handle: self.handle.clone(),
            on_shutdown: Shutdown::new(self.signal.subscribe()),
            failures_tx: self.failures_tx.clone(),
            metrics: TaskExecutorMetrics::default(),
            graceful_tasks: self.graceful_tasks.clone(),
        }
    }

    /// Resolves with the first critical task failure.
    pub async fn wait_for_critical_failure(&mut self) -> Option<CriticalTaskError> {
        self.failures_rx.recv().await
    }

    pub fn fire_shutdown(&self) {
        self.signal.send_replace(true);
    }

    /// Signals shutdown and waits for graceful tasks to finish. Returns
    /// `false` if some were still running when `timeout` elapsed.
    pub async fn graceful_shutdown_with_timeout(self, timeout: Duration) -> bool {
        self.fire_shutdown();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = self.graceful_tasks.load(Ordering::SeqCst);
            if remaining == 0 {
                debug!("graceful shutdown complete");
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(remaining, "graceful shutdown timed out");
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Spawns tasks tied to a [`TaskManager`].
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    handle: Handle,
    on_shutdown: Shutdown,
    failures_tx: mpsc::UnboundedSender<CriticalTaskError>,
    metrics: TaskExecutorMetrics,
    graceful_tasks: Arc<AtomicUsize>,
}

impl TaskExecutor {
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn on_shutdown_signal(&self) -> Shutdown {
        self.on_shutdown.clone()
    }

    /// Spawns a task whose error or panic is reported as a critical failure.
    /// Dropped when shutdown is signaled.
    pub fn spawn_critical<F, E>(&self, name: &'static str, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let finished = self.metrics.spawned_critical();
        let failures = self.failures_tx.clone();
        let mut shutdown = self.on_shutdown_signal();

        self.handle.spawn(async move {
            let _finished = finished;
            let outcome = tokio::select! {
                outcome = AssertUnwindSafe(fut).catch_unwind() => outcome,
                _ = shutdown.wait() => {
                    debug!(task = name, "critical task stopped by shutdown");
                    return;
                }
            };
            report_outcome(name, outcome, &failures);
        })
    }

    /// Spawns a critical task that observes the shutdown signal itself.
    ///
    /// [`TaskManager::graceful_shutdown_with_timeout`] waits for it to return.
    pub fn spawn_critical_with_graceful_shutdown_signal<F, E>(
        &self,
        name: &'static str,
        f: impl FnOnce(Shutdown) -> F,
    ) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let finished = self.metrics.spawned_critical();
        let guard = GracefulShutdownGuard::new(self.graceful_tasks.clone());
        let failures = self.failures_tx.clone();
        let fut = f(self.on_shutdown_signal());

        self.handle.spawn(async move {
            let _finished = finished;
            let _guard = guard;
            let outcome = AssertUnwindSafe(fut).catch_unwind().await;
            report_outcome(name, outcome, &failures);
        })
    }
}

fn report_outcome<E: fmt::Display>(
    task_name: &'static str,
    outcome: Result<Result<(), E>, Box<dyn Any + Send>>,
    failures: &mpsc::UnboundedSender<CriticalTaskError>,
) {
    let error = match outcome {
        Ok(Ok(())) => {
            debug!(task = task_name, "critical task finished");
            return;
        }
        Ok(Err(err)) => err.to_string(),
        Err(panic) => panic_message(panic.as_ref()),
    };
    error!(task = task_name, %error, "critical task failed");
    let _ = failures.send(CriticalTaskError { task_name, error });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panicked".to_string()
    }
}
