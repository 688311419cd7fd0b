//! Supervised background tasks
//!
//! The agent runs few tasks: the print dispatcher and, when file logging is
//! on, log retention. Each runs under a panic catcher and reports its state
//! into a [`TaskHealth`] board that `/health` reads.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use dashmap::DashMap;
use futures::FutureExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Must run for the agent's whole life
    Worker,
    /// Housekeeping on a timer
    Periodic,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskKind::Worker => "worker",
            TaskKind::Periodic => "periodic",
        })
    }
}

/// Last known state of a supervised task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum TaskState {
    Running,
    Stopped,
    Panicked(String),
}

/// Shared view of task states, keyed by task name
#[derive(Debug, Clone, Default)]
pub struct TaskHealth {
    states: Arc<DashMap<&'static str, (TaskKind, TaskState)>>,
}

impl TaskHealth {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, name: &'static str, kind: TaskKind, state: TaskState) {
        self.states.insert(name, (kind, state));
    }

    pub fn state(&self, name: &str) -> Option<TaskState> {
        self.states.get(name).map(|entry| entry.value().1.clone())
    }

    /// Workers that are not running; a stopped housekeeping task is tolerated
    pub fn failed_workers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .states
            .iter()
            .filter(|e| e.value().0 == TaskKind::Worker && e.value().1 != TaskState::Running)
            .map(|e| e.key().to_string())
            .collect();
        names.sort();
        names
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}

/// Owner of the running tasks
///
/// All tasks share one cancellation token. [`BackgroundTasks::shutdown`]
/// cancels it and joins them.
pub struct BackgroundTasks {
    handles: Vec<(&'static str, JoinHandle<()>)>,
    shutdown: CancellationToken,
    health: TaskHealth,
}

impl BackgroundTasks {
    pub fn new(health: TaskHealth) -> Self {
        Self {
            handles: Vec::new(),
            shutdown: CancellationToken::new(),
            health,
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawn under supervision; a panic is caught and recorded
    pub fn spawn<F>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let health = self.health.clone();
        let shutdown = self.shutdown.clone();
        health.set(name, kind, TaskState::Running);

        let handle = tokio::spawn(async move {
            let state = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(()) => {
                    if !shutdown.is_cancelled() {
                        tracing::warn!(task = name, %kind, "Task returned before shutdown");
                    }
                    TaskState::Stopped
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(task = name, %kind, panic = %message, "Task panicked");
                    TaskState::Panicked(message)
                }
            };
            health.set(name, kind, state);
        });

        tracing::debug!(task = name, %kind, "Task started");
        self.handles.push((name, handle));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancel every task and wait for it to return
    pub async fn shutdown(self) {
        tracing::info!(count = self.handles.len(), "Stopping background tasks");
        self.shutdown.cancel();

        for (name, handle) in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(task = name, error = %e, "Task join failed");
            }
        }
    }
}
