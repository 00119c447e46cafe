// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Scheduler and worker pool.
//!
//! Each engine run owns a tokio runtime. Timers are async tasks that only
//! wait and then hand the work to the blocking pool; all I/O runs on the
//! pool. Stopping cancels timers that have not fired yet and gives running
//! pool tasks a bounded time to finish.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::watch;
use tracing::{debug, error, warn};

use super::{EngineConfig, EngineError};

/// Owns the runtime of one engine run.
pub(crate) struct Scheduler {
    runtime: Runtime,
    cancel: watch::Sender<bool>,
    handle: SchedulerHandle,
    drain_timeout: Duration,
}

impl Scheduler {
    pub(crate) fn start(config: &EngineConfig) -> Result<Self, EngineError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.max_workers)
            .thread_name("tidings-engine")
            .enable_time()
            .build()
            .map_err(EngineError::WorkerPool)?;

        let (cancel, cancelled) = watch::channel(false);
        let handle = SchedulerHandle {
            runtime: runtime.handle().clone(),
            cancelled,
        };

        Ok(Scheduler {
            runtime,
            cancel,
            handle,
            drain_timeout: config.drain_timeout,
        })
    }

    pub(crate) fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Cancels pending timers and waits for running tasks.
    ///
    /// Blocks for up to the drain timeout. Must not be called from a task
    /// running on this scheduler.
    pub(crate) fn shutdown(self) {
        self.cancel.send_replace(true);
        self.runtime.shutdown_timeout(self.drain_timeout);
        debug!("Scheduler stopped");
    }
}

/// Cloneable access to a running scheduler.
#[derive(Clone)]
pub(crate) struct SchedulerHandle {
    runtime: Handle,
    cancelled: watch::Receiver<bool>,
}

impl SchedulerHandle {
    pub(crate) fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Runs `work` on the worker pool.
    pub(crate) fn submit<F>(&self, label: &'static str, work: F) -> bool
    where
        F: FnOnce() -> Result<(), EngineError> + Send + 'static,
    {
        if self.is_cancelled() {
            return false;
        }
        self.runtime
            .spawn_blocking(move || run_guarded(label, work));
        true
    }

    /// Runs `work` on the worker pool once `delay` has elapsed.
    ///
    /// The timer is dropped without running `work` if the scheduler is
    /// stopped first.
    pub(crate) fn schedule<F>(&self, label: &'static str, delay: Duration, work: F) -> bool
    where
        F: FnOnce() -> Result<(), EngineError> + Send + 'static,
    {
        if self.is_cancelled() {
            return false;
        }

        let pool = self.clone();
        let cancelled = self.cancelled.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    pool.submit(label, work);
                }
                _ = wait_cancelled(cancelled) => {
                    debug!("Cancelled pending {} task", label);
                }
            }
        });
        true
    }
}

async fn wait_cancelled(mut cancelled: watch::Receiver<bool>) {
    loop {
        let done = *cancelled.borrow_and_update();
        if done {
            return;
        }
        // Sender dropped: the scheduler is gone
        if cancelled.changed().await.is_err() {
            return;
        }
    }
}

/// Task boundary: errors and panics are logged, never propagated.
fn run_guarded<F>(label: &'static str, work: F)
where
    F: FnOnce() -> Result<(), EngineError>,
{
    match catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(())) => {}
        Ok(Err(EngineError::Storage(e))) if e.is_not_found() => {}
        Ok(Err(EngineError::FriendGone(_))) => {}
        Ok(Err(EngineError::Transport(e))) => warn!("{} task failed: {}", label, e),
        Ok(Err(e)) => error!("{} task failed: {}", label, e),
        Err(panic) => error!("{} task panicked: {}", label, panic_message(panic.as_ref())),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
