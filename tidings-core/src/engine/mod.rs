// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Engine Module
//!
//! Background execution: polls every friend for status, keeps the sharing
//! endpoint bound to the current identity, and reports the best location fix
//! into own status.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tidings_core::engine::{Engine, EngineConfig};
//!
//! let engine = Engine::new(store, EngineConfig::default(), transport, sharing, location);
//! engine.start()?;
//! // ...
//! engine.stop();
//! ```

mod config;
mod error;
pub mod mock;
mod poll;
mod scheduler;
mod transport;

pub use config::EngineConfig;
pub use error::EngineError;
pub use mock::{FetchRequest, MockLocationSource, MockSharingService, MockTransport};
pub use transport::{
    authorized_certificates, EndpointMaterial, LocationSource, SharingEndpoint, SharingService,
    StatusResponder, StatusTransport, TransportCredentials, TransportError,
};

use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::location::LocationTracker;
use crate::storage::{DataStore, StorageError, StoreEvent, StoreObserver, SubscriptionId};
use poll::start_poll_chain;
use scheduler::{Scheduler, SchedulerHandle};

/// State shared by the tasks of one engine run.
struct Run {
    store: Arc<DataStore>,
    transport: Arc<dyn StatusTransport>,
    sharing: Arc<dyn SharingService>,
    tracker: Arc<LocationTracker>,
    config: EngineConfig,
    scheduler: SchedulerHandle,
    endpoint: Mutex<Option<Box<dyn SharingEndpoint>>>,
    /// Friends with a live poll chain. At most one chain per friend id.
    poll_chains: Mutex<HashSet<String>>,
}

impl Run {
    /// Stops the current endpoint, then launches one for the current identity.
    ///
    /// The endpoint lock is held throughout, so two endpoints never overlap.
    fn restart_endpoint(&self) -> Result<(), EngineError> {
        let mut endpoint = self.endpoint.lock();
        if self.scheduler.is_cancelled() {
            debug!("Engine stopping, sharing endpoint not restarted");
            return Ok(());
        }
        if let Some(mut old) = endpoint.take() {
            old.stop();
        }

        let material = match EndpointMaterial::load(&self.store) {
            Ok(material) => material,
            Err(StorageError::NotFound(_)) => {
                debug!("No identity yet, sharing endpoint not started");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let responder = StatusResponder::new(Arc::clone(&self.store));
        *endpoint = Some(self.sharing.launch(material, responder)?);
        info!("Sharing endpoint started");
        Ok(())
    }

    /// Pushes the current friend list to the running endpoint.
    fn refresh_endpoint(&self) -> Result<(), EngineError> {
        let certificates = authorized_certificates(&self.store)?;
        if let Some(endpoint) = self.endpoint.lock().as_mut() {
            endpoint.set_authorized_certificates(certificates);
        }
        Ok(())
    }

    fn stop_endpoint(&self) {
        if let Some(mut endpoint) = self.endpoint.lock().take() {
            endpoint.stop();
            info!("Sharing endpoint stopped");
        }
    }
}

fn schedule_location_report(run: &Arc<Run>, delay: Duration) {
    let task_run = Arc::clone(run);
    run.scheduler.schedule("location report", delay, move || {
        let result = task_run.tracker.report(&task_run.store);
        schedule_location_report(&task_run, task_run.config.location_report_period);
        result.map(|_| ()).map_err(EngineError::from)
    });
}

/// Reacts to store changes on behalf of a run.
struct EngineObserver {
    run: Weak<Run>,
}

impl StoreObserver for EngineObserver {
    fn on_event(&self, event: StoreEvent) {
        let run = match self.run.upgrade() {
            Some(run) => run,
            None => return,
        };

        match event {
            StoreEvent::SelfUpdated => {
                let task_run = Arc::clone(&run);
                run.scheduler
                    .submit("sharing endpoint restart", move || {
                        task_run.restart_endpoint()
                    });
            }
            StoreEvent::FriendAdded { friend_id } => {
                start_poll_chain(&run, friend_id);
                let task_run = Arc::clone(&run);
                run.scheduler
                    .submit("sharing endpoint refresh", move || {
                        task_run.refresh_endpoint()
                    });
            }
            StoreEvent::FriendRemoved { .. } => {
                let task_run = Arc::clone(&run);
                run.scheduler
                    .submit("sharing endpoint refresh", move || {
                        task_run.refresh_endpoint()
                    });
            }
            _ => {}
        }
    }
}

/// A started engine.
struct Running {
    scheduler: Scheduler,
    run: Arc<Run>,
    subscription: SubscriptionId,
}

/// Background engine.
///
/// `start` and `stop` are serialized and idempotent. They block, so call
/// them from a plain thread: not from an async context and not from a task
/// running on the engine's own pool.
pub struct Engine {
    store: Arc<DataStore>,
    transport: Arc<dyn StatusTransport>,
    sharing: Arc<dyn SharingService>,
    location: Arc<dyn LocationSource>,
    tracker: Arc<LocationTracker>,
    config: Mutex<EngineConfig>,
    running: Mutex<Option<Running>>,
}

impl Engine {
    pub fn new(
        store: Arc<DataStore>,
        config: EngineConfig,
        transport: Arc<dyn StatusTransport>,
        sharing: Arc<dyn SharingService>,
        location: Arc<dyn LocationSource>,
    ) -> Self {
        Engine {
            store,
            transport,
            sharing,
            location,
            tracker: Arc::new(LocationTracker::new()),
            config: Mutex::new(config),
            running: Mutex::new(None),
        }
    }

    /// Starts the worker pool, location updates, the sharing endpoint and
    /// one poll chain per friend. Does nothing if already running.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Ok(());
        }

        let config = self.config.lock().clone();
        config.validate()?;

        let scheduler = Scheduler::start(&config)?;
        let run = Arc::new(Run {
            store: Arc::clone(&self.store),
            transport: Arc::clone(&self.transport),
            sharing: Arc::clone(&self.sharing),
            tracker: Arc::clone(&self.tracker),
            config: config.clone(),
            scheduler: scheduler.handle(),
            endpoint: Mutex::new(None),
            poll_chains: Mutex::new(HashSet::new()),
        });

        // Subscribed before listing friends so none added meanwhile is missed
        let subscription = self.store.subscribe(Arc::new(EngineObserver {
            run: Arc::downgrade(&run),
        }));

        if let Err(e) = self.start_run(&run) {
            self.store.unsubscribe(subscription);
            self.location.stop();
            scheduler.shutdown();
            run.stop_endpoint();
            return Err(e);
        }

        *running = Some(Running {
            scheduler,
            run,
            subscription,
        });
        info!(
            "Engine started (poll period {:?}, {} workers)",
            config.friend_poll_period, config.max_workers
        );
        Ok(())
    }

    fn start_run(&self, run: &Arc<Run>) -> Result<(), EngineError> {
        self.location.start(Arc::clone(&self.tracker))?;
        run.restart_endpoint()?;

        for friend in self.store.list_friends()? {
            start_poll_chain(run, friend.id().to_string());
        }
        schedule_location_report(run, run.config.location_report_period);
        Ok(())
    }

    /// Stops everything started by [`start`](Self::start).
    ///
    /// Pending timers are cancelled; tasks already running get up to the
    /// drain timeout to finish. Does nothing if not running.
    pub fn stop(&self) {
        let mut running = self.running.lock();
        let Some(Running {
            scheduler,
            run,
            subscription,
        }) = running.take()
        else {
            return;
        };

        self.store.unsubscribe(subscription);
        self.location.stop();
        // Drained first: a queued endpoint restart must not outlive stop
        scheduler.shutdown();
        run.stop_endpoint();
        info!("Engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Returns the active configuration.
    pub fn config(&self) -> EngineConfig {
        self.config.lock().clone()
    }

    /// Best location fix tracker fed by the location source.
    pub fn location_tracker(&self) -> Arc<LocationTracker> {
        Arc::clone(&self.tracker)
    }

    /// Applies new preferences by restarting the engine wholesale.
    pub fn on_preferences_changed(&self, config: EngineConfig) -> Result<(), EngineError> {
        config.validate()?;
        *self.config.lock() = config;

        if self.is_running() {
            info!("Preferences changed, restarting engine");
            self.stop();
            self.start()?;
        }
        Ok(())
    }

    /// Runs `work` on the worker pool.
    pub fn submit_task<F>(&self, work: F) -> Result<(), EngineError>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = self.scheduler_handle()?;
        if !handle.submit("submitted", move || {
            work();
            Ok(())
        }) {
            return Err(EngineError::NotRunning);
        }
        Ok(())
    }

    /// Runs `work` on the worker pool after `delay`.
    ///
    /// Cancelled if the engine stops before the delay elapses.
    pub fn schedule_task<F>(&self, work: F, delay: Duration) -> Result<(), EngineError>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = self.scheduler_handle()?;
        if !handle.schedule("scheduled", delay, move || {
            work();
            Ok(())
        }) {
            return Err(EngineError::NotRunning);
        }
        Ok(())
    }

    fn scheduler_handle(&self) -> Result<SchedulerHandle, EngineError> {
        self.running
            .lock()
            .as_ref()
            .map(|r| r.run.scheduler.clone())
            .ok_or(EngineError::NotRunning)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("Engine dropped while running");
            self.stop();
        }
    }
}
