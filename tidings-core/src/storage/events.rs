// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Change Notifications
//!
//! The store publishes an event after every committed mutation. Delivery is
//! synchronous, on the thread that made the change, once the entity lock has
//! been released, so observers may call back into the store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::model::{Friend, Status};

/// Events emitted by the data store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Self was created or replaced.
    SelfUpdated,

    /// Own status changed (message added or location updated).
    SelfStatusUpdated,

    /// A friend was added.
    FriendAdded {
        /// The friend ID.
        friend_id: String,
    },

    /// A friend record was updated.
    FriendUpdated {
        /// The friend ID.
        friend_id: String,
    },

    /// A friend was removed.
    FriendRemoved {
        /// The friend ID.
        friend_id: String,
    },

    /// A friend's status was accepted.
    FriendStatusUpdated {
        /// The friend whose status changed.
        friend: Friend,
        /// The newly stored status.
        status: Status,
        /// The status it replaced, if there was one.
        previous: Option<Status>,
    },
}

/// Store observer trait.
///
/// Implement this trait to receive store events.
pub trait StoreObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: StoreEvent);
}

/// Simple callback-based observer.
///
/// Wraps a closure for easy event handling.
pub struct CallbackObserver<F>
where
    F: Fn(StoreEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackObserver<F>
where
    F: Fn(StoreEvent) + Send + Sync,
{
    /// Creates a new callback observer.
    pub fn new(callback: F) -> Self {
        CallbackObserver { callback }
    }
}

impl<F> StoreObserver for CallbackObserver<F>
where
    F: Fn(StoreEvent) + Send + Sync,
{
    fn on_event(&self, event: StoreEvent) {
        (self.callback)(event);
    }
}

/// Handle returned by [`EventDispatcher::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Event dispatcher for managing multiple observers.
#[derive(Default)]
pub struct EventDispatcher {
    observers: RwLock<Vec<(SubscriptionId, Arc<dyn StoreObserver>)>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    pub fn new() -> Self {
        EventDispatcher::default()
    }

    /// Adds an observer.
    pub fn subscribe(&self, observer: Arc<dyn StoreObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        id
    }

    /// Removes an observer. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Returns the number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Dispatches an event to all observers.
    pub fn dispatch(&self, event: StoreEvent) {
        // Snapshot so observers can subscribe or unsubscribe during delivery
        let observers: Vec<Arc<dyn StoreObserver>> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in observers {
            observer.on_event(event.clone());
        }
    }
}
