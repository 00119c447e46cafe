// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Persistent Storage Module
//!
//! Durable source of truth for self, friends and statuses.
//!
//! Every logical entity (self, own status, the friend list, each friend's
//! status) is one JSON document guarded by its own lock. Writes go through a
//! commit file (see [`files`]) and in-memory caches are updated only after the
//! write has been published, so readers never observe a value ahead of disk.
//!
//! Lock order is per-friend status, then friend list; self before own status.

mod error;
mod events;
mod files;
mod friends;
mod model;
mod self_record;
mod status;

pub use error::{ErrorKind, StorageError};
pub use events::{CallbackObserver, EventDispatcher, StoreEvent, StoreObserver, SubscriptionId};
pub use files::COMMIT_SUFFIX;
pub use model::{Friend, Location, Message, SelfRecord, Status, MAX_MESSAGE_COUNT};
pub use status::is_stale_status;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use files::FileStore;

pub(crate) const SELF_FILENAME: &str = "self.json";
pub(crate) const SELF_STATUS_FILENAME: &str = "selfStatus.json";
pub(crate) const FRIENDS_FILENAME: &str = "friends.json";

/// File name holding the status of friend `id`.
pub fn friend_status_filename(id: &str) -> String {
    format!("{}-friendStatus.json", id)
}

/// File-backed data store.
///
/// Owned by the composition root and shared (`Arc`) with the engine and
/// exchange sessions.
pub struct DataStore {
    files: FileStore,
    self_record: Mutex<Option<SelfRecord>>,
    self_status: Mutex<Option<Status>>,
    friends: Mutex<Option<Vec<Friend>>>,
    friend_status_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    events: EventDispatcher,
}

impl DataStore {
    /// Opens or creates a store in the given directory.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        Ok(DataStore {
            files: FileStore::open(dir.as_ref())?,
            self_record: Mutex::new(None),
            self_status: Mutex::new(None),
            friends: Mutex::new(None),
            friend_status_locks: Mutex::new(HashMap::new()),
            events: EventDispatcher::new(),
        })
    }

    /// Returns the data directory.
    pub fn directory(&self) -> &Path {
        self.files.dir()
    }

    /// Registers an observer for change notifications.
    pub fn subscribe(&self, observer: Arc<dyn StoreObserver>) -> SubscriptionId {
        self.events.subscribe(observer)
    }

    /// Removes an observer.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Deletes all persisted state and clears caches.
    ///
    /// Stop the engine first: a poll finishing concurrently may write a
    /// friend status after the reset.
    pub fn reset(&self) -> Result<(), StorageError> {
        let mut self_record = self.self_record.lock();
        let mut self_status = self.self_status.lock();
        let mut friends = self.friends.lock();

        let result = self.files.delete_all();

        // Whatever survived on disk is reloaded on next access
        *self_record = None;
        *self_status = None;
        *friends = None;
        self.friend_status_locks.lock().clear();

        result?;
        info!("Reset all data");
        Ok(())
    }

    pub(crate) fn dispatch(&self, event: StoreEvent) {
        self.events.dispatch(event);
    }
}
