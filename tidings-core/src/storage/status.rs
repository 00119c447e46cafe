// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Friend status operations and the stale-status rule.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use super::model::Status;
use super::{friend_status_filename, DataStore, StorageError, StoreEvent};

/// Returns true when `incoming` must not replace `stored`.
///
/// Guards against an out-of-order pull overwriting fresher pushed data.
/// The incoming status is stale if it carries fewer messages, or an older
/// newest message, or drops or ages the stored location.
///
/// This compares wall-clock timestamps set by the peer, so it is a heuristic
/// and not a causal ordering.
pub fn is_stale_status(incoming: &Status, stored: &Status) -> bool {
    let stale_messages = match stored.newest_message() {
        Some(stored_newest) => {
            incoming.messages().len() < stored.messages().len()
                || incoming
                    .newest_message()
                    .map_or(true, |newest| newest.timestamp < stored_newest.timestamp)
        }
        None => false,
    };

    let stale_location = match stored.location() {
        Some(stored_location) => incoming
            .location()
            .map_or(true, |location| location.timestamp < stored_location.timestamp),
        None => false,
    };

    stale_messages || stale_location
}

impl DataStore {
    // === Friend Status Operations ===

    /// Returns the stored status of a friend.
    ///
    /// Fails with `NotFound` if the friend does not exist; a friend with no
    /// stored status yet has an empty one.
    pub fn get_friend_status(&self, id: &str) -> Result<Status, StorageError> {
        let lock = self.friend_status_lock(id);
        let _guard = lock.lock();

        self.get_friend_by_id(id)?;
        match self.files.read::<Status>(&friend_status_filename(id)) {
            Ok(status) => Ok(status),
            Err(StorageError::NotFound(_)) => Ok(Status::empty()),
            Err(e) => Err(e),
        }
    }

    /// Stores a status received from a friend, unless it is stale.
    ///
    /// Returns `Ok(true)` when the status was accepted and observers were
    /// notified, `Ok(false)` when it was discarded as stale. Fails with
    /// `NotFound` if the friend does not exist.
    pub fn update_friend_status(&self, id: &str, status: Status) -> Result<bool, StorageError> {
        let status = status.trimmed();
        let filename = friend_status_filename(id);

        let lock = self.friend_status_lock(id);
        let (friend, previous) = {
            let _guard = lock.lock();
            let friend = self.get_friend_by_id(id)?;

            let previous = match self.files.read::<Status>(&filename) {
                Ok(previous) => Some(previous),
                Err(StorageError::NotFound(_)) => None,
                Err(e) => return Err(e),
            };

            if let Some(previous) = &previous {
                if is_stale_status(&status, previous) {
                    info!("Discarded stale friend status: {}", friend.nickname());
                    return Ok(false);
                }
            }

            self.files.write(&filename, &status)?;
            (friend, previous)
        };

        info!("Updated friend status: {}", friend.nickname());
        self.dispatch(StoreEvent::FriendStatusUpdated {
            friend,
            status,
            previous,
        });
        Ok(true)
    }

    /// Returns the lock serializing access to one friend's status document.
    pub(super) fn friend_status_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.friend_status_locks.lock();
        Arc::clone(locks.entry(id.to_string()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Location, Message};
    use chrono::{DateTime, Duration, Utc};

    fn messages(base: DateTime<Utc>, offsets: &[i64]) -> Vec<Message> {
        offsets
            .iter()
            .map(|s| Message::at(base + Duration::seconds(*s), format!("m{}", s)))
            .collect()
    }

    fn location(at: DateTime<Utc>) -> Location {
        Location {
            timestamp: at,
            latitude: 45.4,
            longitude: -75.7,
            precision: 20,
            street_address: None,
        }
    }

    #[test]
    fn test_anything_replaces_empty() {
        let t0 = Utc::now();
        assert!(!is_stale_status(&Status::empty(), &Status::empty()));
        let incoming = Status::new(messages(t0, &[1]), Some(location(t0)));
        assert!(!is_stale_status(&incoming, &Status::empty()));
    }

    #[test]
    fn test_fewer_messages_is_stale() {
        let t0 = Utc::now();
        let stored = Status::new(messages(t0, &[2, 1]), None);
        let incoming = Status::new(messages(t0, &[3]), None);
        assert!(is_stale_status(&incoming, &stored));
    }

    #[test]
    fn test_older_newest_message_is_stale() {
        let t0 = Utc::now();
        let stored = Status::new(messages(t0, &[5, 1]), None);
        let incoming = Status::new(messages(t0, &[4, 3, 1]), None);
        assert!(is_stale_status(&incoming, &stored));
    }

    #[test]
    fn test_newer_messages_accepted() {
        let t0 = Utc::now();
        let stored = Status::new(messages(t0, &[2, 1]), None);
        let incoming = Status::new(messages(t0, &[3, 2, 1]), None);
        assert!(!is_stale_status(&incoming, &stored));
    }

    #[test]
    fn test_dropped_location_is_stale() {
        let t0 = Utc::now();
        let stored = Status::new(Vec::new(), Some(location(t0)));
        let incoming = Status::new(Vec::new(), None);
        assert!(is_stale_status(&incoming, &stored));
    }

    #[test]
    fn test_older_location_is_stale() {
        let t0 = Utc::now();
        let stored = Status::new(Vec::new(), Some(location(t0)));
        let older = Status::new(Vec::new(), Some(location(t0 - Duration::seconds(1))));
        let same = Status::new(Vec::new(), Some(location(t0)));
        assert!(is_stale_status(&older, &stored));
        assert!(!is_stale_status(&same, &stored));
    }
}
