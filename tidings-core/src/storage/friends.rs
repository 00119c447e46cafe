// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Friend roster operations.

use chrono::{DateTime, Utc};
use parking_lot::MutexGuard;
use tracing::info;

use super::model::Friend;
use super::{friend_status_filename, DataStore, StorageError, StoreEvent, FRIENDS_FILENAME};

type FriendsGuard<'a> = MutexGuard<'a, Option<Vec<Friend>>>;

impl DataStore {
    // === Friend Operations ===

    /// Lists all friends. The returned list is a copy.
    pub fn list_friends(&self) -> Result<Vec<Friend>, StorageError> {
        let mut guard = self.friends.lock();
        Ok(self.load_friends(&mut guard)?.clone())
    }

    /// Gets a friend by ID.
    pub fn get_friend_by_id(&self, id: &str) -> Result<Friend, StorageError> {
        self.find_friend(|f| f.id() == id)?
            .ok_or_else(|| StorageError::NotFound(format!("friend {}", id)))
    }

    /// Gets a friend by nickname.
    pub fn get_friend_by_nickname(&self, nickname: &str) -> Result<Friend, StorageError> {
        self.find_friend(|f| f.nickname() == nickname)?
            .ok_or_else(|| StorageError::NotFound(format!("friend named {}", nickname)))
    }

    /// Gets a friend by transport certificate.
    pub fn get_friend_by_certificate(&self, certificate: &str) -> Result<Friend, StorageError> {
        self.find_friend(|f| f.public_identity().certificate() == certificate)?
            .ok_or_else(|| StorageError::NotFound("friend with certificate".into()))
    }

    /// Adds a friend.
    ///
    /// Fails with `AlreadyExists` if a friend with the same id or nickname is
    /// already present; the stored list is unchanged in that case.
    pub fn add_friend(&self, friend: Friend) -> Result<(), StorageError> {
        let status_lock = self.friend_status_lock(friend.id());
        {
            let _status = status_lock.lock();
            let mut guard = self.friends.lock();
            let friends = self.load_friends(&mut guard)?;

            check_unique(friends, &friend, None)?;

            // A status file left behind by an interrupted removal is stale
            self.files.delete(&friend_status_filename(friend.id()))?;

            let mut updated = friends.clone();
            updated.push(friend.clone());
            self.files.write(FRIENDS_FILENAME, &updated)?;
            *guard = Some(updated);
        }

        info!("Added friend: {}", friend.nickname());
        self.dispatch(StoreEvent::FriendAdded {
            friend_id: friend.id().to_string(),
        });
        Ok(())
    }

    /// Replaces the friend with the same id. Fails with `NotFound` if absent.
    pub fn update_friend(&self, friend: Friend) -> Result<(), StorageError> {
        {
            let mut guard = self.friends.lock();
            let friends = self.load_friends(&mut guard)?;

            let index = position(friends, friend.id())?;
            check_unique(friends, &friend, Some(index))?;

            let mut updated = friends.clone();
            updated[index] = friend.clone();
            self.files.write(FRIENDS_FILENAME, &updated)?;
            *guard = Some(updated);
        }

        info!("Updated friend: {}", friend.nickname());
        self.dispatch(StoreEvent::FriendUpdated {
            friend_id: friend.id().to_string(),
        });
        Ok(())
    }

    /// Updates the friend if its id is known, otherwise adds it.
    pub fn insert_or_update_friend(&self, friend: Friend) -> Result<(), StorageError> {
        match self.update_friend(friend.clone()) {
            Err(StorageError::NotFound(_)) => self.add_friend(friend),
            other => other,
        }
    }

    /// Records that a status was just sent to the friend.
    pub fn update_friend_last_sent_status_at(&self, id: &str) -> Result<(), StorageError> {
        let now = Utc::now();
        self.modify_friend(id, |f| f.with_last_sent_status_at(now))
    }

    /// Records that a status was just received from the friend.
    pub fn update_friend_last_received_status_at(&self, id: &str) -> Result<(), StorageError> {
        let now = Utc::now();
        self.modify_friend(id, |f| f.with_last_received_status_at(now))
    }

    /// When a status was last sent to the friend.
    pub fn friend_last_sent_status_at(
        &self,
        id: &str,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self.get_friend_by_id(id)?.last_sent_status_at())
    }

    /// When a status was last received from the friend.
    pub fn friend_last_received_status_at(
        &self,
        id: &str,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self.get_friend_by_id(id)?.last_received_status_at())
    }

    /// Removes a friend and its stored status.
    pub fn remove_friend(&self, id: &str) -> Result<(), StorageError> {
        let removed = {
            let mut guard = self.friends.lock();
            let friends = self.load_friends(&mut guard)?;

            let index = position(friends, id)?;
            let mut updated = friends.clone();
            let removed = updated.remove(index);
            self.files.write(FRIENDS_FILENAME, &updated)?;
            *guard = Some(updated);
            removed
        };

        // Taken after the list lock is released; an in-flight status update
        // for this friend either finished already or will find it gone.
        let status_lock = self.friend_status_lock(id);
        {
            let _status = status_lock.lock();
            self.files.delete(&friend_status_filename(id))?;
        }
        self.friend_status_locks.lock().remove(id);

        info!("Removed friend: {}", removed.nickname());
        self.dispatch(StoreEvent::FriendRemoved {
            friend_id: id.to_string(),
        });
        Ok(())
    }

    fn modify_friend<F>(&self, id: &str, change: F) -> Result<(), StorageError>
    where
        F: FnOnce(Friend) -> Friend,
    {
        {
            let mut guard = self.friends.lock();
            let friends = self.load_friends(&mut guard)?;

            let index = position(friends, id)?;
            let mut updated = friends.clone();
            updated[index] = change(updated[index].clone());
            self.files.write(FRIENDS_FILENAME, &updated)?;
            *guard = Some(updated);
        }

        self.dispatch(StoreEvent::FriendUpdated {
            friend_id: id.to_string(),
        });
        Ok(())
    }

    fn find_friend<P>(&self, predicate: P) -> Result<Option<Friend>, StorageError>
    where
        P: Fn(&Friend) -> bool,
    {
        let mut guard = self.friends.lock();
        let friends = self.load_friends(&mut guard)?;
        Ok(friends.iter().find(|f| predicate(f)).cloned())
    }

    /// Loads the friend list into the cache on first use.
    fn load_friends<'g>(
        &self,
        guard: &'g mut FriendsGuard<'_>,
    ) -> Result<&'g Vec<Friend>, StorageError> {
        if guard.is_none() {
            let friends = match self.files.read::<Vec<Friend>>(FRIENDS_FILENAME) {
                Ok(friends) => friends,
                Err(StorageError::NotFound(_)) => Vec::new(),
                Err(e) => return Err(e),
            };
            **guard = Some(friends);
        }
        Ok(guard.get_or_insert_with(Vec::new))
    }
}

fn position(friends: &[Friend], id: &str) -> Result<usize, StorageError> {
    friends
        .iter()
        .position(|f| f.id() == id)
        .ok_or_else(|| StorageError::NotFound(format!("friend {}", id)))
}

/// Fails if another entry (other than `skip`) shares the id or nickname.
fn check_unique(
    friends: &[Friend],
    candidate: &Friend,
    skip: Option<usize>,
) -> Result<(), StorageError> {
    for (index, existing) in friends.iter().enumerate() {
        if Some(index) == skip {
            continue;
        }
        if existing.id() == candidate.id() {
            return Err(StorageError::AlreadyExists(format!(
                "friend {}",
                candidate.id()
            )));
        }
        if existing.nickname() == candidate.nickname() {
            return Err(StorageError::AlreadyExists(format!(
                "friend named {}",
                candidate.nickname()
            )));
        }
    }
    Ok(())
}
