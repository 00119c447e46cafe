// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Self and own-status operations.

use tracing::info;

use super::model::{Location, Message, SelfRecord, Status};
use super::{DataStore, StorageError, StoreEvent, SELF_FILENAME, SELF_STATUS_FILENAME};

impl DataStore {
    // === Self Operations ===

    /// Returns the local identity.
    ///
    /// Fails with `NotFound` if no identity has been created.
    pub fn get_self(&self) -> Result<SelfRecord, StorageError> {
        let mut cached = self.self_record.lock();
        if let Some(record) = cached.as_ref() {
            return Ok(record.clone());
        }
        let record: SelfRecord = self.files.read(SELF_FILENAME)?;
        *cached = Some(record.clone());
        Ok(record)
    }

    /// True once a local identity has been created.
    pub fn has_self(&self) -> bool {
        self.self_record.lock().is_some() || self.files.exists(SELF_FILENAME)
    }

    /// Replaces the local identity wholesale.
    ///
    /// The status published under the previous identity is deleted.
    pub fn update_self(&self, record: SelfRecord) -> Result<(), StorageError> {
        {
            let mut cached = self.self_record.lock();
            let mut status = self.self_status.lock();

            self.files.delete(SELF_STATUS_FILENAME)?;
            *status = None;

            self.files.write(SELF_FILENAME, &record)?;
            *cached = Some(record);
        }

        info!("Updated own identity");
        self.dispatch(StoreEvent::SelfUpdated);
        Ok(())
    }

    // === Own Status Operations ===

    /// Returns own status. Never `NotFound`: an unset status is empty.
    pub fn get_self_status(&self) -> Result<Status, StorageError> {
        let mut cached = self.self_status.lock();
        load_self_status(self, &mut cached)
    }

    /// Prepends a message to own status, keeping the newest messages.
    pub fn add_self_status_message(&self, message: Message) -> Result<(), StorageError> {
        {
            let mut cached = self.self_status.lock();
            let updated = load_self_status(self, &mut cached)?.with_message(message);
            self.files.write(SELF_STATUS_FILENAME, &updated)?;
            *cached = Some(updated);
        }

        info!("Added own message");
        self.dispatch(StoreEvent::SelfStatusUpdated);
        Ok(())
    }

    /// Replaces the location in own status.
    pub fn update_self_status_location(&self, location: Location) -> Result<(), StorageError> {
        {
            let mut cached = self.self_status.lock();
            let updated = load_self_status(self, &mut cached)?.with_location(location);
            self.files.write(SELF_STATUS_FILENAME, &updated)?;
            *cached = Some(updated);
        }

        info!("Updated own location");
        self.dispatch(StoreEvent::SelfStatusUpdated);
        Ok(())
    }
}

fn load_self_status(
    store: &DataStore,
    cached: &mut Option<Status>,
) -> Result<Status, StorageError> {
    if let Some(status) = cached.as_ref() {
        return Ok(status.clone());
    }
    let status = match store.files.read::<Status>(SELF_STATUS_FILENAME) {
        Ok(status) => status,
        Err(StorageError::NotFound(_)) => Status::empty(),
        Err(e) => return Err(e),
    };
    *cached = Some(status.clone());
    Ok(status)
}
