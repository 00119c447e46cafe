// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Common Test Utilities
//!
//! Shared fixtures for integration tests: isolated stores, generated
//! identities and small polling helpers.

#![allow(dead_code)]

pub mod strategies;

use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tidings_core::storage::{DataStore, Friend, Location, Message, SelfRecord, Status};

static TRACING: Once = Once::new();

/// Installs a test log subscriber once per test binary. Honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Opens a store in a fresh temporary directory.
///
/// Keep the `TempDir` alive for as long as the store is used.
pub fn test_store() -> (TempDir, Arc<DataStore>) {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = Arc::new(DataStore::open(dir.path()).unwrap());
    (dir, store)
}

/// Opens a store whose own identity is already set.
pub fn store_with_self(nickname: &str) -> (TempDir, Arc<DataStore>) {
    let (dir, store) = test_store();
    store
        .update_self(SelfRecord::generate(nickname).unwrap())
        .unwrap();
    (dir, store)
}

/// Creates a peer identity and adds it as a friend of `store`.
pub fn add_test_friend(store: &DataStore, nickname: &str) -> (SelfRecord, Friend) {
    let peer = SelfRecord::generate(nickname).unwrap();
    let friend = Friend::new(peer.public_identity().clone(), Utc::now());
    store.add_friend(friend.clone()).unwrap();
    (peer, friend)
}

/// Builds a status with one message per timestamp, newest first.
pub fn status_at(timestamps: &[DateTime<Utc>]) -> Status {
    let mut sorted = timestamps.to_vec();
    sorted.sort_by(|a, b| b.cmp(a));
    let messages = sorted
        .into_iter()
        .map(|t| Message::at(t, format!("at {}", t.timestamp_millis())))
        .collect();
    Status::new(messages, None)
}

pub fn test_location(timestamp: DateTime<Utc>) -> Location {
    Location {
        timestamp,
        latitude: 46.95,
        longitude: 7.45,
        precision: 12,
        street_address: None,
    }
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
