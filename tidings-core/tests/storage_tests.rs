// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Data store integration tests.

mod common;

use std::fs;
use std::sync::Arc;

use chrono::{Duration, Utc};
use parking_lot::Mutex;
use proptest::prelude::*;

use common::strategies::message_content_strategy;
use common::*;
use tidings_core::storage::{
    friend_status_filename, CallbackObserver, DataStore, ErrorKind, Friend, Message, SelfRecord,
    Status, StorageError, StoreEvent, COMMIT_SUFFIX, MAX_MESSAGE_COUNT,
};

// ============================================================
// Self
// ============================================================

#[test]
fn test_get_self_before_creation_is_not_found() {
    let (_dir, store) = test_store();
    let err = store.get_self().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!store.has_self());

    store
        .update_self(SelfRecord::generate("alice").unwrap())
        .unwrap();
    assert!(store.has_self());
}

#[test]
fn test_self_survives_reopen() {
    let (dir, store) = store_with_self("alice");
    let me = store.get_self().unwrap();
    drop(store);

    let reopened = DataStore::open(dir.path()).unwrap();
    assert_eq!(reopened.get_self().unwrap(), me);
}

#[test]
fn test_update_self_clears_own_status() {
    let (_dir, store) = store_with_self("alice");
    store.add_self_status_message(Message::new("hi")).unwrap();
    assert_eq!(store.get_self_status().unwrap().messages().len(), 1);

    store
        .update_self(SelfRecord::generate("alice2").unwrap())
        .unwrap();
    assert!(store.get_self_status().unwrap().messages().is_empty());
}

#[test]
fn test_self_status_is_bounded_and_newest_first() {
    let (_dir, store) = store_with_self("alice");
    let base = Utc::now();
    for i in 0..(MAX_MESSAGE_COUNT as i64 + 15) {
        store
            .add_self_status_message(Message::at(base + Duration::seconds(i), format!("{}", i)))
            .unwrap();
    }

    let status = store.get_self_status().unwrap();
    assert_eq!(status.messages().len(), MAX_MESSAGE_COUNT);
    let newest = MAX_MESSAGE_COUNT as i64 + 14;
    assert_eq!(status.messages()[0].content, newest.to_string());
    assert!(status
        .messages()
        .windows(2)
        .all(|pair| pair[0].timestamp >= pair[1].timestamp));
}

#[test]
fn test_self_location_update_keeps_messages() {
    let (_dir, store) = store_with_self("alice");
    store.add_self_status_message(Message::new("hello")).unwrap();
    store
        .update_self_status_location(test_location(Utc::now()))
        .unwrap();

    let status = store.get_self_status().unwrap();
    assert_eq!(status.messages().len(), 1);
    assert!(status.location().is_some());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_self_status_never_exceeds_bound(
        contents in proptest::collection::vec(message_content_strategy(), 0..80),
    ) {
        let (_dir, store) = store_with_self("alice");
        for content in &contents {
            store.add_self_status_message(Message::new(content.clone())).unwrap();
            prop_assert!(store.get_self_status().unwrap().messages().len() <= MAX_MESSAGE_COUNT);
        }
        let status = store.get_self_status().unwrap();
        prop_assert_eq!(status.messages().len(), contents.len().min(MAX_MESSAGE_COUNT));
        if let Some(last) = contents.last() {
            prop_assert_eq!(&status.messages()[0].content, last);
        }
    }
}

// ============================================================
// Friends
// ============================================================

#[test]
fn test_add_and_lookup_friend() {
    let (_dir, store) = store_with_self("alice");
    let (peer, friend) = add_test_friend(&store, "bob");

    assert_eq!(store.get_friend_by_id(friend.id()).unwrap(), friend);
    assert_eq!(store.get_friend_by_nickname("bob").unwrap(), friend);
    assert_eq!(
        store
            .get_friend_by_certificate(peer.public_identity().certificate())
            .unwrap(),
        friend
    );
    assert_eq!(store.list_friends().unwrap(), vec![friend]);
}

#[test]
fn test_add_duplicate_id_fails_and_keeps_list() {
    let (_dir, store) = store_with_self("alice");
    let (peer, _) = add_test_friend(&store, "bob");
    let before = store.list_friends().unwrap();

    let again = Friend::new(peer.public_identity().clone(), Utc::now());
    let err = store.add_friend(again).unwrap_err();
    assert!(err.is_already_exists());
    assert_eq!(store.list_friends().unwrap(), before);
}

#[test]
fn test_add_duplicate_nickname_fails_and_keeps_list() {
    let (_dir, store) = store_with_self("alice");
    add_test_friend(&store, "bob");
    let before = store.list_friends().unwrap();

    let other_bob = SelfRecord::generate("bob").unwrap();
    let err = store
        .add_friend(Friend::new(other_bob.public_identity().clone(), Utc::now()))
        .unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists(_)));
    assert_eq!(store.list_friends().unwrap(), before);
}

#[test]
fn test_update_unknown_friend_is_not_found() {
    let (_dir, store) = store_with_self("alice");
    let stranger = SelfRecord::generate("carol").unwrap();
    let err = store
        .update_friend(Friend::new(stranger.public_identity().clone(), Utc::now()))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_insert_or_update_friend() {
    let (_dir, store) = store_with_self("alice");
    let peer = SelfRecord::generate("bob").unwrap();
    let friend = Friend::new(peer.public_identity().clone(), Utc::now());

    store.insert_or_update_friend(friend.clone()).unwrap();
    store.insert_or_update_friend(friend.clone()).unwrap();
    assert_eq!(store.list_friends().unwrap().len(), 1);
}

#[test]
fn test_remove_friend_deletes_status() {
    let (dir, store) = store_with_self("alice");
    let (_, friend) = add_test_friend(&store, "bob");
    assert!(store
        .update_friend_status(friend.id(), status_at(&[Utc::now()]))
        .unwrap());
    let status_path = dir.path().join(friend_status_filename(friend.id()));
    assert!(status_path.exists());

    store.remove_friend(friend.id()).unwrap();

    assert!(store.get_friend_by_id(friend.id()).unwrap_err().is_not_found());
    assert!(store.get_friend_status(friend.id()).unwrap_err().is_not_found());
    assert!(!status_path.exists());
}

#[test]
fn test_remove_unknown_friend_is_not_found() {
    let (_dir, store) = store_with_self("alice");
    assert!(store.remove_friend("missing").unwrap_err().is_not_found());
}

#[test]
fn test_friend_timestamps() {
    let (_dir, store) = store_with_self("alice");
    let (_, friend) = add_test_friend(&store, "bob");
    assert!(store
        .friend_last_sent_status_at(friend.id())
        .unwrap()
        .is_none());

    let before = Utc::now();
    store.update_friend_last_sent_status_at(friend.id()).unwrap();
    store
        .update_friend_last_received_status_at(friend.id())
        .unwrap();

    assert!(store.friend_last_sent_status_at(friend.id()).unwrap().unwrap() >= before);
    assert!(
        store
            .friend_last_received_status_at(friend.id())
            .unwrap()
            .unwrap()
            >= before
    );
}

#[test]
fn test_unreadable_friend_list_is_application_error() {
    let (dir, store) = store_with_self("alice");
    let (_, friend) = add_test_friend(&store, "bob");
    drop(store);

    fs::write(dir.path().join("friends.json"), b"{ not json").unwrap();
    let reopened = DataStore::open(dir.path()).unwrap();

    let kinds = [
        reopened.list_friends().map(|_| ()).unwrap_err().kind(),
        reopened.get_friend_by_id(friend.id()).map(|_| ()).unwrap_err().kind(),
        reopened.get_friend_by_nickname("bob").map(|_| ()).unwrap_err().kind(),
        reopened
            .get_friend_by_certificate(friend.public_identity().certificate())
            .map(|_| ())
            .unwrap_err()
            .kind(),
        reopened.get_friend_status(friend.id()).map(|_| ()).unwrap_err().kind(),
        reopened
            .update_friend_status(friend.id(), Status::empty())
            .map(|_| ())
            .unwrap_err()
            .kind(),
    ];
    assert!(kinds.iter().all(|k| *k == ErrorKind::Application));
}

// ============================================================
// Friend Status
// ============================================================

#[test]
fn test_unset_friend_status_is_empty() {
    let (_dir, store) = store_with_self("alice");
    let (_, friend) = add_test_friend(&store, "bob");
    assert_eq!(store.get_friend_status(friend.id()).unwrap(), Status::empty());
}

#[test]
fn test_status_for_unknown_friend_is_not_found() {
    let (_dir, store) = store_with_self("alice");
    let err = store
        .update_friend_status("missing", Status::empty())
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_older_status_is_discarded() {
    let (_dir, store) = store_with_self("alice");
    let (_, friend) = add_test_friend(&store, "bob");
    let t0 = Utc::now();

    let u1 = status_at(&[t0, t0 + Duration::seconds(10)]);
    let u2 = status_at(&[t0, t0 + Duration::seconds(5)]);
    assert!(store.update_friend_status(friend.id(), u1.clone()).unwrap());
    assert!(!store.update_friend_status(friend.id(), u2).unwrap());

    assert_eq!(store.get_friend_status(friend.id()).unwrap(), u1);
}

#[test]
fn test_status_with_fewer_messages_is_discarded() {
    let (_dir, store) = store_with_self("alice");
    let (_, friend) = add_test_friend(&store, "bob");
    let t0 = Utc::now();

    let u1 = status_at(&[t0, t0 + Duration::seconds(10)]);
    let u2 = status_at(&[t0 + Duration::seconds(20)]);
    assert!(store.update_friend_status(friend.id(), u1.clone()).unwrap());
    assert!(!store.update_friend_status(friend.id(), u2).unwrap());

    assert_eq!(store.get_friend_status(friend.id()).unwrap(), u1);
}

#[test]
fn test_newer_status_replaces() {
    let (_dir, store) = store_with_self("alice");
    let (_, friend) = add_test_friend(&store, "bob");
    let t0 = Utc::now();

    let u1 = status_at(&[t0]);
    let u2 = status_at(&[t0, t0 + Duration::seconds(1)]);
    assert!(store.update_friend_status(friend.id(), u1).unwrap());
    assert!(store.update_friend_status(friend.id(), u2.clone()).unwrap());

    assert_eq!(store.get_friend_status(friend.id()).unwrap(), u2);
}

#[test]
fn test_incoming_status_is_trimmed() {
    let (_dir, store) = store_with_self("alice");
    let (_, friend) = add_test_friend(&store, "bob");
    let t0 = Utc::now();
    let stamps: Vec<_> = (0..(MAX_MESSAGE_COUNT as i64 * 2))
        .map(|i| t0 + Duration::seconds(i))
        .collect();

    assert!(store
        .update_friend_status(friend.id(), status_at(&stamps))
        .unwrap());
    let stored = store.get_friend_status(friend.id()).unwrap();
    assert_eq!(stored.messages().len(), MAX_MESSAGE_COUNT);
    assert_eq!(
        stored.newest_message().unwrap().timestamp,
        *stamps.last().unwrap()
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_stale_second_write_is_noop(
        newest1 in 1i64..10_000,
        older_by in 1i64..10_000,
        extra in 0usize..5,
    ) {
        let (_dir, store) = store_with_self("alice");
        let (_, friend) = add_test_friend(&store, "bob");
        let t0 = Utc::now();

        let mut stamps1: Vec<_> = (0..=extra as i64).map(|i| t0 - Duration::seconds(i + 1)).collect();
        stamps1.push(t0 + Duration::seconds(newest1));
        let u1 = status_at(&stamps1);
        let u2 = status_at(&[t0 + Duration::seconds(newest1 - older_by)]);

        prop_assert!(store.update_friend_status(friend.id(), u1.clone()).unwrap());
        prop_assert!(!store.update_friend_status(friend.id(), u2).unwrap());
        prop_assert_eq!(store.get_friend_status(friend.id()).unwrap(), u1);
    }
}

// ============================================================
// Crash Recovery
// ============================================================

#[test]
fn test_complete_commit_file_recovers_new_value() {
    let (dir, store) = store_with_self("alice");
    let (_, friend) = add_test_friend(&store, "bob");
    drop(store);

    // Simulate a crash after staging an empty friend list but before publish
    let commit = dir.path().join(format!("friends.json{}", COMMIT_SUFFIX));
    fs::write(&commit, "[]").unwrap();

    let reopened = DataStore::open(dir.path()).unwrap();
    assert!(reopened.list_friends().unwrap().is_empty());
    assert!(reopened.get_friend_by_id(friend.id()).is_err());
    assert!(!commit.exists());
}

#[test]
fn test_partial_commit_file_recovers_old_value() {
    let (dir, store) = store_with_self("alice");
    let (_, friend) = add_test_friend(&store, "bob");
    drop(store);

    // Simulate a crash halfway through staging
    let commit = dir.path().join(format!("friends.json{}", COMMIT_SUFFIX));
    fs::write(&commit, "[{\"id\": \"trunc").unwrap();

    let reopened = DataStore::open(dir.path()).unwrap();
    assert_eq!(reopened.list_friends().unwrap(), vec![friend]);
    assert!(!commit.exists());
}

#[test]
fn test_commit_without_target_recovers_new_value() {
    let (dir, store) = store_with_self("alice");
    let me = store.get_self().unwrap();
    drop(store);

    // Crash between deleting the old file and renaming the staged one
    let target = dir.path().join("self.json");
    let commit = dir.path().join(format!("self.json{}", COMMIT_SUFFIX));
    fs::rename(&target, &commit).unwrap();

    let reopened = DataStore::open(dir.path()).unwrap();
    assert_eq!(reopened.get_self().unwrap(), me);
    assert!(target.exists());
}

// ============================================================
// Notifications
// ============================================================

fn record_events(store: &DataStore) -> Arc<Mutex<Vec<StoreEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    store.subscribe(Arc::new(CallbackObserver::new(move |event| {
        sink.lock().push(event);
    })));
    events
}

#[test]
fn test_mutations_notify_observers() {
    let (_dir, store) = store_with_self("alice");
    let events = record_events(&store);

    let (_, friend) = add_test_friend(&store, "bob");
    store.add_self_status_message(Message::new("hi")).unwrap();
    store.remove_friend(friend.id()).unwrap();

    let events = events.lock();
    assert_eq!(
        *events,
        vec![
            StoreEvent::FriendAdded {
                friend_id: friend.id().to_string()
            },
            StoreEvent::SelfStatusUpdated,
            StoreEvent::FriendRemoved {
                friend_id: friend.id().to_string()
            },
        ]
    );
}

#[test]
fn test_status_event_carries_previous_value() {
    let (_dir, store) = store_with_self("alice");
    let (_, friend) = add_test_friend(&store, "bob");
    let events = record_events(&store);
    let t0 = Utc::now();

    let u1 = status_at(&[t0]);
    let u2 = status_at(&[t0, t0 + Duration::seconds(1)]);
    store.update_friend_status(friend.id(), u1.clone()).unwrap();
    store.update_friend_status(friend.id(), u2.clone()).unwrap();
    // Stale: no event
    store.update_friend_status(friend.id(), u1.clone()).unwrap();

    let events = events.lock();
    assert_eq!(events.len(), 2);
    match &events[1] {
        StoreEvent::FriendStatusUpdated {
            friend: f,
            status,
            previous,
        } => {
            assert_eq!(f.id(), friend.id());
            assert_eq!(status, &u2);
            assert_eq!(previous.as_ref(), Some(&u1));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_failed_mutation_does_not_notify() {
    let (_dir, store) = store_with_self("alice");
    add_test_friend(&store, "bob");
    let events = record_events(&store);

    let other_bob = SelfRecord::generate("bob").unwrap();
    assert!(store
        .add_friend(Friend::new(other_bob.public_identity().clone(), Utc::now()))
        .is_err());
    assert!(events.lock().is_empty());
}

#[test]
fn test_observer_can_read_store() {
    let (_dir, store) = store_with_self("alice");
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    let reader = Arc::clone(&store);
    store.subscribe(Arc::new(CallbackObserver::new(move |event| {
        if let StoreEvent::FriendAdded { friend_id } = event {
            // Delivered after the lock is released
            *sink.lock() = reader.get_friend_by_id(&friend_id).ok();
        }
    })));

    let (_, friend) = add_test_friend(&store, "bob");
    assert_eq!(seen.lock().as_ref(), Some(&friend));
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let (_dir, store) = store_with_self("alice");
    let events = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&events);
    let id = store.subscribe(Arc::new(CallbackObserver::new(move |_| {
        *sink.lock() += 1;
    })));

    store.add_self_status_message(Message::new("one")).unwrap();
    assert!(store.unsubscribe(id));
    store.add_self_status_message(Message::new("two")).unwrap();
    assert_eq!(*events.lock(), 1);
}

// ============================================================
// Reset and Concurrency
// ============================================================

#[test]
fn test_reset_removes_everything() {
    let (dir, store) = store_with_self("alice");
    let (_, friend) = add_test_friend(&store, "bob");
    store
        .update_friend_status(friend.id(), status_at(&[Utc::now()]))
        .unwrap();

    store.reset().unwrap();

    assert!(store.get_self().unwrap_err().is_not_found());
    assert!(store.list_friends().unwrap().is_empty());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_concurrent_status_updates_for_different_friends() {
    let (_dir, store) = store_with_self("alice");
    let friends: Vec<_> = (0..8)
        .map(|i| add_test_friend(&store, &format!("friend{}", i)).1)
        .collect();
    let t0 = Utc::now();

    let handles: Vec<_> = friends
        .iter()
        .map(|friend| {
            let store = Arc::clone(&store);
            let id = friend.id().to_string();
            std::thread::spawn(move || {
                for i in 0..10 {
                    let stamps: Vec<_> = (0..=i).map(|s| t0 + Duration::seconds(s)).collect();
                    assert!(store.update_friend_status(&id, status_at(&stamps)).unwrap());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for friend in &friends {
        assert_eq!(
            store.get_friend_status(friend.id()).unwrap().messages().len(),
            10
        );
    }
}
