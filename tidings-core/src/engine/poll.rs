// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Peer polling.
//!
//! Every friend has its own self-rescheduling poll chain. A chain ends only
//! when its friend is removed; failures are retried with exponential backoff.
//! A friend removed and added back keeps the chain it already had.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use super::scheduler::panic_message;
use super::transport::TransportCredentials;
use super::{EngineConfig, EngineError, Run};
use crate::storage::{Status, StorageError};

/// Starts polling a friend right away unless a chain for it is already live.
pub(super) fn start_poll_chain(run: &Arc<Run>, friend_id: String) {
    if !run.poll_chains.lock().insert(friend_id.clone()) {
        debug!("Friend {} already has a poll chain", friend_id);
        return;
    }
    schedule_poll(run, friend_id, Duration::ZERO, 0);
}

/// Schedules the next poll of a friend.
fn schedule_poll(run: &Arc<Run>, friend_id: String, delay: Duration, attempt: u32) {
    let task_run = Arc::clone(run);
    run.scheduler.schedule("friend poll", delay, move || {
        poll_and_reschedule(&task_run, friend_id, attempt);
        Ok(())
    });
}

fn poll_and_reschedule(run: &Arc<Run>, friend_id: String, attempt: u32) {
    let result = catch_unwind(AssertUnwindSafe(|| poll_friend(run, &friend_id)))
        .unwrap_or_else(|panic| Err(EngineError::Panicked(panic_message(panic.as_ref()))));

    match result {
        Ok(()) => schedule_poll(run, friend_id, run.config.friend_poll_period, 0),
        Err(EngineError::FriendGone(_)) => {
            let mut chains = run.poll_chains.lock();
            match run.store.get_friend_by_id(&friend_id) {
                Err(StorageError::NotFound(_)) => {
                    chains.remove(&friend_id);
                    debug!("Stopped polling removed friend {}", friend_id);
                }
                // Added back since the poll ran
                Ok(_) => schedule_poll(run, friend_id, Duration::ZERO, 0),
                Err(_) => {
                    let delay = retry_delay(&run.config, attempt);
                    schedule_poll(run, friend_id, delay, attempt.saturating_add(1));
                }
            }
        }
        Err(e) => {
            let delay = retry_delay(&run.config, attempt);
            warn!(
                "Poll of friend {} failed (attempt {}), retrying in {:?}: {}",
                friend_id,
                attempt + 1,
                delay,
                e
            );
            schedule_poll(run, friend_id, delay, attempt.saturating_add(1));
        }
    }
}

/// Fetches one friend's status and stores it.
pub(super) fn poll_friend(run: &Run, friend_id: &str) -> Result<(), EngineError> {
    let me = run.store.get_self()?;
    let friend = run
        .store
        .get_friend_by_id(friend_id)
        .map_err(|e| friend_gone(e, friend_id))?;

    let credentials = TransportCredentials::from_self(&me);
    let identity = friend.public_identity();
    let document = run.transport.fetch_status(
        &credentials,
        identity.certificate(),
        identity.routing_address(),
        run.config.request_timeout,
    )?;

    let status: Status = serde_json::from_str(&document)?;
    run.store
        .update_friend_status(friend_id, status)
        .map_err(|e| friend_gone(e, friend_id))?;
    run.store
        .update_friend_last_received_status_at(friend_id)
        .map_err(|e| friend_gone(e, friend_id))?;

    debug!("Polled friend {}", friend.nickname());
    Ok(())
}

fn friend_gone(error: StorageError, friend_id: &str) -> EngineError {
    match error {
        StorageError::NotFound(_) => EngineError::FriendGone(friend_id.to_string()),
        other => other.into(),
    }
}

/// Delay before retry number `attempt + 1`.
///
/// `min(base * 2^attempt, max)` plus up to `retry_jitter` of random delay.
pub(crate) fn retry_delay(config: &EngineConfig, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    let backoff = config
        .retry_base_delay
        .saturating_mul(factor)
        .min(config.retry_max_delay);
    backoff + jitter(config.retry_jitter)
}

fn jitter(max: Duration) -> Duration {
    let max_millis = max.as_millis() as u64;
    if max_millis == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_millis))
}
