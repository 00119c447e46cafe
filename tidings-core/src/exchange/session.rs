// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Handshake Session State Machine
//!
//! Tracks one mutual pairing over a proximity transport. Both sides push
//! their own payload and receive the peer's; the friend is added only once
//! both directions succeeded and the user confirmed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, warn};

use super::payload::{outgoing_payload, parse_payload, reject_self};
use super::ExchangeError;
use crate::storage::{DataStore, Friend, StorageError};

/// Maximum lifetime of a session.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(120);

/// State of a handshake session.
#[derive(Debug)]
pub enum HandshakeState {
    /// Created, not yet pairing
    Idle,
    /// Waiting for both directions of the exchange
    Pairing {
        /// Own payload was delivered to the peer
        pushed: bool,
        /// Validated peer payload
        received: Option<Friend>,
    },
    /// Peer was added as a friend
    Complete { friend: Friend },
    /// Session ended without adding a friend
    Failed { error: ExchangeError },
}

/// Events that drive the handshake.
#[derive(Debug)]
pub enum HandshakeEvent {
    /// Start pairing.
    Begin,
    /// The proximity transport delivered our payload.
    PushCompleted,
    /// The proximity transport delivered the peer's payload.
    PayloadReceived(String),
    /// The user accepted the received peer.
    Confirm,
    /// The user or the surrounding context abandoned the session.
    Cancel,
}

/// A pairing session bound to a data store.
pub struct HandshakeSession {
    store: Arc<DataStore>,
    state: HandshakeState,
    started_at: Instant,
    timeout: Duration,
}

impl HandshakeSession {
    /// Creates a session using [`SESSION_TIMEOUT`].
    pub fn new(store: Arc<DataStore>) -> Self {
        Self::with_timeout(store, SESSION_TIMEOUT)
    }

    pub fn with_timeout(store: Arc<DataStore>, timeout: Duration) -> Self {
        HandshakeSession {
            store,
            state: HandshakeState::Idle,
            started_at: Instant::now(),
            timeout,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    /// Returns the payload to push to the peer.
    pub fn outgoing_payload(&self) -> Result<String, ExchangeError> {
        let me = self.store.get_self()?;
        outgoing_payload(&me)
    }

    /// Returns the validated peer, if one has been received.
    pub fn received_friend(&self) -> Option<&Friend> {
        match &self.state {
            HandshakeState::Pairing { received, .. } => received.as_ref(),
            HandshakeState::Complete { friend } => Some(friend),
            _ => None,
        }
    }

    /// True when the user may be asked to confirm.
    pub fn can_confirm(&self) -> bool {
        matches!(
            &self.state,
            HandshakeState::Pairing {
                pushed: true,
                received: Some(_)
            }
        )
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, HandshakeState::Complete { .. })
    }

    pub fn is_timed_out(&self) -> bool {
        self.started_at.elapsed() > self.timeout
    }

    /// Processes an event and transitions the state machine.
    pub fn apply(&mut self, event: HandshakeEvent) -> Result<(), ExchangeError> {
        if self.is_terminal() {
            return Err(ExchangeError::InvalidState(
                "session already finished".into(),
            ));
        }
        if self.is_timed_out() {
            warn!("Exchange session timed out");
            self.state = HandshakeState::Failed {
                error: ExchangeError::SessionTimeout,
            };
            return Err(ExchangeError::SessionTimeout);
        }

        match event {
            HandshakeEvent::Begin => self.handle_begin(),
            HandshakeEvent::PushCompleted => self.handle_push_completed(),
            HandshakeEvent::PayloadReceived(json) => self.handle_payload(&json),
            HandshakeEvent::Confirm => self.handle_confirm(),
            HandshakeEvent::Cancel => {
                self.state = HandshakeState::Failed {
                    error: ExchangeError::Cancelled,
                };
                Ok(())
            }
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            HandshakeState::Complete { .. } | HandshakeState::Failed { .. }
        )
    }

    fn handle_begin(&mut self) -> Result<(), ExchangeError> {
        match self.state {
            HandshakeState::Idle => {
                self.state = HandshakeState::Pairing {
                    pushed: false,
                    received: None,
                };
                Ok(())
            }
            _ => Err(ExchangeError::InvalidState("already pairing".into())),
        }
    }

    fn handle_push_completed(&mut self) -> Result<(), ExchangeError> {
        match &mut self.state {
            HandshakeState::Pairing { pushed, .. } => {
                *pushed = true;
                Ok(())
            }
            _ => Err(ExchangeError::InvalidState("not pairing".into())),
        }
    }

    fn handle_payload(&mut self, json: &str) -> Result<(), ExchangeError> {
        if !matches!(self.state, HandshakeState::Pairing { .. }) {
            return Err(ExchangeError::InvalidState("not pairing".into()));
        }

        let friend = match parse_payload(json) {
            Ok(friend) => friend,
            Err(e) => {
                warn!("Rejected exchange payload: {}", e);
                return Err(e);
            }
        };
        reject_self(&self.store, &friend)?;

        if let HandshakeState::Pairing { received, .. } = &mut self.state {
            *received = Some(friend);
        }
        Ok(())
    }

    fn handle_confirm(&mut self) -> Result<(), ExchangeError> {
        let peer = match &self.state {
            HandshakeState::Pairing {
                pushed: true,
                received: Some(peer),
            } => peer.public_identity().clone(),
            HandshakeState::Pairing { .. } => {
                return Err(ExchangeError::InvalidState(
                    "exchange incomplete in at least one direction".into(),
                ))
            }
            _ => return Err(ExchangeError::InvalidState("not pairing".into())),
        };

        let mut friend = Friend::new(peer, Utc::now());
        match self.store.add_friend(friend.clone()) {
            Ok(()) => {}
            Err(StorageError::AlreadyExists(_)) => {
                // Re-pairing with a known friend refreshes its identity only
                let existing = match self.store.get_friend_by_id(friend.id()) {
                    Ok(existing) => existing,
                    Err(StorageError::NotFound(_)) => {
                        return Err(ExchangeError::DuplicateFriend)
                    }
                    Err(e) => return Err(e.into()),
                };
                friend = existing.with_public_identity(friend.public_identity().clone());
                self.store.update_friend(friend.clone()).map_err(|e| match e {
                    StorageError::AlreadyExists(_) => ExchangeError::DuplicateFriend,
                    other => other.into(),
                })?;
            }
            Err(e) => return Err(e.into()),
        }

        info!("Paired with friend: {}", friend.nickname());
        self.state = HandshakeState::Complete { friend };
        Ok(())
    }
}
