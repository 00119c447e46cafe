// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Exchange payloads.
//!
//! A proximity payload is a Friend-shaped JSON record carrying the sender's
//! public identity with all bookkeeping fields null. The out-of-band form
//! (e-mail, file) is the bare public identity.

use chrono::Utc;
use tracing::info;

use super::ExchangeError;
use crate::identity::{verify_public_identity, PublicIdentity};
use crate::storage::{DataStore, Friend, SelfRecord};

/// Builds the payload pushed to a peer during a proximity exchange.
pub fn outgoing_payload(me: &SelfRecord) -> Result<String, ExchangeError> {
    let friend = Friend::unadded(me.public_identity().clone());
    serde_json::to_string(&friend).map_err(|e| ExchangeError::InvalidPayload(e.to_string()))
}

/// Parses and validates a payload received from a peer.
///
/// The embedded identity must carry a valid signature and the friend id must
/// be the fingerprint of that identity. Any bookkeeping fields the peer sent
/// are dropped.
pub fn parse_payload(json: &str) -> Result<Friend, ExchangeError> {
    let friend: Friend =
        serde_json::from_str(json).map_err(|e| ExchangeError::InvalidPayload(e.to_string()))?;

    verify_public_identity(friend.public_identity())?;
    if !friend.has_consistent_id() {
        return Err(ExchangeError::InvalidPayload(
            "friend id does not match identity fingerprint".into(),
        ));
    }

    Ok(Friend::unadded(friend.public_identity().clone()))
}

/// Serializes own public identity for out-of-band sharing.
pub fn export_public_identity(store: &DataStore) -> Result<String, ExchangeError> {
    let me = store.get_self()?;
    serde_json::to_string(me.public_identity())
        .map_err(|e| ExchangeError::InvalidPayload(e.to_string()))
}

/// Validates an identity shared out of band and adds it as a friend.
pub fn import_friend_identity(store: &DataStore, json: &str) -> Result<Friend, ExchangeError> {
    let identity: PublicIdentity =
        serde_json::from_str(json).map_err(|e| ExchangeError::InvalidPayload(e.to_string()))?;
    verify_public_identity(&identity)?;

    let friend = Friend::new(identity, Utc::now());
    reject_self(store, &friend)?;
    store.add_friend(friend.clone())?;

    info!("Imported friend identity: {}", friend.nickname());
    Ok(friend)
}

/// Fails with `SelfExchange` if `friend` carries our own identity.
pub(crate) fn reject_self(store: &DataStore, friend: &Friend) -> Result<(), ExchangeError> {
    let me = store.get_self()?;
    if me.public_identity().id() == friend.id()
        || me.public_identity().certificate() == friend.public_identity().certificate()
    {
        return Err(ExchangeError::SelfExchange);
    }
    Ok(())
}
