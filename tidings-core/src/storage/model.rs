// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Persisted records: self, friends and statuses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{
    make_private_identity, make_signed_public_identity, IdentityError, PrivateIdentity,
    PublicIdentity, RoutingKeyMaterial, TransportKeyMaterial,
};

/// Maximum number of messages kept in a status.
pub const MAX_MESSAGE_COUNT: usize = 50;

/// The local user's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfRecord {
    public_identity: PublicIdentity,
    private_identity: PrivateIdentity,
    created_at: DateTime<Utc>,
}

impl SelfRecord {
    /// Creates a self record timestamped now.
    pub fn new(public_identity: PublicIdentity, private_identity: PrivateIdentity) -> Self {
        SelfRecord {
            public_identity,
            private_identity,
            created_at: Utc::now(),
        }
    }

    /// Generates fresh transport and routing key material and signs a new identity.
    pub fn generate(nickname: &str) -> Result<Self, IdentityError> {
        let transport = TransportKeyMaterial::generate()?;
        let routing = RoutingKeyMaterial::generate();
        Self::from_key_material(nickname, &transport, &routing)
    }

    /// Builds a self record from existing key material.
    pub fn from_key_material(
        nickname: &str,
        transport: &TransportKeyMaterial,
        routing: &RoutingKeyMaterial,
    ) -> Result<Self, IdentityError> {
        let public_identity = make_signed_public_identity(nickname, transport, routing)?;
        let private_identity = make_private_identity(transport, routing);
        Ok(Self::new(public_identity, private_identity))
    }

    pub fn public_identity(&self) -> &PublicIdentity {
        &self.public_identity
    }

    pub fn private_identity(&self) -> &PrivateIdentity {
        &self.private_identity
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// A peer accepted into the roster.
///
/// The id is the formatted fingerprint of the public identity and never
/// changes once the friend is added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    id: String,
    public_identity: PublicIdentity,
    added_at: Option<DateTime<Utc>>,
    last_sent_status_at: Option<DateTime<Utc>>,
    last_received_status_at: Option<DateTime<Utc>>,
}

impl Friend {
    /// Creates a friend record added at `added_at`.
    pub fn new(public_identity: PublicIdentity, added_at: DateTime<Utc>) -> Self {
        Friend {
            id: public_identity.id(),
            public_identity,
            added_at: Some(added_at),
            last_sent_status_at: None,
            last_received_status_at: None,
        }
    }

    /// Friend-shaped record with all bookkeeping fields empty, as sent
    /// during pairing.
    pub fn unadded(public_identity: PublicIdentity) -> Self {
        Friend {
            id: public_identity.id(),
            public_identity,
            added_at: None,
            last_sent_status_at: None,
            last_received_status_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn public_identity(&self) -> &PublicIdentity {
        &self.public_identity
    }

    pub fn nickname(&self) -> &str {
        self.public_identity.nickname()
    }

    pub fn added_at(&self) -> Option<DateTime<Utc>> {
        self.added_at
    }

    pub fn last_sent_status_at(&self) -> Option<DateTime<Utc>> {
        self.last_sent_status_at
    }

    pub fn last_received_status_at(&self) -> Option<DateTime<Utc>> {
        self.last_received_status_at
    }

    /// True when the stored id matches the identity's fingerprint.
    pub fn has_consistent_id(&self) -> bool {
        self.id == self.public_identity.id()
    }

    /// Returns a copy carrying `public_identity`, keeping the bookkeeping fields.
    pub(crate) fn with_public_identity(mut self, public_identity: PublicIdentity) -> Self {
        self.id = public_identity.id();
        self.public_identity = public_identity;
        self
    }

    pub(crate) fn with_last_sent_status_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_sent_status_at = Some(at);
        self
    }

    pub(crate) fn with_last_received_status_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_received_status_at = Some(at);
        self
    }
}

/// A status message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

impl Message {
    /// Creates a message timestamped now.
    pub fn new(content: impl Into<String>) -> Self {
        Self::at(Utc::now(), content)
    }

    pub fn at(timestamp: DateTime<Utc>, content: impl Into<String>) -> Self {
        Message {
            timestamp,
            content: content.into(),
        }
    }
}

/// Last known location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Precision radius in meters.
    pub precision: i32,
    pub street_address: Option<String>,
}

/// Periodically synchronized payload: recent messages, newest first, and
/// an optional location.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    location: Option<Location>,
}

impl Status {
    /// Creates a status, keeping at most [`MAX_MESSAGE_COUNT`] messages.
    ///
    /// `messages` must already be newest first.
    pub fn new(messages: Vec<Message>, location: Option<Location>) -> Self {
        Status {
            messages,
            location,
        }
        .trimmed()
    }

    /// An empty status, used when none has been stored yet.
    pub fn empty() -> Self {
        Status::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// The newest message, if any.
    pub fn newest_message(&self) -> Option<&Message> {
        self.messages.first()
    }

    /// Returns a copy with `message` prepended and the tail trimmed.
    pub fn with_message(&self, message: Message) -> Self {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.push(message);
        messages.extend(self.messages.iter().cloned());
        Status::new(messages, self.location.clone())
    }

    /// Returns a copy with the location replaced.
    pub fn with_location(&self, location: Location) -> Self {
        Status {
            messages: self.messages.clone(),
            location: Some(location),
        }
    }

    pub(crate) fn trimmed(mut self) -> Self {
        self.messages.truncate(MAX_MESSAGE_COUNT);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_with_message_prepends() {
        let t0 = Utc::now();
        let status = Status::empty()
            .with_message(Message::at(t0, "first"))
            .with_message(Message::at(t0 + Duration::seconds(1), "second"));
        assert_eq!(status.messages()[0].content, "second");
        assert_eq!(status.newest_message().unwrap().content, "second");
    }

    #[test]
    fn test_with_message_trims_tail() {
        let t0 = Utc::now();
        let mut status = Status::empty();
        for i in 0..(MAX_MESSAGE_COUNT + 5) {
            status = status.with_message(Message::at(t0 + Duration::seconds(i as i64), i.to_string()));
        }
        assert_eq!(status.messages().len(), MAX_MESSAGE_COUNT);
        assert_eq!(
            status.newest_message().unwrap().content,
            (MAX_MESSAGE_COUNT + 4).to_string()
        );
    }

    #[test]
    fn test_friend_ids_derive_from_identity() {
        let me = SelfRecord::generate("alice").unwrap();
        let friend = Friend::new(me.public_identity().clone(), Utc::now());
        assert_eq!(friend.id(), me.public_identity().id());
        assert!(friend.has_consistent_id());
        assert_eq!(friend.nickname(), "alice");

        let payload = Friend::unadded(me.public_identity().clone());
        assert!(payload.added_at().is_none());
        assert!(payload.last_sent_status_at().is_none());
        assert!(payload.last_received_status_at().is_none());
    }

    #[test]
    fn test_status_json_shape() {
        let json = r#"{"messages":[],"location":null}"#;
        let status: Status = serde_json::from_str(json).unwrap();
        assert_eq!(status, Status::empty());

        // Missing fields default to empty
        let status: Status = serde_json::from_str("{}").unwrap();
        assert!(status.messages().is_empty());
        assert!(status.location().is_none());
    }

    #[test]
    fn test_self_record_json_roundtrip() {
        let me = SelfRecord::generate("alice").unwrap();
        let json = serde_json::to_string(&me).unwrap();
        assert!(json.contains("publicIdentity"));
        let back: SelfRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, me);
    }
}
