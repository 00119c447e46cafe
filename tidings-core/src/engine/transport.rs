// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! External Collaborators
//!
//! The anonymizing transport, the sharing endpoint and the location providers
//! live outside this crate. The engine drives them through these traits.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use super::EngineError;
use crate::location::LocationTracker;
use crate::storage::{DataStore, SelfRecord, StorageError};

/// Errors reported by external collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Peer unreachable: {0}")]
    Unreachable(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Sharing endpoint failed: {0}")]
    Endpoint(String),

    #[error("Location provider unavailable: {0}")]
    Location(String),
}

/// Own transport credentials presented when polling a friend.
#[derive(Clone, PartialEq, Eq)]
pub struct TransportCredentials {
    pub certificate: String,
    pub private_key: String,
}

impl TransportCredentials {
    pub fn from_self(me: &SelfRecord) -> Self {
        TransportCredentials {
            certificate: me.public_identity().certificate().to_string(),
            private_key: me.private_identity().transport_private_key().to_string(),
        }
    }
}

impl fmt::Debug for TransportCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportCredentials")
            .field("certificate", &self.certificate)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Client side of the anonymizing transport.
pub trait StatusTransport: Send + Sync {
    /// Fetches the status document served by a friend.
    ///
    /// The request is mutually authenticated: `credentials` identify us and
    /// the peer must present `peer_certificate`. Must give up after `timeout`.
    fn fetch_status(
        &self,
        credentials: &TransportCredentials,
        peer_certificate: &str,
        peer_routing_address: &str,
        timeout: Duration,
    ) -> Result<String, TransportError>;
}

/// Key material and access list for a sharing endpoint.
#[derive(Clone)]
pub struct EndpointMaterial {
    pub credentials: TransportCredentials,
    pub routing_address: String,
    pub routing_private_key: String,
    /// Certificates of peers allowed to fetch our status
    pub authorized_certificates: Vec<String>,
}

impl EndpointMaterial {
    /// Builds the material for the current identity and friend list.
    pub fn load(store: &DataStore) -> Result<Self, StorageError> {
        let me = store.get_self()?;
        Ok(EndpointMaterial {
            credentials: TransportCredentials::from_self(&me),
            routing_address: me.public_identity().routing_address().to_string(),
            routing_private_key: me.private_identity().routing_private_key().to_string(),
            authorized_certificates: authorized_certificates(store)?,
        })
    }
}

impl fmt::Debug for EndpointMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointMaterial")
            .field("credentials", &self.credentials)
            .field("routing_address", &self.routing_address)
            .field("authorized_certificates", &self.authorized_certificates.len())
            .finish()
    }
}

/// Certificates of all current friends.
pub fn authorized_certificates(store: &DataStore) -> Result<Vec<String>, StorageError> {
    Ok(store
        .list_friends()?
        .iter()
        .map(|f| f.public_identity().certificate().to_string())
        .collect())
}

/// Answers status requests on behalf of a sharing endpoint.
#[derive(Clone)]
pub struct StatusResponder {
    store: Arc<DataStore>,
}

impl StatusResponder {
    pub fn new(store: Arc<DataStore>) -> Self {
        StatusResponder { store }
    }

    /// Returns own status document for an authenticated peer.
    ///
    /// Fails with `UnauthorizedPeer` unless the certificate belongs to a
    /// friend; records the send time on success.
    pub fn respond(&self, peer_certificate: &str) -> Result<String, EngineError> {
        let friend = match self.store.get_friend_by_certificate(peer_certificate) {
            Ok(friend) => friend,
            Err(StorageError::NotFound(_)) => return Err(EngineError::UnauthorizedPeer),
            Err(e) => return Err(e.into()),
        };

        let status = self.store.get_self_status()?;
        let document = serde_json::to_string(&status)?;
        self.store.update_friend_last_sent_status_at(friend.id())?;

        debug!("Served status to {}", friend.nickname());
        Ok(document)
    }
}

/// A running sharing endpoint.
pub trait SharingEndpoint: Send {
    /// Replaces the set of peers allowed to fetch our status.
    fn set_authorized_certificates(&mut self, certificates: Vec<String>);

    /// Stops serving. Must not return before the listener is closed.
    fn stop(&mut self);
}

/// Launches sharing endpoints bound to specific key material.
pub trait SharingService: Send + Sync {
    fn launch(
        &self,
        material: EndpointMaterial,
        responder: StatusResponder,
    ) -> Result<Box<dyn SharingEndpoint>, TransportError>;
}

/// Platform location providers.
pub trait LocationSource: Send + Sync {
    /// Starts feeding fixes into `tracker`.
    fn start(&self, tracker: Arc<LocationTracker>) -> Result<(), TransportError>;

    /// Stops location updates. Safe to call when not started.
    fn stop(&self);
}
