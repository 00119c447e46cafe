// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tidings Core Library
//!
//! Peer-to-peer presence and location sharing between friends over an
//! anonymizing transport. All cryptographic operations use the audited
//! `ring` crate.

pub mod crypto;
pub mod engine;
pub mod exchange;
pub mod identity;
pub mod location;
pub mod storage;

pub use crypto::{PublicKey, Signature, SigningKeyPair};
pub use engine::{
    Engine, EngineConfig, EngineError, LocationSource, SharingEndpoint, SharingService,
    StatusTransport, TransportError,
};
pub use exchange::{ExchangeError, HandshakeEvent, HandshakeSession, HandshakeState};
pub use identity::{
    fingerprint, format_fingerprint, make_private_identity, make_signed_public_identity,
    verify_public_identity, IdentityError, PrivateIdentity, PublicIdentity, RoutingKeyMaterial,
    TransportKeyMaterial,
};
pub use location::{is_better_location, LocationFix, LocationTracker};
pub use storage::{
    DataStore, ErrorKind, Friend, Location, Message, SelfRecord, Status, StorageError,
    StoreEvent, StoreObserver, MAX_MESSAGE_COUNT,
};
