// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Friend Exchange Module
//!
//! Pairing with a friend, either in person through a proximity transport
//! ([`HandshakeSession`]) or by sharing a public identity out of band.

mod error;
mod payload;
mod session;

pub use error::ExchangeError;
pub use payload::{export_public_identity, import_friend_identity, outgoing_payload, parse_payload};
pub use session::{HandshakeEvent, HandshakeSession, HandshakeState, SESSION_TIMEOUT};
