// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod signing;

pub use signing::{PublicKey, Signature, SigningError, SigningKeyPair, CERTIFICATE_PREFIX};
