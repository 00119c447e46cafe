// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Key material consumed when building identities.

use base64::engine::general_purpose::{STANDARD as BASE64, STANDARD_NO_PAD};
use base64::Engine as _;
use rand::RngCore;
use ring::digest;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::IdentityError;
use crate::crypto::SigningKeyPair;

/// Suffix of anonymizing-transport service addresses.
const ROUTING_ADDRESS_SUFFIX: &str = ".onion";

/// Transport certificate and its private key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct TransportKeyMaterial {
    certificate: String,
    private_key: String,
}

impl std::fmt::Debug for TransportKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportKeyMaterial")
            .field("certificate", &self.certificate)
            .finish_non_exhaustive()
    }
}

impl TransportKeyMaterial {
    /// Generates a fresh Ed25519 transport keypair.
    pub fn generate() -> Result<Self, IdentityError> {
        let keypair = SigningKeyPair::generate()?;
        Ok(TransportKeyMaterial {
            certificate: keypair.certificate(),
            private_key: keypair.encoded_private_key(),
        })
    }

    /// Wraps existing key material.
    pub fn from_parts(certificate: impl Into<String>, private_key: impl Into<String>) -> Self {
        TransportKeyMaterial {
            certificate: certificate.into(),
            private_key: private_key.into(),
        }
    }

    pub fn certificate(&self) -> &str {
        &self.certificate
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }
}

/// Anonymizing-transport routing address, auth cookie and service key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RoutingKeyMaterial {
    address: String,
    auth_cookie: String,
    private_key: String,
}

impl std::fmt::Debug for RoutingKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingKeyMaterial")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl RoutingKeyMaterial {
    /// Generates a service key, the address derived from it, and an auth cookie.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();

        let mut key = [0u8; 32];
        rng.fill_bytes(&mut key);
        let hash = digest::digest(&digest::SHA256, &key);
        let address = format!("{}{}", hex::encode(&hash.as_ref()[..10]), ROUTING_ADDRESS_SUFFIX);
        let private_key = BASE64.encode(key);
        key.zeroize();

        RoutingKeyMaterial {
            address,
            auth_cookie: generate_auth_cookie(),
            private_key,
        }
    }

    /// Wraps existing key material.
    pub fn from_parts(
        address: impl Into<String>,
        auth_cookie: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        RoutingKeyMaterial {
            address: address.into(),
            auth_cookie: auth_cookie.into(),
            private_key: private_key.into(),
        }
    }

    /// Returns a copy with a replaced auth cookie. Address and key are unchanged.
    pub fn with_auth_cookie(&self, auth_cookie: impl Into<String>) -> Self {
        RoutingKeyMaterial {
            address: self.address.clone(),
            auth_cookie: auth_cookie.into(),
            private_key: self.private_key.clone(),
        }
    }

    /// Returns a copy with a freshly generated auth cookie.
    pub fn rotate_auth_cookie(&self) -> Self {
        self.with_auth_cookie(generate_auth_cookie())
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn auth_cookie(&self) -> &str {
        &self.auth_cookie
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }
}

/// 16 random bytes, base64 without padding (22 characters).
fn generate_auth_cookie() -> String {
    let mut cookie = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut cookie);
    STANDARD_NO_PAD.encode(cookie)
}
