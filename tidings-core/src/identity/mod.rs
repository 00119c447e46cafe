// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Identity Module
//!
//! Self-certifying identities exchanged between peers.
//!
//! A public identity binds a nickname, a transport certificate (used for
//! mutual authentication), and an anonymizing-transport routing address plus
//! auth cookie. The four values are signed with the transport private key, so
//! anyone holding the identity can check it against the embedded certificate.
//! The fingerprint covers everything except the auth cookie, which may rotate.

mod keys;

pub use keys::{RoutingKeyMaterial, TransportKeyMaterial};

use ring::digest;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{PublicKey, Signature, SigningError, SigningKeyPair};

/// Length of a raw fingerprint in bytes.
pub const FINGERPRINT_LEN: usize = 32;

/// Identity-related errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Nickname cannot be empty")]
    EmptyNickname,

    #[error("Routing address cannot be empty")]
    EmptyRoutingAddress,

    #[error("Routing auth cookie cannot be empty")]
    EmptyAuthCookie,

    #[error("Transport private key does not match certificate")]
    KeyMismatch,

    #[error("Invalid identity signature")]
    InvalidSignature,

    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),
}

/// Public identity shared with peers. Immutable once signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIdentity {
    nickname: String,
    certificate: String,
    routing_address: String,
    routing_auth_cookie: String,
    signature: String,
}

impl PublicIdentity {
    /// Assembles an identity from its parts without checking the signature.
    ///
    /// Use [`verify_public_identity`] before trusting the result.
    pub fn from_parts(
        nickname: impl Into<String>,
        certificate: impl Into<String>,
        routing_address: impl Into<String>,
        routing_auth_cookie: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        PublicIdentity {
            nickname: nickname.into(),
            certificate: certificate.into(),
            routing_address: routing_address.into(),
            routing_auth_cookie: routing_auth_cookie.into(),
            signature: signature.into(),
        }
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn certificate(&self) -> &str {
        &self.certificate
    }

    pub fn routing_address(&self) -> &str {
        &self.routing_address
    }

    pub fn routing_auth_cookie(&self) -> &str {
        &self.routing_auth_cookie
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Returns the raw fingerprint.
    pub fn fingerprint(&self) -> [u8; FINGERPRINT_LEN] {
        fingerprint(self)
    }

    /// Returns the formatted fingerprint, used as the friend id.
    pub fn id(&self) -> String {
        format_fingerprint(&self.fingerprint())
    }
}

/// Private key material paired with a [`PublicIdentity`]. Never leaves the device.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct PrivateIdentity {
    transport_private_key: String,
    routing_private_key: String,
}

impl std::fmt::Debug for PrivateIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateIdentity([REDACTED])")
    }
}

impl PrivateIdentity {
    /// Base64 PKCS#8 transport private key.
    pub fn transport_private_key(&self) -> &str {
        &self.transport_private_key
    }

    /// Routing (anonymizing transport service) private key.
    pub fn routing_private_key(&self) -> &str {
        &self.routing_private_key
    }
}

/// Bytes covered by the identity signature: the UTF-8 concatenation of
/// nickname, certificate, routing address and auth cookie.
fn signing_payload(
    nickname: &str,
    certificate: &str,
    routing_address: &str,
    routing_auth_cookie: &str,
) -> Vec<u8> {
    let mut payload = Vec::with_capacity(
        nickname.len() + certificate.len() + routing_address.len() + routing_auth_cookie.len(),
    );
    payload.extend_from_slice(nickname.as_bytes());
    payload.extend_from_slice(certificate.as_bytes());
    payload.extend_from_slice(routing_address.as_bytes());
    payload.extend_from_slice(routing_auth_cookie.as_bytes());
    payload
}

/// Builds and signs a public identity.
pub fn make_signed_public_identity(
    nickname: &str,
    transport: &TransportKeyMaterial,
    routing: &RoutingKeyMaterial,
) -> Result<PublicIdentity, IdentityError> {
    if nickname.is_empty() {
        return Err(IdentityError::EmptyNickname);
    }
    if routing.address().is_empty() {
        return Err(IdentityError::EmptyRoutingAddress);
    }
    if routing.auth_cookie().is_empty() {
        return Err(IdentityError::EmptyAuthCookie);
    }

    let keypair = SigningKeyPair::from_encoded(transport.private_key())?;
    if keypair.certificate() != transport.certificate() {
        return Err(IdentityError::KeyMismatch);
    }

    let payload = signing_payload(
        nickname,
        transport.certificate(),
        routing.address(),
        routing.auth_cookie(),
    );
    let signature = keypair.sign(&payload);

    Ok(PublicIdentity {
        nickname: nickname.to_string(),
        certificate: transport.certificate().to_string(),
        routing_address: routing.address().to_string(),
        routing_auth_cookie: routing.auth_cookie().to_string(),
        signature: signature.to_base64(),
    })
}

/// Pairs the private halves of the transport and routing key material.
pub fn make_private_identity(
    transport: &TransportKeyMaterial,
    routing: &RoutingKeyMaterial,
) -> PrivateIdentity {
    PrivateIdentity {
        transport_private_key: transport.private_key().to_string(),
        routing_private_key: routing.private_key().to_string(),
    }
}

/// Validates a public identity received from a peer.
///
/// Checks that every field is present, that the certificate is well formed,
/// and that the signature verifies against the embedded certificate.
pub fn verify_public_identity(identity: &PublicIdentity) -> Result<(), IdentityError> {
    if identity.nickname.is_empty() {
        return Err(IdentityError::EmptyNickname);
    }
    if identity.routing_address.is_empty() {
        return Err(IdentityError::EmptyRoutingAddress);
    }
    if identity.routing_auth_cookie.is_empty() {
        return Err(IdentityError::EmptyAuthCookie);
    }

    let public_key = PublicKey::from_certificate(&identity.certificate)?;
    let signature = Signature::from_base64(&identity.signature)?;
    let payload = signing_payload(
        &identity.nickname,
        &identity.certificate,
        &identity.routing_address,
        &identity.routing_auth_cookie,
    );

    public_key
        .verify(&payload, &signature)
        .map_err(|_| IdentityError::InvalidSignature)
}

/// Computes the stable fingerprint of an identity.
///
/// Covers nickname, certificate and routing address; the auth cookie is
/// excluded. Each field is length-prefixed so field boundaries are unambiguous.
pub fn fingerprint(identity: &PublicIdentity) -> [u8; FINGERPRINT_LEN] {
    let mut ctx = digest::Context::new(&digest::SHA256);
    for field in [
        &identity.nickname,
        &identity.certificate,
        &identity.routing_address,
    ] {
        ctx.update(&(field.len() as u64).to_be_bytes());
        ctx.update(field.as_bytes());
    }

    let mut out = [0u8; FINGERPRINT_LEN];
    out.copy_from_slice(ctx.finish().as_ref());
    out
}

/// Formats a fingerprint as lowercase hex.
pub fn format_fingerprint(fingerprint: &[u8; FINGERPRINT_LEN]) -> String {
    hex::encode(fingerprint)
}
