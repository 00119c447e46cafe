// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Ed25519 Signing
//!
//! Transport keypairs, certificates and detached signatures.
//! The transport certificate is the textual form of the Ed25519 public key
//! (`ed25519:` followed by the base64 key bytes); it is what peers pin when
//! authenticating each other.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ring::digest;
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519};
use thiserror::Error;
use zeroize::Zeroizing;

/// Prefix identifying the certificate encoding.
pub const CERTIFICATE_PREFIX: &str = "ed25519:";

const PUBLIC_KEY_LEN: usize = 32;
const SIGNATURE_LEN: usize = 64;

/// Signing and certificate errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("Malformed certificate: {0}")]
    MalformedCertificate(String),

    #[error("Malformed private key")]
    MalformedPrivateKey,

    #[error("Malformed signature")]
    MalformedSignature,

    #[error("Signature verification failed")]
    VerificationFailed,

    #[error("Key generation failed")]
    KeyGeneration,
}

/// Ed25519 public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    /// Creates a public key from raw bytes.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        PublicKey(bytes)
    }

    /// Parses a transport certificate.
    ///
    /// A well-formed certificate carries the expected prefix and decodes to
    /// exactly 32 key bytes.
    pub fn from_certificate(certificate: &str) -> Result<Self, SigningError> {
        let encoded = certificate
            .strip_prefix(CERTIFICATE_PREFIX)
            .ok_or_else(|| SigningError::MalformedCertificate("missing key type prefix".into()))?;

        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| SigningError::MalformedCertificate(e.to_string()))?;

        let key: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            SigningError::MalformedCertificate(format!("expected 32 key bytes, got {}", b.len()))
        })?;

        Ok(PublicKey(key))
    }

    /// Returns the textual certificate for this key.
    pub fn to_certificate(&self) -> String {
        format!("{}{}", CERTIFICATE_PREFIX, BASE64.encode(self.0))
    }

    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Verifies a detached signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), SigningError> {
        UnparsedPublicKey::new(&ED25519, &self.0)
            .verify(message, &signature.0)
            .map_err(|_| SigningError::VerificationFailed)
    }

    /// Returns the hex SHA-256 fingerprint of the key bytes.
    pub fn fingerprint(&self) -> String {
        hex::encode(digest::digest(&digest::SHA256, &self.0))
    }
}

/// Detached Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LEN]);

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({}..)", hex::encode(&self.0[..8]))
    }
}

impl Signature {
    /// Parses a base64-encoded signature.
    pub fn from_base64(encoded: &str) -> Result<Self, SigningError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|_| SigningError::MalformedSignature)?;
        let sig: [u8; SIGNATURE_LEN] = bytes
            .try_into()
            .map_err(|_| SigningError::MalformedSignature)?;
        Ok(Signature(sig))
    }

    /// Encodes the signature as base64.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Returns the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }
}

/// Ed25519 keypair held as a PKCS#8 document.
pub struct SigningKeyPair {
    pkcs8: Zeroizing<Vec<u8>>,
    keypair: Ed25519KeyPair,
}

impl std::fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl SigningKeyPair {
    /// Generates a fresh keypair from the system RNG.
    pub fn generate() -> Result<Self, SigningError> {
        let rng = SystemRandom::new();
        let document =
            Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| SigningError::KeyGeneration)?;
        Self::from_pkcs8(document.as_ref())
    }

    /// Loads a keypair from PKCS#8 bytes.
    pub fn from_pkcs8(bytes: &[u8]) -> Result<Self, SigningError> {
        let keypair =
            Ed25519KeyPair::from_pkcs8(bytes).map_err(|_| SigningError::MalformedPrivateKey)?;
        Ok(SigningKeyPair {
            pkcs8: Zeroizing::new(bytes.to_vec()),
            keypair,
        })
    }

    /// Loads a keypair from its base64-encoded PKCS#8 form.
    pub fn from_encoded(encoded: &str) -> Result<Self, SigningError> {
        let bytes = Zeroizing::new(
            BASE64
                .decode(encoded)
                .map_err(|_| SigningError::MalformedPrivateKey)?,
        );
        Self::from_pkcs8(&bytes)
    }

    /// Returns the base64-encoded PKCS#8 private key.
    pub fn encoded_private_key(&self) -> String {
        BASE64.encode(self.pkcs8.as_slice())
    }

    /// Returns the public half of the keypair.
    pub fn public_key(&self) -> PublicKey {
        let mut bytes = [0u8; PUBLIC_KEY_LEN];
        bytes.copy_from_slice(self.keypair.public_key().as_ref());
        PublicKey(bytes)
    }

    /// Returns the transport certificate for this keypair.
    pub fn certificate(&self) -> String {
        self.public_key().to_certificate()
    }

    /// Signs a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        let mut bytes = [0u8; SIGNATURE_LEN];
        bytes.copy_from_slice(self.keypair.sign(message).as_ref());
        Signature(bytes)
    }
}
