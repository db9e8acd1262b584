//! Credential encryption using AES-256-GCM
//!
//! Instance secrets are encrypted at rest with a process-wide master key and a
//! per-record salt. The salt doubles as the AES-GCM nonce, so it is generated
//! once when the record is built and stored next to the ciphertext.
//!
//! ## Configuration
//!
//! The master key is supplied once at startup as a base64-encoded 32-byte
//! value (`BROKER_ENCRYPTION_KEY`). It is never persisted by the broker.

use crate::errors::{BrokerError, Result};
use base64::Engine;
use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, instrument};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the master key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of the per-record salt; AES-GCM takes a 96-bit nonce
pub const SALT_SIZE: usize = NONCE_LEN;

/// Size of AES-256-GCM tag in bytes
const TAG_SIZE: usize = 16;

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

#[derive(Zeroize, ZeroizeOnDrop)]
struct MasterKey([u8; KEY_SIZE]);

/// Per-record salt, fixed for the lifetime of the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Standard base64, as persisted on the record
    pub fn to_base64(&self) -> String {
        B64.encode(self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = B64
            .decode(encoded)
            .map_err(|e| BrokerError::decryption(format!("Salt is not valid base64: {}", e)))?;
        let array: [u8; SALT_SIZE] = bytes.as_slice().try_into().map_err(|_| {
            BrokerError::decryption(format!(
                "Invalid salt length: expected {} bytes, got {} bytes",
                SALT_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }
}

/// Single-use nonce sequence for AES-GCM
struct SingleNonce {
    nonce: Option<[u8; SALT_SIZE]>,
}

impl SingleNonce {
    fn new(salt: &Salt) -> Self {
        Self { nonce: Some(salt.0) }
    }
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.nonce.take().map(Nonce::assume_unique_for_key).ok_or(ring::error::Unspecified)
    }
}

/// Symmetric cipher for instance credentials
#[derive(Clone)]
pub struct CredentialCipher {
    key: Arc<MasterKey>,
    rng: SystemRandom,
}

impl CredentialCipher {
    /// Build a cipher from raw key bytes; the key must be exactly 32 bytes
    pub fn new(key_bytes: &[u8]) -> Result<Self> {
        let key: [u8; KEY_SIZE] = key_bytes.try_into().map_err(|_| {
            BrokerError::config(format!(
                "Encryption key must be {} bytes (256 bits), got {} bytes",
                KEY_SIZE,
                key_bytes.len()
            ))
        })?;

        debug!("Credential cipher initialized");

        Ok(Self { key: Arc::new(MasterKey(key)), rng: SystemRandom::new() })
    }

    /// Build a cipher from a base64-encoded key
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let mut bytes = B64.decode(encoded.trim()).map_err(|e| {
            BrokerError::config(format!("Invalid base64 in encryption key: {}", e))
        })?;
        let cipher = Self::new(&bytes);
        bytes.zeroize();
        cipher
    }

    /// Generate a fresh random salt
    pub fn generate_salt(&self) -> Result<Salt> {
        let mut bytes = [0u8; SALT_SIZE];
        self.rng.fill(&mut bytes).map_err(|_| {
            error!("Failed to generate random salt");
            BrokerError::encryption("Failed to generate random salt")
        })?;
        Ok(Salt(bytes))
    }

    /// Encrypt `plaintext` under the master key and `salt`.
    ///
    /// Returns base64 of the ciphertext with the authentication tag appended.
    #[instrument(skip(self, plaintext, salt), fields(plaintext_len = plaintext.len()))]
    pub fn encrypt(&self, plaintext: &str, salt: &Salt) -> Result<String> {
        let unbound_key = UnboundKey::new(&AES_256_GCM, &self.key.0).map_err(|_| {
            error!("Failed to create encryption key");
            BrokerError::encryption("Failed to create encryption key")
        })?;
        let mut sealing_key = aead::SealingKey::new(unbound_key, SingleNonce::new(salt));

        let mut buffer = plaintext.as_bytes().to_vec();
        buffer.reserve(TAG_SIZE);

        sealing_key.seal_in_place_append_tag(Aad::empty(), &mut buffer).map_err(|_| {
            error!("Encryption failed");
            BrokerError::encryption("Failed to encrypt secret")
        })?;

        Ok(B64.encode(buffer))
    }

    /// Decrypt base64 `ciphertext` produced by [`encrypt`](Self::encrypt) with the same salt
    #[instrument(skip(self, ciphertext, salt), fields(ciphertext_len = ciphertext.len()))]
    pub fn decrypt(&self, ciphertext: &str, salt: &Salt) -> Result<String> {
        let mut buffer = B64.decode(ciphertext).map_err(|e| {
            BrokerError::decryption(format!("Ciphertext is not valid base64: {}", e))
        })?;

        if buffer.len() < TAG_SIZE {
            return Err(BrokerError::decryption(
                "Ciphertext too short (missing authentication tag)",
            ));
        }

        let unbound_key = UnboundKey::new(&AES_256_GCM, &self.key.0).map_err(|_| {
            error!("Failed to create decryption key");
            BrokerError::decryption("Failed to create decryption key")
        })?;
        let mut opening_key = aead::OpeningKey::new(unbound_key, SingleNonce::new(salt));

        let plaintext = opening_key.open_in_place(Aad::empty(), &mut buffer).map_err(|_| {
            error!("Decryption failed - wrong key, wrong salt or tampered ciphertext");
            BrokerError::decryption("Authentication failed")
        })?;

        let plaintext = String::from_utf8(plaintext.to_vec())
            .map_err(|_| BrokerError::decryption("Decrypted secret is not valid UTF-8"));
        buffer.zeroize();
        plaintext
    }
}

impl fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCipher").field("key", &"[REDACTED]").finish()
    }
}
