//! AES-256-GCM cipher provider.
//!
//! A `Cipher` owns the single master key of the running instance.  It is
//! built once at startup and then shared by reference with every
//! component that seals or reveals secret fields; the key never changes
//! for the lifetime of the process.
//!
//! Each call to `encrypt` generates a fresh random 12-byte nonce and
//! prepends it to the ciphertext.  `decrypt` splits the nonce back out
//! before decrypting and verifying the authentication tag.
//!
//! Layout of an encrypted buffer:
//!   [ 12-byte nonce | ciphertext + 16-byte auth tag ]
//!
//! The empty byte string is a sentinel: encrypting it returns an empty
//! buffer without touching the cipher, and decrypting an empty buffer
//! returns empty plaintext.

use std::fmt;
use std::path::Path;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use zeroize::Zeroize;

use super::keyfile;
use crate::errors::{VaultError, Result};

/// Size of the AES-256-GCM nonce in bytes.
const NONCE_LEN: usize = 12;

/// Size of the AES-256-GCM authentication tag in bytes.
const TAG_LEN: usize = 16;

/// Length of the master key (256 bits).
pub const KEY_LEN: usize = 32;

/// A 32-byte master key that zeroes its memory when dropped.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    /// Create a new `MasterKey` from raw bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Generate a fresh random key from the operating system RNG.
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(key.as_slice());
        Self { bytes }
    }

    /// Access the raw key bytes (e.g. to persist them).
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Short SHA-256 fingerprint of the key, safe to display.
    pub fn fingerprint(&self) -> String {
        use base64::engine::general_purpose::STANDARD_NO_PAD as BASE64;
        use base64::Engine;
        use sha2::{Digest, Sha256};

        let digest = Sha256::digest(self.bytes);
        BASE64.encode(&digest[..12])
    }
}

/// Authenticated symmetric encryption under one long-lived key.
pub struct Cipher {
    aead: Aes256Gcm,
    fingerprint: String,
}

impl Cipher {
    /// Build a cipher from a master key.
    pub fn new(key: &MasterKey) -> Self {
        let aead = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        Self {
            aead,
            fingerprint: key.fingerprint(),
        }
    }

    /// Load the key at `path`, generating and persisting a new one if the
    /// file does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        let key = keyfile::load_or_generate(path)?;
        Ok(Self::new(&key))
    }

    /// Fingerprint of the master key this cipher was built from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Encrypt `plaintext`, returning nonce || ciphertext.
    ///
    /// Two calls on the same plaintext never return the same bytes.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        if plaintext.is_empty() {
            return Ok(Vec::new());
        }

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .aead
            .encrypt(&nonce, plaintext)
            .map_err(|e| VaultError::EncryptionFailed(format!("encryption error: {e}")))?;

        let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        output.extend_from_slice(&nonce);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    /// Decrypt data that was produced by `encrypt`.
    ///
    /// Fails with `DecryptionFailed` on truncated input, tampered bytes,
    /// or a buffer sealed under a different key.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(VaultError::DecryptionFailed);
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.aead
            .decrypt(nonce, ciphertext)
            .map_err(|_| VaultError::DecryptionFailed)
    }

    /// Encrypt a UTF-8 string.
    pub fn encrypt_str(&self, plaintext: &str) -> Result<Vec<u8>> {
        self.encrypt(plaintext.as_bytes())
    }

    /// Decrypt to a UTF-8 string.
    ///
    /// Invalid UTF-8 is treated as a decryption failure; the bytes are
    /// zeroized before being discarded.
    pub fn decrypt_str(&self, data: &[u8]) -> Result<String> {
        let bytes = self.decrypt(data)?;
        String::from_utf8(bytes).map_err(|e| {
            let mut bad_bytes = e.into_bytes();
            bad_bytes.zeroize();
            VaultError::DecryptionFailed
        })
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}
