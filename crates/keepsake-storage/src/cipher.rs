use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use keepsake_core::storage::StoreError;

use crate::key_lifecycle::{EncryptionKey, KEY_LEN};

/// Size of the AES-GCM nonce prefixed to every envelope.
pub const NONCE_LEN: usize = 12;

/// AES-256-GCM transform pair producing `nonce || ciphertext || tag` envelopes.
///
/// A fresh random nonce is drawn from the OS RNG on every `encrypt`, and the
/// GCM tag is the only integrity check on `decrypt`.
#[derive(Clone)]
pub struct Encryptor {
    cipher: Aes256Gcm,
}

impl Encryptor {
    /// Build an encryptor from raw key bytes; anything but 32 bytes is rejected here,
    /// never at encrypt/decrypt time.
    pub fn new(key: &[u8]) -> Result<Self, StoreError> {
        if key.len() != KEY_LEN {
            return Err(StoreError::InvalidKey { len: key.len() });
        }
        let cipher =
            Aes256Gcm::new_from_slice(key).map_err(|_| StoreError::InvalidKey { len: key.len() })?;
        Ok(Self { cipher })
    }

    pub fn from_key(key: &EncryptionKey) -> Result<Self, StoreError> {
        Self::new(key.as_bytes())
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, StoreError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| StoreError::crypto(format!("encrypt failed: {e}")))?;

        let mut envelope = Vec::with_capacity(NONCE_LEN + sealed.len());
        envelope.extend_from_slice(nonce.as_slice());
        envelope.extend_from_slice(&sealed);
        Ok(envelope)
    }

    pub fn decrypt(&self, envelope: &[u8]) -> Result<Vec<u8>, StoreError> {
        if envelope.len() < NONCE_LEN {
            return Err(StoreError::crypto(format!(
                "ciphertext too short: {} bytes",
                envelope.len()
            )));
        }
        let (nonce, sealed) = envelope.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| StoreError::crypto("authentication failed (tampered data or wrong key)"))
    }
}

impl std::fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encryptor")
            .field("cipher", &"AES-256-GCM")
            .finish_non_exhaustive()
    }
}
