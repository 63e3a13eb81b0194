//! AES-256-GCM encryption for OAuth tokens at rest.
//!
//! Stored form is `base64(nonce ‖ ciphertext)` with a fresh random 96-bit
//! nonce per encryption. The key comes from `STOREFORGE_TOKEN_KEY`
//! (base64-encoded 32 bytes).

use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::CryptoError;

const NONCE_LEN: usize = 12;

/// Encrypts and decrypts OAuth tokens with a store-wide key.
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// Builds a cipher from a base64-encoded 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyEncoding`] if the key is not valid base64,
    /// or [`CryptoError::KeyLength`] if it does not decode to 32 bytes.
    pub fn from_base64_key(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(CryptoError::KeyLength(bytes.len()));
        }
        let key = Key::<Aes256Gcm>::from_slice(&bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Encrypts a token, returning `base64(nonce ‖ ciphertext)`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Aead`] if encryption fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Aead("encryption"))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(combined))
    }

    /// Decrypts a value previously produced by [`TokenCipher::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::CiphertextEncoding`] for invalid base64,
    /// [`CryptoError::CiphertextTruncated`] when the payload is shorter than
    /// a nonce, [`CryptoError::Aead`] on authentication failure (wrong key or
    /// tampered data), or [`CryptoError::Utf8`] if the plaintext is not UTF-8.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let combined = BASE64
            .decode(encoded)
            .map_err(|e| CryptoError::CiphertextEncoding(e.to_string()))?;
        if combined.len() < NONCE_LEN {
            return Err(CryptoError::CiphertextTruncated);
        }
        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::Aead("decryption"))?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::Utf8)
    }
}
