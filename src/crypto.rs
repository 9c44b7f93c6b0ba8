//! At-rest encryption for the stored Suno session cookie.
//!
//! Payloads are `hex(salt):hex(iv):hex(ciphertext)`. Each call to
//! [`CredentialCipher::encrypt`] draws a fresh salt and IV, and the key is
//! re-derived with scrypt from the server secret and that salt. AES-256-GCM
//! authenticates the ciphertext, so a tampered payload fails to decrypt
//! instead of yielding garbage.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use std::sync::Arc;
use thiserror::Error;

const SALT_LEN: usize = 16;
const IV_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// scrypt cost parameters (N = 2^14, r = 8, p = 1).
const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("ENCRYPTION_KEY is not set")]
    MissingSecret,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Encryption failed")]
    Encrypt,

    #[error("Decryption failed: payload was tampered with or the key is wrong")]
    Decrypt,

    #[error("Decrypted value is not valid UTF-8")]
    InvalidUtf8,

    #[error("Cipher task failed: {0}")]
    Task(String),
}

pub struct CredentialCipher {
    secret: String,
    params: scrypt::Params,
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher").finish_non_exhaustive()
    }
}

impl CredentialCipher {
    pub fn new(secret: &str) -> Result<Self, CryptoError> {
        Self::with_cost(secret, SCRYPT_LOG_N)
    }

    /// Builds a cipher from an optional secret, as read from configuration.
    pub fn from_secret(secret: Option<&str>) -> Result<Self, CryptoError> {
        match secret {
            Some(s) => Self::new(s),
            None => Err(CryptoError::MissingSecret),
        }
    }

    /// Like [`CredentialCipher::new`] with a custom scrypt cost (`N = 2^log_n`).
    /// Payloads only decrypt with the cost they were written with.
    pub fn with_cost(secret: &str, log_n: u8) -> Result<Self, CryptoError> {
        if secret.is_empty() {
            return Err(CryptoError::MissingSecret);
        }
        let params = scrypt::Params::new(log_n, SCRYPT_R, SCRYPT_P, KEY_LEN)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(Self {
            secret: secret.to_string(),
            params,
        })
    }

    fn derive_key(&self, salt: &[u8]) -> Result<[u8; KEY_LEN], CryptoError> {
        let mut key = [0u8; KEY_LEN];
        scrypt::scrypt(self.secret.as_bytes(), salt, &self.params, &mut key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(key)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut salt = [0u8; SALT_LEN];
        let mut iv = [0u8; IV_LEN];
        let mut rng = rand::rng();
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut iv);

        let key = self.derive_key(&salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;

        Ok(format!(
            "{}:{}:{}",
            hex::encode(salt),
            hex::encode(iv),
            hex::encode(ciphertext)
        ))
    }

    pub fn decrypt(&self, payload: &str) -> Result<String, CryptoError> {
        let parts: Vec<&str> = payload.split(':').collect();
        let [salt_hex, iv_hex, ct_hex] = parts.as_slice() else {
            return Err(CryptoError::MalformedPayload(format!(
                "expected 3 segments, found {}",
                parts.len()
            )));
        };

        let salt = decode_segment("salt", salt_hex)?;
        let iv = decode_segment("iv", iv_hex)?;
        let ciphertext = decode_segment("ciphertext", ct_hex)?;

        if salt.is_empty() {
            return Err(CryptoError::MalformedPayload("empty salt".to_string()));
        }
        if iv.len() != IV_LEN {
            return Err(CryptoError::MalformedPayload(format!(
                "iv must be {} bytes, found {}",
                IV_LEN,
                iv.len()
            )));
        }

        let key = self.derive_key(&salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
            .map_err(|_| CryptoError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }

    /// [`CredentialCipher::encrypt`] on the blocking pool. Key derivation is
    /// CPU-bound and must not run on an async worker.
    pub async fn encrypt_blocking(self: &Arc<Self>, plaintext: &str) -> Result<String, CryptoError> {
        let cipher = Arc::clone(self);
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || cipher.encrypt(&plaintext))
            .await
            .map_err(|e| CryptoError::Task(e.to_string()))?
    }

    /// [`CredentialCipher::decrypt`] on the blocking pool.
    pub async fn decrypt_blocking(self: &Arc<Self>, payload: &str) -> Result<String, CryptoError> {
        let cipher = Arc::clone(self);
        let payload = payload.to_string();
        tokio::task::spawn_blocking(move || cipher.decrypt(&payload))
            .await
            .map_err(|e| CryptoError::Task(e.to_string()))?
    }
}

fn decode_segment(name: &str, segment: &str) -> Result<Vec<u8>, CryptoError> {
    hex::decode(segment)
        .map_err(|e| CryptoError::MalformedPayload(format!("invalid hex in {}: {}", name, e)))
}

#[cfg(test)]
pub(crate) fn test_cipher(secret: &str) -> Arc<CredentialCipher> {
    // Low scrypt cost keeps unoptimised test builds fast.
    Arc::new(CredentialCipher::with_cost(secret, 4).unwrap())
}
