//! AES-256-GCM sealing of credential bundles at rest.
//!
//! The whole serialized bundle is encrypted under one random nonce. The key
//! is 32 bytes, base64-encoded in `GATEWAY_ENCRYPTION_KEY`, and only ever
//! held in memory.

use super::Credentials;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Size of the encryption key in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits, standard for GCM)
const NONCE_SIZE: usize = 12;

/// Validated 32-byte master key.
#[derive(Clone)]
pub struct EncryptionKey {
    bytes: Vec<u8>,
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

impl EncryptionKey {
    /// Decode and validate a base64-encoded key.
    pub fn from_base64(key_base64: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(key_base64.trim())
            .context("Failed to decode base64 encryption key")?;

        if bytes.len() != KEY_SIZE {
            return Err(anyhow!(
                "Encryption key must be {} bytes (256 bits), got {} bytes",
                KEY_SIZE,
                bytes.len()
            ));
        }

        Ok(Self { bytes })
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.bytes).map_err(|e| anyhow!("Failed to create cipher: {}", e))
    }
}

/// Encrypted credential bundle as stored (both fields base64).
#[derive(Clone, Debug, PartialEq)]
pub struct SealedCredentials {
    pub ciphertext: String,
    pub nonce: String,
}

impl SealedCredentials {
    /// Encrypt a bundle with a fresh random nonce.
    pub fn seal(credentials: &Credentials, key: &EncryptionKey) -> Result<Self> {
        let plaintext = credentials.to_json()?;
        let cipher = key.cipher()?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;

        Ok(Self {
            ciphertext: BASE64.encode(&ciphertext),
            nonce: BASE64.encode(nonce),
        })
    }

    /// Decrypt and parse the bundle.
    ///
    /// Fails on a wrong key, a corrupted or tampered ciphertext, or a
    /// plaintext that is not a credential bundle.
    pub fn open(&self, key: &EncryptionKey) -> Result<Credentials> {
        let ciphertext = BASE64
            .decode(&self.ciphertext)
            .context("Failed to decode ciphertext")?;
        let nonce_bytes = BASE64.decode(&self.nonce).context("Failed to decode nonce")?;

        if nonce_bytes.len() != NONCE_SIZE {
            return Err(anyhow!(
                "Invalid nonce size: expected {}, got {}",
                NONCE_SIZE,
                nonce_bytes.len()
            ));
        }

        let plaintext = key
            .cipher()?
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|e| anyhow!("Decryption failed (wrong key or corrupted data): {}", e))?;

        let json = String::from_utf8(plaintext).context("Decrypted data is not valid UTF-8")?;
        Credentials::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::tests::sample_credentials;

    fn key(byte: u8) -> EncryptionKey {
        EncryptionKey::from_base64(&BASE64.encode([byte; KEY_SIZE])).unwrap()
    }

    #[test]
    fn test_key_validation() {
        assert!(EncryptionKey::from_base64(&BASE64.encode([0u8; 32])).is_ok());
        assert!(EncryptionKey::from_base64(&BASE64.encode([0u8; 16])).is_err());
        assert!(EncryptionKey::from_base64(&BASE64.encode([0u8; 64])).is_err());
        assert!(EncryptionKey::from_base64("not-valid-base64!@#$").is_err());
    }

    #[test]
    fn test_key_debug_hides_bytes() {
        assert_eq!(format!("{:?}", key(7)), "EncryptionKey(..)");
    }

    #[test]
    fn test_seal_and_open() {
        let creds = sample_credentials();
        let sealed = SealedCredentials::seal(&creds, &key(0)).unwrap();

        assert!(!sealed.ciphertext.contains("ya29.access"));
        assert_eq!(sealed.open(&key(0)).unwrap(), creds);
    }

    #[test]
    fn test_nonces_differ() {
        let creds = sample_credentials();
        let first = SealedCredentials::seal(&creds, &key(0)).unwrap();
        let second = SealedCredentials::seal(&creds, &key(0)).unwrap();

        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = SealedCredentials::seal(&sample_credentials(), &key(0)).unwrap();
        assert!(sealed.open(&key(1)).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let mut sealed = SealedCredentials::seal(&sample_credentials(), &key(0)).unwrap();
        let mut bytes = BASE64.decode(&sealed.ciphertext).unwrap();
        bytes[0] ^= 0xff;
        sealed.ciphertext = BASE64.encode(&bytes);

        assert!(sealed.open(&key(0)).is_err());
    }

    #[test]
    fn test_bad_nonce_size_fails() {
        let mut sealed = SealedCredentials::seal(&sample_credentials(), &key(0)).unwrap();
        sealed.nonce = BASE64.encode([0u8; 4]);

        let err = sealed.open(&key(0)).unwrap_err();
        assert!(err.to_string().contains("Invalid nonce size"));
    }
}
