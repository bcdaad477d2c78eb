//! Provider credential encryption. Credentials are never stored or logged
//! as plaintext; `EncryptedSecret` is the only representation that crosses
//! a serialisation boundary.

use std::collections::HashMap;
use std::env;
use std::sync::Mutex;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Ciphertext + nonce for one provider credential. Safe to serialise and
/// persist; useless without the matching `EncryptionKey`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedSecret {
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
}

/// AES-256-GCM key derived from `ENCRYPTION_KEY`. Never implements `Debug`
/// beyond the opaque marker below — the key material must not reach a log.
pub struct EncryptionKey(Aes256Gcm);

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

impl EncryptionKey {
    pub fn from_env() -> Result<Self> {
        let raw = env::var("ENCRYPTION_KEY").context("ENCRYPTION_KEY is not set")?;
        Self::derive(&raw)
    }

    /// Any-length passphrase is hashed down to a 256-bit key, the same
    /// approach `aigent`'s other at-rest encodings take with `sha2`.
    pub fn derive(passphrase: &str) -> Result<Self> {
        let digest = Sha256::digest(passphrase.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&digest).map_err(|e| anyhow!("invalid key material: {e}"))?;
        Ok(Self(cipher))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptedSecret> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .0
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| anyhow!("encryption failed: {e}"))?;
        Ok(EncryptedSecret {
            nonce: nonce.to_vec(),
            ciphertext,
        })
    }

    pub fn decrypt(&self, secret: &EncryptedSecret) -> Result<String> {
        let nonce = Nonce::from_slice(&secret.nonce);
        let plaintext = self
            .0
            .decrypt(nonce, secret.ciphertext.as_slice())
            .map_err(|e| anyhow!("decryption failed: {e}"))?;
        String::from_utf8(plaintext).context("decrypted credential was not valid utf-8")
    }
}

/// Per-organisation provider credentials. Plaintext is decrypted lazily and
/// cached for the life of the process — spec.md §5 allows this, the key
/// itself is never cached to disk.
pub struct ProviderKeyRing {
    key: EncryptionKey,
    secrets: HashMap<String, EncryptedSecret>,
    plaintext_cache: Mutex<HashMap<String, String>>,
}

impl ProviderKeyRing {
    pub fn new(key: EncryptionKey) -> Self {
        Self {
            key,
            secrets: HashMap::new(),
            plaintext_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_credential(&mut self, provider: &str, plaintext: &str) -> Result<()> {
        let encrypted = self.key.encrypt(plaintext)?;
        self.secrets.insert(provider.to_string(), encrypted);
        self.plaintext_cache.lock().unwrap().remove(provider);
        Ok(())
    }

    pub fn decrypt(&self, provider: &str) -> Result<String> {
        if let Some(cached) = self.plaintext_cache.lock().unwrap().get(provider) {
            return Ok(cached.clone());
        }
        let encrypted = self
            .secrets
            .get(provider)
            .ok_or_else(|| anyhow!("no credential configured for provider '{provider}'"))?;
        let plaintext = self.key.decrypt(encrypted)?;
        self.plaintext_cache
            .lock()
            .unwrap()
            .insert(provider.to_string(), plaintext.clone());
        Ok(plaintext)
    }

    pub fn has_credential(&self, provider: &str) -> bool {
        self.secrets.contains_key(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_recovers_plaintext() {
        let key = EncryptionKey::derive("test-passphrase").unwrap();
        let secret = key.encrypt("sk-live-abc123").unwrap();
        assert_eq!(key.decrypt(&secret).unwrap(), "sk-live-abc123");
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let key_a = EncryptionKey::derive("passphrase-a").unwrap();
        let key_b = EncryptionKey::derive("passphrase-b").unwrap();
        let secret = key_a.encrypt("sk-live-abc123").unwrap();
        assert!(key_b.decrypt(&secret).is_err());
    }

    #[test]
    fn key_ring_caches_decrypted_plaintext() {
        let key = EncryptionKey::derive("ring-passphrase").unwrap();
        let mut ring = ProviderKeyRing::new(key);
        ring.set_credential("openrouter", "sk-or-v1-xyz").unwrap();
        assert!(ring.has_credential("openrouter"));
        assert_eq!(ring.decrypt("openrouter").unwrap(), "sk-or-v1-xyz");
        assert_eq!(ring.decrypt("openrouter").unwrap(), "sk-or-v1-xyz");
    }

    #[test]
    fn missing_provider_errors() {
        let key = EncryptionKey::derive("ring-passphrase").unwrap();
        let ring = ProviderKeyRing::new(key);
        assert!(ring.decrypt("ollama").is_err());
    }
}
