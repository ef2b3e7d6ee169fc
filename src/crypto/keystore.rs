// src/crypto/keystore.rs
// Process-wide working key: generate-or-unwrap a master key + salt from the OS
// secret store, derive a working key via Argon2id, and expose AEAD encrypt/decrypt.

use super::secret_store::{InMemorySecretStore, SecretStore};
use crate::config::crypto::CryptoConfig;
use crate::error::{Result, WaddleError};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::Argon2;
use base64::Engine as _;
use rand::RngCore;
use std::sync::Arc;
use zeroize::Zeroizing;

const MASTER_KEY_LEN: usize = 32;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

pub struct Keystore {
    cipher: Aes256Gcm,
}

impl Keystore {
    /// Obtain (generating on first run) the working key from `store` under
    /// `config.credential_name`, deriving it via Argon2id with the configured
    /// fixed parameters.
    pub fn open(store: Arc<dyn SecretStore>, config: &CryptoConfig) -> Result<Self> {
        let envelope = match store.get(&config.credential_name)? {
            Some(bytes) => bytes,
            None => {
                let mut master_key = [0u8; MASTER_KEY_LEN];
                let mut salt = [0u8; SALT_LEN];
                rand::thread_rng().fill_bytes(&mut master_key);
                rand::thread_rng().fill_bytes(&mut salt);
                let mut envelope = Vec::with_capacity(MASTER_KEY_LEN + SALT_LEN);
                envelope.extend_from_slice(&master_key);
                envelope.extend_from_slice(&salt);
                store.set(&config.credential_name, &envelope)?;
                envelope
            }
        };

        if envelope.len() != MASTER_KEY_LEN + SALT_LEN {
            return Err(WaddleError::Encryption(
                "stored credential has unexpected length".to_string(),
            ));
        }
        let (master_key, salt) = envelope.split_at(MASTER_KEY_LEN);

        let working_key = Zeroizing::new(derive_working_key(master_key, salt, config)?);
        let key = Key::<Aes256Gcm>::from_slice(working_key.as_slice());
        let cipher = Aes256Gcm::new(key);

        Ok(Self { cipher })
    }

    /// Convenience constructor backed by an in-memory secret store, for tests.
    pub fn new_for_test() -> Self {
        let store: Arc<dyn SecretStore> = Arc::new(InMemorySecretStore::new());
        let config = CryptoConfig {
            credential_name: "Waddle_Encryption_Key_Test".to_string(),
            argon2_time_cost: 1,
            argon2_memory_kib: 8 * 1024,
            argon2_parallelism: 1,
            argon2_output_len: 32,
        };
        Self::open(store, &config).expect("in-memory keystore open never fails")
    }

    /// Encrypt `plaintext`. Empty input maps to empty output (bypass).
    /// Ciphertext layout is `nonce || ct || tag`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        if plaintext.is_empty() {
            return Ok(Vec::new());
        }
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ct = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| WaddleError::Encryption("AEAD encryption failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ct.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ct);
        Ok(out)
    }

    /// Decrypt `ciphertext` produced by [`Keystore::encrypt`]. Empty input maps
    /// to empty output.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.is_empty() {
            return Ok(Vec::new());
        }
        // AES-GCM tag is 16 bytes; anything shorter than nonce+tag cannot be valid.
        if ciphertext.len() < NONCE_LEN + 16 {
            return Err(WaddleError::Encryption(
                "ciphertext shorter than nonce + tag".to_string(),
            ));
        }
        let (nonce_bytes, ct) = ciphertext.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(nonce, ct)
            .map_err(|_| WaddleError::Encryption("AEAD authentication failed".to_string()))
    }

    /// Base64-wrapped convenience layer over [`Keystore::encrypt`].
    pub fn encrypt_to_string(&self, plaintext: &str) -> Result<String> {
        let ct = self.encrypt(plaintext.as_bytes())?;
        Ok(base64::engine::general_purpose::STANDARD.encode(ct))
    }

    /// Base64-wrapped convenience layer over [`Keystore::decrypt`].
    pub fn decrypt_from_string(&self, encoded: &str) -> Result<String> {
        let ct = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| WaddleError::Serialization(format!("base64 decode: {e}")))?;
        let pt = self.decrypt(&ct)?;
        String::from_utf8(pt).map_err(|e| WaddleError::Serialization(format!("utf8: {e}")))
    }
}

fn derive_working_key(master_key: &[u8], salt: &[u8], config: &CryptoConfig) -> Result<Vec<u8>> {
    let params = argon2::Params::new(
        config.argon2_memory_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
        Some(config.argon2_output_len),
    )
    .map_err(|e| WaddleError::Encryption(format!("argon2 params: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut out = vec![0u8; config.argon2_output_len];
    argon2
        .hash_password_into(master_key, salt, &mut out)
        .map_err(|e| WaddleError::Encryption(format!("argon2 derive: {e}")))?;
    Ok(out)
}
