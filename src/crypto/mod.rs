// src/crypto/mod.rs
// Envelope encryption for at-rest sensitive text: a per-install master key
// held behind a pluggable secret store, used to derive an AES-256-GCM
// working key.

mod keystore;
mod secret_store;

pub use keystore::Keystore;
pub use secret_store::{InMemorySecretStore, KeyringSecretStore, SecretStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_including_empty() {
        let ks = Keystore::new_for_test();
        for input in [b"".to_vec(), b"hello world".to_vec(), vec![0u8; 4096]] {
            let ct = ks.encrypt(&input).unwrap();
            let pt = ks.decrypt(&ct).unwrap();
            assert_eq!(pt, input);
        }
    }

    #[test]
    fn empty_input_bypasses_encryption() {
        let ks = Keystore::new_for_test();
        let ct = ks.encrypt(&[]).unwrap();
        assert!(ct.is_empty());
    }

    #[test]
    fn same_plaintext_yields_different_ciphertexts() {
        let ks = Keystore::new_for_test();
        let a = ks.encrypt(b"same plaintext").unwrap();
        let b = ks.encrypt(b"same plaintext").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_ciphertext_fails_decryption() {
        let ks = Keystore::new_for_test();
        let mut ct = ks.encrypt(b"secret").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0xFF;
        assert!(ks.decrypt(&ct).is_err());
    }

    #[test]
    fn short_ciphertext_is_rejected() {
        let ks = Keystore::new_for_test();
        assert!(ks.decrypt(&[1, 2, 3]).is_err());
    }

    #[test]
    fn string_convenience_layer_base64_roundtrips() {
        let ks = Keystore::new_for_test();
        let encoded = ks.encrypt_to_string("hi there").unwrap();
        assert_eq!(ks.decrypt_from_string(&encoded).unwrap(), "hi there");
    }
}
