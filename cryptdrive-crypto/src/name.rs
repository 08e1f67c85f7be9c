//! Display-name encryption.
//!
//! Names are encrypted with ChaCha20-Poly1305 under a symmetric key derived
//! from the parent folder's secret key, so unwrapping a folder's key makes
//! all of its children's names readable without further unwraps.

use crate::error::{CryptoError, CryptoResult};
use crate::keys::name_key;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use crypto_box::SecretKey;
use cryptdrive_types::EncryptedName;
use rand::RngCore;
use zeroize::Zeroize;

/// ChaCha20-Poly1305 nonce size in bytes.
pub const NAME_NONCE_SIZE: usize = 12;

/// Encrypts a display name under the parent folder's derived name key.
pub fn encrypt_name(name: &str, parent_sk: &SecretKey) -> CryptoResult<EncryptedName> {
    let mut key_bytes = name_key(parent_sk);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));

    let mut nonce_bytes = [0u8; NAME_NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), name.as_bytes())
        .map_err(|e| CryptoError::Encryption(format!("name encryption failed: {e}")));
    key_bytes.zeroize();

    Ok(EncryptedName {
        nonce: nonce_bytes,
        ciphertext: ciphertext?,
    })
}

/// Decrypts a display name using the parent folder's secret key.
pub fn decrypt_name(name: &EncryptedName, parent_sk: &SecretKey) -> CryptoResult<String> {
    let mut key_bytes = name_key(parent_sk);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&name.nonce), name.ciphertext.as_ref())
        .map_err(|_| {
            CryptoError::Decryption("name decryption failed (wrong key or tampered data)".to_string())
        });
    key_bytes.zeroize();

    String::from_utf8(plaintext?).map_err(|_| CryptoError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::NodeKeyPair;
    use proptest::prelude::*;

    #[test]
    fn wrong_key_fails_decryption() {
        let parent = NodeKeyPair::generate();
        let other = NodeKeyPair::generate();

        let encrypted = encrypt_name("report.pdf", &parent.secret).unwrap();
        assert!(decrypt_name(&encrypted, &other.secret).is_err());
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let parent = NodeKeyPair::generate();

        let mut encrypted = encrypt_name("report.pdf", &parent.secret).unwrap();
        encrypted.ciphertext[0] ^= 0xff;
        assert!(decrypt_name(&encrypted, &parent.secret).is_err());
    }

    proptest! {
        #[test]
        fn any_unicode_name_survives_the_roundtrip(name in "\\PC{1,64}") {
            let parent = NodeKeyPair::generate();
            let encrypted = encrypt_name(&name, &parent.secret).unwrap();
            let decrypted = decrypt_name(&encrypted, &parent.secret).unwrap();
            prop_assert_eq!(decrypted, name);
        }
    }
}
