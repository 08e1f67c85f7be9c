//! Node keypairs and key derivation.

use crypto_box::{PublicKey, SecretKey};
use sha2::{Digest, Sha256};

/// Size of all key material in bytes.
pub const KEY_SIZE: usize = 32;

/// X25519 keypair owned by one folder node.
///
/// The secret key implements `ZeroizeOnDrop` automatically (from crypto_box).
pub struct NodeKeyPair {
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl NodeKeyPair {
    /// Generates a fresh keypair.
    pub fn generate() -> Self {
        let secret = SecretKey::generate(&mut rand::rngs::OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Reconstructs a keypair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        let secret = SecretKey::from(bytes);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Returns the public key as raw 32-byte array.
    pub fn public_bytes(&self) -> [u8; KEY_SIZE] {
        *self.public.as_bytes()
    }

    /// Returns the secret key as raw 32-byte array.
    pub fn secret_bytes(&self) -> [u8; KEY_SIZE] {
        self.secret.to_bytes()
    }
}

/// SHA-256 ownership digest of a secret key, stored alongside each wrap and
/// checked after unsealing.
pub fn key_digest(secret: &SecretKey) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"cryptdrive.key-digest.v1");
    hasher.update(secret.to_bytes());
    hasher.finalize().into()
}

/// Derives the symmetric name key for a folder from its secret key.
///
/// Domain-separated so the name key can never collide with the digest above.
pub(crate) fn name_key(secret: &SecretKey) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"cryptdrive.name-key.v1");
    hasher.update(secret.to_bytes());
    hasher.finalize().into()
}
