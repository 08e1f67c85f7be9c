//! Envelope encryption for folder node keys.
//!
//! A folder's secret key is sealed to the parent folder's public key using
//! X25519 key exchange + XSalsa20-Poly1305 with an ephemeral sender keypair
//! (anonymous encryption). Unsealing therefore requires the parent's secret
//! key, which is itself sealed to the grandparent's — the key chain.

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{key_digest, KEY_SIZE};
use crypto_box::aead::Aead;
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use cryptdrive_types::{SealedEnvelope, WrappedNodeKey};
use rand::RngCore;

/// Seals plaintext to a recipient public key with an ephemeral keypair.
pub fn seal_envelope(plaintext: &[u8], recipient_pk: &PublicKey) -> CryptoResult<SealedEnvelope> {
    let ephemeral = SecretKey::generate(&mut rand::rngs::OsRng);
    let ephemeral_pk = ephemeral.public_key();

    let salsa_box = SalsaBox::new(recipient_pk, &ephemeral);

    let mut nonce_bytes = [0u8; 24];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = salsa_box
        .encrypt(crypto_box::Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| CryptoError::Encryption(format!("envelope seal failed: {e}")))?;

    Ok(SealedEnvelope {
        ephemeral_public_key: *ephemeral_pk.as_bytes(),
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Opens a sealed envelope using the recipient's secret key.
pub fn open_envelope(envelope: &SealedEnvelope, recipient_sk: &SecretKey) -> CryptoResult<Vec<u8>> {
    let ephemeral_pk = PublicKey::from(envelope.ephemeral_public_key);
    let salsa_box = SalsaBox::new(&ephemeral_pk, recipient_sk);

    salsa_box
        .decrypt(
            crypto_box::Nonce::from_slice(&envelope.nonce),
            envelope.ciphertext.as_ref(),
        )
        .map_err(|_| {
            CryptoError::Decryption("envelope open failed (wrong key or tampered data)".to_string())
        })
}

/// Wraps a folder's secret key under the parent folder's public key,
/// bundling the ownership digest checked on unwrap.
pub fn wrap_node_key(child_sk: &SecretKey, parent_pk: &PublicKey) -> CryptoResult<WrappedNodeKey> {
    let envelope = seal_envelope(&child_sk.to_bytes(), parent_pk)?;
    Ok(WrappedNodeKey {
        envelope,
        key_digest: key_digest(child_sk),
    })
}

/// Unwraps a folder's secret key using the parent's secret key.
///
/// Fails with `DigestMismatch` when the unsealed key does not match the
/// wrap's ownership digest, even if the AEAD tag verified.
pub fn unwrap_node_key(wrapped: &WrappedNodeKey, parent_sk: &SecretKey) -> CryptoResult<SecretKey> {
    let plaintext = open_envelope(&wrapped.envelope, parent_sk)?;

    if plaintext.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: plaintext.len(),
        });
    }

    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&plaintext);
    let secret = SecretKey::from(bytes);

    if key_digest(&secret) != wrapped.key_digest {
        return Err(CryptoError::DigestMismatch);
    }

    Ok(secret)
}
