//! Cryptographic primitive boundary.
//!
//! Key unwrapping and name decryption are black boxes that can fail; the
//! default implementation is backed by `cryptdrive-crypto`. Tests substitute
//! instrumented ciphers to observe concurrency and failure behavior.

use async_trait::async_trait;
use cryptdrive_crypto::{self as crypto, CryptoResult, SecretKey};
use cryptdrive_types::{EncryptedName, WrappedNodeKey};

/// Decryption primitives consumed by the key cache.
#[async_trait]
pub trait NodeCipher: Send + Sync {
    /// Unwraps a folder's secret key using its parent's secret key.
    async fn unwrap_node_key(
        &self,
        wrapped: &WrappedNodeKey,
        parent_key: &SecretKey,
    ) -> CryptoResult<SecretKey>;

    /// Decrypts a node's display name using its parent's secret key.
    async fn decrypt_name(
        &self,
        name: &EncryptedName,
        parent_key: &SecretKey,
    ) -> CryptoResult<String>;
}

/// Default cipher backed by the envelope primitives in `cryptdrive-crypto`.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvelopeCipher;

#[async_trait]
impl NodeCipher for EnvelopeCipher {
    async fn unwrap_node_key(
        &self,
        wrapped: &WrappedNodeKey,
        parent_key: &SecretKey,
    ) -> CryptoResult<SecretKey> {
        crypto::unwrap_node_key(wrapped, parent_key)
    }

    async fn decrypt_name(
        &self,
        name: &EncryptedName,
        parent_key: &SecretKey,
    ) -> CryptoResult<String> {
        crypto::decrypt_name(name, parent_key)
    }
}
