//! Key wrapping and name encryption primitives for cryptdrive.
//!
//! The remote hierarchy is end-to-end encrypted with a two-tier key system:
//!
//! 1. **Node keys**: every folder owns an X25519 keypair. A folder's secret
//!    key is sealed to its parent's public key (ephemeral-sender envelope),
//!    so unwrapping a key requires the whole ancestor chain down from the
//!    share root.
//! 2. **Name keys**: display names are encrypted with ChaCha20-Poly1305
//!    under a symmetric key derived from the parent folder's secret key,
//!    so holding a folder's key is enough to read its children's names.
//!
//! The indexer consumes these operations through its cipher boundary; this
//! crate is the default implementation.

mod envelope;
mod error;
mod keys;
mod name;

pub use crypto_box::{PublicKey, SecretKey};
pub use envelope::{open_envelope, seal_envelope, unwrap_node_key, wrap_node_key};
pub use error::{CryptoError, CryptoResult};
pub use keys::{key_digest, NodeKeyPair, KEY_SIZE};
pub use name::{decrypt_name, encrypt_name, NAME_NONCE_SIZE};
