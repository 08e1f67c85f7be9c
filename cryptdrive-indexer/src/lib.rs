//! Incremental search-index builder for an end-to-end encrypted file
//! hierarchy.
//!
//! The remote stores a tree of encrypted nodes whose names and keys can only
//! be decrypted once every ancestor's key has been unwrapped — a folder's
//! key is sealed to its parent's key, all the way up to the share root. This
//! crate builds a locally searchable index over such a hierarchy without
//! ever giving the server plaintext and without decrypting the whole tree at
//! once:
//!
//! - [`KeyCache`] holds unwrapped per-node keys for one share session.
//! - [`SnapshotLoader`] pulls the paginated hierarchy snapshot lazily.
//! - [`DecryptionPipeline`] defers nodes whose parent key is still missing
//!   and decrypts ready nodes under a bounded concurrency cap.
//! - [`EventTranslator`] turns raw change events into index mutations,
//!   resolving ancestor keys on demand.
//! - [`IndexSyncCoordinator`] drives the initial build and the polling loop
//!   that keeps the index warm afterward.
//!
//! The remote transport, the cryptographic primitives, and the persisted
//! index are boundaries: [`RemoteHierarchy`], [`NodeCipher`], and
//! [`IndexStore`].

pub mod cipher;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod index;
pub mod key_cache;
pub mod pipeline;
pub mod remote;
pub mod snapshot;

pub use cipher::{EnvelopeCipher, NodeCipher};
pub use config::IndexerConfig;
pub use coordinator::{create_coordinator, CancelHandle, IndexSyncCoordinator, ShareCredentials};
pub use error::{IndexerError, IndexerResult};
pub use events::EventTranslator;
pub use index::{IndexStore, MemoryIndexStore};
pub use key_cache::KeyCache;
pub use pipeline::DecryptionPipeline;
pub use remote::RemoteHierarchy;
pub use snapshot::SnapshotLoader;
