//! Indexer error types.

use cryptdrive_crypto::CryptoError;
use cryptdrive_types::{NodeId, ShareId};
use thiserror::Error;

/// Result type for indexer operations.
pub type IndexerResult<T> = Result<T, IndexerError>;

/// Errors that can occur while building or synchronizing the index.
///
/// `KeyUnwrap` is absorbed per node (the node is skipped and logged); the
/// other variants are session-level and surface to the coordinator's caller.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("key unwrap failed for node {node_id}")]
    KeyUnwrap {
        node_id: NodeId,
        #[source]
        source: Option<CryptoError>,
    },

    #[error(
        "dependency starvation in share {share_id}: {missing} queued nodes reference ancestors \
         the snapshot never returned"
    )]
    DependencyStarvation { share_id: ShareId, missing: usize },

    #[error("could not advance the event cursor for share {share_id} after {attempts} attempts")]
    CursorResolution { share_id: ShareId, attempts: u32 },

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("index store error: {0}")]
    Index(String),
}

impl IndexerError {
    /// True for errors absorbed per item rather than failing the session.
    pub fn is_per_item(&self) -> bool {
        matches!(self, IndexerError::KeyUnwrap { .. })
    }
}
