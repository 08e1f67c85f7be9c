//! Per-session cache of unwrapped node keys.
//!
//! Seeded with the share root key; grows strictly parent-before-child
//! because `resolve` is the only mutator and it requires the parent's key as
//! input. Key material is session-scoped and re-derivable, so nothing here
//! is ever persisted.

use crate::cipher::NodeCipher;
use crate::error::{IndexerError, IndexerResult};
use cryptdrive_crypto::SecretKey;
use cryptdrive_types::{HierarchyNode, NodeId, ShareId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::trace;

/// Unwrapped node keys for one share session.
///
/// Clones share the same underlying map; one session owns the cache and its
/// clones are handed to the pipeline and the event translator.
#[derive(Clone)]
pub struct KeyCache {
    share_id: ShareId,
    cipher: Arc<dyn NodeCipher>,
    keys: Arc<RwLock<HashMap<NodeId, SecretKey>>>,
}

impl KeyCache {
    /// Creates a cache pre-seeded with the share root's unwrapped key.
    pub fn new(
        share_id: ShareId,
        cipher: Arc<dyn NodeCipher>,
        root_node_id: NodeId,
        root_key: SecretKey,
    ) -> Self {
        let mut keys = HashMap::new();
        keys.insert(root_node_id, root_key);
        Self {
            share_id,
            cipher,
            keys: Arc::new(RwLock::new(keys)),
        }
    }

    pub fn share_id(&self) -> &ShareId {
        &self.share_id
    }

    pub async fn has_key(&self, node_id: &NodeId) -> bool {
        self.keys.read().await.contains_key(node_id)
    }

    /// Retrieves a cloned key for a node, if cached.
    pub async fn get_key(&self, node_id: &NodeId) -> Option<SecretKey> {
        self.keys.read().await.get(node_id).cloned()
    }

    /// Number of cached keys (including the seeded root).
    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }

    /// Decrypts the node's name (when present) and, for folders, unwraps
    /// and caches the node's own key. The only mutator.
    ///
    /// Returns `None` for key-only nodes, which carry no searchable name.
    /// Idempotent: resolving the same node twice returns the same name and
    /// never re-inserts a key that is already cached.
    pub async fn resolve(
        &self,
        node: &HierarchyNode,
        parent_key: &SecretKey,
    ) -> IndexerResult<Option<String>> {
        let name = match &node.name {
            Some(sealed) => Some(
                self.cipher
                    .decrypt_name(sealed, parent_key)
                    .await
                    .map_err(|e| IndexerError::KeyUnwrap {
                        node_id: node.id.clone(),
                        source: Some(e),
                    })?,
            ),
            None => None,
        };

        if let Some(wrapped) = &node.wrapped_key {
            if !self.has_key(&node.id).await {
                let key = self
                    .cipher
                    .unwrap_node_key(wrapped, parent_key)
                    .await
                    .map_err(|e| IndexerError::KeyUnwrap {
                        node_id: node.id.clone(),
                        source: Some(e),
                    })?;
                self.keys.write().await.insert(node.id.clone(), key);
                trace!(share = %self.share_id, node = %node.id, "cached unwrapped node key");
            }
        }

        Ok(name)
    }
}
