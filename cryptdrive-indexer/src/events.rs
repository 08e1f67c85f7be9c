//! Live-event translation.
//!
//! After the initial build, the index is kept warm by polling raw change
//! events. Unlike the bulk pipeline, events can reference ancestors in any
//! order, so missing keys are resolved on demand: walk up the chain until a
//! cached ancestor (or the root) is found, then unwrap back down.

use crate::error::{IndexerError, IndexerResult};
use crate::key_cache::KeyCache;
use crate::pipeline::searchable_item;
use crate::remote::RemoteHierarchy;
use cryptdrive_crypto::SecretKey;
use cryptdrive_types::{
    ChangeKind, HierarchyNode, ItemId, ItemMutation, NodeId, RawChangeEvent, ShareId,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Guards against parent-pointer cycles in inconsistent remote data.
const MAX_CHAIN_DEPTH: usize = 512;

/// Translates raw change events into index mutations for one share session.
pub struct EventTranslator {
    share_id: ShareId,
    remote: Arc<dyn RemoteHierarchy>,
    keys: KeyCache,
    order: Arc<AtomicU64>,
}

impl EventTranslator {
    pub fn new(
        share_id: ShareId,
        remote: Arc<dyn RemoteHierarchy>,
        keys: KeyCache,
        order: Arc<AtomicU64>,
    ) -> Self {
        Self {
            share_id,
            remote,
            keys,
            order,
        }
    }

    /// Translates one page of events into a mutation batch.
    ///
    /// Delete events pass through without touching the key resolver.
    /// Malformed events and events whose keys cannot be unwrapped are
    /// dropped from the batch with a warning; transport failures abort the
    /// batch so the caller can retry the whole page.
    pub async fn translate(&self, events: &[RawChangeEvent]) -> IndexerResult<Vec<ItemMutation>> {
        let mut mutations = Vec::with_capacity(events.len());

        for event in events {
            match event.kind {
                ChangeKind::Delete => {
                    mutations.push(ItemMutation::Delete(ItemId::new(
                        self.share_id.clone(),
                        event.node_id.clone(),
                    )));
                }
                ChangeKind::Create | ChangeKind::Update => {
                    let Some(node) = &event.node else {
                        warn!(node = %event.node_id, kind = ?event.kind, "dropping event without metadata");
                        continue;
                    };
                    match self.decrypt_event_node(node).await {
                        Ok(Some(item)) => mutations.push(match event.kind {
                            ChangeKind::Create => ItemMutation::Create(item),
                            _ => ItemMutation::Update(item),
                        }),
                        Ok(None) => {
                            warn!(node = %node.id, kind = ?event.kind, "dropping event for key-only node");
                        }
                        Err(e) if e.is_per_item() => {
                            warn!(node = %node.id, error = %e, "dropping event after failed key unwrap");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        Ok(mutations)
    }

    async fn decrypt_event_node(
        &self,
        node: &HierarchyNode,
    ) -> IndexerResult<Option<cryptdrive_types::SearchableItem>> {
        let key_id = node.parent_id.clone().unwrap_or_else(|| node.id.clone());
        let parent_key = self.ensure_key(key_id).await?;
        let Some(name) = self.keys.resolve(node, &parent_key).await? else {
            return Ok(None);
        };
        let order = self.order.fetch_add(1, Ordering::Relaxed);
        Ok(Some(searchable_item(&self.share_id, node.clone(), name, order)))
    }

    /// Returns the key for `node_id`, unwrapping any uncached ancestors on
    /// demand by walking up until a cached key (or the root) is reached.
    async fn ensure_key(&self, node_id: NodeId) -> IndexerResult<SecretKey> {
        if let Some(key) = self.keys.get_key(&node_id).await {
            return Ok(key);
        }

        // Collect the uncached suffix of the chain, deepest node first.
        let mut chain: Vec<HierarchyNode> = Vec::new();
        let mut current = node_id.clone();
        loop {
            if chain.len() >= MAX_CHAIN_DEPTH {
                return Err(IndexerError::DependencyStarvation {
                    share_id: self.share_id.clone(),
                    missing: chain.len(),
                });
            }
            let node = self.remote.fetch_node(&self.share_id, &current).await?;
            let parent_id = node.parent_id.clone();
            chain.push(node);
            match parent_id {
                Some(parent_id) => {
                    if self.keys.has_key(&parent_id).await {
                        break;
                    }
                    current = parent_id;
                }
                // Reached the root, whose key is seeded at session start.
                None => break,
            }
        }

        // Unwrap top-down so each resolve finds its parent key cached.
        for node in chain.into_iter().rev() {
            let key_id = node.parent_id.clone().unwrap_or_else(|| node.id.clone());
            let parent_key =
                self.keys
                    .get_key(&key_id)
                    .await
                    .ok_or_else(|| IndexerError::KeyUnwrap {
                        node_id: node.id.clone(),
                        source: None,
                    })?;
            self.keys.resolve(&node, &parent_key).await?;
        }

        self.keys
            .get_key(&node_id)
            .await
            .ok_or(IndexerError::KeyUnwrap {
                node_id,
                source: None,
            })
    }
}
