//! Two-stage decryption pipeline: snapshot pages in, item batches out.
//!
//! Pages arrive in arbitrary dependency order — a child can land before the
//! page carrying its parent folder's key. Every node is appended to a FIFO
//! pending queue; a scan step repeatedly pops nodes off the front while
//! their parent key is already cached and submits them for decryption under
//! a bounded concurrency cap. The scan stops at the first node that is still
//! pending, so a page's arrival order is preserved and re-scans stay cheap.
//!
//! If the snapshot is exhausted, the queue is non-empty, and a scan removes
//! nothing, some ancestor was never returned: that is a dependency
//! starvation error, reported rather than silently dropped.

use crate::error::{IndexerError, IndexerResult};
use crate::key_cache::KeyCache;
use crate::snapshot::SnapshotLoader;
use cryptdrive_crypto::SecretKey;
use cryptdrive_types::{HierarchyNode, ItemId, SearchableItem, ShareId};
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Bounded-concurrency decryption pipeline for one share session.
///
/// Pull-based: no work happens outside `next_batch`, so the upstream loader
/// never fetches ahead of consumption.
pub struct DecryptionPipeline {
    loader: SnapshotLoader,
    keys: KeyCache,
    /// Session-wide ordering key, shared with the event translator so event
    /// items never collide with snapshot items.
    order: Arc<AtomicU64>,
    /// Nodes whose parent key was not cached when they arrived, FIFO.
    pending: VecDeque<HierarchyNode>,
    ready: Vec<SearchableItem>,
    concurrency: usize,
    batch_threshold: usize,
    cancel: watch::Receiver<bool>,
    snapshot_done: bool,
    starved: bool,
    failed: bool,
}

impl DecryptionPipeline {
    pub fn new(
        loader: SnapshotLoader,
        keys: KeyCache,
        order: Arc<AtomicU64>,
        concurrency: usize,
        batch_threshold: usize,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            loader,
            keys,
            order,
            pending: VecDeque::new(),
            ready: Vec::new(),
            concurrency: concurrency.max(1),
            batch_threshold: batch_threshold.max(1),
            cancel,
            snapshot_done: false,
            starved: false,
            failed: false,
        }
    }

    /// Pulls the next batch of decrypted items.
    ///
    /// Returns `Ok(None)` once the snapshot is fully drained and flushed, or
    /// after cancellation. Each yielded batch holds at least one item; an
    /// item is included only after its node and every ancestor up to the
    /// root resolved successfully.
    pub async fn next_batch(&mut self) -> IndexerResult<Option<Vec<SearchableItem>>> {
        loop {
            if *self.cancel.borrow() {
                debug!(share = %self.keys.share_id(), "pipeline cancelled");
                return Ok(None);
            }
            if self.failed {
                return Ok(None);
            }
            if self.starved {
                self.starved = false;
                self.failed = true;
                return Err(IndexerError::DependencyStarvation {
                    share_id: self.keys.share_id().clone(),
                    missing: self.pending.len(),
                });
            }
            if self.ready.len() >= self.batch_threshold {
                return Ok(Some(std::mem::take(&mut self.ready)));
            }
            if self.snapshot_done && self.pending.is_empty() {
                if self.ready.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(std::mem::take(&mut self.ready)));
            }

            if self.drain_ready().await? > 0 {
                continue;
            }

            if !self.snapshot_done {
                match self.loader.next_page().await {
                    Ok(Some(nodes)) => self.pending.extend(nodes),
                    Ok(None) => self.snapshot_done = true,
                    Err(e) => {
                        self.failed = true;
                        return Err(e);
                    }
                }
            } else if !self.pending.is_empty() {
                // Zero progress with the snapshot exhausted: an ancestor
                // never arrived. Yield what is buffered, then report.
                self.starved = true;
                if !self.ready.is_empty() {
                    return Ok(Some(std::mem::take(&mut self.ready)));
                }
            }
        }
    }

    /// Number of nodes still waiting for an ancestor key.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Scans the pending queue from the front, submitting every node whose
    /// parent key is cached until the first still-pending node. Returns how
    /// many nodes were submitted.
    async fn drain_ready(&mut self) -> IndexerResult<usize> {
        let mut wave: Vec<(HierarchyNode, SecretKey)> = Vec::new();
        loop {
            let Some(front) = self.pending.front() else {
                break;
            };
            // The root's own name is encrypted under its own (seeded) key.
            let key_id = front.parent_id.clone().unwrap_or_else(|| front.id.clone());
            let Some(parent_key) = self.keys.get_key(&key_id).await else {
                break;
            };
            if let Some(node) = self.pending.pop_front() {
                wave.push((node, parent_key));
            }
        }

        if wave.is_empty() {
            return Ok(0);
        }
        let submitted = wave.len();
        debug!(
            share = %self.keys.share_id(),
            submitted,
            still_pending = self.pending.len(),
            "submitting ready nodes for decryption"
        );

        let keys = self.keys.clone();
        let results: Vec<(HierarchyNode, IndexerResult<Option<String>>)> = stream::iter(wave)
            .map(|(node, parent_key)| {
                let keys = keys.clone();
                async move {
                    let name = keys.resolve(&node, &parent_key).await;
                    (node, name)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (node, result) in results {
            match result {
                Ok(Some(name)) => {
                    let order = self.order.fetch_add(1, Ordering::Relaxed);
                    self.ready
                        .push(searchable_item(self.keys.share_id(), node, name, order));
                }
                Ok(None) => {
                    // Key-only node: feeds the chain, nothing to index.
                    debug!(node = %node.id, "resolved key-only node");
                }
                Err(e) if e.is_per_item() => {
                    warn!(node = %node.id, error = %e, "skipping node after failed key unwrap");
                }
                Err(e) => {
                    self.failed = true;
                    return Err(e);
                }
            }
        }

        Ok(submitted)
    }
}

pub(crate) fn searchable_item(
    share_id: &ShareId,
    node: HierarchyNode,
    name: String,
    order: u64,
) -> SearchableItem {
    SearchableItem {
        id: ItemId::new(share_id.clone(), node.id),
        name,
        kind: node.kind,
        parent_id: node.parent_id,
        mime_type: node.mime_type,
        size: node.size,
        created_at: node.created_at,
        modified_at: node.modified_at,
        order,
    }
}
