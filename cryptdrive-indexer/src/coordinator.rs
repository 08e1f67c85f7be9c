//! Session orchestration.
//!
//! One coordinator run indexes one share: drain the snapshot through the
//! decryption pipeline into the external index, then poll for change events
//! on a fixed cadence and apply the translated mutations. Every session
//! owns its own key cache and ordering counter — nothing is shared across
//! sessions (arena-style, destroyed when the session ends).

use crate::cipher::NodeCipher;
use crate::config::IndexerConfig;
use crate::error::{IndexerError, IndexerResult};
use crate::events::EventTranslator;
use crate::index::IndexStore;
use crate::key_cache::KeyCache;
use crate::pipeline::DecryptionPipeline;
use crate::remote::RemoteHierarchy;
use crate::snapshot::SnapshotLoader;
use cryptdrive_crypto::SecretKey;
use cryptdrive_types::{Cursor, ItemMutation, NodeId, ShareId};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Everything needed to open one share for indexing.
pub struct ShareCredentials {
    pub share_id: ShareId,
    /// Node id of the share root; the snapshot never returns it.
    pub root_node_id: NodeId,
    /// The share root's unwrapped key, obtained out of band by the caller.
    pub root_key: SecretKey,
}

/// Handle that cancels a running session.
///
/// Cancellation stops new fetches, lets in-flight decrypts finish, and makes
/// the session's sequences terminate without yielding further batches.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Creates a coordinator and the handle that cancels its sessions.
pub fn create_coordinator(
    remote: Arc<dyn RemoteHierarchy>,
    index: Arc<dyn IndexStore>,
    cipher: Arc<dyn NodeCipher>,
    config: IndexerConfig,
) -> (CancelHandle, IndexSyncCoordinator) {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let handle = CancelHandle {
        tx: Arc::new(cancel_tx),
    };
    let coordinator = IndexSyncCoordinator {
        remote,
        index,
        cipher,
        config,
        cancel_rx,
    };
    (handle, coordinator)
}

enum PollOutcome {
    Advanced(Cursor),
    RefreshRequired,
}

/// Drives one share's index: initial snapshot build, then event polling.
pub struct IndexSyncCoordinator {
    remote: Arc<dyn RemoteHierarchy>,
    index: Arc<dyn IndexStore>,
    cipher: Arc<dyn NodeCipher>,
    config: IndexerConfig,
    cancel_rx: watch::Receiver<bool>,
}

impl IndexSyncCoordinator {
    /// Runs a share session until cancellation or a fatal error.
    ///
    /// If the index already holds an acknowledged cursor for the share, the
    /// snapshot build is skipped and polling resumes from that cursor.
    pub async fn run(&mut self, creds: ShareCredentials) -> IndexerResult<()> {
        let keys = KeyCache::new(
            creds.share_id.clone(),
            self.cipher.clone(),
            creds.root_node_id.clone(),
            creds.root_key.clone(),
        );
        let order = Arc::new(AtomicU64::new(0));

        let mut cursor = match self.index.cursor(&creds.share_id).await? {
            Some(cursor) => {
                info!(share = %creds.share_id, %cursor, "resuming from acknowledged cursor");
                cursor
            }
            None => self.build_from_snapshot(&creds, &keys, &order).await?,
        };

        if self.is_cancelled() {
            info!(share = %creds.share_id, "session cancelled after initial build");
            return Ok(());
        }

        let translator = EventTranslator::new(
            creds.share_id.clone(),
            self.remote.clone(),
            keys.clone(),
            order.clone(),
        );

        let mut poll = tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs));
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        poll.tick().await; // skip the immediate first tick

        let mut cancel = self.cancel_rx.clone();
        let mut cursor_failures = 0u32;

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    // A dropped handle counts as cancellation.
                    if changed.is_err() || *cancel.borrow() {
                        info!(share = %creds.share_id, "session cancelled");
                        return Ok(());
                    }
                }
                _ = poll.tick() => {
                    match self.poll_once(&creds.share_id, &translator, &cursor).await {
                        Ok(PollOutcome::Advanced(next)) => {
                            cursor = next;
                            cursor_failures = 0;
                        }
                        Ok(PollOutcome::RefreshRequired) => {
                            info!(share = %creds.share_id, "server requested refresh; rebuilding from snapshot");
                            cursor = self.full_reset(&creds, &keys, &order).await?;
                            cursor_failures = 0;
                        }
                        Err(e) if e.is_per_item() => {
                            // translate() absorbs these itself; defensive only
                            warn!(share = %creds.share_id, error = %e, "unexpected per-item error at poll level");
                        }
                        Err(e) => {
                            cursor_failures += 1;
                            warn!(
                                share = %creds.share_id,
                                error = %e,
                                attempt = cursor_failures,
                                "poll cycle failed; retrying on next tick"
                            );
                            if cursor_failures >= self.config.cursor_retry_limit {
                                warn!(share = %creds.share_id, "cursor retries exhausted; performing full reset");
                                match self.full_reset(&creds, &keys, &order).await {
                                    Ok(fresh) => {
                                        cursor = fresh;
                                        cursor_failures = 0;
                                    }
                                    Err(reset_err) => {
                                        warn!(share = %creds.share_id, error = %reset_err, "full reset failed");
                                        return Err(IndexerError::CursorResolution {
                                            share_id: creds.share_id.clone(),
                                            attempts: cursor_failures,
                                        });
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Drains the snapshot through the pipeline into the index and records
    /// the baseline cursor taken before the build started.
    async fn build_from_snapshot(
        &self,
        creds: &ShareCredentials,
        keys: &KeyCache,
        order: &Arc<AtomicU64>,
    ) -> IndexerResult<Cursor> {
        // Baseline first: events recorded during the build are replayed
        // afterward instead of being lost.
        let baseline = self.remote.latest_cursor(&creds.share_id).await?;

        let loader = SnapshotLoader::new(
            self.remote.clone(),
            creds.share_id.clone(),
            self.config.page_size,
        );
        let mut pipeline = DecryptionPipeline::new(
            loader,
            keys.clone(),
            order.clone(),
            self.config.decrypt_concurrency,
            self.config.batch_threshold,
            self.cancel_rx.clone(),
        );

        let mut total = 0usize;
        while let Some(batch) = pipeline.next_batch().await? {
            total += batch.len();
            let mutations: Vec<ItemMutation> =
                batch.into_iter().map(ItemMutation::Create).collect();
            self.index.apply(&creds.share_id, mutations).await?;
        }

        if self.is_cancelled() {
            debug!(share = %creds.share_id, "build interrupted by cancellation");
            return Ok(baseline);
        }

        self.index
            .set_cursor(&creds.share_id, baseline.clone())
            .await?;
        info!(share = %creds.share_id, items = total, "initial index build complete");
        Ok(baseline)
    }

    /// Fetches and applies all event pages recorded after `cursor`.
    async fn poll_once(
        &self,
        share_id: &ShareId,
        translator: &EventTranslator,
        cursor: &Cursor,
    ) -> IndexerResult<PollOutcome> {
        let mut cursor = cursor.clone();
        loop {
            if self.is_cancelled() {
                return Ok(PollOutcome::Advanced(cursor));
            }

            let page = self.remote.events_since(share_id, &cursor).await?;
            if page.refresh_required {
                return Ok(PollOutcome::RefreshRequired);
            }

            let mutations = translator.translate(&page.events).await?;
            if !mutations.is_empty() {
                debug!(share = %share_id, count = mutations.len(), "applying event mutations");
                self.index.apply(share_id, mutations).await?;
            }

            cursor = page.next_cursor;
            self.index.set_cursor(share_id, cursor.clone()).await?;

            if !page.has_more {
                return Ok(PollOutcome::Advanced(cursor));
            }
        }
    }

    /// Discards the stored cursor and the share's items, then rebuilds from
    /// a fresh snapshot. The key cache stays: unwrapped keys remain valid.
    async fn full_reset(
        &self,
        creds: &ShareCredentials,
        keys: &KeyCache,
        order: &Arc<AtomicU64>,
    ) -> IndexerResult<Cursor> {
        self.index.clear_share(&creds.share_id).await?;
        let baseline = self.build_from_snapshot(creds, keys, order).await?;
        Ok(baseline)
    }
}
