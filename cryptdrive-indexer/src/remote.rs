//! Remote hierarchy boundary.
//!
//! The physical transport (HTTP, pagination tokens, auth) lives behind this
//! trait; the indexer only ever pulls — it never fetches ahead of what the
//! pipeline has consumed.

use crate::error::IndexerResult;
use async_trait::async_trait;
use cryptdrive_types::{Cursor, EventPage, HierarchyNode, NodeId, ShareId, SnapshotPage};

/// Read access to one remote encrypted hierarchy.
#[async_trait]
pub trait RemoteHierarchy: Send + Sync {
    /// Fetches one snapshot page. `cursor` is `None` for the first page.
    async fn fetch_page(
        &self,
        share_id: &ShareId,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> IndexerResult<SnapshotPage>;

    /// Fetches a single node's encrypted metadata. Used by the event path
    /// to resolve ancestors that arrive out of order.
    async fn fetch_node(&self, share_id: &ShareId, node_id: &NodeId)
        -> IndexerResult<HierarchyNode>;

    /// Returns the current tip of the share's event stream. Called once at
    /// session start to establish the baseline.
    async fn latest_cursor(&self, share_id: &ShareId) -> IndexerResult<Cursor>;

    /// Fetches change events recorded after `cursor`.
    async fn events_since(&self, share_id: &ShareId, cursor: &Cursor)
        -> IndexerResult<EventPage>;
}
