//! Lazy, pull-based loader for the paginated hierarchy snapshot.
//!
//! The loader holds at most one page in flight: the next page is requested
//! only when the caller asks for it, so memory stays O(one page) here.
//! A fetch failure terminates the sequence with an error instead of
//! truncating it silently — a truncated snapshot would look identical to a
//! complete one downstream.

use crate::error::IndexerResult;
use crate::remote::RemoteHierarchy;
use cryptdrive_types::{Cursor, HierarchyNode, ShareId};
use std::sync::Arc;
use tracing::debug;

/// Pull-based sequence of snapshot pages for one share.
pub struct SnapshotLoader {
    remote: Arc<dyn RemoteHierarchy>,
    share_id: ShareId,
    page_size: usize,
    cursor: Option<Cursor>,
    done: bool,
    pages_fetched: usize,
}

impl SnapshotLoader {
    /// Starts a snapshot sequence. No fetch happens until the first
    /// `next_page` call.
    pub fn new(remote: Arc<dyn RemoteHierarchy>, share_id: ShareId, page_size: usize) -> Self {
        Self {
            remote,
            share_id,
            page_size,
            cursor: None,
            done: false,
            pages_fetched: 0,
        }
    }

    /// Pulls the next page of nodes. Returns `Ok(None)` once the remote
    /// reports no more pages. After an error the sequence is over:
    /// subsequent calls return `Ok(None)`.
    pub async fn next_page(&mut self) -> IndexerResult<Option<Vec<HierarchyNode>>> {
        if self.done {
            return Ok(None);
        }

        let page = match self
            .remote
            .fetch_page(&self.share_id, self.cursor.as_ref(), self.page_size)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };

        self.pages_fetched += 1;
        self.cursor = page.next_cursor;
        if !page.has_more {
            self.done = true;
        }

        debug!(
            share = %self.share_id,
            page = self.pages_fetched,
            nodes = page.nodes.len(),
            done = self.done,
            "fetched snapshot page"
        );

        Ok(Some(page.nodes))
    }

    /// True once the sequence has terminated (normally or with an error).
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}
