//! External index boundary.
//!
//! The persisted index (storage format, full-text matching, query ranking)
//! is a collaborator; the indexer only hands it mutation batches and a
//! cursor so restarts resume where the last session acknowledged.

use crate::error::IndexerResult;
use async_trait::async_trait;
use cryptdrive_types::{Cursor, ItemId, ItemMutation, SearchableItem, ShareId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Ingestion contract exposed by the external index.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Applies a batch of item mutations for one share.
    async fn apply(&self, share_id: &ShareId, mutations: Vec<ItemMutation>) -> IndexerResult<()>;

    /// Removes every item belonging to one share (full-reset path).
    async fn clear_share(&self, share_id: &ShareId) -> IndexerResult<()>;

    /// Last acknowledged event cursor for the share, if any.
    async fn cursor(&self, share_id: &ShareId) -> IndexerResult<Option<Cursor>>;

    /// Persists the acknowledged event cursor for the share.
    async fn set_cursor(&self, share_id: &ShareId, cursor: Cursor) -> IndexerResult<()>;
}

#[derive(Default)]
struct MemoryIndexInner {
    items: HashMap<ItemId, SearchableItem>,
    cursors: HashMap<ShareId, Cursor>,
}

/// In-memory index store for tests and embedding without persistence.
#[derive(Clone, Default)]
pub struct MemoryIndexStore {
    inner: Arc<RwLock<MemoryIndexInner>>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items for one share, ordered by their pagination key.
    pub async fn items_for_share(&self, share_id: &ShareId) -> Vec<SearchableItem> {
        let inner = self.inner.read().await;
        let mut items: Vec<SearchableItem> = inner
            .items
            .values()
            .filter(|item| &item.id.share_id == share_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.order);
        items
    }

    pub async fn item(&self, id: &ItemId) -> Option<SearchableItem> {
        self.inner.read().await.items.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.items.is_empty()
    }
}

#[async_trait]
impl IndexStore for MemoryIndexStore {
    async fn apply(&self, _share_id: &ShareId, mutations: Vec<ItemMutation>) -> IndexerResult<()> {
        let mut inner = self.inner.write().await;
        for mutation in mutations {
            match mutation {
                ItemMutation::Create(item) | ItemMutation::Update(item) => {
                    inner.items.insert(item.id.clone(), item);
                }
                ItemMutation::Delete(id) => {
                    inner.items.remove(&id);
                }
            }
        }
        Ok(())
    }

    async fn clear_share(&self, share_id: &ShareId) -> IndexerResult<()> {
        let mut inner = self.inner.write().await;
        inner.items.retain(|id, _| &id.share_id != share_id);
        inner.cursors.remove(share_id);
        Ok(())
    }

    async fn cursor(&self, share_id: &ShareId) -> IndexerResult<Option<Cursor>> {
        Ok(self.inner.read().await.cursors.get(share_id).cloned())
    }

    async fn set_cursor(&self, share_id: &ShareId, cursor: Cursor) -> IndexerResult<()> {
        self.inner
            .write()
            .await
            .cursors
            .insert(share_id.clone(), cursor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cryptdrive_types::{NodeId, NodeKind};

    fn item(share: &str, node: &str, order: u64) -> SearchableItem {
        SearchableItem {
            id: ItemId::new(ShareId::from(share), NodeId::from(node)),
            name: format!("{node}.txt"),
            kind: NodeKind::File,
            parent_id: None,
            mime_type: Some("text/plain".to_string()),
            size: Some(1),
            created_at: Utc::now(),
            modified_at: Utc::now(),
            order,
        }
    }

    #[tokio::test]
    async fn apply_create_update_delete() {
        let store = MemoryIndexStore::new();
        let share = ShareId::from("s1");

        store
            .apply(&share, vec![ItemMutation::Create(item("s1", "a", 0))])
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);

        let mut renamed = item("s1", "a", 1);
        renamed.name = "renamed.txt".to_string();
        store
            .apply(&share, vec![ItemMutation::Update(renamed.clone())])
            .await
            .unwrap();
        assert_eq!(store.item(&renamed.id).await.unwrap().name, "renamed.txt");

        store
            .apply(&share, vec![ItemMutation::Delete(renamed.id.clone())])
            .await
            .unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn clear_share_only_touches_that_share() {
        let store = MemoryIndexStore::new();
        let s1 = ShareId::from("s1");
        let s2 = ShareId::from("s2");

        store
            .apply(&s1, vec![ItemMutation::Create(item("s1", "a", 0))])
            .await
            .unwrap();
        store
            .apply(&s2, vec![ItemMutation::Create(item("s2", "b", 0))])
            .await
            .unwrap();
        store.set_cursor(&s1, Cursor::from("c1")).await.unwrap();

        store.clear_share(&s1).await.unwrap();

        assert!(store.items_for_share(&s1).await.is_empty());
        assert_eq!(store.items_for_share(&s2).await.len(), 1);
        assert_eq!(store.cursor(&s1).await.unwrap(), None);
    }
}
