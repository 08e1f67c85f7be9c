//! Shared test doubles: an in-memory encrypted share, a scripted remote,
//! and an instrumented cipher for concurrency assertions.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use cryptdrive_crypto::{encrypt_name, wrap_node_key, CryptoResult, NodeKeyPair, SecretKey};
use cryptdrive_indexer::cipher::{EnvelopeCipher, NodeCipher};
use cryptdrive_indexer::error::{IndexerError, IndexerResult};
use cryptdrive_indexer::remote::RemoteHierarchy;
use cryptdrive_types::{
    Cursor, EncryptedName, EventPage, HierarchyNode, NodeId, NodeKind, ShareId, SnapshotPage,
    WrappedNodeKey,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// An encrypted share built in memory: real key wraps, real name encryption.
pub struct ShareFixture {
    pub share_id: ShareId,
    pub root_id: NodeId,
    keys: HashMap<NodeId, NodeKeyPair>,
    nodes: Vec<HierarchyNode>,
}

impl ShareFixture {
    pub fn new(share: &str) -> Self {
        let root = NodeKeyPair::generate();
        let mut keys = HashMap::new();
        keys.insert(NodeId::from("root"), root);
        Self {
            share_id: ShareId::from(share),
            root_id: NodeId::from("root"),
            keys,
            nodes: Vec::new(),
        }
    }

    pub fn root_secret(&self) -> SecretKey {
        self.keys[&self.root_id].secret.clone()
    }

    pub fn folder_secret(&self, id: &str) -> SecretKey {
        self.keys[&NodeId::from(id)].secret.clone()
    }

    /// Builds a folder node under `parent` without recording it in the
    /// snapshot (for event payloads).
    pub fn build_folder(&mut self, id: &str, parent: &str, name: Option<&str>) -> HierarchyNode {
        let parent_pair = &self.keys[&NodeId::from(parent)];
        let own = NodeKeyPair::generate();
        let node = HierarchyNode {
            id: NodeId::from(id),
            parent_id: Some(NodeId::from(parent)),
            kind: NodeKind::Folder,
            name: name.map(|n| encrypt_name(n, &parent_pair.secret).unwrap()),
            wrapped_key: Some(wrap_node_key(&own.secret, &parent_pair.public).unwrap()),
            mime_type: None,
            size: None,
            created_at: Utc::now(),
            modified_at: Utc::now(),
        };
        self.keys.insert(NodeId::from(id), own);
        node
    }

    /// Builds a file node under `parent` without recording it.
    pub fn build_file(&self, id: &str, parent: &str, name: &str) -> HierarchyNode {
        let parent_pair = &self.keys[&NodeId::from(parent)];
        HierarchyNode {
            id: NodeId::from(id),
            parent_id: Some(NodeId::from(parent)),
            kind: NodeKind::File,
            name: Some(encrypt_name(name, &parent_pair.secret).unwrap()),
            wrapped_key: None,
            mime_type: Some("text/plain".to_string()),
            size: Some(name.len() as u64),
            created_at: Utc::now(),
            modified_at: Utc::now(),
        }
    }

    pub fn add_folder(&mut self, id: &str, parent: &str, name: &str) {
        let node = self.build_folder(id, parent, Some(name));
        self.nodes.push(node);
    }

    pub fn add_key_only_folder(&mut self, id: &str, parent: &str) {
        let node = self.build_folder(id, parent, None);
        self.nodes.push(node);
    }

    pub fn add_file(&mut self, id: &str, parent: &str, name: &str) {
        let node = self.build_file(id, parent, name);
        self.nodes.push(node);
    }

    /// All recorded nodes, in insertion order.
    pub fn nodes(&self) -> Vec<HierarchyNode> {
        self.nodes.clone()
    }

    /// A broken wrap: sealed to a key unrelated to the recorded parent.
    pub fn corrupt_wrapped_key(&self) -> WrappedNodeKey {
        let stranger = NodeKeyPair::generate();
        let victim = NodeKeyPair::generate();
        wrap_node_key(&victim.secret, &stranger.public).unwrap()
    }

    /// A name no session key can decrypt.
    pub fn undecryptable_name(&self) -> EncryptedName {
        let stranger = NodeKeyPair::generate();
        encrypt_name("garbage", &stranger.secret).unwrap()
    }
}

/// Scripted remote: snapshot pages by index-valued cursors, a node map for
/// single fetches, and a queue of event pages.
pub struct MockRemote {
    pages: Vec<Vec<HierarchyNode>>,
    nodes: HashMap<NodeId, HierarchyNode>,
    events: Mutex<VecDeque<EventPage>>,
    pub fetch_page_calls: AtomicUsize,
    pub fetch_node_calls: AtomicUsize,
    pub fail_events: AtomicBool,
    pub fail_page_at: Option<usize>,
}

impl MockRemote {
    pub fn new(pages: Vec<Vec<HierarchyNode>>) -> Self {
        let mut nodes = HashMap::new();
        for page in &pages {
            for node in page {
                nodes.insert(node.id.clone(), node.clone());
            }
        }
        Self {
            pages,
            nodes,
            events: Mutex::new(VecDeque::new()),
            fetch_page_calls: AtomicUsize::new(0),
            fetch_node_calls: AtomicUsize::new(0),
            fail_events: AtomicBool::new(false),
            fail_page_at: None,
        }
    }

    /// Registers nodes reachable only via `fetch_node`.
    pub fn with_nodes(mut self, extra: Vec<HierarchyNode>) -> Self {
        for node in extra {
            self.nodes.insert(node.id.clone(), node);
        }
        self
    }

    pub fn push_event_page(&self, page: EventPage) {
        self.events.lock().unwrap().push_back(page);
    }

    pub fn event_page(
        events: Vec<cryptdrive_types::RawChangeEvent>,
        next_cursor: &str,
    ) -> EventPage {
        EventPage {
            events,
            next_cursor: Cursor::from(next_cursor),
            has_more: false,
            refresh_required: false,
        }
    }
}

#[async_trait]
impl RemoteHierarchy for MockRemote {
    async fn fetch_page(
        &self,
        _share_id: &ShareId,
        cursor: Option<&Cursor>,
        _page_size: usize,
    ) -> IndexerResult<SnapshotPage> {
        self.fetch_page_calls.fetch_add(1, Ordering::SeqCst);
        let idx = match cursor {
            Some(c) => c.0.parse::<usize>().unwrap(),
            None => 0,
        };
        if self.fail_page_at == Some(idx) {
            return Err(IndexerError::Transport(format!(
                "injected failure fetching page {idx}"
            )));
        }
        let nodes = self.pages.get(idx).cloned().unwrap_or_default();
        let has_more = idx + 1 < self.pages.len();
        Ok(SnapshotPage {
            nodes,
            next_cursor: has_more.then(|| Cursor((idx + 1).to_string())),
            has_more,
        })
    }

    async fn fetch_node(
        &self,
        _share_id: &ShareId,
        node_id: &NodeId,
    ) -> IndexerResult<HierarchyNode> {
        self.fetch_node_calls.fetch_add(1, Ordering::SeqCst);
        self.nodes
            .get(node_id)
            .cloned()
            .ok_or_else(|| IndexerError::Transport(format!("node {node_id} not found")))
    }

    async fn latest_cursor(&self, _share_id: &ShareId) -> IndexerResult<Cursor> {
        Ok(Cursor::from("baseline"))
    }

    async fn events_since(&self, _share_id: &ShareId, cursor: &Cursor) -> IndexerResult<EventPage> {
        if self.fail_events.load(Ordering::SeqCst) {
            return Err(IndexerError::Transport("injected event failure".to_string()));
        }
        let next = self.events.lock().unwrap().pop_front();
        Ok(next.unwrap_or(EventPage {
            events: Vec::new(),
            next_cursor: cursor.clone(),
            has_more: false,
            refresh_required: false,
        }))
    }
}

/// Cipher wrapper that tracks how many decrypt operations run concurrently.
#[derive(Default)]
pub struct CountingCipher {
    inner: EnvelopeCipher,
    current: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub name_calls: AtomicUsize,
    pub unwrap_calls: AtomicUsize,
}

impl CountingCipher {
    pub fn total_calls(&self) -> usize {
        self.name_calls.load(Ordering::SeqCst) + self.unwrap_calls.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl NodeCipher for CountingCipher {
    async fn unwrap_node_key(
        &self,
        wrapped: &WrappedNodeKey,
        parent_key: &SecretKey,
    ) -> CryptoResult<SecretKey> {
        self.unwrap_calls.fetch_add(1, Ordering::SeqCst);
        self.enter();
        tokio::time::sleep(Duration::from_millis(2)).await;
        let result = self.inner.unwrap_node_key(wrapped, parent_key).await;
        self.exit();
        result
    }

    async fn decrypt_name(
        &self,
        name: &EncryptedName,
        parent_key: &SecretKey,
    ) -> CryptoResult<String> {
        self.name_calls.fetch_add(1, Ordering::SeqCst);
        self.enter();
        tokio::time::sleep(Duration::from_millis(2)).await;
        let result = self.inner.decrypt_name(name, parent_key).await;
        self.exit();
        result
    }
}
