//! Shared identifiers and data model for cryptdrive.
//!
//! Everything the indexer, crypto layer, and external collaborators exchange
//! lives here: node and share identifiers, the encrypted hierarchy node as
//! the remote returns it, the decrypted searchable item the index stores,
//! and the raw change events that keep the index warm after the initial
//! build.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one remote hierarchy ("share"). Opaque to this codebase.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareId(pub String);

impl ShareId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShareId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of one node (file or folder) within a share.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Share-scoped item identifier: the same node id can appear in two shares,
/// so the index keys items by the pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId {
    pub share_id: ShareId,
    pub node_id: NodeId,
}

impl ItemId {
    pub fn new(share_id: ShareId, node_id: NodeId) -> Self {
        Self { share_id, node_id }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.share_id, self.node_id)
    }
}

/// Opaque position in a share's event stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(pub String);

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Cursor {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Node type. Closed set — the remote knows no other kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

/// Anonymous envelope: ciphertext sealed to a recipient X25519 public key
/// with an ephemeral sender keypair. Used for wrapped folder keys.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SealedEnvelope {
    /// Ephemeral X25519 public key (sender side of DH).
    pub ephemeral_public_key: [u8; 32],
    /// XSalsa20 nonce (24 bytes).
    pub nonce: [u8; 24],
    /// Ciphertext plus Poly1305 tag.
    pub ciphertext: Vec<u8>,
}

/// A node's display name, encrypted with ChaCha20-Poly1305 under a name key
/// derived from the parent folder's node key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EncryptedName {
    /// ChaCha20 nonce (12 bytes).
    pub nonce: [u8; 12],
    /// Ciphertext plus Poly1305 tag.
    pub ciphertext: Vec<u8>,
}

/// A folder's node key, sealed to the parent folder's public key.
///
/// `key_digest` is the ownership material accompanying the wrap: a SHA-256
/// digest of the plaintext key, checked after unsealing so a wrong or
/// tampered wrap is rejected even if the AEAD tag happens to verify.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WrappedNodeKey {
    pub envelope: SealedEnvelope,
    pub key_digest: [u8; 32],
}

/// One node of the remote hierarchy, exactly as the remote returns it.
///
/// The name is encrypted under the parent's key; folders additionally carry
/// their own wrapped node key. A node may arrive key-only (no name), in
/// which case it feeds the key chain but produces no searchable item.
/// Read-only to this subsystem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub id: NodeId,
    /// `None` only for the share root.
    pub parent_id: Option<NodeId>,
    pub kind: NodeKind,
    pub name: Option<EncryptedName>,
    /// Present iff `kind == Folder`.
    pub wrapped_key: Option<WrappedNodeKey>,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl HierarchyNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }
}

/// A decrypted, ready-to-store searchable item. Owned by the external index
/// once emitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchableItem {
    pub id: ItemId,
    pub name: String,
    pub kind: NodeKind,
    pub parent_id: Option<NodeId>,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Monotonic per-session ordering key for stable pagination in the
    /// external index.
    pub order: u64,
}

/// Kind of a raw hierarchy-change event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

/// One raw change event from the remote event stream.
///
/// Invariant: `node` is `None` exactly when `kind == Delete`; delete events
/// must never be routed through decryption.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawChangeEvent {
    pub kind: ChangeKind,
    pub node_id: NodeId,
    pub parent_id: Option<NodeId>,
    pub node: Option<HierarchyNode>,
}

impl RawChangeEvent {
    /// True when the event carries the metadata its kind requires.
    pub fn is_well_formed(&self) -> bool {
        match self.kind {
            ChangeKind::Delete => self.node.is_none(),
            ChangeKind::Create | ChangeKind::Update => self.node.is_some(),
        }
    }
}

/// A mutation to apply to the external index. Dedicated closed set — not
/// borrowed from any other event domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ItemMutation {
    Create(SearchableItem),
    Update(SearchableItem),
    Delete(ItemId),
}

impl ItemMutation {
    pub fn item_id(&self) -> &ItemId {
        match self {
            ItemMutation::Create(item) | ItemMutation::Update(item) => &item.id,
            ItemMutation::Delete(id) => id,
        }
    }
}

/// One page of the hierarchy snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotPage {
    pub nodes: Vec<HierarchyNode>,
    pub next_cursor: Option<Cursor>,
    pub has_more: bool,
}

/// One page of raw change events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventPage {
    pub events: Vec<RawChangeEvent>,
    pub next_cursor: Cursor,
    pub has_more: bool,
    /// The server invalidated our cursor; the consumer must discard it and
    /// rebuild from a fresh snapshot.
    pub refresh_required: bool,
}
