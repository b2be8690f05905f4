use std::fmt;
use std::ops::BitOr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::service::ServiceRoot;
use crate::util::strip_control_chars;

// ============================================================================
// Identity
// ============================================================================

/// Stable identity of a node inside one tree.
///
/// Ids are never reused, so an id that outlives its node simply stops
/// resolving instead of aliasing a newer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Raw value, as written into drag payloads.
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Discriminator of the node variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    ServiceRoot,
    Category,
    Feed,
    RecycleBin,
}

// ============================================================================
// Messages
// ============================================================================

/// A single message (article) owned by a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub contents: String,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Message {
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            url: None,
            author: None,
            contents: String::new(),
            created: Utc::now(),
            is_read: false,
            is_deleted: false,
        }
    }

    pub fn read(mut self) -> Self {
        self.is_read = true;
        self
    }

    pub fn with_contents(mut self, contents: impl Into<String>) -> Self {
        self.contents = contents.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Read status applied by bulk mark operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    Read,
    Unread,
}

/// Outcome of the last fetch of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedStatus {
    #[default]
    Normal,
    NewMessages,
    NetworkError,
    ParseError,
    OtherError,
}

// ============================================================================
// Scheduled Updates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoUpdateType {
    DontAutoUpdate,
    #[default]
    DefaultAutoUpdate,
    SpecificAutoUpdate,
}

/// Auto-update policy of a feed. Intervals are counted in scheduler ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AutoUpdate {
    pub kind: AutoUpdateType,
    pub initial_interval: i32,
    pub remaining_interval: i32,
}

impl AutoUpdate {
    pub fn never() -> Self {
        Self {
            kind: AutoUpdateType::DontAutoUpdate,
            ..Self::default()
        }
    }

    pub fn every(interval: i32) -> Self {
        Self {
            kind: AutoUpdateType::SpecificAutoUpdate,
            initial_interval: interval,
            remaining_interval: interval,
        }
    }
}

// ============================================================================
// Variant Data
// ============================================================================

/// Data carried by a feed node.
#[derive(Debug, Clone, Default)]
pub struct FeedData {
    pub url: String,
    pub status: FeedStatus,
    pub auto_update: AutoUpdate,
    pub messages: Vec<Message>,
}

/// An account node: the subtree boundary owned by one service.
pub struct Account {
    pub(crate) service: Box<dyn ServiceRoot>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("code", &self.service.code())
            .finish_non_exhaustive()
    }
}

/// Per-variant payload of a node.
#[derive(Debug)]
pub enum NodeData {
    Root,
    Account(Account),
    Category,
    Feed(FeedData),
    RecycleBin,
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Root => NodeKind::Root,
            NodeData::Account(_) => NodeKind::ServiceRoot,
            NodeData::Category => NodeKind::Category,
            NodeData::Feed(_) => NodeKind::Feed,
            NodeData::RecycleBin => NodeKind::RecycleBin,
        }
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// View-facing item flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemFlags {
    pub selectable: bool,
    pub enabled: bool,
    pub drag_enabled: bool,
    pub drop_enabled: bool,
}

impl ItemFlags {
    pub const NONE: ItemFlags = ItemFlags {
        selectable: false,
        enabled: false,
        drag_enabled: false,
        drop_enabled: false,
    };

    pub const BASE: ItemFlags = ItemFlags {
        selectable: true,
        enabled: true,
        drag_enabled: false,
        drop_enabled: false,
    };
}

impl BitOr for ItemFlags {
    type Output = ItemFlags;

    fn bitor(self, rhs: ItemFlags) -> ItemFlags {
        ItemFlags {
            selectable: self.selectable || rhs.selectable,
            enabled: self.enabled || rhs.enabled,
            drag_enabled: self.drag_enabled || rhs.drag_enabled,
            drop_enabled: self.drop_enabled || rhs.drop_enabled,
        }
    }
}

impl NodeKind {
    /// Human-readable kind name for log lines and listings.
    pub fn label(self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::ServiceRoot => "account",
            NodeKind::Category => "category",
            NodeKind::Feed => "feed",
            NodeKind::RecycleBin => "recycle bin",
        }
    }

    /// Whether a node of this kind may be moved under another parent.
    pub fn supports_reparenting(self) -> bool {
        matches!(self, NodeKind::Category | NodeKind::Feed)
    }

    /// Whether nodes may be dropped onto a node of this kind.
    pub fn accepts_children(self) -> bool {
        matches!(self, NodeKind::ServiceRoot | NodeKind::Category)
    }

    /// Whether the node keeps its own cached message counts.
    pub fn owns_messages(self) -> bool {
        matches!(self, NodeKind::Feed | NodeKind::RecycleBin)
    }

    /// Whether counts of this node roll up into its parent.
    ///
    /// Bin contents are deleted messages and never inflate account totals.
    pub fn contributes_to_parent_counts(self) -> bool {
        self != NodeKind::RecycleBin
    }

    pub fn additional_flags(self) -> ItemFlags {
        ItemFlags {
            drag_enabled: self.supports_reparenting(),
            drop_enabled: self.accepts_children(),
            ..ItemFlags::NONE
        }
    }
}

// ============================================================================
// Node
// ============================================================================

/// One entry of the feed hierarchy.
#[derive(Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) title: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) unread_count: usize,
    pub(crate) total_count: usize,
    pub(crate) data: NodeData,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Cached unread count; meaningful for message-owning nodes only.
    pub fn unread_count(&self) -> usize {
        self.unread_count
    }

    /// Cached total count; meaningful for message-owning nodes only.
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn feed(&self) -> Option<&FeedData> {
        match &self.data {
            NodeData::Feed(feed) => Some(feed),
            _ => None,
        }
    }

    pub(crate) fn feed_mut(&mut self) -> Option<&mut FeedData> {
        match &mut self.data {
            NodeData::Feed(feed) => Some(feed),
            _ => None,
        }
    }

    /// Code of the owning service, for account nodes.
    pub fn service_code(&self) -> Option<&str> {
        match &self.data {
            NodeData::Account(account) => Some(account.service.code()),
            _ => None,
        }
    }
}

// ============================================================================
// Seeds
// ============================================================================

/// Description of a non-account subtree waiting to be inserted into a tree.
#[derive(Debug)]
pub struct NodeSeed {
    pub(crate) title: String,
    pub(crate) data: NodeData,
    pub(crate) children: Vec<NodeSeed>,
}

impl NodeSeed {
    fn new(title: &str, data: NodeData) -> Self {
        Self {
            title: strip_control_chars(title).trim().to_owned(),
            data,
            children: Vec::new(),
        }
    }

    pub fn category(title: &str) -> Self {
        Self::new(title, NodeData::Category)
    }

    pub fn feed(title: &str, url: &str) -> Self {
        Self::new(
            title,
            NodeData::Feed(FeedData {
                url: url.to_owned(),
                ..FeedData::default()
            }),
        )
    }

    pub fn recycle_bin(title: &str) -> Self {
        Self::new(title, NodeData::RecycleBin)
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    /// Appends a child seed. Children are ignored for kinds that cannot hold any.
    pub fn with_child(mut self, child: NodeSeed) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = NodeSeed>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        if let NodeData::Feed(feed) = &mut self.data {
            feed.messages.extend(messages);
        }
        self
    }

    pub fn with_status(mut self, status: FeedStatus) -> Self {
        if let NodeData::Feed(feed) = &mut self.data {
            feed.status = status;
        }
        self
    }

    pub fn with_auto_update(mut self, auto_update: AutoUpdate) -> Self {
        if let NodeData::Feed(feed) = &mut self.data {
            feed.auto_update = auto_update;
        }
        self
    }
}

/// Description of an account subtree, as produced by a service entry point.
pub struct AccountSeed {
    pub(crate) title: String,
    pub(crate) service: Box<dyn ServiceRoot>,
    pub(crate) children: Vec<NodeSeed>,
}

impl AccountSeed {
    pub fn new(title: &str, service: Box<dyn ServiceRoot>) -> Self {
        Self {
            title: strip_control_chars(title).trim().to_owned(),
            service,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: NodeSeed) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = NodeSeed>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn code(&self) -> &str {
        self.service.code()
    }
}

impl fmt::Debug for AccountSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountSeed")
            .field("title", &self.title)
            .field("code", &self.service.code())
            .field("children", &self.children)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_by_kind() {
        assert!(NodeKind::Feed.supports_reparenting());
        assert!(NodeKind::Category.supports_reparenting());
        assert!(!NodeKind::ServiceRoot.supports_reparenting());
        assert!(!NodeKind::RecycleBin.supports_reparenting());

        assert!(NodeKind::Category.accepts_children());
        assert!(NodeKind::ServiceRoot.accepts_children());
        assert!(!NodeKind::Feed.accepts_children());
        assert!(!NodeKind::Root.accepts_children());
    }

    #[test]
    fn test_flags_combine() {
        let flags = ItemFlags::BASE | NodeKind::Category.additional_flags();
        assert!(flags.selectable && flags.enabled);
        assert!(flags.drag_enabled && flags.drop_enabled);

        let flags = ItemFlags::BASE | NodeKind::RecycleBin.additional_flags();
        assert!(!flags.drag_enabled && !flags.drop_enabled);
    }

    #[test]
    fn test_seed_title_is_sanitized() {
        let seed = NodeSeed::category("  \x1b[31mNews\x1b[0m ");
        assert_eq!(seed.title, "News");
    }

    #[test]
    fn test_feed_builders_ignored_on_categories() {
        let seed = NodeSeed::category("Tech").with_messages([Message::new(1, "x")]);
        assert!(matches!(seed.data, NodeData::Category));
    }
}
