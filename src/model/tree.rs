use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::node::{Account, AccountSeed, Node, NodeData, NodeId, NodeKind, NodeSeed};
use super::service::ServiceRoot;

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a tree instance, stamped into positions it hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(u64);

/// Nodes taken out of the tree by a removal, waiting to be released.
#[derive(Debug)]
pub struct DetachedSubtree {
    pub(crate) nodes: Vec<Node>,
}

impl DetachedSubtree {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Releases the nodes. Accounts among them are stopped first.
    pub(crate) fn release(mut self) -> usize {
        let count = self.nodes.len();
        for node in &mut self.nodes {
            if let NodeData::Account(account) = &mut node.data {
                account.service.stop();
            }
        }
        count
    }
}

/// Root-owned n-ary tree of feed nodes.
///
/// Every node lives in one arena keyed by [`NodeId`]; parent links are plain
/// ids and never own anything. Structural mutations bump a generation counter
/// so stale positions can be detected.
#[derive(Debug)]
pub struct FeedTree {
    id: TreeId,
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    next_id: usize,
    generation: u64,
}

impl FeedTree {
    pub fn new(root_title: &str) -> Self {
        let root = NodeId::from_raw(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                id: root,
                title: root_title.to_owned(),
                parent: None,
                children: Vec::new(),
                unread_count: 0,
                total_count: 0,
                data: NodeData::Root,
            },
        );

        Self {
            id: TreeId(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed)),
            nodes,
            root,
            next_id: 1,
            generation: 0,
        }
    }

    pub fn tree_id(&self) -> TreeId {
        self.id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Counter bumped on every insert, removal and move.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // The root is always present.
        false
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.get(id).map(Node::kind)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(Node::parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(Node::children).unwrap_or(&[])
    }

    pub fn child(&self, parent: NodeId, row: usize) -> Option<NodeId> {
        self.children(parent).get(row).copied()
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    /// Row of `id` within its parent, found by linear search.
    pub fn row_of(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|child| *child == id)
    }

    /// Whether `ancestor` lies on the parent chain of `id` (or is `id`).
    pub fn is_ancestor_of(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// The account whose subtree contains `id`, if any.
    pub fn service_root_of(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.kind(node) == Some(NodeKind::ServiceRoot) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// All nodes of the subtree rooted at `id`, in pre-order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// All feeds in the subtree rooted at `id`, in display order.
    pub fn subtree_feeds(&self, id: NodeId) -> Vec<NodeId> {
        self.subtree(id)
            .into_iter()
            .filter(|node| self.kind(*node) == Some(NodeKind::Feed))
            .collect()
    }

    /// Accounts directly under the root, in row order.
    pub fn accounts(&self) -> Vec<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .filter(|id| self.kind(*id) == Some(NodeKind::ServiceRoot))
            .collect()
    }

    pub(crate) fn service_mut(&mut self, id: NodeId) -> Option<&mut dyn ServiceRoot> {
        match &mut self.nodes.get_mut(&id)?.data {
            NodeData::Account(account) => Some(account.service.as_mut()),
            _ => None,
        }
    }

    // ========================================================================
    // Structural Mutations
    // ========================================================================

    fn allocate(&mut self, title: String, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId::from_raw(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                id,
                title,
                parent: Some(parent),
                children: Vec::new(),
                unread_count: 0,
                total_count: 0,
                data,
            },
        );
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.push(id);
        }
        id
    }

    /// Appends an account under the root, together with its initial subtree.
    pub(crate) fn append_account(&mut self, seed: AccountSeed) -> NodeId {
        let AccountSeed {
            title,
            service,
            children,
        } = seed;
        let root = self.root;
        let id = self.allocate(title, root, NodeData::Account(Account { service }));
        for child in children {
            self.insert_seed(id, child);
        }
        self.update_counts(id, true);
        self.generation += 1;
        id
    }

    /// Appends `seed` (recursively) as the last child of `parent`.
    ///
    /// Returns `None` when the parent is unknown or cannot hold children.
    /// Only accounts hang directly off the root.
    pub(crate) fn append_seed(&mut self, parent: NodeId, seed: NodeSeed) -> Option<NodeId> {
        if !self.kind(parent).is_some_and(NodeKind::accepts_children) {
            return None;
        }
        let id = self.insert_seed(parent, seed);
        let scope = self.service_root_of(id).unwrap_or(id);
        self.update_counts(scope, true);
        self.generation += 1;
        Some(id)
    }

    fn insert_seed(&mut self, parent: NodeId, seed: NodeSeed) -> NodeId {
        let NodeSeed {
            title,
            data,
            children,
        } = seed;
        let holds_children = data.kind().accepts_children();
        let id = self.allocate(title, parent, data);
        if holds_children {
            for child in children {
                self.insert_seed(id, child);
            }
        }
        id
    }

    /// Unlinks `id` from its parent's children, returning the former row.
    pub(crate) fn unlink(&mut self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        let row = self.row_of(id)?;
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.remove(row);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
        self.generation += 1;
        Some(row)
    }

    /// Appends an unlinked node to `new_parent`'s children, returning its row.
    pub(crate) fn link(&mut self, id: NodeId, new_parent: NodeId) -> Option<usize> {
        if !self.contains(id) || self.parent(id).is_some() {
            return None;
        }
        let parent_node = self.nodes.get_mut(&new_parent)?;
        parent_node.children.push(id);
        let row = parent_node.children.len() - 1;
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = Some(new_parent);
        }
        self.generation += 1;
        Some(row)
    }

    /// Unlinks `id` and takes its whole subtree out of the arena.
    pub(crate) fn detach(&mut self, id: NodeId) -> Option<DetachedSubtree> {
        if id == self.root || !self.contains(id) {
            return None;
        }
        let members = self.subtree(id);
        self.unlink(id);
        let nodes = members
            .into_iter()
            .filter_map(|member| self.nodes.remove(&member))
            .collect();
        Some(DetachedSubtree { nodes })
    }

    /// Takes every account out of the tree, leaving only the root.
    pub(crate) fn drain_accounts(&mut self) -> Vec<DetachedSubtree> {
        let accounts = self.children(self.root).to_vec();
        accounts
            .into_iter()
            .filter_map(|account| self.detach(account))
            .collect()
    }
}
