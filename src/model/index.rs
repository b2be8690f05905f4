use super::node::{ItemFlags, NodeId};
use super::tree::{FeedTree, TreeId};

/// Number of logical columns: title and counts.
pub const COLUMN_COUNT: usize = 2;
pub const TITLE_COLUMN: usize = 0;
pub const COUNTS_COLUMN: usize = 1;

/// Icon shown in the counts column header.
pub const COUNTS_ICON: &str = "mail-mark-unread";

const HEADER_TITLES: [Option<&str>; COLUMN_COUNT] = [Some("Title"), None];
const HEADER_TOOLTIPS: [&str; COLUMN_COUNT] = [
    "Titles of feeds/categories.",
    "Counts of unread/all mesages.",
];

/// Transient (row, column, node) coordinate handed to the view layer.
///
/// A position is only meaningful until the next structural mutation of the
/// tree that produced it; after that it resolves to the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    row: usize,
    column: usize,
    node: NodeId,
    tree: TreeId,
    generation: u64,
}

impl Position {
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn node(&self) -> NodeId {
        self.node
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Display,
    ToolTip,
    Decoration,
}

/// Header cell content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderData {
    Text(&'static str),
    Icon(&'static str),
}

impl FeedTree {
    fn make_position(&self, row: usize, column: usize, node: NodeId) -> Position {
        Position {
            row,
            column,
            node,
            tree: self.tree_id(),
            generation: self.generation(),
        }
    }

    /// Whether `position` was produced by this tree and no mutation happened since.
    pub fn is_current(&self, position: &Position) -> bool {
        position.tree == self.tree_id()
            && position.generation == self.generation()
            && self.contains(position.node)
    }

    /// Node at `position`; the root for `None` or any position not current
    /// in this tree.
    pub fn node_for(&self, position: Option<&Position>) -> NodeId {
        match position {
            Some(position) if self.is_current(position) => position.node,
            _ => self.root(),
        }
    }

    pub fn column_count(&self) -> usize {
        COLUMN_COUNT
    }

    /// Children under `parent`; 0 for positions outside the first column.
    pub fn row_count(&self, parent: Option<&Position>) -> usize {
        match parent {
            Some(position) if position.column > 0 => 0,
            _ => self.child_count(self.node_for(parent)),
        }
    }

    /// Position of the child at (`row`, `column`) under `parent`.
    pub fn index(&self, row: usize, column: usize, parent: Option<&Position>) -> Option<Position> {
        if column >= COLUMN_COUNT || row >= self.row_count(parent) {
            return None;
        }
        let parent_node = self.node_for(parent);
        let child = self.child(parent_node, row)?;
        Some(self.make_position(row, column, child))
    }

    /// Position of the parent of the node at `child`; `None` when that
    /// parent is the root.
    pub fn parent_position(&self, child: &Position) -> Option<Position> {
        if !self.is_current(child) {
            return None;
        }
        let parent = self.parent(child.node)?;
        if parent == self.root() {
            return None;
        }
        let row = self.row_of(parent)?;
        Some(self.make_position(row, TITLE_COLUMN, parent))
    }

    /// Position of `id` in the first column.
    ///
    /// Walks the ancestor chain up to the root, then descends resolving each
    /// level's row by linear search. `None` for the root and unknown nodes.
    pub fn position_for(&self, id: NodeId) -> Option<Position> {
        if id == self.root() || !self.contains(id) {
            return None;
        }

        let mut chain = Vec::new();
        let mut current = id;
        while current != self.root() {
            chain.push(current);
            current = self.parent(current)?;
        }

        let mut target: Option<Position> = None;
        while let Some(item) = chain.pop() {
            let row = self.row_of(item)?;
            target = Some(self.index(row, TITLE_COLUMN, target.as_ref())?);
        }
        target
    }

    pub fn header_data(
        &self,
        section: usize,
        orientation: Orientation,
        role: Role,
    ) -> Option<HeaderData> {
        if orientation != Orientation::Horizontal || section >= COLUMN_COUNT {
            return None;
        }
        match role {
            Role::Display => HEADER_TITLES[section].map(HeaderData::Text),
            Role::ToolTip => Some(HeaderData::Text(HEADER_TOOLTIPS[section])),
            Role::Decoration if section == COUNTS_COLUMN => Some(HeaderData::Icon(COUNTS_ICON)),
            Role::Decoration => None,
        }
    }

    /// Base flags combined with the flags the node's variant adds.
    pub fn flags(&self, position: Option<&Position>) -> ItemFlags {
        let node = self.node_for(position);
        let additional = self
            .kind(node)
            .map(|kind| kind.additional_flags())
            .unwrap_or(ItemFlags::NONE);
        ItemFlags::BASE | additional
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::{AccountSeed, NodeSeed};
    use crate::model::service::tests::NullService;
    use pretty_assertions::assert_eq;

    fn sample() -> (FeedTree, NodeId, NodeId, NodeId) {
        let mut tree = FeedTree::new("Root");
        let account =
            tree.append_account(AccountSeed::new("Local", Box::new(NullService::new("std"))));
        let category = tree.append_seed(account, NodeSeed::category("News")).unwrap();
        tree.append_seed(category, NodeSeed::feed("First", "https://a.example/rss"))
            .unwrap();
        let feed = tree
            .append_seed(category, NodeSeed::feed("Second", "https://b.example/rss"))
            .unwrap();
        (tree, account, category, feed)
    }

    #[test]
    fn test_root_has_no_position() {
        let (tree, ..) = sample();
        assert_eq!(tree.position_for(tree.root()), None);
        assert_eq!(tree.node_for(None), tree.root());
    }

    #[test]
    fn test_position_for_resolves_rows() {
        let (tree, _, category, feed) = sample();
        let pos = tree.position_for(feed).unwrap();
        assert_eq!(pos.row(), 1);
        assert_eq!(pos.column(), TITLE_COLUMN);
        assert_eq!(tree.node_for(Some(&pos)), feed);

        let parent = tree.parent_position(&pos).unwrap();
        assert_eq!(parent.node(), category);
        assert_eq!(parent.row(), 0);
    }

    #[test]
    fn test_parent_of_account_is_invalid() {
        let (tree, account, ..) = sample();
        let pos = tree.position_for(account).unwrap();
        assert_eq!(tree.parent_position(&pos), None);
    }

    #[test]
    fn test_row_count_is_zero_past_first_column() {
        let (tree, _, category, _) = sample();
        let pos = tree.position_for(category).unwrap();
        assert_eq!(tree.row_count(Some(&pos)), 2);

        let counts = tree
            .index(pos.row(), COUNTS_COLUMN, tree.parent_position(&pos).as_ref())
            .unwrap();
        assert_eq!(tree.row_count(Some(&counts)), 0);
    }

    #[test]
    fn test_index_rejects_out_of_range() {
        let (tree, ..) = sample();
        assert_eq!(tree.index(5, 0, None), None);
        assert_eq!(tree.index(0, COLUMN_COUNT, None), None);
    }

    #[test]
    fn test_stale_position_resolves_to_root() {
        let (mut tree, account, _, feed) = sample();
        let pos = tree.position_for(feed).unwrap();
        tree.append_seed(account, NodeSeed::category("Later")).unwrap();
        assert!(!tree.is_current(&pos));
        assert_eq!(tree.node_for(Some(&pos)), tree.root());
    }

    #[test]
    fn test_foreign_position_resolves_to_root() {
        let (tree, _, _, feed) = sample();
        let (other, ..) = sample();
        let pos = other.position_for(feed).unwrap();
        assert_eq!(tree.node_for(Some(&pos)), tree.root());
    }

    #[test]
    fn test_header_data() {
        let (tree, ..) = sample();
        assert_eq!(
            tree.header_data(TITLE_COLUMN, Orientation::Horizontal, Role::Display),
            Some(HeaderData::Text("Title"))
        );
        assert_eq!(
            tree.header_data(COUNTS_COLUMN, Orientation::Horizontal, Role::Display),
            None
        );
        assert_eq!(
            tree.header_data(COUNTS_COLUMN, Orientation::Horizontal, Role::Decoration),
            Some(HeaderData::Icon(COUNTS_ICON))
        );
        assert_eq!(
            tree.header_data(TITLE_COLUMN, Orientation::Horizontal, Role::ToolTip),
            Some(HeaderData::Text("Titles of feeds/categories."))
        );
        assert_eq!(
            tree.header_data(TITLE_COLUMN, Orientation::Vertical, Role::Display),
            None
        );
    }

    #[test]
    fn test_flags_follow_node_kind() {
        let (tree, account, category, feed) = sample();
        let feed_flags = tree.flags(tree.position_for(feed).as_ref());
        assert!(feed_flags.drag_enabled);
        assert!(!feed_flags.drop_enabled);

        let category_flags = tree.flags(tree.position_for(category).as_ref());
        assert!(category_flags.drag_enabled && category_flags.drop_enabled);

        let account_flags = tree.flags(tree.position_for(account).as_ref());
        assert!(!account_flags.drag_enabled && account_flags.drop_enabled);
    }
}
