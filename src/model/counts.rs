use super::events::ModelEvent;
use super::index::{Position, COUNTS_COLUMN, TITLE_COLUMN};
use super::node::{Message, NodeId, NodeKind, ReadStatus};
use super::tree::FeedTree;
use super::FeedsModel;

impl FeedTree {
    /// Unread messages of `id` and everything below it.
    pub fn count_of_unread_messages(&self, id: NodeId) -> usize {
        self.aggregate(id, |node| node.unread_count)
    }

    /// Messages of `id` and everything below it.
    pub fn count_of_all_messages(&self, id: NodeId) -> usize {
        self.aggregate(id, |node| node.total_count)
    }

    fn aggregate(&self, id: NodeId, own: fn(&super::node::Node) -> usize) -> usize {
        let Some(node) = self.get(id) else {
            return 0;
        };
        if node.kind().owns_messages() {
            return own(node);
        }
        node.children()
            .iter()
            .filter(|child| {
                self.kind(**child)
                    .is_some_and(NodeKind::contributes_to_parent_counts)
            })
            .map(|child| self.aggregate(*child, own))
            .sum()
    }

    /// Recomputes cached counts of every message-owning node under `id`.
    ///
    /// Feeds count their undeleted messages; a recycle bin counts the deleted
    /// messages of its account's feeds. Totals are only touched when
    /// `including_total` is set.
    pub(crate) fn update_counts(&mut self, id: NodeId, including_total: bool) {
        for member in self.subtree(id) {
            let counts = match self.kind(member) {
                Some(NodeKind::Feed) => self
                    .get(member)
                    .and_then(|node| node.feed())
                    .map(|feed| tally(feed.messages.iter().filter(|m| !m.is_deleted))),
                Some(NodeKind::RecycleBin) => {
                    let account = self.service_root_of(member);
                    let deleted = account
                        .map(|account| self.subtree_feeds(account))
                        .unwrap_or_default()
                        .into_iter()
                        .filter_map(|feed| self.get(feed).and_then(|node| node.feed()))
                        .flat_map(|feed| feed.messages.iter().filter(|m| m.is_deleted))
                        .cloned()
                        .collect::<Vec<_>>();
                    Some(tally(deleted.iter()))
                }
                _ => None,
            };

            if let (Some((unread, total)), Some(node)) = (counts, self.get_mut(member)) {
                node.unread_count = unread;
                if including_total {
                    node.total_count = total;
                }
            }
        }
    }
}

fn tally<'a>(messages: impl Iterator<Item = &'a Message>) -> (usize, usize) {
    messages.fold((0, 0), |(unread, total), message| {
        (unread + usize::from(!message.is_read), total + 1)
    })
}

impl FeedsModel {
    pub fn count_of_all_messages(&self) -> usize {
        self.tree.count_of_all_messages(self.tree.root())
    }

    pub fn count_of_unread_messages(&self) -> usize {
        self.tree.count_of_unread_messages(self.tree.root())
    }

    pub fn has_any_feed_new_messages(&self) -> bool {
        self.tree
            .subtree_feeds(self.tree.root())
            .into_iter()
            .filter_map(|feed| self.tree.get(feed).and_then(|node| node.feed()))
            .any(|feed| feed.status == super::node::FeedStatus::NewMessages)
    }

    /// Recomputes every count, refreshes the whole layout and announces the
    /// new aggregate.
    pub fn reload_counts_of_whole_model(&mut self) {
        let root = self.tree.root();
        self.tree.update_counts(root, true);
        self.reload_whole_layout();
        self.notify_with_counts();
    }

    pub fn notify_with_counts(&self) {
        self.emit(ModelEvent::CountsChanged {
            unread: self.count_of_unread_messages(),
            has_new: self.has_any_feed_new_messages(),
        });
    }

    pub fn reload_whole_layout(&self) {
        self.emit(ModelEvent::LayoutAboutToBeChanged);
        self.emit(ModelEvent::LayoutChanged);
    }

    /// Tells the view which rows changed after a data update.
    ///
    /// Above the reload threshold a single full layout refresh is emitted;
    /// otherwise each item's row and every ancestor row are marked changed,
    /// since aggregated counts propagate upward. Ends with the counts signal.
    pub fn notify_after_change(&mut self, items: &[NodeId]) {
        if items.len() > self.reload_threshold {
            tracing::debug!(
                items = items.len(),
                threshold = self.reload_threshold,
                "Reloading feed model fully"
            );
            self.reload_whole_layout();
        } else {
            tracing::debug!(items = items.len(), "Reloading feed model items individually");
            for item in items {
                self.reload_changed_item(*item);
            }
        }
        self.notify_with_counts();
    }

    /// Marks the row of `item` and the rows of all its ancestors as changed.
    pub fn reload_changed_item(&self, item: NodeId) {
        let mut current: Option<Position> = self.tree.position_for(item);
        while let Some(position) = current {
            let parent = self.tree.parent_position(&position);
            let cells = (
                self.tree.index(position.row(), TITLE_COLUMN, parent.as_ref()),
                self.tree.index(position.row(), COUNTS_COLUMN, parent.as_ref()),
            );
            if let (Some(top_left), Some(bottom_right)) = cells {
                self.emit(ModelEvent::DataChanged {
                    top_left,
                    bottom_right,
                });
            }
            current = parent;
        }
    }

    // ========================================================================
    // Messages
    // ========================================================================

    /// Undeleted messages under `item`; for a recycle bin, its deleted ones.
    pub fn messages_for_item(&self, item: NodeId) -> Vec<Message> {
        let (feeds, want_deleted) = match self.tree.kind(item) {
            Some(NodeKind::RecycleBin) => (
                self.tree
                    .service_root_of(item)
                    .map(|account| self.tree.subtree_feeds(account))
                    .unwrap_or_default(),
                true,
            ),
            Some(_) => (self.tree.subtree_feeds(item), false),
            None => return Vec::new(),
        };

        feeds
            .into_iter()
            .filter_map(|feed| self.tree.get(feed).and_then(|node| node.feed()))
            .flat_map(|feed| feed.messages.iter())
            .filter(|message| message.is_deleted == want_deleted)
            .cloned()
            .collect()
    }

    /// All feeds under the node at `position` (the whole tree for `None`).
    pub fn feeds_for_position(&self, position: Option<&Position>) -> Vec<NodeId> {
        self.tree.subtree_feeds(self.tree.node_for(position))
    }

    /// Marks every undeleted message under `item` read or unread.
    ///
    /// Returns whether any message changed.
    pub fn mark_item_read(&mut self, item: NodeId, status: ReadStatus) -> bool {
        let read = status == ReadStatus::Read;
        self.change_messages(item, |message| {
            if message.is_deleted || message.is_read == read {
                return false;
            }
            message.is_read = read;
            true
        })
    }

    /// Moves messages under `item` to the recycle bin, only read ones when
    /// `clean_read_only` is set. Returns whether any message changed.
    pub fn mark_item_cleared(&mut self, item: NodeId, clean_read_only: bool) -> bool {
        self.change_messages(item, |message| {
            if message.is_deleted || (clean_read_only && !message.is_read) {
                return false;
            }
            message.is_deleted = true;
            true
        })
    }

    fn change_messages(&mut self, item: NodeId, mut change: impl FnMut(&mut Message) -> bool) -> bool {
        let mut changed = false;
        for feed in self.tree.subtree_feeds(item) {
            if let Some(data) = self.tree.get_mut(feed).and_then(|node| node.feed_mut()) {
                for message in &mut data.messages {
                    changed |= change(message);
                }
            }
        }
        if !changed {
            return false;
        }

        let scope = self.tree.service_root_of(item).unwrap_or(item);
        self.tree.update_counts(scope, true);
        let mut touched = self.tree.subtree_feeds(item);
        touched.extend(
            self.tree
                .subtree(scope)
                .into_iter()
                .filter(|node| self.tree.kind(*node) == Some(NodeKind::RecycleBin)),
        );
        self.notify_after_change(&touched);
        true
    }
}
