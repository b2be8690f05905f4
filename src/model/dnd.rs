use std::mem::size_of;

use thiserror::Error;

use super::events::{MessageLevel, ModelEvent};
use super::index::{Position, TITLE_COLUMN};
use super::node::{NodeId, NodeKind};
use super::service::MoveRequest;
use super::FeedsModel;

/// MIME type of in-process drag payloads carrying node identities.
pub const MIME_TYPE_ITEM_POINTER: &str = "application/x-feedtree-itempointer";

const RAW_ID_WIDTH: usize = size_of::<usize>();

// ============================================================================
// Payload
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload length {0} is not a whole number of item ids")]
    Truncated(usize),
}

/// Transfer buffer of a drag gesture.
///
/// Node identities are written as native-width integers; the buffer is only
/// meaningful within the process that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragPayload {
    mime_type: String,
    bytes: Vec<u8>,
}

impl DragPayload {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn from_items(items: &[NodeId]) -> Self {
        let bytes = items
            .iter()
            .flat_map(|item| item.get().to_ne_bytes())
            .collect();
        Self::new(MIME_TYPE_ITEM_POINTER, bytes)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Bytes stored under `mime_type`, empty for any other type.
    pub fn data(&self, mime_type: &str) -> &[u8] {
        if self.mime_type == mime_type {
            &self.bytes
        } else {
            &[]
        }
    }

    /// Node identities carried under [`MIME_TYPE_ITEM_POINTER`].
    pub fn items(&self) -> Result<Vec<NodeId>, PayloadError> {
        let data = self.data(MIME_TYPE_ITEM_POINTER);
        if data.len() % RAW_ID_WIDTH != 0 {
            return Err(PayloadError::Truncated(data.len()));
        }
        Ok(data
            .chunks_exact(RAW_ID_WIDTH)
            .map(|chunk| {
                let mut raw = [0u8; RAW_ID_WIDTH];
                raw.copy_from_slice(chunk);
                NodeId::from_raw(usize::from_ne_bytes(raw))
            })
            .collect())
    }
}

// ============================================================================
// Drop Handling
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropAction {
    Ignore,
    Copy,
    Move,
    Link,
}

/// Why a drop was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DropRejection {
    #[error("only move drops are supported")]
    NotAMove,
    #[error("drag payload is empty")]
    EmptyPayload,
    #[error("malformed drag payload: {0}")]
    Malformed(#[from] PayloadError),
    #[error("dragged item {0} is not part of this model")]
    UnknownItem(NodeId),
    #[error("dragged item {0} is the drop target")]
    OntoSelf(NodeId),
    #[error("dragged item {0} is already a child of the drop target")]
    AlreadyChild(NodeId),
    #[error("dragged item {0} belongs to a different account")]
    CrossAccount(NodeId),
}

/// Result of a drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// The ignore action; nothing to do.
    Ignored,
    /// Validation passed; `moved` lists items whose variant accepted the move.
    Applied { moved: Vec<NodeId> },
    /// Validation failed. Items earlier in the payload may already have moved.
    Rejected(DropRejection),
}

impl DropOutcome {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, DropOutcome::Rejected(_))
    }
}

impl FeedsModel {
    pub fn mime_types(&self) -> &'static [&'static str] {
        &[MIME_TYPE_ITEM_POINTER]
    }

    pub fn supported_drop_actions(&self) -> &'static [DropAction] {
        &[DropAction::Move]
    }

    /// Encodes the nodes at `positions` (first column only, never the root).
    pub fn mime_data(&self, positions: &[Position]) -> DragPayload {
        let items: Vec<NodeId> = positions
            .iter()
            .filter(|position| position.column() == TITLE_COLUMN)
            .map(|position| self.tree.node_for(Some(position)))
            .filter(|node| *node != self.tree.root())
            .collect();
        DragPayload::from_items(&items)
    }

    /// Drops the dragged items onto the node at `parent`.
    pub fn drop_mime_data(
        &mut self,
        payload: &DragPayload,
        action: DropAction,
        parent: Option<&Position>,
    ) -> DropOutcome {
        match action {
            DropAction::Ignore => return DropOutcome::Ignored,
            DropAction::Move => {}
            _ => return DropOutcome::Rejected(DropRejection::NotAMove),
        }

        let items = match payload.items() {
            Ok(items) if items.is_empty() => {
                return DropOutcome::Rejected(DropRejection::EmptyPayload)
            }
            Ok(items) => items,
            Err(err) => return DropOutcome::Rejected(err.into()),
        };

        let target = self.tree.node_for(parent);
        let target_account = self.tree.service_root_of(target);
        let mut moved = Vec::new();

        for dragged in items {
            if !self.tree.contains(dragged) {
                return DropOutcome::Rejected(DropRejection::UnknownItem(dragged));
            }
            if dragged == target {
                tracing::debug!(item = %dragged, "Dragged item is the drop target, cancelling drop");
                return DropOutcome::Rejected(DropRejection::OntoSelf(dragged));
            }
            if self.tree.parent(dragged) == Some(target) {
                tracing::debug!(item = %dragged, "Dragged item already lives under the drop target, cancelling drop");
                return DropOutcome::Rejected(DropRejection::AlreadyChild(dragged));
            }
            if self.tree.service_root_of(dragged) != target_account {
                self.emit(ModelEvent::GuiMessage {
                    title: "Cannot perform drag & drop operation".to_owned(),
                    text: "You can't transfer dragged item into different account, this is not supported."
                        .to_owned(),
                    level: MessageLevel::Warning,
                });
                tracing::debug!(item = %dragged, "Dragged item cannot cross accounts, cancelling drop");
                return DropOutcome::Rejected(DropRejection::CrossAccount(dragged));
            }

            if self.perform_drag_drop_change(dragged, target) {
                self.emit(ModelEvent::ItemValidationRequired(
                    self.tree.position_for(dragged),
                ));
                moved.push(dragged);
            }
        }

        DropOutcome::Applied { moved }
    }

    /// Moves `item` under `target` if its variant supports it and the owning
    /// account accepts the move.
    fn perform_drag_drop_change(&mut self, item: NodeId, target: NodeId) -> bool {
        let (Some(item_kind), Some(target_kind)) = (self.tree.kind(item), self.tree.kind(target))
        else {
            return false;
        };
        if !item_kind.supports_reparenting() || !target_kind.accepts_children() {
            return false;
        }
        if self.tree.is_ancestor_of(item, target) {
            tracing::debug!(%item, %target, "Refusing to move an item under its own subtree");
            return false;
        }

        let request = MoveRequest {
            item,
            item_kind,
            old_parent: self.tree.parent(item),
            new_parent: target,
        };
        let accepted = self
            .tree
            .service_root_of(item)
            .and_then(|account| self.tree.service_mut(account))
            .is_some_and(|service| service.accepts_move(&request));
        if !accepted {
            return false;
        }

        tracing::debug!(%item, kind = item_kind.label(), %target, "Moving dragged item");
        self.reassign_node_to_new_parent(item, target)
    }

    /// Moves `node` to the end of `new_parent`'s children.
    ///
    /// No-op when `new_parent` already is the parent, when either node is
    /// unknown, when the node cannot be reparented or when `new_parent` cannot
    /// hold children. Returns whether the node moved.
    pub fn reassign_node_to_new_parent(&mut self, node: NodeId, new_parent: NodeId) -> bool {
        let original_parent = self.tree.parent(node);
        if original_parent == Some(new_parent)
            || !self.tree.kind(node).is_some_and(NodeKind::supports_reparenting)
            || !self.tree.kind(new_parent).is_some_and(NodeKind::accepts_children)
            || self.tree.is_ancestor_of(node, new_parent)
        {
            return false;
        }
        let old_account = self.tree.service_root_of(node);

        if let Some(original_parent) = original_parent {
            if let Some(row) = self.tree.row_of(node) {
                let parent_position = self.tree.position_for(original_parent);
                self.emit(ModelEvent::RowsAboutToBeRemoved {
                    parent: parent_position,
                    first: row,
                    last: row,
                });
                self.tree.unlink(node);
                self.emit(ModelEvent::RowsRemoved {
                    parent: self.tree.position_for(original_parent),
                    first: row,
                    last: row,
                });
            }
        }

        let row = self.tree.child_count(new_parent);
        self.emit(ModelEvent::RowsAboutToBeInserted {
            parent: self.tree.position_for(new_parent),
            first: row,
            last: row,
        });
        let Some(row) = self.tree.link(node, new_parent) else {
            tracing::warn!(%node, %new_parent, "Failed to link reassigned node");
            return false;
        };
        self.emit(ModelEvent::RowsInserted {
            parent: self.tree.position_for(new_parent),
            first: row,
            last: row,
        });

        // Bins tally deleted messages of their own account only.
        let new_account = self.tree.service_root_of(node);
        if old_account != new_account {
            for account in [old_account, new_account].into_iter().flatten() {
                self.tree.update_counts(account, true);
            }
            self.notify_with_counts();
        }
        true
    }

    /// Removes `item` from the tree.
    ///
    /// The node leaves the structure immediately; its resources are released
    /// by the next [`FeedsModel::process_deferred_destruction`].
    pub fn remove_item(&mut self, item: NodeId) -> bool {
        let Some(position) = self.tree.position_for(item) else {
            return false;
        };
        let parent = self.tree.parent_position(&position);
        let row = position.row();
        let account = self.tree.service_root_of(item).filter(|account| *account != item);

        self.emit(ModelEvent::RowsAboutToBeRemoved {
            parent,
            first: row,
            last: row,
        });
        let Some(detached) = self.tree.detach(item) else {
            return false;
        };
        let parent_after = parent.and_then(|p| self.tree.position_for(p.node()));
        self.emit(ModelEvent::RowsRemoved {
            parent: parent_after,
            first: row,
            last: row,
        });

        tracing::debug!(%item, nodes = detached.len(), "Scheduled removed nodes for release");
        self.pending_destruction.push_back(detached);
        // The account's bin may have counted messages of the removed feeds.
        if let Some(account) = account {
            self.tree.update_counts(account, true);
        }
        self.notify_with_counts();
        true
    }

    /// Removes the node at `position`; `None` and stale positions do nothing.
    pub fn remove_item_at(&mut self, position: Option<&Position>) -> bool {
        match position {
            Some(position) if self.tree.is_current(position) => self.remove_item(position.node()),
            _ => false,
        }
    }
}
