//! Hierarchical feed model.
//!
//! - [`tree`] - arena-backed tree store owned by the root node
//! - [`index`] - stateless translation between nodes and view positions
//! - [`counts`] - unread/total count aggregation and change notification
//! - [`dnd`] - drag payloads, drop validation, reparenting and removal
//! - [`service`] - account collaborators and bulk bin operations
//! - [`update`] - scheduled-update feed selection
//! - [`events`] - signals emitted by the model

mod counts;
mod dnd;
mod events;
mod index;
mod node;
mod service;
mod tree;
mod update;

use std::collections::VecDeque;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::context::Context;

pub use dnd::{
    DragPayload, DropAction, DropOutcome, DropRejection, PayloadError, MIME_TYPE_ITEM_POINTER,
};
pub use events::{AccountRequest, MessageLevel, ModelEvent};
pub use index::{
    HeaderData, Orientation, Position, Role, COLUMN_COUNT, COUNTS_COLUMN, TITLE_COLUMN,
};
pub use node::{
    AccountSeed, AutoUpdate, AutoUpdateType, FeedData, FeedStatus, ItemFlags, Message, Node,
    NodeData, NodeId, NodeKind, NodeSeed, ReadStatus,
};
pub use service::{AccountHandle, MoveRequest, RecycleBin, ServiceEntryPoint, ServiceRoot};
pub use tree::{DetachedSubtree, FeedTree, TreeId};

/// Title of the invisible root node.
pub const ROOT_TITLE: &str = "Root";

/// Feed/category tree plus the signal plumbing around it.
///
/// The model is single-threaded. Signals go out through an unbounded channel
/// and never block; account requests come back through another one and are
/// dispatched by [`FeedsModel::process_account_requests`].
pub struct FeedsModel {
    tree: FeedTree,
    events: UnboundedSender<ModelEvent>,
    requests_tx: UnboundedSender<AccountRequest>,
    requests_rx: UnboundedReceiver<AccountRequest>,
    pending_destruction: VecDeque<DetachedSubtree>,
    reload_threshold: usize,
}

impl FeedsModel {
    /// Creates an empty model and the receiving end of its signals.
    pub fn new(ctx: &Context) -> (Self, UnboundedReceiver<ModelEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();

        let model = Self {
            tree: FeedTree::new(ROOT_TITLE),
            events,
            requests_tx,
            requests_rx,
            pending_destruction: VecDeque::new(),
            reload_threshold: ctx.config.reload_model_threshold,
        };
        (model, events_rx)
    }

    pub fn tree(&self) -> &FeedTree {
        &self.tree
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// Number of changed items above which a full layout reload is emitted.
    pub fn reload_threshold(&self) -> usize {
        self.reload_threshold
    }

    pub fn set_reload_threshold(&mut self, threshold: usize) {
        self.reload_threshold = threshold;
    }

    /// Appends `seed` under `parent`, emitting row-insert notifications.
    pub fn append_item(&mut self, parent: NodeId, seed: NodeSeed) -> Option<NodeId> {
        if !self.tree.kind(parent).is_some_and(NodeKind::accepts_children) {
            return None;
        }
        let parent_position = self.tree.position_for(parent);
        let row = self.tree.child_count(parent);
        self.emit(ModelEvent::RowsAboutToBeInserted {
            parent: parent_position,
            first: row,
            last: row,
        });
        let id = self.tree.append_seed(parent, seed)?;
        self.emit(ModelEvent::RowsInserted {
            parent: self.tree.position_for(parent),
            first: row,
            last: row,
        });
        Some(id)
    }

    pub(crate) fn emit(&self, event: ModelEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    /// Releases subtrees removed since the last call.
    ///
    /// Meant to run from the event loop's idle point, never while a
    /// structural notification is being handled. Returns the number of
    /// released nodes.
    pub fn process_deferred_destruction(&mut self) -> usize {
        let mut released = 0;
        while let Some(subtree) = self.pending_destruction.pop_front() {
            released += subtree.release();
        }
        if released > 0 {
            tracing::debug!(nodes = released, "Released removed feed nodes");
        }
        released
    }

    /// Number of removed subtrees still waiting to be released.
    pub fn pending_destruction(&self) -> usize {
        self.pending_destruction.len()
    }
}

impl Drop for FeedsModel {
    fn drop(&mut self) {
        tracing::debug!("Destroying feeds model");
        self.process_deferred_destruction();

        for account in self.tree.accounts() {
            if let Some(service) = self.tree.service_mut(account) {
                service.stop();
            }
        }

        // Accounts are already stopped; release the nodes without stopping twice.
        for subtree in self.tree.drain_accounts() {
            drop(subtree.nodes);
        }
    }
}
