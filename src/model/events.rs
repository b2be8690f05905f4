use super::index::Position;
use super::node::NodeId;

/// Severity of a user-visible advisory message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Information,
    Warning,
    Critical,
}

/// Signals emitted by the feeds model.
///
/// Positions carried by structural events describe the tree as it was when
/// the event was emitted and go stale with the next mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// Aggregate unread count changed.
    CountsChanged { unread: usize, has_new: bool },
    /// Cells between the two positions (same parent, same row) changed.
    DataChanged {
        top_left: Position,
        bottom_right: Position,
    },
    LayoutAboutToBeChanged,
    LayoutChanged,
    RowsAboutToBeRemoved {
        parent: Option<Position>,
        first: usize,
        last: usize,
    },
    RowsRemoved {
        parent: Option<Position>,
        first: usize,
        last: usize,
    },
    RowsAboutToBeInserted {
        parent: Option<Position>,
        first: usize,
        last: usize,
    },
    RowsInserted {
        parent: Option<Position>,
        first: usize,
        last: usize,
    },
    /// A dropped item landed somewhere new; the view should re-select it.
    ItemValidationRequired(Option<Position>),
    ReloadMessageListRequested { mark_selected_as_read: bool },
    ItemExpandRequested { items: Vec<NodeId>, expand: bool },
    ItemExpandStateSaveRequested(NodeId),
    /// Advisory message for the user.
    GuiMessage {
        title: String,
        text: String,
        level: MessageLevel,
    },
}

/// Requests an account may send to the model that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountRequest {
    RemoveItem(NodeId),
    ReassignItem { item: NodeId, new_parent: NodeId },
    DataChanged(Vec<NodeId>),
    ReloadMessageList { mark_selected_as_read: bool },
    ExpandItems { items: Vec<NodeId>, expand: bool },
    SaveExpandState(NodeId),
}
