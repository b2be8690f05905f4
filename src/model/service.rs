use tokio::sync::mpsc::UnboundedSender;

use super::events::{AccountRequest, ModelEvent};
use super::node::{AccountSeed, NodeId, NodeKind};
use super::FeedsModel;

// ============================================================================
// Collaborator Contracts
// ============================================================================

/// A top-level account: the boundary drag and drop cannot cross.
///
/// Implementations own their background activity. `stop` must leave nothing
/// running by the time it returns.
pub trait ServiceRoot {
    /// Code identifying the service plugin that created the account.
    fn code(&self) -> &str;

    /// Starts background activity. `handle` is the way back into the model.
    fn start(&mut self, handle: AccountHandle, freshly_activated: bool);

    fn stop(&mut self);

    fn recycle_bin(&mut self) -> Option<&mut dyn RecycleBin> {
        None
    }

    /// Persists (or vetoes) a move inside this account before the tree changes.
    fn accepts_move(&mut self, _request: &MoveRequest) -> bool {
        true
    }
}

/// Storage side of an account's recycle bin.
pub trait RecycleBin {
    fn restore(&mut self) -> bool;
    fn empty(&mut self) -> bool;
}

/// A service plugin able to load the accounts it knows about.
pub trait ServiceEntryPoint {
    fn code(&self) -> &str;
    fn name(&self) -> &str;
    fn initialize_subtree(&self) -> Vec<AccountSeed>;
}

/// A move about to be applied inside one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRequest {
    pub item: NodeId,
    pub item_kind: NodeKind,
    pub old_parent: Option<NodeId>,
    pub new_parent: NodeId,
}

/// Sending side an account uses to ask its model for changes.
#[derive(Debug, Clone)]
pub struct AccountHandle {
    account: NodeId,
    requests: UnboundedSender<AccountRequest>,
}

impl AccountHandle {
    /// Node of the account this handle belongs to.
    pub fn account(&self) -> NodeId {
        self.account
    }

    fn send(&self, request: AccountRequest) {
        if self.requests.send(request).is_err() {
            tracing::debug!(account = %self.account, "Feeds model gone, dropping account request");
        }
    }

    pub fn request_item_removal(&self, item: NodeId) {
        self.send(AccountRequest::RemoveItem(item));
    }

    pub fn request_item_reassignment(&self, item: NodeId, new_parent: NodeId) {
        self.send(AccountRequest::ReassignItem { item, new_parent });
    }

    pub fn notify_data_changed(&self, items: Vec<NodeId>) {
        self.send(AccountRequest::DataChanged(items));
    }

    pub fn request_message_list_reload(&self, mark_selected_as_read: bool) {
        self.send(AccountRequest::ReloadMessageList {
            mark_selected_as_read,
        });
    }

    pub fn request_item_expand(&self, items: Vec<NodeId>, expand: bool) {
        self.send(AccountRequest::ExpandItems { items, expand });
    }

    pub fn request_expand_state_save(&self, item: NodeId) {
        self.send(AccountRequest::SaveExpandState(item));
    }
}

// ============================================================================
// Account Management
// ============================================================================

impl FeedsModel {
    /// Appends an account as the last child of the root and starts it.
    pub fn add_service_account(&mut self, seed: AccountSeed, freshly_activated: bool) -> NodeId {
        let row = self.tree.child_count(self.tree.root());
        self.emit(ModelEvent::RowsAboutToBeInserted {
            parent: None,
            first: row,
            last: row,
        });
        let account = self.tree.append_account(seed);
        self.emit(ModelEvent::RowsInserted {
            parent: None,
            first: row,
            last: row,
        });

        let handle = AccountHandle {
            account,
            requests: self.requests_tx.clone(),
        };
        if let Some(service) = self.tree.service_mut(account) {
            tracing::debug!(code = service.code(), %account, freshly_activated, "Starting account");
            service.start(handle, freshly_activated);
        }
        account
    }

    /// Adds every account each entry point knows about.
    pub fn load_activated_service_accounts(&mut self, entry_points: &[Box<dyn ServiceEntryPoint>]) {
        for entry_point in entry_points {
            let seeds = entry_point.initialize_subtree();
            tracing::info!(
                service = entry_point.name(),
                accounts = seeds.len(),
                "Loading accounts"
            );
            for seed in seeds {
                self.add_service_account(seed, false);
            }
        }
    }

    /// Accounts in row order.
    pub fn service_roots(&self) -> Vec<NodeId> {
        self.tree.accounts()
    }

    pub fn contains_service_root_from_entry_point(&self, entry_point: &dyn ServiceEntryPoint) -> bool {
        self.service_roots().into_iter().any(|account| {
            self.tree
                .get(account)
                .and_then(|node| node.service_code())
                .is_some_and(|code| code == entry_point.code())
        })
    }

    /// First account created by the standard service, if loaded.
    pub fn standard_service_root(&self) -> Option<NodeId> {
        self.service_roots().into_iter().find(|account| {
            self.tree
                .get(*account)
                .and_then(|node| node.service_code())
                .is_some_and(|code| code == crate::standard::STANDARD_SERVICE_CODE)
        })
    }

    // ========================================================================
    // Recycle Bins
    // ========================================================================

    /// Restores every account's bin. Every account is attempted; the result
    /// is `false` if any of them failed.
    pub fn restore_all_bins(&mut self) -> bool {
        self.for_each_bin(|bin| bin.restore(), |message| message.is_deleted = false)
    }

    /// Empties every account's bin, with the same all-attempted semantics as
    /// [`FeedsModel::restore_all_bins`].
    pub fn empty_all_bins(&mut self) -> bool {
        self.for_each_bin(|bin| bin.empty(), |_| {})
    }

    fn for_each_bin(
        &mut self,
        mut storage: impl FnMut(&mut dyn RecycleBin) -> bool,
        mut on_deleted: impl FnMut(&mut super::node::Message),
    ) -> bool {
        let mut result = true;
        let mut changed = Vec::new();

        for account in self.service_roots() {
            let Some(service) = self.tree.service_mut(account) else {
                continue;
            };
            let Some(bin) = service.recycle_bin() else {
                continue;
            };
            let ok = storage(bin);
            result &= ok;
            if !ok {
                tracing::warn!(%account, "Recycle bin operation failed");
                continue;
            }

            // Mirror the storage change in the tree.
            for feed in self.tree.subtree_feeds(account) {
                if let Some(data) = self.tree.get_mut(feed).and_then(|node| node.feed_mut()) {
                    data.messages
                        .iter_mut()
                        .filter(|message| message.is_deleted)
                        .for_each(&mut on_deleted);
                    data.messages.retain(|message| !message.is_deleted);
                }
            }
            self.tree.update_counts(account, true);
            changed.extend(self.tree.subtree(account));
        }

        if !changed.is_empty() {
            self.notify_after_change(&changed);
        }
        result
    }

    // ========================================================================
    // Account Requests
    // ========================================================================

    /// Dispatches requests accounts sent since the last call.
    pub fn process_account_requests(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(request) = self.requests_rx.try_recv() {
            handled += 1;
            match request {
                AccountRequest::RemoveItem(item) => {
                    self.remove_item(item);
                }
                AccountRequest::ReassignItem { item, new_parent } => {
                    self.reassign_node_to_new_parent(item, new_parent);
                }
                AccountRequest::DataChanged(items) => self.notify_after_change(&items),
                AccountRequest::ReloadMessageList {
                    mark_selected_as_read,
                } => self.emit(ModelEvent::ReloadMessageListRequested {
                    mark_selected_as_read,
                }),
                AccountRequest::ExpandItems { items, expand } => {
                    self.emit(ModelEvent::ItemExpandRequested { items, expand })
                }
                AccountRequest::SaveExpandState(item) => {
                    self.emit(ModelEvent::ItemExpandStateSaveRequested(item))
                }
            }
        }
        handled
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::context::Context;
    use crate::model::node::{Message, NodeSeed};

    /// Observable lifecycle of a test account.
    #[derive(Debug, Default)]
    pub(crate) struct Lifecycle {
        pub started: Vec<bool>,
        pub stopped: usize,
        pub handle: Option<AccountHandle>,
    }

    /// Account stub with a configurable bin.
    pub(crate) struct NullService {
        code: String,
        pub lifecycle: Rc<RefCell<Lifecycle>>,
        pub bin: Option<StubBin>,
        pub veto_moves: bool,
    }

    impl NullService {
        pub fn new(code: &str) -> Self {
            Self {
                code: code.to_owned(),
                lifecycle: Rc::default(),
                bin: None,
                veto_moves: false,
            }
        }

        pub fn with_bin(mut self, succeeds: bool) -> Self {
            self.bin = Some(StubBin {
                succeeds,
                calls: Rc::default(),
            });
            self
        }
    }

    impl ServiceRoot for NullService {
        fn code(&self) -> &str {
            &self.code
        }

        fn start(&mut self, handle: AccountHandle, freshly_activated: bool) {
            let mut lifecycle = self.lifecycle.borrow_mut();
            lifecycle.started.push(freshly_activated);
            lifecycle.handle = Some(handle);
        }

        fn stop(&mut self) {
            self.lifecycle.borrow_mut().stopped += 1;
        }

        fn recycle_bin(&mut self) -> Option<&mut dyn RecycleBin> {
            self.bin.as_mut().map(|bin| bin as &mut dyn RecycleBin)
        }

        fn accepts_move(&mut self, _request: &MoveRequest) -> bool {
            !self.veto_moves
        }
    }

    pub(crate) struct StubBin {
        succeeds: bool,
        pub calls: Rc<RefCell<usize>>,
    }

    impl RecycleBin for StubBin {
        fn restore(&mut self) -> bool {
            *self.calls.borrow_mut() += 1;
            self.succeeds
        }

        fn empty(&mut self) -> bool {
            *self.calls.borrow_mut() += 1;
            self.succeeds
        }
    }

    struct FixedEntryPoint;

    impl ServiceEntryPoint for FixedEntryPoint {
        fn code(&self) -> &str {
            "fixed"
        }

        fn name(&self) -> &str {
            "Fixed accounts"
        }

        fn initialize_subtree(&self) -> Vec<AccountSeed> {
            vec![
                AccountSeed::new("One", Box::new(NullService::new("fixed"))),
                AccountSeed::new("Two", Box::new(NullService::new("fixed"))),
            ]
        }
    }

    fn deleted_feed(title: &str) -> NodeSeed {
        let mut gone = Message::new(2, "gone");
        gone.is_deleted = true;
        NodeSeed::feed(title, "https://example.com/rss")
            .with_messages([Message::new(1, "kept"), gone])
    }

    #[test]
    fn test_add_account_starts_it_and_emits_rows() {
        let (mut model, mut rx) = FeedsModel::new(&Context::in_memory());
        let service = NullService::new("std");
        let lifecycle = service.lifecycle.clone();

        let account = model.add_service_account(AccountSeed::new("Local", Box::new(service)), true);

        assert_eq!(model.service_roots(), vec![account]);
        assert_eq!(lifecycle.borrow().started, vec![true]);
        assert_eq!(
            lifecycle.borrow().handle.as_ref().map(AccountHandle::account),
            Some(account)
        );
        assert!(matches!(
            rx.try_recv(),
            Ok(ModelEvent::RowsAboutToBeInserted { parent: None, first: 0, last: 0 })
        ));
        assert!(matches!(
            rx.try_recv(),
            Ok(ModelEvent::RowsInserted { parent: None, first: 0, last: 0 })
        ));
    }

    #[test]
    fn test_load_activated_accounts_from_entry_points() {
        let (mut model, _rx) = FeedsModel::new(&Context::in_memory());
        let entry_points: Vec<Box<dyn ServiceEntryPoint>> = vec![Box::new(FixedEntryPoint)];

        assert!(!model.contains_service_root_from_entry_point(&FixedEntryPoint));
        model.load_activated_service_accounts(&entry_points);

        assert_eq!(model.service_roots().len(), 2);
        assert!(model.contains_service_root_from_entry_point(&FixedEntryPoint));
        assert_eq!(model.standard_service_root(), None);
    }

    #[test]
    fn test_bins_are_all_attempted_and_and_reduced() {
        let (mut model, _rx) = FeedsModel::new(&Context::in_memory());
        let failing = NullService::new("a").with_bin(false);
        let failing_calls = failing.bin.as_ref().unwrap().calls.clone();
        let working = NullService::new("b").with_bin(true);
        let working_calls = working.bin.as_ref().unwrap().calls.clone();

        model.add_service_account(AccountSeed::new("A", Box::new(failing)), false);
        model.add_service_account(AccountSeed::new("B", Box::new(working)), false);
        model.add_service_account(AccountSeed::new("No bin", Box::new(NullService::new("c"))), false);

        assert!(!model.empty_all_bins());
        assert_eq!(*failing_calls.borrow(), 1);
        assert_eq!(*working_calls.borrow(), 1);
    }

    #[test]
    fn test_restore_undeletes_messages() {
        let (mut model, _rx) = FeedsModel::new(&Context::in_memory());
        let account = model.add_service_account(
            AccountSeed::new("A", Box::new(NullService::new("a").with_bin(true)))
                .with_child(deleted_feed("Feed"))
                .with_child(NodeSeed::recycle_bin("Bin")),
            false,
        );
        model.reload_counts_of_whole_model();
        let feed = model.tree().subtree_feeds(account)[0];
        assert_eq!(model.tree().get(feed).unwrap().total_count(), 1);

        assert!(model.restore_all_bins());
        assert_eq!(model.tree().get(feed).unwrap().total_count(), 2);
    }

    #[test]
    fn test_empty_purges_deleted_messages() {
        let (mut model, _rx) = FeedsModel::new(&Context::in_memory());
        let account = model.add_service_account(
            AccountSeed::new("A", Box::new(NullService::new("a").with_bin(true)))
                .with_child(deleted_feed("Feed")),
            false,
        );
        assert!(model.empty_all_bins());
        let feed = model.tree().subtree_feeds(account)[0];
        assert_eq!(model.tree().get(feed).unwrap().feed().unwrap().messages.len(), 1);
    }

    #[test]
    fn test_account_requests_are_dispatched() {
        let (mut model, mut rx) = FeedsModel::new(&Context::in_memory());
        let service = NullService::new("std");
        let lifecycle = service.lifecycle.clone();
        let account = model.add_service_account(
            AccountSeed::new("Local", Box::new(service)).with_child(NodeSeed::category("News")),
            false,
        );
        while rx.try_recv().is_ok() {}

        let handle = lifecycle.borrow().handle.clone().unwrap();
        handle.request_message_list_reload(true);
        handle.request_item_expand(vec![account], true);
        handle.request_expand_state_save(account);

        assert_eq!(model.process_account_requests(), 3);
        assert_eq!(
            rx.try_recv().ok(),
            Some(ModelEvent::ReloadMessageListRequested {
                mark_selected_as_read: true
            })
        );
        assert_eq!(
            rx.try_recv().ok(),
            Some(ModelEvent::ItemExpandRequested {
                items: vec![account],
                expand: true
            })
        );
        assert_eq!(
            rx.try_recv().ok(),
            Some(ModelEvent::ItemExpandStateSaveRequested(account))
        );
    }

    #[test]
    fn test_drop_stops_accounts() {
        let (mut model, _rx) = FeedsModel::new(&Context::in_memory());
        let service = NullService::new("std");
        let lifecycle = service.lifecycle.clone();
        model.add_service_account(AccountSeed::new("Local", Box::new(service)), false);

        drop(model);
        assert_eq!(lifecycle.borrow().stopped, 1);
    }
}
