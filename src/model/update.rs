use super::node::{AutoUpdateType, NodeId};
use super::FeedsModel;

impl FeedsModel {
    /// Feeds due for an update on this scheduler tick.
    ///
    /// Feeds with a specific interval count down one tick per call; when the
    /// countdown runs out the feed is selected and its interval restarts.
    /// Feeds on the default interval are selected only when `auto_update_now`
    /// is set.
    pub fn feeds_for_scheduled_update(&mut self, auto_update_now: bool) -> Vec<NodeId> {
        let mut due = Vec::new();

        for feed in self.tree.subtree_feeds(self.tree.root()) {
            let Some(data) = self.tree.get_mut(feed).and_then(|node| node.feed_mut()) else {
                continue;
            };
            let schedule = &mut data.auto_update;

            match schedule.kind {
                AutoUpdateType::DontAutoUpdate => {}
                AutoUpdateType::DefaultAutoUpdate => {
                    if auto_update_now {
                        due.push(feed);
                    }
                }
                AutoUpdateType::SpecificAutoUpdate => {
                    let remaining = schedule.remaining_interval - 1;
                    if remaining <= 0 {
                        due.push(feed);
                        schedule.remaining_interval = schedule.initial_interval;
                    } else {
                        schedule.remaining_interval = remaining;
                    }
                }
            }
        }

        tracing::debug!(feeds = due.len(), auto_update_now, "Selected feeds for scheduled update");
        due
    }
}
