//! Standard accounts defined in a local feeds file.
//!
//! ```toml
//! [[accounts]]
//! title = "Local"
//!
//! [[accounts.feeds]]
//! title = "Rust Blog"
//! url = "https://blog.rust-lang.org/feed.xml"
//! auto_update = 30
//!
//! [[accounts.categories]]
//! title = "News"
//!
//! [[accounts.categories.feeds]]
//! title = "LWN"
//! url = "https://lwn.net/headlines/rss"
//! auto_update = "never"
//! ```
//!
//! Every account gets a recycle bin as its last child. The tree itself is
//! the message store, so bin operations always succeed.
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::model::{
    AccountHandle, AccountSeed, AutoUpdate, Message, NodeSeed, RecycleBin, ServiceEntryPoint,
    ServiceRoot,
};

pub const STANDARD_SERVICE_CODE: &str = "std";
const STANDARD_SERVICE_NAME: &str = "Standard online feeds";
const RECYCLE_BIN_TITLE: &str = "Recycle bin";

/// Maximum feeds file size (4 MB).
const MAX_FILE_SIZE: u64 = 4 * 1_048_576;

#[derive(Debug, Error)]
pub enum FeedsFileError {
    #[error("Failed to read feeds file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid feeds file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Feeds file too large: {0} bytes")]
    TooLarge(u64),
}

// ============================================================================
// File Format
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct FeedsFile {
    #[serde(default)]
    accounts: Vec<AccountEntry>,
}

#[derive(Debug, Deserialize)]
struct AccountEntry {
    title: String,
    #[serde(default = "default_code")]
    code: String,
    #[serde(default)]
    categories: Vec<CategoryEntry>,
    #[serde(default)]
    feeds: Vec<FeedEntry>,
}

fn default_code() -> String {
    STANDARD_SERVICE_CODE.to_string()
}

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    title: String,
    #[serde(default)]
    categories: Vec<CategoryEntry>,
    #[serde(default)]
    feeds: Vec<FeedEntry>,
}

#[derive(Debug, Deserialize)]
struct FeedEntry {
    title: String,
    url: String,
    #[serde(default)]
    auto_update: Schedule,
    #[serde(default)]
    messages: Vec<Message>,
}

/// `"default"`, `"never"` or a positive interval in minutes.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(try_from = "ScheduleSetting")]
struct Schedule(AutoUpdate);

#[derive(Deserialize)]
#[serde(untagged)]
enum ScheduleSetting {
    Minutes(i64),
    Keyword(String),
}

impl TryFrom<ScheduleSetting> for Schedule {
    type Error = String;

    fn try_from(setting: ScheduleSetting) -> Result<Self, Self::Error> {
        match setting {
            ScheduleSetting::Keyword(keyword) => match keyword.as_str() {
                "default" => Ok(Schedule(AutoUpdate::default())),
                "never" => Ok(Schedule(AutoUpdate::never())),
                other => Err(format!(
                    "auto_update must be \"default\", \"never\" or minutes, got \"{other}\""
                )),
            },
            ScheduleSetting::Minutes(minutes) => i32::try_from(minutes)
                .ok()
                .filter(|minutes| *minutes > 0)
                .map(|minutes| Schedule(AutoUpdate::every(minutes)))
                .ok_or_else(|| format!("auto_update interval must be a positive number of minutes, got {minutes}")),
        }
    }
}

impl CategoryEntry {
    fn to_seed(&self) -> NodeSeed {
        NodeSeed::category(&self.title)
            .with_children(self.categories.iter().map(CategoryEntry::to_seed))
            .with_children(self.feeds.iter().map(FeedEntry::to_seed))
    }
}

impl FeedEntry {
    fn to_seed(&self) -> NodeSeed {
        NodeSeed::feed(&self.title, &self.url)
            .with_auto_update(self.auto_update.0)
            .with_messages(self.messages.iter().cloned())
    }
}

// ============================================================================
// Entry Point
// ============================================================================

/// Loads standard accounts from a feeds file.
#[derive(Debug, Default)]
pub struct StandardEntryPoint {
    file: FeedsFile,
}

impl StandardEntryPoint {
    /// Reads the feeds file at `path`. A missing file yields no accounts.
    pub fn from_file(path: &Path) -> Result<Self, FeedsFileError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > MAX_FILE_SIZE => {
                return Err(FeedsFileError::TooLarge(meta.len()));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No feeds file, starting without accounts");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        let entry_point: Self = content.parse()?;
        tracing::debug!(
            path = %path.display(),
            accounts = entry_point.file.accounts.len(),
            "Loaded feeds file"
        );
        Ok(entry_point)
    }

    pub fn account_count(&self) -> usize {
        self.file.accounts.len()
    }
}

impl std::str::FromStr for StandardEntryPoint {
    type Err = FeedsFileError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let file: FeedsFile = toml::from_str(content)?;
        Ok(Self { file })
    }
}

impl ServiceEntryPoint for StandardEntryPoint {
    fn code(&self) -> &str {
        STANDARD_SERVICE_CODE
    }

    fn name(&self) -> &str {
        STANDARD_SERVICE_NAME
    }

    fn initialize_subtree(&self) -> Vec<AccountSeed> {
        self.file
            .accounts
            .iter()
            .map(|account| {
                let service = StandardServiceRoot::new(&account.code);
                AccountSeed::new(&account.title, Box::new(service))
                    .with_children(account.categories.iter().map(CategoryEntry::to_seed))
                    .with_children(account.feeds.iter().map(FeedEntry::to_seed))
                    .with_child(NodeSeed::recycle_bin(RECYCLE_BIN_TITLE))
            })
            .collect()
    }
}

// ============================================================================
// Service Root
// ============================================================================

/// Account backed by the feeds file.
#[derive(Debug)]
pub struct StandardServiceRoot {
    code: String,
    handle: Option<AccountHandle>,
    bin: MemoryRecycleBin,
}

impl StandardServiceRoot {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            handle: None,
            bin: MemoryRecycleBin::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl ServiceRoot for StandardServiceRoot {
    fn code(&self) -> &str {
        &self.code
    }

    fn start(&mut self, handle: AccountHandle, freshly_activated: bool) {
        if freshly_activated {
            handle.request_item_expand(vec![handle.account()], true);
        }
        self.handle = Some(handle);
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::debug!(account = %handle.account(), "Stopped standard account");
        }
    }

    fn recycle_bin(&mut self) -> Option<&mut dyn RecycleBin> {
        Some(&mut self.bin)
    }
}

/// Bin whose storage is the tree itself.
#[derive(Debug, Default)]
pub struct MemoryRecycleBin {
    restored: usize,
    emptied: usize,
}

impl RecycleBin for MemoryRecycleBin {
    fn restore(&mut self) -> bool {
        self.restored += 1;
        true
    }

    fn empty(&mut self) -> bool {
        self.emptied += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::model::{AutoUpdateType, FeedsModel, ModelEvent, NodeKind, ServiceEntryPoint};
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
[[accounts]]
title = "Local"

[[accounts.feeds]]
title = "Rust Blog"
url = "https://blog.rust-lang.org/feed.xml"
auto_update = 30

[[accounts.feeds.messages]]
id = 1
title = "Announcing Rust"

[[accounts.feeds.messages]]
id = 2
title = "Old news"
is_read = true

[[accounts.categories]]
title = "News"

[[accounts.categories.categories]]
title = "Linux"

[[accounts.categories.categories.feeds]]
title = "LWN"
url = "https://lwn.net/headlines/rss"
auto_update = "never"
"#;

    fn sample_entry_points() -> Vec<Box<dyn ServiceEntryPoint>> {
        let entry_point: StandardEntryPoint = SAMPLE.parse().unwrap();
        vec![Box::new(entry_point)]
    }

    fn kinds_and_titles(model: &FeedsModel, account: crate::NodeId) -> Vec<(NodeKind, String)> {
        model
            .tree()
            .subtree(account)
            .into_iter()
            .filter_map(|id| model.tree().get(id))
            .map(|node| (node.kind(), node.title().to_string()))
            .collect()
    }

    #[test]
    fn test_feeds_file_builds_account_tree() {
        let (mut model, _rx) = FeedsModel::new(&Context::in_memory());
        model.load_activated_service_accounts(&sample_entry_points());

        let account = model.standard_service_root().unwrap();
        assert_eq!(
            kinds_and_titles(&model, account),
            vec![
                (NodeKind::ServiceRoot, "Local".to_string()),
                (NodeKind::Category, "News".to_string()),
                (NodeKind::Category, "Linux".to_string()),
                (NodeKind::Feed, "LWN".to_string()),
                (NodeKind::Feed, "Rust Blog".to_string()),
                (NodeKind::RecycleBin, "Recycle bin".to_string()),
            ]
        );
        assert_eq!(model.count_of_unread_messages(), 1);
        assert_eq!(model.count_of_all_messages(), 2);
    }

    #[test]
    fn test_auto_update_settings() {
        let (mut model, _rx) = FeedsModel::new(&Context::in_memory());
        model.load_activated_service_accounts(&sample_entry_points());

        let account = model.standard_service_root().unwrap();
        let schedules: Vec<AutoUpdate> = model
            .tree()
            .subtree_feeds(account)
            .into_iter()
            .filter_map(|feed| model.tree().get(feed)?.feed().map(|data| data.auto_update))
            .collect();
        assert_eq!(schedules[0].kind, AutoUpdateType::DontAutoUpdate);
        assert_eq!(schedules[1], AutoUpdate::every(30));
    }

    #[test]
    fn test_default_code_and_custom_code() {
        let entry_point: StandardEntryPoint =
            "[[accounts]]\ntitle = \"A\"\n\n[[accounts]]\ntitle = \"B\"\ncode = \"mirror\"\n"
                .parse()
                .unwrap();
        let seeds = entry_point.initialize_subtree();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].code(), STANDARD_SERVICE_CODE);
        assert_eq!(seeds[1].code(), "mirror");
    }

    #[test]
    fn test_invalid_auto_update_rejected() {
        let content = r#"
[[accounts]]
title = "Local"

[[accounts.feeds]]
title = "Bad"
url = "https://example.com/rss"
auto_update = "hourly"
"#;
        let err = content.parse::<StandardEntryPoint>().unwrap_err();
        assert!(matches!(err, FeedsFileError::Parse(_)));

        let zero = content.replace("\"hourly\"", "0");
        assert!(zero.parse::<StandardEntryPoint>().is_err());
    }

    #[test]
    fn test_missing_file_has_no_accounts() {
        let path = Path::new("/tmp/feedtree_test_nonexistent_feeds.toml");
        let entry_point = StandardEntryPoint::from_file(path).unwrap();
        assert_eq!(entry_point.account_count(), 0);
    }

    #[test]
    fn test_fresh_activation_requests_expand() {
        let (mut model, mut rx) = FeedsModel::new(&Context::in_memory());
        let account = model.add_service_account(
            AccountSeed::new("Fresh", Box::new(StandardServiceRoot::new(STANDARD_SERVICE_CODE))),
            true,
        );
        assert_eq!(model.process_account_requests(), 1);

        let mut expanded = false;
        while let Ok(event) = rx.try_recv() {
            if let ModelEvent::ItemExpandRequested { items, expand } = event {
                assert_eq!(items, vec![account]);
                assert!(expand);
                expanded = true;
            }
        }
        assert!(expanded);
    }

    #[test]
    fn test_bins_always_succeed() {
        let mut bin = MemoryRecycleBin::default();
        assert!(bin.restore());
        assert!(bin.empty());
        assert_eq!((bin.restored, bin.emptied), (1, 1));
    }
}
