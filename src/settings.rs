//! Settings store that merges config.toml defaults with persisted overrides.
//!
//! Config values serve as defaults; values in `settings.json` override them.
//! Writes always go to `settings.json`, never to the config file.
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::Config;

/// Group holding message viewer settings.
pub const MESSAGES_GROUP: &str = "messages";
/// Font of the message previewer, as `family,point size`.
pub const PREVIEWER_FONT_STANDARD: &str = "previewer_font_standard";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to access settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Merged settings: config defaults plus persisted overrides.
///
/// Keys are `group.key`. Reads are in-memory; every write rewrites the
/// overrides file atomically.
#[derive(Debug)]
pub struct Settings {
    defaults: BTreeMap<String, String>,
    overrides: BTreeMap<String, String>,
    path: Option<PathBuf>,
}

impl Settings {
    /// Load overrides from `path` on top of the config defaults.
    /// A missing file means no overrides.
    pub fn load(config: &Config, path: &Path) -> Result<Self, SettingsError> {
        let overrides = match std::fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), overrides = overrides.len(), "Loaded settings");

        Ok(Self {
            defaults: Self::flatten_config(config),
            overrides,
            path: Some(path.to_path_buf()),
        })
    }

    /// Settings that are never written to disk.
    pub fn in_memory(config: &Config) -> Self {
        Self {
            defaults: Self::flatten_config(config),
            overrides: BTreeMap::new(),
            path: None,
        }
    }

    pub fn get(&self, group: &str, key: &str) -> Option<&str> {
        let full_key = format!("{group}.{key}");
        self.overrides
            .get(&full_key)
            .or_else(|| self.defaults.get(&full_key))
            .map(String::as_str)
    }

    /// Set a value and persist all overrides.
    pub fn set(&mut self, group: &str, key: &str, value: &str) -> Result<(), SettingsError> {
        self.overrides
            .insert(format!("{group}.{key}"), value.to_string());
        self.save()
    }

    fn save(&self) -> Result<(), SettingsError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = serde_json::to_vec_pretty(&self.overrides)?;
        write_atomically(path, &content)?;
        Ok(())
    }

    fn flatten_config(config: &Config) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(
            format!("{MESSAGES_GROUP}.{PREVIEWER_FONT_STANDARD}"),
            config.previewer_font.clone(),
        );
        map
    }
}

/// Write `content` to a temp file beside `dst`, then rename over it.
fn write_atomically(dst: &Path, content: &[u8]) -> std::io::Result<()> {
    let temp_path = dst.with_extension(format!("tmp.{}", std::process::id()));

    let mut temp_file = std::fs::File::create(&temp_path)?;
    let written = temp_file
        .write_all(content)
        .and_then(|()| temp_file.sync_all());
    drop(temp_file);
    if let Err(e) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    #[cfg(windows)]
    if dst.exists() {
        std::fs::remove_file(dst)?;
    }

    std::fs::rename(&temp_path, dst).inspect_err(|_| {
        let _ = std::fs::remove_file(&temp_path);
    })
}
