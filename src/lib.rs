//! Feed tree model for a desktop feed reader.
//!
//! The crate is organised around [`model::FeedsModel`], an n-ary tree of
//! accounts, categories, feeds and recycle bins with a stateless position
//! adapter on top of it. Around the model sit a debug log sink, a persistent
//! settings store and a message viewer that proxies inline images.

pub mod config;
pub mod context;
pub mod debugging;
pub mod model;
pub mod settings;
pub mod standard;
pub mod util;
pub mod viewer;

pub use context::Context;
pub use model::{FeedsModel, ModelEvent, NodeId, NodeKind, Position};

/// Short application name used in log lines and the settings directory.
pub const APP_LOW_NAME: &str = "feedtree";
