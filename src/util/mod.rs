//! Text helpers shared by the model and the command line front end.
//!
//! Titles and message bodies come from feeds the user does not control, so
//! anything shown in a terminal goes through [`strip_control_chars`] first.

mod text;

pub use text::{display_width, strip_control_chars, truncate_to_width};
