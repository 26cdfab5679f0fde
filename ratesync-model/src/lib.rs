//! Core data model definitions shared across ratesync crates.
#![allow(missing_docs)]

pub mod combo;
pub mod error;
pub mod settings;
pub mod speed;
pub mod state;

pub use combo::{KeyCombo, display_combo};
pub use error::{ModelError, Result as ModelResult};
pub use settings::{HotkeyAction, HotkeyBindings, OverlayPosition, Settings};
pub use speed::{
    DEFAULT_LAST_SPEED, MAX_SPEED, MIN_SPEED, NORMAL_SPEED, clamp_speed,
    format_speed, is_normal, round_speed, speeds_equal,
};
pub use state::PlaybackState;
