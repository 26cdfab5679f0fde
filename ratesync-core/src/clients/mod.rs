//! Peripheral clients. They use the same broker contract as the agents but
//! own no media elements.

mod editor;
mod panel;

pub use editor::{HotkeyRejection, SettingsEditor};
pub use panel::QuickPanel;
