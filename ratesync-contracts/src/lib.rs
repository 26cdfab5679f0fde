//! Trait surfaces that describe the browsing context a control agent runs in.
//!
//! Nothing here knows about a concrete UI toolkit. A host binds these traits
//! to its own document model and forwards [`DocumentEvent`]s to the agent.

pub mod document;
pub mod element;
pub mod events;
pub mod overlay;

/// Frequently used items for agent and host crates.
pub mod prelude {
    pub use super::document::{Document, Subscription};
    pub use super::element::{ElementId, MediaElement, RateRejected};
    pub use super::events::{DocumentEvent, InsertedNode, KeyPress, KeyTarget};
    pub use super::overlay::OverlaySurface;
}
