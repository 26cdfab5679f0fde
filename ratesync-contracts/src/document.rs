use std::sync::Arc;

use ratesync_model::OverlayPosition;

use crate::element::{ElementId, MediaElement};
use crate::events::KeyPress;
use crate::overlay::OverlaySurface;

/// Event sources the agent can ask a document to forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subscription {
    /// Playback start and rate change of one element.
    MediaEvents(ElementId),
    /// Node insertions anywhere under the document root.
    SubtreeInsertions,
    /// Key presses at the capture phase, before page handlers run.
    KeyDownCapture,
    /// Pointer hover and control clicks on the feedback surface.
    OverlayInput,
}

/// One browsing context's document as seen by its control agent.
pub trait Document: Send + Sync {
    /// All media elements currently attached to the document.
    fn media_elements(&self) -> Vec<Arc<dyn MediaElement>>;

    /// Whether the element is still part of the document.
    fn contains(&self, id: ElementId) -> bool;

    /// Start forwarding events for `subscription`. Idempotent.
    fn subscribe(&self, subscription: Subscription);

    /// Prevent default handling and further propagation of a key press.
    fn suppress_key(&self, press: &KeyPress);

    /// Create the feedback surface. Called at most once per agent.
    fn create_overlay(
        &self,
        position: OverlayPosition,
    ) -> Box<dyn OverlaySurface>;
}
