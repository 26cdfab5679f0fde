use std::fmt;

use thiserror::Error;

/// Identity of a media element within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media#{}", self.0)
    }
}

/// The element refused a playback rate assignment.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{element} rejected playback rate {rate}: {reason}")]
pub struct RateRejected {
    pub element: ElementId,
    pub rate: f64,
    pub reason: String,
}

/// A playable media element whose rate the agent controls.
///
/// Assigning a rate that differs from the current one makes the element
/// report a rate change back through [`crate::events::DocumentEvent`].
pub trait MediaElement: Send + Sync {
    fn id(&self) -> ElementId;

    fn playback_rate(&self) -> f64;

    fn set_playback_rate(&self, rate: f64) -> Result<(), RateRejected>;
}
