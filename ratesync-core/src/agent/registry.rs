use ratesync_contracts::prelude::*;
use ratesync_model::speeds_equal;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

struct RegistryEntry {
    element: Arc<dyn MediaElement>,
    /// Set while a write of ours is waiting for its rate-change echo.
    correcting: bool,
}

/// Result of checking an element's reported rate against the cached speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateCheck {
    /// Echo of our own write.
    Echo,
    /// Already at the authoritative speed.
    InSync,
    /// External deviation, reset once.
    Corrected,
    /// External deviation the element refused to undo.
    Rejected,
    /// Not a registered element.
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub written: usize,
    pub unchanged: usize,
    pub rejected: usize,
}

/// Media elements known to one agent, keyed by identity.
#[derive(Default)]
pub struct MediaRegistry {
    entries: BTreeMap<ElementId, RegistryEntry>,
}

impl fmt::Debug for MediaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaRegistry")
            .field("elements", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MediaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<ElementId> {
        self.entries.keys().copied().collect()
    }

    /// Track `element`; returns false when it was already known.
    pub fn insert(&mut self, element: Arc<dyn MediaElement>) -> bool {
        let id = element.id();
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(
            id,
            RegistryEntry {
                element,
                correcting: false,
            },
        );
        true
    }

    /// Drop entries for elements no longer in the document.
    pub fn prune(&mut self, document: &dyn Document) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, _| document.contains(*id));
        before - self.entries.len()
    }

    /// Drive one element to `speed`. Returns whether a write happened.
    pub fn enforce(
        &mut self,
        id: ElementId,
        speed: f64,
    ) -> Result<bool, RateRejected> {
        match self.entries.get_mut(&id) {
            Some(entry) => write_rate(entry, speed),
            None => Ok(false),
        }
    }

    /// Drive every element to `speed`. A rejecting element is logged and
    /// skipped.
    pub fn apply_all(&mut self, speed: f64) -> ApplyReport {
        let mut report = ApplyReport::default();
        for entry in self.entries.values_mut() {
            match write_rate(entry, speed) {
                Ok(true) => report.written += 1,
                Ok(false) => report.unchanged += 1,
                Err(e) => {
                    warn!("{}", e);
                    report.rejected += 1;
                }
            }
        }
        report
    }

    /// React to an element reporting a rate change.
    ///
    /// The echo of our own write clears the guard and is otherwise ignored.
    /// Anything else that leaves the element off `authoritative` gets
    /// exactly one corrective write.
    pub fn on_rate_changed(
        &mut self,
        id: ElementId,
        authoritative: f64,
    ) -> RateCheck {
        let Some(entry) = self.entries.get_mut(&id) else {
            return RateCheck::Unknown;
        };

        let rate = entry.element.playback_rate();
        if entry.correcting {
            entry.correcting = false;
            if speeds_equal(rate, authoritative) {
                return RateCheck::Echo;
            }
        }
        if speeds_equal(rate, authoritative) {
            return RateCheck::InSync;
        }

        match write_rate(entry, authoritative) {
            Ok(_) => {
                debug!("Reset {} from {} to {}", id, rate, authoritative);
                RateCheck::Corrected
            }
            Err(e) => {
                warn!("{}", e);
                RateCheck::Rejected
            }
        }
    }
}

fn write_rate(
    entry: &mut RegistryEntry,
    speed: f64,
) -> Result<bool, RateRejected> {
    if speeds_equal(entry.element.playback_rate(), speed) {
        return Ok(false);
    }

    entry.correcting = true;
    match entry.element.set_playback_rate(speed) {
        Ok(()) => Ok(true),
        Err(e) => {
            entry.correcting = false;
            Err(e)
        }
    }
}
