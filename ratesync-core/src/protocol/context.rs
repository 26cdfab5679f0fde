use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one browsing context (tab) or peripheral client.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ContextId(pub Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The tail of a v7 id carries the random bits; the head is a timestamp
        // shared by contexts created in the same millisecond.
        let simple = self.0.simple().to_string();
        write!(f, "ctx-{}", &simple[simple.len() - 8..])
    }
}
