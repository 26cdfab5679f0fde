use async_trait::async_trait;
use ratesync_model::{PlaybackState, Settings};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::Result;

/// Records held in the replicated store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKey {
    Settings,
    State,
}

impl StoreKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::Settings => "settings",
            StoreKey::State => "state",
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification that a record changed, whoever wrote it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub key: StoreKey,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Replicated key-value store with eventual change notification.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: StoreKey) -> Result<Option<Value>>;

    async fn set(&self, key: StoreKey, value: Value) -> Result<()>;

    /// Attach a change listener. Changes written before attachment are not
    /// replayed.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Decode a settings record, falling back to defaults when it is absent or
/// malformed.
pub fn decode_settings(value: Option<&Value>) -> Settings {
    match value {
        None => Settings::default(),
        Some(raw) => serde_json::from_value(raw.clone()).unwrap_or_else(|err| {
            warn!("Malformed settings record, using defaults: {}", err);
            Settings::default()
        }),
    }
}

/// Decode a state record, falling back to defaults when it is absent or
/// malformed. Out-of-range speeds are clamped.
pub fn decode_state(value: Option<&Value>) -> PlaybackState {
    match value {
        None => PlaybackState::default(),
        Some(raw) => serde_json::from_value::<PlaybackState>(raw.clone())
            .map(|state| state.sanitized())
            .unwrap_or_else(|err| {
                warn!("Malformed state record, using defaults: {}", err);
                PlaybackState::default()
            }),
    }
}

/// Typed access to the two records.
#[async_trait]
pub trait StoreExt: Store {
    async fn load_settings(&self) -> Result<Settings> {
        let raw = self.get(StoreKey::Settings).await?;
        Ok(decode_settings(raw.as_ref()))
    }

    async fn load_state(&self) -> Result<PlaybackState> {
        let raw = self.get(StoreKey::State).await?;
        Ok(decode_state(raw.as_ref()))
    }

    async fn save_settings(&self, settings: &Settings) -> Result<()> {
        let value = serde_json::to_value(settings)?;
        self.set(StoreKey::Settings, value).await
    }

    async fn save_state(&self, state: &PlaybackState) -> Result<()> {
        let value = serde_json::to_value(state)?;
        self.set(StoreKey::State, value).await
    }
}

impl<T: Store + ?Sized> StoreExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_records_decode_to_defaults() {
        assert_eq!(decode_settings(None), Settings::default());
        assert_eq!(decode_state(None), PlaybackState::default());
    }

    #[test]
    fn malformed_records_decode_to_defaults() {
        let garbage = json!("not a record");
        assert_eq!(decode_settings(Some(&garbage)), Settings::default());
        assert_eq!(decode_state(Some(&garbage)), PlaybackState::default());

        let wrong_type = json!({"currentSpeed": "fast"});
        assert_eq!(decode_state(Some(&wrong_type)), PlaybackState::default());
    }

    #[test]
    fn out_of_range_state_is_clamped() {
        let raw = json!({"currentSpeed": 16.0, "lastSpeed": 1.333});
        let state = decode_state(Some(&raw));
        assert_eq!(state.current_speed, 4.0);
        assert_eq!(state.last_speed, 1.33);
    }
}
