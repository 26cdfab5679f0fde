use ratesync_model::{PlaybackState, Settings};
use serde::{Deserialize, Serialize};

/// Requests any context or peripheral client may send to the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum BrokerRequest {
    /// Fetch the current settings and state, used by late joiners.
    GetState,
    /// Move to a new speed; the broker computes the state transition.
    SetSpeed { speed: f64 },
    /// Overwrite the state wholesale with a record the client computed.
    SetState { state: PlaybackState },
}

impl BrokerRequest {
    pub fn action(&self) -> &'static str {
        match self {
            BrokerRequest::GetState => "getState",
            BrokerRequest::SetSpeed { .. } => "setSpeed",
            BrokerRequest::SetState { .. } => "setState",
        }
    }
}

/// Settings and state as currently persisted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub settings: Settings,
    pub state: PlaybackState,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetSpeedResponse {
    pub success: bool,
    pub state: PlaybackState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

/// Broker replies, shaped per request kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BrokerResponse {
    Snapshot(StateSnapshot),
    SpeedSet(SetSpeedResponse),
    Ack(Ack),
}

/// Notifications delivered to contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ContextMessage {
    // Broker -> every context except the origin
    SpeedChanged { speed: f64, state: PlaybackState },

    // Broker -> every context, including the origin
    StateUpdated { state: PlaybackState },

    // Settings editor -> every context
    SettingsUpdated { settings: Settings },

    // Peripheral client -> one context
    SetSpeed { speed: f64 },
}

impl ContextMessage {
    pub fn action(&self) -> &'static str {
        match self {
            ContextMessage::SpeedChanged { .. } => "speedChanged",
            ContextMessage::StateUpdated { .. } => "stateUpdated",
            ContextMessage::SettingsUpdated { .. } => "settingsUpdated",
            ContextMessage::SetSpeed { .. } => "setSpeed",
        }
    }
}
