use ratesync_model::{PlaybackState, Settings, format_speed, speeds_equal};
use std::{fmt, sync::Arc};
use tracing::debug;

use crate::error::Result;
use crate::ports::{
    BrokerClient, Store, StoreChange, StoreExt, StoreKey, decode_state,
};
use crate::protocol::{Ack, ContextMessage, StateSnapshot};

/// Quick-action panel: step, toggle and preset buttons.
///
/// The panel computes the full next state itself and submits it with
/// `setState`, so the broker broadcasts it to every context.
pub struct QuickPanel {
    broker: Arc<dyn BrokerClient>,
    settings: Settings,
    state: PlaybackState,
}

impl fmt::Debug for QuickPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuickPanel")
            .field("state", &self.state)
            .field("presets", &self.settings.presets)
            .finish()
    }
}

impl QuickPanel {
    /// Open the panel on the latest snapshot, read from the broker or, if
    /// that fails, straight from the store.
    pub async fn open(
        broker: Arc<dyn BrokerClient>,
        store: Arc<dyn Store>,
    ) -> Result<Self> {
        let snapshot = match broker.get_state(None).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!("Panel reading store directly: {}", e);
                StateSnapshot {
                    settings: store.load_settings().await?,
                    state: store.load_state().await?,
                }
            }
        };

        Ok(Self {
            broker,
            settings: snapshot.settings,
            state: snapshot.state,
        })
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Current speed as the panel shows it.
    pub fn label(&self) -> String {
        format_speed(self.state.current_speed)
    }

    /// The preset matching the current speed, if any.
    pub fn active_preset(&self) -> Option<f64> {
        self.settings
            .presets
            .iter()
            .copied()
            .find(|preset| speeds_equal(*preset, self.state.current_speed))
    }

    async fn submit(&mut self, speed: f64) -> Result<Ack> {
        self.state = self.state.transition(speed);
        self.broker.set_state(None, self.state).await
    }

    pub async fn increase(&mut self) -> Result<Ack> {
        let step = self.settings.effective_increment();
        self.submit(self.state.current_speed + step).await
    }

    pub async fn decrease(&mut self) -> Result<Ack> {
        let step = self.settings.effective_increment();
        self.submit(self.state.current_speed - step).await
    }

    pub async fn toggle(&mut self) -> Result<Ack> {
        self.submit(self.state.toggle_target()).await
    }

    pub async fn select_preset(&mut self, speed: f64) -> Result<Ack> {
        self.submit(speed).await
    }

    pub fn apply_store_change(&mut self, change: &StoreChange) {
        if change.key == StoreKey::State {
            self.state = decode_state(change.new_value.as_ref());
        }
    }

    pub fn apply_message(&mut self, message: &ContextMessage) {
        match message {
            ContextMessage::SpeedChanged { state, .. }
            | ContextMessage::StateUpdated { state } => {
                self.state = state.sanitized();
            }
            ContextMessage::SettingsUpdated { settings } => {
                self.settings = settings.clone();
            }
            ContextMessage::SetSpeed { .. } => {}
        }
    }
}
