//! Synchronization broker: sole writer of the authoritative state.
//!
//! Every change is fanned out twice. Requests broadcast directly to the
//! affected contexts, and independently every store change to the state
//! record is rebroadcast to all contexts. A context whose listener was not
//! attached for the first delivery still converges through the second.

use ratesync_model::{PlaybackState, Settings, clamp_speed};
use std::{fmt, sync::Arc};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};
use crate::infra::BrokerEnvelope;
use crate::ports::{
    ContextChannel, DeliveryReport, Store, StoreChange, StoreExt, StoreKey,
    decode_state, fan_out,
};
use crate::protocol::{
    Ack, BrokerRequest, BrokerResponse, ContextId, ContextMessage,
    SetSpeedResponse, StateSnapshot, wire,
};

/// Which default records `initialize` had to write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitReport {
    pub wrote_settings: bool,
    pub wrote_state: bool,
}

pub struct SyncBroker {
    store: Arc<dyn Store>,
    contexts: Arc<dyn ContextChannel>,
    seed_settings: Settings,
}

impl fmt::Debug for SyncBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncBroker")
            .field("contexts", &self.contexts.contexts().len())
            .field("seed_settings", &self.seed_settings)
            .finish()
    }
}

impl SyncBroker {
    pub fn new(
        store: Arc<dyn Store>,
        contexts: Arc<dyn ContextChannel>,
    ) -> Self {
        Self {
            store,
            contexts,
            seed_settings: Settings::default(),
        }
    }

    /// Settings written by `initialize` when the store has none.
    pub fn with_seed_settings(mut self, settings: Settings) -> Self {
        self.seed_settings = settings;
        self
    }

    /// Write default records that are absent. Existing records are left
    /// untouched, so repeating this is harmless.
    ///
    /// The absence check and the write are not atomic. Two brokers racing on
    /// an empty store both write defaults, which converges to the same
    /// records.
    pub async fn initialize(&self) -> Result<InitReport> {
        let mut report = InitReport::default();

        if self.store.get(StoreKey::Settings).await?.is_none() {
            self.store.save_settings(&self.seed_settings).await?;
            info!("Initialized settings record with defaults");
            report.wrote_settings = true;
        }

        if self.store.get(StoreKey::State).await?.is_none() {
            self.store.save_state(&PlaybackState::default()).await?;
            info!("Initialized state record with defaults");
            report.wrote_state = true;
        }

        Ok(report)
    }

    /// Move to `speed`, persist, and tell every context except `origin`.
    pub async fn set_speed(
        &self,
        speed: f64,
        origin: Option<ContextId>,
    ) -> Result<SetSpeedResponse> {
        let current = self.store.load_state().await?;
        let next = current.transition(clamp_speed(speed));
        self.store.save_state(&next).await?;

        debug!(
            "Speed {} -> {} requested by {}",
            current.current_speed,
            next.current_speed,
            origin.map_or_else(|| "client".to_string(), |o| o.to_string())
        );

        let message = ContextMessage::SpeedChanged {
            speed: next.current_speed,
            state: next,
        };
        fan_out(self.contexts.as_ref(), &message, origin).await;

        Ok(SetSpeedResponse {
            success: true,
            state: next,
        })
    }

    /// Overwrite the state wholesale and tell every context, origin included.
    pub async fn set_state(&self, state: PlaybackState) -> Result<Ack> {
        let state = state.sanitized();
        self.store.save_state(&state).await?;

        let message = ContextMessage::StateUpdated { state };
        fan_out(self.contexts.as_ref(), &message, None).await;

        Ok(Ack { success: true })
    }

    pub async fn get_state(&self) -> Result<StateSnapshot> {
        Ok(StateSnapshot {
            settings: self.store.load_settings().await?,
            state: self.store.load_state().await?,
        })
    }

    /// Rebroadcast a state record change to every context. Changes to other
    /// records are ignored.
    pub async fn on_store_change(
        &self,
        change: &StoreChange,
    ) -> Option<DeliveryReport> {
        if change.key != StoreKey::State {
            return None;
        }

        let state = decode_state(change.new_value.as_ref());
        let message = ContextMessage::StateUpdated { state };
        Some(fan_out(self.contexts.as_ref(), &message, None).await)
    }

    /// Answer one request. Store failures degrade to an unsuccessful
    /// response rather than an error.
    pub async fn handle_request(
        &self,
        origin: Option<ContextId>,
        request: BrokerRequest,
    ) -> BrokerResponse {
        let action = request.action();
        let degraded = |e: CoreError| {
            warn!("Broker failed to handle {}: {}", action, e);
        };

        match request {
            BrokerRequest::GetState => match self.get_state().await {
                Ok(snapshot) => BrokerResponse::Snapshot(snapshot),
                Err(e) => {
                    degraded(e);
                    BrokerResponse::Snapshot(StateSnapshot::default())
                }
            },
            BrokerRequest::SetSpeed { speed } => {
                match self.set_speed(speed, origin).await {
                    Ok(response) => BrokerResponse::SpeedSet(response),
                    Err(e) => {
                        degraded(e);
                        BrokerResponse::SpeedSet(SetSpeedResponse {
                            success: false,
                            state: PlaybackState::default(),
                        })
                    }
                }
            }
            BrokerRequest::SetState { state } => {
                match self.set_state(state).await {
                    Ok(ack) => BrokerResponse::Ack(ack),
                    Err(e) => {
                        degraded(e);
                        BrokerResponse::Ack(Ack { success: false })
                    }
                }
            }
        }
    }

    /// Answer a request encoded as JSON text.
    pub async fn handle_raw(
        &self,
        origin: Option<ContextId>,
        raw: &str,
    ) -> Result<String> {
        let request = wire::decode_request(raw)?;
        let response = self.handle_request(origin, request).await;
        wire::encode(&response)
    }

    async fn rebroadcast_current(&self) {
        match self.store.load_state().await {
            Ok(state) => {
                let message = ContextMessage::StateUpdated { state };
                fan_out(self.contexts.as_ref(), &message, None).await;
            }
            Err(e) => warn!("Could not reload state after lag: {}", e),
        }
    }

    /// Serve queued requests and store changes until the request queue
    /// closes.
    pub async fn run(self, mut requests: mpsc::Receiver<BrokerEnvelope>) {
        let mut changes = self.store.subscribe();
        let mut watching_store = true;

        info!("Synchronization broker running");

        loop {
            tokio::select! {
                envelope = requests.recv() => {
                    let Some(envelope) = envelope else {
                        info!("Broker request queue closed, stopping");
                        break;
                    };
                    let response = self
                        .handle_request(envelope.origin, envelope.request)
                        .await;
                    if envelope.reply.send(response).is_err() {
                        debug!("Requester went away before the reply");
                    }
                }
                change = changes.recv(), if watching_store => match change {
                    Ok(change) => {
                        self.on_store_change(&change).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            "Broker missed {} store changes, rebroadcasting",
                            skipped
                        );
                        self.rebroadcast_current().await;
                    }
                    Err(RecvError::Closed) => {
                        debug!("Store change feed closed");
                        watching_store = false;
                    }
                },
            }
        }
    }
}
