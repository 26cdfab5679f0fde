use async_trait::async_trait;
use ratesync_model::PlaybackState;
use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::protocol::{
    Ack, BrokerRequest, BrokerResponse, ContextId, ContextMessage,
    SetSpeedResponse, StateSnapshot,
};

/// Outbound message channel to every active context.
#[async_trait]
pub trait ContextChannel: Send + Sync {
    /// Contexts currently known to the channel.
    fn contexts(&self) -> Vec<ContextId>;

    /// Deliver one message. Failure means the peer is currently unreachable.
    async fn send(
        &self,
        context: ContextId,
        message: ContextMessage,
    ) -> Result<()>;
}

/// Request/response access to the broker.
///
/// Calls are best effort: no timeout, no retry.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn request(
        &self,
        origin: Option<ContextId>,
        request: BrokerRequest,
    ) -> Result<BrokerResponse>;

    async fn get_state(
        &self,
        origin: Option<ContextId>,
    ) -> Result<StateSnapshot> {
        match self.request(origin, BrokerRequest::GetState).await? {
            BrokerResponse::Snapshot(snapshot) => Ok(snapshot),
            _ => Err(CoreError::UnexpectedResponse {
                request: "getState",
            }),
        }
    }

    async fn set_speed(
        &self,
        origin: Option<ContextId>,
        speed: f64,
    ) -> Result<SetSpeedResponse> {
        match self
            .request(origin, BrokerRequest::SetSpeed { speed })
            .await?
        {
            BrokerResponse::SpeedSet(response) => Ok(response),
            _ => Err(CoreError::UnexpectedResponse {
                request: "setSpeed",
            }),
        }
    }

    async fn set_state(
        &self,
        origin: Option<ContextId>,
        state: PlaybackState,
    ) -> Result<Ack> {
        match self
            .request(origin, BrokerRequest::SetState { state })
            .await?
        {
            BrokerResponse::Ack(ack) => Ok(ack),
            _ => Err(CoreError::UnexpectedResponse {
                request: "setState",
            }),
        }
    }
}

/// Outcome of one fan-out pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<ContextId>,
    pub failed: Vec<ContextId>,
}

impl DeliveryReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

/// Send `message` to every context except `exclude`.
///
/// A failed delivery is logged and skipped; it never aborts the pass and is
/// never retried.
pub async fn fan_out(
    channel: &dyn ContextChannel,
    message: &ContextMessage,
    exclude: Option<ContextId>,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    for context in channel.contexts() {
        if Some(context) == exclude {
            continue;
        }
        match channel.send(context, message.clone()).await {
            Ok(()) => report.delivered.push(context),
            Err(e) => {
                warn!(
                    "Failed to deliver {} to {}: {}",
                    message.action(),
                    context,
                    e
                );
                report.failed.push(context);
            }
        }
    }

    debug!(
        "Fan-out of {} reached {}/{} contexts",
        message.action(),
        report.delivered.len(),
        report.attempted()
    );
    report
}
