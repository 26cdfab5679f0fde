use async_trait::async_trait;
use std::fmt;
use tokio::sync::{mpsc, oneshot};

use crate::error::{CoreError, Result};
use crate::ports::BrokerClient;
use crate::protocol::{BrokerRequest, BrokerResponse, ContextId};

/// One queued request plus the slot its reply goes to.
#[derive(Debug)]
pub struct BrokerEnvelope {
    pub origin: Option<ContextId>,
    pub request: BrokerRequest,
    pub reply: oneshot::Sender<BrokerResponse>,
}

/// Cloneable client side of the broker's request queue.
#[derive(Clone)]
pub struct BrokerHandle {
    sender: mpsc::Sender<BrokerEnvelope>,
}

impl fmt::Debug for BrokerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerHandle")
            .field("closed", &self.sender.is_closed())
            .field("capacity", &self.sender.capacity())
            .finish()
    }
}

impl BrokerHandle {
    /// Create a handle and the queue the broker's run loop drains.
    pub fn channel(
        capacity: usize,
    ) -> (BrokerHandle, mpsc::Receiver<BrokerEnvelope>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (BrokerHandle { sender }, receiver)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[async_trait]
impl BrokerClient for BrokerHandle {
    async fn request(
        &self,
        origin: Option<ContextId>,
        request: BrokerRequest,
    ) -> Result<BrokerResponse> {
        let action = request.action();
        let (reply, response) = oneshot::channel();

        self.sender
            .send(BrokerEnvelope {
                origin,
                request,
                reply,
            })
            .await
            .map_err(|_| {
                CoreError::BrokerUnavailable(format!(
                    "request queue closed before {action}"
                ))
            })?;

        response.await.map_err(|_| {
            CoreError::BrokerUnavailable(format!("no reply to {action}"))
        })
    }
}
