use async_trait::async_trait;
use dashmap::DashMap;
use std::{fmt, sync::Arc};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::ports::ContextChannel;
use crate::protocol::{ContextId, ContextMessage};

struct ContextSlot {
    sender: mpsc::Sender<ContextMessage>,
    listening: bool,
}

/// Registry of active contexts and their inbound mailboxes.
#[derive(Clone)]
pub struct ContextHub {
    /// Active contexts mapped by id
    contexts: Arc<DashMap<ContextId, ContextSlot>>,
    /// Tap of every successful delivery
    deliveries: Arc<broadcast::Sender<(ContextId, ContextMessage)>>,
    mailbox_capacity: usize,
}

impl fmt::Debug for ContextHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextHub")
            .field("context_count", &self.contexts.len())
            .field("mailbox_capacity", &self.mailbox_capacity)
            .field("delivery_taps", &self.deliveries.receiver_count())
            .finish()
    }
}

impl ContextHub {
    pub fn new(mailbox_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(1024);

        Self {
            contexts: Arc::new(DashMap::new()),
            deliveries: Arc::new(tx),
            mailbox_capacity: mailbox_capacity.max(1),
        }
    }

    /// Register a new context and hand back its mailbox.
    pub fn register(&self) -> (ContextId, mpsc::Receiver<ContextMessage>) {
        let id = ContextId::new();
        let mailbox = self.register_with_id(id);
        (id, mailbox)
    }

    /// Register (or re-register) a context under a known id.
    pub fn register_with_id(
        &self,
        id: ContextId,
    ) -> mpsc::Receiver<ContextMessage> {
        let (sender, receiver) = mpsc::channel(self.mailbox_capacity);
        self.contexts.insert(
            id,
            ContextSlot {
                sender,
                listening: true,
            },
        );
        receiver
    }

    /// Forget a context; later sends to it fail.
    pub fn remove(&self, id: ContextId) {
        self.contexts.remove(&id);
    }

    /// Mark whether the context's listener is attached. Sends to a context
    /// that is not listening fail as unreachable.
    pub fn set_listening(&self, id: ContextId, listening: bool) {
        if let Some(mut slot) = self.contexts.get_mut(&id) {
            slot.listening = listening;
        }
    }

    pub fn contains(&self, id: ContextId) -> bool {
        self.contexts.contains_key(&id)
    }

    /// Observe every message the hub delivers.
    pub fn subscribe_deliveries(
        &self,
    ) -> broadcast::Receiver<(ContextId, ContextMessage)> {
        self.deliveries.subscribe()
    }
}

impl Default for ContextHub {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl ContextChannel for ContextHub {
    fn contexts(&self) -> Vec<ContextId> {
        let mut ids: Vec<ContextId> =
            self.contexts.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    async fn send(
        &self,
        context: ContextId,
        message: ContextMessage,
    ) -> Result<()> {
        let sender = match self.contexts.get(&context) {
            Some(slot) if slot.listening => slot.sender.clone(),
            Some(_) => {
                return Err(CoreError::Unreachable {
                    context,
                    reason: "no listener attached".into(),
                });
            }
            None => {
                return Err(CoreError::Unreachable {
                    context,
                    reason: "unknown context".into(),
                });
            }
        };

        sender
            .try_send(message.clone())
            .map_err(|e| CoreError::Unreachable {
                context,
                reason: match e {
                    mpsc::error::TrySendError::Full(_) => "mailbox full".into(),
                    mpsc::error::TrySendError::Closed(_) => {
                        "mailbox closed".into()
                    }
                },
            })?;

        debug!("Delivered {} to {}", message.action(), context);
        let _ = self.deliveries.send((context, message));
        Ok(())
    }
}
