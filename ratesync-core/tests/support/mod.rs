#![allow(dead_code)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use ratesync_contracts::events::DocumentEvent;
use ratesync_core::{
    agent::ControlAgent,
    broker::SyncBroker,
    infra::{BrokerHandle, ContextHub, MemoryDocument, MemoryStore},
    ports::{Store, StoreChange, StoreExt, StoreKey},
    protocol::ContextId,
    Result as CoreResult,
};
use ratesync_model::{PlaybackState, Settings};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

pub const CONVERGENCE_TIMEOUT: Duration = Duration::from_secs(2);

/// Store view whose change feed is permanently closed.
pub struct SilentStore(pub Arc<MemoryStore>);

#[async_trait]
impl Store for SilentStore {
    async fn get(&self, key: StoreKey) -> CoreResult<Option<Value>> {
        self.0.get(key).await
    }

    async fn set(&self, key: StoreKey, value: Value) -> CoreResult<()> {
        self.0.set(key, value).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        let (tx, rx) = broadcast::channel(1);
        drop(tx);
        rx
    }
}

pub struct Node {
    pub id: ContextId,
    pub document: Arc<MemoryDocument>,
    pub observer: watch::Receiver<PlaybackState>,
    pub task: JoinHandle<ControlAgent>,
}

pub struct Deployment {
    pub store: Arc<MemoryStore>,
    pub hub: ContextHub,
    pub broker: BrokerHandle,
    pub nodes: Vec<Node>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum AgentFeed {
    /// Agents follow the store's change notifications.
    Live,
    /// Agents never hear from the store directly.
    Silent,
}

impl Deployment {
    pub async fn start(
        contexts: usize,
        videos: usize,
        feed: AgentFeed,
    ) -> Result<Self> {
        let store = Arc::new(MemoryStore::new(256));
        let hub = ContextHub::new(64);
        let broker = SyncBroker::new(store.clone(), Arc::new(hub.clone()));
        broker.initialize().await?;
        let (handle, requests) = BrokerHandle::channel(128);
        tokio::spawn(broker.run(requests));

        let mut deployment = Self {
            store,
            hub,
            broker: handle,
            nodes: Vec::new(),
        };
        for _ in 0..contexts {
            deployment.join(videos, feed).await;
        }
        Ok(deployment)
    }

    /// Open one more context with `videos` media elements.
    pub async fn join(&mut self, videos: usize, feed: AgentFeed) -> &Node {
        let (document, events) = MemoryDocument::new();
        for _ in 0..videos {
            document.add_media();
        }
        let (id, inbox) = self.hub.register();
        let store: Arc<dyn Store> = match feed {
            AgentFeed::Live => self.store.clone(),
            AgentFeed::Silent => Arc::new(SilentStore(self.store.clone())),
        };

        let mut agent = ControlAgent::new(
            id,
            document.clone(),
            Arc::new(self.broker.clone()),
            store,
        );
        agent.init().await;
        let observer = agent.observe();
        let task = tokio::spawn(agent.run(inbox, events));

        self.nodes.push(Node {
            id,
            document,
            observer,
            task,
        });
        &self.nodes[self.nodes.len() - 1]
    }

    /// Wait until every node's cached speed is exactly `speed`.
    pub async fn converge(&self, speed: f64) -> Result<()> {
        for node in &self.nodes {
            wait_for_speed(&node.observer, speed)
                .await
                .with_context(|| {
                    format!("{} did not reach {speed}", node.id)
                })?;
        }
        Ok(())
    }
}

pub async fn wait_for_speed(
    observer: &watch::Receiver<PlaybackState>,
    speed: f64,
) -> Result<PlaybackState> {
    let mut observer = observer.clone();
    let state = tokio::time::timeout(
        CONVERGENCE_TIMEOUT,
        observer.wait_for(|state| state.current_speed == speed),
    )
    .await
    .context("timed out")??;
    Ok(*state)
}

/// One agent driven by hand, event by event.
pub struct Solo {
    pub agent: ControlAgent,
    pub document: Arc<MemoryDocument>,
    pub events: mpsc::UnboundedReceiver<DocumentEvent>,
    pub store: Arc<MemoryStore>,
}

impl Solo {
    pub async fn start(videos: usize, settings: Settings) -> Result<Self> {
        let store = Arc::new(MemoryStore::new(64));
        store.save_settings(&settings).await?;
        let hub = ContextHub::new(16);
        let broker = SyncBroker::new(store.clone(), Arc::new(hub.clone()));
        broker.initialize().await?;
        let (handle, requests) = BrokerHandle::channel(16);
        tokio::spawn(broker.run(requests));

        let (document, events) = MemoryDocument::new();
        for _ in 0..videos {
            document.add_media();
        }
        let mut agent = ControlAgent::new(
            ContextId::new(),
            document.clone(),
            Arc::new(handle),
            store.clone(),
        );
        agent.init().await;

        Ok(Self {
            agent,
            document,
            events,
            store,
        })
    }

    /// Hand every queued document event to the agent.
    pub fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.agent.handle_event(event);
        }
    }
}
