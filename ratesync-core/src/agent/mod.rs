//! Per-context control agent.
//!
//! The agent owns its context's cached settings and state, the registry of
//! discovered media elements and the feedback surface. All mutation happens
//! on the agent's own task in the order events are delivered; only the
//! broker notification runs detached.

pub mod feedback;
pub mod hotkeys;
pub mod registry;

use ratesync_contracts::prelude::*;
use ratesync_model::{HotkeyAction, PlaybackState, Settings, is_normal};
use std::{fmt, sync::Arc};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::ports::{
    BrokerClient, Store, StoreChange, StoreExt, StoreKey, decode_settings,
    decode_state,
};
use crate::protocol::{ContextId, ContextMessage, StateSnapshot};

pub use feedback::FeedbackScheduler;
pub use registry::{ApplyReport, MediaRegistry, RateCheck};

/// Lifecycle of an agent. There is no teardown; an agent ends with its
/// context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
    Uninitialized,
    Loading,
    Active,
}

/// Outcome of a discovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub added: usize,
    pub pruned: usize,
}

enum Outbound {
    SetSpeed(f64),
    Flush(oneshot::Sender<()>),
}

pub struct ControlAgent {
    context: ContextId,
    document: Arc<dyn Document>,
    broker: Arc<dyn BrokerClient>,
    store: Arc<dyn Store>,
    phase: AgentPhase,
    settings: Settings,
    state: PlaybackState,
    registry: MediaRegistry,
    feedback: FeedbackScheduler,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    store_changes: Option<broadcast::Receiver<StoreChange>>,
    observers: watch::Sender<PlaybackState>,
}

impl fmt::Debug for ControlAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlAgent")
            .field("context", &self.context)
            .field("phase", &self.phase)
            .field("state", &self.state)
            .field("registry", &self.registry)
            .field("feedback", &self.feedback)
            .finish()
    }
}

impl ControlAgent {
    pub fn new(
        context: ContextId,
        document: Arc<dyn Document>,
        broker: Arc<dyn BrokerClient>,
        store: Arc<dyn Store>,
    ) -> Self {
        let state = PlaybackState::default();
        let (observers, _) = watch::channel(state);

        Self {
            context,
            document,
            broker,
            store,
            phase: AgentPhase::Uninitialized,
            settings: Settings::default(),
            state,
            registry: MediaRegistry::new(),
            feedback: FeedbackScheduler::new(),
            outbound: None,
            store_changes: None,
            observers,
        }
    }

    /// Load the shared records, attach listeners and take over every media
    /// element already in the document. Runs once.
    pub async fn init(&mut self) {
        if self.phase != AgentPhase::Uninitialized {
            return;
        }
        self.phase = AgentPhase::Loading;

        self.outbound = Some(spawn_notifier(self.context, self.broker.clone()));
        // Attach before loading so a change racing the load is not lost.
        self.store_changes = Some(self.store.subscribe());

        let snapshot = self.load_snapshot().await;
        self.settings = snapshot.settings;
        self.set_cached_state(snapshot.state.sanitized());

        self.document.subscribe(Subscription::SubtreeInsertions);
        self.document.subscribe(Subscription::KeyDownCapture);
        self.document.subscribe(Subscription::OverlayInput);

        self.scan();
        if !is_normal(self.state.current_speed) {
            self.apply_speed_to_all();
        }

        self.phase = AgentPhase::Active;
        info!(
            "Agent {} active at {}x with {} media elements",
            self.context,
            self.state.current_speed,
            self.registry.len()
        );
    }

    async fn load_snapshot(&self) -> StateSnapshot {
        match self.broker.get_state(Some(self.context)).await {
            Ok(snapshot) => return snapshot,
            Err(e) => debug!("getState failed for {}: {}", self.context, e),
        }

        let from_store = async {
            let settings = self.store.load_settings().await?;
            let state = self.store.load_state().await?;
            Ok::<_, CoreError>(StateSnapshot { settings, state })
        };
        from_store.await.unwrap_or_else(|e| {
            warn!("Agent {} falling back to defaults: {}", self.context, e);
            StateSnapshot::default()
        })
    }

    /// Handle one document event.
    pub fn handle_event(&mut self, event: DocumentEvent) {
        match event {
            DocumentEvent::Play(_) => {
                if self.settings.show_overlay {
                    self.feedback.ensure_surface(
                        self.document.as_ref(),
                        &self.settings,
                        self.state.current_speed,
                    );
                }
            }
            DocumentEvent::RateChanged(id) => {
                self.registry.on_rate_changed(id, self.state.current_speed);
            }
            DocumentEvent::NodesInserted(nodes) => {
                if nodes.iter().any(InsertedNode::brings_media) {
                    self.scan();
                }
            }
            DocumentEvent::KeyDown(press) => {
                self.handle_key(&press);
            }
            DocumentEvent::PointerEntered => self.feedback.pointer_entered(),
            DocumentEvent::PointerLeft => {
                self.feedback.pointer_left(&self.settings, Instant::now());
            }
            DocumentEvent::SurfaceAction(action) => self.perform_action(action),
        }
    }

    /// Decode and act on a key press. Matched presses are suppressed before
    /// the page sees them.
    pub fn handle_key(&mut self, press: &KeyPress) -> Option<HotkeyAction> {
        let action = hotkeys::decode(press, &self.settings.hotkeys)?;
        self.document.suppress_key(press);
        self.perform_action(action);
        Some(action)
    }

    /// Handle one message from the broker or a peripheral client.
    pub fn handle_message(&mut self, message: ContextMessage) {
        match message {
            ContextMessage::SpeedChanged { state, .. }
            | ContextMessage::StateUpdated { state } => self.adopt_state(state),
            ContextMessage::SettingsUpdated { settings } => {
                self.adopt_settings(settings)
            }
            ContextMessage::SetSpeed { speed } => self.request_speed(speed),
        }
    }

    /// Handle a change to either shared record, whoever wrote it.
    pub fn handle_store_change(&mut self, change: StoreChange) {
        match change.key {
            StoreKey::Settings => {
                self.adopt_settings(decode_settings(change.new_value.as_ref()))
            }
            StoreKey::State => {
                self.adopt_state(decode_state(change.new_value.as_ref()))
            }
        }
    }

    /// Drain pending store changes without blocking. Returns how many were
    /// handled.
    pub async fn poll_store_changes(&mut self) -> usize {
        let mut handled = 0;
        while let Some(feed) = self.store_changes.as_mut() {
            match feed.try_recv() {
                Ok(change) => {
                    self.handle_store_change(change);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Lagged(skipped)) => {
                    self.recover_from_lag(skipped).await;
                }
                Err(TryRecvError::Closed) => {
                    self.store_changes = None;
                }
            }
        }
        handled
    }

    async fn recover_from_lag(&mut self, skipped: u64) {
        debug!(
            "Agent {} skipped {} store changes, reloading",
            self.context, skipped
        );
        match self.store.load_state().await {
            Ok(state) => self.adopt_state(state),
            Err(e) => warn!("Reload after lag failed: {}", e),
        }
    }

    fn adopt_state(&mut self, state: PlaybackState) {
        self.set_cached_state(state.sanitized());
        self.apply_speed_to_all();
        self.show_feedback();
    }

    fn adopt_settings(&mut self, settings: Settings) {
        if settings.overlay_position != self.settings.overlay_position {
            self.feedback.reposition(settings.overlay_position);
        }
        self.settings = settings;
    }

    fn set_cached_state(&mut self, state: PlaybackState) {
        self.state = state;
        self.observers.send_replace(state);
    }

    /// Move to `speed` locally right away, then tell the broker.
    ///
    /// The local value stands until the next authoritative update, whether
    /// or not the broker hears about it.
    pub fn request_speed(&mut self, speed: f64) {
        let next = self.state.transition(speed);
        self.set_cached_state(next);
        self.apply_speed_to_all();
        self.show_feedback();
        self.notify_broker(next.current_speed);
    }

    pub fn increase(&mut self) {
        let step = self.settings.effective_increment();
        self.request_speed(self.state.current_speed + step);
    }

    pub fn decrease(&mut self) {
        let step = self.settings.effective_increment();
        self.request_speed(self.state.current_speed - step);
    }

    pub fn toggle(&mut self) {
        self.request_speed(self.state.toggle_target());
    }

    pub fn perform_action(&mut self, action: HotkeyAction) {
        match action {
            HotkeyAction::Increase => self.increase(),
            HotkeyAction::Decrease => self.decrease(),
            HotkeyAction::Toggle => self.toggle(),
        }
    }

    fn notify_broker(&self, speed: f64) {
        let Some(outbound) = self.outbound.as_ref() else {
            debug!("Agent {} not initialized, broker not told", self.context);
            return;
        };
        if outbound.send(Outbound::SetSpeed(speed)).is_err() {
            debug!("Agent {} notifier stopped", self.context);
        }
    }

    /// Wait until every broker notification issued so far has been
    /// answered or has failed.
    pub async fn flush_notifications(&self) {
        let Some(outbound) = self.outbound.as_ref() else {
            return;
        };
        let (done, wait) = oneshot::channel();
        if outbound.send(Outbound::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Register unseen media elements and prune detached ones.
    pub fn scan(&mut self) -> ScanReport {
        let mut report = ScanReport::default();
        let speed = self.state.current_speed;

        for element in self.document.media_elements() {
            let id = element.id();
            if !self.registry.insert(element) {
                continue;
            }
            report.added += 1;
            self.document.subscribe(Subscription::MediaEvents(id));
            if !is_normal(speed)
                && let Err(e) = self.registry.enforce(id, speed)
            {
                warn!("{}", e);
            }
        }
        report.pruned = self.registry.prune(self.document.as_ref());

        if report.added > 0 || report.pruned > 0 {
            debug!(
                "Agent {} scan: {} added, {} pruned, {} tracked",
                self.context,
                report.added,
                report.pruned,
                self.registry.len()
            );
        }
        report
    }

    /// Rescan, then drive every element to the cached speed.
    pub fn apply_speed_to_all(&mut self) -> ApplyReport {
        self.scan();
        self.registry.apply_all(self.state.current_speed)
    }

    fn show_feedback(&mut self) {
        self.feedback.show(
            self.document.as_ref(),
            &self.settings,
            self.state.current_speed,
            Instant::now(),
        );
    }

    /// Hide the feedback surface if its timer has run out by `now`.
    pub fn expire_feedback(&mut self, now: Instant) -> bool {
        self.feedback.expire(now)
    }

    pub fn feedback_deadline(&self) -> Option<Instant> {
        self.feedback.deadline()
    }

    pub fn feedback_visible(&self) -> bool {
        self.feedback.is_visible()
    }

    /// Follow the cached state as it changes.
    pub fn observe(&self) -> watch::Receiver<PlaybackState> {
        self.observers.subscribe()
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn registered_media(&self) -> Vec<ElementId> {
        self.registry.ids()
    }

    /// Drive the agent until its document goes away.
    ///
    /// Initializes first if needed. Messages, document events, store
    /// changes and the feedback timer are handled one at a time in arrival
    /// order. The agent is handed back so its final state can be inspected.
    pub async fn run(
        mut self,
        mut inbox: mpsc::Receiver<ContextMessage>,
        mut events: mpsc::UnboundedReceiver<DocumentEvent>,
    ) -> Self {
        self.init().await;

        let mut feed = self.store_changes.take();
        let mut inbox_open = true;

        loop {
            let deadline = self.feedback.deadline();

            tokio::select! {
                message = inbox.recv(), if inbox_open => match message {
                    Some(message) => self.handle_message(message),
                    None => {
                        debug!("Agent {} inbox closed", self.context);
                        inbox_open = false;
                    }
                },
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                change = next_change(&mut feed) => match change {
                    Ok(change) => self.handle_store_change(change),
                    Err(RecvError::Lagged(skipped)) => {
                        self.recover_from_lag(skipped).await;
                    }
                    Err(RecvError::Closed) => feed = None,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() =>
                {
                    self.feedback.expire(Instant::now());
                }
            }
        }

        debug!("Agent {} document closed", self.context);
        self.store_changes = feed;
        self
    }
}

async fn next_change(
    feed: &mut Option<broadcast::Receiver<StoreChange>>,
) -> Result<StoreChange, RecvError> {
    match feed {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

/// Forward broker notifications in order, off the agent's task. Failures
/// are swallowed.
fn spawn_notifier(
    context: ContextId,
    broker: Arc<dyn BrokerClient>,
) -> mpsc::UnboundedSender<Outbound> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            match item {
                Outbound::SetSpeed(speed) => {
                    if let Err(e) = broker.set_speed(Some(context), speed).await
                    {
                        debug!("Broker not told about {}x: {}", speed, e);
                    }
                }
                Outbound::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
    });

    tx
}
