use ratesync_contracts::prelude::*;
use ratesync_model::{HotkeyAction, NORMAL_SPEED, OverlayPosition};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::lock;

/// Scripted media element.
pub struct MemoryMedia {
    id: ElementId,
    rate: AtomicU64,
    rejects: bool,
    writes: AtomicUsize,
    subscribed: AtomicBool,
    events: mpsc::UnboundedSender<DocumentEvent>,
}

impl fmt::Debug for MemoryMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryMedia")
            .field("id", &self.id)
            .field("rate", &self.playback_rate())
            .field("rejects", &self.rejects)
            .field("writes", &self.writes.load(Ordering::Relaxed))
            .finish()
    }
}

impl MemoryMedia {
    fn new(
        id: ElementId,
        rejects: bool,
        events: mpsc::UnboundedSender<DocumentEvent>,
    ) -> Self {
        Self {
            id,
            rate: AtomicU64::new(NORMAL_SPEED.to_bits()),
            rejects,
            writes: AtomicUsize::new(0),
            subscribed: AtomicBool::new(false),
            events,
        }
    }

    /// Store a new rate and report it when it differs from the old one.
    fn store_rate(&self, rate: f64) {
        let previous =
            f64::from_bits(self.rate.swap(rate.to_bits(), Ordering::SeqCst));
        if previous != rate && self.subscribed.load(Ordering::SeqCst) {
            let _ = self.events.send(DocumentEvent::RateChanged(self.id));
        }
    }

    /// Rate assignments accepted from the agent.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl MediaElement for MemoryMedia {
    fn id(&self) -> ElementId {
        self.id
    }

    fn playback_rate(&self) -> f64 {
        f64::from_bits(self.rate.load(Ordering::SeqCst))
    }

    fn set_playback_rate(&self, rate: f64) -> Result<(), RateRejected> {
        if self.rejects {
            return Err(RateRejected {
                element: self.id,
                rate,
                reason: "unsupported media type".into(),
            });
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.store_rate(rate);
        Ok(())
    }
}

/// What the feedback surface currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySnapshot {
    pub label: String,
    pub visible: bool,
    pub position: OverlayPosition,
}

struct RecordingOverlay {
    shared: Arc<Mutex<Option<OverlaySnapshot>>>,
}

impl RecordingOverlay {
    fn update(&self, apply: impl FnOnce(&mut OverlaySnapshot)) {
        if let Some(snapshot) = lock(&self.shared).as_mut() {
            apply(snapshot);
        }
    }
}

impl OverlaySurface for RecordingOverlay {
    fn set_label(&mut self, label: &str) {
        self.update(|s| s.label = label.to_string());
    }

    fn set_visible(&mut self, visible: bool) {
        self.update(|s| s.visible = visible);
    }

    fn set_position(&mut self, position: OverlayPosition) {
        self.update(|s| s.position = position);
    }
}

/// Scripted document for one context.
///
/// Host-side calls (`add_media`, `press_key`, ...) mutate the document and
/// emit the [`DocumentEvent`]s a real document would, but only for sources
/// the agent has subscribed to.
pub struct MemoryDocument {
    media: Mutex<BTreeMap<ElementId, Arc<MemoryMedia>>>,
    next_id: AtomicU64,
    subscriptions: Mutex<HashSet<Subscription>>,
    suppressed: Mutex<Vec<KeyPress>>,
    overlay: Arc<Mutex<Option<OverlaySnapshot>>>,
    overlays_created: AtomicUsize,
    events: mpsc::UnboundedSender<DocumentEvent>,
}

impl fmt::Debug for MemoryDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDocument")
            .field("media", &lock(&self.media).len())
            .field("subscriptions", &lock(&self.subscriptions).len())
            .field("overlay", &*lock(&self.overlay))
            .finish()
    }
}

impl MemoryDocument {
    /// Create an empty document and the event stream its agent consumes.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<DocumentEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let document = Arc::new(Self {
            media: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            subscriptions: Mutex::new(HashSet::new()),
            suppressed: Mutex::new(Vec::new()),
            overlay: Arc::new(Mutex::new(None)),
            overlays_created: AtomicUsize::new(0),
            events,
        });
        (document, receiver)
    }

    fn subscribed(&self, subscription: Subscription) -> bool {
        lock(&self.subscriptions).contains(&subscription)
    }

    fn emit_if(&self, subscription: Subscription, event: DocumentEvent) {
        if self.subscribed(subscription) {
            let _ = self.events.send(event);
        }
    }

    fn attach(&self, rejects: bool) -> ElementId {
        let id = ElementId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let media =
            Arc::new(MemoryMedia::new(id, rejects, self.events.clone()));
        lock(&self.media).insert(id, media);
        id
    }

    /// Insert a media element at the document root.
    pub fn add_media(&self) -> ElementId {
        let id = self.attach(false);
        self.emit_if(
            Subscription::SubtreeInsertions,
            DocumentEvent::NodesInserted(vec![InsertedNode::media()]),
        );
        id
    }

    /// Insert a media element that refuses every rate assignment.
    pub fn add_rejecting_media(&self) -> ElementId {
        let id = self.attach(true);
        self.emit_if(
            Subscription::SubtreeInsertions,
            DocumentEvent::NodesInserted(vec![InsertedNode::media()]),
        );
        id
    }

    /// Insert one container node holding `count` media elements.
    pub fn add_container_with_media(&self, count: usize) -> Vec<ElementId> {
        let ids: Vec<ElementId> =
            (0..count).map(|_| self.attach(false)).collect();
        let node = if ids.is_empty() {
            InsertedNode::plain()
        } else {
            InsertedNode::container_with_media()
        };
        self.emit_if(
            Subscription::SubtreeInsertions,
            DocumentEvent::NodesInserted(vec![node]),
        );
        ids
    }

    /// Insert a node with no media in it.
    pub fn add_plain_node(&self) {
        self.emit_if(
            Subscription::SubtreeInsertions,
            DocumentEvent::NodesInserted(vec![InsertedNode::plain()]),
        );
    }

    /// Detach an element. Removal emits nothing.
    pub fn remove_media(&self, id: ElementId) -> bool {
        lock(&self.media).remove(&id).is_some()
    }

    /// Change an element's rate from outside the agent, e.g. the page's own
    /// player controls.
    pub fn external_rate(&self, id: ElementId, rate: f64) {
        if let Some(media) = self.media_by_id(id) {
            media.store_rate(rate);
        }
    }

    pub fn play(&self, id: ElementId) {
        if self.contains(id) {
            self.emit_if(
                Subscription::MediaEvents(id),
                DocumentEvent::Play(id),
            );
        }
    }

    pub fn press_key(&self, press: KeyPress) {
        self.emit_if(
            Subscription::KeyDownCapture,
            DocumentEvent::KeyDown(press),
        );
    }

    pub fn hover_overlay(&self) {
        self.overlay_input(DocumentEvent::PointerEntered);
    }

    pub fn leave_overlay(&self) {
        self.overlay_input(DocumentEvent::PointerLeft);
    }

    /// Click one of the surface's decrease / toggle / increase controls.
    pub fn click_overlay(&self, action: HotkeyAction) {
        self.overlay_input(DocumentEvent::SurfaceAction(action));
    }

    fn overlay_input(&self, event: DocumentEvent) {
        if lock(&self.overlay).is_some() {
            self.emit_if(Subscription::OverlayInput, event);
        }
    }

    fn media_by_id(&self, id: ElementId) -> Option<Arc<MemoryMedia>> {
        lock(&self.media).get(&id).cloned()
    }

    pub fn media_ids(&self) -> Vec<ElementId> {
        lock(&self.media).keys().copied().collect()
    }

    pub fn rate_of(&self, id: ElementId) -> Option<f64> {
        self.media_by_id(id).map(|media| media.playback_rate())
    }

    pub fn write_count(&self, id: ElementId) -> usize {
        self.media_by_id(id)
            .map(|media| media.write_count())
            .unwrap_or_default()
    }

    /// Key presses the agent suppressed, in order.
    pub fn suppressed_keys(&self) -> Vec<KeyPress> {
        lock(&self.suppressed).clone()
    }

    pub fn overlay(&self) -> Option<OverlaySnapshot> {
        lock(&self.overlay).clone()
    }

    pub fn overlays_created(&self) -> usize {
        self.overlays_created.load(Ordering::SeqCst)
    }
}

impl Document for MemoryDocument {
    fn media_elements(&self) -> Vec<Arc<dyn MediaElement>> {
        lock(&self.media)
            .values()
            .map(|media| Arc::clone(media) as Arc<dyn MediaElement>)
            .collect()
    }

    fn contains(&self, id: ElementId) -> bool {
        lock(&self.media).contains_key(&id)
    }

    fn subscribe(&self, subscription: Subscription) {
        if let Subscription::MediaEvents(id) = subscription
            && let Some(media) = self.media_by_id(id)
        {
            media.subscribed.store(true, Ordering::SeqCst);
        }
        lock(&self.subscriptions).insert(subscription);
    }

    fn suppress_key(&self, press: &KeyPress) {
        lock(&self.suppressed).push(press.clone());
    }

    fn create_overlay(
        &self,
        position: OverlayPosition,
    ) -> Box<dyn OverlaySurface> {
        self.overlays_created.fetch_add(1, Ordering::SeqCst);
        *lock(&self.overlay) = Some(OverlaySnapshot {
            label: String::new(),
            visible: false,
            position,
        });
        Box::new(RecordingOverlay {
            shared: Arc::clone(&self.overlay),
        })
    }
}
