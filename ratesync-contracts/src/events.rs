use ratesync_model::{HotkeyAction, KeyCombo};

use crate::element::ElementId;

/// What kind of node received a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyTarget {
    #[default]
    Page,
    TextInput,
    TextArea,
    Editable,
}

impl KeyTarget {
    pub fn accepts_text(&self) -> bool {
        !matches!(self, KeyTarget::Page)
    }
}

/// Raw key-down event as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyPress {
    /// Physical key identifier, e.g. `KeyS`.
    pub code: String,
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
    pub shift: bool,
    pub target: KeyTarget,
}

impl KeyPress {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn on(mut self, target: KeyTarget) -> Self {
        self.target = target;
        self
    }

    pub fn combo(&self) -> KeyCombo {
        KeyCombo {
            ctrl: self.ctrl,
            meta: self.meta,
            alt: self.alt,
            shift: self.shift,
            code: self.code.clone(),
        }
    }
}

/// Summary of a node inserted under the document root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertedNode {
    pub is_media: bool,
    pub contains_media: bool,
}

impl InsertedNode {
    pub fn media() -> Self {
        Self {
            is_media: true,
            contains_media: false,
        }
    }

    pub fn container_with_media() -> Self {
        Self {
            is_media: false,
            contains_media: true,
        }
    }

    pub fn plain() -> Self {
        Self::default()
    }

    pub fn brings_media(&self) -> bool {
        self.is_media || self.contains_media
    }
}

/// Events a document forwards to its agent, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    Play(ElementId),
    RateChanged(ElementId),
    NodesInserted(Vec<InsertedNode>),
    KeyDown(KeyPress),
    PointerEntered,
    PointerLeft,
    SurfaceAction(HotkeyAction),
}
