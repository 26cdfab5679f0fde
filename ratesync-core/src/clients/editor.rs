use ratesync_contracts::events::KeyPress;
use ratesync_model::{HotkeyAction, OverlayPosition, Settings, display_combo};
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::info;

use crate::error::Result;
use crate::ports::{ContextChannel, DeliveryReport, Store, StoreExt, fan_out};
use crate::protocol::ContextMessage;

/// Why a recorded key press was not accepted as a hotkey.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HotkeyRejection {
    #[error("Hotkey must include Ctrl, Alt, or Cmd")]
    MissingCommandModifier,

    #[error("This shortcut is already used for \"{0}\"")]
    Conflict(HotkeyAction),
}

/// Settings editor: records hotkeys, edits overlay and step options and
/// publishes the result to every context.
pub struct SettingsEditor {
    store: Arc<dyn Store>,
    contexts: Arc<dyn ContextChannel>,
    settings: Settings,
}

impl fmt::Debug for SettingsEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsEditor")
            .field("settings", &self.settings)
            .finish()
    }
}

impl SettingsEditor {
    /// Load the stored settings, filling absent fields with defaults.
    pub async fn open(
        store: Arc<dyn Store>,
        contexts: Arc<dyn ContextChannel>,
    ) -> Result<Self> {
        let settings = store.load_settings().await?;
        Ok(Self {
            store,
            contexts,
            settings,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Bind `action` to the combo of `press`.
    ///
    /// Modifier-only presses are ignored and yield `Ok(None)`, the editor
    /// keeps waiting for a real key. Meta is recorded as Ctrl.
    pub fn record_hotkey(
        &mut self,
        action: HotkeyAction,
        press: &KeyPress,
    ) -> std::result::Result<Option<String>, HotkeyRejection> {
        let combo = press.combo();
        if combo.is_modifier_only() {
            return Ok(None);
        }
        if !combo.has_command_modifier() {
            return Err(HotkeyRejection::MissingCommandModifier);
        }

        let canonical = combo.meta_as_ctrl().canonical();
        if let Some(other) = self.settings.hotkeys.conflict(action, &canonical)
        {
            return Err(HotkeyRejection::Conflict(other));
        }

        self.settings.hotkeys.set(action, canonical.clone());
        Ok(Some(canonical))
    }

    /// Leave `action` unbound.
    pub fn clear_hotkey(&mut self, action: HotkeyAction) {
        self.settings.hotkeys.set(action, "");
    }

    pub fn set_increment(&mut self, increment: f64) {
        self.settings.increment = increment;
    }

    pub fn set_overlay_position(&mut self, position: OverlayPosition) {
        self.settings.overlay_position = position;
    }

    pub fn set_overlay_timeout(&mut self, timeout_ms: i64) {
        self.settings.overlay_timeout_ms = timeout_ms;
    }

    pub fn set_show_overlay(&mut self, show: bool) {
        self.settings.show_overlay = show;
    }

    pub fn set_presets(&mut self, presets: Vec<f64>) {
        self.settings.presets = presets;
    }

    /// Persist the settings and tell every context about them.
    pub async fn save(&self) -> Result<DeliveryReport> {
        self.settings.validate()?;
        self.store.save_settings(&self.settings).await?;

        let message = ContextMessage::SettingsUpdated {
            settings: self.settings.clone(),
        };
        let report = fan_out(self.contexts.as_ref(), &message, None).await;
        info!(
            "Settings saved, {} of {} contexts notified",
            report.delivered.len(),
            report.attempted()
        );
        Ok(report)
    }

    /// Display text for an action's binding.
    pub fn display(&self, action: HotkeyAction) -> String {
        let combo = self.settings.hotkeys.get(action);
        if combo.is_empty() {
            "Not set".to_string()
        } else {
            display_combo(combo)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::infra::{ContextHub, MemoryStore};
    use crate::ports::StoreKey;
    use serde_json::json;

    async fn editor() -> (SettingsEditor, Arc<MemoryStore>, ContextHub) {
        let store = Arc::new(MemoryStore::new(8));
        let hub = ContextHub::new(8);
        let editor = SettingsEditor::open(store.clone(), Arc::new(hub.clone()))
            .await
            .unwrap();
        (editor, store, hub)
    }

    #[tokio::test]
    async fn partial_record_keeps_default_hotkeys() {
        let store = Arc::new(MemoryStore::new(8));
        store
            .set(
                StoreKey::Settings,
                json!({"increment": 0.5, "hotkeys": {"toggle": "Alt+KeyT"}}),
            )
            .await
            .unwrap();

        let editor = SettingsEditor::open(store, Arc::new(ContextHub::new(8)))
            .await
            .unwrap();

        assert_eq!(editor.settings().increment, 0.5);
        assert_eq!(editor.settings().hotkeys.toggle, "Alt+KeyT");
        assert_eq!(editor.settings().hotkeys.increase, "Ctrl+Shift+KeyS");
        assert_eq!(editor.display(HotkeyAction::Toggle), "⌥T");
    }

    #[tokio::test]
    async fn meta_is_recorded_as_ctrl() {
        let (mut editor, _store, _hub) = editor().await;

        let press = KeyPress::new("ArrowUp").meta();
        let recorded = editor.record_hotkey(HotkeyAction::Increase, &press);

        assert_eq!(recorded, Ok(Some("Ctrl+ArrowUp".to_string())));
        assert_eq!(editor.display(HotkeyAction::Increase), "⌃↑");
    }

    #[tokio::test]
    async fn modifier_only_press_is_ignored() {
        let (mut editor, _store, _hub) = editor().await;

        let press = KeyPress::new("ShiftLeft").ctrl().shift();

        assert_eq!(editor.record_hotkey(HotkeyAction::Toggle, &press), Ok(None));
        assert_eq!(editor.settings().hotkeys.toggle, "Ctrl+Shift+KeyD");
    }

    #[tokio::test]
    async fn rejects_plain_and_conflicting_combos() {
        let (mut editor, _store, _hub) = editor().await;

        let plain = KeyPress::new("KeyQ").shift();
        assert_eq!(
            editor.record_hotkey(HotkeyAction::Toggle, &plain),
            Err(HotkeyRejection::MissingCommandModifier)
        );

        let taken = KeyPress::new("KeyS").ctrl().shift();
        assert_eq!(
            editor.record_hotkey(HotkeyAction::Toggle, &taken),
            Err(HotkeyRejection::Conflict(HotkeyAction::Increase))
        );
    }

    #[tokio::test]
    async fn save_persists_and_notifies_contexts() {
        let (mut editor, store, hub) = editor().await;
        let (_id, mut mailbox) = hub.register();
        editor.clear_hotkey(HotkeyAction::Decrease);
        editor.set_overlay_position(OverlayPosition::TopLeft);
        editor.set_overlay_timeout(0);

        let report = editor.save().await.unwrap();

        assert_eq!(report.delivered.len(), 1);
        let stored = store.load_settings().await.unwrap();
        assert_eq!(stored.hotkeys.decrease, "");
        assert_eq!(stored.overlay_position, OverlayPosition::TopLeft);
        assert_eq!(editor.display(HotkeyAction::Decrease), "Not set");
        assert!(matches!(
            mailbox.recv().await,
            Some(ContextMessage::SettingsUpdated { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_settings_are_not_saved() {
        let (mut editor, store, _hub) = editor().await;
        editor.set_increment(-1.0);

        let err = editor.save().await.unwrap_err();

        assert!(matches!(err, CoreError::Model(_)));
        assert_eq!(store.peek(StoreKey::Settings), None);
    }
}
