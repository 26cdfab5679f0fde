#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::combo::KeyCombo;
use crate::error::ModelError;

/// Screen corner the feedback surface is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum OverlayPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

impl OverlayPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlayPosition::TopLeft => "top-left",
            OverlayPosition::TopRight => "top-right",
            OverlayPosition::BottomLeft => "bottom-left",
            OverlayPosition::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for OverlayPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions a hotkey or surface control can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum HotkeyAction {
    Increase,
    Decrease,
    Toggle,
}

impl HotkeyAction {
    /// Evaluation order when decoding a key press.
    pub const ALL: [HotkeyAction; 3] = [
        HotkeyAction::Toggle,
        HotkeyAction::Increase,
        HotkeyAction::Decrease,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HotkeyAction::Increase => "increase",
            HotkeyAction::Decrease => "decrease",
            HotkeyAction::Toggle => "toggle",
        }
    }
}

impl fmt::Display for HotkeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_decrease() -> String {
    "Ctrl+Shift+KeyA".to_string()
}

fn default_increase() -> String {
    "Ctrl+Shift+KeyS".to_string()
}

fn default_toggle() -> String {
    "Ctrl+Shift+KeyD".to_string()
}

/// Combo string per action. An empty string means unbound.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HotkeyBindings {
    #[cfg_attr(feature = "serde", serde(default = "default_decrease"))]
    pub decrease: String,
    #[cfg_attr(feature = "serde", serde(default = "default_increase"))]
    pub increase: String,
    #[cfg_attr(feature = "serde", serde(default = "default_toggle"))]
    pub toggle: String,
}

impl Default for HotkeyBindings {
    fn default() -> Self {
        Self {
            decrease: default_decrease(),
            increase: default_increase(),
            toggle: default_toggle(),
        }
    }
}

impl HotkeyBindings {
    pub fn get(&self, action: HotkeyAction) -> &str {
        match action {
            HotkeyAction::Increase => &self.increase,
            HotkeyAction::Decrease => &self.decrease,
            HotkeyAction::Toggle => &self.toggle,
        }
    }

    pub fn set(&mut self, action: HotkeyAction, combo: impl Into<String>) {
        let slot = match action {
            HotkeyAction::Increase => &mut self.increase,
            HotkeyAction::Decrease => &mut self.decrease,
            HotkeyAction::Toggle => &mut self.toggle,
        };
        *slot = combo.into();
    }

    /// First action whose stored combo matches the press.
    pub fn resolve(&self, combo: &KeyCombo) -> Option<HotkeyAction> {
        HotkeyAction::ALL
            .into_iter()
            .find(|action| combo.matches(self.get(*action)))
    }

    /// Another action already bound to `combo`, if any.
    pub fn conflict(
        &self,
        action: HotkeyAction,
        combo: &str,
    ) -> Option<HotkeyAction> {
        HotkeyAction::ALL.into_iter().find(|other| {
            *other != action && !combo.is_empty() && self.get(*other) == combo
        })
    }
}

fn default_increment() -> f64 {
    0.1
}

fn default_overlay_timeout() -> i64 {
    2000
}

fn default_show_overlay() -> bool {
    true
}

fn default_presets() -> Vec<f64> {
    vec![0.5, 1.0, 1.5, 2.0, 2.5, 3.0]
}

/// User-editable settings shared by every context.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Settings {
    #[cfg_attr(feature = "serde", serde(default = "default_increment"))]
    pub increment: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub overlay_position: OverlayPosition,
    /// Auto-hide delay in milliseconds; zero or below disables auto-hide.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "overlayTimeout", default = "default_overlay_timeout")
    )]
    pub overlay_timeout_ms: i64,
    #[cfg_attr(feature = "serde", serde(default = "default_show_overlay"))]
    pub show_overlay: bool,
    #[cfg_attr(feature = "serde", serde(default = "default_presets"))]
    pub presets: Vec<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub hotkeys: HotkeyBindings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            increment: default_increment(),
            overlay_position: OverlayPosition::default(),
            overlay_timeout_ms: default_overlay_timeout(),
            show_overlay: default_show_overlay(),
            presets: default_presets(),
            hotkeys: HotkeyBindings::default(),
        }
    }
}

impl Settings {
    /// Step size, falling back to the default for unusable values.
    pub fn effective_increment(&self) -> f64 {
        if self.increment.is_finite() && self.increment > 0.0 {
            self.increment
        } else {
            default_increment()
        }
    }

    pub fn auto_hide_enabled(&self) -> bool {
        self.overlay_timeout_ms > 0
    }

    /// Check the record the way the settings editor does before saving.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !(self.increment.is_finite() && self.increment > 0.0) {
            return Err(ModelError::InvalidSettings(format!(
                "increment must be positive, got {}",
                self.increment
            )));
        }

        for action in HotkeyAction::ALL {
            let raw = self.hotkeys.get(action);
            if raw.is_empty() {
                continue;
            }
            let combo: KeyCombo = raw.parse()?;
            if !combo.has_command_modifier() {
                return Err(ModelError::InvalidSettings(format!(
                    "hotkey for {action} must include Ctrl, Alt or Meta"
                )));
            }
            if let Some(other) = self.hotkeys.conflict(action, raw) {
                return Err(ModelError::InvalidSettings(format!(
                    "hotkey {raw} is bound to both {action} and {other}"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_first_run_record() {
        let settings = Settings::default();
        assert_eq!(settings.increment, 0.1);
        assert_eq!(settings.overlay_position, OverlayPosition::BottomRight);
        assert_eq!(settings.overlay_timeout_ms, 2000);
        assert!(settings.show_overlay);
        assert_eq!(settings.hotkeys.increase, "Ctrl+Shift+KeyS");
        assert_eq!(settings.hotkeys.decrease, "Ctrl+Shift+KeyA");
        assert_eq!(settings.hotkeys.toggle, "Ctrl+Shift+KeyD");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn resolve_maps_press_to_action() {
        let bindings = HotkeyBindings::default();
        let press = KeyCombo::new("KeyD").with_ctrl().with_shift();
        assert_eq!(bindings.resolve(&press), Some(HotkeyAction::Toggle));
        let press = KeyCombo::new("KeyD").with_ctrl();
        assert_eq!(bindings.resolve(&press), None);
    }

    #[test]
    fn unbound_action_is_skipped() {
        let mut bindings = HotkeyBindings::default();
        bindings.set(HotkeyAction::Increase, "");
        let press = KeyCombo::new("KeyS").with_ctrl().with_shift();
        assert_eq!(bindings.resolve(&press), None);
    }

    #[test]
    fn validate_rejects_plain_keys_and_duplicates() {
        let mut settings = Settings::default();
        settings.hotkeys.set(HotkeyAction::Increase, "Shift+KeyS");
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.hotkeys.set(HotkeyAction::Increase, "Ctrl+Shift+KeyA");
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.increment = 0.0;
        assert!(settings.validate().is_err());
        assert_eq!(settings.effective_increment(), 0.1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_record_merges_with_defaults() {
        let raw = r#"{"increment":0.25,"overlayTimeout":0,"hotkeys":{"toggle":""}}"#;
        let settings: Settings = serde_json::from_str(raw).unwrap();
        assert_eq!(settings.increment, 0.25);
        assert_eq!(settings.overlay_timeout_ms, 0);
        assert!(!settings.auto_hide_enabled());
        assert_eq!(settings.hotkeys.toggle, "");
        assert_eq!(settings.hotkeys.increase, "Ctrl+Shift+KeyS");
        assert_eq!(settings.presets, default_presets());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn wire_shape_uses_record_keys() {
        let value = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(value["overlayPosition"], "bottom-right");
        assert_eq!(value["overlayTimeout"], 2000);
        assert_eq!(value["showOverlay"], true);
    }
}
