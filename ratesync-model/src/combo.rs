//! Canonical hotkey combo strings.
//!
//! A combo is an ordered subset of `Ctrl+`, `Meta+`, `Alt+`, `Shift+`
//! followed by a physical key identifier, e.g. `Ctrl+Shift+KeyS`.

use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Physical key identifiers that only ever act as modifiers.
const MODIFIER_CODES: &[&str] = &[
    "ControlLeft",
    "ControlRight",
    "MetaLeft",
    "MetaRight",
    "AltLeft",
    "AltRight",
    "ShiftLeft",
    "ShiftRight",
    "OSLeft",
    "OSRight",
];

/// Decoded modifier-plus-key combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeyCombo {
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
    pub shift: bool,
    /// Physical key identifier (`KeyS`, `ArrowUp`), not the produced character.
    pub code: String,
}

impl KeyCombo {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    /// Canonical string, modifiers in fixed Ctrl, Meta, Alt, Shift order.
    pub fn canonical(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(5);
        if self.ctrl {
            parts.push("Ctrl");
        }
        if self.meta {
            parts.push("Meta");
        }
        if self.alt {
            parts.push("Alt");
        }
        if self.shift {
            parts.push("Shift");
        }
        parts.push(&self.code);
        parts.join("+")
    }

    /// Copy with Meta folded into Ctrl.
    pub fn meta_as_ctrl(&self) -> KeyCombo {
        KeyCombo {
            ctrl: self.ctrl || self.meta,
            meta: false,
            ..self.clone()
        }
    }

    /// Whether this press matches a stored combo string.
    ///
    /// Meta and Ctrl are interchangeable: a press carrying Meta also
    /// matches the stored combo spelled with Ctrl. An empty stored combo
    /// means the action is unbound and never matches.
    pub fn matches(&self, stored: &str) -> bool {
        if stored.is_empty() {
            return false;
        }
        if self.canonical() == stored {
            return true;
        }
        self.meta && self.meta_as_ctrl().canonical() == stored
    }

    pub fn has_command_modifier(&self) -> bool {
        self.ctrl || self.meta || self.alt
    }

    pub fn is_modifier_only(&self) -> bool {
        self.code.is_empty() || MODIFIER_CODES.contains(&self.code.as_str())
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for KeyCombo {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut parts: Vec<&str> = raw.split('+').collect();
        let code = parts.pop().unwrap_or_default();
        if code.is_empty() {
            return Err(ModelError::InvalidCombo(raw.to_string()));
        }

        let mut combo = KeyCombo::new(code);
        for part in parts {
            let flag = match part {
                "Ctrl" => &mut combo.ctrl,
                "Meta" => &mut combo.meta,
                "Alt" => &mut combo.alt,
                "Shift" => &mut combo.shift,
                _ => return Err(ModelError::InvalidCombo(raw.to_string())),
            };
            if *flag {
                return Err(ModelError::InvalidCombo(raw.to_string()));
            }
            *flag = true;
        }
        Ok(combo)
    }
}

/// Render a combo with keyboard glyphs for display, e.g. `⌃⇧S`.
pub fn display_combo(combo: &str) -> String {
    if combo.is_empty() {
        return String::new();
    }
    combo
        .replacen("Ctrl+", "⌃", 1)
        .replacen("Alt+", "⌥", 1)
        .replacen("Shift+", "⇧", 1)
        .replacen("Meta+", "⌘", 1)
        .replacen("ArrowUp", "↑", 1)
        .replacen("ArrowDown", "↓", 1)
        .replacen("ArrowLeft", "←", 1)
        .replacen("ArrowRight", "→", 1)
        .replacen("Key", "", 1)
        .replacen("Digit", "", 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_is_fixed() {
        let combo = KeyCombo::new("KeyS").with_shift().with_alt().with_ctrl();
        assert_eq!(combo.canonical(), "Ctrl+Alt+Shift+KeyS");

        let combo = KeyCombo::new("KeyS").with_shift().with_meta().with_ctrl();
        assert_eq!(combo.canonical(), "Ctrl+Meta+Shift+KeyS");
    }

    #[test]
    fn ctrl_shift_s() {
        let combo = KeyCombo::new("KeyS").with_ctrl().with_shift();
        assert_eq!(combo.to_string(), "Ctrl+Shift+KeyS");
        assert!(combo.matches("Ctrl+Shift+KeyS"));
        assert!(!combo.matches("Ctrl+Shift+KeyA"));
    }

    #[test]
    fn meta_matches_ctrl_binding() {
        let combo = KeyCombo::new("KeyS").with_meta().with_shift();
        assert_eq!(combo.canonical(), "Meta+Shift+KeyS");
        assert!(combo.matches("Ctrl+Shift+KeyS"));
        assert!(combo.matches("Meta+Shift+KeyS"));
    }

    #[test]
    fn ctrl_does_not_match_meta_binding() {
        let combo = KeyCombo::new("KeyS").with_ctrl().with_shift();
        assert!(!combo.matches("Meta+Shift+KeyS"));
    }

    #[test]
    fn empty_binding_never_matches() {
        assert!(!KeyCombo::new("").matches(""));
        assert!(!KeyCombo::new("KeyS").with_ctrl().matches(""));
    }

    #[test]
    fn parse_round_trips_canonical_strings() {
        let combo: KeyCombo = "Ctrl+Alt+ArrowUp".parse().unwrap();
        assert!(combo.ctrl && combo.alt && !combo.shift);
        assert_eq!(combo.code, "ArrowUp");
        assert_eq!(combo.canonical(), "Ctrl+Alt+ArrowUp");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<KeyCombo>().is_err());
        assert!("Ctrl+".parse::<KeyCombo>().is_err());
        assert!("Hyper+KeyS".parse::<KeyCombo>().is_err());
        assert!("Ctrl+Ctrl+KeyS".parse::<KeyCombo>().is_err());
    }

    #[test]
    fn modifier_only_presses() {
        assert!(KeyCombo::new("ShiftLeft").with_shift().is_modifier_only());
        assert!(!KeyCombo::new("KeyA").is_modifier_only());
    }

    #[test]
    fn glyphs() {
        assert_eq!(display_combo("Ctrl+Shift+KeyS"), "⌃⇧S");
        assert_eq!(display_combo("Alt+ArrowUp"), "⌥↑");
        assert_eq!(display_combo("Ctrl+Digit1"), "⌃1");
        assert_eq!(display_combo(""), "");
    }
}
