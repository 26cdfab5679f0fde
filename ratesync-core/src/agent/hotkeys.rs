use ratesync_contracts::events::KeyPress;
use ratesync_model::{HotkeyAction, HotkeyBindings};

/// Map a key press to a configured action.
///
/// Presses aimed at text entry are never hotkeys, whatever their modifiers.
pub fn decode(
    press: &KeyPress,
    bindings: &HotkeyBindings,
) -> Option<HotkeyAction> {
    if press.target.accepts_text() {
        return None;
    }
    bindings.resolve(&press.combo())
}
