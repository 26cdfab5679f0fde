#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::speed::{
    DEFAULT_LAST_SPEED, NORMAL_SPEED, clamp_speed, is_normal, speeds_equal,
};

fn default_current_speed() -> f64 {
    NORMAL_SPEED
}

fn default_last_speed() -> f64 {
    DEFAULT_LAST_SPEED
}

/// Authoritative playback state shared by every context.
///
/// `last_speed` remembers the most recent non-1x speed so toggling can swap
/// between 1x and that value.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct PlaybackState {
    #[cfg_attr(feature = "serde", serde(default = "default_current_speed"))]
    pub current_speed: f64,
    #[cfg_attr(feature = "serde", serde(default = "default_last_speed"))]
    pub last_speed: f64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_speed: default_current_speed(),
            last_speed: default_last_speed(),
        }
    }
}

impl PlaybackState {
    pub fn new(current_speed: f64, last_speed: f64) -> Self {
        Self {
            current_speed,
            last_speed,
        }
    }

    /// State after moving to `requested`.
    ///
    /// The request is clamped and rounded first. Any non-1x target becomes
    /// the new `last_speed`; moving into 1x captures the speed being left.
    pub fn transition(&self, requested: f64) -> PlaybackState {
        let speed = clamp_speed(requested);
        let last_speed = if !is_normal(speed) {
            speed
        } else if !is_normal(self.current_speed) {
            self.current_speed
        } else {
            self.last_speed
        };

        PlaybackState {
            current_speed: speed,
            last_speed,
        }
    }

    /// Speed a toggle would request from this state.
    pub fn toggle_target(&self) -> f64 {
        if is_normal(self.current_speed) {
            if self.last_speed.is_finite() && self.last_speed > 0.0 {
                self.last_speed
            } else {
                DEFAULT_LAST_SPEED
            }
        } else {
            NORMAL_SPEED
        }
    }

    /// State after a toggle.
    pub fn toggled(&self) -> PlaybackState {
        self.transition(self.toggle_target())
    }

    /// State after nudging the current speed by `delta`.
    pub fn stepped(&self, delta: f64) -> PlaybackState {
        self.transition(self.current_speed + delta)
    }

    /// Clamp both fields into the legal range, repairing a record that was
    /// written by an older or misbehaving client.
    pub fn sanitized(&self) -> PlaybackState {
        let last_speed = if self.last_speed.is_finite() {
            clamp_speed(self.last_speed)
        } else {
            DEFAULT_LAST_SPEED
        };
        PlaybackState {
            current_speed: clamp_speed(self.current_speed),
            last_speed,
        }
    }

    /// Field-wise equality within the speed tolerance.
    pub fn same_as(&self, other: &PlaybackState) -> bool {
        speeds_equal(self.current_speed, other.current_speed)
            && speeds_equal(self.last_speed, other.last_speed)
    }
}
