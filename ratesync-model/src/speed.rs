//! Playback speed arithmetic shared by every participant.
//!
//! Every writer of a speed value (agent, broker, quick panel) runs the same
//! clamp-and-round rule so values stay bit-identical across contexts.

/// Slowest speed any element is ever driven to.
pub const MIN_SPEED: f64 = 0.25;

/// Fastest speed any element is ever driven to.
pub const MAX_SPEED: f64 = 4.0;

/// Neutral playback speed. Toggling pivots around this value.
pub const NORMAL_SPEED: f64 = 1.0;

/// Fallback toggle target when no non-normal speed was ever recorded.
pub const DEFAULT_LAST_SPEED: f64 = 1.5;

const EPSILON: f64 = 1e-9;

/// Round to two decimal places.
pub fn round_speed(speed: f64) -> f64 {
    (speed * 100.0).round() / 100.0
}

/// Clamp into `[MIN_SPEED, MAX_SPEED]` and round to two decimal places.
///
/// Non-finite input collapses to [`NORMAL_SPEED`].
pub fn clamp_speed(speed: f64) -> f64 {
    if !speed.is_finite() {
        return NORMAL_SPEED;
    }
    round_speed(speed.clamp(MIN_SPEED, MAX_SPEED))
}

/// Equality with a tolerance well below the 0.01 resolution.
pub fn speeds_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// Whether `speed` is the neutral 1x speed.
pub fn is_normal(speed: f64) -> bool {
    speeds_equal(speed, NORMAL_SPEED)
}

/// Human readable label: `2x`, `1.5x`, `1.25x`.
pub fn format_speed(speed: f64) -> String {
    let rounded = round_speed(speed);
    if speeds_equal(rounded, rounded.trunc()) {
        return format!("{}x", rounded.trunc() as i64);
    }
    let text = format!("{rounded:.2}");
    let text = text.trim_end_matches('0');
    format!("{text}x")
}
