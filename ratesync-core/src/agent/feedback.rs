use ratesync_contracts::document::Document;
use ratesync_contracts::overlay::OverlaySurface;
use ratesync_model::{OverlayPosition, Settings, format_speed};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Transient speed display with a single auto-hide timer.
///
/// The surface is created on first need and lives as long as the agent.
/// Hovering cancels a pending hide; leaving re-arms it. A non-positive
/// timeout never arms the timer at all.
#[derive(Default)]
pub struct FeedbackScheduler {
    surface: Option<Box<dyn OverlaySurface>>,
    displayed: Option<f64>,
    visible: bool,
    hovered: bool,
    hide_at: Option<Instant>,
}

impl fmt::Debug for FeedbackScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedbackScheduler")
            .field("has_surface", &self.surface.is_some())
            .field("displayed", &self.displayed)
            .field("visible", &self.visible)
            .field("hovered", &self.hovered)
            .field("hide_at", &self.hide_at)
            .finish()
    }
}

impl FeedbackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the surface if it does not exist yet. It starts hidden.
    pub fn ensure_surface(
        &mut self,
        document: &dyn Document,
        settings: &Settings,
        speed: f64,
    ) {
        if self.surface.is_some() {
            return;
        }
        let mut surface = document.create_overlay(settings.overlay_position);
        surface.set_label(&format_speed(speed));
        surface.set_visible(false);
        self.surface = Some(surface);
        self.displayed = Some(speed);
    }

    /// Display `speed` and restart the auto-hide timer.
    pub fn show(
        &mut self,
        document: &dyn Document,
        settings: &Settings,
        speed: f64,
        now: Instant,
    ) {
        if !settings.show_overlay {
            return;
        }
        self.ensure_surface(document, settings, speed);
        let Some(surface) = self.surface.as_mut() else {
            return;
        };

        surface.set_label(&format_speed(speed));
        surface.set_visible(true);
        self.displayed = Some(speed);
        self.visible = true;
        self.arm(settings, now);
    }

    fn arm(&mut self, settings: &Settings, now: Instant) {
        self.hide_at = if settings.auto_hide_enabled() && !self.hovered {
            Some(now + hide_delay(settings))
        } else {
            None
        };
    }

    pub fn pointer_entered(&mut self) {
        self.hovered = true;
        self.hide_at = None;
        if let Some(surface) = self.surface.as_mut() {
            surface.set_visible(true);
            self.visible = true;
        }
    }

    pub fn pointer_left(&mut self, settings: &Settings, now: Instant) {
        self.hovered = false;
        if self.surface.is_some() {
            self.arm(settings, now);
        }
    }

    /// Hide the surface if its timer has run out. Returns whether it hid.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.hide_at {
            Some(deadline) if deadline <= now => {
                self.hide_at = None;
                if let Some(surface) = self.surface.as_mut() {
                    surface.set_visible(false);
                }
                self.visible = false;
                true
            }
            _ => false,
        }
    }

    pub fn reposition(&mut self, position: OverlayPosition) {
        if let Some(surface) = self.surface.as_mut() {
            surface.set_position(position);
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.hide_at
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    pub fn displayed(&self) -> Option<f64> {
        self.displayed
    }
}

fn hide_delay(settings: &Settings) -> Duration {
    Duration::from_millis(settings.overlay_timeout_ms.max(0).unsigned_abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::MemoryDocument;

    fn settings(timeout_ms: i64) -> Settings {
        Settings {
            overlay_timeout_ms: timeout_ms,
            ..Settings::default()
        }
    }

    #[test]
    fn show_arms_timer_and_expiry_hides() {
        let (document, _events) = MemoryDocument::new();
        let mut feedback = FeedbackScheduler::new();
        let now = Instant::now();

        feedback.show(document.as_ref(), &settings(2000), 1.5, now);

        assert_eq!(document.overlay().unwrap().label, "1.5x");
        assert!(document.overlay().unwrap().visible);
        assert_eq!(feedback.deadline(), Some(now + Duration::from_millis(2000)));

        assert!(!feedback.expire(now + Duration::from_millis(1999)));
        assert!(feedback.expire(now + Duration::from_millis(2000)));
        assert!(!document.overlay().unwrap().visible);
    }

    #[test]
    fn repeated_show_resets_single_timer() {
        let (document, _events) = MemoryDocument::new();
        let mut feedback = FeedbackScheduler::new();
        let now = Instant::now();

        feedback.show(document.as_ref(), &settings(1000), 1.5, now);
        let later = now + Duration::from_millis(800);
        feedback.show(document.as_ref(), &settings(1000), 1.6, later);

        assert!(!feedback.expire(now + Duration::from_millis(1000)));
        assert_eq!(feedback.deadline(), Some(later + Duration::from_millis(1000)));
        assert_eq!(document.overlays_created(), 1);
    }

    #[test]
    fn zero_timeout_never_hides() {
        let (document, _events) = MemoryDocument::new();
        let mut feedback = FeedbackScheduler::new();
        let now = Instant::now();

        feedback.show(document.as_ref(), &settings(0), 2.0, now);

        assert_eq!(feedback.deadline(), None);
        assert!(!feedback.expire(now + Duration::from_secs(3600)));
        assert!(document.overlay().unwrap().visible);
    }

    #[test]
    fn hover_cancels_and_leave_rearms() {
        let (document, _events) = MemoryDocument::new();
        let mut feedback = FeedbackScheduler::new();
        let config = settings(500);
        let now = Instant::now();

        feedback.show(document.as_ref(), &config, 2.0, now);
        feedback.pointer_entered();
        assert_eq!(feedback.deadline(), None);
        assert!(!feedback.expire(now + Duration::from_secs(5)));

        let left = now + Duration::from_secs(5);
        feedback.pointer_left(&config, left);
        assert_eq!(feedback.deadline(), Some(left + Duration::from_millis(500)));
        assert!(feedback.expire(left + Duration::from_millis(500)));
    }

    #[test]
    fn disabled_overlay_creates_nothing() {
        let (document, _events) = MemoryDocument::new();
        let mut feedback = FeedbackScheduler::new();
        let config = Settings {
            show_overlay: false,
            ..Settings::default()
        };

        feedback.show(document.as_ref(), &config, 2.0, Instant::now());

        assert!(!feedback.has_surface());
        assert_eq!(document.overlays_created(), 0);
    }
}
