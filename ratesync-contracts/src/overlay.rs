use ratesync_model::OverlayPosition;

/// Host-rendered feedback surface showing the current speed.
///
/// The agent owns timing and visibility decisions; the surface only draws.
pub trait OverlaySurface: Send + Sync {
    fn set_label(&mut self, label: &str);

    fn set_visible(&mut self, visible: bool);

    fn set_position(&mut self, position: OverlayPosition);
}
