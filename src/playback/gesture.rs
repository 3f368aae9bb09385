//! Pointer gestures over the story card
//!
//! Two invisible tap zones sit at the card's edges. A horizontal drag past
//! the swipe threshold navigates; a downward drag past the (larger) dismiss
//! threshold closes the player.

use serde::{Deserialize, Serialize};

/// Invisible tap target on the card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TapZone {
    /// Previous story
    Left,
    /// No navigation
    Middle,
    /// Next story
    Right,
}

impl TapZone {
    /// Map a pointer x coordinate on a card of `width` to a zone
    ///
    /// `edge_fraction` is the share of the width each edge zone covers.
    pub fn from_position(x: f64, width: f64, edge_fraction: f64) -> Self {
        if width <= 0.0 {
            return TapZone::Middle;
        }
        let edge = width * edge_fraction.clamp(0.0, 0.5);
        if x < edge {
            TapZone::Left
        } else if x > width - edge {
            TapZone::Right
        } else {
            TapZone::Middle
        }
    }
}

/// What a completed drag asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragAction {
    Previous,
    Next,
    Dismiss,
    None,
}

/// Drag distance thresholds in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragThresholds {
    pub swipe_px: f64,
    pub dismiss_px: f64,
}

impl DragAction {
    /// Classify a drag by its total displacement
    ///
    /// Dragging right (positive dx) goes back, dragging left goes forward,
    /// dragging down (positive dy) dismisses.
    pub fn classify(dx: f64, dy: f64, thresholds: DragThresholds) -> Self {
        if dy > thresholds.dismiss_px && dy.abs() > dx.abs() {
            return DragAction::Dismiss;
        }
        if dx.abs() > thresholds.swipe_px && dx.abs() >= dy.abs() {
            return if dx > 0.0 {
                DragAction::Previous
            } else {
                DragAction::Next
            };
        }
        DragAction::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLDS: DragThresholds = DragThresholds {
        swipe_px: 50.0,
        dismiss_px: 100.0,
    };

    #[test]
    fn test_tap_zones() {
        assert_eq!(TapZone::from_position(10.0, 300.0, 1.0 / 3.0), TapZone::Left);
        assert_eq!(TapZone::from_position(150.0, 300.0, 1.0 / 3.0), TapZone::Middle);
        assert_eq!(TapZone::from_position(290.0, 300.0, 1.0 / 3.0), TapZone::Right);
        assert_eq!(TapZone::from_position(10.0, 0.0, 1.0 / 3.0), TapZone::Middle);
    }

    #[test]
    fn test_horizontal_drags() {
        assert_eq!(DragAction::classify(80.0, 5.0, THRESHOLDS), DragAction::Previous);
        assert_eq!(DragAction::classify(-80.0, 5.0, THRESHOLDS), DragAction::Next);
        assert_eq!(DragAction::classify(30.0, 0.0, THRESHOLDS), DragAction::None);
    }

    #[test]
    fn test_vertical_drags() {
        assert_eq!(DragAction::classify(10.0, 140.0, THRESHOLDS), DragAction::Dismiss);
        // Past the swipe distance but short of the dismiss distance
        assert_eq!(DragAction::classify(0.0, 80.0, THRESHOLDS), DragAction::None);
        // Upward drags never dismiss
        assert_eq!(DragAction::classify(0.0, -200.0, THRESHOLDS), DragAction::None);
    }
}
