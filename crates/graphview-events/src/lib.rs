//! Event channels and the normalized event records the viewer publishes.
//!
//! - [`EventChannel`] is an ordered, synchronous publish/subscribe list.
//! - [`ModifierKeys`] uses bitflags for easy combination.
//! - Pointer events are device neutral: buttons are booleans, positions are
//!   screen coordinates.

use bitflags::bitflags;
use graphview_core::{EdgeId, EntityRef, NodeId, PlaneTransform};
use serde::{Deserialize, Serialize};

pub mod channel;

pub use channel::{EventChannel, SubscriptionId};

bitflags! {
    /// Modifier keys held while an input event arrives.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ModifierKeys: u8 {
        const NONE    = 0b0000;
        const SHIFT   = 0b0001;
        const CONTROL = 0b0010;
        const ALT     = 0b0100;
        const META    = 0b1000;
    }
}

impl Default for ModifierKeys {
    fn default() -> Self {
        Self::NONE
    }
}

/// A pointer event after translation from the platform representation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MouseEventArgs {
    pub left_button_is_pressed: bool,
    pub middle_button_is_pressed: bool,
    pub right_button_is_pressed: bool,
    /// Set by a subscriber that consumed the event.
    pub handled: bool,
    pub x: f64,
    pub y: f64,
    pub clicks: u32,
    pub modifiers: ModifierKeys,
}

impl MouseEventArgs {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }

    pub fn any_button_pressed(&self) -> bool {
        self.left_button_is_pressed || self.middle_button_is_pressed || self.right_button_is_pressed
    }
}

/// What changed in the bound graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphChange {
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    EdgeAdded(EdgeId),
    EdgeRemoved(EdgeId),
    /// A drag gesture finished; carries every entity the drag moved.
    DragEnded(Vec<EntityRef>),
}

/// The screen/graph transform after a pan or zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewChange {
    pub transform: PlaneTransform,
    pub scale: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorObjectChange {
    pub old: Option<EntityRef>,
    pub new: Option<EntityRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_default_is_none() {
        assert_eq!(ModifierKeys::default(), ModifierKeys::NONE);
        assert!(ModifierKeys::default().is_empty());
    }

    #[test]
    fn test_modifier_combination() {
        let held = ModifierKeys::SHIFT | ModifierKeys::CONTROL;
        assert!(held.contains(ModifierKeys::SHIFT));
        assert!(held.contains(ModifierKeys::CONTROL));
        assert!(!held.contains(ModifierKeys::ALT));
    }

    #[test]
    fn test_mouse_event_args_at() {
        let args = MouseEventArgs::at(4.0, 5.0);
        assert_eq!((args.x, args.y), (4.0, 5.0));
        assert!(!args.any_button_pressed());
        assert_eq!(args.modifiers, ModifierKeys::NONE);
    }

    #[test]
    fn test_graph_change_serde() {
        let change = GraphChange::DragEnded(vec![EntityRef::Node(NodeId(1))]);
        let json = serde_json::to_string(&change).unwrap();
        let back: GraphChange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, change);
    }
}
