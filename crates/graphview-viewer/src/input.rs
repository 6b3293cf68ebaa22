use graphview_events::{ModifierKeys, MouseEventArgs};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerPhase {
    Down,
    Up,
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl MouseButton {
    /// Fixed platform button-code table. Unknown codes press nothing.
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Left),
            1 | 4 => Some(Self::Middle),
            2 => Some(Self::Right),
            _ => None,
        }
    }
}

/// Pointer event exactly as the platform reported it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPointerEvent {
    pub phase: PointerPhase,
    pub button: i16,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub clicks: u32,
}

impl RawPointerEvent {
    pub fn new(phase: PointerPhase, button: i16, x: f64, y: f64) -> Self {
        Self {
            phase,
            button,
            x,
            y,
            clicks: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyPhase {
    Down,
    Up,
}

/// Keyboard event with the platform's modifier flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawKeyEvent {
    pub phase: KeyPhase,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub control: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl RawKeyEvent {
    pub fn down(modifiers: ModifierKeys) -> Self {
        Self {
            phase: KeyPhase::Down,
            shift: modifiers.contains(ModifierKeys::SHIFT),
            control: modifiers.contains(ModifierKeys::CONTROL),
            alt: modifiers.contains(ModifierKeys::ALT),
            meta: modifiers.contains(ModifierKeys::META),
        }
    }

    pub fn up() -> Self {
        Self {
            phase: KeyPhase::Up,
            shift: false,
            control: false,
            alt: false,
            meta: false,
        }
    }

    fn modifiers(&self) -> ModifierKeys {
        let mut keys = ModifierKeys::NONE;
        keys.set(ModifierKeys::SHIFT, self.shift);
        keys.set(ModifierKeys::CONTROL, self.control);
        keys.set(ModifierKeys::ALT, self.alt);
        keys.set(ModifierKeys::META, self.meta);
        keys
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RawInput {
    Pointer(RawPointerEvent),
    Key(RawKeyEvent),
}

/// Turns raw platform events into [`MouseEventArgs`], stamping each with the
/// running modifier bitset. Holds no other state between events.
#[derive(Debug, Clone, Default)]
pub struct InputTranslator {
    modifiers: ModifierKeys,
}

impl InputTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modifiers(&self) -> ModifierKeys {
        self.modifiers
    }

    pub fn translate_pointer(&self, raw: &RawPointerEvent) -> MouseEventArgs {
        let mut args = MouseEventArgs {
            x: raw.x,
            y: raw.y,
            clicks: raw.clicks,
            modifiers: self.modifiers,
            ..Default::default()
        };
        match MouseButton::from_code(raw.button) {
            Some(MouseButton::Left) => args.left_button_is_pressed = true,
            Some(MouseButton::Middle) => args.middle_button_is_pressed = true,
            Some(MouseButton::Right) => args.right_button_is_pressed = true,
            None => {}
        }
        args
    }

    pub fn handle_key(&mut self, raw: &RawKeyEvent) {
        match raw.phase {
            KeyPhase::Down => self.key_down(raw),
            KeyPhase::Up => self.key_up(raw),
        }
    }

    /// Adds the modifiers reported by the event to the running set.
    pub fn key_down(&mut self, raw: &RawKeyEvent) {
        self.modifiers |= raw.modifiers();
    }

    /// Any key release clears every modifier, even ones still held. With
    /// Shift+Control down, releasing either one leaves no modifier set.
    pub fn key_up(&mut self, _raw: &RawKeyEvent) {
        self.modifiers = ModifierKeys::NONE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_code_table() {
        let translator = InputTranslator::new();
        let press = |code| {
            translator.translate_pointer(&RawPointerEvent::new(PointerPhase::Down, code, 1.0, 2.0))
        };

        assert!(press(0).left_button_is_pressed);
        assert!(press(1).middle_button_is_pressed);
        assert!(press(4).middle_button_is_pressed);
        assert!(press(2).right_button_is_pressed);
        assert!(!press(3).any_button_pressed());
        assert_eq!((press(0).x, press(0).y), (1.0, 2.0));
    }

    #[test]
    fn test_modifiers_accumulate_on_key_down() {
        let mut translator = InputTranslator::new();
        translator.key_down(&RawKeyEvent::down(ModifierKeys::SHIFT));
        translator.key_down(&RawKeyEvent::down(ModifierKeys::CONTROL));
        assert_eq!(
            translator.modifiers(),
            ModifierKeys::SHIFT | ModifierKeys::CONTROL
        );

        let moved = RawPointerEvent::new(PointerPhase::Move, -1, 0.0, 0.0);
        let args = translator.translate_pointer(&moved);
        assert!(args.modifiers.contains(ModifierKeys::SHIFT));
    }

    #[test]
    fn test_key_up_clears_everything() {
        let mut translator = InputTranslator::new();
        translator.handle_key(&RawKeyEvent::down(ModifierKeys::all()));
        let released_shift_only = RawKeyEvent {
            control: true,
            alt: true,
            meta: true,
            ..RawKeyEvent::up()
        };
        translator.handle_key(&released_shift_only);
        assert_eq!(translator.modifiers(), ModifierKeys::NONE);
    }
}
