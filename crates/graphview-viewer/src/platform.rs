use crossbeam_channel::{Receiver, Sender, unbounded};
use graphview_core::Size;
use graphview_events::ModifierKeys;

use crate::input::{PointerPhase, RawInput, RawKeyEvent, RawPointerEvent};

/// What the viewer needs from the windowing platform.
pub trait PlatformSurface {
    /// Next pending pointer or keyboard event, in arrival order.
    fn poll_input(&mut self) -> Option<RawInput>;

    fn device_pixel_ratio(&self) -> f64;

    /// Size of the root drawing surface in screen pixels.
    fn surface_size(&self) -> Size;
}

/// In-memory surface fed through a channel. Clones of the sender returned by
/// [`SyntheticSurface::injector`] may live on other threads.
#[derive(Debug, Clone)]
pub struct SyntheticSurface {
    sender: Sender<RawInput>,
    receiver: Receiver<RawInput>,
    pixel_ratio: f64,
    size: Size,
}

impl Default for SyntheticSurface {
    fn default() -> Self {
        Self::new(Size::new(800.0, 600.0))
    }
}

impl SyntheticSurface {
    pub fn new(size: Size) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            pixel_ratio: 1.0,
            size,
        }
    }

    pub fn with_pixel_ratio(mut self, ratio: f64) -> Self {
        self.pixel_ratio = ratio;
        self
    }

    pub fn injector(&self) -> Sender<RawInput> {
        self.sender.clone()
    }

    pub fn push(&self, input: RawInput) {
        if let Err(e) = self.sender.send(input) {
            tracing::warn!("Synthetic surface dropped input: {}", e);
        }
    }

    pub fn pointer(&self, phase: PointerPhase, button: i16, x: f64, y: f64) {
        self.push(RawInput::Pointer(RawPointerEvent::new(phase, button, x, y)));
    }

    pub fn key_down(&self, modifiers: ModifierKeys) {
        self.push(RawInput::Key(RawKeyEvent::down(modifiers)));
    }

    pub fn key_up(&self) {
        self.push(RawInput::Key(RawKeyEvent::up()));
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl PlatformSurface for SyntheticSurface {
    fn poll_input(&mut self) -> Option<RawInput> {
        self.receiver.try_recv().ok()
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn surface_size(&self) -> Size {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inputs_come_out_in_order() {
        let mut surface = SyntheticSurface::default();
        surface.pointer(PointerPhase::Down, 0, 1.0, 1.0);
        surface.key_down(ModifierKeys::SHIFT);
        surface.pointer(PointerPhase::Up, 0, 2.0, 2.0);
        assert_eq!(surface.pending(), 3);

        assert!(matches!(
            surface.poll_input(),
            Some(RawInput::Pointer(RawPointerEvent { phase: PointerPhase::Down, .. }))
        ));
        assert!(matches!(surface.poll_input(), Some(RawInput::Key(_))));
        assert!(matches!(
            surface.poll_input(),
            Some(RawInput::Pointer(RawPointerEvent { phase: PointerPhase::Up, .. }))
        ));
        assert!(surface.poll_input().is_none());
    }

    #[test]
    fn test_injector_from_another_thread() {
        let mut surface = SyntheticSurface::default().with_pixel_ratio(2.0);
        let injector = surface.injector();
        std::thread::spawn(move || {
            injector
                .send(RawInput::Key(RawKeyEvent::up()))
                .unwrap();
        })
        .join()
        .unwrap();

        assert_eq!(surface.device_pixel_ratio(), 2.0);
        assert!(matches!(surface.poll_input(), Some(RawInput::Key(_))));
    }
}
