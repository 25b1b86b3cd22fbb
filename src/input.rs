use std::collections::HashSet;

use glam::Vec2;

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);
    pub const RIGHT: Self = Self(1);
    pub const MIDDLE: Self = Self(2);

    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

/// Keyboard modifiers held while a pointer event happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

/// Pointer input in window coordinates (physical pixels, origin top left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down {
        button: MouseButton,
        position: Vec2,
        modifiers: Modifiers,
    },
    Drag {
        button: MouseButton,
        position: Vec2,
        modifiers: Modifiers,
    },
    Up {
        button: MouseButton,
        position: Vec2,
    },
    /// Wheel movement in lines, positive away from the user.
    Wheel { delta: f32, position: Vec2 },
}

/// Turns raw button, motion and wheel input into [`PointerEvent`]s.
#[derive(Debug, Default)]
pub struct PointerTracker {
    buttons: HashSet<MouseButton>,
    position: Vec2,
    modifiers: Modifiers,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_modifiers(&mut self, modifiers: Modifiers) {
        self.modifiers = modifiers;
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn is_down(&self, button: MouseButton) -> bool {
        self.buttons.contains(&button)
    }

    pub fn press(&mut self, button: MouseButton) -> PointerEvent {
        self.buttons.insert(button);
        PointerEvent::Down {
            button,
            position: self.position,
            modifiers: self.modifiers,
        }
    }

    /// Returns `None` when the button was never reported as pressed.
    pub fn release(&mut self, button: MouseButton) -> Option<PointerEvent> {
        self.buttons.remove(&button).then_some(PointerEvent::Up {
            button,
            position: self.position,
        })
    }

    /// Moves the pointer; yields a drag while any button is held.
    pub fn move_to(&mut self, position: Vec2) -> Option<PointerEvent> {
        self.position = position;
        let button = [MouseButton::LEFT, MouseButton::MIDDLE, MouseButton::RIGHT]
            .into_iter()
            .find(|button| self.buttons.contains(button))?;
        Some(PointerEvent::Drag {
            button,
            position,
            modifiers: self.modifiers,
        })
    }

    pub fn wheel(&mut self, delta: f32) -> PointerEvent {
        PointerEvent::Wheel {
            delta,
            position: self.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motion_without_buttons_is_not_a_drag() {
        let mut tracker = PointerTracker::new();
        assert_eq!(tracker.move_to(Vec2::new(4.0, 2.0)), None);
        assert_eq!(tracker.position(), Vec2::new(4.0, 2.0));
    }

    #[test]
    fn drags_report_the_held_button_and_modifiers() {
        let mut tracker = PointerTracker::new();
        tracker.set_modifiers(Modifiers {
            shift: true,
            ..Modifiers::default()
        });
        tracker.press(MouseButton::RIGHT);
        match tracker.move_to(Vec2::ONE) {
            Some(PointerEvent::Drag {
                button, modifiers, ..
            }) => {
                assert_eq!(button, MouseButton::RIGHT);
                assert!(modifiers.shift);
            }
            other => panic!("expected drag, got {other:?}"),
        }
    }

    #[test]
    fn release_requires_a_press() {
        let mut tracker = PointerTracker::new();
        assert_eq!(tracker.release(MouseButton::LEFT), None);
        tracker.press(MouseButton::LEFT);
        assert!(tracker.is_down(MouseButton::LEFT));
        assert!(matches!(
            tracker.release(MouseButton::LEFT),
            Some(PointerEvent::Up { .. })
        ));
        assert!(!tracker.is_down(MouseButton::LEFT));
    }
}
