//! Translation of winit window events into map input events
//!
//! winit reports physical pixels; the map works in logical pixels so hit
//! radii and tap thresholds mean the same on every display density.

use std::collections::BTreeMap;

use web_time::Instant;
use winit::dpi::PhysicalPosition;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

use crate::map::gesture::{InputEvent, TouchPhase};
use crate::map::projection::ScreenPoint;

/// Tracks the cursor and active touches between window events
#[derive(Debug, Default)]
pub struct InputTranslator {
    cursor: Option<ScreenPoint>,
    touches: BTreeMap<u64, ScreenPoint>,
}

impl InputTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map event for a window event, if it is one the map reacts to
    pub fn translate(&mut self, event: &WindowEvent, scale_factor: f64, at: Instant) -> Option<InputEvent> {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                Some(self.cursor_moved(to_logical(*position, scale_factor), at))
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                None
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => self.mouse_button(*state == ElementState::Pressed, at),
            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y as f64,
                    MouseScrollDelta::PixelDelta(p) => p.y,
                };
                self.wheel(y)
            }
            WindowEvent::Touch(touch) => {
                let position = to_logical(touch.location, scale_factor);
                Some(self.touch(touch.id, touch_phase(touch.phase), position, at))
            }
            _ => None,
        }
    }

    pub fn cursor_moved(&mut self, position: ScreenPoint, at: Instant) -> InputEvent {
        self.cursor = Some(position);
        InputEvent::PointerMove { position, at }
    }

    /// Left button press or release at the last known cursor position
    pub fn mouse_button(&mut self, pressed: bool, at: Instant) -> Option<InputEvent> {
        let position = self.cursor?;
        Some(if pressed {
            InputEvent::PointerDown { position, at }
        } else {
            InputEvent::PointerUp { position, at }
        })
    }

    /// `scroll_y` follows winit: positive scrolls up, which zooms in
    pub fn wheel(&self, scroll_y: f64) -> Option<InputEvent> {
        let position = self.cursor?;
        if scroll_y == 0.0 {
            return None;
        }
        Some(InputEvent::Wheel {
            position,
            delta: -scroll_y,
        })
    }

    pub fn touch(&mut self, id: u64, phase: TouchPhase, position: ScreenPoint, at: Instant) -> InputEvent {
        match phase {
            TouchPhase::Start | TouchPhase::Move => {
                self.touches.insert(id, position);
            }
            TouchPhase::End | TouchPhase::Cancel => {
                self.touches.remove(&id);
            }
        }
        InputEvent::Touch {
            phase,
            touches: self.touches.values().copied().collect(),
            at,
        }
    }

    pub fn active_touches(&self) -> usize {
        self.touches.len()
    }
}

fn to_logical(position: PhysicalPosition<f64>, scale_factor: f64) -> ScreenPoint {
    let scale = if scale_factor.is_finite() && scale_factor > 0.0 { scale_factor } else { 1.0 };
    ScreenPoint::new(position.x / scale, position.y / scale)
}

fn touch_phase(phase: winit::event::TouchPhase) -> TouchPhase {
    match phase {
        winit::event::TouchPhase::Started => TouchPhase::Start,
        winit::event::TouchPhase::Moved => TouchPhase::Move,
        winit::event::TouchPhase::Ended => TouchPhase::End,
        winit::event::TouchPhase::Cancelled => TouchPhase::Cancel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_are_logical_pixels() {
        let p = to_logical(PhysicalPosition::new(600.0, 200.0), 2.0);
        assert_eq!(p, ScreenPoint::new(300.0, 100.0));
        let p = to_logical(PhysicalPosition::new(600.0, 200.0), 0.0);
        assert_eq!(p, ScreenPoint::new(600.0, 200.0));
    }

    #[test]
    fn test_cancelled_touch_is_not_an_end() {
        assert_eq!(touch_phase(winit::event::TouchPhase::Cancelled), TouchPhase::Cancel);
        assert_eq!(touch_phase(winit::event::TouchPhase::Ended), TouchPhase::End);

        let mut input = InputTranslator::new();
        let now = Instant::now();
        let p = ScreenPoint::new(100.0, 100.0);
        input.touch(7, TouchPhase::Start, p, now);
        let event = input.touch(7, TouchPhase::Cancel, p, now);
        assert_eq!(
            event,
            InputEvent::Touch { phase: TouchPhase::Cancel, touches: vec![], at: now }
        );
        assert_eq!(input.active_touches(), 0);
    }

    #[test]
    fn test_buttons_need_a_cursor() {
        let mut input = InputTranslator::new();
        let now = Instant::now();
        assert_eq!(input.mouse_button(true, now), None);
        assert_eq!(input.wheel(1.0), None);

        let p = ScreenPoint::new(10.0, 20.0);
        input.cursor_moved(p, now);
        assert_eq!(input.mouse_button(true, now), Some(InputEvent::PointerDown { position: p, at: now }));
        assert_eq!(input.mouse_button(false, now), Some(InputEvent::PointerUp { position: p, at: now }));
    }

    #[test]
    fn test_wheel_sign() {
        let mut input = InputTranslator::new();
        let p = ScreenPoint::new(5.0, 5.0);
        input.cursor_moved(p, Instant::now());
        assert_eq!(input.wheel(1.0), Some(InputEvent::Wheel { position: p, delta: -1.0 }));
        assert_eq!(input.wheel(-3.0), Some(InputEvent::Wheel { position: p, delta: 3.0 }));
        assert_eq!(input.wheel(0.0), None);
    }

    #[test]
    fn test_touches_tracked_by_id() {
        let mut input = InputTranslator::new();
        let now = Instant::now();
        let a = ScreenPoint::new(0.0, 0.0);
        let b = ScreenPoint::new(100.0, 0.0);

        input.touch(1, TouchPhase::Start, a, now);
        let event = input.touch(2, TouchPhase::Start, b, now);
        assert_eq!(
            event,
            InputEvent::Touch { phase: TouchPhase::Start, touches: vec![a, b], at: now }
        );

        let moved = ScreenPoint::new(150.0, 0.0);
        let event = input.touch(2, TouchPhase::Move, moved, now);
        assert_eq!(
            event,
            InputEvent::Touch { phase: TouchPhase::Move, touches: vec![a, moved], at: now }
        );

        let event = input.touch(1, TouchPhase::End, a, now);
        assert_eq!(
            event,
            InputEvent::Touch { phase: TouchPhase::End, touches: vec![moved], at: now }
        );
        input.touch(2, TouchPhase::End, moved, now);
        assert_eq!(input.active_touches(), 0);
    }
}
