//! Pan / zoom / pinch gesture state machine
//!
//! Transitions are a pure function of `(state, event, view)`; the controller
//! applies the resulting effects to a [`Viewport`].

use web_time::{Duration, Instant};

use super::config::MapConfig;
use super::projection::{GeoPoint, ScreenPoint};
use super::viewport::{PanAnchor, Viewport};

/// Pinches that start with fingers closer than this never zoom
const MIN_PINCH_DISTANCE: f64 = 1e-6;

/// Thresholds for gesture recognition
#[derive(Debug, Clone, PartialEq)]
pub struct GestureConfig {
    /// Zoom change per wheel event
    pub wheel_step: f64,
    /// Movement beyond which a press is no longer a tap
    pub tap_max_move: f64,
    /// Maximum press duration for a tap
    pub tap_max_duration: Duration,
}

impl From<&MapConfig> for GestureConfig {
    fn from(config: &MapConfig) -> Self {
        Self {
            wheel_step: config.zoom_wheel_step,
            tap_max_move: config.tap_max_move_px,
            tap_max_duration: config.tap_max_duration(),
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self::from(&MapConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Start,
    Move,
    End,
    /// The platform aborted the contact; never completes a tap
    Cancel,
}

/// Low-level input, already in screen pixels
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown { position: ScreenPoint, at: Instant },
    PointerMove { position: ScreenPoint, at: Instant },
    PointerUp { position: ScreenPoint, at: Instant },
    /// Positive delta scrolls down, i.e. zooms out
    Wheel { position: ScreenPoint, delta: f64 },
    /// `touches` lists every contact still down after the change
    Touch {
        phase: TouchPhase,
        touches: Vec<ScreenPoint>,
        at: Instant,
    },
}

/// Press that may still turn out to be a tap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapCandidate {
    pub start: ScreenPoint,
    pub started_at: Instant,
    pub cancelled: bool,
}

impl TapCandidate {
    fn new(start: ScreenPoint, started_at: Instant) -> Self {
        Self {
            start,
            started_at,
            cancelled: false,
        }
    }

    fn cancelled(start: ScreenPoint, started_at: Instant) -> Self {
        Self {
            cancelled: true,
            ..Self::new(start, started_at)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum GestureState {
    #[default]
    Idle,
    Panning {
        anchor: PanAnchor,
        tap: TapCandidate,
    },
    Pinching {
        start_distance: f64,
        start_zoom: f64,
    },
}

/// Viewport values a transition may capture as anchors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSnapshot {
    pub center: GeoPoint,
    pub zoom: f64,
}

impl From<&Viewport> for ViewSnapshot {
    fn from(viewport: &Viewport) -> Self {
        Self {
            center: viewport.center(),
            zoom: viewport.zoom(),
        }
    }
}

/// Output of a transition
#[derive(Debug, Clone, PartialEq)]
pub enum GestureEffect {
    Pan { anchor: PanAnchor, dx: f64, dy: f64 },
    ZoomTo { zoom: f64, anchor: ScreenPoint },
    Tap(ScreenPoint),
    Hover(ScreenPoint),
}

/// Pointer interactions left for the caller after viewport effects are applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interaction {
    Tap(ScreenPoint),
    Hover(ScreenPoint),
}

/// Compute the next gesture state and its effects
pub fn transition(
    state: GestureState,
    event: &InputEvent,
    view: ViewSnapshot,
    config: &GestureConfig,
) -> (GestureState, Vec<GestureEffect>) {
    match event {
        InputEvent::Wheel { position, delta } => {
            let step = if *delta > 0.0 {
                -config.wheel_step
            } else if *delta < 0.0 {
                config.wheel_step
            } else {
                return (state, Vec::new());
            };
            // Stations move under the still cursor, so hover is re-evaluated
            let effects = vec![
                GestureEffect::ZoomTo {
                    zoom: view.zoom + step,
                    anchor: *position,
                },
                GestureEffect::Hover(*position),
            ];
            (state, effects)
        }
        InputEvent::PointerDown { position, at } => match state {
            GestureState::Idle => (start_pan(*position, *at, view), Vec::new()),
            other => (other, Vec::new()),
        },
        InputEvent::PointerMove { position, .. } => match state {
            GestureState::Idle => (GestureState::Idle, vec![GestureEffect::Hover(*position)]),
            GestureState::Panning { anchor, tap } => {
                let (state, mut effects) = drag(anchor, tap, *position, config);
                effects.push(GestureEffect::Hover(*position));
                (state, effects)
            }
            other => (other, Vec::new()),
        },
        InputEvent::PointerUp { position, at } => match state {
            GestureState::Panning { tap, .. } => (GestureState::Idle, release(tap, *position, *at, config)),
            other => (other, Vec::new()),
        },
        InputEvent::Touch { phase, touches, at } => touch_transition(state, *phase, touches, *at, view, config),
    }
}

fn start_pan(position: ScreenPoint, at: Instant, view: ViewSnapshot) -> GestureState {
    GestureState::Panning {
        anchor: PanAnchor {
            start_screen: position,
            start_center: view.center,
        },
        tap: TapCandidate::new(position, at),
    }
}

fn start_pinch(a: ScreenPoint, b: ScreenPoint, view: ViewSnapshot) -> GestureState {
    GestureState::Pinching {
        start_distance: a.distance(b),
        start_zoom: view.zoom,
    }
}

fn drag(
    anchor: PanAnchor,
    mut tap: TapCandidate,
    position: ScreenPoint,
    config: &GestureConfig,
) -> (GestureState, Vec<GestureEffect>) {
    if position.distance(tap.start) > config.tap_max_move {
        tap.cancelled = true;
    }
    let effect = GestureEffect::Pan {
        anchor,
        dx: position.x - anchor.start_screen.x,
        dy: position.y - anchor.start_screen.y,
    };
    (GestureState::Panning { anchor, tap }, vec![effect])
}

fn release(
    tap: TapCandidate,
    position: ScreenPoint,
    at: Instant,
    config: &GestureConfig,
) -> Vec<GestureEffect> {
    let moved_too_far = position.distance(tap.start) > config.tap_max_move;
    let held_too_long = at.saturating_duration_since(tap.started_at) >= config.tap_max_duration;
    if tap.cancelled || moved_too_far || held_too_long {
        Vec::new()
    } else {
        vec![GestureEffect::Tap(tap.start)]
    }
}

fn pinch_zoom(
    start_distance: f64,
    start_zoom: f64,
    a: ScreenPoint,
    b: ScreenPoint,
) -> Vec<GestureEffect> {
    let distance = a.distance(b);
    if start_distance < MIN_PINCH_DISTANCE || distance < MIN_PINCH_DISTANCE {
        return Vec::new();
    }
    vec![GestureEffect::ZoomTo {
        zoom: start_zoom + (distance / start_distance).log2(),
        anchor: a.midpoint(b),
    }]
}

fn touch_transition(
    state: GestureState,
    phase: TouchPhase,
    touches: &[ScreenPoint],
    at: Instant,
    view: ViewSnapshot,
    config: &GestureConfig,
) -> (GestureState, Vec<GestureEffect>) {
    let state = match (phase, state) {
        (TouchPhase::Cancel, GestureState::Panning { anchor, mut tap }) => {
            tap.cancelled = true;
            GestureState::Panning { anchor, tap }
        }
        (_, state) => state,
    };
    match (phase, touches) {
        // All fingers lifted
        (_, []) => match state {
            // Touch end carries no position; movement was already checked on every move
            GestureState::Panning { tap, .. } => (GestureState::Idle, release(tap, tap.start, at, config)),
            _ => (GestureState::Idle, Vec::new()),
        },

        (TouchPhase::Start, [single]) => match state {
            GestureState::Idle => (start_pan(*single, at, view), Vec::new()),
            other => (other, Vec::new()),
        },
        (TouchPhase::Move, [single]) => match state {
            GestureState::Panning { anchor, tap } => drag(anchor, tap, *single, config),
            GestureState::Pinching { .. } => (
                GestureState::Panning {
                    anchor: PanAnchor {
                        start_screen: *single,
                        start_center: view.center,
                    },
                    tap: TapCandidate::cancelled(*single, at),
                },
                Vec::new(),
            ),
            GestureState::Idle => (start_pan(*single, at, view), Vec::new()),
        },
        // One finger left after a pinch: continue as a pan from where it is
        (TouchPhase::End | TouchPhase::Cancel, [single]) => match state {
            GestureState::Pinching { .. } => (
                GestureState::Panning {
                    anchor: PanAnchor {
                        start_screen: *single,
                        start_center: view.center,
                    },
                    tap: TapCandidate::cancelled(*single, at),
                },
                Vec::new(),
            ),
            other => (other, Vec::new()),
        },

        (TouchPhase::Start, [a, b, ..]) => (start_pinch(*a, *b, view), Vec::new()),
        (TouchPhase::Move, [a, b, ..]) => match state {
            GestureState::Pinching {
                start_distance,
                start_zoom,
            } => (
                GestureState::Pinching {
                    start_distance,
                    start_zoom,
                },
                pinch_zoom(start_distance, start_zoom, *a, *b),
            ),
            // Second finger arrived without a start event
            _ => (start_pinch(*a, *b, view), Vec::new()),
        },
        // Three or more fingers down to two: re-anchor on the remaining pair
        (TouchPhase::End | TouchPhase::Cancel, [a, b, ..]) => (start_pinch(*a, *b, view), Vec::new()),
    }
}

/// Owns the gesture state and applies effects to the viewport
#[derive(Debug, Default)]
pub struct GestureController {
    state: GestureState,
    config: GestureConfig,
}

impl GestureController {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            state: GestureState::Idle,
            config,
        }
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    /// Feed one event; viewport mutations are applied here, pointer
    /// interactions are returned
    pub fn handle(&mut self, event: &InputEvent, viewport: &mut Viewport) -> Option<Interaction> {
        let state = std::mem::take(&mut self.state);
        let (next, effects) = transition(state, event, ViewSnapshot::from(&*viewport), &self.config);
        self.state = next;

        let mut interaction = None;
        for effect in effects {
            match effect {
                GestureEffect::Pan { anchor, dx, dy } => viewport.pan(&anchor, dx, dy),
                GestureEffect::ZoomTo { zoom, anchor } => viewport.zoom_anchored(zoom, anchor),
                GestureEffect::Tap(p) => interaction = Some(Interaction::Tap(p)),
                GestureEffect::Hover(p) => interaction = Some(Interaction::Hover(p)),
            }
        }
        interaction
    }
}
