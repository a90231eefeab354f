//! Pointer mapper - turns raw press/drag/release coordinates into joystick events
//!
//! Every input call clamps the coordinate onto the knob surface, moves the
//! knob, and synchronously hands exactly one [`PointerEvent`] to the single
//! registered subscriber. The returned [`KnobMove`] is the displacement the
//! caller applies to the knob sprite.

use crate::joystick::surface::{KnobState, Point};
use tracing::{debug, trace};

/// Kind of gesture step carried by a [`PointerEvent`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerEventKind {
    /// Knob jumped from its previous spot to a pressed position
    Position,
    /// Knob was dragged from its previous position
    Delta,
    /// Knob was let go and snapped back to center
    Release,
    /// Event code outside the known taxonomy. The mapper never emits this;
    /// it only shows up when events are decoded from raw codes.
    Unrecognized(u8),
}

impl PointerEventKind {
    pub const POSITION_CODE: u8 = 1;
    pub const DELTA_CODE: u8 = 2;
    pub const RELEASE_CODE: u8 = 3;

    pub fn from_code(code: u8) -> Self {
        match code {
            Self::POSITION_CODE => Self::Position,
            Self::DELTA_CODE => Self::Delta,
            Self::RELEASE_CODE => Self::Release,
            other => Self::Unrecognized(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Position => Self::POSITION_CODE,
            Self::Delta => Self::DELTA_CODE,
            Self::Release => Self::RELEASE_CODE,
            Self::Unrecognized(code) => code,
        }
    }
}

/// One gesture step, produced once and consumed once
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    /// -100..=100, positive is right
    pub percent_x: i32,
    /// -100..=100, positive is up
    pub percent_y: i32,
    /// Raw pixel displacement since the previous knob position
    pub delta_x: i32,
    pub delta_y: i32,
}

impl PointerEvent {
    pub const fn release() -> Self {
        Self {
            kind: PointerEventKind::Release,
            percent_x: 0,
            percent_y: 0,
            delta_x: 0,
            delta_y: 0,
        }
    }
}

/// Displacement applied to the knob by one input call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KnobMove {
    pub dx: i32,
    pub dy: i32,
}

/// Raw input delivered by the pointing surface
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerInput {
    Press { x: i32, y: i32 },
    Drag { x: i32, y: i32 },
    Release { x: i32, y: i32 },
}

impl PointerInput {
    /// Feeds this input into the mapper
    pub fn apply(self, mapper: &mut PointerMapper) -> KnobMove {
        match self {
            PointerInput::Press { x, y } => mapper.on_press(x, y),
            PointerInput::Drag { x, y } => mapper.on_drag(x, y),
            PointerInput::Release { x, y } => mapper.on_release(x, y),
        }
    }
}

/// Single-slot event handler
pub type PointerHandler = Box<dyn FnMut(PointerEvent) + Send>;

pub struct PointerMapper {
    knob: KnobState,
    handler: Option<PointerHandler>,
}

impl PointerMapper {
    pub fn new(knob: KnobState) -> Self {
        Self {
            knob,
            handler: None,
        }
    }

    pub fn knob(&self) -> &KnobState {
        &self.knob
    }

    /// Registers the event handler, replacing any previous one
    pub fn subscribe<F>(&mut self, handler: F)
    where
        F: FnMut(PointerEvent) + Send + 'static,
    {
        if self.handler.is_some() {
            debug!("Replacing existing pointer subscriber");
        }
        self.handler = Some(Box::new(handler));
    }

    /// Drops the registered handler, returns whether one was set
    pub fn unsubscribe(&mut self) -> bool {
        self.handler.take().is_some()
    }

    pub fn on_press(&mut self, x: i32, y: i32) -> KnobMove {
        self.track(PointerEventKind::Position, Point::new(x, y))
    }

    pub fn on_drag(&mut self, x: i32, y: i32) -> KnobMove {
        self.track(PointerEventKind::Delta, Point::new(x, y))
    }

    /// The release coordinate is ignored; the knob always returns to center.
    pub fn on_release(&mut self, _x: i32, _y: i32) -> KnobMove {
        let (dx, dy) = self.knob.recenter();
        trace!("Knob released, moving back by ({}, {})", dx, dy);
        self.notify(PointerEvent::release());
        KnobMove { dx, dy }
    }

    fn track(&mut self, kind: PointerEventKind, raw: Point) -> KnobMove {
        let clamped = self.knob.clamp(raw);
        let (dx, dy) = self.knob.move_to(clamped);
        let (percent_x, percent_y) = self.knob.percent_of(clamped);

        trace!(
            "{:?}: raw ({}, {}) -> knob ({}, {}), {}%/{}%",
            kind,
            raw.x,
            raw.y,
            clamped.x,
            clamped.y,
            percent_x,
            percent_y
        );

        self.notify(PointerEvent {
            kind,
            percent_x,
            percent_y,
            delta_x: dx,
            delta_y: dy,
        });
        KnobMove { dx, dy }
    }

    fn notify(&mut self, event: PointerEvent) {
        match self.handler.as_mut() {
            Some(handler) => handler(event),
            None => debug!("No pointer subscriber, dropping {:?}", event.kind),
        }
    }
}
