//! Screen joystick input handling
//!
//! Two pieces, used bottom-up:
//!
//! 1. [`surface`] - Knob geometry: clamping and percentage conversion
//! 2. [`pointer_mapper`] - Gesture classification and single-subscriber dispatch
//!
//! # Architecture
//!
//! ```text
//! Pointer ──► PointerMapper ──► PointerEvent ──► subscriber
//! (press/drag/release)  (KnobState)   (Position/Delta/Release)
//! ```
//!
//! Everything here is synchronous; the subscriber runs inside the input call
//! that produced the event.

pub mod pointer_mapper;
pub mod surface;

pub use pointer_mapper::{
    KnobMove, PointerEvent, PointerEventKind, PointerHandler, PointerInput, PointerMapper,
};
pub use surface::{KnobState, Point, SurfaceError};
