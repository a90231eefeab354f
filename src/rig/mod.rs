//! Rig runtime: wires the joystick, motion controller and stepper board
//! together in a single tokio task.

pub mod error;
pub mod rig_handle;

pub use error::RigError;
pub use rig_handle::{Rig, RigCommand, RigHandle, RigSnapshot, RigState};
