//! Error definitions for the rig module

use crate::joystick::SurfaceError;
use crate::stepper::StepperError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RigError {
    /// The joystick surface could not be built from the configuration
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("Stepper error: {0}")]
    Stepper(#[from] StepperError),

    /// Communication over a channel failed
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Task or lock failure
    #[error("Thread error: {0}")]
    ThreadError(String),
}
