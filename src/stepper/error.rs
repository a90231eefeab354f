//! Error definitions for the stepper module

use thiserror::Error;

/// Errors reported by an actuator driver for a single command or read
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    /// The axis index does not exist on this device
    #[error("Unknown axis {axis}, device has {count} axes")]
    UnknownAxis { axis: usize, count: usize },

    /// The driver refused a value outside its accepted range
    #[error("{property} {value} outside accepted range [{min}, {max}]")]
    OutOfRange {
        property: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// No device session is open
    #[error("Device not attached")]
    NotAttached,

    /// Device state could not be reached
    #[error("Device unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by the motion controller
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepperError {
    #[error("Device not attached yet")]
    NotAttached,

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Motor {axis} did not stop within {waited_ms}ms")]
    StopTimeout { axis: usize, waited_ms: u64 },

    #[error("Channel error: {0}")]
    ChannelError(String),
}
