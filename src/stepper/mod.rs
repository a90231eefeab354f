//! Stepper motor control
//!
//! - [`driver`] - Per-axis command surface of the controller board
//! - [`limits`] - Hardware limits captured on attach
//! - [`motion_controller`] - Joystick events to motor commands
//! - [`simulated`] - In-process board used without hardware
//! - [`error`] - Error types

pub mod driver;
pub mod error;
pub mod limits;
pub mod motion_controller;
pub mod simulated;

pub use driver::{ActuatorDriver, AxisBounds, DeviceInfo, DriverNotification};
pub use error::{DriverError, StepperError};
pub use limits::{AxisLimits, MotorLimits};
pub use motion_controller::{
    AxisCommand, AxisCommandState, AxisReadout, EventOutcome, MotionController, MotionSettings,
};
pub use simulated::SimulatedStepper;
