//! Actuator driver command surface
//!
//! This trait abstracts over the stepper controller board. Every property is
//! addressed per axis index; reads and writes can fail independently, and a
//! failed write never invalidates the device session.

use crate::stepper::error::DriverError;

/// Hardware bounds reported by the device for one axis
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisBounds {
    pub acceleration_min: f64,
    pub acceleration_max: f64,
    pub velocity_min: f64,
    pub velocity_max: f64,
    pub position_min: i64,
    pub position_max: i64,
}

/// Identity of an attached device
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub serial_number: u32,
    pub version: u32,
    pub axis_count: usize,
}

/// Lifecycle and status notifications emitted by the device
#[derive(Clone, Debug, PartialEq)]
pub enum DriverNotification {
    /// Device session opened; carries the per-axis bounds
    Attached {
        info: DeviceInfo,
        bounds: Vec<AxisBounds>,
    },
    Detached,
    Error {
        code: i32,
        description: String,
    },
    PositionChanged {
        axis: usize,
        position: i64,
    },
}

/// Per-axis command surface of a stepper controller
pub trait ActuatorDriver: Send {
    fn axis_count(&self) -> usize;

    fn bounds(&self, axis: usize) -> Result<AxisBounds, DriverError>;

    fn target_position(&self, axis: usize) -> Result<i64, DriverError>;

    fn set_target_position(&mut self, axis: usize, position: i64) -> Result<(), DriverError>;

    fn acceleration(&self, axis: usize) -> Result<f64, DriverError>;

    fn set_acceleration(&mut self, axis: usize, acceleration: f64) -> Result<(), DriverError>;

    fn velocity_limit(&self, axis: usize) -> Result<f64, DriverError>;

    fn set_velocity_limit(&mut self, axis: usize, velocity: f64) -> Result<(), DriverError>;

    /// Actual velocity of the motor
    fn velocity(&self, axis: usize) -> Result<f64, DriverError>;

    fn engaged(&self, axis: usize) -> Result<bool, DriverError>;

    /// Enables or disables active motion toward the target position
    fn set_engaged(&mut self, axis: usize, engaged: bool) -> Result<(), DriverError>;

    fn current_position(&self, axis: usize) -> Result<i64, DriverError>;

    /// Overwrites the position counter. Only valid while the motor is stopped.
    fn set_current_position(&mut self, axis: usize, position: i64) -> Result<(), DriverError>;

    fn stopped(&self, axis: usize) -> Result<bool, DriverError>;
}
