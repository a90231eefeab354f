//! Per-axis motor limits captured once when the device attaches

use crate::stepper::driver::AxisBounds;

/// Joystick deflection goes from 0 to 100 percent
pub const ACCEL_STEPS: f64 = 100.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisLimits {
    pub accel_min: f64,
    pub accel_max: f64,
    pub velocity_min: f64,
    pub velocity_max: f64,
    /// Acceleration change per percentage point of deflection
    pub accel_step: f64,
}

impl AxisLimits {
    pub fn from_bounds(bounds: &AxisBounds) -> Self {
        Self {
            accel_min: bounds.acceleration_min,
            accel_max: bounds.acceleration_max,
            velocity_min: bounds.velocity_min,
            velocity_max: bounds.velocity_max,
            accel_step: (bounds.acceleration_max - bounds.acceleration_min) / ACCEL_STEPS,
        }
    }

    /// Low acceleration used when the knob is released, kept above the bare minimum
    pub fn release_acceleration(&self) -> f64 {
        self.accel_min * 2.0
    }
}

/// Limits for every axis of the attached device, read-only after capture
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MotorLimits {
    axes: Vec<AxisLimits>,
}

impl MotorLimits {
    pub fn capture(bounds: &[AxisBounds]) -> Self {
        Self {
            axes: bounds.iter().map(AxisLimits::from_bounds).collect(),
        }
    }

    pub fn axis(&self, axis: usize) -> Option<&AxisLimits> {
        self.axes.get(axis)
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AxisLimits> {
        self.axes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(accel_min: f64, accel_max: f64) -> AxisBounds {
        AxisBounds {
            acceleration_min: accel_min,
            acceleration_max: accel_max,
            velocity_min: 0.0,
            velocity_max: 8000.0,
            position_min: -2000,
            position_max: 2000,
        }
    }

    #[test]
    fn test_accel_step_is_one_percent_of_span() {
        let limits = AxisLimits::from_bounds(&bounds(100.0, 10100.0));
        assert_eq!(limits.accel_step, 100.0);
        assert_eq!(limits.release_acceleration(), 200.0);
        assert_eq!(limits.velocity_max, 8000.0);
    }

    #[test]
    fn test_capture_every_axis() {
        let limits = MotorLimits::capture(&[bounds(0.0, 100.0), bounds(10.0, 20.0)]);
        assert_eq!(limits.len(), 2);
        assert_eq!(limits.axis(0).map(|a| a.accel_step), Some(1.0));
        assert_eq!(limits.axis(1).map(|a| a.accel_max), Some(20.0));
        assert!(limits.axis(2).is_none());
        assert!(MotorLimits::default().is_empty());
    }
}
