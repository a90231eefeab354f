//! Motion controller - maps joystick events onto stepper commands
//!
//! Holds the device session opened on attach and reacts to every
//! [`PointerEvent`] by issuing acceleration/target/engage commands on axis 0,
//! with a direction reversal check on drag deltas.
//!
//! # Event handling
//!
//! ```text
//! Position ──► accel = max, target = ±max_extent + engage (or disengage at 0%)
//! Delta    ──► reverse target if accel + dx·step < 0, then accel = max
//! Release  ──► disengage axes 0/1, accel = 2·min on axes 0/1
//! unknown  ──► disengage axes 0/1
//! ```
//!
//! Commands are fire-and-forget: a rejected command is logged and counted but
//! never aborts handling of the current or later events. The driver stays the
//! source of truth; [`AxisCommandState`] only mirrors accepted commands for
//! display.

use crate::joystick::{PointerEvent, PointerEventKind};
use crate::stepper::driver::{ActuatorDriver, AxisBounds, DeviceInfo};
use crate::stepper::error::{DriverError, StepperError};
use crate::stepper::limits::{AxisLimits, MotorLimits};
use std::cmp::Ordering;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Axis driven by horizontal deflection
pub const AXIS_X: usize = 0;
/// Axis driven by vertical deflection
pub const AXIS_Y: usize = 1;

#[derive(Clone, Debug, PartialEq)]
pub struct MotionSettings {
    /// Absolute target used when the knob is pushed off center
    pub max_extent: i64,
    /// Poll period while waiting for a motor to stop
    pub stop_poll_interval: Duration,
    /// Give up waiting for a motor to stop after this long
    pub stop_wait_timeout: Duration,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            max_extent: 2000,
            stop_poll_interval: Duration::from_millis(1000),
            stop_wait_timeout: Duration::from_secs(30),
        }
    }
}

/// Last accepted command values for one axis
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AxisCommandState {
    pub target_position: i64,
    pub acceleration: f64,
    pub velocity_limit: f64,
    pub engaged: bool,
    /// Latest position reported by the device
    pub position: i64,
}

/// What a single event did to the device
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EventOutcome {
    /// No device attached, nothing was sent
    Dropped,
    Applied,
    /// Delta asked for negative acceleration; target direction flipped.
    /// `magnitude` is the reversed acceleration, which is not kept.
    Reversed { magnitude: f64 },
    /// Unknown event kind, commanded axes disengaged
    SafetyStop,
}

/// Manual per-axis commands
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AxisCommand {
    Engage { axis: usize, engaged: bool },
    VelocityLimit { axis: usize, value: f64 },
    Acceleration { axis: usize, value: f64 },
    TargetPosition { axis: usize, value: i64 },
    /// Callers wait for the axis to stop before sending this
    CurrentPosition { axis: usize, value: i64 },
    Select { axis: usize },
}

impl AxisCommand {
    pub fn axis(&self) -> usize {
        match *self {
            AxisCommand::Engage { axis, .. }
            | AxisCommand::VelocityLimit { axis, .. }
            | AxisCommand::Acceleration { axis, .. }
            | AxisCommand::TargetPosition { axis, .. }
            | AxisCommand::CurrentPosition { axis, .. }
            | AxisCommand::Select { axis } => axis,
        }
    }
}

/// Values read back from the device for one axis
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisReadout {
    pub velocity_max: f64,
    pub velocity: f64,
    pub acceleration: f64,
    pub target_position: i64,
    pub current_position: i64,
    pub engaged: bool,
    pub stopped: bool,
    pub limits: AxisLimits,
}

/// Open device session, created on attach and dropped on detach
pub struct DeviceSession {
    driver: Box<dyn ActuatorDriver>,
    info: DeviceInfo,
    limits: MotorLimits,
}

impl DeviceSession {
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn limits(&self) -> &MotorLimits {
        &self.limits
    }
}

pub struct MotionController {
    settings: MotionSettings,
    session: Option<DeviceSession>,
    axes: Vec<AxisCommandState>,
    last_event: Option<PointerEvent>,
    rejected_commands: u64,
}

impl MotionController {
    pub fn new(settings: MotionSettings) -> Self {
        info!("Creating motion controller with settings: {:?}", settings);
        Self {
            settings,
            session: None,
            axes: Vec::new(),
            last_event: None,
            rejected_commands: 0,
        }
    }

    pub fn settings(&self) -> &MotionSettings {
        &self.settings
    }

    pub fn is_attached(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&DeviceSession> {
        self.session.as_ref()
    }

    pub fn axis_states(&self) -> &[AxisCommandState] {
        &self.axes
    }

    pub fn last_event(&self) -> Option<PointerEvent> {
        self.last_event
    }

    pub fn rejected_commands(&self) -> u64 {
        self.rejected_commands
    }

    /// Opens a device session and captures the limits of every axis.
    ///
    /// Each axis starts at maximum acceleration with its position counter
    /// zeroed; axis 0 also gets its full velocity limit.
    pub fn attach(&mut self, driver: Box<dyn ActuatorDriver>, info: DeviceInfo, bounds: &[AxisBounds]) {
        if self.session.is_some() {
            warn!("Device attached while a session was open, replacing it");
        }
        info!(
            "Device '{}' (serial {}, version {}) attached with {} steppers",
            info.name, info.serial_number, info.version, info.axis_count
        );

        let limits = MotorLimits::capture(bounds);
        let initial: Vec<AxisLimits> = limits.iter().copied().collect();
        self.axes = vec![AxisCommandState::default(); limits.len()];
        self.session = Some(DeviceSession {
            driver,
            info,
            limits,
        });

        for (axis, axis_limits) in initial.iter().enumerate() {
            debug!("Axis {} limits: {:?}", axis, axis_limits);
            self.command_acceleration(axis, axis_limits.accel_max);
            self.command_current_position(axis, 0);
        }

        if let Some(x) = initial.get(AXIS_X) {
            self.command_velocity_limit(AXIS_X, x.velocity_max);
            self.command_acceleration(AXIS_X, x.accel_max);
        }
    }

    /// Closes the session and hands the driver back
    pub fn detach(&mut self) -> Option<Box<dyn ActuatorDriver>> {
        match self.session.take() {
            Some(session) => {
                info!("Device '{}' detached", session.info.name);
                Some(session.driver)
            }
            None => {
                debug!("Detach without an open session");
                None
            }
        }
    }

    /// Reacts to one joystick event
    pub fn handle_event(&mut self, event: &PointerEvent) -> EventOutcome {
        self.last_event = Some(*event);

        if self.session.is_none() {
            info!("Device not attached yet, ignoring {:?}", event.kind);
            return EventOutcome::Dropped;
        }

        match event.kind {
            PointerEventKind::Position => self.on_position(event),
            PointerEventKind::Delta => self.on_delta(event),
            PointerEventKind::Release => self.on_release(event),
            PointerEventKind::Unrecognized(code) => {
                error!(
                    "Unknown joystick event {} at: {}, {}",
                    code, event.percent_x, event.percent_y
                );
                self.command_engaged(AXIS_X, false);
                self.command_engaged(AXIS_Y, false);
                EventOutcome::SafetyStop
            }
        }
    }

    fn on_position(&mut self, event: &PointerEvent) -> EventOutcome {
        info!("New position: {}, {}", event.percent_x, event.percent_y);

        let Some(x) = self.axis_limits(AXIS_X) else {
            error!("No limits captured for axis {}", AXIS_X);
            return EventOutcome::Applied;
        };
        self.command_acceleration(AXIS_X, x.accel_max);

        let extent = self.settings.max_extent;
        match event.percent_x.cmp(&0) {
            Ordering::Greater => {
                self.command_target_position(AXIS_X, extent);
                self.command_engaged(AXIS_X, true);
            }
            Ordering::Less => {
                self.command_target_position(AXIS_X, -extent);
                self.command_engaged(AXIS_X, true);
            }
            Ordering::Equal => self.command_engaged(AXIS_X, false),
        }
        EventOutcome::Applied
    }

    fn on_delta(&mut self, event: &PointerEvent) -> EventOutcome {
        let Some(x) = self.axis_limits(AXIS_X) else {
            error!("No limits captured for axis {}", AXIS_X);
            return EventOutcome::Applied;
        };

        let mut outcome = EventOutcome::Applied;
        if let Some(current) = self.read(AXIS_X, |d| d.acceleration(AXIS_X)) {
            let proposed = current + event.delta_x as f64 * x.accel_step;
            debug!(
                "Acceleration {} + dx {} * step {} = {}",
                current, event.delta_x, x.accel_step, proposed
            );

            if proposed < 0.0 {
                let magnitude = proposed.abs();
                if let Some(target) = self.read(AXIS_X, |d| d.target_position(AXIS_X)) {
                    debug!("Reversing axis {} target {} -> {}", AXIS_X, target, -target);
                    self.command_target_position(AXIS_X, target.saturating_neg());
                }
                outcome = EventOutcome::Reversed { magnitude };
            }
        }

        // Acceleration always ends at max; the reversal only flips the target
        self.command_acceleration(AXIS_X, x.accel_max);
        outcome
    }

    fn on_release(&mut self, event: &PointerEvent) -> EventOutcome {
        info!("Release: {}, {}", event.percent_x, event.percent_y);

        for axis in [AXIS_X, AXIS_Y] {
            self.command_engaged(axis, false);
        }
        for axis in [AXIS_X, AXIS_Y] {
            match self.axis_limits(axis) {
                Some(limits) => self.command_acceleration(axis, limits.release_acceleration()),
                None => warn!("No limits captured for axis {}, acceleration left as is", axis),
            }
        }
        EventOutcome::Applied
    }

    /// Runs a manual command. `Select` returns the axis readout.
    pub fn apply(&mut self, command: AxisCommand) -> Result<Option<AxisReadout>, StepperError> {
        if let AxisCommand::Select { axis } = command {
            info!("Motor {} selected", axis);
            return self.readout(axis).map(Some);
        }

        let driver = self.driver_mut()?;
        let result = match command {
            AxisCommand::Engage { axis, engaged } => {
                info!("Turning motor {} {}", axis, if engaged { "on" } else { "off" });
                driver.set_engaged(axis, engaged)
            }
            AxisCommand::VelocityLimit { axis, value } => driver.set_velocity_limit(axis, value),
            AxisCommand::Acceleration { axis, value } => driver.set_acceleration(axis, value),
            AxisCommand::TargetPosition { axis, value } => driver.set_target_position(axis, value),
            AxisCommand::CurrentPosition { axis, value } => {
                driver.set_current_position(axis, value)
            }
            AxisCommand::Select { .. } => Ok(()),
        };

        if let Err(e) = result {
            self.rejected_commands += 1;
            error!("Command {:?} rejected: {}", command, e);
            return Err(e.into());
        }

        if let Some(state) = self.axes.get_mut(command.axis()) {
            match command {
                AxisCommand::Engage { engaged, .. } => state.engaged = engaged,
                AxisCommand::VelocityLimit { value, .. } => state.velocity_limit = value,
                AxisCommand::Acceleration { value, .. } => state.acceleration = value,
                AxisCommand::TargetPosition { value, .. } => state.target_position = value,
                AxisCommand::CurrentPosition { value, .. } => state.position = value,
                AxisCommand::Select { .. } => {}
            }
        }
        Ok(None)
    }

    /// Reads the live values of one axis from the device
    pub fn readout(&self, axis: usize) -> Result<AxisReadout, StepperError> {
        let session = self.session.as_ref().ok_or(StepperError::NotAttached)?;
        let limits = *session.limits.axis(axis).ok_or(DriverError::UnknownAxis {
            axis,
            count: session.limits.len(),
        })?;
        let driver = session.driver.as_ref();

        Ok(AxisReadout {
            velocity_max: driver.bounds(axis)?.velocity_max,
            velocity: driver.velocity(axis)?,
            acceleration: driver.acceleration(axis)?,
            target_position: driver.target_position(axis)?,
            current_position: driver.current_position(axis)?,
            engaged: driver.engaged(axis)?,
            stopped: driver.stopped(axis)?,
            limits,
        })
    }

    pub fn axis_stopped(&self, axis: usize) -> Result<bool, StepperError> {
        let session = self.session.as_ref().ok_or(StepperError::NotAttached)?;
        Ok(session.driver.stopped(axis)?)
    }

    /// Records a position reported by the device
    pub fn record_position(&mut self, axis: usize, position: i64) {
        match self.axes.get_mut(axis) {
            Some(state) => state.position = position,
            None => debug!("Position change for untracked axis {}: {}", axis, position),
        }
    }

    fn driver_mut(&mut self) -> Result<&mut dyn ActuatorDriver, StepperError> {
        match self.session.as_mut() {
            Some(session) => Ok(session.driver.as_mut()),
            None => Err(StepperError::NotAttached),
        }
    }

    fn axis_limits(&self, axis: usize) -> Option<AxisLimits> {
        self.session
            .as_ref()
            .and_then(|session| session.limits.axis(axis).copied())
    }

    fn read<T, F>(&self, axis: usize, read: F) -> Option<T>
    where
        F: FnOnce(&dyn ActuatorDriver) -> Result<T, DriverError>,
    {
        let session = self.session.as_ref()?;
        match read(session.driver.as_ref()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Failed to read axis {}: {}", axis, e);
                None
            }
        }
    }

    /// Sends one command; rejections are logged and counted, never propagated
    fn issue<F>(&mut self, axis: usize, command: &str, send: F) -> bool
    where
        F: FnOnce(&mut dyn ActuatorDriver) -> Result<(), DriverError>,
    {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match send(session.driver.as_mut()) {
            Ok(()) => true,
            Err(e) => {
                self.rejected_commands += 1;
                warn!("Axis {} rejected {}: {}", axis, command, e);
                false
            }
        }
    }

    fn command_acceleration(&mut self, axis: usize, value: f64) {
        if self.issue(axis, "acceleration", |d| d.set_acceleration(axis, value)) {
            if let Some(state) = self.axes.get_mut(axis) {
                state.acceleration = value;
            }
        }
    }

    fn command_velocity_limit(&mut self, axis: usize, value: f64) {
        if self.issue(axis, "velocity limit", |d| d.set_velocity_limit(axis, value)) {
            if let Some(state) = self.axes.get_mut(axis) {
                state.velocity_limit = value;
            }
        }
    }

    fn command_target_position(&mut self, axis: usize, value: i64) {
        if self.issue(axis, "target position", |d| d.set_target_position(axis, value)) {
            if let Some(state) = self.axes.get_mut(axis) {
                state.target_position = value;
            }
        }
    }

    fn command_engaged(&mut self, axis: usize, engaged: bool) {
        if self.issue(axis, "engaged", |d| d.set_engaged(axis, engaged)) {
            if let Some(state) = self.axes.get_mut(axis) {
                state.engaged = engaged;
            }
        }
    }

    fn command_current_position(&mut self, axis: usize, value: i64) {
        if self.issue(axis, "current position", |d| d.set_current_position(axis, value)) {
            if let Some(state) = self.axes.get_mut(axis) {
                state.position = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        Read(&'static str, usize),
        Acceleration(usize, f64),
        VelocityLimit(usize, f64),
        Target(usize, i64),
        Engaged(usize, bool),
        CurrentPosition(usize, i64),
    }

    #[derive(Clone, Copy, Default)]
    struct FakeAxis {
        target: i64,
        acceleration: f64,
        velocity_limit: f64,
        engaged: bool,
        position: i64,
    }

    /// Records every call; rejects targets beyond `target_limit`
    struct FakeDriver {
        calls: Arc<Mutex<Vec<Call>>>,
        axes: Vec<FakeAxis>,
        target_limit: i64,
    }

    impl FakeDriver {
        fn new(axis_count: usize) -> (Self, Arc<Mutex<Vec<Call>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let driver = Self {
                calls: calls.clone(),
                axes: vec![FakeAxis::default(); axis_count],
                target_limit: i64::MAX,
            };
            (driver, calls)
        }

        fn log(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn axis(&self, axis: usize) -> Result<&FakeAxis, DriverError> {
            self.axes.get(axis).ok_or(DriverError::UnknownAxis {
                axis,
                count: self.axes.len(),
            })
        }

        fn axis_mut(&mut self, axis: usize) -> Result<&mut FakeAxis, DriverError> {
            let count = self.axes.len();
            self.axes
                .get_mut(axis)
                .ok_or(DriverError::UnknownAxis { axis, count })
        }
    }

    impl ActuatorDriver for FakeDriver {
        fn axis_count(&self) -> usize {
            self.axes.len()
        }

        fn bounds(&self, axis: usize) -> Result<AxisBounds, DriverError> {
            self.log(Call::Read("bounds", axis));
            self.axis(axis).map(|_| bounds())
        }

        fn target_position(&self, axis: usize) -> Result<i64, DriverError> {
            self.log(Call::Read("target", axis));
            self.axis(axis).map(|a| a.target)
        }

        fn set_target_position(&mut self, axis: usize, position: i64) -> Result<(), DriverError> {
            self.log(Call::Target(axis, position));
            if position.abs() > self.target_limit {
                return Err(DriverError::OutOfRange {
                    property: "target position",
                    value: position as f64,
                    min: -self.target_limit as f64,
                    max: self.target_limit as f64,
                });
            }
            self.axis_mut(axis)?.target = position;
            Ok(())
        }

        fn acceleration(&self, axis: usize) -> Result<f64, DriverError> {
            self.log(Call::Read("acceleration", axis));
            self.axis(axis).map(|a| a.acceleration)
        }

        fn set_acceleration(&mut self, axis: usize, acceleration: f64) -> Result<(), DriverError> {
            self.log(Call::Acceleration(axis, acceleration));
            self.axis_mut(axis)?.acceleration = acceleration;
            Ok(())
        }

        fn velocity_limit(&self, axis: usize) -> Result<f64, DriverError> {
            self.log(Call::Read("velocity limit", axis));
            self.axis(axis).map(|a| a.velocity_limit)
        }

        fn set_velocity_limit(&mut self, axis: usize, velocity: f64) -> Result<(), DriverError> {
            self.log(Call::VelocityLimit(axis, velocity));
            self.axis_mut(axis)?.velocity_limit = velocity;
            Ok(())
        }

        fn velocity(&self, axis: usize) -> Result<f64, DriverError> {
            self.log(Call::Read("velocity", axis));
            self.axis(axis).map(|_| 0.0)
        }

        fn engaged(&self, axis: usize) -> Result<bool, DriverError> {
            self.log(Call::Read("engaged", axis));
            self.axis(axis).map(|a| a.engaged)
        }

        fn set_engaged(&mut self, axis: usize, engaged: bool) -> Result<(), DriverError> {
            self.log(Call::Engaged(axis, engaged));
            self.axis_mut(axis)?.engaged = engaged;
            Ok(())
        }

        fn current_position(&self, axis: usize) -> Result<i64, DriverError> {
            self.log(Call::Read("position", axis));
            self.axis(axis).map(|a| a.position)
        }

        fn set_current_position(&mut self, axis: usize, position: i64) -> Result<(), DriverError> {
            self.log(Call::CurrentPosition(axis, position));
            self.axis_mut(axis)?.position = position;
            Ok(())
        }

        fn stopped(&self, axis: usize) -> Result<bool, DriverError> {
            self.log(Call::Read("stopped", axis));
            self.axis(axis).map(|_| true)
        }
    }

    fn bounds() -> AxisBounds {
        AxisBounds {
            acceleration_min: 10.0,
            acceleration_max: 110.0,
            velocity_min: 0.0,
            velocity_max: 500.0,
            position_min: -2000,
            position_max: 2000,
        }
    }

    fn info(axis_count: usize) -> DeviceInfo {
        DeviceInfo {
            name: "fake".to_string(),
            serial_number: 42,
            version: 1,
            axis_count,
        }
    }

    fn event(kind: PointerEventKind, percent_x: i32, delta_x: i32) -> PointerEvent {
        PointerEvent {
            kind,
            percent_x,
            percent_y: 0,
            delta_x,
            delta_y: 0,
        }
    }

    /// Attached controller with a cleared call log
    fn attached(driver: FakeDriver, calls: &Arc<Mutex<Vec<Call>>>) -> MotionController {
        let count = driver.axis_count();
        let mut controller = MotionController::new(MotionSettings::default());
        controller.attach(Box::new(driver), info(count), &vec![bounds(); count]);
        calls.lock().unwrap().clear();
        controller
    }

    #[test]
    fn test_events_before_attach_make_no_calls() {
        let mut controller = MotionController::new(MotionSettings::default());
        for kind in [
            PointerEventKind::Position,
            PointerEventKind::Delta,
            PointerEventKind::Release,
            PointerEventKind::Unrecognized(7),
        ] {
            assert_eq!(controller.handle_event(&event(kind, 50, 5)), EventOutcome::Dropped);
        }
        assert!(!controller.is_attached());
        assert_eq!(
            controller.apply(AxisCommand::Engage { axis: 0, engaged: true }),
            Err(StepperError::NotAttached)
        );
    }

    #[test]
    fn test_detached_controller_makes_no_calls() {
        let (driver, calls) = FakeDriver::new(2);
        let mut controller = attached(driver, &calls);
        assert!(controller.detach().is_some());

        controller.handle_event(&event(PointerEventKind::Position, 10, 0));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_attach_initialises_axes() {
        let (driver, calls) = FakeDriver::new(2);
        let mut controller = MotionController::new(MotionSettings::default());
        controller.attach(Box::new(driver), info(2), &[bounds(), bounds()]);

        assert_eq!(
            calls.lock().unwrap().as_slice(),
            &[
                Call::Acceleration(0, 110.0),
                Call::CurrentPosition(0, 0),
                Call::Acceleration(1, 110.0),
                Call::CurrentPosition(1, 0),
                Call::VelocityLimit(0, 500.0),
                Call::Acceleration(0, 110.0),
            ]
        );
        let session = controller.session().unwrap();
        assert_eq!(session.limits().len(), 2);
        assert_eq!(session.info().serial_number, 42);
        assert_eq!(controller.axis_states()[0].velocity_limit, 500.0);
    }

    #[test]
    fn test_position_engagement_boundary() {
        let (driver, calls) = FakeDriver::new(2);
        let mut controller = attached(driver, &calls);

        controller.handle_event(&event(PointerEventKind::Position, 1, 0));
        controller.handle_event(&event(PointerEventKind::Position, -1, 0));
        controller.handle_event(&event(PointerEventKind::Position, 0, 0));

        assert_eq!(
            calls.lock().unwrap().as_slice(),
            &[
                Call::Acceleration(0, 110.0),
                Call::Target(0, 2000),
                Call::Engaged(0, true),
                Call::Acceleration(0, 110.0),
                Call::Target(0, -2000),
                Call::Engaged(0, true),
                Call::Acceleration(0, 110.0),
                Call::Engaged(0, false),
            ]
        );
        let x = controller.axis_states()[0];
        assert_eq!(x.target_position, -2000);
        assert!(!x.engaged);
    }

    #[test]
    fn test_delta_reverses_target_and_resets_acceleration() {
        let (driver, calls) = FakeDriver::new(2);
        let mut controller = attached(driver, &calls);
        controller.handle_event(&event(PointerEventKind::Position, 40, 0));
        // current acceleration 10, step 1, dx -15 -> -5
        controller
            .apply(AxisCommand::Acceleration { axis: 0, value: 10.0 })
            .unwrap();
        calls.lock().unwrap().clear();

        let outcome = controller.handle_event(&event(PointerEventKind::Delta, 30, -15));

        assert_eq!(outcome, EventOutcome::Reversed { magnitude: 5.0 });
        assert_eq!(
            calls.lock().unwrap().as_slice(),
            &[
                Call::Read("acceleration", 0),
                Call::Read("target", 0),
                Call::Target(0, -2000),
                Call::Acceleration(0, 110.0),
            ]
        );
        assert_eq!(controller.axis_states()[0].acceleration, 110.0);
    }

    #[test]
    fn test_delta_without_reversal_keeps_target() {
        let (driver, calls) = FakeDriver::new(2);
        let mut controller = attached(driver, &calls);
        controller.handle_event(&event(PointerEventKind::Position, 40, 0));
        calls.lock().unwrap().clear();

        let outcome = controller.handle_event(&event(PointerEventKind::Delta, 20, -20));

        assert_eq!(outcome, EventOutcome::Applied);
        assert_eq!(
            calls.lock().unwrap().as_slice(),
            &[Call::Read("acceleration", 0), Call::Acceleration(0, 110.0)]
        );
        assert_eq!(controller.axis_states()[0].target_position, 2000);
    }

    #[test]
    fn test_release_slows_both_axes() {
        let (driver, calls) = FakeDriver::new(4);
        let mut controller = attached(driver, &calls);

        controller.handle_event(&PointerEvent::release());

        assert_eq!(
            calls.lock().unwrap().as_slice(),
            &[
                Call::Engaged(0, false),
                Call::Engaged(1, false),
                Call::Acceleration(0, 20.0),
                Call::Acceleration(1, 20.0),
            ]
        );
    }

    #[test]
    fn test_unknown_event_stops_motion() {
        let (driver, calls) = FakeDriver::new(2);
        let mut controller = attached(driver, &calls);

        let unknown = event(PointerEventKind::from_code(9), 80, 3);
        assert_eq!(controller.handle_event(&unknown), EventOutcome::SafetyStop);
        assert_eq!(
            calls.lock().unwrap().as_slice(),
            &[Call::Engaged(0, false), Call::Engaged(1, false)]
        );
        assert_eq!(controller.last_event(), Some(unknown));
    }

    #[test]
    fn test_rejected_command_does_not_stop_processing() {
        let (mut driver, calls) = FakeDriver::new(2);
        driver.target_limit = 1000;
        let mut controller = attached(driver, &calls);

        controller.handle_event(&event(PointerEventKind::Position, 50, 0));
        assert_eq!(controller.rejected_commands(), 1);
        // engage still went out after the rejected target
        assert!(controller.axis_states()[0].engaged);
        assert_eq!(controller.axis_states()[0].target_position, 0);

        controller.handle_event(&PointerEvent::release());
        assert!(!controller.axis_states()[0].engaged);
        assert_eq!(controller.rejected_commands(), 1);
        assert!(calls.lock().unwrap().contains(&Call::Acceleration(1, 20.0)));
    }

    #[test]
    fn test_single_axis_device_release_still_handles_axis_zero() {
        let (driver, calls) = FakeDriver::new(1);
        let mut controller = attached(driver, &calls);

        controller.handle_event(&PointerEvent::release());

        // engaged on axis 1 is rejected by the driver, acceleration is skipped
        assert_eq!(controller.rejected_commands(), 1);
        assert_eq!(
            calls.lock().unwrap().as_slice(),
            &[
                Call::Engaged(0, false),
                Call::Engaged(1, false),
                Call::Acceleration(0, 20.0),
            ]
        );
    }

    #[test]
    fn test_manual_commands_update_mirror() {
        let (driver, calls) = FakeDriver::new(2);
        let mut controller = attached(driver, &calls);

        controller
            .apply(AxisCommand::VelocityLimit { axis: 1, value: 250.0 })
            .unwrap();
        controller
            .apply(AxisCommand::TargetPosition { axis: 1, value: -300 })
            .unwrap();
        controller
            .apply(AxisCommand::CurrentPosition { axis: 1, value: 12 })
            .unwrap();

        let y = controller.axis_states()[1];
        assert_eq!(y.velocity_limit, 250.0);
        assert_eq!(y.target_position, -300);
        assert_eq!(y.position, 12);

        let err = controller.apply(AxisCommand::Engage { axis: 5, engaged: true });
        assert_eq!(
            err,
            Err(StepperError::Driver(DriverError::UnknownAxis { axis: 5, count: 2 }))
        );
        assert_eq!(controller.rejected_commands(), 1);
    }

    #[test]
    fn test_select_reads_back_axis() {
        let (driver, calls) = FakeDriver::new(2);
        let mut controller = attached(driver, &calls);
        controller.handle_event(&event(PointerEventKind::Position, -20, 0));

        let readout = controller
            .apply(AxisCommand::Select { axis: 0 })
            .unwrap()
            .unwrap();

        assert_eq!(readout.velocity_max, 500.0);
        assert_eq!(readout.target_position, -2000);
        assert_eq!(readout.acceleration, 110.0);
        assert!(readout.engaged);
        assert!(readout.stopped);
        assert_eq!(readout.limits.accel_step, 1.0);
        assert!(controller.axis_stopped(0).unwrap());
    }

    #[test]
    fn test_record_position() {
        let (driver, calls) = FakeDriver::new(2);
        let mut controller = attached(driver, &calls);
        controller.record_position(1, 77);
        controller.record_position(9, 1);
        assert_eq!(controller.axis_states()[1].position, 77);
    }
}
