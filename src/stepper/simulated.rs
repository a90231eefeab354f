//! In-process stepper board used when no hardware is connected
//!
//! Behaves like a multi-axis stepper controller: it attaches after a short
//! delay, validates every written value against its bounds, and moves engaged
//! axes toward their target with a trapezoidal velocity profile, reporting
//! integer position changes as they happen.
//!
//! The handle is cheap to clone; all clones share one board.

use crate::config::DeviceConfig;
use crate::stepper::driver::{ActuatorDriver, AxisBounds, DriverNotification};
use crate::stepper::error::DriverError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Code carried by the error notification for a rejected value
pub const ERROR_CODE_OUT_OF_RANGE: i32 = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct SimulatedAxis {
    target: i64,
    position: f64,
    reported: i64,
    acceleration: f64,
    velocity_limit: f64,
    velocity: f64,
    engaged: bool,
}

impl SimulatedAxis {
    fn at_rest(bounds: &AxisBounds) -> Self {
        Self {
            acceleration: bounds.acceleration_min,
            velocity_limit: bounds.velocity_min,
            ..Self::default()
        }
    }

    /// Advances the axis by `dt` seconds, returns the new integer position if it changed
    fn step(&mut self, dt: f64) -> Option<i64> {
        if !self.engaged {
            self.velocity = 0.0;
            return None;
        }

        let distance = self.target as f64 - self.position;
        if distance.abs() < 0.5 {
            self.position = self.target as f64;
            self.velocity = 0.0;
        } else {
            let stopping_distance = if self.acceleration > 0.0 {
                self.velocity * self.velocity / (2.0 * self.acceleration)
            } else {
                0.0
            };
            self.velocity = if stopping_distance >= distance.abs() {
                (self.velocity - self.acceleration * dt).max(0.0)
            } else {
                (self.velocity + self.acceleration * dt).min(self.velocity_limit)
            };
            // direction changes are immediate
            let travel = (self.velocity * dt).min(distance.abs());
            self.position += travel * distance.signum();
        }

        let rounded = self.position.round() as i64;
        if rounded != self.reported {
            self.reported = rounded;
            Some(rounded)
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
struct SimulatedBoard {
    attached: bool,
    axes: Vec<SimulatedAxis>,
}

#[derive(Clone)]
pub struct SimulatedStepper {
    config: DeviceConfig,
    board: Arc<Mutex<SimulatedBoard>>,
    notifications: mpsc::Sender<DriverNotification>,
    cancel: CancellationToken,
}

impl SimulatedStepper {
    pub fn new(config: DeviceConfig, notifications: mpsc::Sender<DriverNotification>) -> Self {
        debug!("Creating simulated stepper: {:?}", config);
        Self {
            config,
            board: Arc::new(Mutex::new(SimulatedBoard::default())),
            notifications,
            cancel: CancellationToken::new(),
        }
    }

    /// Starts the board: attaches after the configured delay, then ticks
    /// until [`close`](Self::close) is called.
    pub fn open(&self) -> JoinHandle<()> {
        let device = self.clone();
        let attach_delay = Duration::from_millis(self.config.attach_delay_ms);
        let tick_interval = Duration::from_millis(self.config.tick_interval_ms);
        info!("Waiting for {} to attach...", self.config.name);

        tokio::spawn(async move {
            tokio::select! {
                _ = device.cancel.cancelled() => return,
                _ = tokio::time::sleep(attach_delay) => device.plug(),
            }

            let mut ticker = tokio::time::interval(tick_interval);
            loop {
                tokio::select! {
                    _ = device.cancel.cancelled() => {
                        debug!("Simulated stepper closed");
                        break;
                    }
                    _ = ticker.tick() => device.tick(tick_interval),
                }
            }
        })
    }

    /// Stops the tick task started by [`open`](Self::open)
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Connects the board with every axis at rest
    pub fn plug(&self) {
        let bounds = self.config.bounds();
        match self.board.lock() {
            Ok(mut board) => {
                board.attached = true;
                board.axes = vec![SimulatedAxis::at_rest(&bounds); self.config.axis_count];
            }
            Err(e) => {
                warn!("Simulated board unavailable: {}", e);
                return;
            }
        }
        self.notify(DriverNotification::Attached {
            info: self.config.info(),
            bounds: vec![bounds; self.config.axis_count],
        });
    }

    pub fn unplug(&self) {
        match self.board.lock() {
            Ok(mut board) => board.attached = false,
            Err(e) => {
                warn!("Simulated board unavailable: {}", e);
                return;
            }
        }
        self.notify(DriverNotification::Detached);
    }

    /// Advances every engaged axis by `dt`
    pub fn tick(&self, dt: Duration) {
        let dt = dt.as_secs_f64();
        let changes: Vec<(usize, i64)> = match self.board.lock() {
            Ok(mut board) if board.attached => board
                .axes
                .iter_mut()
                .enumerate()
                .filter_map(|(axis, state)| state.step(dt).map(|position| (axis, position)))
                .collect(),
            Ok(_) => return,
            Err(e) => {
                warn!("Simulated board unavailable: {}", e);
                return;
            }
        };

        for (axis, position) in changes {
            self.notify(DriverNotification::PositionChanged { axis, position });
        }
    }

    fn notify(&self, notification: DriverNotification) {
        if let Err(e) = self.notifications.try_send(notification) {
            debug!("Dropping device notification: {}", e);
        }
    }

    fn with_axis<T, F>(&self, axis: usize, f: F) -> Result<T, DriverError>
    where
        F: FnOnce(&mut SimulatedAxis) -> T,
    {
        let mut board = self
            .board
            .lock()
            .map_err(|e| DriverError::Unavailable(e.to_string()))?;
        if !board.attached {
            return Err(DriverError::NotAttached);
        }
        let count = board.axes.len();
        board
            .axes
            .get_mut(axis)
            .map(f)
            .ok_or(DriverError::UnknownAxis { axis, count })
    }

    /// Validates a written value, reporting rejections as error notifications too
    fn check(&self, property: &'static str, value: f64, min: f64, max: f64) -> Result<(), DriverError> {
        if (min..=max).contains(&value) {
            return Ok(());
        }
        let error = DriverError::OutOfRange {
            property,
            value,
            min,
            max,
        };
        self.notify(DriverNotification::Error {
            code: ERROR_CODE_OUT_OF_RANGE,
            description: error.to_string(),
        });
        Err(error)
    }

    fn check_position(&self, property: &'static str, position: i64) -> Result<(), DriverError> {
        self.check(
            property,
            position as f64,
            self.config.position_min as f64,
            self.config.position_max as f64,
        )
    }
}

impl ActuatorDriver for SimulatedStepper {
    fn axis_count(&self) -> usize {
        self.config.axis_count
    }

    fn bounds(&self, axis: usize) -> Result<AxisBounds, DriverError> {
        let bounds = self.config.bounds();
        self.with_axis(axis, |_| bounds)
    }

    fn target_position(&self, axis: usize) -> Result<i64, DriverError> {
        self.with_axis(axis, |a| a.target)
    }

    fn set_target_position(&mut self, axis: usize, position: i64) -> Result<(), DriverError> {
        self.with_axis(axis, |_| ())?;
        self.check_position("target position", position)?;
        self.with_axis(axis, |a| a.target = position)
    }

    fn acceleration(&self, axis: usize) -> Result<f64, DriverError> {
        self.with_axis(axis, |a| a.acceleration)
    }

    fn set_acceleration(&mut self, axis: usize, acceleration: f64) -> Result<(), DriverError> {
        self.with_axis(axis, |_| ())?;
        self.check(
            "acceleration",
            acceleration,
            self.config.acceleration_min,
            self.config.acceleration_max,
        )?;
        self.with_axis(axis, |a| a.acceleration = acceleration)
    }

    fn velocity_limit(&self, axis: usize) -> Result<f64, DriverError> {
        self.with_axis(axis, |a| a.velocity_limit)
    }

    fn set_velocity_limit(&mut self, axis: usize, velocity: f64) -> Result<(), DriverError> {
        self.with_axis(axis, |_| ())?;
        self.check(
            "velocity limit",
            velocity,
            self.config.velocity_min,
            self.config.velocity_max,
        )?;
        self.with_axis(axis, |a| a.velocity_limit = velocity)
    }

    fn velocity(&self, axis: usize) -> Result<f64, DriverError> {
        self.with_axis(axis, |a| a.velocity)
    }

    fn engaged(&self, axis: usize) -> Result<bool, DriverError> {
        self.with_axis(axis, |a| a.engaged)
    }

    fn set_engaged(&mut self, axis: usize, engaged: bool) -> Result<(), DriverError> {
        self.with_axis(axis, |a| a.engaged = engaged)
    }

    fn current_position(&self, axis: usize) -> Result<i64, DriverError> {
        self.with_axis(axis, |a| a.reported)
    }

    fn set_current_position(&mut self, axis: usize, position: i64) -> Result<(), DriverError> {
        self.with_axis(axis, |_| ())?;
        self.check_position("current position", position)?;
        self.with_axis(axis, |a| {
            a.position = position as f64;
            a.reported = position;
        })
    }

    fn stopped(&self, axis: usize) -> Result<bool, DriverError> {
        self.with_axis(axis, |a| a.velocity == 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DeviceConfig {
        DeviceConfig {
            axis_count: 2,
            attach_delay_ms: 0,
            acceleration_min: 1.0,
            acceleration_max: 1000.0,
            velocity_min: 0.0,
            velocity_max: 100.0,
            ..DeviceConfig::default()
        }
    }

    fn plugged() -> (SimulatedStepper, mpsc::Receiver<DriverNotification>) {
        let (tx, mut rx) = mpsc::channel(100);
        let device = SimulatedStepper::new(config(), tx);
        device.plug();
        assert!(matches!(
            rx.try_recv(),
            Ok(DriverNotification::Attached { .. })
        ));
        (device, rx)
    }

    #[test]
    fn test_commands_need_attach() {
        let (tx, _rx) = mpsc::channel(10);
        let mut device = SimulatedStepper::new(config(), tx);
        assert_eq!(device.set_engaged(0, true), Err(DriverError::NotAttached));
        assert_eq!(device.acceleration(0), Err(DriverError::NotAttached));
    }

    #[test]
    fn test_attached_notification_carries_bounds() {
        let (tx, mut rx) = mpsc::channel(10);
        let device = SimulatedStepper::new(config(), tx);
        device.plug();

        match rx.try_recv() {
            Ok(DriverNotification::Attached { info, bounds }) => {
                assert_eq!(info.axis_count, 2);
                assert_eq!(bounds.len(), 2);
                assert_eq!(bounds[1].velocity_max, 100.0);
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_rejected_and_reported() {
        let (mut device, mut rx) = plugged();

        let result = device.set_target_position(0, 5000);
        assert!(matches!(result, Err(DriverError::OutOfRange { .. })));
        assert_eq!(device.target_position(0), Ok(0));
        assert!(matches!(
            rx.try_recv(),
            Ok(DriverNotification::Error {
                code: ERROR_CODE_OUT_OF_RANGE,
                ..
            })
        ));

        assert!(device.set_acceleration(1, f64::NAN).is_err());
        assert_eq!(
            device.set_engaged(3, true),
            Err(DriverError::UnknownAxis { axis: 3, count: 2 })
        );
    }

    #[test]
    fn test_engaged_axis_moves_to_target() {
        let (mut device, mut rx) = plugged();
        device.set_acceleration(0, 1000.0).unwrap();
        device.set_velocity_limit(0, 100.0).unwrap();
        device.set_target_position(0, 50).unwrap();
        device.set_engaged(0, true).unwrap();

        device.tick(Duration::from_millis(100));
        assert!(!device.stopped(0).unwrap());
        for _ in 0..10 {
            device.tick(Duration::from_millis(100));
        }

        assert_eq!(device.current_position(0), Ok(50));
        assert!(device.stopped(0).unwrap());

        let mut last = None;
        while let Ok(notification) = rx.try_recv() {
            if let DriverNotification::PositionChanged { axis, position } = notification {
                assert_eq!(axis, 0);
                last = Some(position);
            }
        }
        assert_eq!(last, Some(50));
    }

    #[test]
    fn test_disengaged_axis_holds_still() {
        let (mut device, mut rx) = plugged();
        device.set_velocity_limit(1, 100.0).unwrap();
        device.set_target_position(1, -40).unwrap();

        device.tick(Duration::from_millis(100));

        assert_eq!(device.current_position(1), Ok(0));
        assert!(device.stopped(1).unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unplug_and_replug_resets_board() {
        let (mut device, mut rx) = plugged();
        device.set_current_position(0, 123).unwrap();

        device.unplug();
        assert_eq!(rx.try_recv(), Ok(DriverNotification::Detached));
        assert_eq!(device.current_position(0), Err(DriverError::NotAttached));

        device.plug();
        assert_eq!(device.current_position(0), Ok(0));
    }

    #[tokio::test]
    async fn test_open_attaches_and_close_stops() {
        let (tx, mut rx) = mpsc::channel(100);
        let device = SimulatedStepper::new(config(), tx);
        let task = device.open();

        let notification = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert!(matches!(
            notification,
            Some(DriverNotification::Attached { .. })
        ));

        device.close();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}
