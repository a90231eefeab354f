//! Rig - joystick, motion controller and stepper board in one tokio task
//!
//! The rig owns the pointer mapper and the device, and shares the motion
//! controller with the mapper's subscriber. Pointer input flows through the
//! mapper synchronously, so every event reaches the controller before the
//! next command is read.
//!
//! # State Machine
//!
//! ```text
//! Configured ──► Running ──► Stopping ──► Stopped
//!   (start)   (run_until_shutdown)  (shutdown)
//! ```
//!
//! # Architecture
//!
//! ```text
//! RigCommand ──► PointerMapper ──► PointerEvent ──► MotionController ──► ActuatorDriver
//!     │                                                  ▲      ▲
//!     └── Axis / RawEvent ───────────────────────────────┘      │
//!                                            DriverNotification ┘
//!
//! every processed message ──► RigSnapshot (watch)
//! ```

use crate::config::AppConfig;
use crate::joystick::{Point, PointerEvent, PointerInput, PointerMapper};
use crate::rig::RigError;
use crate::stepper::{
    ActuatorDriver, AxisCommand, AxisCommandState, AxisReadout, DeviceInfo, DriverNotification,
    MotionController, SimulatedStepper, StepperError,
};
use chrono::{DateTime, Local};
use statum::{machine, state};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Input accepted by a running rig
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RigCommand {
    /// Press, drag or release on the joystick surface
    Pointer(PointerInput),
    /// Event handed straight to the motion controller, bypassing the mapper
    RawEvent(PointerEvent),
    Axis(AxisCommand),
    /// Connect the stepper board
    Plug,
    /// Disconnect the stepper board
    Unplug,
}

/// Rig state published after every processed message
#[derive(Clone, Debug, PartialEq)]
pub struct RigSnapshot {
    pub knob: Point,
    pub last_event: Option<PointerEvent>,
    pub attached: Option<DeviceInfo>,
    pub axes: Vec<AxisCommandState>,
    /// Live readout of the axis picked with [`AxisCommand::Select`]
    pub selected: Option<(usize, AxisReadout)>,
    pub rejected_commands: u64,
    pub updated_at: DateTime<Local>,
}

impl Default for RigSnapshot {
    fn default() -> Self {
        Self {
            knob: Point::default(),
            last_event: None,
            attached: None,
            axes: Vec::new(),
            selected: None,
            rejected_commands: 0,
            updated_at: Local::now(),
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum RigState {
    Configured, // Surface and device built, nothing running
    Running,    // Device open, processing commands
    Stopping,   // Command loop left, device still open
    Stopped,    // Device closed
}

#[machine]
pub struct Rig<S: RigState> {
    mapper: PointerMapper,
    controller: Arc<Mutex<MotionController>>,
    device: SimulatedStepper,
    device_task: Option<JoinHandle<()>>,
    command_rx: mpsc::Receiver<RigCommand>,
    notification_rx: mpsc::Receiver<DriverNotification>,
    snapshot_tx: watch::Sender<RigSnapshot>,
    selected_axis: Option<usize>,
}

impl<S: RigState> Rig<S> {
    fn lock_controller(&self) -> Result<MutexGuard<'_, MotionController>, RigError> {
        self.controller
            .lock()
            .map_err(|e| RigError::ThreadError(format!("Motion controller poisoned: {}", e)))
    }

    /// Publishes the current state to every snapshot subscriber
    fn publish(&self) {
        let snapshot = match self.controller.lock() {
            Ok(controller) => RigSnapshot {
                knob: self.mapper.knob().position(),
                last_event: controller.last_event(),
                attached: controller.session().map(|session| session.info().clone()),
                axes: controller.axis_states().to_vec(),
                selected: self
                    .selected_axis
                    .and_then(|axis| controller.readout(axis).ok().map(|r| (axis, r))),
                rejected_commands: controller.rejected_commands(),
                updated_at: Local::now(),
            },
            Err(e) => {
                warn!("Skipping snapshot, motion controller poisoned: {}", e);
                return;
            }
        };
        self.snapshot_tx.send_replace(snapshot);
    }
}

impl Rig<Configured> {
    /// Builds the surface, controller and simulated board from the config and
    /// wires the mapper's events into the controller.
    pub fn create(
        config: &AppConfig,
        command_rx: mpsc::Receiver<RigCommand>,
        snapshot_tx: watch::Sender<RigSnapshot>,
    ) -> Result<Self, RigError> {
        let knob = config.surface.knob_state()?;
        info!(
            "Joystick surface centered at ({}, {}) with range {:?}",
            knob.center().x,
            knob.center().y,
            knob.range()
        );

        let controller = Arc::new(Mutex::new(MotionController::new(config.motion.settings())));
        let (notification_tx, notification_rx) = mpsc::channel(100);
        let device = SimulatedStepper::new(config.device.clone(), notification_tx);

        let mut mapper = PointerMapper::new(knob);
        let sink = Arc::clone(&controller);
        mapper.subscribe(move |event| match sink.lock() {
            Ok(mut controller) => {
                let outcome = controller.handle_event(&event);
                debug!("{:?} -> {:?}", event.kind, outcome);
            }
            Err(e) => error!("Motion controller poisoned, dropping {:?}: {}", event, e),
        });

        Ok(Self::new(
            mapper,
            controller,
            device,
            None, // device_task
            command_rx,
            notification_rx,
            snapshot_tx,
            None, // selected_axis
        ))
    }

    /// Opens the stepper board; it attaches on its own after a short delay
    pub fn start(mut self) -> Rig<Running> {
        info!("Starting rig");
        self.device_task = Some(self.device.open());
        self.transition()
    }
}

impl Rig<Running> {
    /// Main loop, runs until the shutdown signal arrives or every command sender is gone.
    ///
    /// Failed commands are logged and never end the loop.
    pub async fn run_until_shutdown(
        mut self,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> Result<Rig<Stopping>, RigError> {
        info!("Rig running");
        self.publish();

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Shutdown signal received");
                    break;
                }

                command = self.command_rx.recv() => match command {
                    Some(command) => {
                        if let Err(e) = self.execute(command).await {
                            warn!("Command {:?} failed: {}", command, e);
                        }
                    }
                    None => {
                        info!("All command senders dropped");
                        break;
                    }
                },

                Some(notification) = self.notification_rx.recv() => {
                    if let Err(e) = self.on_notification(notification) {
                        error!("Failed to handle device notification: {}", e);
                    }
                }
            }
            self.publish();
        }

        Ok(self.transition())
    }

    async fn execute(&mut self, command: RigCommand) -> Result<(), RigError> {
        match command {
            RigCommand::Pointer(input) => {
                let knob_move = input.apply(&mut self.mapper);
                debug!("Knob moved by ({}, {})", knob_move.dx, knob_move.dy);
            }
            RigCommand::RawEvent(event) => {
                let outcome = self.lock_controller()?.handle_event(&event);
                debug!("Raw {:?} -> {:?}", event.kind, outcome);
            }
            RigCommand::Axis(command) => {
                if let AxisCommand::CurrentPosition { axis, .. } = command {
                    wait_until_stopped(Arc::clone(&self.controller), axis).await?;
                }
                let readout = self.lock_controller()?.apply(command)?;
                if let Some(readout) = readout {
                    info!("Motor {}: {:?}", command.axis(), readout);
                    self.selected_axis = Some(command.axis());
                }
            }
            RigCommand::Plug => self.device.plug(),
            RigCommand::Unplug => self.device.unplug(),
        }
        Ok(())
    }

    fn on_notification(&mut self, notification: DriverNotification) -> Result<(), RigError> {
        match notification {
            DriverNotification::Attached { info, bounds } => {
                let driver: Box<dyn ActuatorDriver> = Box::new(self.device.clone());
                self.lock_controller()?.attach(driver, info, &bounds);
            }
            DriverNotification::Detached => {
                self.lock_controller()?.detach();
                self.selected_axis = None;
            }
            DriverNotification::Error { code, description } => {
                error!("Error {}: {}", code, description);
            }
            DriverNotification::PositionChanged { axis, position } => {
                self.lock_controller()?.record_position(axis, position);
            }
        }
        Ok(())
    }
}

impl Rig<Stopping> {
    /// Closes the device session and the board
    pub async fn shutdown(mut self) -> Rig<Stopped> {
        info!("Shutting down rig");
        self.mapper.unsubscribe();

        match self.lock_controller() {
            Ok(mut controller) => {
                controller.detach();
            }
            Err(e) => warn!("Could not detach device: {}", e),
        }

        self.device.close();
        if let Some(task) = self.device_task.take() {
            if let Err(e) = task.await {
                error!("Device task panicked: {}", e);
            }
        }

        self.publish();
        info!("Rig shut down");
        self.transition()
    }
}

impl Rig<Stopped> {}

/// Polls the axis until it reports stopped, giving up after the configured timeout
async fn wait_until_stopped(
    controller: Arc<Mutex<MotionController>>,
    axis: usize,
) -> Result<(), RigError> {
    let lock = || {
        controller
            .lock()
            .map_err(|e| RigError::ThreadError(format!("Motion controller poisoned: {}", e)))
    };

    let settings = lock()?.settings().clone();
    let started = Instant::now();
    loop {
        let stopped = {
            let controller = lock()?;
            controller.axis_stopped(axis)?
        };
        if stopped {
            return Ok(());
        }

        let waited = started.elapsed();
        if waited >= settings.stop_wait_timeout {
            return Err(StepperError::StopTimeout {
                axis,
                waited_ms: waited.as_millis() as u64,
            }
            .into());
        }
        info!("Waiting for motor {} to stop", axis);
        tokio::time::sleep(settings.stop_poll_interval).await;
    }
}

/// Handle for the rig task
///
/// Spawns the rig, exposes its command sender and snapshot receiver, and
/// shuts it down gracefully.
#[derive(Debug)]
pub struct RigHandle {
    commands: mpsc::Sender<RigCommand>,
    snapshots: watch::Receiver<RigSnapshot>,
    task_handle: Option<JoinHandle<Result<(), RigError>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl RigHandle {
    pub fn spawn(config: &AppConfig) -> Result<Self, RigError> {
        let (command_tx, command_rx) = mpsc::channel(100);
        let (snapshot_tx, snapshot_rx) = watch::channel(RigSnapshot::default());
        let rig = Rig::create(config, command_rx, snapshot_tx)?.start();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task_handle = tokio::spawn(async move {
            match rig.run_until_shutdown(shutdown_rx).await {
                Ok(stopping) => {
                    stopping.shutdown().await;
                    Ok(())
                }
                Err(e) => {
                    error!("Error running rig: {}", e);
                    Err(e)
                }
            }
        });

        Ok(Self {
            commands: command_tx,
            snapshots: snapshot_rx,
            task_handle: Some(task_handle),
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn commands(&self) -> mpsc::Sender<RigCommand> {
        self.commands.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RigSnapshot> {
        self.snapshots.clone()
    }

    pub async fn send(&self, command: RigCommand) -> Result<(), RigError> {
        self.commands
            .send(command)
            .await
            .map_err(|e| RigError::ChannelError(format!("Failed to send rig command: {}", e)))
    }

    /// Stops the rig and waits for its task to finish
    pub async fn shutdown(&mut self) -> Result<(), RigError> {
        debug!("Sending shutdown signal to rig");
        if let Some(tx) = self.shutdown_tx.take() {
            if tx.send(()).is_err() {
                warn!("Rig task already terminated");
            }
        }

        match self.task_handle.take() {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(RigError::ThreadError(format!("Rig task panicked: {}", e))),
            },
            None => {
                debug!("Rig already shut down");
                Ok(())
            }
        }
    }
}
