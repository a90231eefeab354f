//! Line-oriented console front end
//!
//! Reads commands from stdin and forwards them to the rig. Parse errors are
//! reported and the loop keeps going.

use crate::joystick::{PointerEvent, PointerEventKind, PointerInput};
use crate::rig::{RigCommand, RigSnapshot};
use crate::stepper::AxisCommand;
use color_eyre::{eyre::eyre, Result};
use std::str::{FromStr, SplitWhitespace};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

pub const HELP: &str = "\
commands:
  press X Y                 press the knob at pixel (X, Y)
  drag X Y                  drag the knob to pixel (X, Y)
  release [X Y]             let go of the knob
  event CODE PX PY DX DY    inject a raw joystick event (1 position, 2 delta, 3 release)
  engage AXIS on|off        engage or disengage a motor
  velocity AXIS V           set the velocity limit
  accel AXIS A              set the acceleration
  target AXIS P             set the target position
  position AXIS P           overwrite the current position once stopped
  select AXIS               read back a motor
  plug | unplug             connect or disconnect the board
  status                    show the rig state
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown command '{0}', try 'help'")]
    UnknownCommand(String),

    #[error("'{command}' expects {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },

    #[error("Invalid number '{0}'")]
    InvalidNumber(String),

    #[error("Expected 'on' or 'off', got '{0}'")]
    InvalidSwitch(String),

    #[error("Too many arguments for '{0}'")]
    TooManyArguments(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleCommand {
    Rig(RigCommand),
    Status,
    Help,
    Quit,
}

struct Args<'a> {
    command: &'static str,
    expected: &'static str,
    words: SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
    fn new(command: &'static str, expected: &'static str, words: SplitWhitespace<'a>) -> Self {
        Self {
            command,
            expected,
            words,
        }
    }

    fn word(&mut self) -> Result<&'a str, ParseError> {
        self.words.next().ok_or(ParseError::MissingArgument {
            command: self.command,
            expected: self.expected,
        })
    }

    fn number<T: FromStr>(&mut self) -> Result<T, ParseError> {
        let word = self.word()?;
        word.parse()
            .map_err(|_| ParseError::InvalidNumber(word.to_string()))
    }

    fn finish<T>(mut self, value: T) -> Result<Option<ConsoleCommand>, ParseError>
    where
        T: Into<ConsoleCommand>,
    {
        match self.words.next() {
            Some(_) => Err(ParseError::TooManyArguments(self.command)),
            None => Ok(Some(value.into())),
        }
    }
}

impl From<RigCommand> for ConsoleCommand {
    fn from(command: RigCommand) -> Self {
        ConsoleCommand::Rig(command)
    }
}

impl From<AxisCommand> for ConsoleCommand {
    fn from(command: AxisCommand) -> Self {
        ConsoleCommand::Rig(RigCommand::Axis(command))
    }
}

impl From<PointerInput> for ConsoleCommand {
    fn from(input: PointerInput) -> Self {
        ConsoleCommand::Rig(RigCommand::Pointer(input))
    }
}

/// Parses one console line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, ParseError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    if command.starts_with('#') {
        return Ok(None);
    }

    match command.to_ascii_lowercase().as_str() {
        "press" => {
            let mut args = Args::new("press", "X Y", words);
            let (x, y) = (args.number()?, args.number()?);
            args.finish(PointerInput::Press { x, y })
        }
        "drag" => {
            let mut args = Args::new("drag", "X Y", words);
            let (x, y) = (args.number()?, args.number()?);
            args.finish(PointerInput::Drag { x, y })
        }
        "release" => {
            let mut args = Args::new("release", "X Y or nothing", words);
            match args.words.next() {
                None => Ok(Some(PointerInput::Release { x: 0, y: 0 }.into())),
                Some(first) => {
                    let x = first
                        .parse()
                        .map_err(|_| ParseError::InvalidNumber(first.to_string()))?;
                    let y = args.number()?;
                    args.finish(PointerInput::Release { x, y })
                }
            }
        }
        "event" => {
            let mut args = Args::new("event", "CODE PX PY DX DY", words);
            let code: u8 = args.number()?;
            let event = PointerEvent {
                kind: PointerEventKind::from_code(code),
                percent_x: args.number()?,
                percent_y: args.number()?,
                delta_x: args.number()?,
                delta_y: args.number()?,
            };
            args.finish(RigCommand::RawEvent(event))
        }
        "engage" => {
            let mut args = Args::new("engage", "AXIS on|off", words);
            let axis = args.number()?;
            let engaged = match args.word()? {
                "on" | "1" | "true" => true,
                "off" | "0" | "false" => false,
                other => return Err(ParseError::InvalidSwitch(other.to_string())),
            };
            args.finish(AxisCommand::Engage { axis, engaged })
        }
        "velocity" => {
            let mut args = Args::new("velocity", "AXIS VELOCITY", words);
            let (axis, value) = (args.number()?, args.number()?);
            args.finish(AxisCommand::VelocityLimit { axis, value })
        }
        "accel" => {
            let mut args = Args::new("accel", "AXIS ACCELERATION", words);
            let (axis, value) = (args.number()?, args.number()?);
            args.finish(AxisCommand::Acceleration { axis, value })
        }
        "target" => {
            let mut args = Args::new("target", "AXIS POSITION", words);
            let (axis, value) = (args.number()?, args.number()?);
            args.finish(AxisCommand::TargetPosition { axis, value })
        }
        "position" => {
            let mut args = Args::new("position", "AXIS POSITION", words);
            let (axis, value) = (args.number()?, args.number()?);
            args.finish(AxisCommand::CurrentPosition { axis, value })
        }
        "select" => {
            let mut args = Args::new("select", "AXIS", words);
            let axis = args.number()?;
            args.finish(AxisCommand::Select { axis })
        }
        "plug" => Args::new("plug", "", words).finish(RigCommand::Plug),
        "unplug" => Args::new("unplug", "", words).finish(RigCommand::Unplug),
        "status" => Args::new("status", "", words).finish(ConsoleCommand::Status),
        "help" | "?" => Ok(Some(ConsoleCommand::Help)),
        "quit" | "exit" => Ok(Some(ConsoleCommand::Quit)),
        other => Err(ParseError::UnknownCommand(other.to_string())),
    }
}

fn log_status(snapshot: &RigSnapshot) {
    match &snapshot.attached {
        Some(device) => info!(
            "{} (serial {}) attached, {} motors",
            device.name, device.serial_number, device.axis_count
        ),
        None => info!("No device attached"),
    }
    info!("Knob at ({}, {})", snapshot.knob.x, snapshot.knob.y);
    if let Some(event) = snapshot.last_event {
        info!(
            "Last event {:?}: {}%, {}% (delta {}, {})",
            event.kind, event.percent_x, event.percent_y, event.delta_x, event.delta_y
        );
    }
    for (axis, state) in snapshot.axes.iter().enumerate() {
        info!(
            "Motor {}: engaged={} target={} position={} accel={} velocity_limit={}",
            axis,
            state.engaged,
            state.target_position,
            state.position,
            state.acceleration,
            state.velocity_limit
        );
    }
    if let Some((axis, readout)) = snapshot.selected {
        info!("Selected motor {}: {:?}", axis, readout);
    }
    info!(
        "{} rejected commands, updated {}",
        snapshot.rejected_commands,
        snapshot.updated_at.format("%H:%M:%S%.3f")
    );
}

/// Reads stdin until `quit`, end of input, or the rig goes away
pub async fn run_console(
    commands: mpsc::Sender<RigCommand>,
    snapshots: watch::Receiver<RigSnapshot>,
) -> Result<()> {
    info!("Console ready, type 'help' for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| eyre!("Failed to read console input: {}", e))?
    {
        match parse_line(&line) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::Quit)) => break,
            Ok(Some(ConsoleCommand::Help)) => info!("\n{}", HELP),
            Ok(Some(ConsoleCommand::Status)) => log_status(&snapshots.borrow()),
            Ok(Some(ConsoleCommand::Rig(command))) => commands
                .send(command)
                .await
                .map_err(|e| eyre!("Rig is no longer running: {}", e))?,
            Err(e) => warn!("{}", e),
        }
    }

    info!("Console closed");
    Ok(())
}
