//! Application configuration loaded from TOML
//!
//! Every section falls back to defaults, so a missing file or a partial file
//! still yields a usable rig. Lookup order for the file:
//!
//! 1. `$JOYSTEPPER_CONFIG`
//! 2. `<config dir>/joystepper/config.toml`

use crate::joystick::{KnobState, Point, SurfaceError};
use crate::stepper::driver::{AxisBounds, DeviceInfo};
use crate::stepper::motion_controller::MotionSettings;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

pub const CONFIG_ENV: &str = "JOYSTEPPER_CONFIG";
const CONFIG_DIR: &str = "joystepper";
const CONFIG_FILE: &str = "config.toml";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub surface: SurfaceConfig,
    pub motion: MotionConfig,
    pub device: DeviceConfig,
    pub logging: LoggingConfig,
}

/// Background image of the joystick; half of each side is the knob range
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
    /// Defaults to `width / 2`
    pub center_x: Option<i32>,
    /// Defaults to `height / 2`
    pub center_y: Option<i32>,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 210,
            height: 210,
            center_x: None,
            center_y: None,
        }
    }
}

impl SurfaceConfig {
    pub fn knob_state(&self) -> Result<KnobState, SurfaceError> {
        let center = Point::new(
            self.center_x.unwrap_or((self.width / 2) as i32),
            self.center_y.unwrap_or((self.height / 2) as i32),
        );
        KnobState::new(center, self.width, self.height)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MotionConfig {
    pub max_extent: i64,
    pub stop_poll_interval_ms: u64,
    pub stop_wait_timeout_ms: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            max_extent: 2000,
            stop_poll_interval_ms: 1000,
            stop_wait_timeout_ms: 30_000,
        }
    }
}

impl MotionConfig {
    pub fn settings(&self) -> MotionSettings {
        MotionSettings {
            max_extent: self.max_extent,
            stop_poll_interval: Duration::from_millis(self.stop_poll_interval_ms),
            stop_wait_timeout: Duration::from_millis(self.stop_wait_timeout_ms),
        }
    }
}

/// Simulated stepper board; every axis shares the same bounds
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    pub name: String,
    pub serial_number: u32,
    pub version: u32,
    pub axis_count: usize,
    pub attach_delay_ms: u64,
    pub tick_interval_ms: u64,
    pub acceleration_min: f64,
    pub acceleration_max: f64,
    pub velocity_min: f64,
    pub velocity_max: f64,
    pub position_min: i64,
    pub position_max: i64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "Simulated Bipolar Stepper".to_string(),
            serial_number: 1062,
            version: 100,
            axis_count: 4,
            attach_delay_ms: 250,
            tick_interval_ms: 20,
            acceleration_min: 1.0,
            acceleration_max: 100_000.0,
            velocity_min: 0.0,
            velocity_max: 8000.0,
            position_min: -2000,
            position_max: 2000,
        }
    }
}

impl DeviceConfig {
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            name: self.name.clone(),
            serial_number: self.serial_number,
            version: self.version,
            axis_count: self.axis_count,
        }
    }

    pub fn bounds(&self) -> AxisBounds {
        AxisBounds {
            acceleration_min: self.acceleration_min,
            acceleration_max: self.acceleration_max,
            velocity_min: self.velocity_min,
            velocity_max: self.velocity_max,
            position_min: self.position_min,
            position_max: self.position_max,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn level(&self) -> Result<Level> {
        self.level
            .parse::<Level>()
            .map_err(|e| eyre!("Invalid log level '{}': {}", self.level, e))
    }
}

/// Where the active configuration came from
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    /// No file at the given path, defaults in use
    Defaults(PathBuf),
}

impl AppConfig {
    /// Loads the configuration from the default location
    pub async fn load() -> Result<(Self, ConfigSource)> {
        Self::load_from(&config_path()).await
    }

    pub async fn load_from(path: &Path) -> Result<(Self, ConfigSource)> {
        if !tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check config file {}: {}", path.display(), e))?
        {
            return Ok((Self::default(), ConfigSource::Defaults(path.to_path_buf())));
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        let config = Self::parse(&content)
            .map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))?;
        Ok((config, ConfigSource::File(path.to_path_buf())))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).map_err(|e| eyre!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.surface
            .knob_state()
            .map_err(|e| eyre!("Invalid surface: {}", e))?;
        self.logging.level()?;

        if self.motion.max_extent <= 0 {
            return Err(eyre!("motion.max_extent must be positive"));
        }
        if self.motion.stop_poll_interval_ms == 0 {
            return Err(eyre!("motion.stop_poll_interval_ms must be positive"));
        }

        let device = &self.device;
        if device.axis_count == 0 {
            return Err(eyre!("device.axis_count must be at least 1"));
        }
        if device.tick_interval_ms == 0 {
            return Err(eyre!("device.tick_interval_ms must be positive"));
        }
        if device.acceleration_min > device.acceleration_max
            || device.velocity_min > device.velocity_max
            || device.position_min > device.position_max
        {
            return Err(eyre!("device bounds have min above max"));
        }
        Ok(())
    }
}

/// Resolves the config file path
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }

    let mut path = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));
    path.push(CONFIG_DIR);
    path.push(CONFIG_FILE);
    path
}
