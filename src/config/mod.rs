pub mod path;
pub mod profile;
pub mod state;

use std::{fs, io, path::Path};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::input::{
    multiplexer::MultiplexerConfig,
    target::{dualsense::PaddlesToClicks, uinput::ControllerTheme},
    touchpad::TouchpadCorrectionType,
};

/// Represents all possible errors loading or saving a [Config]
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Could not read: {0}")]
    Io(#[from] io::Error),
    #[error("Unable to deserialize: {0}")]
    Deserialize(#[from] serde_yaml::Error),
    #[error("Unable to convert: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Daemon configuration, stored in `hhd.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    pub http: HttpConfig,
    pub controller: ControllerConfig,
    pub battery: BatteryConfig,
    pub tdp: TdpConfig,
    pub fan: FanConfig,
    pub power: PowerConfig,
}

impl Config {
    /// Load a [Config] from the given YAML string
    pub fn from_yaml(content: &str) -> Result<Config, LoadError> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Load a [Config] from the given YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Config, LoadError> {
        let content = fs::read_to_string(path)?;
        Config::from_yaml(&content)
    }

    /// Load the config at the given path, falling back to defaults when the
    /// file does not exist yet.
    pub fn load(path: &Path) -> Result<Config, LoadError> {
        match Config::from_yaml_file(path) {
            Err(LoadError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("No config found at {path:?}, using defaults");
                Ok(Config::default())
            }
            result => result,
        }
    }

    /// Write the config to the given path, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), LoadError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// The config as a dynamically-typed state tree
    pub fn to_value(&self) -> Result<serde_json::Value, LoadError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Config, LoadError> {
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "snake_case")]
pub struct HttpConfig {
    pub enabled: bool,
    pub port: u16,
    /// Only listen on the loopback interface
    pub localhost: bool,
    /// Bearer token required by the TCP endpoint
    pub token: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 5335,
            localhost: true,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Emulation {
    Dualsense,
    #[default]
    DualsenseEdge,
    Xbox,
    SteamDeck,
    Disabled,
}

/// Where the virtual controller gets its motion data from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MotionSource {
    /// Accelerometer and gyroscope of the tablet, via iio
    #[default]
    Tablet,
    LeftController,
    RightController,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "snake_case")]
pub struct ControllerConfig {
    pub emulation: Emulation,
    pub bluetooth: bool,
    pub sync_gyro: bool,
    pub flip_z: bool,
    pub touchpad_correction: TouchpadCorrectionType,
    pub paddles_to_clicks: PaddlesToClicks,
    pub controller_id: u8,
    /// Keep the virtual controller alive for a few seconds between restarts
    pub cache: bool,
    pub fake_timestamps: bool,
    pub enable_touchpad: bool,
    pub enable_rgb: bool,
    /// Lowest loop rate, in Hz
    pub min_freq: u32,
    /// Highest loop rate, in Hz
    pub max_freq: u32,
    pub motion: MotionSource,
    /// Theme of the uinput controller in xbox emulation
    pub theme: ControllerTheme,
    /// Swap the legion buttons with start/select
    pub swap_legion: bool,
    pub multiplexer: MultiplexerConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            emulation: Emulation::default(),
            bluetooth: true,
            sync_gyro: false,
            flip_z: true,
            touchpad_correction: TouchpadCorrectionType::CropEnd,
            paddles_to_clicks: PaddlesToClicks::Disabled,
            controller_id: 0,
            cache: false,
            fake_timestamps: false,
            enable_touchpad: true,
            enable_rgb: true,
            min_freq: 25,
            max_freq: 400,
            motion: MotionSource::default(),
            theme: ControllerTheme::default(),
            swap_legion: false,
            multiplexer: MultiplexerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChargeBypass {
    #[default]
    Disabled,
    /// Power the device from the charger while awake
    Awake,
    Always,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "snake_case")]
pub struct BatteryConfig {
    /// Charge limit in percent, 0 disables it
    pub charge_limit: u8,
    pub charge_bypass: ChargeBypass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TdpMode {
    Quiet,
    #[default]
    Balanced,
    Performance,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "snake_case")]
pub struct TdpConfig {
    /// Leave the TDP to the firmware
    pub enabled: bool,
    pub mode: TdpMode,
    /// Sustained power limit, in watts
    pub spl: u32,
    /// Slow boost limit, in watts
    pub sppt: u32,
    /// Fast boost limit, in watts
    pub fppt: Option<u32>,
}

impl Default for TdpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: TdpMode::default(),
            spl: 15,
            sppt: 17,
            fppt: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FanMode {
    #[default]
    Auto,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "snake_case")]
pub struct FanConfig {
    pub mode: FanMode,
    /// Duty cycle in percent for each temperature point
    pub points: [u8; 6],
}

impl Default for FanConfig {
    fn default() -> Self {
        Self {
            mode: FanMode::default(),
            points: [0, 40, 49, 58, 67, 75],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "snake_case")]
pub struct PowerConfig {
    /// Hibernate or shut down when the device overheats or the battery runs out
    pub thermal_watchdog: bool,
    /// Create a temporary swap file when hibernation fails
    pub create_swap: bool,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            thermal_watchdog: true,
            create_swap: false,
        }
    }
}
