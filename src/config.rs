//! Configuration loading using Figment
//!
//! Settings are merged from, lowest to highest precedence:
//! 1. Built-in defaults
//! 2. A TOML file (by default `mp285.toml`)
//! 3. Environment variables prefixed with `MP285_`
//!
//! # Environment Variable Overrides
//!
//! Nested keys are separated by a double underscore:
//!
//! ```text
//! MP285_SERIAL__PORT=/dev/ttyUSB1
//! MP285_SERIAL__TIMEOUT_MS=20000
//! MP285_LOG__LEVEL=debug
//! ```
//!
//! # Example file
//!
//! ```toml
//! [serial]
//! port = "COM5"
//! baud_rate = 9600
//! timeout_ms = 10000
//!
//! [stage]
//! steps_per_micron = 25.0
//!
//! [log]
//! path = "moves.csv"
//! level = "info"
//! ```

use crate::adapters::SerialSettings;
use crate::error::{Mp285Error, Mp285Result};
use crate::units::{StepScale, DEFAULT_STEPS_PER_MICRON};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "mp285.toml";

/// Baud rates selectable on the controller's DIP switches.
pub const SUPPORTED_BAUD_RATES: [u32; 5] = [1200, 2400, 4800, 9600, 19200];

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Serial line settings
    #[serde(default)]
    pub serial: SerialConfig,
    /// Stage calibration
    #[serde(default)]
    pub stage: StageConfig,
    /// Move log and diagnostics
    #[serde(default)]
    pub log: LogConfig,
}

/// Serial line configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial port (e.g., "/dev/ttyUSB0", "COM5")
    #[serde(default = "default_port")]
    pub port: String,
    /// Baud rate; must match the controller's DIP switches
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Reply timeout in milliseconds; must cover the longest expected move
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Stage calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Microsteps per micron
    #[serde(default = "default_steps_per_micron")]
    pub steps_per_micron: f64,
}

/// Move log and diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// CSV move log; moves are not recorded when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_steps_per_micron() -> f64 {
    DEFAULT_STEPS_PER_MICRON
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            steps_per_micron: default_steps_per_micron(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: None,
            level: default_log_level(),
        }
    }
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl Settings {
    /// Load from `mp285.toml` in the working directory (if present) and the environment.
    pub fn load() -> Mp285Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from a specific file path. A missing file is not an error; defaults
    /// and environment variables still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Mp285Result<Self> {
        Self::from_figment(Self::figment(path.as_ref()))
    }

    /// Base figment so callers can layer further providers (e.g. CLI flags).
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("MP285_").split("__"))
    }

    /// Extract and validate settings from a prepared figment.
    pub fn from_figment(figment: Figment) -> Mp285Result<Self> {
        let settings: Self = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Port name is not empty
    /// - Baud rate is one the controller supports
    /// - Timeout is non-zero
    /// - Step scale is positive and finite
    /// - Log level is valid
    pub fn validate(&self) -> Mp285Result<()> {
        if self.serial.port.trim().is_empty() {
            return Err(Mp285Error::Configuration(
                "serial.port cannot be empty".to_string(),
            ));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(Mp285Error::Configuration(format!(
                "Invalid baud_rate {}. Must be one of: {:?}",
                self.serial.baud_rate, SUPPORTED_BAUD_RATES
            )));
        }

        if self.serial.timeout_ms == 0 {
            return Err(Mp285Error::Configuration(
                "serial.timeout_ms must be greater than 0".to_string(),
            ));
        }

        StepScale::new(self.stage.steps_per_micron)?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log.level.as_str()) {
            return Err(Mp285Error::Configuration(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.log.level,
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    /// Serial settings for [`Session::open_with`](crate::Session::open_with).
    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings::new(
            self.serial.port.clone(),
            self.serial.baud_rate,
            Duration::from_millis(self.serial.timeout_ms),
        )
    }

    /// Configured step scale.
    pub fn step_scale(&self) -> Mp285Result<StepScale> {
        StepScale::new(self.stage.steps_per_micron)
    }
}
