//! Configuration System using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults (the stage's mechanical constants and protocol timing)
//! 2. A TOML file (by default `config/magnet_positioner.toml`, optional)
//! 3. Environment variables prefixed with `MAGPOS_`, `__` separating sections
//!
//! # Example
//! ```no_run
//! use magnet_positioner::config::PositionerConfig;
//!
//! // MAGPOS_SERIAL__PORT=/dev/ttyACM0 overrides the file
//! let config = PositionerConfig::load()?;
//! config.validate()?;
//! println!("Port: {:?}", config.serial.port);
//! # Ok::<(), magnet_positioner::error::PositionerError>(())
//! ```

use crate::axis::AxisTable;
use crate::error::{AppResult, PositionerError};
use crate::logging::OutputFormat;
use crate::session::SessionOptions;
use crate::transport::SerialSettings;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/magnet_positioner.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "MAGPOS_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionerConfig {
    /// Serial link settings
    #[serde(default)]
    pub serial: SerialSettings,
    /// Protocol timing and framing
    #[serde(default)]
    pub session: SessionOptions,
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Per-axis mechanical constants and travel bounds
    #[serde(default)]
    pub axes: AxisTable,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: OutputFormat::default(),
        }
    }
}

impl PositionerConfig {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file path and the environment.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Ok(Self::figment(path).extract()?)
    }

    /// The provider stack used by [`load_from`](Self::load_from).
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::from(Serialized::defaults(PositionerConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(PositionerError::Configuration(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        if self.serial.baud_rate == 0 {
            return Err(PositionerError::Configuration(
                "baud_rate must be greater than zero".to_string(),
            ));
        }

        if self.serial.timeout.is_zero() {
            return Err(PositionerError::Configuration(
                "serial timeout must be greater than zero".to_string(),
            ));
        }

        if self.session.settle.is_zero() {
            return Err(PositionerError::Configuration(
                "session settle must be greater than zero; the controller needs to warm up after the port opens"
                    .to_string(),
            ));
        }

        self.axes.validate()
    }
}
