//! Session configuration.
//!
//! - `Config` and its sections are deserialized from TOML; every section
//!   and field has a default so a file only needs to name what it changes.
//! - `validate()` runs after parsing; the configuration is immutable once
//!   handed to the scheduler.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::light::Polarity;
use crate::retention::RetentionPolicy;

/// Ten years; keeps every schedule computation within `Instant` range.
pub const MAX_INTERVAL_SECS: u64 = 10 * 365 * 24 * 60 * 60;
pub const MAX_SHOTS_PER_ROUND: usize = 1000;
pub const MAX_LUX_SAMPLES: usize = 1000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub output_dir: PathBuf,
    /// Round interval, measured between round start targets
    pub interval_secs: u64,
    pub width: u32,
    pub height: u32,
    pub shots_per_round: usize,
    /// Pause after each successful shot
    pub shot_gap_ms: u32,
    pub camera_program: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("captures"),
            interval_secs: 7200,
            width: 2304,
            height: 1296,
            shots_per_round: 5,
            shot_gap_ms: 200,
            camera_program: "rpicam-still".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LuxConfig {
    pub samples: usize,
    pub sample_gap_ms: u32,
    /// Fill light is switched on below this average (estimator units)
    pub threshold: f64,
}

impl Default for LuxConfig {
    fn default() -> Self {
        Self {
            samples: 5,
            sample_gap_ms: 100,
            threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub warmup_ms: u32,
    pub gpio_chip: PathBuf,
    pub led_line: u32,
    pub led_active_low: bool,
    pub relay_line: u32,
    pub relay_active_low: bool,
}

impl LightConfig {
    pub const fn led_polarity(&self) -> Polarity {
        Polarity::from_active_low(self.led_active_low)
    }

    pub const fn relay_polarity(&self) -> Polarity {
        Polarity::from_active_low(self.relay_active_low)
    }
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            warmup_ms: 300,
            gpio_chip: PathBuf::from("/dev/gpiochip0"),
            led_line: 4,
            led_active_low: false,
            relay_line: 26,
            relay_active_low: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub i2c_bus: PathBuf,
    pub address: u8,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            i2c_bus: PathBuf::from("/dev/i2c-1"),
            address: 0x23,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub max_age_days: u32,
    pub max_dir_bytes: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_days: 7,
            max_dir_bytes: 2 * 1024 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Container URL ending in `/`; empty disables uploading
    pub base_url: String,
    /// Shared access signature query string, without the leading `?`
    pub sas_token: String,
    pub curl_program: String,
}

impl UploadConfig {
    pub fn is_enabled(&self) -> bool {
        !self.base_url.is_empty()
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            sas_token: String::new(),
            curl_program: "curl".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How often the control loop checks whether a round is due
    pub poll_ms: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { poll_ms: 1000 }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub lux: LuxConfig,
    pub light: LightConfig,
    pub sensor: SensorConfig,
    pub retention: RetentionConfig,
    pub upload: UploadConfig,
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "capture.interval_secs",
                reason: "must be greater than zero",
            });
        }
        if self.capture.interval_secs > MAX_INTERVAL_SECS {
            return Err(ConfigError::Invalid {
                field: "capture.interval_secs",
                reason: "must not exceed ten years",
            });
        }
        if self.capture.shots_per_round > MAX_SHOTS_PER_ROUND {
            return Err(ConfigError::Invalid {
                field: "capture.shots_per_round",
                reason: "must not exceed 1000",
            });
        }
        if self.lux.samples > MAX_LUX_SAMPLES {
            return Err(ConfigError::Invalid {
                field: "lux.samples",
                reason: "must not exceed 1000",
            });
        }
        if self.capture.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "capture.output_dir",
                reason: "must not be empty",
            });
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(ConfigError::Invalid {
                field: "capture.width/height",
                reason: "must be greater than zero",
            });
        }
        if !self.lux.threshold.is_finite() || self.lux.threshold < 0.0 {
            return Err(ConfigError::Invalid {
                field: "lux.threshold",
                reason: "must be a non-negative number",
            });
        }
        if self.runtime.poll_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "runtime.poll_ms",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }

    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.capture.interval_secs)
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy::new(self.retention.max_age_days, self.retention.max_dir_bytes)
    }
}
