//! Hardware-independent core library for fillcam
//!
//! This crate contains all platform-agnostic logic for the fillcam timed
//! capture controller: lux estimation and sampling, the fill-light
//! controller, local capture retention, and the round scheduler that ties
//! them together.
//!
//! Peripherals are reached only through `embedded-hal` traits and the
//! capability traits defined here, so the same code drives the Linux device
//! binary, the desktop simulator, and the unit tests.

pub mod capture;
pub mod clock;
pub mod config;
pub mod light;
pub mod lux;
pub mod retention;
pub mod sampling;
pub mod scheduler;
pub mod sensors;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use capture::{Camera, CaptureError, CaptureRequest};
pub use clock::{Clock, SystemClock};
pub use config::{Config, ConfigError};
pub use light::{FillControl, FillLight, LightError, Polarity};
pub use retention::{RetentionError, RetentionPolicy, RetentionReport};
pub use sampling::LuxSummary;
pub use scheduler::{FillDecision, RoundReport, RoundScheduler};
pub use sensors::{AmbientLightSensor, RawLux, SensorError};
pub use upload::{UploadError, Uploader};
