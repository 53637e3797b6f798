#[cfg(feature = "sensor-ltr559")]
mod ltr559;

#[cfg(feature = "sensor-ltr559")]
pub use ltr559::{LTR559_ADDRESS, Ltr559, Ltr559Readings};

use thiserror::Error;

/// Raw ambient-light channel counts from a two-photodiode sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawLux {
    /// Visible + infrared channel
    pub ch0: u16,
    /// Infrared-only channel
    pub ch1: u16,
}

impl RawLux {
    pub const fn new(ch0: u16, ch1: u16) -> Self {
        Self { ch0, ch1 }
    }

    /// Convert the raw counts into the scaled lux estimate.
    pub fn lux(self) -> f64 {
        crate::lux::estimate_lux(self.ch0, self.ch1)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: initialization failed ({details})")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: {operation} failed ({details})")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: String,
    },
}

/// Trait for sensors that report raw two-channel ambient-light counts.
///
/// Each call is one independent attempt; the sampling layer decides what to
/// do with failures.
pub trait AmbientLightSensor {
    fn read_raw(&mut self) -> Result<RawLux, SensorError>;
}

impl<S: AmbientLightSensor + ?Sized> AmbientLightSensor for &mut S {
    fn read_raw(&mut self) -> Result<RawLux, SensorError> {
        (**self).read_raw()
    }
}
