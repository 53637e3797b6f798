//! Hardware bring-up for the Linux device
//!
//! - Ambient-light sensor on a `/dev/i2c-N` bus via `linux-embedded-hal`
//! - Fill-light lines on a `/dev/gpiochipN` character device via `gpio-cdev`
//!
//! Both are fatal on failure; the caller exits before the first round.

use std::path::{Path, PathBuf};

use embedded_hal::digital::{self, ErrorType, OutputPin};
use fillcam_core::config::{LightConfig, SensorConfig};
use fillcam_core::sensors::{Ltr559, SensorError};
use fillcam_core::{FillLight, LightError, Polarity};
use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use linux_embedded_hal::{Delay, I2cdev};
use log::info;
use thiserror::Error;

/// Consumer label shown by `gpioinfo` for the requested lines.
const GPIO_CONSUMER: &str = "fillcam";

#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("failed to open I2C bus {}: {details}", path.display())]
    I2cOpen { path: PathBuf, details: String },
    #[error(transparent)]
    Sensor(#[from] SensorError),
    #[error("failed to open GPIO chip {}: {source}", path.display())]
    GpioChip {
        path: PathBuf,
        #[source]
        source: gpio_cdev::Error,
    },
    #[error("failed to request GPIO line {offset}: {source}")]
    GpioLine {
        offset: u32,
        #[source]
        source: gpio_cdev::Error,
    },
    #[error(transparent)]
    Light(#[from] LightError),
}

pub type Sensor = Ltr559<I2cdev>;
pub type Light = FillLight<LinePin, LinePin>;

/// Open the I2C bus, bring the LTR-559 up, and wait for its first sample.
pub fn init_sensor(config: &SensorConfig) -> Result<Sensor, HardwareError> {
    let bus = I2cdev::new(&config.i2c_bus).map_err(|e| HardwareError::I2cOpen {
        path: config.i2c_bus.clone(),
        details: e.to_string(),
    })?;

    let mut sensor = Ltr559::with_address(bus, config.address);
    sensor.init(&mut Delay)?;
    info!(
        "LTR559 ready on {} at {:#04x}",
        config.i2c_bus.display(),
        config.address
    );
    Ok(sensor)
}

/// Request both fill-light lines, already at their OFF level.
pub fn init_light(config: &LightConfig) -> Result<Light, HardwareError> {
    let mut chip = open_chip(&config.gpio_chip)?;
    let led = LinePin::request(&mut chip, config.led_line, config.led_polarity())?;
    let relay = LinePin::request(&mut chip, config.relay_line, config.relay_polarity())?;
    info!(
        "Fill light on {}: LED line {}, relay line {}",
        config.gpio_chip.display(),
        config.led_line,
        config.relay_line
    );
    Ok(FillLight::new(
        led,
        config.led_polarity(),
        relay,
        config.relay_polarity(),
    )?)
}

fn open_chip(path: &Path) -> Result<Chip, HardwareError> {
    Chip::new(path).map_err(|source| HardwareError::GpioChip {
        path: path.to_path_buf(),
        source,
    })
}

const fn off_level(polarity: Polarity) -> u8 {
    match polarity {
        Polarity::ActiveHigh => 0,
        Polarity::ActiveLow => 1,
    }
}

#[derive(Debug)]
pub struct LineError(gpio_cdev::Error);

impl digital::Error for LineError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

/// One requested output line.
pub struct LinePin {
    handle: LineHandle,
}

impl LinePin {
    fn request(chip: &mut Chip, offset: u32, polarity: Polarity) -> Result<Self, HardwareError> {
        let handle = chip
            .get_line(offset)
            .and_then(|line| {
                line.request(LineRequestFlags::OUTPUT, off_level(polarity), GPIO_CONSUMER)
            })
            .map_err(|source| HardwareError::GpioLine { offset, source })?;
        Ok(Self { handle })
    }
}

impl ErrorType for LinePin {
    type Error = LineError;
}

impl OutputPin for LinePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.handle.set_value(0).map_err(LineError)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.handle.set_value(1).map_err(LineError)
    }
}
