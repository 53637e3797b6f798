use super::{AmbientLightSensor, RawLux, SensorError};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};
use log::{debug, info, warn};

/// Default 7-bit I2C address of the LTR-559.
pub const LTR559_ADDRESS: u8 = 0x23;

const SENSOR: &str = "LTR559";

const REG_ALS_CONTR: u8 = 0x80;
const REG_PS_CONTR: u8 = 0x81;
const REG_ALS_MEAS_RATE: u8 = 0x85;
const REG_PART_ID: u8 = 0x86;
/// First of four ALS data bytes: CH1 low, CH1 high, CH0 low, CH0 high.
const REG_ALS_DATA_CH1_0: u8 = 0x88;
const REG_ALS_PS_STATUS: u8 = 0x8C;
const REG_PS_DATA_0: u8 = 0x8D;

/// ALS active mode, gain 1x.
const ALS_CONTR_ACTIVE: u8 = 0x01;
/// 100 ms integration, 500 ms repeat rate.
const ALS_MEAS_RATE_DEFAULT: u8 = 0x03;
/// PS active mode.
const PS_CONTR_ACTIVE: u8 = 0x03;
const PS_DATA_MASK: u16 = 0x07FF;

/// Upper nibble of PART_ID for the LTR-559 family.
const PART_NUMBER: u8 = 0x9;

const STARTUP_SETTLE_MS: u32 = 100;

/// One complete register snapshot from the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ltr559Readings {
    pub status: u8,
    pub als: RawLux,
    /// 11-bit proximity count
    pub proximity: u16,
}

/// Blocking LTR-559 ambient-light / proximity driver.
pub struct Ltr559<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> Ltr559<I> {
    pub fn new(i2c: I) -> Self {
        Self::with_address(i2c, LTR559_ADDRESS)
    }

    pub fn with_address(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Enable the ALS and PS engines and wait for the first integration.
    ///
    /// A failed PART_ID read is only reported; a failed control write is an
    /// initialization failure.
    pub fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), SensorError> {
        match self.read_register(REG_PART_ID) {
            Ok(part_id) if part_id >> 4 == PART_NUMBER => {
                info!("{SENSOR}: PART_ID={part_id:#04x}");
            }
            Ok(part_id) => warn!("{SENSOR}: unexpected PART_ID={part_id:#04x}"),
            Err(e) => warn!("{SENSOR}: PART_ID read failed: {e}"),
        }

        for (register, value, details) in [
            (REG_ALS_CONTR, ALS_CONTR_ACTIVE, "Failed to enable ALS"),
            (REG_ALS_MEAS_RATE, ALS_MEAS_RATE_DEFAULT, "Failed to set measurement rate"),
            (REG_PS_CONTR, PS_CONTR_ACTIVE, "Failed to enable PS"),
        ] {
            self.i2c
                .write(self.address, &[register, value])
                .map_err(|e| {
                    warn!("{SENSOR}: write {register:#04x} failed: {:?}", e.kind());
                    SensorError::InitializationFailed {
                        sensor: SENSOR,
                        details,
                    }
                })?;
        }

        delay.delay_ms(STARTUP_SETTLE_MS);
        Ok(())
    }

    /// Read status, both ALS channels and the proximity count.
    pub fn read(&mut self) -> Result<Ltr559Readings, SensorError> {
        let status = self.read_register(REG_ALS_PS_STATUS)?;

        let mut als = [0u8; 4];
        self.read_block(REG_ALS_DATA_CH1_0, &mut als, "read ALS channels")?;
        let ch1 = u16::from_le_bytes([als[0], als[1]]);
        let ch0 = u16::from_le_bytes([als[2], als[3]]);

        let mut ps = [0u8; 2];
        self.read_block(REG_PS_DATA_0, &mut ps, "read PS data")?;
        let proximity = u16::from_le_bytes(ps) & PS_DATA_MASK;

        Ok(Ltr559Readings {
            status,
            als: RawLux::new(ch0, ch1),
            proximity,
        })
    }

    /// Release the underlying bus.
    pub fn release(self) -> I {
        self.i2c
    }

    fn read_register(&mut self, register: u8) -> Result<u8, SensorError> {
        let mut value = [0u8; 1];
        self.read_block(register, &mut value, "read register")?;
        Ok(value[0])
    }

    fn read_block(
        &mut self,
        register: u8,
        buffer: &mut [u8],
        operation: &'static str,
    ) -> Result<(), SensorError> {
        self.i2c
            .write_read(self.address, &[register], buffer)
            .map_err(|e| {
                debug!("{SENSOR}: {operation} at {register:#04x} failed: {:?}", e.kind());
                SensorError::ReadFailed {
                    sensor: SENSOR,
                    operation,
                    details: format!("{:?}", e.kind()),
                }
            })
    }
}

impl<I: I2c> AmbientLightSensor for Ltr559<I> {
    fn read_raw(&mut self) -> Result<RawLux, SensorError> {
        self.read().map(|r| r.als)
    }
}
