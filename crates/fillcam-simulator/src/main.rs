//! Desktop simulator for the fillcam round scheduler.
//!
//! Runs the real `RoundScheduler` against simulated peripherals over one
//! simulated day, with no hardware and no waiting:
//!
//! - a light sensor following a day/night curve, dropping some reads
//! - fill-light lines that log their level
//! - a camera that writes a small placeholder JPEG and sometimes fails
//! - an uploader that only logs
//!
//! Captures go to `$TMPDIR/fillcam-simulator`. Set `RUST_LOG=debug` to see
//! every round phase.

use std::cell::Cell;
use std::convert::Infallible;
use std::f64::consts::PI;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use fillcam_core::{
    AmbientLightSensor, Camera, CaptureError, CaptureRequest, Clock, Config, FillLight, Polarity,
    RawLux, RoundScheduler, SensorError, UploadError, Uploader,
};
use log::{debug, error, info, warn};

/// Simulated time covered by one run.
const SIMULATED_SPAN: Duration = Duration::from_secs(24 * 60 * 60);

/// Every n-th sensor read fails.
const SENSOR_DROP_EVERY: u32 = 7;

/// Every n-th capture fails.
const CAMERA_FAIL_EVERY: u32 = 11;

/// Minimal JPEG (SOI + EOI) written for each simulated shot.
const PLACEHOLDER_JPEG: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xD9];

// ---------------------------------------------------------------------------
// Simulated time
// ---------------------------------------------------------------------------

/// Clock whose waits return immediately after moving simulated time forward.
#[derive(Clone)]
struct SimClock {
    start: Instant,
    elapsed: Rc<Cell<Duration>>,
}

impl SimClock {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Rc::default(),
        }
    }

    fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }

    fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }
}

impl DelayNs for SimClock {
    fn delay_ns(&mut self, ns: u32) {
        self.advance(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance(Duration::from_millis(u64::from(ms)));
    }
}

impl Clock for SimClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed.get()
    }
}

// ---------------------------------------------------------------------------
// Simulated peripherals
// ---------------------------------------------------------------------------

/// Ambient light following a daylight curve that peaks at noon.
struct DaylightSensor {
    clock: SimClock,
    reads: u32,
}

impl DaylightSensor {
    /// Simulation starts at midnight.
    fn channels_at(elapsed: Duration) -> RawLux {
        let day_fraction = elapsed.as_secs_f64() / SIMULATED_SPAN.as_secs_f64();
        let sun = (-(2.0 * PI * day_fraction).cos()).max(0.0);
        let visible = 2.0 + 600.0 * sun;
        RawLux::new(visible as u16, (visible * 0.2) as u16)
    }
}

impl AmbientLightSensor for DaylightSensor {
    fn read_raw(&mut self) -> Result<RawLux, SensorError> {
        self.reads += 1;
        if self.reads % SENSOR_DROP_EVERY == 0 {
            return Err(SensorError::ReadFailed {
                sensor: "sim",
                operation: "read ALS channels",
                details: "simulated NACK".into(),
            });
        }
        Ok(Self::channels_at(self.clock.elapsed()))
    }
}

struct SimPin {
    name: &'static str,
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        debug!("[gpio] {} low", self.name);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        debug!("[gpio] {} high", self.name);
        Ok(())
    }
}

/// Writes a placeholder image; each shot takes two simulated seconds.
struct SimCamera {
    clock: SimClock,
    shots: u32,
}

impl Camera for SimCamera {
    fn capture(&mut self, request: &CaptureRequest) -> Result<(), CaptureError> {
        self.shots += 1;
        self.clock.advance(Duration::from_secs(2));
        if self.shots % CAMERA_FAIL_EVERY == 0 {
            return Err(CaptureError::Device("simulated sensor timeout".into()));
        }
        fs::write(&request.output_path, PLACEHOLDER_JPEG)
            .map_err(|e| CaptureError::Device(e.to_string()))
    }
}

struct LoggingUploader;

impl Uploader for LoggingUploader {
    fn upload(&mut self, local_path: &Path, remote_name: &str) -> Result<(), UploadError> {
        info!("[upload] {} -> {remote_name}", local_path.display());
        Ok(())
    }
}

fn main() {
    env_logger::init();

    let output_dir = std::env::temp_dir().join("fillcam-simulator");
    if let Err(e) = fs::create_dir_all(&output_dir) {
        error!("Cannot create {}: {e}", output_dir.display());
        return;
    }

    let mut config = Config::default();
    config.capture.output_dir = output_dir.clone();
    config.retention.max_dir_bytes = 64;
    config.runtime.poll_ms = 60_000;

    let clock = SimClock::new();
    let light = match FillLight::new(
        SimPin { name: "led" },
        Polarity::ActiveHigh,
        SimPin { name: "relay" },
        Polarity::ActiveLow,
    ) {
        Ok(light) => light,
        Err(e) => {
            error!("{e}");
            return;
        }
    };
    let sensor = DaylightSensor {
        clock: clock.clone(),
        reads: 0,
    };
    let camera = SimCamera {
        clock: clock.clone(),
        shots: 0,
    };
    let mut scheduler = RoundScheduler::new(
        config,
        sensor,
        light,
        camera,
        LoggingUploader,
        clock.clone(),
    );

    info!("Simulating one day into {}", output_dir.display());
    while clock.elapsed() < SIMULATED_SPAN {
        if let Some(report) = scheduler.poll() {
            let hour = clock.elapsed().as_secs_f64() / 3600.0;
            info!(
                "t={hour:5.2}h round {}: lux {:?} {:?}, {}/{} captured, {} files kept",
                report.round,
                report.lux.average.map(|avg| (avg * 1000.0).round() / 1000.0),
                report.fill,
                report.captured.len(),
                report.shots,
                report
                    .retention
                    .as_ref()
                    .map_or(0, |retention| retention.remaining_files)
            );
        }
        scheduler.idle();
    }

    if let Err(e) = scheduler.shutdown() {
        warn!("Fill light shutdown incomplete: {e}");
    }
}
