//! Device runtime: bring hardware up, then poll the round scheduler until
//! asked to stop.

use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use fillcam_core::{Config, ConfigError, RoundScheduler, SystemClock};
use log::{info, warn};
use thiserror::Error;

use crate::camera::RpicamStill;
use crate::hardware::{self, HardwareError};
use crate::upload::{DeviceUploader, SAS_ENV_VAR};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Hardware(#[from] HardwareError),
    #[error("failed to create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] io::Error),
}

/// How long the runtime keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One round, then exit
    Once,
    /// Rounds on schedule until `stop` is set
    Continuous,
}

pub fn run(config: Config, mode: RunMode, stop: &AtomicBool) -> Result<(), AppError> {
    let output_dir = config.capture.output_dir.clone();
    fs::create_dir_all(&output_dir).map_err(|source| AppError::OutputDir {
        path: output_dir.clone(),
        source,
    })?;

    // Lines first: if the sensor then fails, dropping the light forces it off.
    let light = hardware::init_light(&config.light)?;
    let sensor = hardware::init_sensor(&config.sensor)?;
    let camera = RpicamStill::new(config.capture.camera_program.clone());
    let sas = env::var(SAS_ENV_VAR).ok().filter(|token| !token.is_empty());
    let uploader = DeviceUploader::from_config(&config.upload, sas);
    if matches!(uploader, DeviceUploader::LocalOnly(_)) {
        info!("No upload container configured; captures stay local");
    }

    info!(
        "Capturing {} shots every {}s into {}",
        config.capture.shots_per_round,
        config.capture.interval_secs,
        output_dir.display()
    );
    let mut scheduler = RoundScheduler::new(config, sensor, light, camera, uploader, SystemClock);

    match mode {
        RunMode::Once => {
            scheduler.run_round();
        }
        RunMode::Continuous => {
            while !stop.load(Ordering::Relaxed) {
                scheduler.poll();
                scheduler.idle();
            }
            info!("Stop requested");
        }
    }

    if let Err(e) = scheduler.shutdown() {
        warn!("Fill light shutdown incomplete: {e}");
    }
    Ok(())
}
