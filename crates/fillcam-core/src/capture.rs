//! Still-image capture capability and capture file naming.

use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use chrono::{DateTime, TimeZone};
use log::warn;
use thiserror::Error;

pub const CAPTURE_PREFIX: &str = "photo";
pub const CAPTURE_EXTENSION: &str = "jpg";

/// One still capture at a fixed resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub output_path: PathBuf,
    pub width: u32,
    pub height: u32,
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {status}")]
    Exit { program: String, status: ExitStatus },
    #[error("no image written to {}", path.display())]
    Missing { path: PathBuf },
    #[error("capture device error: {0}")]
    Device(String),
}

/// Produces one image file per request.
///
/// On failure no file may remain at `output_path`; see [`discard_partial`].
pub trait Camera {
    fn capture(&mut self, request: &CaptureRequest) -> Result<(), CaptureError>;
}

impl<C: Camera + ?Sized> Camera for &mut C {
    fn capture(&mut self, request: &CaptureRequest) -> Result<(), CaptureError> {
        (**self).capture(request)
    }
}

/// `photo_YYYYMMDD_HHMMSS_<index>.jpg`, `index` being 1-based within a round.
pub fn capture_file_name<Tz>(timestamp: &DateTime<Tz>, index: usize) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!(
        "{CAPTURE_PREFIX}_{}_{index}.{CAPTURE_EXTENSION}",
        timestamp.format("%Y%m%d_%H%M%S")
    )
}

/// Check that a capture left a non-empty file behind, removing an empty one.
pub fn verify_output(path: &Path) -> Result<(), CaptureError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        Ok(_) | Err(_) => {
            discard_partial(path);
            Err(CaptureError::Missing {
                path: path.to_path_buf(),
            })
        }
    }
}

/// Remove whatever a failed capture left at `path`.
pub fn discard_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => warn!("Removed partial capture {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial capture {}: {e}", path.display()),
    }
}
