use std::process::{Command, Stdio};

use fillcam_core::capture::{discard_partial, verify_output};
use fillcam_core::{Camera, CaptureError, CaptureRequest};
use log::debug;

/// Still capture through the `rpicam-still` command-line tool.
pub struct RpicamStill {
    program: String,
}

impl RpicamStill {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, request: &CaptureRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--immediate")
            .arg("--width")
            .arg(request.width.to_string())
            .arg("--height")
            .arg(request.height.to_string())
            .arg("-o")
            .arg(&request.output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

impl Camera for RpicamStill {
    fn capture(&mut self, request: &CaptureRequest) -> Result<(), CaptureError> {
        debug!("Running {} -> {}", self.program, request.output_path.display());
        let status = self
            .command(request)
            .status()
            .map_err(|source| CaptureError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            discard_partial(&request.output_path);
            return Err(CaptureError::Exit {
                program: self.program.clone(),
                status,
            });
        }
        verify_output(&request.output_path)
    }
}
