use std::io;
use std::path::Path;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    /// No remote storage configured; captures stay local.
    #[error("upload disabled")]
    Disabled,
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("upload of {remote_name} rejected ({status})")]
    Rejected {
        remote_name: String,
        status: ExitStatus,
    },
    #[error("upload failed: {0}")]
    Transport(String),
}

/// Pushes one local file to remote object storage under `remote_name`.
///
/// One attempt per call; retrying is left to the caller.
pub trait Uploader {
    fn upload(&mut self, local_path: &Path, remote_name: &str) -> Result<(), UploadError>;
}

impl<U: Uploader + ?Sized> Uploader for &mut U {
    fn upload(&mut self, local_path: &Path, remote_name: &str) -> Result<(), UploadError> {
        (**self).upload(local_path, remote_name)
    }
}
