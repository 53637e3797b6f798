//! Azure Blob Storage uploads through `curl`.

use std::path::Path;
use std::process::{Command, Stdio};

use fillcam_core::config::UploadConfig;
use fillcam_core::{UploadError, Uploader};
use log::debug;

/// Environment variable that overrides the configured SAS token.
pub const SAS_ENV_VAR: &str = "FILLCAM_AZURE_SAS";

/// `PUT`s each file as a block blob into one container.
pub struct AzureBlobUploader {
    curl: String,
    base_url: String,
    sas_token: String,
}

impl AzureBlobUploader {
    pub fn new(curl: impl Into<String>, base_url: impl Into<String>, sas_token: &str) -> Self {
        Self {
            curl: curl.into(),
            base_url: base_url.into(),
            sas_token: sas_token.trim_start_matches('?').to_owned(),
        }
    }

    /// `<base><name>?<sas>`; the query is omitted when there is no token.
    pub fn blob_url(&self, remote_name: &str) -> String {
        let mut url = self.base_url.clone();
        if !url.is_empty() && !url.ends_with('/') {
            url.push('/');
        }
        url.push_str(remote_name);
        if !self.sas_token.is_empty() {
            url.push('?');
            url.push_str(&self.sas_token);
        }
        url
    }

    fn command(&self, local_path: &Path, remote_name: &str) -> Command {
        let mut cmd = Command::new(&self.curl);
        cmd.args(["-s", "--fail", "-X", "PUT", "-T"])
            .arg(local_path)
            .args(["-H", "x-ms-blob-type: BlockBlob"])
            .arg(self.blob_url(remote_name))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

impl Uploader for AzureBlobUploader {
    fn upload(&mut self, local_path: &Path, remote_name: &str) -> Result<(), UploadError> {
        debug!("PUT {} as {remote_name}", local_path.display());
        let status = self
            .command(local_path, remote_name)
            .status()
            .map_err(|source| UploadError::Spawn {
                program: self.curl.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(UploadError::Rejected {
                remote_name: remote_name.to_owned(),
                status,
            })
        }
    }
}

/// Keeps captures local only.
pub struct LocalOnly;

impl Uploader for LocalOnly {
    fn upload(&mut self, _local_path: &Path, _remote_name: &str) -> Result<(), UploadError> {
        Err(UploadError::Disabled)
    }
}

/// Configured uploader, or [`LocalOnly`] when no container URL is set.
pub enum DeviceUploader {
    Azure(AzureBlobUploader),
    LocalOnly(LocalOnly),
}

impl DeviceUploader {
    /// `sas_override` takes precedence over the token in the file.
    pub fn from_config(config: &UploadConfig, sas_override: Option<String>) -> Self {
        if !config.is_enabled() {
            return Self::LocalOnly(LocalOnly);
        }
        let sas = sas_override.unwrap_or_else(|| config.sas_token.clone());
        Self::Azure(AzureBlobUploader::new(
            config.curl_program.clone(),
            config.base_url.clone(),
            &sas,
        ))
    }
}

impl Uploader for DeviceUploader {
    fn upload(&mut self, local_path: &Path, remote_name: &str) -> Result<(), UploadError> {
        match self {
            Self::Azure(azure) => azure.upload(local_path, remote_name),
            Self::LocalOnly(local) => local.upload(local_path, remote_name),
        }
    }
}
