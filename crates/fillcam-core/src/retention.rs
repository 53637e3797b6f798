//! Local capture retention.
//!
//! Two passes over the output directory, each starting from a fresh scan:
//!
//! 1. **Age**: every managed image older than `max_age` is removed.
//! 2. **Size**: while the managed images still add up to more than
//!    `max_total_bytes`, the oldest one is removed.
//!
//! Only regular files with an image extension are managed; anything else in
//! the directory is neither counted nor touched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use log::{debug, info, warn};
use thiserror::Error;

pub const MANAGED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Error, Debug)]
pub enum RetentionError {
    #[error("failed to scan {}: {source}", dir.display())]
    Scan {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_age: Duration,
    pub max_total_bytes: u64,
}

impl RetentionPolicy {
    pub const fn new(max_age_days: u32, max_total_bytes: u64) -> Self {
        Self {
            max_age: Duration::from_secs(max_age_days as u64 * SECONDS_PER_DAY),
            max_total_bytes,
        }
    }
}

/// Outcome of one retention run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub removed_by_age: Vec<PathBuf>,
    /// In deletion order, oldest first
    pub removed_by_size: Vec<PathBuf>,
    pub failed_removals: usize,
    pub remaining_bytes: u64,
    pub remaining_files: usize,
}

impl RetentionReport {
    pub fn removed(&self) -> usize {
        self.removed_by_age.len() + self.removed_by_size.len()
    }
}

/// A managed image as seen by the latest scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFile {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
}

impl CaptureFile {
    /// Time since last modification; a timestamp in the future counts as zero.
    pub fn age_at(&self, now: SystemTime) -> Duration {
        now.duration_since(self.modified).unwrap_or(Duration::ZERO)
    }
}

/// Case-insensitive match on [`MANAGED_EXTENSIONS`].
pub fn is_managed_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            MANAGED_EXTENSIONS
                .iter()
                .any(|managed| ext.eq_ignore_ascii_case(managed))
        })
}

/// List the managed images in `dir`, in directory order.
///
/// Entries whose metadata cannot be read are skipped. A failure to read the
/// directory itself, or to advance through it, aborts the scan.
pub fn scan_captures(dir: &Path) -> Result<Vec<CaptureFile>, RetentionError> {
    let scan_error = |source| RetentionError::Scan {
        dir: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(scan_error)? {
        let path = entry.map_err(scan_error)?.path();
        if !is_managed_image(&path) {
            continue;
        }

        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) => {
                debug!("Skipping {}: {e}", path.display());
                continue;
            }
        };
        if !meta.is_file() {
            continue;
        }
        let modified = match meta.modified() {
            Ok(modified) => modified,
            Err(e) => {
                debug!("Skipping {}: {e}", path.display());
                continue;
            }
        };

        files.push(CaptureFile {
            path,
            modified,
            size: meta.len(),
        });
    }
    Ok(files)
}

fn remove<R>(remove_file: &mut R, file: &CaptureFile, reason: &str) -> bool
where
    R: FnMut(&Path) -> io::Result<()>,
{
    match remove_file(&file.path) {
        Ok(()) => {
            info!("Removed {} ({reason})", file.path.display());
            true
        }
        Err(e) => {
            warn!("Failed to remove {}: {e}", file.path.display());
            false
        }
    }
}

/// Applies a [`RetentionPolicy`] to one directory.
pub struct RetentionManager {
    dir: PathBuf,
    policy: RetentionPolicy,
}

impl RetentionManager {
    pub fn new(dir: impl Into<PathBuf>, policy: RetentionPolicy) -> Self {
        Self {
            dir: dir.into(),
            policy,
        }
    }

    pub fn run(&self) -> Result<RetentionReport, RetentionError> {
        self.run_at(SystemTime::now())
    }

    /// Run both passes, measuring ages against `now`.
    pub fn run_at(&self, now: SystemTime) -> Result<RetentionReport, RetentionError> {
        self.run_at_with(now, |path| fs::remove_file(path))
    }

    /// [`run_at`](Self::run_at) with a caller-supplied file removal.
    ///
    /// A file counts as gone only when `remove_file` returns `Ok`.
    pub fn run_at_with<R>(
        &self,
        now: SystemTime,
        mut remove_file: R,
    ) -> Result<RetentionReport, RetentionError>
    where
        R: FnMut(&Path) -> io::Result<()>,
    {
        let mut report = RetentionReport::default();

        for file in scan_captures(&self.dir)? {
            if file.age_at(now) > self.policy.max_age {
                if remove(&mut remove_file, &file, "expired") {
                    report.removed_by_age.push(file.path);
                } else {
                    report.failed_removals += 1;
                }
            }
        }

        let mut files = scan_captures(&self.dir)?;
        files.sort_by_key(|f| f.modified);

        let mut total: u64 = files.iter().map(|f| f.size).sum();
        let mut remaining_files = files.len();
        for file in &files {
            if total <= self.policy.max_total_bytes {
                break;
            }
            if remove(&mut remove_file, file, "over size budget") {
                total -= file.size;
                remaining_files -= 1;
                report.removed_by_size.push(file.path.clone());
            } else {
                report.failed_removals += 1;
            }
        }

        report.remaining_bytes = total;
        report.remaining_files = remaining_files;

        if report.removed() > 0 || report.failed_removals > 0 {
            info!(
                "Retention: {} expired, {} over budget, {} failed, {} bytes in {} files kept",
                report.removed_by_age.len(),
                report.removed_by_size.len(),
                report.failed_removals,
                report.remaining_bytes,
                report.remaining_files
            );
        } else {
            debug!(
                "Retention: nothing to remove ({} bytes in {} files)",
                total, remaining_files
            );
        }
        Ok(report)
    }
}

/// One retention run over `dir` at the current time.
pub fn run_retention(
    dir: &Path,
    policy: &RetentionPolicy,
) -> Result<RetentionReport, RetentionError> {
    RetentionManager::new(dir, *policy).run()
}
