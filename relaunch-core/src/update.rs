// relaunch-core/src/update.rs
//! Fetching and publishing new application versions.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use relaunch_aio::{install_atomic, read_json, sha256_file, verify_checksum, write_json};
use relaunch_common::config::{RemovalRetry, UpdateSourceSpec};
use relaunch_common::error::{RelaunchError, Result};
pub use relaunch_common::update_source::{archive_file_name, RemotePointer, UpdateSource};
use relaunch_common::version::{compare, format_deployment_name, NameCodec};
use relaunch_net::HttpUpdateSource;
use semver::Version;
use tracing::{debug, info, warn};

/// Update source backed by a plain directory (a share, a mounted bucket, a test fixture).
#[derive(Debug, Clone)]
pub struct LocalUpdateSource {
    dir: PathBuf,
}

impl LocalUpdateSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl UpdateSource for LocalUpdateSource {
    fn location(&self) -> String {
        self.dir.display().to_string()
    }

    fn fetch_pointer(&self, app_name: &str) -> Result<RemotePointer> {
        let path = self.dir.join(RemotePointer::file_name(app_name));
        if !path.is_file() {
            return Err(RelaunchError::NotFound(format!(
                "No version pointer at {}",
                path.display()
            )));
        }
        read_json(&path)
    }

    fn download_archive(&self, app_name: &str, version: &Version, dest: &Path) -> Result<()> {
        let src = self.dir.join(archive_file_name(app_name, version));
        debug!("Copying {} to {}", src.display(), dest.display());
        fs::copy(&src, dest).map_err(|e| {
            RelaunchError::DownloadError(
                app_name.to_string(),
                src.display().to_string(),
                e.to_string(),
            )
        })?;
        Ok(())
    }

    fn upload_archive(&self, archive: &Path) -> Result<String> {
        let file_name = archive.file_name().ok_or_else(|| {
            RelaunchError::ValidationError(format!("{} has no file name", archive.display()))
        })?;
        fs::create_dir_all(&self.dir)?;
        let dest = self.dir.join(file_name);
        fs::copy(archive, &dest)?;
        Ok(dest.display().to_string())
    }

    fn publish_latest(&self, app_name: &str, version: &Version, sha256: Option<&str>) -> Result<()> {
        let pointer = RemotePointer::new(app_name, version.clone(), sha256.map(str::to_string));
        write_json(&self.dir.join(RemotePointer::file_name(app_name)), &pointer)
    }
}

/// Builds the configured update source, `None` when updates are not configured.
pub fn source_from_spec(spec: &UpdateSourceSpec) -> Result<Option<Box<dyn UpdateSource>>> {
    let source: Box<dyn UpdateSource> = match spec {
        UpdateSourceSpec::None => return Ok(None),
        UpdateSourceSpec::Local(dir) => Box::new(LocalUpdateSource::new(dir.clone())),
        UpdateSourceSpec::Http(url) => Box::new(HttpUpdateSource::new(url)?),
    };
    Ok(Some(source))
}

/// Installs the remote version of `app_name` under `install_root` when it is newer
/// than `current`.
///
/// Returns the installed version. A failure at any step means "no update this
/// time" and is only logged.
pub fn apply_update(
    source: &dyn UpdateSource,
    app_name: &str,
    current: Option<&Version>,
    install_root: &Path,
    retry: &RemovalRetry,
) -> Option<Version> {
    match try_apply_update(source, app_name, current, install_root, retry) {
        Ok(applied) => applied,
        Err(e) => {
            warn!(
                "Update of {} from {} not applied: {}",
                app_name,
                source.location(),
                e
            );
            None
        }
    }
}

fn try_apply_update(
    source: &dyn UpdateSource,
    app_name: &str,
    current: Option<&Version>,
    install_root: &Path,
    retry: &RemovalRetry,
) -> Result<Option<Version>> {
    let pointer = source.fetch_pointer(app_name)?;
    let remote = pointer.version.clone();
    if let Some(current) = current {
        if compare(&remote, current) != Ordering::Greater {
            info!("{} {} is up to date (remote {})", app_name, current, remote);
            return Ok(None);
        }
    }
    info!("Updating {} to {} from {}", app_name, remote, source.location());

    fs::create_dir_all(install_root)?;
    let download_dir = tempfile::Builder::new()
        .prefix(".relaunch-download.")
        .tempdir_in(install_root)?;
    let archive = download_dir.path().join(archive_file_name(app_name, &remote));
    source.download_archive(app_name, &remote, &archive)?;
    match &pointer.sha256 {
        Some(expected) => verify_checksum(&archive, expected)?,
        None => debug!("No checksum published for {} {}", app_name, remote),
    }

    let destination = install_root.join(format_deployment_name(app_name, &remote));
    if !install_atomic(&archive, &destination, retry) {
        return Err(RelaunchError::ExtractionFailed(format!(
            "Could not install {}",
            destination.display()
        )));
    }
    Ok(Some(remote))
}

/// Uploads `archive` and points the source at its version.
///
/// The version is read from the archive's file name, which must be
/// `<app>_<version>.<ext>`.
pub fn publish_archive(source: &dyn UpdateSource, app_name: &str, archive: &Path) -> Result<Version> {
    let codec = NameCodec::new(app_name)?;
    let version = archive
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| codec.parse_archive_name(n))
        .ok_or_else(|| {
            RelaunchError::ValidationError(format!(
                "{} is not named like {}",
                archive.display(),
                codec.format_archive(&Version::new(1, 0, 0))
            ))
        })?;
    let sha256 = sha256_file(archive)?;
    let url = source.upload_archive(archive)?;
    info!("Uploaded {} to {}", archive.display(), url);
    source.publish_latest(app_name, &version, Some(&sha256))?;
    info!("Published {} {} on {}", app_name, version, source.location());
    Ok(version)
}
