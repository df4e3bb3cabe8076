// relaunch-common/src/update_source.rs
//! The contract between the launcher and wherever new versions are published.
//!
//! A source stores archives named `<app>_<version>.zip` next to a pointer file
//! `<app>.json` that names the current version.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::version::format_deployment_name;

/// Contents of the `<app>.json` pointer file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePointer {
    pub name: String,
    pub version: Version,
    /// Seconds since the epoch at publish time.
    #[serde(default)]
    pub ts: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl RemotePointer {
    pub fn new(app_name: &str, version: Version, sha256: Option<String>) -> Self {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        Self {
            name: app_name.to_string(),
            version,
            ts,
            sha256,
        }
    }

    pub fn file_name(app_name: &str) -> String {
        format!("{app_name}.json")
    }
}

/// Name of the archive carrying `version` of `app_name` on an update source.
pub fn archive_file_name(app_name: &str, version: &Version) -> String {
    format!("{}.zip", format_deployment_name(app_name, version))
}

/// A place new versions are published to and fetched from.
///
/// Every method reports failure through `Err`; for the launcher that only means
/// "no update this time".
pub trait UpdateSource {
    /// Human readable location, used in log messages.
    fn location(&self) -> String;

    fn fetch_pointer(&self, app_name: &str) -> Result<RemotePointer>;

    fn latest_remote_version(&self, app_name: &str) -> Result<Version> {
        Ok(self.fetch_pointer(app_name)?.version)
    }

    /// Downloads the archive for `version` to `dest`.
    fn download_archive(&self, app_name: &str, version: &Version, dest: &Path) -> Result<()>;

    /// Uploads an archive under its own file name, returning where it now lives.
    fn upload_archive(&self, archive: &Path) -> Result<String>;

    /// Points `<app>.json` at `version`.
    fn publish_latest(&self, app_name: &str, version: &Version, sha256: Option<&str>) -> Result<()>;
}
