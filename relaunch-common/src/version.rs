// relaunch-common/src/version.rs
//! Encoding of application versions into deployment directory and archive names.
//!
//! A deployment directory is named `<app>_<semver>`, an archive carrying one is
//! named `<app>_<semver>.<ext>`. Names that do not follow the convention are not
//! errors: the parsers return `None` ("not a version") and callers skip them.

use std::cmp::Ordering;

use regex::Regex;
use semver::Version;
use tracing::debug;

use crate::error::{RelaunchError, Result};

/// Archive suffixes recognised by [`NameCodec::parse_archive_name`], longest first.
pub const ARCHIVE_EXTENSIONS: &[&str] = &[".tar.gz", ".tgz", ".zip", ".7z"];

/// Matches and produces `<app>_<version>` names for one application.
///
/// The app-name prefix is matched case-insensitively, the version part must be a
/// valid semantic version.
#[derive(Debug, Clone)]
pub struct NameCodec {
    app_name: String,
    pattern: Regex,
}

impl NameCodec {
    pub fn new(app_name: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(
            r"^(?i:{})_([0-9A-Za-z.\-+]+)$",
            regex::escape(app_name)
        ))
        .map_err(|e| RelaunchError::Config(format!("Invalid app name '{app_name}': {e}")))?;
        Ok(Self {
            app_name: app_name.to_string(),
            pattern,
        })
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Decodes a deployment directory name, `None` when it is not `<app>_<semver>`.
    pub fn parse_dir_name(&self, dir_name: &str) -> Option<Version> {
        let captures = self.pattern.captures(dir_name)?;
        let version_str = captures.get(1)?.as_str();
        match Version::parse(version_str) {
            Ok(version) => Some(version),
            Err(e) => {
                debug!(
                    "'{}' looks like a {} deployment but '{}' is not a version: {}",
                    dir_name, self.app_name, version_str, e
                );
                None
            }
        }
    }

    /// Decodes an archive file name such as `app_1.2.3.zip`.
    pub fn parse_archive_name(&self, file_name: &str) -> Option<Version> {
        let stem = strip_archive_extension(file_name)?;
        self.parse_dir_name(stem)
    }

    /// Produces the directory name for `version`, the inverse of [`Self::parse_dir_name`].
    pub fn format(&self, version: &Version) -> String {
        format_deployment_name(&self.app_name, version)
    }

    /// Produces the archive name for `version` with the default `.zip` extension.
    pub fn format_archive(&self, version: &Version) -> String {
        format!("{}.zip", self.format(version))
    }
}

/// Returns `file_name` without a recognised archive extension.
pub fn strip_archive_extension(file_name: &str) -> Option<&str> {
    ARCHIVE_EXTENSIONS.iter().find_map(|ext| {
        let split = file_name.len().checked_sub(ext.len())?;
        if file_name.is_char_boundary(split) && file_name[split..].eq_ignore_ascii_case(ext) {
            Some(&file_name[..split])
        } else {
            None
        }
    })
}

pub fn parse_deployment_dir_name(app_name: &str, dir_name: &str) -> Option<Version> {
    NameCodec::new(app_name).ok()?.parse_dir_name(dir_name)
}

pub fn parse_archive_name(app_name: &str, file_name: &str) -> Option<Version> {
    NameCodec::new(app_name).ok()?.parse_archive_name(file_name)
}

pub fn format_deployment_name(app_name: &str, version: &Version) -> String {
    format!("{app_name}_{version}")
}

/// Semantic-version precedence: major, minor, patch, then pre-release.
///
/// Build metadata does not take part, use [`compare_total`] where two distinct
/// versions must never compare equal.
pub fn compare(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch)
        .cmp(&(b.major, b.minor, b.patch))
        // semver's Prerelease ordering already ranks a release above its pre-releases
        .then_with(|| a.pre.cmp(&b.pre))
}

/// [`compare`] with build metadata as the final tie-breaker.
pub fn compare_total(a: &Version, b: &Version) -> Ordering {
    compare(a, b).then_with(|| a.build.cmp(&b.build))
}

/// Splits a directory name at its last `_` into an app name and a version.
///
/// Used when the app name is not known up front.
pub fn split_deployment_dir_name(dir_name: &str) -> Option<(&str, Version)> {
    let (app_name, version_str) = dir_name.rsplit_once('_')?;
    if app_name.is_empty() {
        return None;
    }
    let version = Version::parse(version_str).ok()?;
    Some((app_name, version))
}

/// [`split_deployment_dir_name`] for archive file names such as `app_1.2.3.zip`.
pub fn split_archive_name(file_name: &str) -> Option<(&str, Version)> {
    split_deployment_dir_name(strip_archive_extension(file_name)?)
}
