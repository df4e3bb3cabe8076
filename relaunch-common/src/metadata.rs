// relaunch-common/src/metadata.rs
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

const METADATA_SUFFIX: &str = "_metadata.json";
const DEFAULT_AUTHOR: &str = "unknown";

/// Application identity written next to the launcher by the packaging step.
///
/// Every key is optional in the sidecar file; a missing file yields the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "app", default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default)]
    pub is_gui: bool,
    #[serde(default = "default_true")]
    pub report_exceptions: bool,
}

fn default_author() -> String {
    DEFAULT_AUTHOR.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            app_name: None,
            author: default_author(),
            is_gui: false,
            report_exceptions: true,
        }
    }
}

impl Metadata {
    pub fn file_name(app_name: &str) -> String {
        format!("{app_name}{METADATA_SUFFIX}")
    }

    /// Reads the first parseable `*_metadata.json` in `app_dir`, falling back to defaults.
    pub fn load(app_dir: &Path) -> Self {
        let mut candidates: Vec<PathBuf> = match fs::read_dir(app_dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| {
                    path.is_file()
                        && path
                            .file_name()
                            .and_then(|n| n.to_str())
                            .is_some_and(|n| n.ends_with(METADATA_SUFFIX))
                })
                .collect(),
            Err(e) => {
                debug!(
                    "Could not list {} for metadata: {}. Using defaults.",
                    app_dir.display(),
                    e
                );
                return Self::default();
            }
        };
        candidates.sort();

        for path in candidates {
            match Self::read(&path) {
                Ok(metadata) => {
                    debug!("Loaded metadata from {}", path.display());
                    return metadata;
                }
                Err(e) => warn!("Ignoring unreadable metadata {}: {}", path.display(), e),
            }
        }
        debug!("No metadata found in {}, using defaults.", app_dir.display());
        Self::default()
    }

    pub fn read(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn write(&self, dir: &Path, app_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(Self::file_name(app_name));
        fs::write(&path, serde_json::to_vec_pretty(self)?)?;
        Ok(path)
    }
}
