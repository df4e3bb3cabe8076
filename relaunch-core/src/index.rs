// relaunch-core/src/index.rs
//! Discovery of installed deployments across the configured search roots.

use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use relaunch_aio::fs::list_subdirectories;
use relaunch_common::version::{compare, compare_total, split_deployment_dir_name, NameCodec};
use semver::Version;
use serde::Serialize;
use tracing::{debug, info, warn};

/// One installed, runnable copy of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deployment {
    pub app_name: String,
    pub version: Version,
    /// Directory named `<app>_<version>`.
    pub root_path: PathBuf,
    pub interpreter_path: PathBuf,
}

/// Valid deployments keyed by version, rebuilt on every resolution pass.
pub type DeploymentSet = BTreeMap<Version, Deployment>;

/// Scans `search_roots` (highest priority first) for `<app>_<semver>` directories
/// that contain an interpreter at `interpreter_subpath`.
///
/// Names that are not versions and directories without an interpreter are skipped,
/// never reported as errors. When the same version appears in several roots the
/// first root wins.
pub fn scan(app_name: &str, search_roots: &[PathBuf], interpreter_subpath: &Path) -> DeploymentSet {
    let mut set = DeploymentSet::new();
    let codec = match NameCodec::new(app_name) {
        Ok(codec) => codec,
        Err(e) => {
            warn!("Cannot scan for deployments of '{}': {}", app_name, e);
            return set;
        }
    };

    for root in search_roots {
        let entries = match list_subdirectories(root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Skipping search root {}: {}", root.display(), e);
                continue;
            }
        };
        for (name, path) in entries {
            let Some(version) = codec.parse_dir_name(&name) else {
                continue;
            };
            let interpreter_path = path.join(interpreter_subpath);
            if !interpreter_path.exists() {
                debug!(
                    "Discarding {}: no interpreter at {}",
                    path.display(),
                    interpreter_path.display()
                );
                continue;
            }
            match set.entry(version) {
                Entry::Vacant(slot) => {
                    debug!("Found deployment {} at {}", slot.key(), path.display());
                    let version = slot.key().clone();
                    slot.insert(Deployment {
                        app_name: app_name.to_string(),
                        version,
                        root_path: path,
                        interpreter_path,
                    });
                }
                Entry::Occupied(existing) => {
                    debug!(
                        "{} is shadowed by {}",
                        path.display(),
                        existing.get().root_path.display()
                    );
                }
            }
        }
    }
    set
}

/// The newest deployment in `set`, `None` when it is empty.
pub fn latest(set: &DeploymentSet) -> Option<&Deployment> {
    set.values().max_by(|a, b| by_precedence(&a.version, &b.version))
}

/// Deployments ordered newest first.
pub fn newest_first(set: &DeploymentSet) -> Vec<&Deployment> {
    let mut deployments: Vec<&Deployment> = set.values().collect();
    deployments.sort_by(|a, b| by_precedence(&b.version, &a.version));
    deployments
}

fn by_precedence(a: &Version, b: &Version) -> Ordering {
    match compare(a, b) {
        Ordering::Equal => compare_total(a, b),
        other => other,
    }
}

/// Scans and picks the latest deployment in one step.
pub fn resolve_latest(
    app_name: &str,
    search_roots: &[PathBuf],
    interpreter_subpath: &Path,
) -> Option<Deployment> {
    let set = scan(app_name, search_roots, interpreter_subpath);
    let latest = latest(&set).cloned();
    match &latest {
        Some(deployment) => info!(
            "Resolved {} {} at {}",
            app_name,
            deployment.version,
            deployment.root_path.display()
        ),
        None => info!(
            "No deployment of {} found in {} search root(s)",
            app_name,
            search_roots.len()
        ),
    }
    latest
}

/// Guesses the application name from the first `<name>_<semver>` directory in
/// `app_dir` that contains an interpreter.
pub fn derive_app_name(app_dir: &Path, interpreter_subpath: &Path) -> Option<String> {
    let entries = list_subdirectories(app_dir).ok()?;
    entries.into_iter().find_map(|(name, path)| {
        let (app_name, _) = split_deployment_dir_name(&name)?;
        if path.join(interpreter_subpath).exists() {
            debug!("Derived app name '{}' from {}", app_name, path.display());
            Some(app_name.to_string())
        } else {
            None
        }
    })
}
