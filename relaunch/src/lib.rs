// relaunch/src/lib.rs
//! Shared pieces of the `relaunch` launcher and the `relaunch-tool` maintenance binary.

pub mod cli;
pub mod logging;

use std::env;
use std::path::{Path, PathBuf};

use relaunch_common::config::{InterpreterLayout, LauncherConfig};
use relaunch_common::error::{RelaunchError, Result};
use relaunch_common::Metadata;
use relaunch_core::index::derive_app_name;
use tracing::debug;

/// Directory holding the running executable.
pub fn launcher_dir() -> Result<PathBuf> {
    let exe = env::current_exe()?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        RelaunchError::Config(format!("{} has no parent directory", exe.display()))
    })
}

/// Builds the launcher configuration for the application installed in `app_dir`.
///
/// The app name comes from `app_override`, then the metadata sidecar, then the
/// first `<name>_<semver>` deployment directory found in `app_dir`.
pub fn load_launcher_config(app_dir: &Path, app_override: Option<&str>) -> Result<LauncherConfig> {
    let metadata = Metadata::load(app_dir);
    let layout = InterpreterLayout::platform_default();
    let app_name = app_override
        .map(str::to_string)
        .or_else(|| metadata.app_name.clone())
        .or_else(|| derive_app_name(app_dir, layout.relative_path(metadata.is_gui)))
        .ok_or_else(|| {
            RelaunchError::Config(format!(
                "Could not derive target app name in {}",
                app_dir.display()
            ))
        })?;
    debug!("Target app name: {}", app_name);
    LauncherConfig::load(&app_name, app_dir, &metadata)
}
