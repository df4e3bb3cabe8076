// relaunch-core/src/prune.rs
use std::path::PathBuf;

use relaunch_aio::fs::remove_dir_all_with_retry;
use relaunch_common::config::RemovalRetry;
use relaunch_common::error::RelaunchError;
use tracing::{error, info};

use crate::index::{newest_first, Deployment, DeploymentSet};

#[derive(Debug, Default)]
pub struct PruneReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, RelaunchError)>,
}

/// Removes every deployment in `set` except the `keep` newest.
///
/// Must not be run while a launcher may still be using an older deployment.
pub fn prune_superseded(set: &DeploymentSet, keep: usize, retry: &RemovalRetry) -> PruneReport {
    let mut report = PruneReport::default();
    let superseded: Vec<&Deployment> = newest_first(set).into_iter().skip(keep).collect();
    for deployment in superseded {
        match remove_dir_all_with_retry(&deployment.root_path, retry) {
            Ok(()) => {
                info!(
                    "Removed {} {} ({})",
                    deployment.app_name,
                    deployment.version,
                    deployment.root_path.display()
                );
                report.removed.push(deployment.root_path.clone());
            }
            Err(e) => {
                error!(
                    "Could not remove {}: {}",
                    deployment.root_path.display(),
                    e
                );
                report.failed.push((deployment.root_path.clone(), e));
            }
        }
    }
    report
}
