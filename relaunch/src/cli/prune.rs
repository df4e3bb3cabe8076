use clap::Args;
use colored::Colorize;
use relaunch_common::error::{RelaunchError, Result};
use relaunch_core::index::scan;
use relaunch_core::prune_superseded;

use crate::cli::ToolContext;

/// Deletes superseded deployments. Do not run while the application is open.
#[derive(Args, Debug)]
pub struct Prune {
    /// Number of newest deployments to keep
    #[arg(long, default_value_t = 1)]
    pub keep: usize,
}

impl Prune {
    pub fn run(&self, ctx: &ToolContext) -> Result<()> {
        if self.keep == 0 {
            return Err(RelaunchError::ValidationError(
                "--keep must be at least 1".to_string(),
            ));
        }
        let config = ctx.config()?;
        let set = scan(
            &config.app_name,
            &config.search_roots(),
            config.interpreter_subpath(),
        );
        let report = prune_superseded(&set, self.keep, &config.removal_retry);
        for path in &report.removed {
            println!("{} {}", "Removed".green().bold(), path.display());
        }
        for (path, e) in &report.failed {
            println!("{} {}: {}", "Failed".red().bold(), path.display(), e);
        }
        if report.removed.is_empty() && report.failed.is_empty() {
            println!("Nothing to prune");
        }
        if report.failed.is_empty() {
            Ok(())
        } else {
            Err(RelaunchError::Generic(format!(
                "{} deployment(s) could not be removed",
                report.failed.len()
            )))
        }
    }
}
