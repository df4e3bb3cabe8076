use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use relaunch_aio::try_install_atomic;
use relaunch_common::config::RemovalRetry;
use relaunch_common::error::{RelaunchError, Result};
use relaunch_common::version::{format_deployment_name, split_archive_name, NameCodec};
use semver::Version;
use tracing::debug;

use crate::cli::{utf8_file_name, ToolContext};

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Archive named `<app>_<version>.zip` (or .tar.gz/.tgz)
    pub archive: PathBuf,

    /// Directory to install into (defaults to --app-dir)
    #[arg(long)]
    pub root: Option<PathBuf>,
}

impl InstallArgs {
    pub fn run(&self, ctx: &ToolContext) -> Result<()> {
        let file_name = utf8_file_name(&self.archive)?;
        let (app_name, version) = archive_identity(ctx.app.as_deref(), file_name)?;
        let root = self.root.clone().unwrap_or_else(|| ctx.app_dir.clone());
        let destination = root.join(format_deployment_name(&app_name, &version));
        debug!(
            "Installing {} as {}",
            self.archive.display(),
            destination.display()
        );

        try_install_atomic(&self.archive, &destination, &RemovalRetry::default())?;
        println!(
            "{} {} {} -> {}",
            "Installed".green().bold(),
            app_name,
            version,
            destination.display()
        );
        Ok(())
    }
}

/// App name and version encoded in an archive file name.
pub(crate) fn archive_identity(app: Option<&str>, file_name: &str) -> Result<(String, Version)> {
    let identity = match app {
        Some(app) => NameCodec::new(app)?
            .parse_archive_name(file_name)
            .map(|version| (app.to_string(), version)),
        None => split_archive_name(file_name).map(|(app, version)| (app.to_string(), version)),
    };
    identity.ok_or_else(|| {
        RelaunchError::ValidationError(format!(
            "'{file_name}' is not named <app>_<version>.<zip|tar.gz|tgz>"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_from_archive_names() {
        assert_eq!(
            archive_identity(None, "my_app_1.2.0.zip").unwrap(),
            ("my_app".to_string(), Version::new(1, 2, 0))
        );
        assert_eq!(
            archive_identity(Some("My_App"), "my_app_1.2.0.tgz").unwrap().1,
            Version::new(1, 2, 0)
        );
        assert!(archive_identity(Some("other"), "my_app_1.2.0.zip").is_err());
        assert!(archive_identity(None, "my_app.zip").is_err());
    }
}
