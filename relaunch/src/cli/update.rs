use clap::Args;
use colored::Colorize;
use relaunch_common::error::Result;
use relaunch_core::index::{latest, scan};
use relaunch_core::update::apply_update;

use crate::cli::{SourceArgs, ToolContext};

/// Installs the newest published version if it is newer than what is installed.
#[derive(Args, Debug)]
pub struct Update {
    #[command(flatten)]
    pub source: SourceArgs,
}

impl Update {
    pub fn run(&self, ctx: &ToolContext) -> Result<()> {
        let config = ctx.config()?;
        let source = ctx.update_source(&self.source, Some(&config))?;
        let set = scan(
            &config.app_name,
            &config.search_roots(),
            config.interpreter_subpath(),
        );
        let current = latest(&set).map(|d| d.version.clone());
        tracing::debug!("Installed version: {:?}", current);

        let install_root = config.install_root();
        match apply_update(
            source.as_ref(),
            &config.app_name,
            current.as_ref(),
            &install_root,
            &config.removal_retry,
        ) {
            Some(version) => println!(
                "{} {} to {} in {}",
                "Updated".green().bold(),
                config.app_name,
                version,
                install_root.display()
            ),
            None => println!("{} is up to date", config.app_name),
        }
        Ok(())
    }
}
