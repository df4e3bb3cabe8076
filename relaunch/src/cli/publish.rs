use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use relaunch_common::error::Result;
use relaunch_core::update::publish_archive;

use crate::cli::install::archive_identity;
use crate::cli::{utf8_file_name, SourceArgs, ToolContext};

#[derive(Args, Debug)]
pub struct Publish {
    /// Archive named `<app>_<version>.zip`
    pub archive: PathBuf,

    #[command(flatten)]
    pub source: SourceArgs,
}

impl Publish {
    pub fn run(&self, ctx: &ToolContext) -> Result<()> {
        let (app_name, _) = archive_identity(ctx.app.as_deref(), utf8_file_name(&self.archive)?)?;
        // Only needed when no source is given on the command line.
        let config = ctx.config().ok();
        let source = ctx.update_source(&self.source, config.as_ref())?;
        let version = publish_archive(source.as_ref(), &app_name, &self.archive)?;
        println!(
            "{} {} {} to {}",
            "Published".green().bold(),
            app_name,
            version,
            source.location()
        );
        Ok(())
    }
}
