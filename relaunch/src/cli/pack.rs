use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use relaunch_aio::pack_directory;
use relaunch_common::error::Result;
use relaunch_common::version::split_deployment_dir_name;
use tracing::warn;

use crate::cli::{utf8_file_name, ToolContext};

#[derive(Args, Debug)]
pub struct Pack {
    /// Deployment directory to pack, normally named `<app>_<version>`
    pub dir: PathBuf,

    /// Output archive (defaults to `<dir>.zip` next to the directory)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

impl Pack {
    pub fn run(&self, _ctx: &ToolContext) -> Result<()> {
        let dir_name = utf8_file_name(&self.dir)?;
        if split_deployment_dir_name(dir_name).is_none() {
            warn!(
                "{} is not named <app>_<version>; name the archive accordingly before publishing",
                self.dir.display()
            );
        }
        let out = self
            .out
            .clone()
            .unwrap_or_else(|| self.dir.with_file_name(format!("{dir_name}.zip")));
        let entries = pack_directory(&self.dir, &out)?;
        println!(
            "{} {} ({} entries)",
            "Packed".green().bold(),
            out.display(),
            entries
        );
        Ok(())
    }
}
