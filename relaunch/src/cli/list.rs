use clap::Args;
use colored::Colorize;
use relaunch_common::error::Result;
use relaunch_core::index::{newest_first, scan};

use crate::cli::ToolContext;

#[derive(Args, Debug)]
pub struct List {
    /// Print the deployments as JSON
    #[arg(long)]
    pub json: bool,
}

impl List {
    pub fn run(&self, ctx: &ToolContext) -> Result<()> {
        let config = ctx.config()?;
        let roots = config.search_roots();
        let set = scan(&config.app_name, &roots, config.interpreter_subpath());
        let deployments = newest_first(&set);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&deployments)?);
            return Ok(());
        }
        if deployments.is_empty() {
            println!(
                "{}",
                format!("No deployments of {} found", config.app_name).yellow()
            );
            for root in &roots {
                println!("  searched {}", root.display());
            }
            return Ok(());
        }

        println!("{}", config.app_name.bold());
        for (i, deployment) in deployments.iter().enumerate() {
            let version = deployment.version.to_string();
            if i == 0 {
                println!(
                    "  {:<16} {} {}",
                    version.green().bold(),
                    deployment.root_path.display(),
                    "(latest)".green()
                );
            } else {
                println!("  {:<16} {}", version, deployment.root_path.display());
            }
        }
        Ok(())
    }
}
