// relaunch/src/tool.rs
//! `relaunch-tool`: inspect, install, pack, publish, update and prune deployments.
use std::process;

use clap::Parser;
use colored::Colorize;
use relaunch::cli::{CliArgs, ToolContext};
use relaunch::logging;
use relaunch_common::exit_code;

fn main() {
    let cli_args = CliArgs::parse();
    logging::init_tool_logging(cli_args.verbose);

    let ctx = ToolContext::from_args(&cli_args);
    if let Err(e) = cli_args.command.run(&ctx) {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        process::exit(exit_code::ERROR);
    }
}
