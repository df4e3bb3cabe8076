// relaunch/src/main.rs
//! The launcher placed next to an installed application.
//!
//! Arguments are not parsed with clap: apart from the launcher's own flags,
//! everything is handed to the application verbatim.
use std::env;
use std::process;

use colored::Colorize;
use relaunch::logging;
use relaunch::{launcher_dir, load_launcher_config};
use relaunch_common::exit_code;
use relaunch_core::update::source_from_spec;
use relaunch_core::{LaunchArgs, Supervisor};
use tracing::{error, info, warn};

fn main() {
    let code = run();
    process::exit(code);
}

fn run() -> i32 {
    let args = match LaunchArgs::parse(env::args_os().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            return exit_code::ERROR;
        }
    };

    let app_dir = match args.app_dir.clone().map(Ok).unwrap_or_else(launcher_dir) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("{}: could not locate the application directory: {}", "Error".red().bold(), e);
            return exit_code::ERROR;
        }
    };

    let config = match load_launcher_config(&app_dir, None) {
        Ok(config) => config,
        Err(e) => {
            logging::init_stderr_logging();
            error!("{}", e);
            return exit_code::ERROR;
        }
    };
    let guard = logging::init_launcher_logging(&config, args.verbose);

    info!(
        "{} launcher {} (app_dir={}, gui={}, report_exceptions={})",
        config.app_name,
        env!("CARGO_PKG_VERSION"),
        config.app_dir.display(),
        config.is_gui,
        config.report_exceptions
    );

    let update_source = match source_from_spec(&config.update_source) {
        Ok(source) => source,
        Err(e) => {
            warn!("Update source unavailable, continuing without updates: {}", e);
            None
        }
    };

    let mut supervisor = Supervisor::new(config, args.forwarded);
    if let Some(source) = update_source {
        supervisor = supervisor.with_update_source(source);
    }
    let code = supervisor.run().exit_code();
    drop(guard);
    code
}
