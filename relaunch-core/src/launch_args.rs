// relaunch-core/src/launch_args.rs
//! Splits the launcher's own flags from the arguments meant for the application.
//!
//! The launcher does not use a full argument parser: everything it does not
//! recognise is forwarded to the child untouched and in order.

use std::ffi::OsString;
use std::path::PathBuf;

use relaunch_common::error::{RelaunchError, Result};

pub const VERBOSE_FLAG: &str = "--launcher_verbose";
pub const APP_DIR_FLAG: &str = "--app-dir";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchArgs {
    /// Echo the launcher's own log to stderr at DEBUG.
    pub verbose: bool,
    /// Override of the directory the launcher lives in.
    pub app_dir: Option<PathBuf>,
    /// Arguments passed through to the application.
    pub forwarded: Vec<OsString>,
}

impl LaunchArgs {
    /// Parses the launcher argument list, excluding the program name.
    ///
    /// After a literal `--` every argument, including `--` itself, is forwarded.
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<OsString>,
    {
        let mut parsed = Self::default();
        let mut iter = args.into_iter().map(Into::into);
        while let Some(arg) = iter.next() {
            if arg == "--" {
                parsed.forwarded.push(arg);
                parsed.forwarded.extend(iter.by_ref());
                break;
            }
            if arg == VERBOSE_FLAG {
                parsed.verbose = true;
            } else if arg == APP_DIR_FLAG {
                let value = iter.next().ok_or_else(|| {
                    RelaunchError::Config(format!("{APP_DIR_FLAG} requires a directory"))
                })?;
                parsed.app_dir = Some(PathBuf::from(value));
            } else if let Some(value) = arg
                .to_str()
                .and_then(|s| s.strip_prefix(APP_DIR_FLAG))
                .and_then(|s| s.strip_prefix('='))
            {
                parsed.app_dir = Some(PathBuf::from(value));
            } else {
                parsed.forwarded.push(arg);
            }
        }
        Ok(parsed)
    }
}
