// relaunch-aio/src/process.rs
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;

use relaunch_common::error::{RelaunchError, Result};
use tracing::{debug, error};

/// Runs an external command to completion, capturing stdout and stderr in full.
///
/// `stdin` is handed to the child as is; pass `Stdio::inherit()` for interactive
/// programs.
///
/// Spawn failures are returned as `RelaunchError::Io` so callers can inspect the
/// `io::ErrorKind` (e.g. `NotFound` for a missing interpreter).
pub fn run_command_sync(
    command: &Path,
    args: &[OsString],
    cwd: Option<&Path>,
    envs: Option<&HashMap<String, String>>,
    stdin: Stdio,
) -> Result<Output> {
    debug!(
        "Running command: {} {:?} (cwd: {:?}, envs: {:?})",
        command.display(),
        args,
        cwd,
        envs.map(|e| e.keys().collect::<Vec<_>>())
    );
    let mut cmd = Command::new(command);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    if let Some(env_map) = envs {
        cmd.envs(env_map);
    }
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(stdin);

    match cmd.output() {
        Ok(output) => {
            debug!("Command finished with status: {}", output.status);
            Ok(output)
        }
        Err(e) => {
            error!("Failed to execute {}: {}", command.display(), e);
            Err(RelaunchError::Io(Arc::new(e)))
        }
    }
}
