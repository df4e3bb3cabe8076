// relaunch-core/src/supervisor.rs
//! The launch loop: resolve the newest deployment, run it, and relaunch when the
//! application asks for it, until it exits for good or restarts too often.

use std::collections::HashMap;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::SystemTime;

use relaunch_aio::run_command_sync;
use relaunch_common::config::LauncherConfig;
use relaunch_common::error::Result;
use relaunch_common::exit_code;
use semver::Version;
use tracing::{debug, error, info, warn};

use crate::governor::RestartGovernor;
use crate::index::{self, Deployment};
use crate::update::{apply_update, UpdateSource};

/// Argument that makes the interpreter run the application package.
pub const RUN_MODULE_FLAG: &str = "-m";
/// Tells the application whether it should report unhandled exceptions.
pub const REPORT_EXCEPTIONS_ENV: &str = "RELAUNCH_REPORT_EXCEPTIONS";

/// A fully built child command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    pub envs: HashMap<String, String>,
}

/// Everything the child left behind once it exited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildOutput {
    /// `None` when the child was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs a child to completion. `Err` means the child could not be started at all.
pub trait ChildRunner {
    fn run(&mut self, command: &ChildCommand) -> Result<ChildOutput>;
}

/// Spawns real processes and captures their output in full. The child shares
/// the launcher's stdin so console applications stay interactive.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ChildRunner for SystemRunner {
    fn run(&mut self, command: &ChildCommand) -> Result<ChildOutput> {
        let output = run_command_sync(
            &command.program,
            &command.args,
            command.cwd.as_deref(),
            Some(&command.envs),
            Stdio::inherit(),
        )?;
        Ok(ChildOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// How a supervisor run ended. Every variant maps to a process exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The application exited on its own with this code (0 included).
    Exited(i32),
    /// The application was terminated by a signal.
    Killed,
    NoDeploymentFound,
    /// The interpreter could not be started.
    LaunchError(String),
    ExcessiveRestarts,
}

impl LaunchOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Exited(code) => *code,
            Self::Killed | Self::NoDeploymentFound => exit_code::ERROR,
            Self::LaunchError(_) => exit_code::CAN_NOT_FIND_FILE,
            Self::ExcessiveRestarts => exit_code::RESTART,
        }
    }
}

enum Classification {
    Ok,
    RestartRequested,
    Failed(i32),
    Killed,
}

fn classify(code: Option<i32>) -> Classification {
    match code {
        Some(exit_code::OK) => Classification::Ok,
        Some(exit_code::RESTART) => Classification::RestartRequested,
        Some(code) => Classification::Failed(code),
        None => Classification::Killed,
    }
}

pub struct Supervisor<R: ChildRunner = SystemRunner> {
    config: LauncherConfig,
    forwarded_args: Vec<OsString>,
    runner: R,
    governor: RestartGovernor,
    update_source: Option<Box<dyn UpdateSource>>,
    echo_output: bool,
    launches: usize,
}

impl Supervisor<SystemRunner> {
    pub fn new(config: LauncherConfig, forwarded_args: Vec<OsString>) -> Self {
        Self::with_runner(config, forwarded_args, SystemRunner)
    }
}

impl<R: ChildRunner> Supervisor<R> {
    pub fn with_runner(config: LauncherConfig, forwarded_args: Vec<OsString>, runner: R) -> Self {
        let governor = RestartGovernor::new(config.restart);
        Self {
            config,
            forwarded_args,
            runner,
            governor,
            update_source: None,
            echo_output: true,
            launches: 0,
        }
    }

    /// Source consulted after a restart request, when auto update is enabled.
    pub fn with_update_source(mut self, source: Box<dyn UpdateSource>) -> Self {
        self.update_source = Some(source);
        self
    }

    /// Whether child output is echoed to the launcher's own stdout/stderr.
    pub fn echo_output(mut self, echo: bool) -> Self {
        self.echo_output = echo;
        self
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn governor(&self) -> &RestartGovernor {
        &self.governor
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Number of times a child was started by this supervisor (diagnostic re-runs excluded).
    pub fn launches(&self) -> usize {
        self.launches
    }

    /// Runs the launch loop until a terminal state is reached.
    pub fn run(&mut self) -> LaunchOutcome {
        let outcome = self.run_loop();
        info!(
            "Returning {:?} (exit code {}) after {} launch(es)",
            outcome,
            outcome.exit_code(),
            self.launches
        );
        outcome
    }

    fn run_loop(&mut self) -> LaunchOutcome {
        let app_name = self.config.app_name.clone();
        loop {
            let search_roots = self.config.search_roots();
            let Some(deployment) = index::resolve_latest(
                &app_name,
                &search_roots,
                self.config.interpreter_subpath(),
            ) else {
                error!(
                    "Could not find any runnable {}_* deployment in {:?}",
                    app_name, search_roots
                );
                return LaunchOutcome::NoDeploymentFound;
            };

            let command = self.child_command(&deployment);
            info!("cmd={:?} cwd={:?}", command_line(&command), command.cwd);
            self.launches += 1;
            let output = match self.runner.run(&command) {
                Ok(output) => output,
                Err(e) => {
                    error!(
                        "Could not start {}: {}",
                        command.program.display(),
                        e
                    );
                    return LaunchOutcome::LaunchError(e.to_string());
                }
            };
            let output = self.diagnose_silent_failure(&deployment, &command, output);
            self.report_output(&output);
            info!("return_code={:?}", output.code);

            match classify(output.code) {
                Classification::Ok => return LaunchOutcome::Exited(exit_code::OK),
                Classification::Failed(code) => return LaunchOutcome::Exited(code),
                Classification::Killed => {
                    error!("{} was terminated by a signal", command.program.display());
                    return LaunchOutcome::Killed;
                }
                Classification::RestartRequested => {
                    self.governor.record_restart(SystemTime::now());
                    if self.governor.is_excessive() {
                        error!(
                            "Excessive restarts ({} within the window), restarts=[{}]",
                            self.governor.len(),
                            self.governor.describe()
                        );
                        return LaunchOutcome::ExcessiveRestarts;
                    }
                    info!(
                        "{} {} requested a restart",
                        app_name, deployment.version
                    );
                    self.apply_pending_update(&deployment.version);
                }
            }
        }
    }

    fn child_command(&self, deployment: &Deployment) -> ChildCommand {
        let mut args: Vec<OsString> = vec![
            RUN_MODULE_FLAG.into(),
            deployment.app_name.clone().into(),
        ];
        args.extend(self.forwarded_args.iter().cloned());
        let mut envs = HashMap::new();
        envs.insert(
            REPORT_EXCEPTIONS_ENV.to_string(),
            if self.config.report_exceptions { "1" } else { "0" }.to_string(),
        );
        ChildCommand {
            program: deployment.interpreter_path.clone(),
            args,
            cwd: deployment.interpreter_path.parent().map(|p| p.to_path_buf()),
            envs,
        }
    }

    /// A windowed interpreter that fails without writing to stderr leaves no trace.
    /// Re-run the same command with the console interpreter to capture one; the
    /// exit code of the original run is kept.
    fn diagnose_silent_failure(
        &mut self,
        deployment: &Deployment,
        command: &ChildCommand,
        output: ChildOutput,
    ) -> ChildOutput {
        let failed = !matches!(
            classify(output.code),
            Classification::Ok | Classification::RestartRequested
        );
        if !self.config.is_gui || !failed || !output.stderr.trim().is_empty() {
            return output;
        }
        let console = deployment.root_path.join(&self.config.layout.console);
        if console == command.program || !console.exists() {
            debug!("No separate console interpreter for diagnostics");
            return output;
        }
        warn!(
            "{} exited with {:?} but wrote nothing to stderr, re-running with {} for diagnostics",
            command.program.display(),
            output.code,
            console.display()
        );
        let mut args: Vec<OsString> = vec!["-X".into(), "faulthandler".into()];
        args.extend(command.args.iter().cloned());
        let diagnostic = ChildCommand {
            program: console,
            args,
            cwd: command.cwd.clone(),
            envs: command.envs.clone(),
        };
        info!("diagnostic cmd={:?}", command_line(&diagnostic));
        match self.runner.run(&diagnostic) {
            Ok(rerun) => ChildOutput {
                code: output.code,
                stdout: rerun.stdout,
                stderr: rerun.stderr,
            },
            Err(e) => {
                error!("Diagnostic re-run failed: {}", e);
                output
            }
        }
    }

    fn report_output(&self, output: &ChildOutput) {
        let has_stderr = !output.stderr.trim().is_empty();
        let failed = !matches!(
            classify(output.code),
            Classification::Ok | Classification::RestartRequested
        );
        if has_stderr || failed {
            if !output.stdout.trim().is_empty() {
                warn!("{}", output.stdout);
            }
            if has_stderr {
                error!("{}", output.stderr);
            }
        }

        for (name, text) in [("stdout", &output.stdout), ("stderr", &output.stderr)] {
            if text.trim().is_empty() {
                continue;
            }
            for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                info!("{}:{}", name, line);
            }
            if self.echo_output {
                let result = if name == "stdout" {
                    write!(io::stdout().lock(), "{text}")
                } else {
                    write!(io::stderr().lock(), "{text}")
                };
                if let Err(e) = result {
                    debug!("Could not echo child {}: {}", name, e);
                }
            }
        }
    }

    fn apply_pending_update(&self, current: &Version) {
        if !self.config.auto_update {
            debug!("Automatic updates are disabled");
            return;
        }
        let Some(source) = &self.update_source else {
            debug!("No update source configured");
            return;
        };
        let install_root = self.config.install_root();
        if let Some(applied) = apply_update(
            source.as_ref(),
            &self.config.app_name,
            Some(current),
            &install_root,
            &self.config.removal_retry,
        ) {
            info!(
                "Applied {} {} in {}",
                self.config.app_name,
                applied,
                install_root.display()
            );
        }
    }
}

fn command_line(command: &ChildCommand) -> Vec<String> {
    std::iter::once(command.program.as_os_str())
        .chain(command.args.iter().map(|a| a.as_os_str()))
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use relaunch_common::config::RestartPolicy;
    use relaunch_common::error::RelaunchError;
    use tempfile::TempDir;

    use super::*;

    /// Replays canned results and records every command it was given.
    #[derive(Default)]
    struct ScriptedRunner {
        results: VecDeque<Result<ChildOutput>>,
        commands: Vec<ChildCommand>,
    }

    impl ScriptedRunner {
        fn exiting_with(codes: &[i32]) -> Self {
            Self {
                results: codes
                    .iter()
                    .map(|code| {
                        Ok(ChildOutput {
                            code: Some(*code),
                            ..Default::default()
                        })
                    })
                    .collect(),
                commands: Vec::new(),
            }
        }
    }

    impl ChildRunner for ScriptedRunner {
        fn run(&mut self, command: &ChildCommand) -> Result<ChildOutput> {
            self.commands.push(command.clone());
            self.results.pop_front().unwrap_or(Ok(ChildOutput {
                code: Some(exit_code::OK),
                ..Default::default()
            }))
        }
    }

    fn make_deployment(root: &Path, name: &str, interpreter: &Path) {
        let interp = root.join(name).join(interpreter);
        fs::create_dir_all(interp.parent().unwrap()).unwrap();
        fs::write(interp, "").unwrap();
    }

    fn config(app_dir: &Path) -> LauncherConfig {
        let mut config = LauncherConfig::new("app", app_dir);
        config.restart = RestartPolicy {
            max_samples: 4,
            quick_window: Duration::from_secs(60),
        };
        config
    }

    fn supervisor(config: LauncherConfig, args: &[&str], runner: ScriptedRunner) -> Supervisor<ScriptedRunner> {
        let args = args.iter().map(OsString::from).collect();
        Supervisor::with_runner(config, args, runner).echo_output(false)
    }

    #[test]
    fn launches_latest_and_forwards_arguments() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let subpath = config.interpreter_subpath().to_path_buf();
        make_deployment(dir.path(), "app_0.0.1", &subpath);
        make_deployment(dir.path(), "app_0.0.2", &subpath);

        let mut sup = supervisor(config, &["--foo", "bar"], ScriptedRunner::exiting_with(&[0]));
        assert_eq!(sup.run(), LaunchOutcome::Exited(0));
        assert_eq!(sup.launches(), 1);

        let cmd = &sup.runner().commands[0];
        assert_eq!(cmd.program, dir.path().join("app_0.0.2").join(&subpath));
        let args: Vec<&str> = cmd.args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(args, vec!["-m", "app", "--foo", "bar"]);
        assert_eq!(cmd.cwd.as_deref(), cmd.program.parent());
        assert_eq!(cmd.envs.get(REPORT_EXCEPTIONS_ENV).map(String::as_str), Some("1"));
    }

    #[test]
    fn restart_then_ok_takes_two_launches() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        make_deployment(dir.path(), "app_1.0.0", config.interpreter_subpath());
        let mut sup = supervisor(config, &[], ScriptedRunner::exiting_with(&[13, 0]));
        assert_eq!(sup.run().exit_code(), exit_code::OK);
        assert_eq!(sup.launches(), 2);
        assert_eq!(sup.governor().len(), 1);
    }

    #[test]
    fn quick_restarts_trip_the_breaker() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        make_deployment(dir.path(), "app_1.0.0", config.interpreter_subpath());
        let mut sup = supervisor(config, &[], ScriptedRunner::exiting_with(&[13; 10]));
        let outcome = sup.run();
        assert_eq!(outcome, LaunchOutcome::ExcessiveRestarts);
        assert_eq!(outcome.exit_code(), exit_code::RESTART);
        assert_eq!(sup.launches(), 4);
    }

    #[test]
    fn no_deployment_is_terminal() {
        let dir = TempDir::new().unwrap();
        let mut sup = supervisor(config(dir.path()), &[], ScriptedRunner::default());
        let outcome = sup.run();
        assert_eq!(outcome, LaunchOutcome::NoDeploymentFound);
        assert_eq!(outcome.exit_code(), exit_code::ERROR);
        assert_eq!(sup.launches(), 0);
    }

    #[test]
    fn spawn_failure_is_a_launch_error() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        make_deployment(dir.path(), "app_1.0.0", config.interpreter_subpath());
        let runner = ScriptedRunner {
            results: VecDeque::from([Err(RelaunchError::Io(Arc::new(io::Error::new(
                io::ErrorKind::NotFound,
                "gone",
            ))))]),
            commands: Vec::new(),
        };
        let outcome = supervisor(config, &[], runner).run();
        assert!(matches!(outcome, LaunchOutcome::LaunchError(_)));
        assert_eq!(outcome.exit_code(), exit_code::CAN_NOT_FIND_FILE);
    }

    #[test]
    fn child_error_code_is_propagated() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.report_exceptions = false;
        make_deployment(dir.path(), "app_1.0.0", config.interpreter_subpath());
        let mut sup = supervisor(config, &[], ScriptedRunner::exiting_with(&[5]));
        assert_eq!(sup.run().exit_code(), 5);
        let cmd = &sup.runner().commands[0];
        assert_eq!(cmd.envs.get(REPORT_EXCEPTIONS_ENV).map(String::as_str), Some("0"));
    }

    #[test]
    fn killed_child_maps_to_error() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        make_deployment(dir.path(), "app_1.0.0", config.interpreter_subpath());
        let runner = ScriptedRunner {
            results: VecDeque::from([Ok(ChildOutput::default())]),
            commands: Vec::new(),
        };
        assert_eq!(supervisor(config, &[], runner).run().exit_code(), exit_code::ERROR);
    }

    #[test]
    fn silent_gui_failure_is_rerun_with_console_interpreter() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.is_gui = true;
        config.layout.console = Path::new("bin").join("python");
        config.layout.gui = Path::new("bin").join("pythonw");
        make_deployment(dir.path(), "app_1.0.0", &config.layout.gui);
        make_deployment(dir.path(), "app_1.0.0", &config.layout.console);

        let runner = ScriptedRunner {
            results: VecDeque::from([
                Ok(ChildOutput {
                    code: Some(1),
                    ..Default::default()
                }),
                Ok(ChildOutput {
                    code: Some(7),
                    stdout: String::new(),
                    stderr: "Traceback".to_string(),
                }),
            ]),
            commands: Vec::new(),
        };
        let mut sup = supervisor(config, &["--x"], runner);
        assert_eq!(sup.run(), LaunchOutcome::Exited(1));
        assert_eq!(sup.launches(), 1);

        let commands = &sup.runner().commands;
        assert_eq!(commands.len(), 2);
        assert!(commands[0].program.ends_with("pythonw"));
        assert!(commands[1].program.ends_with("python"));
        let diag_args: Vec<&str> = commands[1].args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(diag_args, vec!["-X", "faulthandler", "-m", "app", "--x"]);
    }

    #[test]
    fn gui_failure_with_stderr_is_not_rerun() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.is_gui = true;
        config.layout.console = Path::new("bin").join("python");
        config.layout.gui = Path::new("bin").join("pythonw");
        make_deployment(dir.path(), "app_1.0.0", &config.layout.gui);
        make_deployment(dir.path(), "app_1.0.0", &config.layout.console);
        let runner = ScriptedRunner {
            results: VecDeque::from([Ok(ChildOutput {
                code: Some(1),
                stdout: "partial".to_string(),
                stderr: "boom".to_string(),
            })]),
            commands: Vec::new(),
        };
        let mut sup = supervisor(config, &[], runner);
        assert_eq!(sup.run().exit_code(), 1);
        assert_eq!(sup.runner().commands.len(), 1);
    }
}
