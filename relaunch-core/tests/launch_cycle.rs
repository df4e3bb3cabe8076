// Runs the supervisor against real child processes; shell scripts stand in for
// the interpreter.
#![cfg(unix)]

use std::ffi::OsString;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use relaunch_aio::pack_directory;
use relaunch_common::config::{LauncherConfig, RemovalRetry, RestartPolicy};
use relaunch_common::exit_code;
use relaunch_core::update::{archive_file_name, publish_archive, LocalUpdateSource};
use relaunch_core::{LaunchOutcome, Supervisor};
use semver::Version;
use tempfile::TempDir;

fn interpreter_subpath() -> PathBuf {
    Path::new("bin").join("python")
}

/// Creates `<root>/<name>/bin/python` running `body`.
fn write_interpreter(root: &Path, name: &str, body: &str) -> PathBuf {
    let interp = root.join(name).join(interpreter_subpath());
    fs::create_dir_all(interp.parent().unwrap()).unwrap();
    fs::write(&interp, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&interp, fs::Permissions::from_mode(0o755)).unwrap();
    interp
}

fn test_config(app_dir: &Path) -> LauncherConfig {
    let mut config = LauncherConfig::new("app", app_dir);
    config.layout.console = interpreter_subpath();
    config.layout.gui = interpreter_subpath();
    config.restart = RestartPolicy {
        max_samples: 4,
        quick_window: Duration::from_secs(60),
    };
    config.removal_retry = RemovalRetry {
        attempts: 2,
        base_delay: Duration::from_millis(10),
    };
    config
}

fn supervisor(config: LauncherConfig, args: &[&str]) -> Supervisor {
    Supervisor::new(config, args.iter().map(OsString::from).collect()).echo_output(false)
}

#[test]
fn restart_once_then_exit_ok() {
    let app_dir = TempDir::new().unwrap();
    write_interpreter(app_dir.path(), "app_0.0.1", "exit 3");
    // cwd is the interpreter's directory, so the marker lands next to it
    write_interpreter(
        app_dir.path(),
        "app_0.0.2",
        r#"printf '%s\n' "$@" > args.txt
if [ -f restarted ]; then exit 0; fi
touch restarted
exit 13"#,
    );

    let mut sup = supervisor(
        test_config(app_dir.path()),
        &["--foo", "bar baz"],
    );
    let outcome = sup.run();
    assert_eq!(outcome, LaunchOutcome::Exited(exit_code::OK));
    assert_eq!(sup.launches(), 2);

    let bin = app_dir.path().join("app_0.0.2").join("bin");
    assert!(bin.join("restarted").is_file());
    let args = fs::read_to_string(bin.join("args.txt")).unwrap();
    assert_eq!(args, "-m\napp\n--foo\nbar baz\n");
}

#[test]
fn unchanged_state_runs_exactly_once() {
    let app_dir = TempDir::new().unwrap();
    write_interpreter(app_dir.path(), "app_1.0.0", "echo hello; exit 0");
    for _ in 0..2 {
        let mut sup = supervisor(test_config(app_dir.path()), &[]);
        assert_eq!(sup.run().exit_code(), exit_code::OK);
        assert_eq!(sup.launches(), 1);
    }
}

#[test]
fn restart_storm_is_stopped() {
    let app_dir = TempDir::new().unwrap();
    write_interpreter(app_dir.path(), "app_1.0.0", "echo again >&2; exit 13");
    let mut sup = supervisor(test_config(app_dir.path()), &[]);
    assert_eq!(sup.run(), LaunchOutcome::ExcessiveRestarts);
    assert_eq!(sup.launches(), 4);
    assert_eq!(sup.governor().len(), 4);
}

#[test]
fn child_error_code_is_returned() {
    let app_dir = TempDir::new().unwrap();
    write_interpreter(app_dir.path(), "app_1.0.0", "echo broken >&2; exit 4");
    let mut sup = supervisor(test_config(app_dir.path()), &[]);
    assert_eq!(sup.run().exit_code(), 4);
}

#[test]
fn interpreter_that_cannot_start_is_a_launch_error() {
    let app_dir = TempDir::new().unwrap();
    let interp = write_interpreter(app_dir.path(), "app_1.0.0", "exit 0");
    // present but not executable
    fs::set_permissions(&interp, fs::Permissions::from_mode(0o644)).unwrap();
    let mut sup = supervisor(test_config(app_dir.path()), &[]);
    let outcome = sup.run();
    assert!(matches!(outcome, LaunchOutcome::LaunchError(_)));
    assert_eq!(outcome.exit_code(), exit_code::CAN_NOT_FIND_FILE);
}

#[test]
fn empty_app_dir_has_no_deployment() {
    let app_dir = TempDir::new().unwrap();
    fs::create_dir_all(app_dir.path().join("app_x.y.z").join("bin")).unwrap();
    let mut sup = supervisor(test_config(app_dir.path()), &[]);
    assert_eq!(sup.run(), LaunchOutcome::NoDeploymentFound);
    assert_eq!(sup.launches(), 0);
}

#[test]
fn restart_picks_up_applied_update() {
    let tmp = TempDir::new().unwrap();
    let app_dir = tmp.path().join("app");
    let user_dir = tmp.path().join("user");
    write_interpreter(&app_dir, "app_0.0.1", "exit 13");

    // build and publish 0.0.2 to a local update source
    let build = tmp.path().join("build");
    write_interpreter(&build, "app_0.0.2", "exit 0");
    let version = Version::new(0, 0, 2);
    let archive = tmp.path().join(archive_file_name("app", &version));
    pack_directory(&build.join("app_0.0.2"), &archive).unwrap();
    let source = LocalUpdateSource::new(tmp.path().join("remote"));
    assert_eq!(publish_archive(&source, "app", &archive).unwrap(), version);

    let mut config = test_config(&app_dir);
    config.user_data_dir = Some(user_dir.clone());
    config.auto_update = true;
    let mut sup = supervisor(config, &[]).with_update_source(Box::new(source));

    assert_eq!(sup.run(), LaunchOutcome::Exited(exit_code::OK));
    assert_eq!(sup.launches(), 2);
    assert!(user_dir
        .join("app_0.0.2")
        .join(interpreter_subpath())
        .is_file());
}

#[test]
fn extra_search_path_is_the_last_resort() {
    let tmp = TempDir::new().unwrap();
    let app_dir = tmp.path().join("app");
    fs::create_dir_all(&app_dir).unwrap();
    let extra = tmp.path().join("extra");
    write_interpreter(&extra, "app_2.0.0", "exit 0");

    let mut config = test_config(&app_dir);
    config.user_data_dir = Some(tmp.path().join("missing-user-dir"));
    config.extra_search_path = Some(extra.clone());
    let mut sup = supervisor(config, &[]);
    assert_eq!(sup.run(), LaunchOutcome::Exited(exit_code::OK));
    assert_eq!(sup.launches(), 1);

    // newer in the extra root wins, equal versions resolve to the app dir
    write_interpreter(&app_dir, "app_1.0.0", "exit 5");
    let mut config = test_config(&app_dir);
    config.extra_search_path = Some(extra.clone());
    assert_eq!(supervisor(config, &[]).run(), LaunchOutcome::Exited(exit_code::OK));

    write_interpreter(&app_dir, "app_2.0.0", "exit 6");
    let mut config = test_config(&app_dir);
    config.extra_search_path = Some(extra);
    assert_eq!(supervisor(config, &[]).run(), LaunchOutcome::Exited(6));
}

#[cfg(target_os = "linux")]
#[test]
fn child_shares_the_launcher_stdin() {
    let app_dir = TempDir::new().unwrap();
    write_interpreter(
        app_dir.path(),
        "app_1.0.0",
        "readlink /proc/self/fd/0 > stdin.txt",
    );
    let mut sup = supervisor(test_config(app_dir.path()), &[]);
    assert_eq!(sup.run().exit_code(), exit_code::OK);

    let Ok(ours) = fs::read_link("/proc/self/fd/0") else {
        // test runner started without a stdin
        return;
    };
    let theirs = fs::read_to_string(
        app_dir.path().join("app_1.0.0").join("bin").join("stdin.txt"),
    )
    .unwrap();
    assert_eq!(theirs.trim_end(), ours.to_string_lossy());
}

