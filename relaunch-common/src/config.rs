// relaunch-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, warn};

use super::error::{RelaunchError, Result};
use super::metadata::Metadata;

const DEFAULT_MAX_SAMPLES: usize = 4;
const DEFAULT_QUICK_WINDOW_SECS: f64 = 60.0;
const DEFAULT_REMOVAL_ATTEMPTS: u32 = 4;
const DEFAULT_REMOVAL_BASE_DELAY: Duration = Duration::from_secs(1);

/// Tuning of the restart circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestartPolicy {
    pub max_samples: usize,
    pub quick_window: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_samples: DEFAULT_MAX_SAMPLES,
            quick_window: Duration::from_secs_f64(DEFAULT_QUICK_WINDOW_SECS),
        }
    }
}

/// Bounded retry with doubling delay, used when removing directories that the
/// host OS may briefly hold locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovalRetry {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RemovalRetry {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_REMOVAL_ATTEMPTS,
            base_delay: DEFAULT_REMOVAL_BASE_DELAY,
        }
    }
}

impl RemovalRetry {
    /// Delay to wait after the given failed attempt (0-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(2u32.saturating_pow(attempt))
            .unwrap_or(Duration::MAX)
    }
}

/// Where the interpreter lives inside a deployment directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterLayout {
    pub console: PathBuf,
    pub gui: PathBuf,
}

impl InterpreterLayout {
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            Self {
                console: Path::new("Scripts").join("python.exe"),
                gui: Path::new("Scripts").join("pythonw.exe"),
            }
        } else {
            let python = Path::new("bin").join("python");
            Self {
                console: python.clone(),
                gui: python,
            }
        }
    }

    pub fn relative_path(&self, is_gui: bool) -> &Path {
        if is_gui {
            &self.gui
        } else {
            &self.console
        }
    }
}

impl Default for InterpreterLayout {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Where new application versions come from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UpdateSourceSpec {
    #[default]
    None,
    Http(String),
    Local(PathBuf),
}

#[derive(Debug, Clone)]
pub struct LauncherConfig {
    pub app_name: String,
    /// Directory next to the launcher binary, always searched first.
    pub app_dir: PathBuf,
    pub user_data_dir: Option<PathBuf>,
    /// Lowest-priority search root (`RELAUNCH_EXTRA_SEARCH_PATH`), mainly for testing.
    pub extra_search_path: Option<PathBuf>,
    pub is_gui: bool,
    pub report_exceptions: bool,
    pub layout: InterpreterLayout,
    pub restart: RestartPolicy,
    pub removal_retry: RemovalRetry,
    pub update_source: UpdateSourceSpec,
    pub auto_update: bool,
}

impl LauncherConfig {
    /// Plain configuration without consulting the environment.
    pub fn new(app_name: &str, app_dir: &Path) -> Self {
        Self {
            app_name: app_name.to_string(),
            app_dir: app_dir.to_path_buf(),
            user_data_dir: None,
            extra_search_path: None,
            is_gui: false,
            report_exceptions: true,
            layout: InterpreterLayout::platform_default(),
            restart: RestartPolicy::default(),
            removal_retry: RemovalRetry::default(),
            update_source: UpdateSourceSpec::None,
            auto_update: false,
        }
    }

    pub fn load(app_name: &str, app_dir: &Path, metadata: &Metadata) -> Result<Self> {
        debug!("Loading launcher configuration for {}", app_name);
        let mut config = Self::new(app_name, app_dir);
        config.is_gui = metadata.is_gui;
        config.report_exceptions = metadata.report_exceptions;

        config.user_data_dir = env::var("RELAUNCH_USER_DATA_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .or_else(|| default_user_data_dir(&metadata.author, app_name));
        debug!("User data dir: {:?}", config.user_data_dir);
        config.extra_search_path = env::var("RELAUNCH_EXTRA_SEARCH_PATH")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        config.update_source = match (
            env::var("RELAUNCH_UPDATE_URL").ok().filter(|s| !s.is_empty()),
            env::var("RELAUNCH_UPDATE_DIR").ok().filter(|s| !s.is_empty()),
        ) {
            (Some(_), Some(_)) => {
                return Err(RelaunchError::Config(
                    "RELAUNCH_UPDATE_URL and RELAUNCH_UPDATE_DIR are mutually exclusive"
                        .to_string(),
                ))
            }
            (Some(url), None) => UpdateSourceSpec::Http(url),
            (None, Some(dir)) => UpdateSourceSpec::Local(PathBuf::from(dir)),
            (None, None) => UpdateSourceSpec::None,
        };
        config.auto_update = config.update_source != UpdateSourceSpec::None
            && !env::var("RELAUNCH_NO_AUTO_UPDATE").is_ok_and(|v| v == "1");

        if let Some(max_samples) = env_parse::<usize>("RELAUNCH_RESTART_MAX_SAMPLES") {
            if max_samples < 2 {
                return Err(RelaunchError::Config(format!(
                    "RELAUNCH_RESTART_MAX_SAMPLES must be at least 2, got {max_samples}"
                )));
            }
            config.restart.max_samples = max_samples;
        }
        if let Some(secs) = env_parse::<f64>("RELAUNCH_RESTART_QUICK_SECS") {
            config.restart.quick_window = Duration::try_from_secs_f64(secs).map_err(|e| {
                RelaunchError::Config(format!("Invalid RELAUNCH_RESTART_QUICK_SECS {secs}: {e}"))
            })?;
        }

        debug!("Configuration loaded successfully.");
        Ok(config)
    }

    /// Search roots in priority order: app dir, user data dir (when present), extra path.
    pub fn search_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.app_dir.clone()];
        if let Some(user_data_dir) = &self.user_data_dir {
            if user_data_dir.is_dir() {
                roots.push(user_data_dir.clone());
            }
        }
        if let Some(extra) = &self.extra_search_path {
            roots.push(extra.clone());
        }
        roots
    }

    /// Directory new deployments are published into.
    pub fn install_root(&self) -> PathBuf {
        self.user_data_dir
            .clone()
            .unwrap_or_else(|| self.app_dir.clone())
    }

    pub fn log_dir(&self) -> PathBuf {
        self.install_root().join("log")
    }

    pub fn interpreter_subpath(&self) -> &Path {
        self.layout.relative_path(self.is_gui)
    }
}

/// `<local data dir>/<author>/<app>`, e.g. `%LOCALAPPDATA%\author\app` on Windows.
pub fn default_user_data_dir(author: &str, app_name: &str) -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join(author).join(app_name))
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparseable {}={}", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_delay_doubles() {
        let retry = RemovalRetry::default();
        assert_eq!(retry.delay_after(0), Duration::from_secs(1));
        assert_eq!(retry.delay_after(1), Duration::from_secs(2));
        assert_eq!(retry.delay_after(2), Duration::from_secs(4));
    }

    #[test]
    fn search_roots_follow_priority() {
        let app_dir = tempfile::TempDir::new().unwrap();
        let user_dir = tempfile::TempDir::new().unwrap();
        let mut config = LauncherConfig::new("demo", app_dir.path());
        config.user_data_dir = Some(user_dir.path().to_path_buf());
        config.extra_search_path = Some(PathBuf::from("/extra"));
        assert_eq!(
            config.search_roots(),
            vec![
                app_dir.path().to_path_buf(),
                user_dir.path().to_path_buf(),
                PathBuf::from("/extra")
            ]
        );
        assert_eq!(config.install_root(), user_dir.path());
    }

    #[test]
    fn missing_user_data_dir_is_not_searched() {
        let app_dir = tempfile::TempDir::new().unwrap();
        let mut config = LauncherConfig::new("demo", app_dir.path());
        config.user_data_dir = Some(app_dir.path().join("does-not-exist"));
        assert_eq!(config.search_roots(), vec![app_dir.path().to_path_buf()]);
    }
}
