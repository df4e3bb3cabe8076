// relaunch/src/cli.rs
//! Command-line surface of `relaunch-tool`.
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};
use relaunch_common::config::{LauncherConfig, UpdateSourceSpec};
use relaunch_common::error::{RelaunchError, Result};
use relaunch_core::update::{source_from_spec, UpdateSource};

pub mod install;
pub mod list;
pub mod pack;
pub mod prune;
pub mod publish;
pub mod update;

use crate::cli::install::InstallArgs;
use crate::cli::list::List;
use crate::cli::pack::Pack;
use crate::cli::prune::Prune;
use crate::cli::publish::Publish;
use crate::cli::update::Update;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "relaunch-tool", bin_name = "relaunch-tool")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Application name (defaults to the metadata sidecar or the deployments found)
    #[arg(long, global = true)]
    pub app: Option<String>,

    /// Directory the launcher is installed in (defaults to the current directory)
    #[arg(long, global = true)]
    pub app_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    List(List),
    Install(InstallArgs),
    Pack(Pack),
    Publish(Publish),
    Update(Update),
    Prune(Prune),
}

impl Command {
    pub fn run(&self, ctx: &ToolContext) -> Result<()> {
        match self {
            Self::List(command) => command.run(ctx),
            Self::Install(command) => command.run(ctx),
            Self::Pack(command) => command.run(ctx),
            Self::Publish(command) => command.run(ctx),
            Self::Update(command) => command.run(ctx),
            Self::Prune(command) => command.run(ctx),
        }
    }
}

/// Update source selection shared by the commands that talk to one.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// HTTPS base URL of the update source
    #[arg(long, conflicts_with = "source_dir")]
    pub source_url: Option<String>,

    /// Directory used as the update source
    #[arg(long)]
    pub source_dir: Option<PathBuf>,
}

impl SourceArgs {
    fn spec(&self) -> Option<UpdateSourceSpec> {
        match (&self.source_url, &self.source_dir) {
            (Some(url), _) => Some(UpdateSourceSpec::Http(url.clone())),
            (None, Some(dir)) => Some(UpdateSourceSpec::Local(dir.clone())),
            (None, None) => None,
        }
    }
}

/// Global options, resolved into a configuration only by the commands that need one.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub app: Option<String>,
    pub app_dir: PathBuf,
}

impl ToolContext {
    pub fn from_args(args: &CliArgs) -> Self {
        Self {
            app: args.app.clone(),
            app_dir: args.app_dir.clone().unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    pub fn config(&self) -> Result<LauncherConfig> {
        crate::load_launcher_config(&self.app_dir, self.app.as_deref())
    }

    /// The source named on the command line, else the configured one.
    pub fn update_source(
        &self,
        source_args: &SourceArgs,
        config: Option<&LauncherConfig>,
    ) -> Result<Box<dyn UpdateSource>> {
        let spec = match (source_args.spec(), config) {
            (Some(spec), _) => spec,
            (None, Some(config)) => config.update_source.clone(),
            (None, None) => UpdateSourceSpec::None,
        };
        source_from_spec(&spec)?.ok_or_else(|| {
            RelaunchError::Config(
                "No update source: pass --source-url/--source-dir or set RELAUNCH_UPDATE_URL/RELAUNCH_UPDATE_DIR"
                    .to_string(),
            )
        })
    }
}

/// File name of `path` as UTF-8, for parsing versioned names.
pub(crate) fn utf8_file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| RelaunchError::ValidationError(format!("{} has no usable file name", path.display())))
}
