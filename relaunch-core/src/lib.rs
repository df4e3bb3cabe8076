// relaunch-core/src/lib.rs

pub mod governor;
pub mod index;
pub mod launch_args;
pub mod prune;
pub mod supervisor;
pub mod update;

// Re-export key types for the binaries
pub use governor::RestartGovernor;
pub use index::{Deployment, DeploymentSet};
pub use launch_args::LaunchArgs;
pub use prune::{prune_superseded, PruneReport};
pub use supervisor::{ChildCommand, ChildOutput, ChildRunner, LaunchOutcome, Supervisor, SystemRunner};
pub use update::{apply_update, publish_archive, LocalUpdateSource, UpdateSource};
