// relaunch-common/src/lib.rs
pub mod config;
pub mod error;
pub mod exit_code;
pub mod metadata;
pub mod update_source;
pub mod version;

// Re-export key types
pub use config::{InterpreterLayout, LauncherConfig, RemovalRetry, RestartPolicy};
pub use error::{RelaunchError, Result};
pub use metadata::Metadata;
pub use semver::Version;
pub use update_source::{RemotePointer, UpdateSource};
