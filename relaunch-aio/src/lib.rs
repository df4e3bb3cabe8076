// relaunch-aio/src/lib.rs
//! Blocking IO primitives for relaunch (filesystem, archives, checksums, json, processes)

pub mod atomic;
pub mod checksum;
pub mod extract;
pub mod fs;
pub mod json_io;
pub mod pack;
pub mod process;

pub use atomic::{install_atomic, try_install_atomic};
pub use checksum::{sha256_file, verify_checksum};
pub use extract::extract_archive;
pub use json_io::{read_json, write_json};
pub use pack::pack_directory;
pub use process::run_command_sync;
