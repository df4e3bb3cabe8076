//! Process exit codes shared between the launcher and the application it runs.

/// Normal exit.
pub const OK: i32 = 0;

/// Generic error.
pub const ERROR: i32 = 1;

/// The interpreter (or another required file) could not be found or started.
pub const CAN_NOT_FIND_FILE: i32 = 2;

/// The application installed an update and wants to be started again.
pub const RESTART: i32 = 13;
