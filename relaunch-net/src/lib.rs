// relaunch-net/src/lib.rs
pub mod http;
pub mod validation;

pub use http::{build_http_client, HttpUpdateSource};
pub use validation::{resource_url, validate_url};
