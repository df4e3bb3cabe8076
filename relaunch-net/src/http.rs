// relaunch-net/src/http.rs
use std::fs::{self, File};
use std::path::Path;
use std::time::Duration;

use relaunch_common::error::{RelaunchError, Result};
use relaunch_common::update_source::{archive_file_name, RemotePointer, UpdateSource};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use semver::Version;
use tracing::{debug, error};
use url::Url;

use crate::validation::{resource_url, validate_url};

const DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = concat!("relaunch/", env!("CARGO_PKG_VERSION"));

pub fn build_http_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| RelaunchError::HttpError(format!("Failed to build HTTP client: {e}")))
}

/// Update source served over HTTPS.
///
/// Reads with `GET <base>/<file>`; uploads and pointer updates use `PUT` to the
/// same locations.
#[derive(Debug, Clone)]
pub struct HttpUpdateSource {
    base: Url,
    client: Client,
}

impl HttpUpdateSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = validate_url(base_url)?;
        Ok(Self {
            base,
            client: build_http_client()?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn get(&self, name: &str, url: &Url) -> Result<Response> {
        debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().map_err(|e| {
            debug!("HTTP request failed for {url}: {e}");
            RelaunchError::HttpError(format!("HTTP request failed for {url}: {e}"))
        })?;
        check_status(name, url, response)
    }
}

fn check_status(name: &str, url: &Url, response: Response) -> Result<Response> {
    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, url);
    if status.is_success() {
        return Ok(response);
    }
    let body_text = response
        .text()
        .unwrap_or_else(|_| "Failed to read response body".to_string());
    error!("HTTP error {} for URL {}: {}", status, url, body_text);
    Err(match status {
        StatusCode::NOT_FOUND => RelaunchError::DownloadError(
            name.to_string(),
            url.to_string(),
            "Resource not found (404)".to_string(),
        ),
        StatusCode::FORBIDDEN => RelaunchError::DownloadError(
            name.to_string(),
            url.to_string(),
            "Access forbidden (403)".to_string(),
        ),
        _ => RelaunchError::HttpError(format!("HTTP error {status} for URL {url}: {body_text}")),
    })
}

impl UpdateSource for HttpUpdateSource {
    fn location(&self) -> String {
        self.base.to_string()
    }

    fn fetch_pointer(&self, app_name: &str) -> Result<RemotePointer> {
        let url = resource_url(&self.base, &RemotePointer::file_name(app_name))?;
        let body = self.get(app_name, &url)?.text()?;
        Ok(serde_json::from_str(&body)?)
    }

    fn download_archive(&self, app_name: &str, version: &Version, dest: &Path) -> Result<()> {
        let url = resource_url(&self.base, &archive_file_name(app_name, version))?;
        let mut response = self.get(app_name, &url)?;

        let temp_path = dest.with_file_name(format!(
            ".{}.download",
            dest.file_name().unwrap_or_default().to_string_lossy()
        ));
        let mut temp_file = File::create(&temp_path)?;
        let written = response.copy_to(&mut temp_file).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            RelaunchError::DownloadError(app_name.to_string(), url.to_string(), e.to_string())
        })?;
        drop(temp_file);
        debug!("Downloaded {} bytes from {}", written, url);

        fs::rename(&temp_path, dest).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            RelaunchError::from(e)
        })
    }

    fn upload_archive(&self, archive: &Path) -> Result<String> {
        let file_name = archive
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                RelaunchError::ValidationError(format!("{} has no file name", archive.display()))
            })?;
        let url = resource_url(&self.base, file_name)?;
        debug!("PUT {} -> {}", archive.display(), url);
        let response = self
            .client
            .put(url.clone())
            .body(File::open(archive)?)
            .send()?;
        check_status(file_name, &url, response)?;
        Ok(url.to_string())
    }

    fn publish_latest(&self, app_name: &str, version: &Version, sha256: Option<&str>) -> Result<()> {
        let pointer = RemotePointer::new(app_name, version.clone(), sha256.map(str::to_string));
        let url = resource_url(&self.base, &RemotePointer::file_name(app_name))?;
        debug!("PUT {} = {}", url, version);
        let response = self.client.put(url.clone()).json(&pointer).send()?;
        check_status(app_name, &url, response)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_plain_http() {
        assert!(matches!(
            HttpUpdateSource::new("http://updates.example.com/app"),
            Err(RelaunchError::ValidationError(_))
        ));
    }

    #[test]
    fn location_is_the_base_url() {
        let source = HttpUpdateSource::new("https://updates.example.com/app/").unwrap();
        assert_eq!(source.location(), "https://updates.example.com/app/");
        assert_eq!(source.base_url().scheme(), "https");
    }
}
