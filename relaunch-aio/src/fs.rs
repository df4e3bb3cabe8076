/*
File: relaunch-aio/src/fs.rs
Purpose: Primitive synchronous filesystem operations.
*/
use std::{
    fs, io,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
};

use relaunch_common::config::RemovalRetry;
use relaunch_common::error::{RelaunchError, Result};
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

/// Creates a directory and all its parent components if they are missing.
pub fn create_dir_all(path: &Path) -> Result<()> {
    debug!("Creating directory recursively: {}", path.display());
    fs::create_dir_all(path).map_err(|e| {
        error!("Failed create dir {}: {}", path.display(), e);
        RelaunchError::from(e)
    })
}

/// Runs `op` until it succeeds, the target is gone, or the retry budget is spent.
///
/// A `NotFound` error counts as success. Between attempts the delay doubles,
/// starting at `retry.base_delay`.
pub fn with_retry<F>(what: &str, path: &Path, retry: &RemovalRetry, mut op: F) -> Result<()>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let attempts = retry.attempts.max(1);
    let mut attempt = 0;
    loop {
        match op(path) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{}: {} already gone", what, path.display());
                return Ok(());
            }
            Err(e) => {
                attempt += 1;
                if attempt >= attempts {
                    error!(
                        "{} failed for {} after {} attempt(s): {}",
                        what,
                        path.display(),
                        attempt,
                        e
                    );
                    return Err(RelaunchError::Io(Arc::new(e)));
                }
                let delay = retry.delay_after(attempt - 1);
                warn!(
                    "{} failed for {} (attempt {}/{}): {}. Retrying in {:?}",
                    what,
                    path.display(),
                    attempt,
                    attempts,
                    e,
                    delay
                );
                thread::sleep(delay);
            }
        }
    }
}

/// Removes a directory tree, retrying transient failures (e.g. file locks on Windows).
pub fn remove_dir_all_with_retry(path: &Path, retry: &RemovalRetry) -> Result<()> {
    debug!("Removing directory recursively: {}", path.display());
    with_retry("remove_dir_all", path, retry, |p| fs::remove_dir_all(p))
}

/// Atomically writes data to a file using a temporary file in the same directory.
pub fn atomic_write_file(original_path: &Path, content: &[u8]) -> Result<()> {
    let dir = original_path.parent().ok_or_else(|| {
        RelaunchError::Generic(format!(
            "Cannot get parent directory for {}",
            original_path.display()
        ))
    })?;

    create_dir_all(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir)?;
    let temp_path = temp_file.path().to_path_buf();

    debug!(
        "Atomically writing {} bytes to {} via temp file {}",
        content.len(),
        original_path.display(),
        temp_path.display()
    );

    temp_file.write_all(content)?;
    temp_file.flush()?;
    temp_file.as_file().sync_all()?;

    temp_file.persist(original_path).map_err(|e| {
        error!(
            "Failed to persist/rename temporary file {} over {}: {}",
            temp_path.display(),
            original_path.display(),
            e.error
        );
        RelaunchError::Io(Arc::new(e.error))
    })?;

    Ok(())
}

/// Lists the immediate subdirectories of `dir_path` as `(name, path)` pairs.
///
/// Entries whose name is not valid UTF-8 or whose type cannot be read are skipped.
pub fn list_subdirectories(dir_path: &Path) -> Result<Vec<(String, PathBuf)>> {
    debug!("Listing subdirectories of: {}", dir_path.display());
    let read_dir = fs::read_dir(dir_path).map_err(|e| {
        debug!("Failed to read directory {}: {}", dir_path.display(), e);
        RelaunchError::from(e)
    })?;

    let mut entries = Vec::new();
    for entry_res in read_dir {
        let entry = match entry_res {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error reading entry in {}: {}", dir_path.display(), e);
                continue;
            }
        };
        let path = entry.path();
        // Follows symlinks, a linked deployment directory counts as a directory.
        if !path.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => entries.push((name, path)),
            Err(raw) => debug!("Skipping non UTF-8 directory name {:?}", raw),
        }
    }
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;

    fn fast_retry(attempts: u32) -> RemovalRetry {
        RemovalRetry {
            attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn retry_stops_after_success() {
        let calls = Cell::new(0);
        let result = with_retry("op", Path::new("x"), &fast_retry(4), |_| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
            } else {
                Ok(())
            }
        });
        assert!(result.is_ok());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn retry_gives_up_after_bound() {
        let calls = Cell::new(0);
        let result = with_retry("op", Path::new("x"), &fast_retry(4), |_| {
            calls.set(calls.get() + 1);
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn removing_missing_directory_is_ok() {
        let dir = TempDir::new().unwrap();
        assert!(remove_dir_all_with_retry(&dir.path().join("nope"), &fast_retry(2)).is_ok());
    }

    #[test]
    fn atomic_write_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("file.json");
        atomic_write_file(&path, b"one").unwrap();
        atomic_write_file(&path, b"two").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"two");
    }

    #[test]
    fn lists_only_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("file"), b"").unwrap();
        let names: Vec<String> = list_subdirectories(dir.path())
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
