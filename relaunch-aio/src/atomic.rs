// relaunch-aio/src/atomic.rs
//! Publishing an archive as a deployment directory in one step.
//!
//! The archive is unpacked into a hidden staging directory next to the
//! destination and renamed into place, so observers see either the previous
//! state or the complete new tree. Staging names start with `.` and can never be
//! mistaken for a `<app>_<version>` deployment.

use std::fs;
use std::path::{Path, PathBuf};

use relaunch_common::config::RemovalRetry;
use relaunch_common::error::{RelaunchError, Result};
use tracing::{debug, error, info, warn};

use crate::extract::{extract_archive, infer_archive_root_dir};
use crate::fs::{remove_dir_all_with_retry, with_retry};

/// Extracts `archive_path` to `destination_dir` atomically; `false` on any failure.
///
/// On failure `destination_dir` is left exactly as it was.
pub fn install_atomic(archive_path: &Path, destination_dir: &Path, retry: &RemovalRetry) -> bool {
    match try_install_atomic(archive_path, destination_dir, retry) {
        Ok(()) => {
            info!(
                "Installed {} to {}",
                archive_path.display(),
                destination_dir.display()
            );
            true
        }
        Err(e) => {
            error!(
                "Could not install {} to {}: {}",
                archive_path.display(),
                destination_dir.display(),
                e
            );
            false
        }
    }
}

pub fn try_install_atomic(
    archive_path: &Path,
    destination_dir: &Path,
    retry: &RemovalRetry,
) -> Result<()> {
    let (parent, dest_name) = split_destination(destination_dir)?;
    fs::create_dir_all(parent)?;

    let staging = tempfile::Builder::new()
        .prefix(&format!(".{dest_name}."))
        .suffix(".staging")
        .tempdir_in(parent)
        .map_err(|e| {
            RelaunchError::ExtractionFailed(format!(
                "Could not create staging directory in {}: {}",
                parent.display(),
                e
            ))
        })?;
    debug!("Staging {} in {}", archive_path.display(), staging.path().display());

    // Archives produced by `pack_directory` are flat, but a single top-level
    // directory named like the destination is accepted too.
    let strip_components = match infer_archive_root_dir(archive_path)? {
        Some(root) if root.as_os_str() == dest_name => 1,
        _ => 0,
    };
    // Dropping `staging` on error removes the partial tree.
    extract_archive(archive_path, staging.path(), strip_components)?;

    let displaced = if destination_dir.exists() {
        let aside = aside_path(parent, dest_name);
        debug!(
            "Moving existing {} aside to {}",
            destination_dir.display(),
            aside.display()
        );
        with_retry("rename", destination_dir, retry, |p| fs::rename(p, &aside))?;
        Some(aside)
    } else {
        None
    };

    if let Err(e) = fs::rename(staging.path(), destination_dir) {
        error!(
            "Failed to publish {} as {}: {}",
            staging.path().display(),
            destination_dir.display(),
            e
        );
        if let Some(aside) = &displaced {
            if let Err(restore_err) = fs::rename(aside, destination_dir) {
                error!(
                    "Could not restore {} from {}: {}",
                    destination_dir.display(),
                    aside.display(),
                    restore_err
                );
            }
        }
        return Err(RelaunchError::ExtractionFailed(format!(
            "Rename to {} failed: {e}",
            destination_dir.display()
        )));
    }
    // The staging guard now points at a path that no longer exists; its cleanup is a no-op.
    drop(staging);

    if let Some(aside) = displaced {
        if let Err(e) = remove_dir_all_with_retry(&aside, retry) {
            warn!(
                "Installed {} but could not remove old copy {}: {}",
                destination_dir.display(),
                aside.display(),
                e
            );
        }
    }
    Ok(())
}

fn split_destination(destination_dir: &Path) -> Result<(&Path, &str)> {
    let parent = destination_dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = destination_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            RelaunchError::ExtractionFailed(format!(
                "Destination {} has no usable directory name",
                destination_dir.display()
            ))
        })?;
    Ok((parent, name))
}

fn aside_path(parent: &Path, dest_name: &str) -> PathBuf {
    let mut n = 0u32;
    loop {
        let candidate = parent.join(format!(".{dest_name}.old{n}"));
        if candidate.symlink_metadata().is_err() {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Write;
    use std::time::Duration;

    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::*;

    fn retry() -> RemovalRetry {
        RemovalRetry {
            attempts: 2,
            base_delay: Duration::from_millis(1),
        }
    }

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    fn dir_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn installs_into_fresh_destination() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("app_1.0.0.zip");
        write_zip(&archive, &[("bin/python", "v1")]);
        let root = tmp.path().join("root");
        let dest = root.join("app_1.0.0");

        assert!(install_atomic(&archive, &dest, &retry()));
        assert_eq!(fs::read_to_string(dest.join("bin/python")).unwrap(), "v1");
        assert_eq!(dir_names(&root), vec!["app_1.0.0"]);
    }

    #[test]
    fn replaces_existing_destination() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("app_1.0.0.zip");
        write_zip(&archive, &[("bin/python", "new")]);
        let dest = tmp.path().join("root").join("app_1.0.0");
        fs::create_dir_all(dest.join("bin")).unwrap();
        fs::write(dest.join("bin/python"), "old").unwrap();
        fs::write(dest.join("stale.txt"), "stale").unwrap();

        assert!(install_atomic(&archive, &dest, &retry()));
        assert_eq!(fs::read_to_string(dest.join("bin/python")).unwrap(), "new");
        assert!(!dest.join("stale.txt").exists());
        assert_eq!(dir_names(dest.parent().unwrap()), vec!["app_1.0.0"]);
    }

    #[test]
    fn failed_extraction_leaves_destination_untouched() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("app_1.0.0.zip");
        write_zip(&archive, &[("bin/python", "new"), ("../escape", "x")]);
        let root = tmp.path().join("root");
        let dest = root.join("app_1.0.0");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("marker"), "old").unwrap();

        assert!(!install_atomic(&archive, &dest, &retry()));
        assert_eq!(dir_names(&dest), vec!["marker"]);
        assert_eq!(fs::read_to_string(dest.join("marker")).unwrap(), "old");
        // no staging directory left behind
        assert_eq!(dir_names(&root), vec!["app_1.0.0"]);
        assert!(!tmp.path().join("escape").exists());
    }

    #[test]
    fn failed_extraction_does_not_create_destination() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("app_1.0.0.zip");
        fs::write(&archive, b"PK\x03\x04 definitely not a zip").unwrap();
        let root = tmp.path().join("root");
        let dest = root.join("app_1.0.0");

        assert!(!install_atomic(&archive, &dest, &retry()));
        assert!(!dest.exists());
        assert!(dir_names(&root).is_empty());
    }

    #[test]
    fn strips_root_named_like_destination() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("app_2.0.0.zip");
        write_zip(&archive, &[("app_2.0.0/bin/python", "v2")]);
        let dest = tmp.path().join("app_2.0.0");
        assert!(install_atomic(&archive, &dest, &retry()));
        assert!(dest.join("bin/python").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_entries_cannot_write_beside_deployments() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("app_1.0.0.zip");
        {
            let mut zip = ZipWriter::new(File::create(&archive).unwrap());
            let options = SimpleFileOptions::default();
            zip.add_symlink("a", ".", options).unwrap();
            zip.add_symlink("a/up", "..", options).unwrap();
            zip.start_file("up/pwned.txt", options).unwrap();
            zip.write_all(b"x").unwrap();
            zip.finish().unwrap();
        }
        let root = tmp.path().join("root");
        let dest = root.join("app_1.0.0");

        assert!(!install_atomic(&archive, &dest, &retry()));
        assert!(!root.join("pwned.txt").exists());
        assert!(!dest.exists());
        assert!(dir_names(&root).is_empty());
    }
}
