// relaunch-aio/src/pack.rs
// Zips a deployment directory so it can be shipped as an update archive.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path};

use relaunch_common::error::{RelaunchError, Result};
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Writes the contents of `source_dir` to `dest_zip`; entries are relative to `source_dir`.
///
/// The zip is assembled in a temporary file and moved into place when complete.
pub fn pack_directory(source_dir: &Path, dest_zip: &Path) -> Result<u64> {
    if !source_dir.is_dir() {
        return Err(RelaunchError::NotFound(format!(
            "{} is not a directory",
            source_dir.display()
        )));
    }
    let out_dir = dest_zip
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(out_dir)?;

    let temp_file = NamedTempFile::new_in(out_dir)?;
    let mut zip = ZipWriter::new(temp_file.as_file());
    let base_options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut count = 0u64;

    for entry in WalkDir::new(source_dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            RelaunchError::Generic(format!("Failed walking {}: {}", source_dir.display(), e))
        })?;
        let rel = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|e| RelaunchError::Generic(e.to_string()))?;
        let Some(name) = zip_entry_name(rel) else {
            continue;
        };
        let options = with_mode(base_options, &entry);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            zip.add_directory(format!("{name}/"), options).map_err(zip_err)?;
        } else if file_type.is_symlink() {
            let target = fs::read_link(entry.path())?;
            zip.add_symlink(name, target.to_string_lossy().into_owned(), options)
                .map_err(zip_err)?;
        } else {
            zip.start_file(name, options).map_err(zip_err)?;
            let mut file = File::open(entry.path())?;
            io::copy(&mut file, &mut zip)?;
        }
        count += 1;
    }
    zip.finish().map_err(zip_err)?;

    temp_file
        .persist(dest_zip)
        .map_err(|e| RelaunchError::Io(std::sync::Arc::new(e.error)))?;
    debug!(
        "Packed {} entries from {} into {}",
        count,
        source_dir.display(),
        dest_zip.display()
    );
    Ok(count)
}

fn zip_entry_name(rel: &Path) -> Option<String> {
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(p) => Some(p.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(unix)]
fn with_mode(options: SimpleFileOptions, entry: &walkdir::DirEntry) -> SimpleFileOptions {
    use std::os::unix::fs::PermissionsExt;
    match entry.metadata() {
        Ok(meta) => options.unix_permissions(meta.permissions().mode()),
        Err(_) => options,
    }
}

#[cfg(not(unix))]
fn with_mode(options: SimpleFileOptions, _entry: &walkdir::DirEntry) -> SimpleFileOptions {
    options
}

fn zip_err(e: zip::result::ZipError) -> RelaunchError {
    RelaunchError::Generic(format!("ZIP write failed: {e}"))
}
