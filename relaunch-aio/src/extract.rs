// relaunch-aio/src/extract.rs
// Archive extraction with path-traversal checks. Any unsafe entry fails the whole
// extraction; callers extract into a staging directory and discard it on error.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use relaunch_common::error::{RelaunchError, Result};
use tar::{Archive, EntryType};
use tracing::{debug, error};
use zip::read::ZipArchive;

/// Archive formats the installer can unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
    Tar,
}

impl ArchiveKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

fn extraction_error(msg: String) -> RelaunchError {
    error!("{}", msg);
    RelaunchError::ExtractionFailed(msg)
}

fn open_archive(archive_path: &Path) -> Result<(File, ArchiveKind)> {
    let kind = ArchiveKind::from_path(archive_path).ok_or_else(|| {
        extraction_error(format!(
            "Unsupported archive type for {}",
            archive_path.display()
        ))
    })?;
    let file = File::open(archive_path).map_err(|e| {
        extraction_error(format!(
            "Failed to open archive {}: {}",
            archive_path.display(),
            e
        ))
    })?;
    Ok((file, kind))
}

/// Name of the single top-level directory all entries live under, if there is one.
pub fn infer_archive_root_dir(archive_path: &Path) -> Result<Option<PathBuf>> {
    debug!(
        "Inferring root directory for archive: {}",
        archive_path.display()
    );
    let (file, kind) = open_archive(archive_path)?;
    let names: Vec<PathBuf> = match kind {
        ArchiveKind::Zip => {
            let mut archive = ZipArchive::new(file).map_err(|e| {
                extraction_error(format!("Failed to open ZIP {}: {}", archive_path.display(), e))
            })?;
            let mut names = Vec::with_capacity(archive.len());
            for i in 0..archive.len() {
                let entry = archive.by_index_raw(i).map_err(|e| {
                    extraction_error(format!(
                        "Error reading ZIP index {} in {}: {}",
                        i,
                        archive_path.display(),
                        e
                    ))
                })?;
                names.push(PathBuf::from(entry.name()));
            }
            names
        }
        ArchiveKind::TarGz => tar_entry_names(GzDecoder::new(file), archive_path)?,
        ArchiveKind::Tar => tar_entry_names(file, archive_path)?,
    };

    let mut roots = HashSet::new();
    let mut has_nested_entry = false;
    for name in &names {
        let mut components = name.components();
        match components.next() {
            Some(Component::Normal(first)) => {
                roots.insert(PathBuf::from(first));
                if components.next().is_some() {
                    has_nested_entry = true;
                }
            }
            Some(Component::CurDir) | None => continue,
            Some(_) => return Ok(None),
        }
        if roots.len() > 1 {
            return Ok(None);
        }
    }
    // A single plain file at the top is not a root directory.
    if roots.len() == 1 && (has_nested_entry || names.iter().any(|n| n.to_string_lossy().ends_with('/'))) {
        Ok(roots.into_iter().next())
    } else {
        Ok(None)
    }
}

fn tar_entry_names<R: Read>(reader: R, archive_path: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = Archive::new(reader);
    let mut names = Vec::new();
    let entries = archive.entries().map_err(|e| {
        extraction_error(format!("Failed to read TAR {}: {}", archive_path.display(), e))
    })?;
    for entry_result in entries {
        let entry = entry_result.map_err(|e| {
            extraction_error(format!(
                "Error reading TAR entry from {}: {}",
                archive_path.display(),
                e
            ))
        })?;
        let path = entry.path().map_err(|e| {
            extraction_error(format!(
                "Invalid path in TAR entry from {}: {}",
                archive_path.display(),
                e
            ))
        })?;
        names.push(path.into_owned());
    }
    Ok(names)
}

/// Maps an archive entry name to its location under `target_dir`.
///
/// Returns `Ok(None)` when the entry vanishes under `strip_components`, and an
/// error for any `..`, absolute, or prefixed component.
fn resolve_entry_path(
    entry_name: &Path,
    target_dir: &Path,
    strip_components: usize,
    archive_path_for_log: &Path,
) -> Result<Option<PathBuf>> {
    let stripped: Vec<Component<'_>> = entry_name.components().skip(strip_components).collect();
    if stripped.is_empty() {
        return Ok(None);
    }
    let mut resolved = target_dir.to_path_buf();
    for comp in stripped {
        match comp {
            Component::Normal(p) => resolved.push(p),
            Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) | Component::RootDir => {
                return Err(extraction_error(format!(
                    "Unsafe component {:?} in entry {} of {}",
                    comp,
                    entry_name.display(),
                    archive_path_for_log.display()
                )));
            }
        }
    }
    if !resolved.starts_with(target_dir) || resolved == target_dir {
        return Ok(None);
    }
    Ok(Some(resolved))
}

/// Canonical form of `path`, or `path` itself while it does not exist yet.
fn resolve_existing(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Checks that a relative symlink target stays inside `root`.
///
/// `root` is the canonical extraction directory. The link's own directory is
/// resolved on disk first, so links unpacked earlier in the same archive count.
fn ensure_link_within(link_path: &Path, link_target: &Path, root: &Path) -> Result<()> {
    if link_target.is_absolute() {
        return Err(extraction_error(format!(
            "Absolute symlink target {} for {}",
            link_target.display(),
            link_path.display()
        )));
    }
    let mut resolved = link_path
        .parent()
        .map(resolve_existing)
        .unwrap_or_else(|| root.to_path_buf());
    for comp in link_target.components() {
        match comp {
            Component::Normal(p) => resolved.push(p),
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() || !resolved.starts_with(root) {
                    break;
                }
            }
            Component::Prefix(_) | Component::RootDir => break,
        }
    }
    if resolved.starts_with(root) {
        Ok(())
    } else {
        Err(extraction_error(format!(
            "Symlink {} -> {} escapes {}",
            link_path.display(),
            link_target.display(),
            root.display()
        )))
    }
}

/// Fails when a directory that already exists on the way to `final_path`
/// resolves outside `root`, e.g. through a symlink unpacked earlier.
fn ensure_parent_within(
    final_path: &Path,
    target_dir: &Path,
    root: &Path,
    archive_path_for_log: &Path,
) -> Result<()> {
    let Some(parent) = final_path.parent() else {
        return Ok(());
    };
    let relative = parent.strip_prefix(target_dir).unwrap_or(Path::new(""));
    let mut current = target_dir.to_path_buf();
    for comp in relative.components() {
        current.push(comp);
        if current.symlink_metadata().is_err() {
            // the rest is created fresh below a checked directory
            break;
        }
        let real = fs::canonicalize(&current).map_err(|e| {
            extraction_error(format!(
                "Cannot resolve {} while extracting {}: {}",
                current.display(),
                archive_path_for_log.display(),
                e
            ))
        })?;
        if !real.starts_with(root) {
            return Err(extraction_error(format!(
                "Entry {} of {} resolves outside {} via {}",
                final_path.display(),
                archive_path_for_log.display(),
                root.display(),
                current.display()
            )));
        }
    }
    Ok(())
}

/// Removes a symlink sitting where an entry is about to be written, so the
/// write never goes through it.
fn clear_symlink(final_path: &Path) -> Result<()> {
    if final_path
        .symlink_metadata()
        .is_ok_and(|m| m.file_type().is_symlink())
    {
        fs::remove_file(final_path)?;
    }
    Ok(())
}

/// Canonical extraction root all entries are checked against.
fn canonical_root(target_dir: &Path) -> Result<PathBuf> {
    fs::canonicalize(target_dir).map_err(|e| {
        extraction_error(format!(
            "Failed to resolve target directory {}: {}",
            target_dir.display(),
            e
        ))
    })
}

/// Extracts `archive_path` into `target_dir`, dropping `strip_components` leading
/// path components from every entry.
pub fn extract_archive(archive_path: &Path, target_dir: &Path, strip_components: usize) -> Result<()> {
    let (file, kind) = open_archive(archive_path)?;
    debug!(
        "Extracting archive '{}' ({:?}) to '{}' (strip_components={})",
        archive_path.display(),
        kind,
        target_dir.display(),
        strip_components
    );

    fs::create_dir_all(target_dir).map_err(|e| {
        extraction_error(format!(
            "Failed to create target directory {}: {}",
            target_dir.display(),
            e
        ))
    })?;

    match kind {
        ArchiveKind::Zip => extract_zip_archive(file, target_dir, strip_components, archive_path),
        ArchiveKind::TarGz => {
            extract_tar_archive(GzDecoder::new(file), target_dir, strip_components, archive_path)
        }
        ArchiveKind::Tar => extract_tar_archive(file, target_dir, strip_components, archive_path),
    }
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                extraction_error(format!("Failed create dir {}: {}", parent.display(), e))
            })?;
        }
    }
    Ok(())
}

/// A hardlink whose target may not be unpacked yet.
struct DeferredHardLink {
    link_path: PathBuf,
    target_path: PathBuf,
}

fn extract_tar_archive<R: Read>(
    reader: R,
    target_dir: &Path,
    strip_components: usize,
    archive_path_for_log: &Path,
) -> Result<()> {
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    let root = canonical_root(target_dir)?;

    debug!("Starting TAR extraction for {}", archive_path_for_log.display());

    let mut deferred_hardlinks: Vec<DeferredHardLink> = Vec::new();

    let entries = archive.entries().map_err(|e| {
        extraction_error(format!(
            "Failed to read TAR {}: {}",
            archive_path_for_log.display(),
            e
        ))
    })?;
    for entry_result in entries {
        let mut entry = entry_result.map_err(|e| {
            extraction_error(format!(
                "Error reading TAR entry from {}: {}",
                archive_path_for_log.display(),
                e
            ))
        })?;

        let entry_name: PathBuf = entry
            .path()
            .map_err(|e| {
                extraction_error(format!(
                    "Invalid path in TAR entry from {}: {}",
                    archive_path_for_log.display(),
                    e
                ))
            })?
            .into_owned();

        let Some(final_path) =
            resolve_entry_path(&entry_name, target_dir, strip_components, archive_path_for_log)?
        else {
            debug!("Skipping TAR entry {:?}", entry_name);
            continue;
        };
        ensure_parent_within(&final_path, target_dir, &root, archive_path_for_log)?;
        create_parent(&final_path)?;
        clear_symlink(&final_path)?;

        match entry.header().entry_type() {
            EntryType::Link => {
                let link_name = entry.link_name().ok().flatten().ok_or_else(|| {
                    extraction_error(format!(
                        "Hardlink entry '{}' in {} has no link target name",
                        entry_name.display(),
                        archive_path_for_log.display()
                    ))
                })?;
                let target_path = resolve_entry_path(
                    &link_name,
                    target_dir,
                    strip_components,
                    archive_path_for_log,
                )?
                .ok_or_else(|| {
                    extraction_error(format!(
                        "Hardlink target '{}' is outside the archive root",
                        link_name.display()
                    ))
                })?;
                deferred_hardlinks.push(DeferredHardLink {
                    link_path: final_path,
                    target_path,
                });
                continue;
            }
            EntryType::Symlink => {
                if let Some(link_target) = entry.link_name().ok().flatten() {
                    ensure_link_within(&final_path, &link_target, &root)?;
                }
            }
            _ => {}
        }

        entry.unpack(&final_path).map_err(|e| {
            extraction_error(format!(
                "Failed to unpack entry {:?} to {}: {}",
                entry_name,
                final_path.display(),
                e
            ))
        })?;
        debug!("Unpacked TAR entry to: {}", final_path.display());
    }

    for deferred in deferred_hardlinks {
        ensure_parent_within(&deferred.link_path, target_dir, &root, archive_path_for_log)?;
        ensure_parent_within(&deferred.target_path, target_dir, &root, archive_path_for_log)?;
        if deferred.link_path.symlink_metadata().is_ok() {
            fs::remove_file(&deferred.link_path)?;
        }
        fs::hard_link(&deferred.target_path, &deferred.link_path).map_err(|e| {
            extraction_error(format!(
                "Failed to create hardlink '{}' -> '{}': {}",
                deferred.link_path.display(),
                deferred.target_path.display(),
                e
            ))
        })?;
    }

    debug!("Finished TAR extraction for {}", archive_path_for_log.display());
    Ok(())
}

fn extract_zip_archive<R: Read + Seek>(
    reader: R,
    target_dir: &Path,
    strip_components: usize,
    archive_path_for_log: &Path,
) -> Result<()> {
    let mut archive = ZipArchive::new(reader).map_err(|e| {
        extraction_error(format!(
            "Failed to open ZIP {}: {}",
            archive_path_for_log.display(),
            e
        ))
    })?;
    let root = canonical_root(target_dir)?;
    debug!("Starting ZIP extraction for {}", archive_path_for_log.display());

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| {
            extraction_error(format!(
                "Error reading ZIP index {} in {}: {}",
                i,
                archive_path_for_log.display(),
                e
            ))
        })?;

        let entry_name = PathBuf::from(file.name());
        let Some(final_path) =
            resolve_entry_path(&entry_name, target_dir, strip_components, archive_path_for_log)?
        else {
            debug!("Skipping ZIP entry {}", entry_name.display());
            continue;
        };
        ensure_parent_within(&final_path, target_dir, &root, archive_path_for_log)?;
        create_parent(&final_path)?;
        clear_symlink(&final_path)?;

        if file.is_dir() {
            fs::create_dir_all(&final_path).map_err(|e| {
                extraction_error(format!("Failed create dir {}: {}", final_path.display(), e))
            })?;
            continue;
        }

        if file.is_symlink() {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            let link_target = PathBuf::from(String::from_utf8_lossy(&buf).to_string());
            ensure_link_within(&final_path, &link_target, &root)?;
            #[cfg(unix)]
            {
                if final_path.symlink_metadata().is_ok() {
                    fs::remove_file(&final_path)?;
                }
                std::os::unix::fs::symlink(&link_target, &final_path)?;
            }
            #[cfg(not(unix))]
            {
                tracing::warn!(
                    "Cannot create symlink on this platform: {} -> {}",
                    final_path.display(),
                    link_target.display()
                );
            }
            continue;
        }

        let mut out_file = File::create(&final_path).map_err(|e| {
            extraction_error(format!("Failed create file {}: {}", final_path.display(), e))
        })?;
        io::copy(&mut file, &mut out_file).map_err(|e| {
            extraction_error(format!(
                "Failed to write ZIP entry {} to {}: {}",
                entry_name.display(),
                final_path.display(),
                e
            ))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                fs::set_permissions(&final_path, fs::Permissions::from_mode(mode))?;
            }
        }
    }
    debug!("Finished ZIP extraction for {}", archive_path_for_log.display());
    Ok(())
}
