//! Directory-tree helpers: sorted walks, recursive copies, mtime
//! fingerprints, and atomic file replacement.
//!
//! Walks never follow symbolic links. Symlinked entries are skipped by
//! [`walk_files`] and [`copy_tree`], so neither can be used to pull content
//! from outside the tree being processed.

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

/// Converts a standard path into a UTF-8 path.
///
/// # Errors
///
/// Returns [`io::ErrorKind::InvalidData`] when the path is not valid UTF-8.
pub fn utf8_path(path: &Path) -> io::Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).map_err(|raw| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("path is not valid UTF-8: {}", raw.display()),
        )
    })
}

fn relative_to(root: &Utf8Path, path: &Path) -> io::Result<Utf8PathBuf> {
    let relative = path
        .strip_prefix(root.as_std_path())
        .map_err(io::Error::other)?;
    utf8_path(relative)
}

/// Lists every regular file below `root` as root-relative paths.
///
/// Entries are produced depth-first with siblings ordered by file name, so
/// the result is stable for identical trees.
///
/// # Errors
///
/// Returns an error if the tree cannot be read or contains non-UTF-8 names.
pub fn walk_files(root: &Utf8Path) -> io::Result<Vec<Utf8PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(relative_to(root, entry.path())?);
        }
    }
    Ok(files)
}

/// Recursively copies `source` into `destination`, creating it as needed.
///
/// Returns the number of regular files copied.
///
/// # Errors
///
/// Returns an error if any entry cannot be read or written.
pub fn copy_tree(source: &Utf8Path, destination: &Utf8Path) -> io::Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(source) {
        let entry = entry?;
        let target = destination.join(relative_to(source, entry.path())?);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        } else {
            debug!("skipping non-regular entry {}", entry.path().display());
        }
    }
    Ok(copied)
}

/// Returns the newest modification time under `root`, in nanoseconds since
/// the Unix epoch.
///
/// Both files and directories contribute, so removing a file (which touches
/// its parent directory) also moves the fingerprint forward. An empty or
/// pre-epoch tree yields `0`.
///
/// # Errors
///
/// Returns an error if the tree or any entry metadata cannot be read.
pub fn max_mtime(root: &Utf8Path) -> io::Result<u64> {
    let mut newest = 0_u64;
    for entry in WalkDir::new(root) {
        let entry = entry?;
        let modified = entry.metadata().map_err(io::Error::from)?.modified()?;
        let nanos = modified
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX));
        newest = newest.max(nanos);
    }
    Ok(newest)
}

/// Removes every directory below `root` whose name appears in `names`.
///
/// Matching directories are removed whole; the walk does not descend into
/// them. Returns the number of subtrees removed.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked or a subtree cannot be
/// removed.
pub fn strip_subtrees(root: &Utf8Path, names: &[&str]) -> io::Result<usize> {
    let mut doomed = Vec::new();
    let mut walker = WalkDir::new(root).min_depth(1).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry?;
        let matches = entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| names.contains(&name));
        if matches {
            doomed.push(entry.path().to_path_buf());
            walker.skip_current_dir();
        }
    }
    for path in &doomed {
        debug!("stripping {}", path.display());
        fs::remove_dir_all(path)?;
    }
    Ok(doomed.len())
}

/// Removes `path` and everything below it, tolerating its absence.
///
/// Returns `true` when something was removed.
///
/// # Errors
///
/// Returns an error for any failure other than the path not existing.
pub fn remove_dir_if_exists(path: &Utf8Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Writes `contents` to `path` through a temporary sibling and a rename.
///
/// Readers observe either the previous file or the complete new one.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created or the
/// temporary file cannot be written or persisted.
pub fn write_atomic(path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
