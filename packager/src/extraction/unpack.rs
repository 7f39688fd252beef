//! Zip unpacking with traversal protection and legacy layout fix-up.

use camino::Utf8Path;
use h5pack_common::utf8_path;
use log::debug;
use std::fs::{self, File};
use std::io::{self, BufReader};
use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

/// Directory that wraps library folders in legacy archives.
pub const LEGACY_LIBRARIES_DIR: &str = "libraries";

const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

/// Errors that can occur while unpacking a package.
///
/// These never escape the extraction cache; they are logged and reported to
/// callers as a missing package.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive is not a readable zip file.
    #[error("invalid archive: {0}")]
    Zip(#[from] ZipError),

    /// An entry would be written outside the destination directory.
    #[error("entry `{path}` escapes the extraction directory")]
    PathTraversal {
        /// Entry name as stored in the archive.
        path: String,
    },

    /// The archive has no entries.
    #[error("archive is empty")]
    EmptyArchive,
}

/// Unpacks `archive` into `destination` and flattens a legacy
/// `libraries/` wrapper.
///
/// Symbolic link entries are skipped. Any entry whose name is absolute or
/// climbs out of `destination` aborts the whole extraction; the caller owns
/// cleanup of the partially written directory.
///
/// # Errors
///
/// Returns an [`ExtractionError`] describing the first failure.
pub fn unpack_archive(archive: &Utf8Path, destination: &Utf8Path) -> Result<usize, ExtractionError> {
    let mut zip = ZipArchive::new(BufReader::new(File::open(archive)?))?;
    if zip.is_empty() {
        return Err(ExtractionError::EmptyArchive);
    }
    fs::create_dir_all(destination)?;

    let mut written = 0;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let Some(enclosed) = entry.enclosed_name() else {
            return Err(ExtractionError::PathTraversal {
                path: entry.name().to_owned(),
            });
        };
        let relative = utf8_path(&enclosed)?;
        if entry
            .unix_mode()
            .is_some_and(|mode| mode & S_IFMT == S_IFLNK)
        {
            debug!("skipping symlink entry {relative}");
            continue;
        }

        let target = destination.join(&relative);
        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&target)?;
        io::copy(&mut entry, &mut file)?;
        written += 1;
    }

    flatten_libraries_dir(destination)?;
    Ok(written)
}

/// Moves the children of `root/libraries/` up to `root` and removes the
/// wrapper. Children whose name already exists at the top level are
/// dropped in favour of the top-level copy.
///
/// Returns `true` when a wrapper was found.
///
/// # Errors
///
/// Returns an error if the wrapper cannot be listed, moved, or removed.
pub fn flatten_libraries_dir(root: &Utf8Path) -> io::Result<bool> {
    let wrapper = root.join(LEGACY_LIBRARIES_DIR);
    if !wrapper.is_dir() {
        return Ok(false);
    }
    for entry in wrapper.read_dir_utf8()? {
        let entry = entry?;
        let target = root.join(entry.file_name());
        if target.exists() {
            debug!("keeping top-level {target} over legacy copy");
            continue;
        }
        fs::rename(entry.path(), &target)?;
    }
    fs::remove_dir_all(&wrapper)?;
    debug!("flattened legacy {LEGACY_LIBRARIES_DIR}/ wrapper in {root}");
    Ok(true)
}
