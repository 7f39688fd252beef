//! Deterministic zip writing for assembled package trees.

use crate::error::{PackagerError, Result};
use camino::Utf8Path;
use h5pack_common::walk_files;
use std::fs;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

fn archive_error(err: zip::result::ZipError) -> PackagerError {
    PackagerError::Archive {
        reason: err.to_string(),
    }
}

/// Zips every regular file under `root` into an in-memory archive.
///
/// Entries use root-relative `/`-separated names in sorted walk order, are
/// deflate-compressed, and carry a fixed timestamp and `0644` permissions,
/// so identical trees always produce identical bytes. Directory entries are
/// not written.
///
/// # Errors
///
/// Returns [`PackagerError::Io`] if a file cannot be read and
/// [`PackagerError::Archive`] if the zip writer fails.
pub fn write_archive(root: &Utf8Path) -> Result<Vec<u8>> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for relative in walk_files(root)? {
        let name = relative
            .components()
            .map(|component| component.as_str())
            .collect::<Vec<_>>()
            .join("/");
        let contents = fs::read(root.join(&relative))?;
        writer.start_file(name, options).map_err(archive_error)?;
        writer.write_all(&contents)?;
    }
    let cursor = writer.finish().map_err(archive_error)?;
    Ok(cursor.into_inner())
}
