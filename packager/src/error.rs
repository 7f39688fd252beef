//! Error types for the packaging pipeline.
//!
//! Each variant names the condition a caller can act on: a bad library root,
//! a dependency that is not vendored, a library that still needs its build
//! step, or invalid end-user input. Extraction failures have their own type in
//! [`crate::extraction`] because they never escape the serving path.

use crate::tabular::GenerationError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can abort registry lookups, builds, or package assembly.
#[derive(Debug, Error)]
pub enum PackagerError {
    /// The configured library root cannot be indexed.
    #[error("library root {path} is not usable: {reason}")]
    Configuration {
        /// The configured library root.
        path: Utf8PathBuf,
        /// Description of the problem.
        reason: String,
    },

    /// No vendored library matches the requested version.
    #[error(
        "library {machine_name} {major}.{minor} not found in {searched_root}; vendor it into the library root"
    )]
    MissingLibrary {
        /// Requested machine name.
        machine_name: String,
        /// Requested major version.
        major: u32,
        /// Requested minor version.
        minor: u32,
        /// Library root that was searched.
        searched_root: Utf8PathBuf,
    },

    /// No version at all of a library is vendored.
    #[error("no version of library {machine_name} found in {searched_root}")]
    UnknownLibrary {
        /// Requested machine name.
        machine_name: String,
        /// Library root that was searched.
        searched_root: Utf8PathBuf,
    },

    /// A library declares preloaded assets that do not exist on disk.
    #[error(
        "library {library_dir} is missing preloaded assets: {}; it probably requires a build step",
        .missing.join(", ")
    )]
    MissingAssets {
        /// Directory name of the library.
        library_dir: String,
        /// Declared asset paths that were not found.
        missing: Vec<String>,
    },

    /// A `library.json` or `h5p.json` manifest could not be parsed.
    #[error("invalid manifest at {path}: {reason}")]
    ManifestParse {
        /// Path of the manifest.
        path: Utf8PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The content payload cannot be packaged.
    #[error("invalid content: {reason}")]
    InvalidContent {
        /// Description of the problem.
        reason: String,
    },

    /// End-user tabular input was rejected.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Writing the zip archive failed.
    #[error("archive write failed: {reason}")]
    Archive {
        /// Description of the failure.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`PackagerError`].
pub type Result<T> = std::result::Result<T, PackagerError>;
