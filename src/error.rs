//! Error types for the `h5pack` binary.

use crate::config::ConfigError;
use camino::Utf8PathBuf;
use h5pack_packager::PackagerError;
use std::io;
use thiserror::Error;

/// Errors reported by a CLI run.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Packaging failed.
    #[error(transparent)]
    Packager(#[from] PackagerError),

    /// A file the command reads or writes could not be accessed.
    #[error("{path}: {source}")]
    File {
        /// Path being read or written.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The activity has no usable package.
    #[error("no package found for activity {activity_id}")]
    ActivityNotFound {
        /// Requested activity id.
        activity_id: String,
    },

    /// The requested path does not name a file inside the package.
    #[error("{path} not found in activity {activity_id}")]
    FileNotFound {
        /// Requested activity id.
        activity_id: String,
        /// Requested path.
        path: String,
    },

    /// The requested path leaves the package.
    #[error("access to {path} is forbidden")]
    Forbidden {
        /// Requested path.
        path: String,
    },
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;
