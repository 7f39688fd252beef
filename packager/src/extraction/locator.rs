//! Mapping activity ids to package archives on disk.

use crate::package::PACKAGE_EXTENSION;
use camino::{Utf8Path, Utf8PathBuf};

/// Finds the archive backing an activity.
///
/// Implementations receive ids that are already known to be single plain
/// path segments.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveLocator: Send + Sync {
    /// Returns the archive path for `activity_id`, or `None` when the
    /// activity has no package.
    fn locate(&self, activity_id: &str) -> Option<Utf8PathBuf>;
}

/// Locates `<directory>/<activity_id>.h5p`.
///
/// # Examples
///
/// ```no_run
/// use h5pack_packager::{ArchiveLocator, DirectoryLocator};
///
/// let locator = DirectoryLocator::new("packages");
/// assert_eq!(
///     locator.locate("fire-safety").map(|path| path.to_string()),
///     Some("packages/fire-safety.h5p".to_owned()),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLocator {
    directory: Utf8PathBuf,
}

impl DirectoryLocator {
    /// Creates a locator over `directory`.
    #[must_use]
    pub fn new(directory: impl Into<Utf8PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Directory searched for archives.
    #[must_use]
    pub fn directory(&self) -> &Utf8Path {
        &self.directory
    }
}

impl ArchiveLocator for DirectoryLocator {
    fn locate(&self, activity_id: &str) -> Option<Utf8PathBuf> {
        let path = self
            .directory
            .join(format!("{activity_id}{PACKAGE_EXTENSION}"));
        path.is_file().then_some(path)
    }
}
