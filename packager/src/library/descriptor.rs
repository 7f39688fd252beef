//! Library identity key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a library by machine name and major/minor version.
///
/// Patch versions are deliberately absent: two patch releases of the same
/// minor version are interchangeable for dependency resolution. The serde
/// representation matches the `preloadedDependencies` entries of
/// `library.json` and `h5p.json`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryDescriptor {
    /// Machine name, e.g. `H5P.Matching`.
    pub machine_name: String,
    /// Major version.
    pub major_version: u32,
    /// Minor version.
    pub minor_version: u32,
}

impl LibraryDescriptor {
    /// Create a descriptor.
    #[must_use]
    pub fn new(machine_name: impl Into<String>, major_version: u32, minor_version: u32) -> Self {
        Self {
            machine_name: machine_name.into(),
            major_version,
            minor_version,
        }
    }

    /// Directory name used for this library inside a package:
    /// `<machineName>-<major>.<minor>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use h5pack_packager::LibraryDescriptor;
    ///
    /// let descriptor = LibraryDescriptor::new("H5P.Matching", 1, 3);
    /// assert_eq!(descriptor.directory_name(), "H5P.Matching-1.3");
    /// ```
    #[must_use]
    pub fn directory_name(&self) -> String {
        format!(
            "{}-{}.{}",
            self.machine_name, self.major_version, self.minor_version
        )
    }
}

impl fmt::Display for LibraryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{}",
            self.machine_name, self.major_version, self.minor_version
        )
    }
}
