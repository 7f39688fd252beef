//! The `h5p.json` package manifest.

use crate::error::{PackagerError, Result};
use crate::library::LibraryDescriptor;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;

/// File name of the package manifest at the archive root.
pub const PACKAGE_MANIFEST: &str = "h5p.json";

fn default_language() -> String {
    "und".to_owned()
}

fn default_embed_types() -> Vec<String> {
    vec!["iframe".to_owned()]
}

/// Root manifest of a package.
///
/// Keys this type does not model are kept in [`extra`](Self::extra) and
/// written back unchanged, so authored packages round-trip without losing
/// metadata such as `authors` or `licenseVersion`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    /// Package title.
    pub title: String,
    /// Content language code; `und` when unspecified.
    #[serde(default = "default_language")]
    pub language: String,
    /// Machine name of the library that renders the content.
    pub main_library: String,
    /// Supported embed types.
    #[serde(default = "default_embed_types")]
    pub embed_types: Vec<String>,
    /// License code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// Libraries the content needs at runtime.
    #[serde(default)]
    pub preloaded_dependencies: Vec<LibraryDescriptor>,
    /// Every other key, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PackageManifest {
    /// Creates a manifest with default language and embed types.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        main_library: impl Into<String>,
        preloaded_dependencies: Vec<LibraryDescriptor>,
    ) -> Self {
        Self {
            title: title.into(),
            language: default_language(),
            main_library: main_library.into(),
            embed_types: default_embed_types(),
            license: None,
            preloaded_dependencies,
            extra: Map::new(),
        }
    }

    /// Parses manifest JSON.
    ///
    /// # Errors
    ///
    /// Returns the parser error for malformed JSON or missing `title` or
    /// `mainLibrary`.
    ///
    /// # Examples
    ///
    /// ```
    /// use h5pack_packager::PackageManifest;
    ///
    /// let manifest = PackageManifest::from_json(
    ///     r#"{"title":"Quiz","mainLibrary":"H5P.MultiChoice","authors":[]}"#,
    /// )
    /// .expect("valid manifest");
    /// assert_eq!(manifest.language, "und");
    /// assert_eq!(manifest.embed_types, ["iframe"]);
    /// assert!(manifest.extra.contains_key("authors"));
    /// ```
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serializes the manifest as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; in practice this cannot fail for
    /// manifests built from parsed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Reads `h5p.json` from `directory`.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::Io`] if the file cannot be read and
    /// [`PackagerError::ManifestParse`] if it is invalid.
    pub fn load(directory: &Utf8Path) -> Result<Self> {
        let path = directory.join(PACKAGE_MANIFEST);
        let json = fs::read_to_string(&path)?;
        Self::from_json(&json).map_err(|err| PackagerError::ManifestParse {
            path,
            reason: err.to_string(),
        })
    }
}
