//! `library.json` parsing.
//!
//! A library directory is identified by the `library.json` at its root. Only
//! the fields the packaging pipeline relies on are kept: identity, patch
//! version, declared dependencies, and the preloaded scripts and stylesheets
//! that must exist once any build step has run.

use super::descriptor::LibraryDescriptor;
use crate::error::{PackagerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::io;

/// File name of a library manifest.
pub const LIBRARY_MANIFEST: &str = "library.json";

#[derive(Debug, Deserialize)]
struct AssetRef {
    path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLibraryManifest {
    machine_name: String,
    major_version: u32,
    minor_version: u32,
    #[serde(default)]
    patch_version: u32,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    runnable: Value,
    #[serde(default)]
    preloaded_js: Vec<AssetRef>,
    #[serde(default)]
    preloaded_css: Vec<AssetRef>,
    #[serde(default)]
    preloaded_dependencies: Vec<LibraryDescriptor>,
}

/// A parsed `library.json` bound to the directory it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryManifest {
    descriptor: LibraryDescriptor,
    patch_version: u32,
    title: Option<String>,
    runnable: bool,
    preloaded_dependencies: Vec<LibraryDescriptor>,
    preloaded_assets: Vec<String>,
    directory: Utf8PathBuf,
}

impl LibraryManifest {
    /// Parse manifest JSON for the library living in `directory`.
    ///
    /// `preloadedAssets` is the `path` of every `preloadedJs` entry followed
    /// by every `preloadedCss` entry. `runnable` accepts either a boolean or
    /// the `0`/`1` integers most libraries use.
    ///
    /// # Errors
    ///
    /// Returns the parser error if the JSON is malformed or misses identity
    /// fields.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8PathBuf;
    /// use h5pack_packager::LibraryManifest;
    ///
    /// let json = r#"{
    ///     "machineName": "H5P.Matching", "majorVersion": 1, "minorVersion": 2,
    ///     "patchVersion": 7, "runnable": 1,
    ///     "preloadedJs": [{"path": "dist/matching.js"}]
    /// }"#;
    /// let manifest = LibraryManifest::from_json(json, Utf8PathBuf::from("/libs/H5P.Matching-1.2"))
    ///     .expect("valid manifest");
    /// assert_eq!(manifest.patch_version(), 7);
    /// assert!(manifest.runnable());
    /// assert_eq!(manifest.preloaded_assets(), ["dist/matching.js"]);
    /// ```
    pub fn from_json(json: &str, directory: Utf8PathBuf) -> serde_json::Result<Self> {
        let raw: RawLibraryManifest = serde_json::from_str(json)?;
        let runnable = match &raw.runnable {
            Value::Bool(flag) => *flag,
            Value::Number(number) => number.as_u64().is_some_and(|n| n != 0),
            _ => false,
        };
        let preloaded_assets = raw
            .preloaded_js
            .into_iter()
            .chain(raw.preloaded_css)
            .map(|asset| asset.path)
            .collect();
        Ok(Self {
            descriptor: LibraryDescriptor::new(
                raw.machine_name,
                raw.major_version,
                raw.minor_version,
            ),
            patch_version: raw.patch_version,
            title: raw.title,
            runnable,
            preloaded_dependencies: raw.preloaded_dependencies,
            preloaded_assets,
            directory,
        })
    }

    /// Load the manifest of the library in `directory`.
    ///
    /// Returns `Ok(None)` when the directory has no `library.json`.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::ManifestParse`] if the file exists but is not
    /// a valid manifest, or [`PackagerError::Io`] if it cannot be read.
    pub fn load(directory: &Utf8Path) -> Result<Option<Self>> {
        let path = directory.join(LIBRARY_MANIFEST);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Self::from_json(&json, directory.to_owned())
            .map(Some)
            .map_err(|err| PackagerError::ManifestParse {
                path,
                reason: err.to_string(),
            })
    }

    /// Identity of this library.
    #[must_use]
    pub fn descriptor(&self) -> &LibraryDescriptor {
        &self.descriptor
    }

    /// Machine name.
    #[must_use]
    pub fn machine_name(&self) -> &str {
        &self.descriptor.machine_name
    }

    /// Patch version.
    #[must_use]
    pub fn patch_version(&self) -> u32 {
        self.patch_version
    }

    /// `(major, minor, patch)` for ordering.
    #[must_use]
    pub fn version(&self) -> (u32, u32, u32) {
        (
            self.descriptor.major_version,
            self.descriptor.minor_version,
            self.patch_version,
        )
    }

    /// Human-readable title, when declared.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Whether the library can be used as a package's main library.
    #[must_use]
    pub fn runnable(&self) -> bool {
        self.runnable
    }

    /// Declared preloaded dependencies, in manifest order.
    #[must_use]
    pub fn preloaded_dependencies(&self) -> &[LibraryDescriptor] {
        &self.preloaded_dependencies
    }

    /// Scripts and stylesheets that must exist relative to the library
    /// directory.
    #[must_use]
    pub fn preloaded_assets(&self) -> &[String] {
        &self.preloaded_assets
    }

    /// Source directory of the library.
    #[must_use]
    pub fn directory(&self) -> &Utf8Path {
        &self.directory
    }

    /// Final component of the source directory, used as the build cache key.
    #[must_use]
    pub fn directory_name(&self) -> &str {
        self.directory.file_name().unwrap_or(self.directory.as_str())
    }
}
