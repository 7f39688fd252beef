//! Package assembly: manifest, payload, and library closure into one archive.

use super::archive::write_archive;
use super::manifest::{PACKAGE_MANIFEST, PackageManifest};
use super::matching::{DEFAULT_MATCHING_LIBRARY, MatchingContent};
use super::naming::package_filename;
use crate::build_cache::{BuildCache, BuildOutcome, BuildStatus};
use crate::error::{PackagerError, Result};
use crate::library::{LibraryDescriptor, LibraryManifest};
use crate::registry::LibraryRegistry;
use crate::tabular::MatchingActivitySpec;
use camino::{Utf8Path, Utf8PathBuf};
use h5pack_common::{contained_relative, utf8_path, walk_files};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;

/// Name of the payload directory inside a package.
pub const CONTENT_DIR: &str = "content";

/// Name of the payload document inside [`CONTENT_DIR`].
pub const CONTENT_DOCUMENT: &str = "content.json";

/// Transient description of everything except the libraries.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentPackage {
    /// Root manifest written as `h5p.json`.
    pub manifest: PackageManifest,
    /// Payload files relative to `content/`; must include `content.json`.
    pub content_files: Vec<(Utf8PathBuf, Vec<u8>)>,
    /// Other files copied to the archive root unchanged.
    pub extra_top_level_files: Vec<(Utf8PathBuf, Vec<u8>)>,
}

/// An assembled package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOutput {
    /// Zip archive bytes.
    pub bytes: Vec<u8>,
    /// Suggested file name, derived from the manifest title.
    pub filename: String,
    /// Libraries bundled, in dependency resolution order.
    pub libraries: Vec<LibraryDescriptor>,
    /// How each bundled library was obtained from the build cache.
    pub build_outcomes: Vec<(LibraryDescriptor, BuildOutcome)>,
}

impl PackageOutput {
    /// Libraries whose build step failed but were bundled anyway.
    pub fn degraded(&self) -> impl Iterator<Item = &(LibraryDescriptor, BuildOutcome)> {
        self.build_outcomes.iter().filter(|(_, outcome)| {
            matches!(outcome.status, BuildStatus::Degraded { .. })
        })
    }
}

fn invalid(reason: impl Into<String>) -> PackagerError {
    PackagerError::InvalidContent {
        reason: reason.into(),
    }
}

fn contained(relative: &Utf8Path, what: &str) -> Result<Utf8PathBuf> {
    contained_relative(relative)
        .filter(|path| !path.as_str().is_empty())
        .ok_or_else(|| invalid(format!("{what} path `{relative}` escapes the package")))
}

fn write_new(path: &Utf8Path, contents: &[u8]) -> Result<()> {
    if path.exists() {
        return Err(invalid(format!("`{path}` would be written twice")));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

/// Builds `.h5p` archives from authored or generated content.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use std::sync::Arc;
/// use h5pack_packager::{BuildCache, BuildToolchain, LibraryRegistry, Packager};
/// use h5pack_packager::toolchain::{DEFAULT_BUILD_PROGRAM, DEFAULT_BUILD_TIMEOUT};
///
/// let registry = Arc::new(LibraryRegistry::new("libraries"));
/// let toolchain = BuildToolchain::system(DEFAULT_BUILD_PROGRAM, DEFAULT_BUILD_TIMEOUT);
/// let cache = Arc::new(BuildCache::open("cache/builds", toolchain)?);
/// let packager = Packager::new(registry, cache);
///
/// let output = packager.package_authored_content(Utf8Path::new("authored/quiz"))?;
/// std::fs::write(&output.filename, &output.bytes)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct Packager {
    registry: Arc<LibraryRegistry>,
    build_cache: Arc<BuildCache>,
    matching_library: String,
}

impl Packager {
    /// Creates a packager using the default matching library.
    #[must_use]
    pub fn new(registry: Arc<LibraryRegistry>, build_cache: Arc<BuildCache>) -> Self {
        Self {
            registry,
            build_cache,
            matching_library: DEFAULT_MATCHING_LIBRARY.to_owned(),
        }
    }

    /// Overrides the library used for generated matching activities.
    #[must_use]
    pub fn with_matching_library(mut self, machine_name: impl Into<String>) -> Self {
        self.matching_library = machine_name.into();
        self
    }

    /// Registry the packager resolves libraries against.
    #[must_use]
    pub fn registry(&self) -> &LibraryRegistry {
        &self.registry
    }

    /// Writes `package` and the libraries in `closure` into an archive.
    ///
    /// Each library comes from the build cache and is re-checked for its
    /// preloaded assets in the built copy. A library listed more than once
    /// is written once. Nothing is returned unless every library is usable;
    /// the scratch tree is removed on every path.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::InvalidContent`] for payloads without
    /// `content.json` or with escaping paths, [`PackagerError::MissingAssets`]
    /// when a built library lacks an asset, and I/O or archive errors.
    pub fn assemble_package(
        &self,
        package: &ContentPackage,
        closure: &[LibraryManifest],
    ) -> Result<PackageOutput> {
        let scratch_guard = tempfile::Builder::new().prefix("h5pack-").tempdir()?;
        let scratch = utf8_path(scratch_guard.path())?;

        let mut has_document = false;
        for (relative, contents) in &package.content_files {
            let relative = contained(relative, "content")?;
            has_document |= relative == CONTENT_DOCUMENT;
            write_new(&scratch.join(CONTENT_DIR).join(relative), contents)?;
        }
        if !has_document {
            return Err(invalid(format!(
                "payload has no {CONTENT_DIR}/{CONTENT_DOCUMENT}"
            )));
        }

        let manifest_json = package
            .manifest
            .to_json()
            .map_err(|err| invalid(err.to_string()))?;
        write_new(&scratch.join(PACKAGE_MANIFEST), manifest_json.as_bytes())?;

        let mut written = HashSet::new();
        let mut libraries = Vec::new();
        let mut build_outcomes = Vec::new();
        for manifest in closure {
            let descriptor = manifest.descriptor();
            if !written.insert(descriptor.clone()) {
                continue;
            }
            let outcome = self
                .build_cache
                .export(manifest, &scratch.join(descriptor.directory_name()))?;
            debug!("bundled {descriptor} ({})", outcome.status);
            libraries.push(descriptor.clone());
            build_outcomes.push((descriptor.clone(), outcome));
        }

        for (relative, contents) in &package.extra_top_level_files {
            let relative = contained(relative, "top-level file")?;
            if relative == PACKAGE_MANIFEST || relative.starts_with(CONTENT_DIR) {
                return Err(invalid(format!(
                    "top-level file `{relative}` collides with the package layout"
                )));
            }
            write_new(&scratch.join(relative), contents)?;
        }

        let bytes = write_archive(&scratch)?;
        let output = PackageOutput {
            bytes,
            filename: package_filename(&package.manifest.title),
            libraries,
            build_outcomes,
        };
        for (descriptor, outcome) in output.degraded() {
            warn!("{descriptor} was bundled without a successful build: {}", outcome.status);
        }
        info!(
            "assembled {} ({} bytes, {} libraries)",
            output.filename,
            output.bytes.len(),
            output.libraries.len()
        );
        Ok(output)
    }

    /// Packages an authored content directory.
    ///
    /// The directory holds `h5p.json`, a `content/` payload, and optionally
    /// other top-level files that are passed through unchanged.
    ///
    /// # Errors
    ///
    /// Returns manifest, dependency, asset, or I/O errors from any stage.
    pub fn package_authored_content(&self, directory: &Utf8Path) -> Result<PackageOutput> {
        let manifest = PackageManifest::load(directory)?;
        let content_root = directory.join(CONTENT_DIR);
        if !content_root.is_dir() {
            return Err(invalid(format!("{directory} has no {CONTENT_DIR}/ directory")));
        }

        let content_files = walk_files(&content_root)?
            .into_iter()
            .map(|relative| -> Result<(Utf8PathBuf, Vec<u8>)> {
                let contents = fs::read(content_root.join(&relative))?;
                Ok((relative, contents))
            })
            .collect::<Result<Vec<_>>>()?;
        let extra_top_level_files = top_level_files(directory)?;

        let closure = self
            .registry
            .resolve_closure(&manifest.preloaded_dependencies)?;
        self.assemble_package(
            &ContentPackage {
                manifest,
                content_files,
                extra_top_level_files,
            },
            &closure,
        )
    }

    /// Generates and packages a matching activity.
    ///
    /// The newest installed version of the configured matching library
    /// becomes the main library; `preloadedDependencies` lists its whole
    /// closure.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::UnknownLibrary`] when the matching library is
    /// not vendored, plus any dependency, asset, or I/O error.
    pub fn package_matching_activity(&self, spec: &MatchingActivitySpec) -> Result<PackageOutput> {
        let index = self.registry.index()?;
        let main = index.latest(&self.matching_library)?;
        let closure = index.resolve_closure(std::slice::from_ref(main.descriptor()))?;
        let dependencies = closure
            .iter()
            .map(|manifest| manifest.descriptor().clone())
            .collect();

        let manifest = PackageManifest::new(spec.title.clone(), main.machine_name(), dependencies);
        let document = serde_json::to_vec_pretty(&MatchingContent::from(spec))
            .map_err(|err| invalid(err.to_string()))?;
        self.assemble_package(
            &ContentPackage {
                manifest,
                content_files: vec![(Utf8PathBuf::from(CONTENT_DOCUMENT), document)],
                extra_top_level_files: Vec::new(),
            },
            &closure,
        )
    }
}

fn top_level_files(directory: &Utf8Path) -> Result<Vec<(Utf8PathBuf, Vec<u8>)>> {
    let mut files = Vec::new();
    for entry in directory.read_dir_utf8()? {
        let entry = entry?;
        if !entry.file_type()?.is_file() || entry.file_name() == PACKAGE_MANIFEST {
            continue;
        }
        files.push((
            Utf8PathBuf::from(entry.file_name()),
            fs::read(entry.path())?,
        ));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

#[cfg(test)]
#[path = "assembler_tests.rs"]
mod tests;
