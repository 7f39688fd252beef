//! Library registry: indexing vendored libraries and resolving dependency
//! closures.
//!
//! The index is a snapshot of the library root taken on first use. It is
//! never patched in place; callers that vendor new libraries call
//! [`LibraryRegistry::reload`] to take a fresh snapshot.

use crate::build_cache::requires_build;
use crate::error::{PackagerError, Result};
use crate::library::{LibraryDescriptor, LibraryManifest};
use camino::{Utf8Path, Utf8PathBuf};
use h5pack_common::contained_relative;
use log::{debug, info};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

/// Immutable index of every library found under a library root.
///
/// Versions of each machine name are kept newest first, ordered by
/// `(major, minor, patch)`.
#[derive(Debug, Clone)]
pub struct RegistryIndex {
    root: Utf8PathBuf,
    libraries: BTreeMap<String, Vec<LibraryManifest>>,
}

impl RegistryIndex {
    /// Scans the immediate child directories of `root`.
    ///
    /// Directories without a `library.json` are skipped, as are plain files.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::Configuration`] when `root` is missing or not
    /// a directory, and [`PackagerError::ManifestParse`] when a
    /// `library.json` exists but is invalid.
    pub fn build(root: &Utf8Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(PackagerError::Configuration {
                path: root.to_owned(),
                reason: "library root does not exist or is not a directory".to_owned(),
            });
        }

        let mut libraries: BTreeMap<String, Vec<LibraryManifest>> = BTreeMap::new();
        for entry in root.read_dir_utf8()? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(manifest) = LibraryManifest::load(entry.path())? else {
                debug!("skipping {} (no library.json)", entry.path());
                continue;
            };
            libraries
                .entry(manifest.machine_name().to_owned())
                .or_default()
                .push(manifest);
        }
        for versions in libraries.values_mut() {
            versions.sort_by(|a, b| {
                b.version()
                    .cmp(&a.version())
                    .then_with(|| a.directory_name().cmp(b.directory_name()))
            });
        }

        let index = Self {
            root: root.to_owned(),
            libraries,
        };
        info!(
            "indexed {} library versions under {}",
            index.len(),
            index.root
        );
        Ok(index)
    }

    /// Library root this index was built from.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Total number of indexed library versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.libraries.values().map(Vec::len).sum()
    }

    /// Returns `true` when no library was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    /// Every indexed version of `machine_name`, newest first.
    #[must_use]
    pub fn versions(&self, machine_name: &str) -> &[LibraryManifest] {
        self.libraries
            .get(machine_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Newest indexed version of `machine_name`.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::UnknownLibrary`] when no version is indexed.
    pub fn latest(&self, machine_name: &str) -> Result<&LibraryManifest> {
        self.versions(machine_name)
            .first()
            .ok_or_else(|| PackagerError::UnknownLibrary {
                machine_name: machine_name.to_owned(),
                searched_root: self.root.clone(),
            })
    }

    /// Selects the library matching `descriptor` exactly on major and minor
    /// version. When several patch releases are vendored the newest wins.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::MissingLibrary`] when no version matches.
    pub fn select(&self, descriptor: &LibraryDescriptor) -> Result<&LibraryManifest> {
        self.versions(&descriptor.machine_name)
            .iter()
            .find(|manifest| manifest.descriptor() == descriptor)
            .ok_or_else(|| PackagerError::MissingLibrary {
                machine_name: descriptor.machine_name.clone(),
                major: descriptor.major_version,
                minor: descriptor.minor_version,
                searched_root: self.root.clone(),
            })
    }

    /// Resolves the transitive closure of `initial` breadth first.
    ///
    /// Each dequeued descriptor is selected and its assets checked before its
    /// own dependencies are enqueued. Libraries that still need a build step
    /// (see [`requires_build`]) produce their assets during the build, so
    /// their check happens against the built copy at assembly time instead.
    /// The result lists manifests in dequeue order with every descriptor
    /// appearing once.
    ///
    /// # Errors
    ///
    /// Fails on the first descriptor that cannot be selected or whose assets
    /// are missing.
    pub fn resolve_closure(&self, initial: &[LibraryDescriptor]) -> Result<Vec<LibraryManifest>> {
        let mut queue: VecDeque<&LibraryDescriptor> = initial.iter().collect();
        let mut visited: HashSet<&LibraryDescriptor> = HashSet::new();
        let mut closure = Vec::new();

        while let Some(descriptor) = queue.pop_front() {
            if !visited.insert(descriptor) {
                continue;
            }
            let manifest = self.select(descriptor)?;
            if requires_build(manifest.directory()) {
                debug!("deferring asset check for {descriptor} until after its build");
            } else {
                ensure_assets(manifest)?;
            }
            queue.extend(manifest.preloaded_dependencies());
            closure.push(manifest.clone());
        }
        debug!(
            "resolved {} libraries from {} roots",
            closure.len(),
            initial.len()
        );
        Ok(closure)
    }
}

/// Verifies every preloaded asset of `manifest` exists in its source
/// directory.
///
/// # Errors
///
/// Returns [`PackagerError::MissingAssets`] naming every absent asset.
pub fn ensure_assets(manifest: &LibraryManifest) -> Result<()> {
    ensure_assets_in(manifest, manifest.directory())
}

/// Verifies every preloaded asset of `manifest` exists below `directory`.
///
/// Used after a build to check the built copy rather than the source. An
/// asset path that escapes the directory counts as missing.
///
/// # Errors
///
/// Returns [`PackagerError::MissingAssets`] naming every absent asset.
pub fn ensure_assets_in(manifest: &LibraryManifest, directory: &Utf8Path) -> Result<()> {
    let missing: Vec<String> = manifest
        .preloaded_assets()
        .iter()
        .filter(|asset| {
            contained_relative(Utf8Path::new(asset))
                .is_none_or(|relative| !directory.join(relative).is_file())
        })
        .cloned()
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(PackagerError::MissingAssets {
        library_dir: manifest.directory_name().to_owned(),
        missing,
    })
}

/// Shared, lazily indexed view of a library root.
///
/// Concurrent readers share one [`RegistryIndex`]; the first caller builds
/// it. [`reload`](Self::reload) swaps in a fresh snapshot without disturbing
/// readers still holding the previous one.
#[derive(Debug)]
pub struct LibraryRegistry {
    root: Utf8PathBuf,
    index: RwLock<Option<Arc<RegistryIndex>>>,
}

impl LibraryRegistry {
    /// Creates a registry over `root` without touching the filesystem.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: RwLock::new(None),
        }
    }

    /// Configured library root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns the current index, building it on first use.
    ///
    /// # Errors
    ///
    /// Propagates [`RegistryIndex::build`] failures. A failed build leaves
    /// the registry unindexed so a later call retries.
    pub fn index(&self) -> Result<Arc<RegistryIndex>> {
        if let Some(index) = self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(Arc::clone(index));
        }

        let mut slot = self.index.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = slot.as_ref() {
            return Ok(Arc::clone(index));
        }
        let index = Arc::new(RegistryIndex::build(&self.root)?);
        *slot = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Discards the memoized index and builds a new one.
    ///
    /// # Errors
    ///
    /// Propagates [`RegistryIndex::build`] failures; the registry is left
    /// unindexed in that case.
    pub fn reload(&self) -> Result<Arc<RegistryIndex>> {
        let mut slot = self.index.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
        let index = Arc::new(RegistryIndex::build(&self.root)?);
        *slot = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Selects an exact library version from the current index.
    ///
    /// # Errors
    ///
    /// See [`RegistryIndex::select`].
    pub fn select(&self, descriptor: &LibraryDescriptor) -> Result<LibraryManifest> {
        self.index()?.select(descriptor).cloned()
    }

    /// Resolves a dependency closure against the current index.
    ///
    /// # Errors
    ///
    /// See [`RegistryIndex::resolve_closure`].
    pub fn resolve_closure(&self, initial: &[LibraryDescriptor]) -> Result<Vec<LibraryManifest>> {
        self.index()?.resolve_closure(initial)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
