//! Per-library build artefacts keyed by source fingerprint.
//!
//! Each library directory is copied into the cache once per source change.
//! Libraries that ship a `package.json` build script without pre-built
//! `dist/` output are built in a scratch workspace first. Build failures are
//! not fatal: the unbuilt copy is cached and reported as
//! [`BuildStatus::Degraded`], leaving the asset check in the assembler to
//! decide whether the result is usable.
//!
//! The index of cached entries is persisted as `build-cache.json` in the
//! cache directory. Nothing is evicted automatically.

use crate::error::Result;
use crate::library::LibraryManifest;
use crate::registry::ensure_assets_in;
use crate::toolchain::BuildToolchain;
use camino::{Utf8Path, Utf8PathBuf};
use h5pack_common::{
    copy_tree, max_mtime, remove_dir_if_exists, strip_subtrees, utf8_path, write_atomic,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

/// File name of the persisted cache index.
pub const INDEX_FILE: &str = "build-cache.json";

/// Subtrees removed from every cached library.
pub const DEV_ONLY_SUBTREES: [&str; 2] = ["node_modules", ".git"];

/// How a [`BuildOutcome`] was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    /// The cached copy was current; nothing was copied.
    Cached,
    /// The source was copied without a build step.
    Copied,
    /// The source was copied and the build toolchain succeeded.
    Built,
    /// The build toolchain failed; the unbuilt copy was cached instead.
    Degraded {
        /// Toolchain failure description.
        reason: String,
    },
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cached => f.write_str("cached"),
            Self::Copied => f.write_str("copied"),
            Self::Built => f.write_str("built"),
            Self::Degraded { reason } => write!(f, "degraded ({reason})"),
        }
    }
}

/// Result of [`BuildCache::get_or_build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Directory holding the ready-to-package library.
    pub path: Utf8PathBuf,
    /// How the directory was produced.
    pub status: BuildStatus,
}

/// Persisted record for one cached library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildCacheEntry {
    /// Newest source modification time, in nanoseconds since the epoch.
    pub source_fingerprint: u64,
    /// Cached library directory.
    pub cached_path: Utf8PathBuf,
}

type Index = BTreeMap<String, BuildCacheEntry>;

/// Cache of built library directories.
#[derive(Debug)]
pub struct BuildCache {
    cache_dir: Utf8PathBuf,
    toolchain: BuildToolchain,
    index: Mutex<Index>,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BuildCache {
    /// Opens (creating if needed) the cache rooted at `cache_dir`.
    ///
    /// An unreadable index is discarded with a warning; every library is
    /// then rebuilt on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub fn open(cache_dir: impl Into<Utf8PathBuf>, toolchain: BuildToolchain) -> Result<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)?;
        let index = load_index(&cache_dir.join(INDEX_FILE));
        debug!(
            "opened build cache {cache_dir} with {} entries",
            index.len()
        );
        Ok(Self {
            cache_dir,
            toolchain,
            index: Mutex::new(index),
            key_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Cache root directory.
    #[must_use]
    pub fn cache_dir(&self) -> &Utf8Path {
        &self.cache_dir
    }

    /// Returns the persisted entry for a library directory name.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<BuildCacheEntry> {
        self.index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Returns a ready-to-package copy of the library described by
    /// `manifest`, building it if its sources changed since the last call.
    ///
    /// Concurrent calls for the same library are serialized; calls for
    /// different libraries proceed in parallel.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be fingerprinted or copied, or
    /// the cache cannot be updated. Toolchain failures are reported through
    /// [`BuildStatus::Degraded`] instead.
    pub fn get_or_build(&self, manifest: &LibraryManifest) -> Result<BuildOutcome> {
        let lock = self.key_lock(manifest.directory_name());
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.refresh(manifest)
    }

    /// Brings the cached copy up to date like
    /// [`get_or_build`](Self::get_or_build), checks its preloaded assets, and
    /// copies it to `destination`.
    ///
    /// The library's lock is held until the copy finishes, so a concurrent
    /// rebuild cannot replace the cached directory mid-copy.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::MissingAssets`](crate::PackagerError::MissingAssets)
    /// when the cached copy lacks a declared asset, plus the errors of
    /// [`get_or_build`](Self::get_or_build) and copy failures.
    pub fn export(
        &self,
        manifest: &LibraryManifest,
        destination: &Utf8Path,
    ) -> Result<BuildOutcome> {
        let lock = self.key_lock(manifest.directory_name());
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = self.refresh(manifest)?;
        ensure_assets_in(manifest, &outcome.path)?;
        copy_tree(&outcome.path, destination)?;
        Ok(outcome)
    }

    /// Rebuilds the cached copy when the source changed. Callers hold the
    /// library's key lock.
    fn refresh(&self, manifest: &LibraryManifest) -> Result<BuildOutcome> {
        let key = manifest.directory_name();
        let source = manifest.directory();
        let fingerprint = max_mtime(source)?;
        if let Some(entry) = self.entry(key)
            && entry.source_fingerprint == fingerprint
            && entry.cached_path.is_dir()
        {
            debug!("build cache hit for {key}");
            return Ok(BuildOutcome {
                path: entry.cached_path,
                status: BuildStatus::Cached,
            });
        }

        let workspace = tempfile::Builder::new()
            .prefix(".scratch-")
            .tempdir_in(&self.cache_dir)?;
        let scratch = utf8_path(workspace.path())?;
        copy_tree(source, &scratch)?;

        let status = if requires_build(&scratch) {
            match self.toolchain.install_and_build(&scratch) {
                Ok(()) => BuildStatus::Built,
                Err(err) => {
                    warn!("build of {key} failed, caching unbuilt sources: {err}");
                    BuildStatus::Degraded {
                        reason: err.to_string(),
                    }
                }
            }
        } else {
            BuildStatus::Copied
        };
        strip_subtrees(&scratch, &DEV_ONLY_SUBTREES)?;

        let target = self.cache_dir.join(key);
        remove_dir_if_exists(&target)?;
        // After the rename the guard's cleanup finds nothing to delete; it
        // only matters on the error paths above.
        fs::rename(&scratch, &target)?;
        drop(workspace);

        self.record(
            key,
            BuildCacheEntry {
                source_fingerprint: fingerprint,
                cached_path: target.clone(),
            },
        )?;
        info!("cached {key} ({status})");
        Ok(BuildOutcome {
            path: target,
            status,
        })
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.to_owned()).or_default())
    }

    fn record(&self, key: &str, entry: BuildCacheEntry) -> Result<()> {
        let mut index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        index.insert(key.to_owned(), entry);
        let json = serde_json::to_vec_pretty(&*index).map_err(io::Error::from)?;
        write_atomic(&self.cache_dir.join(INDEX_FILE), &json)?;
        Ok(())
    }
}

fn load_index(path: &Utf8Path) -> Index {
    let json = match fs::read(path) {
        Ok(json) => json,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Index::new(),
        Err(err) => {
            warn!("ignoring unreadable build cache index {path}: {err}");
            return Index::new();
        }
    };
    serde_json::from_slice(&json).unwrap_or_else(|err| {
        warn!("ignoring corrupt build cache index {path}: {err}");
        Index::new()
    })
}

/// Returns `true` when `directory` declares a `build` script in
/// `package.json` and has no pre-built `dist/` directory.
#[must_use]
pub fn requires_build(directory: &Utf8Path) -> bool {
    if directory.join("dist").is_dir() {
        return false;
    }
    let Ok(json) = fs::read_to_string(directory.join("package.json")) else {
        return false;
    };
    match serde_json::from_str::<Value>(&json) {
        Ok(package) => package
            .pointer("/scripts/build")
            .and_then(Value::as_str)
            .is_some_and(|script| !script.trim().is_empty()),
        Err(err) => {
            debug!("ignoring unparsable package.json in {directory}: {err}");
            false
        }
    }
}

#[cfg(test)]
#[path = "build_cache_tests.rs"]
mod tests;
