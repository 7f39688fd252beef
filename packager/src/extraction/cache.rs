//! On-demand extraction of packages for serving.
//!
//! An activity's archive is unpacked once per archive revision into
//! `<root>/<activity_id>/<cache_key>/`, where the key hashes the archive
//! path, modification time, and size. Unpacking happens in a private
//! `.partial-*` directory that is renamed into place, so readers never see
//! a half-written tree. When two requests race, the loser discards its copy
//! and serves the winner's. A forced refresh moves the live revision aside
//! to a `.retired-*` directory only once its replacement is fully unpacked.
//!
//! Work directories are named `<prefix><key>-<pid>-<sequence>`. Those left
//! behind by another process are swept once they are older than the
//! configured age.

use super::locator::ArchiveLocator;
use super::unpack::{ExtractionError, unpack_archive};
use crate::package::{CONTENT_DIR, PackageManifest};
use camino::{Utf8Path, Utf8PathBuf};
use h5pack_common::{contained_relative, is_plain_segment, remove_dir_if_exists};
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const PARTIAL_PREFIX: &str = ".partial-";
const RETIRED_PREFIX: &str = ".retired-";
const CACHE_KEY_LEN: usize = 16;
const RESOLVE_ATTEMPTS: usize = 3;

/// Age after which another process's work directories are swept.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60 * 60);

/// Outcome of [`ExtractionCache::extract`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The package is unpacked at this directory.
    Ready(Utf8PathBuf),
    /// The activity has no usable package.
    NotFound,
}

/// Outcome of resolving a file for serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Served {
    /// Canonical path of a regular file inside the package.
    File(Utf8PathBuf),
    /// The request addressed something outside the package.
    Forbidden,
    /// Nothing servable exists at the requested path.
    NotFound,
}

/// Computes the cache key for an archive revision: the first 16 hex digits
/// of the SHA-256 of its path, modification time, and size.
///
/// # Errors
///
/// Returns an error if the archive metadata cannot be read.
pub fn cache_key(archive: &Utf8Path) -> io::Result<String> {
    let metadata = fs::metadata(archive)?;
    let modified = metadata
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());

    let mut hasher = Sha256::new();
    hasher.update(archive.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(modified.to_le_bytes());
    hasher.update(metadata.len().to_le_bytes());
    let mut key = format!("{:x}", hasher.finalize());
    key.truncate(CACHE_KEY_LEN);
    Ok(key)
}

/// Unpacks packages on demand and resolves files inside them.
pub struct ExtractionCache {
    root: Utf8PathBuf,
    locator: Arc<dyn ArchiveLocator>,
    sequence: AtomicU64,
    stale_after: Duration,
}

impl fmt::Debug for ExtractionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionCache")
            .field("root", &self.root)
            .field("stale_after", &self.stale_after)
            .finish_non_exhaustive()
    }
}

impl ExtractionCache {
    /// Creates a cache unpacking into `root`, finding archives through
    /// `locator`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>, locator: Arc<dyn ArchiveLocator>) -> Self {
        Self {
            root: root.into(),
            locator,
            sequence: AtomicU64::new(0),
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    /// Sets the age after which work directories left by other processes
    /// are removed.
    #[must_use]
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Extraction root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Ensures the current revision of an activity's package is unpacked.
    ///
    /// Ids that are not a single plain path segment are treated as unknown.
    /// Older revisions of the same activity are removed when a new one is
    /// unpacked. `force_refresh` unpacks again even when the current
    /// revision is already present; the existing tree keeps serving until
    /// the new one is complete.
    ///
    /// Failures are logged and reported as [`Extraction::NotFound`].
    pub fn extract(&self, activity_id: &str, force_refresh: bool) -> Extraction {
        if !is_plain_segment(activity_id) {
            debug!("rejecting activity id {activity_id:?}");
            return Extraction::NotFound;
        }
        let Some(archive) = self.locator.locate(activity_id) else {
            debug!("no package for activity {activity_id}");
            return Extraction::NotFound;
        };
        let key = match cache_key(&archive) {
            Ok(key) => key,
            Err(err) => {
                warn!("cannot read package {archive}: {err}");
                return Extraction::NotFound;
            }
        };

        let activity_dir = self.root.join(activity_id);
        let target = activity_dir.join(&key);
        if !force_refresh && target.is_dir() {
            return Extraction::Ready(target);
        }

        match self.unpack_revision(&archive, &activity_dir, &key, force_refresh) {
            Ok(path) => Extraction::Ready(path),
            Err(err) => {
                warn!("failed to extract {archive} for activity {activity_id}: {err}");
                Extraction::NotFound
            }
        }
    }

    fn unpack_revision(
        &self,
        archive: &Utf8Path,
        activity_dir: &Utf8Path,
        key: &str,
        force_refresh: bool,
    ) -> Result<Utf8PathBuf, ExtractionError> {
        fs::create_dir_all(activity_dir)?;
        let partial = self.work_dir(activity_dir, PARTIAL_PREFIX, key);
        let target = activity_dir.join(key);

        if let Err(err) = unpack_archive(archive, &partial) {
            discard(&partial);
            return Err(err);
        }
        let retired = if force_refresh {
            match self.retire(activity_dir, key, &target) {
                Ok(retired) => retired,
                Err(err) => {
                    discard(&partial);
                    return Err(err.into());
                }
            }
        } else {
            None
        };

        let installed = match fs::rename(&partial, &target) {
            Ok(()) => {
                info!("extracted {archive} to {target}");
                Ok(target)
            }
            Err(_) if target.is_dir() => {
                debug!("another request extracted {target} first");
                discard(&partial);
                Ok(target)
            }
            Err(err) => {
                discard(&partial);
                if let Some(retired) = &retired
                    && let Err(restore) = fs::rename(retired, &target)
                {
                    warn!("failed to restore {target} from {retired}: {restore}");
                }
                Err(err.into())
            }
        };
        if let Some(retired) = retired
            && retired.exists()
        {
            discard(&retired);
        }
        if installed.is_ok() {
            self.sweep(activity_dir, key);
        }
        installed
    }

    fn work_dir(&self, activity_dir: &Utf8Path, prefix: &str, key: &str) -> Utf8PathBuf {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        activity_dir.join(format!("{prefix}{key}-{}-{sequence}", process::id()))
    }

    /// Moves the live revision aside, returning where it went.
    fn retire(
        &self,
        activity_dir: &Utf8Path,
        key: &str,
        target: &Utf8Path,
    ) -> io::Result<Option<Utf8PathBuf>> {
        let retired = self.work_dir(activity_dir, RETIRED_PREFIX, key);
        match fs::rename(target, &retired) {
            Ok(()) => Ok(Some(retired)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Removes other revisions and abandoned work directories. Failures are
    /// logged; the current revision is already in place.
    fn sweep(&self, activity_dir: &Utf8Path, key: &str) {
        let entries = match activity_dir.read_dir_utf8() {
            Ok(entries) => entries,
            Err(err) => {
                warn!("cannot list {activity_dir}: {err}");
                return;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let stale = match work_dir_pid(name) {
                Some(pid) => pid != process::id() && self.is_old(entry.path()),
                None => name != key,
            };
            if stale {
                debug!("removing stale extraction {}", entry.path());
                discard(entry.path());
            }
        }
    }

    fn is_old(&self, path: &Utf8Path) -> bool {
        let age = fs::symlink_metadata(path)
            .and_then(|metadata| metadata.modified())
            .map(|modified| {
                SystemTime::now()
                    .duration_since(modified)
                    .unwrap_or(Duration::ZERO)
            });
        age.is_ok_and(|age| age >= self.stale_after)
    }

    /// Reads the `h5p.json` of an activity's package.
    ///
    /// Returns `None` when the package is missing or its manifest is
    /// unreadable.
    #[must_use]
    pub fn read_manifest(&self, activity_id: &str) -> Option<PackageManifest> {
        let Extraction::Ready(root) = self.extract(activity_id, false) else {
            return None;
        };
        PackageManifest::load(&root)
            .inspect_err(|err| warn!("unreadable manifest for activity {activity_id}: {err}"))
            .ok()
    }

    /// Resolves `relative` against the root of an activity's package.
    ///
    /// Paths that miss at the root are looked up again under the `content/`
    /// payload directory, so `content.json` names the payload's
    /// `content/content.json`.
    ///
    /// Absolute paths and paths that climb above the package root are
    /// [`Served::Forbidden`] whether or not the target exists, as are paths
    /// that reach outside through a symbolic link. Missing paths and
    /// directories are [`Served::NotFound`].
    #[must_use]
    pub fn resolve_served_file(&self, activity_id: &str, relative: &str) -> Served {
        self.resolve(activity_id, |root| match resolve_within(root, relative) {
            Served::NotFound => resolve_within(&root.join(CONTENT_DIR), relative),
            served => served,
        })
    }

    /// Resolves `relative` against the `content/` payload directory of an
    /// activity's package, with the same rules as
    /// [`resolve_served_file`](Self::resolve_served_file).
    #[must_use]
    pub fn resolve_content_file(&self, activity_id: &str, relative: &str) -> Served {
        self.resolve(activity_id, |root| {
            resolve_within(&root.join(CONTENT_DIR), relative)
        })
    }

    /// Runs `lookup` against the current revision. A miss is retried against
    /// a freshly located revision, since a forced refresh may have swapped
    /// the tree mid-lookup.
    fn resolve(&self, activity_id: &str, lookup: impl Fn(&Utf8Path) -> Served) -> Served {
        let mut served = Served::NotFound;
        for _ in 0..RESOLVE_ATTEMPTS {
            let Extraction::Ready(root) = self.extract(activity_id, false) else {
                return Served::NotFound;
            };
            served = lookup(&root);
            if served != Served::NotFound {
                break;
            }
        }
        served
    }
}

/// Returns the owning process id encoded in a work directory name.
fn work_dir_pid(name: &str) -> Option<u32> {
    let rest = name
        .strip_prefix(PARTIAL_PREFIX)
        .or_else(|| name.strip_prefix(RETIRED_PREFIX))?;
    rest.rsplit('-').nth(1)?.parse().ok()
}

fn discard(path: &Utf8Path) {
    if let Err(err) = remove_dir_if_exists(path) {
        warn!("failed to remove {path}: {err}");
    }
}

/// Resolves `relative` inside `root`, refusing anything that leaves it.
fn resolve_within(root: &Utf8Path, relative: &str) -> Served {
    let Some(normalized) = contained_relative(Utf8Path::new(relative)) else {
        return Served::Forbidden;
    };
    let Ok(canonical_root) = root.canonicalize_utf8() else {
        return Served::NotFound;
    };

    match canonical_root.join(&normalized).canonicalize_utf8() {
        Ok(resolved) if !resolved.starts_with(&canonical_root) => Served::Forbidden,
        Ok(resolved) if resolved.is_file() => Served::File(resolved),
        Ok(_) => Served::NotFound,
        Err(_) if crosses_escaping_link(&canonical_root, &normalized) => Served::Forbidden,
        Err(_) => Served::NotFound,
    }
}

/// Returns `true` when some prefix of `relative` below `root` is a symbolic
/// link that dangles or points outside `root`.
fn crosses_escaping_link(root: &Utf8Path, relative: &Utf8Path) -> bool {
    let mut current = root.to_owned();
    for component in relative.components() {
        current.push(component);
        let Ok(metadata) = fs::symlink_metadata(&current) else {
            return false;
        };
        if metadata.file_type().is_symlink() {
            match current.canonicalize_utf8() {
                Ok(target) if target.starts_with(root) => current = target,
                _ => return true,
            }
        }
    }
    false
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
