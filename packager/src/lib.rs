//! H5P packaging pipeline.
//!
//! This crate indexes pre-vendored H5P libraries, builds and caches a
//! ready-to-ship copy of each one, assembles `.h5p` archives from authored or
//! generated content, and unpacks finished archives on demand for serving.
//!
//! # Modules
//!
//! - [`build_cache`] - Per-library build artefacts keyed by mtime fingerprint
//! - [`error`] - Semantic error types for packaging failures
//! - [`extraction`] - On-demand unpacking and safe file resolution for serving
//! - [`library`] - Library descriptors and `library.json` manifests
//! - [`package`] - Package manifests, archive writing, and assembly
//! - [`registry`] - Library index and dependency closure resolution
//! - [`tabular`] - Term/definition table parsing for matching activities
//! - [`toolchain`] - External JavaScript build toolchain invocation

pub mod build_cache;
pub mod error;
pub mod extraction;
pub mod library;
pub mod package;
pub mod registry;
pub mod tabular;
pub mod toolchain;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

pub use build_cache::{BuildCache, BuildCacheEntry, BuildOutcome, BuildStatus};
pub use error::{PackagerError, Result};
pub use extraction::{ArchiveLocator, DirectoryLocator, Extraction, ExtractionCache, Served};
pub use library::{LibraryDescriptor, LibraryManifest};
pub use package::{ContentPackage, PackageManifest, PackageOutput, Packager};
pub use registry::{LibraryRegistry, RegistryIndex};
pub use tabular::{ChoiceType, GenerationError, MatchingActivitySpec};
pub use toolchain::{BuildToolchain, CommandExecutor, SystemCommandExecutor};
