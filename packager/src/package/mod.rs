//! Package manifests, archive writing, and assembly.
//!
//! # Sub-modules
//!
//! - [`archive`] - Deterministic zip writer for scratch trees
//! - [`assembler`] - [`Packager`] turning content plus a library closure
//!   into archive bytes
//! - [`manifest`] - The `h5p.json` root manifest
//! - [`matching`] - Generated `content.json` for matching activities
//! - [`naming`] - Slugified package file names

pub mod archive;
pub mod assembler;
pub mod manifest;
pub mod matching;
pub mod naming;

pub use archive::write_archive;
pub use assembler::{CONTENT_DIR, CONTENT_DOCUMENT, ContentPackage, PackageOutput, Packager};
pub use manifest::{PACKAGE_MANIFEST, PackageManifest};
pub use matching::{DEFAULT_MATCHING_LIBRARY, MatchingContent};
pub use naming::{PACKAGE_EXTENSION, package_filename, slugify};
