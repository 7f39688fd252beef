//! On-demand unpacking and safe file resolution for serving.
//!
//! # Sub-modules
//!
//! - [`cache`] - Revision-keyed extraction directories and path resolution
//! - [`locator`] - Activity id to archive path mapping
//! - [`unpack`] - Zip unpacking with traversal protection

pub mod cache;
pub mod locator;
pub mod unpack;

pub use cache::{DEFAULT_STALE_AFTER, Extraction, ExtractionCache, Served, cache_key};
pub use locator::{ArchiveLocator, DirectoryLocator};
pub use unpack::{ExtractionError, flatten_libraries_dir, unpack_archive};
