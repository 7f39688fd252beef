//! Library identity and `library.json` manifests.
//!
//! # Sub-modules
//!
//! - [`descriptor`] - `(machineName, major, minor)` identity key
//! - [`manifest`] - Parsed `library.json` with dependencies and assets

pub mod descriptor;
pub mod manifest;

pub use descriptor::LibraryDescriptor;
pub use manifest::LibraryManifest;
