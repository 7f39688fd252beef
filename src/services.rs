//! Wires configuration into packaging and serving services.

use crate::config::PackConfig;
use h5pack_packager::{
    BuildCache, BuildToolchain, DirectoryLocator, ExtractionCache, LibraryRegistry, Packager,
    Result,
};
use log::debug;
use std::sync::Arc;

/// Packaging and serving services built from one [`PackConfig`].
#[derive(Debug)]
pub struct Services {
    /// Assembles packages from the configured library root.
    pub packager: Packager,
    /// Serves packages found in the configured archive directory.
    pub extraction: ExtractionCache,
}

impl Services {
    /// Builds the services described by `config`.
    ///
    /// The library root is indexed lazily on first use; only the build cache
    /// index is read here.
    ///
    /// # Errors
    ///
    /// Returns an error if the build cache directory cannot be created.
    pub fn from_config(config: &PackConfig) -> Result<Self> {
        debug!("configuring services from {config:?}");
        let registry = Arc::new(LibraryRegistry::new(config.library_root.clone()));
        let toolchain = BuildToolchain::system(config.build_program.clone(), config.build_timeout());
        let build_cache = Arc::new(BuildCache::open(
            config.build_cache_dir.clone(),
            toolchain,
        )?);
        let packager = Packager::new(registry, build_cache)
            .with_matching_library(config.matching_library.clone());
        let extraction = ExtractionCache::new(
            config.extraction_cache_dir.clone(),
            Arc::new(DirectoryLocator::new(config.archive_dir.clone())),
        );
        Ok(Self {
            packager,
            extraction,
        })
    }
}
