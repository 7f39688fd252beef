//! Configuration for the `h5pack` binary.
//!
//! Settings live in `h5pack.toml`. Every field is optional: omitted values
//! fall back to defaults, with cache directories placed under the platform
//! cache location reported by `directories-next`. Relative paths in a file
//! are resolved against the directory that holds the file, so a config
//! checked into a content repository works from any working directory.

use camino::{Utf8Path, Utf8PathBuf};
use directories_next::ProjectDirs;
use h5pack_packager::package::DEFAULT_MATCHING_LIBRARY;
use h5pack_packager::toolchain::{DEFAULT_BUILD_PROGRAM, DEFAULT_BUILD_TIMEOUT};
use serde::Deserialize;
use std::fs;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Conventional config file name looked up in the working directory.
pub const CONFIG_FILE: &str = "h5pack.toml";

/// Errors raised while loading [`PackConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the config file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The config file is not valid TOML or has unknown keys.
    #[error("invalid configuration in {path}: {reason}")]
    Parse {
        /// Path of the config file, or `<inline>` for string input.
        path: Utf8PathBuf,
        /// Parser message.
        reason: String,
    },
}

/// Settings for packaging and serving.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PackConfig {
    /// Directory holding vendored `<machineName>-<major>.<minor>/` libraries.
    pub library_root: Utf8PathBuf,
    /// Directory for built library copies and the build index.
    pub build_cache_dir: Utf8PathBuf,
    /// Directory packages are unpacked into for serving.
    pub extraction_cache_dir: Utf8PathBuf,
    /// Directory searched for `<activity_id>.h5p` archives.
    pub archive_dir: Utf8PathBuf,
    /// JavaScript build toolchain executable.
    pub build_program: String,
    /// Machine name of the library used for generated matching activities.
    pub matching_library: String,
    /// Seconds a single toolchain command may run before it is killed.
    pub build_timeout_secs: u64,
}

impl Default for PackConfig {
    fn default() -> Self {
        let cache = default_cache_dir();
        Self {
            library_root: Utf8PathBuf::from("libraries"),
            build_cache_dir: cache.join("builds"),
            extraction_cache_dir: cache.join("serve"),
            archive_dir: Utf8PathBuf::from("packages"),
            build_program: DEFAULT_BUILD_PROGRAM.to_owned(),
            matching_library: DEFAULT_MATCHING_LIBRARY.to_owned(),
            build_timeout_secs: DEFAULT_BUILD_TIMEOUT.as_secs(),
        }
    }
}

impl PackConfig {
    /// Loads configuration from `path`, resolving relative paths against
    /// the file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read and
    /// [`ConfigError::Parse`] when its contents are invalid.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        Self::load_with(path, |path| fs::read_to_string(path))
    }

    /// Loads configuration from `path` using `read` to obtain the text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when `read` fails and
    /// [`ConfigError::Parse`] when the text is invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use h5pack::PackConfig;
    ///
    /// let config = PackConfig::load_with(Utf8Path::new("/srv/h5p/h5pack.toml"), |_| {
    ///     Ok("library_root = \"vendor\"\n".to_owned())
    /// })
    /// .expect("valid configuration");
    /// assert_eq!(config.library_root, "/srv/h5p/vendor");
    /// ```
    pub fn load_with<F>(path: &Utf8Path, read: F) -> Result<Self, ConfigError>
    where
        F: FnOnce(&Utf8Path) -> io::Result<String>,
    {
        let source = read(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let config = parse(&source, path)?;
        Ok(match path.parent() {
            Some(base) if !base.as_str().is_empty() => config.relative_to(base),
            _ => config,
        })
    }

    /// Loads `h5pack.toml` from the working directory when it exists and
    /// falls back to defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the file exists but cannot be loaded.
    pub fn discover() -> Result<Self, ConfigError> {
        let path = Utf8Path::new(CONFIG_FILE);
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parses configuration text without resolving relative paths.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text is invalid.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        parse(source, Utf8Path::new("<inline>"))
    }

    /// Toolchain command timeout.
    #[must_use]
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    fn relative_to(mut self, base: &Utf8Path) -> Self {
        for path in [
            &mut self.library_root,
            &mut self.build_cache_dir,
            &mut self.extraction_cache_dir,
            &mut self.archive_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }
}

fn parse(source: &str, path: &Utf8Path) -> Result<PackConfig, ConfigError> {
    toml::from_str(source).map_err(|err| ConfigError::Parse {
        path: path.to_owned(),
        reason: err.message().to_owned(),
    })
}

/// Platform cache directory for h5pack, or `.h5pack-cache` when the
/// platform reports none.
fn default_cache_dir() -> Utf8PathBuf {
    ProjectDirs::from("", "", "h5pack")
        .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.cache_dir().to_path_buf()).ok())
        .unwrap_or_else(|| Utf8PathBuf::from(".h5pack-cache"))
}
