//! Configuration, service wiring, and command execution for the `h5pack`
//! binary.
//!
//! The packaging pipeline itself lives in `h5pack-packager`; this crate
//! turns an `h5pack.toml` into a [`Services`] bundle and runs CLI commands
//! against it.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod services;

pub use commands::{Streams, run};
pub use config::{ConfigError, PackConfig};
pub use error::{CliError, Result};
pub use services::Services;
