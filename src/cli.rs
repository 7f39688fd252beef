//! CLI argument definitions for `h5pack`.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Build, package, and serve H5P activities.
#[derive(Parser, Debug)]
#[command(name = "h5pack")]
#[command(version, about)]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Package an authored content directory:\n",
    "    $ h5pack pack authored/fire-safety -o packages/\n\n",
    "  Generate a matching activity from a table on stdin:\n",
    "    $ h5pack matching --title \"GNPEC Policy Match\" - < terms.csv\n\n",
    "  Print the file served for an activity path:\n",
    "    $ h5pack serve-path fire-safety content/content.json",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Config file [default: ./h5pack.toml when present].
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Package an authored content directory.
    Pack(PackArgs),

    /// Generate and package a matching activity from a term table.
    Matching(MatchingArgs),

    /// Resolve a file inside an activity's package for serving.
    ServePath(ServePathArgs),

    /// Unpack an activity's package into the extraction cache.
    Extract(ExtractArgs),
}

/// Arguments for the `pack` command.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct PackArgs {
    /// Directory holding `h5p.json` and `content/`.
    #[arg(value_name = "DIR")]
    pub directory: Utf8PathBuf,

    /// Output file, or directory to write the suggested file name into.
    #[arg(short, long, value_name = "OUT")]
    pub output: Option<Utf8PathBuf>,
}

/// Arguments for the `matching` command.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct MatchingArgs {
    /// Activity title.
    #[arg(long, default_value = "")]
    pub title: String,

    /// Task description shown above the activity.
    #[arg(long, default_value = "")]
    pub description: String,

    /// Presentation of definitions: `text` or `image`.
    #[arg(long, default_value = "text")]
    pub choice_type: String,

    /// Table of term/definition rows, or `-` for stdin.
    #[arg(value_name = "FILE")]
    pub table: Utf8PathBuf,

    /// Output file, or directory to write the suggested file name into.
    #[arg(short, long, value_name = "OUT")]
    pub output: Option<Utf8PathBuf>,
}

/// Arguments for the `serve-path` command.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct ServePathArgs {
    /// Activity id; the package is `<archive_dir>/<ID>.h5p`.
    #[arg(value_name = "ID")]
    pub activity_id: String,

    /// Path relative to the package root.
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Resolve against the `content/` directory instead of the package root.
    #[arg(long)]
    pub content: bool,
}

/// Arguments for the `extract` command.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct ExtractArgs {
    /// Activity id; the package is `<archive_dir>/<ID>.h5p`.
    #[arg(value_name = "ID")]
    pub activity_id: String,

    /// Unpack again even if the current revision is already extracted.
    #[arg(long)]
    pub force: bool,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
