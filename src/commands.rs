//! Command execution for the `h5pack` binary.

use crate::cli::{Cli, Command, ExtractArgs, MatchingArgs, PackArgs, ServePathArgs};
use crate::config::PackConfig;
use crate::error::{CliError, Result};
use crate::output::{degraded_warnings, package_summary, write_stderr_line};
use crate::services::Services;
use camino::{Utf8Path, Utf8PathBuf};
use h5pack_packager::{Extraction, MatchingActivitySpec, PackageOutput, PackagerError, Served};
use std::fs;
use std::io::{Read, Write};

/// Standard streams used by a run.
pub struct Streams<'a> {
    /// Source for `-` table input.
    pub stdin: &'a mut dyn Read,
    /// Destination for command results.
    pub stdout: &'a mut dyn Write,
    /// Destination for progress and warnings.
    pub stderr: &'a mut dyn Write,
}

/// Loads configuration named by `cli` and runs its command.
///
/// # Errors
///
/// Returns the first configuration, packaging, or I/O failure.
pub fn run(cli: &Cli, streams: &mut Streams<'_>) -> Result<()> {
    let config = match &cli.config {
        Some(path) => PackConfig::load(path)?,
        None => PackConfig::discover()?,
    };
    run_with_config(cli, &config, streams)
}

/// Runs the command in `cli` against an already loaded configuration.
///
/// # Errors
///
/// Returns the first packaging or I/O failure.
pub fn run_with_config(cli: &Cli, config: &PackConfig, streams: &mut Streams<'_>) -> Result<()> {
    let services = Services::from_config(config)?;
    match &cli.command {
        Command::Pack(args) => pack(&services, args, cli.quiet, streams),
        Command::Matching(args) => matching(&services, args, cli.quiet, streams),
        Command::ServePath(args) => serve_path(&services, args, streams),
        Command::Extract(args) => extract(&services, args, streams),
    }
}

fn pack(services: &Services, args: &PackArgs, quiet: bool, streams: &mut Streams<'_>) -> Result<()> {
    let output = services.packager.package_authored_content(&args.directory)?;
    write_package(&output, args.output.as_deref(), quiet, streams)
}

fn matching(
    services: &Services,
    args: &MatchingArgs,
    quiet: bool,
    streams: &mut Streams<'_>,
) -> Result<()> {
    let table = read_table(&args.table, streams)?;
    let spec = MatchingActivitySpec::from_table(
        &args.title,
        &args.description,
        &args.choice_type,
        &table,
    )
    .map_err(PackagerError::from)?;
    let output = services.packager.package_matching_activity(&spec)?;
    write_package(&output, args.output.as_deref(), quiet, streams)
}

fn serve_path(services: &Services, args: &ServePathArgs, streams: &mut Streams<'_>) -> Result<()> {
    let served = if args.content {
        services
            .extraction
            .resolve_content_file(&args.activity_id, &args.path)
    } else {
        services
            .extraction
            .resolve_served_file(&args.activity_id, &args.path)
    };
    match served {
        Served::File(path) => print_path(&path, streams),
        Served::Forbidden => Err(CliError::Forbidden {
            path: args.path.clone(),
        }),
        Served::NotFound => Err(CliError::FileNotFound {
            activity_id: args.activity_id.clone(),
            path: args.path.clone(),
        }),
    }
}

fn extract(services: &Services, args: &ExtractArgs, streams: &mut Streams<'_>) -> Result<()> {
    match services.extraction.extract(&args.activity_id, args.force) {
        Extraction::Ready(path) => print_path(&path, streams),
        Extraction::NotFound => Err(CliError::ActivityNotFound {
            activity_id: args.activity_id.clone(),
        }),
    }
}

fn print_path(path: &Utf8Path, streams: &mut Streams<'_>) -> Result<()> {
    writeln!(streams.stdout, "{path}").map_err(|source| CliError::File {
        path: Utf8PathBuf::from("<stdout>"),
        source,
    })
}

fn read_table(source: &Utf8Path, streams: &mut Streams<'_>) -> Result<String> {
    if source.as_str() == "-" {
        let mut table = String::new();
        streams
            .stdin
            .read_to_string(&mut table)
            .map_err(|source| CliError::File {
                path: Utf8PathBuf::from("<stdin>"),
                source,
            })?;
        return Ok(table);
    }
    fs::read_to_string(source).map_err(|err| CliError::File {
        path: source.to_owned(),
        source: err,
    })
}

/// Writes the archive to `requested`, treating an existing directory as the
/// place to put the suggested file name. Without a request the file lands
/// in the working directory.
fn write_package(
    output: &PackageOutput,
    requested: Option<&Utf8Path>,
    quiet: bool,
    streams: &mut Streams<'_>,
) -> Result<()> {
    let destination = match requested {
        Some(path) if path.is_dir() => path.join(&output.filename),
        Some(path) => path.to_owned(),
        None => Utf8PathBuf::from(&output.filename),
    };
    fs::write(&destination, &output.bytes).map_err(|source| CliError::File {
        path: destination.clone(),
        source,
    })?;

    for warning in degraded_warnings(output) {
        write_stderr_line(streams.stderr, warning);
    }
    if !quiet {
        write_stderr_line(streams.stderr, package_summary(&destination, output));
    }
    Ok(())
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
