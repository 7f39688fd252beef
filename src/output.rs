//! Progress and result lines for the CLI.

use camino::Utf8Path;
use h5pack_packager::PackageOutput;
use std::fmt::Display;
use std::io::Write;

/// Writes `message` and a newline, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Summarises a written package.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use h5pack::output::package_summary;
/// use h5pack_packager::PackageOutput;
///
/// let output = PackageOutput {
///     bytes: vec![0; 2048],
///     filename: "fire-safety.h5p".to_owned(),
///     libraries: Vec::new(),
///     build_outcomes: Vec::new(),
/// };
/// assert_eq!(
///     package_summary(Utf8Path::new("out/fire-safety.h5p"), &output),
///     "Wrote out/fire-safety.h5p (0 libraries, 2048 bytes)"
/// );
/// ```
#[must_use]
pub fn package_summary(path: &Utf8Path, output: &PackageOutput) -> String {
    let count = output.libraries.len();
    let noun = if count == 1 { "library" } else { "libraries" };
    format!(
        "Wrote {path} ({count} {noun}, {} bytes)",
        output.bytes.len()
    )
}

/// One warning line per library whose build step failed.
#[must_use]
pub fn degraded_warnings(output: &PackageOutput) -> Vec<String> {
    output
        .degraded()
        .map(|(descriptor, outcome)| {
            format!("warning: {descriptor} bundled without building: {}", outcome.status)
        })
        .collect()
}
