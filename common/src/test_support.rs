//! Fixture builders for library trees and authored content directories.
//!
//! Tests across the workspace need realistic `library.json` directories and
//! authored packages on disk. The builders here write those layouts into a
//! caller-supplied root so each test controls its own temporary directory.

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Value, json};
use std::fs;
use std::io;

/// Builder for an on-disk library directory containing `library.json`.
#[derive(Debug, Clone)]
pub struct LibraryFixture {
    machine_name: String,
    major: u32,
    minor: u32,
    patch: u32,
    dependencies: Vec<(String, u32, u32)>,
    preloaded_js: Vec<String>,
    preloaded_css: Vec<String>,
    write_assets: bool,
    extra_files: Vec<(String, String)>,
    directory_name: Option<String>,
}

impl LibraryFixture {
    /// Starts a fixture for `machine_name` at `major.minor.0`.
    #[must_use]
    pub fn new(machine_name: &str, major: u32, minor: u32) -> Self {
        Self {
            machine_name: machine_name.to_owned(),
            major,
            minor,
            patch: 0,
            dependencies: Vec::new(),
            preloaded_js: Vec::new(),
            preloaded_css: Vec::new(),
            write_assets: true,
            extra_files: Vec::new(),
            directory_name: None,
        }
    }

    /// Sets the patch version.
    #[must_use]
    pub fn patch(mut self, patch: u32) -> Self {
        self.patch = patch;
        self
    }

    /// Declares a preloaded dependency.
    #[must_use]
    pub fn depends_on(mut self, machine_name: &str, major: u32, minor: u32) -> Self {
        self.dependencies
            .push((machine_name.to_owned(), major, minor));
        self
    }

    /// Declares a preloaded script.
    #[must_use]
    pub fn preloaded_js(mut self, path: &str) -> Self {
        self.preloaded_js.push(path.to_owned());
        self
    }

    /// Declares a preloaded stylesheet.
    #[must_use]
    pub fn preloaded_css(mut self, path: &str) -> Self {
        self.preloaded_css.push(path.to_owned());
        self
    }

    /// Declares assets in the manifest without writing them to disk.
    #[must_use]
    pub fn without_assets(mut self) -> Self {
        self.write_assets = false;
        self
    }

    /// Adds an arbitrary file relative to the library directory.
    #[must_use]
    pub fn file(mut self, relative: &str, contents: &str) -> Self {
        self.extra_files
            .push((relative.to_owned(), contents.to_owned()));
        self
    }

    /// Overrides the directory name (defaults to `<name>-<major>.<minor>`).
    #[must_use]
    pub fn directory_name(mut self, name: &str) -> Self {
        self.directory_name = Some(name.to_owned());
        self
    }

    /// Returns the `library.json` document this fixture writes.
    #[must_use]
    pub fn manifest_json(&self) -> Value {
        let dependencies: Vec<Value> = self
            .dependencies
            .iter()
            .map(|(name, major, minor)| {
                json!({ "machineName": name, "majorVersion": major, "minorVersion": minor })
            })
            .collect();
        let scripts: Vec<Value> = self
            .preloaded_js
            .iter()
            .map(|path| json!({ "path": path }))
            .collect();
        let styles: Vec<Value> = self
            .preloaded_css
            .iter()
            .map(|path| json!({ "path": path }))
            .collect();
        json!({
            "title": self.machine_name,
            "machineName": self.machine_name,
            "majorVersion": self.major,
            "minorVersion": self.minor,
            "patchVersion": self.patch,
            "runnable": 0,
            "preloadedJs": scripts,
            "preloadedCss": styles,
            "preloadedDependencies": dependencies,
        })
    }

    /// Writes the library below `root` and returns its directory.
    ///
    /// # Errors
    ///
    /// Returns an error if any file cannot be written.
    pub fn write(&self, root: &Utf8Path) -> io::Result<Utf8PathBuf> {
        let name = self.directory_name.clone().unwrap_or_else(|| {
            format!("{}-{}.{}", self.machine_name, self.major, self.minor)
        });
        let directory = root.join(name);
        fs::create_dir_all(&directory)?;
        let manifest = serde_json::to_string_pretty(&self.manifest_json())?;
        fs::write(directory.join("library.json"), manifest)?;

        if self.write_assets {
            for asset in self.preloaded_js.iter().chain(&self.preloaded_css) {
                write_file(&directory, asset, &format!("/* {asset} */"))?;
            }
        }
        for (relative, contents) in &self.extra_files {
            write_file(&directory, relative, contents)?;
        }
        Ok(directory)
    }
}

/// Writes an authored content directory with `h5p.json` and
/// `content/content.json`.
///
/// `dependencies` become the manifest's `preloadedDependencies`; the first
/// entry is used as `mainLibrary`.
///
/// # Errors
///
/// Returns an error if any file cannot be written.
pub fn write_authored_content(
    directory: &Utf8Path,
    title: &str,
    dependencies: &[(&str, u32, u32)],
) -> io::Result<()> {
    let preloaded: Vec<Value> = dependencies
        .iter()
        .map(|(name, major, minor)| {
            json!({ "machineName": name, "majorVersion": major, "minorVersion": minor })
        })
        .collect();
    let main_library = dependencies.first().map_or("", |(name, _, _)| *name);
    let manifest = json!({
        "title": title,
        "language": "en",
        "mainLibrary": main_library,
        "embedTypes": ["iframe"],
        "preloadedDependencies": preloaded,
    });
    write_file(
        directory,
        "h5p.json",
        &serde_json::to_string_pretty(&manifest)?,
    )?;
    write_file(
        directory,
        "content/content.json",
        r#"{"question":"<p>Which is correct?</p>"}"#,
    )
}

/// Writes `contents` to `root/relative`, creating parent directories.
///
/// # Errors
///
/// Returns an error if the file or its parents cannot be created.
pub fn write_file(root: &Utf8Path, relative: &str, contents: &str) -> io::Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}
