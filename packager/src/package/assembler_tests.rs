//! Unit tests for package assembly.

use super::*;
use crate::test_utils::{ExpectedCall, StubExecutor, failure_output};
use crate::toolchain::BuildToolchain;
use h5pack_common::test_support::{LibraryFixture, write_authored_content, write_file};
use rstest::{fixture, rstest};
use serde_json::Value;
use std::io::{Cursor, Read};
use tempfile::TempDir;
use zip::ZipArchive;

struct Workspace {
    _temp: TempDir,
    root: Utf8PathBuf,
    libraries: Utf8PathBuf,
    packager: Packager,
}

#[fixture]
fn workspace() -> Workspace {
    let temp = TempDir::new().expect("temp dir creation succeeds");
    let root = utf8_path(temp.path()).expect("temp dir is UTF-8");
    let libraries = root.join("libraries");

    for fixture in [
        LibraryFixture::new("H5P.Matching", 1, 0)
            .preloaded_js("dist/matching.js")
            .depends_on("H5P.Question", 1, 5),
        LibraryFixture::new("H5P.Matching", 1, 2)
            .preloaded_js("dist/matching.js")
            .preloaded_css("dist/matching.css")
            .depends_on("H5P.Question", 1, 5)
            .depends_on("H5P.FontIcons", 1, 0),
        LibraryFixture::new("H5P.Question", 1, 5)
            .preloaded_js("scripts/question.js")
            .depends_on("H5P.FontIcons", 1, 0),
        LibraryFixture::new("H5P.FontIcons", 1, 0).preloaded_css("styles/icons.css"),
    ] {
        fixture.write(&libraries).expect("library is written");
    }

    let registry = Arc::new(LibraryRegistry::new(libraries.clone()));
    let toolchain = BuildToolchain::new("npm", Arc::new(StubExecutor::default()));
    let cache = Arc::new(BuildCache::open(root.join("cache"), toolchain).expect("cache opens"));
    Workspace {
        packager: Packager::new(registry, cache),
        libraries,
        root,
        _temp: temp,
    }
}

fn entry_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("archive reads");
    (0..archive.len())
        .map(|index| archive.by_index(index).expect("entry").name().to_owned())
        .collect()
}

fn read_json(bytes: &[u8], name: &str) -> Value {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("archive reads");
    let mut json = String::new();
    archive
        .by_name(name)
        .expect("entry exists")
        .read_to_string(&mut json)
        .expect("entry reads");
    serde_json::from_str(&json).expect("entry is JSON")
}

fn spec(title: &str) -> MatchingActivitySpec {
    MatchingActivitySpec::from_table(
        title,
        "Match each policy term to its meaning.",
        "text",
        "Sterilization,Process that destroys all microbial life\nPPE,Protective gear worn to minimize exposure",
    )
    .expect("valid table")
}

#[rstest]
fn matching_activity_uses_newest_library(workspace: Workspace) {
    let output = workspace
        .packager
        .package_matching_activity(&spec("GNPEC Policy Match"))
        .expect("package builds");

    assert_eq!(output.filename, "gnpec-policy-match.h5p");
    assert_eq!(
        output.libraries,
        vec![
            LibraryDescriptor::new("H5P.Matching", 1, 2),
            LibraryDescriptor::new("H5P.Question", 1, 5),
            LibraryDescriptor::new("H5P.FontIcons", 1, 0),
        ]
    );

    let manifest = read_json(&output.bytes, "h5p.json");
    assert_eq!(manifest["mainLibrary"], "H5P.Matching");
    assert_eq!(manifest["title"], "GNPEC Policy Match");
    assert_eq!(manifest["preloadedDependencies"][0]["minorVersion"], 2);

    let content = read_json(&output.bytes, "content/content.json");
    assert_eq!(content["pairs"].as_array().map(Vec::len), Some(2));
    assert_eq!(content["pairs"][1]["source"], "PPE");
    assert_eq!(content["behaviour"]["passPercentage"], 100);
}

#[rstest]
fn archive_layout_has_one_directory_per_library(workspace: Workspace) {
    let output = workspace
        .packager
        .package_matching_activity(&spec("Layout"))
        .expect("package builds");

    let names = entry_names(&output.bytes);
    let mut roots: Vec<&str> = names
        .iter()
        .filter_map(|name| name.split('/').next())
        .collect();
    roots.dedup();

    assert_eq!(
        roots,
        vec![
            "H5P.FontIcons-1.0",
            "H5P.Matching-1.2",
            "H5P.Question-1.5",
            "content",
            "h5p.json",
        ]
    );
    assert_eq!(names.iter().filter(|name| *name == "h5p.json").count(), 1);
    assert!(names.contains(&"H5P.Matching-1.2/dist/matching.css".to_owned()));
    assert!(names.iter().all(|name| !name.ends_with('/')));
}

#[rstest]
fn duplicate_closure_entries_are_written_once(workspace: Workspace) {
    let index = workspace.packager.registry().index().expect("index");
    let font = index
        .select(&LibraryDescriptor::new("H5P.FontIcons", 1, 0))
        .expect("select")
        .clone();
    let package = ContentPackage {
        manifest: PackageManifest::new("Dupes", "H5P.FontIcons", Vec::new()),
        content_files: vec![(Utf8PathBuf::from("content.json"), b"{}".to_vec())],
        extra_top_level_files: Vec::new(),
    };

    let output = workspace
        .packager
        .assemble_package(&package, &[font.clone(), font])
        .expect("package builds");

    assert_eq!(output.libraries.len(), 1);
    let library_json = entry_names(&output.bytes)
        .into_iter()
        .filter(|name| name == "H5P.FontIcons-1.0/library.json")
        .count();
    assert_eq!(library_json, 1);
}

#[rstest]
fn repeated_assembly_is_byte_identical(workspace: Workspace) {
    let first = workspace
        .packager
        .package_matching_activity(&spec("Repeat"))
        .expect("first package");
    let second = workspace
        .packager
        .package_matching_activity(&spec("Repeat"))
        .expect("second package");

    assert_eq!(first.bytes, second.bytes);
    assert!(
        second
            .build_outcomes
            .iter()
            .all(|(_, outcome)| outcome.status == BuildStatus::Cached)
    );
}

#[rstest]
fn authored_content_passes_top_level_files_through(workspace: Workspace) {
    let authored = workspace.root.join("authored");
    write_authored_content(&authored, "Hand Hygiene", &[("H5P.Question", 1, 5)])
        .expect("authored content");
    write_file(&authored, "content/images/sink.png", "png").expect("image");
    write_file(&authored, "README.txt", "notes").expect("readme");

    let output = workspace
        .packager
        .package_authored_content(&authored)
        .expect("package builds");

    let names = entry_names(&output.bytes);
    assert!(names.contains(&"README.txt".to_owned()));
    assert!(names.contains(&"content/images/sink.png".to_owned()));
    assert!(names.contains(&"H5P.FontIcons-1.0/styles/icons.css".to_owned()));
    assert_eq!(output.filename, "hand-hygiene.h5p");
    assert_eq!(read_json(&output.bytes, "h5p.json")["language"], "en");
}

#[rstest]
fn missing_asset_aborts_before_output(workspace: Workspace) {
    fs::remove_file(workspace.libraries.join("H5P.Question-1.5/scripts/question.js"))
        .expect("remove asset");
    workspace.packager.registry().reload().expect("reload");

    let err = workspace
        .packager
        .package_matching_activity(&spec("Broken"))
        .expect_err("missing asset");

    assert!(matches!(
        err,
        PackagerError::MissingAssets { ref missing, .. } if missing == &["scripts/question.js"]
    ));
}

fn buildable_packager(workspace: &Workspace, calls: Vec<ExpectedCall>) -> Packager {
    LibraryFixture::new("H5P.MultiChoice", 1, 16)
        .preloaded_js("dist/multichoice.js")
        .without_assets()
        .depends_on("H5P.Question", 1, 5)
        .file("package.json", r#"{"scripts":{"build":"webpack"}}"#)
        .write(&workspace.libraries)
        .expect("buildable library");
    let toolchain = BuildToolchain::new("npm", Arc::new(StubExecutor::new(calls)));
    let cache = BuildCache::open(workspace.root.join("build-cache"), toolchain).expect("cache opens");
    Packager::new(
        Arc::new(LibraryRegistry::new(workspace.libraries.clone())),
        Arc::new(cache),
    )
}

#[rstest]
fn built_assets_satisfy_the_manifest(workspace: Workspace) {
    let packager = buildable_packager(
        &workspace,
        vec![
            ExpectedCall::install(),
            ExpectedCall::build_writing(&[("dist/multichoice.js", "built")]),
        ],
    );
    let authored = workspace.root.join("authored");
    write_authored_content(&authored, "Quiz", &[("H5P.MultiChoice", 1, 16)]).expect("authored");

    let output = packager
        .package_authored_content(&authored)
        .expect("built library packages");

    assert!(entry_names(&output.bytes).contains(&"H5P.MultiChoice-1.16/dist/multichoice.js".to_owned()));
}

#[rstest]
fn failed_build_reports_missing_assets(workspace: Workspace) {
    let packager = buildable_packager(
        &workspace,
        vec![ExpectedCall::new(&["install"], Ok(failure_output("ERESOLVE")))],
    );
    let authored = workspace.root.join("authored");
    write_authored_content(&authored, "Quiz", &[("H5P.MultiChoice", 1, 16)]).expect("authored");

    let err = packager
        .package_authored_content(&authored)
        .expect_err("unbuilt library lacks its asset");

    assert!(matches!(
        err,
        PackagerError::MissingAssets { ref library_dir, ref missing }
            if library_dir == "H5P.MultiChoice-1.16" && missing == &["dist/multichoice.js"]
    ));
}

#[rstest]
fn unknown_matching_library_is_reported(workspace: Workspace) {
    let packager = workspace.packager.clone().with_matching_library("H5P.DragText");

    let err = packager
        .package_matching_activity(&spec("Quiz"))
        .expect_err("no such library");

    assert!(matches!(err, PackagerError::UnknownLibrary { ref machine_name, .. } if machine_name == "H5P.DragText"));
}

#[rstest]
fn authored_content_with_missing_dependency_fails(workspace: Workspace) {
    let authored = workspace.root.join("authored");
    write_authored_content(&authored, "Quiz", &[("H5P.MultiChoice", 1, 16)]).expect("authored");

    let err = workspace
        .packager
        .package_authored_content(&authored)
        .expect_err("missing dependency");

    assert!(matches!(err, PackagerError::MissingLibrary { .. }));
}

#[rstest]
#[case::no_document(vec![("images/a.png", "png")], vec![])]
#[case::escaping_content(vec![("content.json", "{}"), ("../h5p.json", "{}")], vec![])]
#[case::manifest_override(vec![("content.json", "{}")], vec![("h5p.json", "{}")])]
#[case::content_override(vec![("content.json", "{}")], vec![("content/extra.json", "{}")])]
fn invalid_payloads_are_rejected(
    workspace: Workspace,
    #[case] content: Vec<(&str, &str)>,
    #[case] extras: Vec<(&str, &str)>,
) {
    let to_files = |entries: Vec<(&str, &str)>| -> Vec<(Utf8PathBuf, Vec<u8>)> {
        entries
            .into_iter()
            .map(|(path, body)| (Utf8PathBuf::from(path), body.as_bytes().to_vec()))
            .collect()
    };
    let package = ContentPackage {
        manifest: PackageManifest::new("Bad", "H5P.FontIcons", Vec::new()),
        content_files: to_files(content),
        extra_top_level_files: to_files(extras),
    };

    let err = workspace
        .packager
        .assemble_package(&package, &[])
        .expect_err("invalid payload");

    assert!(matches!(err, PackagerError::InvalidContent { .. }), "{err}");
}
