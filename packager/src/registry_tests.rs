//! Unit tests for library indexing and closure resolution.

use super::*;
use h5pack_common::test_support::{LibraryFixture, write_file};
use h5pack_common::utf8_path;
use rstest::{fixture, rstest};
use std::fs;
use tempfile::TempDir;

struct LibraryRoot {
    _temp: TempDir,
    root: Utf8PathBuf,
}

impl LibraryRoot {
    fn with(self, fixture: &LibraryFixture) -> Self {
        fixture.write(&self.root).expect("library fixture is written");
        self
    }
}

#[fixture]
fn library_root() -> LibraryRoot {
    let temp = TempDir::new().expect("temp dir creation succeeds");
    let root = utf8_path(temp.path()).expect("temp dir is UTF-8");
    LibraryRoot { _temp: temp, root }
}

/// A matching library depending on two helpers that share a dependency.
fn diamond(root: LibraryRoot) -> LibraryRoot {
    root.with(
        &LibraryFixture::new("H5P.Matching", 1, 2)
            .preloaded_js("dist/matching.js")
            .depends_on("H5P.Question", 1, 5)
            .depends_on("H5P.JoubelUI", 1, 3),
    )
    .with(
        &LibraryFixture::new("H5P.Question", 1, 5)
            .preloaded_js("scripts/question.js")
            .depends_on("H5P.FontIcons", 1, 0),
    )
    .with(
        &LibraryFixture::new("H5P.JoubelUI", 1, 3)
            .preloaded_css("css/joubel.css")
            .depends_on("H5P.FontIcons", 1, 0),
    )
    .with(&LibraryFixture::new("H5P.FontIcons", 1, 0).preloaded_css("styles/icons.css"))
}

fn names(closure: &[LibraryManifest]) -> Vec<String> {
    closure
        .iter()
        .map(|manifest| manifest.descriptor().to_string())
        .collect()
}

#[rstest]
fn build_fails_for_missing_root(library_root: LibraryRoot) {
    let err = RegistryIndex::build(&library_root.root.join("absent")).expect_err("missing root");
    assert!(matches!(err, PackagerError::Configuration { .. }));
}

#[rstest]
fn build_skips_directories_without_manifest(library_root: LibraryRoot) {
    let root = library_root.with(&LibraryFixture::new("H5P.FontIcons", 1, 0));
    fs::create_dir_all(root.root.join("scratch")).expect("mkdir");
    write_file(&root.root, "README.md", "not a library").expect("write");

    let index = RegistryIndex::build(&root.root).expect("index builds");

    assert_eq!(index.len(), 1);
    assert!(!index.is_empty());
}

#[rstest]
fn build_rejects_unparsable_manifest(library_root: LibraryRoot) {
    write_file(&library_root.root, "H5P.Broken-1.0/library.json", "{").expect("write");

    let err = RegistryIndex::build(&library_root.root).expect_err("parse failure");

    assert!(matches!(err, PackagerError::ManifestParse { .. }));
}

#[rstest]
fn versions_are_sorted_newest_first(library_root: LibraryRoot) {
    let root = library_root
        .with(&LibraryFixture::new("H5P.Matching", 1, 0).patch(9))
        .with(&LibraryFixture::new("H5P.Matching", 1, 2).patch(1))
        .with(
            &LibraryFixture::new("H5P.Matching", 1, 2)
                .patch(4)
                .directory_name("H5P.Matching-1.2-hotfix"),
        );

    let index = RegistryIndex::build(&root.root).expect("index builds");
    let versions: Vec<(u32, u32, u32)> = index
        .versions("H5P.Matching")
        .iter()
        .map(LibraryManifest::version)
        .collect();

    assert_eq!(versions, vec![(1, 2, 4), (1, 2, 1), (1, 0, 9)]);
    assert_eq!(
        index.latest("H5P.Matching").expect("latest").version(),
        (1, 2, 4)
    );
    assert_eq!(
        index
            .select(&LibraryDescriptor::new("H5P.Matching", 1, 2))
            .expect("select")
            .patch_version(),
        4
    );
}

#[rstest]
fn select_requires_exact_minor(library_root: LibraryRoot) {
    let root = library_root.with(&LibraryFixture::new("H5P.Matching", 1, 2));
    let index = RegistryIndex::build(&root.root).expect("index builds");

    let err = index
        .select(&LibraryDescriptor::new("H5P.Matching", 1, 3))
        .expect_err("no 1.3");

    assert!(matches!(
        err,
        PackagerError::MissingLibrary { major: 1, minor: 3, ref searched_root, .. }
            if *searched_root == root.root
    ));
}

#[rstest]
fn latest_reports_unknown_library(library_root: LibraryRoot) {
    let index = RegistryIndex::build(&library_root.root).expect("index builds");
    let err = index.latest("H5P.Matching").expect_err("nothing indexed");
    assert!(matches!(err, PackagerError::UnknownLibrary { .. }));
}

#[rstest]
fn closure_is_breadth_first_without_duplicates(library_root: LibraryRoot) {
    let root = diamond(library_root);
    let index = RegistryIndex::build(&root.root).expect("index builds");

    let closure = index
        .resolve_closure(&[LibraryDescriptor::new("H5P.Matching", 1, 2)])
        .expect("closure resolves");

    assert_eq!(
        names(&closure),
        vec![
            "H5P.Matching 1.2",
            "H5P.Question 1.5",
            "H5P.JoubelUI 1.3",
            "H5P.FontIcons 1.0",
        ]
    );
}

#[rstest]
fn closure_is_deterministic(library_root: LibraryRoot) {
    let root = diamond(library_root);
    let registry = LibraryRegistry::new(root.root.clone());
    let initial = [
        LibraryDescriptor::new("H5P.Matching", 1, 2),
        LibraryDescriptor::new("H5P.FontIcons", 1, 0),
    ];

    let first = registry.resolve_closure(&initial).expect("first");
    let second = registry.resolve_closure(&initial).expect("second");

    assert_eq!(first, second);
    assert_eq!(names(&first).len(), 4);
}

#[rstest]
fn closure_tolerates_dependency_cycles(library_root: LibraryRoot) {
    let root = library_root
        .with(&LibraryFixture::new("H5P.A", 1, 0).depends_on("H5P.B", 1, 0))
        .with(&LibraryFixture::new("H5P.B", 1, 0).depends_on("H5P.A", 1, 0));
    let index = RegistryIndex::build(&root.root).expect("index builds");

    let closure = index
        .resolve_closure(&[LibraryDescriptor::new("H5P.A", 1, 0)])
        .expect("closure resolves");

    assert_eq!(names(&closure), vec!["H5P.A 1.0", "H5P.B 1.0"]);
}

#[rstest]
fn closure_fails_on_missing_dependency(library_root: LibraryRoot) {
    let root = library_root.with(&LibraryFixture::new("H5P.A", 1, 0).depends_on("H5P.Gone", 2, 1));
    let index = RegistryIndex::build(&root.root).expect("index builds");

    let err = index
        .resolve_closure(&[LibraryDescriptor::new("H5P.A", 1, 0)])
        .expect_err("missing dependency");

    assert!(matches!(
        err,
        PackagerError::MissingLibrary { ref machine_name, major: 2, minor: 1, .. }
            if machine_name == "H5P.Gone"
    ));
}

#[rstest]
fn deleting_an_asset_fails_closure_naming_that_path(library_root: LibraryRoot) {
    let root = diamond(library_root);
    fs::remove_file(root.root.join("H5P.JoubelUI-1.3/css/joubel.css")).expect("remove asset");
    let index = RegistryIndex::build(&root.root).expect("index builds");

    let err = index
        .resolve_closure(&[LibraryDescriptor::new("H5P.Matching", 1, 2)])
        .expect_err("missing asset");

    match err {
        PackagerError::MissingAssets {
            library_dir,
            missing,
        } => {
            assert_eq!(library_dir, "H5P.JoubelUI-1.3");
            assert_eq!(missing, vec!["css/joubel.css".to_owned()]);
        }
        other => panic!("expected MissingAssets, got {other}"),
    }
}

#[rstest]
fn buildable_libraries_defer_their_asset_check(library_root: LibraryRoot) {
    let root = library_root
        .with(
            &LibraryFixture::new("H5P.MultiChoice", 1, 16)
                .preloaded_js("dist/multichoice.js")
                .depends_on("H5P.Question", 1, 5)
                .file("package.json", r#"{"scripts":{"build":"webpack"}}"#)
                .without_assets(),
        )
        .with(&LibraryFixture::new("H5P.Question", 1, 5).preloaded_js("scripts/question.js"));
    let index = RegistryIndex::build(&root.root).expect("index builds");

    let closure = index
        .resolve_closure(&[LibraryDescriptor::new("H5P.MultiChoice", 1, 16)])
        .expect("unbuilt assets do not block resolution");

    assert_eq!(names(&closure), vec!["H5P.MultiChoice 1.16", "H5P.Question 1.5"]);
}

#[rstest]
fn prebuilt_libraries_still_need_their_assets(library_root: LibraryRoot) {
    let root = library_root.with(
        &LibraryFixture::new("H5P.MultiChoice", 1, 16)
            .preloaded_js("dist/multichoice.js")
            .file("package.json", r#"{"scripts":{"build":"webpack"}}"#)
            .file("dist/other.js", "shipped")
            .without_assets(),
    );
    let index = RegistryIndex::build(&root.root).expect("index builds");

    let err = index
        .resolve_closure(&[LibraryDescriptor::new("H5P.MultiChoice", 1, 16)])
        .expect_err("shipped dist/ lacks the declared asset");

    assert!(matches!(
        err,
        PackagerError::MissingAssets { ref missing, .. } if missing == &["dist/multichoice.js"]
    ));
}

#[rstest]
#[case::escaping("../H5P.Other-1.0/app.js")]
#[case::absolute("/etc/passwd")]
fn escaping_asset_paths_count_as_missing(library_root: LibraryRoot, #[case] asset: &str) {
    let root = library_root.with(
        &LibraryFixture::new("H5P.A", 1, 0)
            .preloaded_js(asset)
            .without_assets(),
    );
    let index = RegistryIndex::build(&root.root).expect("index builds");
    let manifest = index
        .select(&LibraryDescriptor::new("H5P.A", 1, 0))
        .expect("select");

    let err = ensure_assets(manifest).expect_err("escaping asset");

    assert!(matches!(err, PackagerError::MissingAssets { ref missing, .. } if missing == &[asset]));
}

#[rstest]
fn registry_reload_picks_up_new_libraries(library_root: LibraryRoot) {
    let root = library_root.with(&LibraryFixture::new("H5P.A", 1, 0));
    let registry = LibraryRegistry::new(root.root.clone());
    assert_eq!(registry.index().expect("index").len(), 1);

    LibraryFixture::new("H5P.B", 1, 0)
        .write(&root.root)
        .expect("second library");

    assert_eq!(
        registry.index().expect("memoized index").len(),
        1,
        "index is not patched incrementally"
    );
    assert_eq!(registry.reload().expect("reload").len(), 2);
    assert!(
        registry
            .select(&LibraryDescriptor::new("H5P.B", 1, 0))
            .is_ok()
    );
}

#[rstest]
fn registry_shares_one_index_between_callers(library_root: LibraryRoot) {
    let root = library_root.with(&LibraryFixture::new("H5P.A", 1, 0));
    let registry = LibraryRegistry::new(root.root.clone());

    let first = registry.index().expect("index");
    let second = registry.index().expect("index");

    assert!(Arc::ptr_eq(&first, &second));
}
