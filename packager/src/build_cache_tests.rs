//! Unit tests for the build cache.

use super::*;
use crate::test_utils::{ExpectedCall, StubExecutor, failure_output};
use h5pack_common::test_support::LibraryFixture;
use rstest::{fixture, rstest};
use std::thread;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

struct CacheEnv {
    _temp: TempDir,
    libraries: Utf8PathBuf,
    cache_dir: Utf8PathBuf,
}

impl CacheEnv {
    fn library(&self, fixture: &LibraryFixture) -> LibraryManifest {
        let dir = fixture.write(&self.libraries).expect("library is written");
        LibraryManifest::load(&dir)
            .expect("manifest parses")
            .expect("manifest exists")
    }

    fn cache(&self, executor: StubExecutor) -> (BuildCache, Arc<StubExecutor>) {
        let executor = Arc::new(executor);
        let toolchain = BuildToolchain::new("npm", Arc::clone(&executor) as _);
        let cache = BuildCache::open(self.cache_dir.clone(), toolchain).expect("cache opens");
        (cache, executor)
    }
}

#[fixture]
fn env() -> CacheEnv {
    let temp = TempDir::new().expect("temp dir creation succeeds");
    let root = utf8_path(temp.path()).expect("temp dir is UTF-8");
    CacheEnv {
        libraries: root.join("libraries"),
        cache_dir: root.join("cache"),
        _temp: temp,
    }
}

fn touch_future(path: &Utf8Path) {
    let file = fs::File::options()
        .write(true)
        .open(path)
        .expect("file opens");
    file.set_modified(SystemTime::now() + Duration::from_secs(120))
        .expect("mtime is set");
}

fn buildable() -> LibraryFixture {
    LibraryFixture::new("H5P.Matching", 1, 2)
        .preloaded_js("dist/matching.js")
        .without_assets()
        .file(
            "package.json",
            r#"{"name":"h5p-matching","scripts":{"build":"webpack"}}"#,
        )
        .file("src/app.js", "export default 1;")
}

#[rstest]
fn plain_library_is_copied_then_cached(env: CacheEnv) {
    let manifest = env.library(&LibraryFixture::new("H5P.FontIcons", 1, 0).preloaded_css("icons.css"));
    let (cache, executor) = env.cache(StubExecutor::default());

    let first = cache.get_or_build(&manifest).expect("first build");
    let second = cache.get_or_build(&manifest).expect("second build");

    assert_eq!(first.status, BuildStatus::Copied);
    assert_eq!(second.status, BuildStatus::Cached);
    assert_eq!(first.path, env.cache_dir.join("H5P.FontIcons-1.0"));
    assert_eq!(second.path, first.path);
    assert!(first.path.join("icons.css").is_file());
    assert!(first.path.join("library.json").is_file());
    executor.assert_finished();
}

#[rstest]
fn index_is_persisted_across_instances(env: CacheEnv) {
    let manifest = env.library(&LibraryFixture::new("H5P.FontIcons", 1, 0));
    let (cache, _) = env.cache(StubExecutor::default());
    cache.get_or_build(&manifest).expect("first build");
    drop(cache);

    assert!(env.cache_dir.join(INDEX_FILE).is_file());
    let (reopened, _) = env.cache(StubExecutor::default());
    let entry = reopened.entry("H5P.FontIcons-1.0").expect("entry persisted");
    assert_eq!(entry.cached_path, env.cache_dir.join("H5P.FontIcons-1.0"));

    let outcome = reopened.get_or_build(&manifest).expect("cached build");
    assert_eq!(outcome.status, BuildStatus::Cached);
}

#[rstest]
fn source_change_invalidates_entry(env: CacheEnv) {
    let manifest = env.library(
        &LibraryFixture::new("H5P.FontIcons", 1, 0).preloaded_css("icons.css"),
    );
    let (cache, _) = env.cache(StubExecutor::default());
    cache.get_or_build(&manifest).expect("first build");

    fs::write(manifest.directory().join("icons.css"), "/* v2 */").expect("edit source");
    touch_future(&manifest.directory().join("icons.css"));
    let outcome = cache.get_or_build(&manifest).expect("rebuild");

    assert_eq!(outcome.status, BuildStatus::Copied);
    assert_eq!(
        fs::read_to_string(outcome.path.join("icons.css")).expect("read"),
        "/* v2 */"
    );
}

#[rstest]
fn deleted_cache_directory_is_rebuilt(env: CacheEnv) {
    let manifest = env.library(&LibraryFixture::new("H5P.FontIcons", 1, 0));
    let (cache, _) = env.cache(StubExecutor::default());
    let first = cache.get_or_build(&manifest).expect("first build");

    fs::remove_dir_all(&first.path).expect("remove cached copy");

    let outcome = cache.get_or_build(&manifest).expect("rebuild");
    assert_eq!(outcome.status, BuildStatus::Copied);
    assert!(outcome.path.is_dir());
}

#[rstest]
fn build_script_runs_toolchain_and_strips_dev_trees(env: CacheEnv) {
    let manifest = env.library(&buildable());
    let (cache, executor) = env.cache(StubExecutor::new(vec![
        ExpectedCall::install(),
        ExpectedCall::build_writing(&[
            ("dist/matching.js", "/* bundled */"),
            ("node_modules/webpack/index.js", "module.exports = {};"),
        ]),
    ]));

    let outcome = cache.get_or_build(&manifest).expect("build");

    assert_eq!(outcome.status, BuildStatus::Built);
    assert!(outcome.path.join("dist/matching.js").is_file());
    assert!(!outcome.path.join("node_modules").exists());
    assert!(
        !manifest.directory().join("dist").exists(),
        "the source tree is never built in place"
    );
    executor.assert_finished();
}

#[rstest]
fn prebuilt_dist_skips_toolchain(env: CacheEnv) {
    let manifest = env.library(
        &buildable()
            .file("dist/matching.js", "/* shipped */")
            .file(".git/HEAD", "ref: refs/heads/main"),
    );
    let (cache, executor) = env.cache(StubExecutor::default());

    let outcome = cache.get_or_build(&manifest).expect("copy");

    assert_eq!(outcome.status, BuildStatus::Copied);
    assert!(!outcome.path.join(".git").exists());
    executor.assert_finished();
}

#[rstest]
fn toolchain_failure_degrades_and_caches_source(env: CacheEnv) {
    let manifest = env.library(&buildable());
    let (cache, executor) = env.cache(StubExecutor::new(vec![ExpectedCall::new(
        &["install"],
        Ok(failure_output("npm ERR! code ENOTFOUND")),
    )]));

    let outcome = cache.get_or_build(&manifest).expect("degraded build");

    match &outcome.status {
        BuildStatus::Degraded { reason } => assert!(reason.contains("ENOTFOUND"), "{reason}"),
        other => panic!("expected degraded build, got {other}"),
    }
    assert!(outcome.path.join("src/app.js").is_file());
    assert!(!outcome.path.join("dist").exists());
    executor.assert_finished();

    let again = cache.get_or_build(&manifest).expect("cached");
    assert_eq!(again.status, BuildStatus::Cached);
}

#[rstest]
fn spawn_failure_degrades(env: CacheEnv) {
    let manifest = env.library(&buildable());
    let (cache, _) = env.cache(StubExecutor::new(vec![ExpectedCall::new(
        &["install"],
        Err(io::Error::new(io::ErrorKind::NotFound, "npm not installed")),
    )]));

    let outcome = cache.get_or_build(&manifest).expect("degraded build");

    assert!(matches!(outcome.status, BuildStatus::Degraded { .. }));
}

#[rstest]
fn scratch_workspaces_do_not_linger(env: CacheEnv) {
    let manifest = env.library(&LibraryFixture::new("H5P.FontIcons", 1, 0));
    let (cache, _) = env.cache(StubExecutor::default());
    cache.get_or_build(&manifest).expect("build");

    let names: Vec<String> = fs::read_dir(&env.cache_dir)
        .expect("list cache")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();

    assert!(
        names.iter().all(|name| !name.starts_with(".scratch-")),
        "{names:?}"
    );
}

#[rstest]
fn concurrent_requests_build_once(env: CacheEnv) {
    let manifest = env.library(&LibraryFixture::new("H5P.FontIcons", 1, 0));
    let (cache, _) = env.cache(StubExecutor::default());
    let cache = Arc::new(cache);

    let statuses: Vec<BuildStatus> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let manifest = &manifest;
                scope.spawn(move || cache.get_or_build(manifest).expect("build").status)
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread completes"))
            .collect()
    });

    let copied = statuses
        .iter()
        .filter(|status| **status == BuildStatus::Copied)
        .count();
    assert_eq!(copied, 1, "{statuses:?}");
}

#[rstest]
fn export_copies_the_cached_library(env: CacheEnv) {
    let manifest = env.library(
        &LibraryFixture::new("H5P.FontIcons", 1, 0).preloaded_css("styles/icons.css"),
    );
    let (cache, _) = env.cache(StubExecutor::default());
    let destination = env.cache_dir.with_file_name("bundle").join("H5P.FontIcons-1.0");

    let outcome = cache.export(&manifest, &destination).expect("export");

    assert_eq!(outcome.status, BuildStatus::Copied);
    assert!(destination.join("styles/icons.css").is_file());
    assert!(destination.join("library.json").is_file());
}

#[rstest]
fn export_checks_assets_of_the_built_copy(env: CacheEnv) {
    let manifest = env.library(&buildable());
    let (cache, executor) = env.cache(StubExecutor::new(vec![
        ExpectedCall::install(),
        ExpectedCall::build_writing(&[("dist/other.js", "1")]),
    ]));
    let destination = env.cache_dir.with_file_name("bundle").join("H5P.Matching-1.2");

    let err = cache
        .export(&manifest, &destination)
        .expect_err("built copy lacks the declared asset");

    executor.assert_finished();
    match err {
        crate::PackagerError::MissingAssets { missing, .. } => {
            assert_eq!(missing, vec!["dist/matching.js".to_owned()]);
        }
        other => panic!("expected missing assets, got {other:?}"),
    }
    assert!(!destination.exists());
}

#[rstest]
fn exports_are_complete_while_the_source_changes(env: CacheEnv) {
    let manifest = env.library(
        &LibraryFixture::new("H5P.FontIcons", 1, 0)
            .preloaded_css("styles/icons.css")
            .file("fonts/a.woff", "a")
            .file("fonts/b.woff", "b")
            .file("fonts/c.woff", "c"),
    );
    let (cache, _) = env.cache(StubExecutor::default());
    let bundles = env.cache_dir.with_file_name("bundles");
    let edited = manifest.directory().join("fonts/a.woff");

    thread::scope(|scope| {
        scope.spawn(|| {
            for round in 1..=20_u64 {
                let file = fs::File::options()
                    .write(true)
                    .open(&edited)
                    .expect("file opens");
                file.set_modified(SystemTime::now() + Duration::from_secs(round * 60))
                    .expect("mtime is set");
                drop(file);
                cache.get_or_build(&manifest).expect("rebuild");
            }
        });
        for round in 0..20 {
            let destination = bundles.join(round.to_string());
            cache.export(&manifest, &destination).expect("export");
            for file in ["library.json", "styles/icons.css", "fonts/a.woff", "fonts/c.woff"] {
                assert!(destination.join(file).is_file(), "{destination}/{file}");
            }
        }
    });
}

#[rstest]
#[case::build_script(r#"{"scripts":{"build":"rollup -c"}}"#, false, true)]
#[case::with_dist(r#"{"scripts":{"build":"rollup -c"}}"#, true, false)]
#[case::no_build_script(r#"{"scripts":{"test":"jest"}}"#, false, false)]
#[case::blank_build_script(r#"{"scripts":{"build":"  "}}"#, false, false)]
#[case::unparsable("{", false, false)]
fn requires_build_cases(
    env: CacheEnv,
    #[case] package_json: &str,
    #[case] has_dist: bool,
    #[case] expected: bool,
) {
    let dir = env.libraries.join("candidate");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("package.json"), package_json).expect("write package.json");
    if has_dist {
        fs::create_dir_all(dir.join("dist")).expect("mkdir dist");
    }

    assert_eq!(requires_build(&dir), expected);
}

#[rstest]
fn corrupt_index_is_discarded(env: CacheEnv) {
    fs::create_dir_all(&env.cache_dir).expect("mkdir");
    fs::write(env.cache_dir.join(INDEX_FILE), "not json").expect("write");

    let (cache, _) = env.cache(StubExecutor::default());

    assert!(cache.entry("H5P.FontIcons-1.0").is_none());
}
