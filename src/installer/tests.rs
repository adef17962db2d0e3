use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::TempDir;

use crate::cache::PackageCache;
use crate::core::{PantryError, Result};
use crate::installer::{BatchOptions, BatchReport, InstallEngine, InstallOutcome, MAX_WORKERS};
use crate::lockfile::LOCKFILE_NAME;
use crate::models::{DepType, DependencyRecord, PackageSource, PackageSpec};
use crate::registry::{Fetcher, MaterializedPackage, PackageRecord, PackageRegistry, ResolvedPackage};

/// Resolves any name to `<name>@1.0.0` except names starting with `missing`.
struct StubRegistry;

impl PackageRegistry for StubRegistry {
    fn lookup(&self, name: &str) -> Option<PackageRecord> {
        let _ = name;
        None
    }

    fn resolve(&self, spec: &PackageSpec) -> Result<ResolvedPackage> {
        if spec.name.starts_with("missing") {
            return Err(PantryError::PackageNotFoundInRegistry { name: spec.name.clone() });
        }
        Ok(ResolvedPackage {
            name: spec.name.clone(),
            version: "1.0.0".to_string(),
            fetch_url: format!("https://example.invalid/{}.tar.gz", spec.name),
            programs: vec![spec.name.clone()],
        })
    }
}

/// Fabricates a `bin/<name>` tree, tracking call counts and peak
/// concurrency.
struct StubFetcher {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
}

impl StubFetcher {
    fn new(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay,
        }
    }
}

impl Fetcher for StubFetcher {
    fn materialize(&self, pkg: &ResolvedPackage, staging_dir: &Path) -> Result<MaterializedPackage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let root = staging_dir.join("unpacked");
        fs::create_dir_all(root.join("bin"))?;
        fs::write(root.join("bin").join(&pkg.name), "#!/bin/sh\n")?;
        Ok(MaterializedPackage {
            unpacked_root: root,
            integrity: format!("sha256:stub-{}", pkg.name),
        })
    }
}

struct Rig {
    _tmp: TempDir,
    engine: InstallEngine,
    fetcher: Arc<StubFetcher>,
    project: PathBuf,
}

fn rig_with_delay(delay: Duration) -> Rig {
    let tmp = TempDir::new().unwrap();
    let home = tmp.path().join("home");
    let cache = Arc::new(PackageCache::open(home.join("cache/packages")).unwrap());
    let fetcher = Arc::new(StubFetcher::new(delay));
    let engine = InstallEngine::with_collaborators(
        home,
        cache,
        Arc::new(StubRegistry),
        Arc::clone(&fetcher) as Arc<dyn Fetcher>,
    );
    let project = tmp.path().join("proj");
    fs::create_dir_all(&project).unwrap();
    Rig { _tmp: tmp, engine, fetcher, project }
}

fn rig() -> Rig {
    rig_with_delay(Duration::ZERO)
}

fn dep(name: &str, version: &str) -> DependencyRecord {
    DependencyRecord {
        name: name.to_string(),
        version: version.to_string(),
        dep_type: DepType::Normal,
        github_ref: None,
    }
}

fn dev_dep(name: &str, version: &str) -> DependencyRecord {
    DependencyRecord { dep_type: DepType::Dev, ..dep(name, version) }
}

fn peer_dep(name: &str, version: &str) -> DependencyRecord {
    DependencyRecord { dep_type: DepType::Peer, ..dep(name, version) }
}

fn quiet() -> BatchOptions {
    BatchOptions { quiet: true, ..BatchOptions::default() }
}

async fn run(rig: &Rig, deps: &[DependencyRecord], options: &BatchOptions) -> BatchReport {
    let manifest = rig.project.join("deps.yaml");
    if !manifest.exists() {
        fs::write(&manifest, "# test manifest\n").unwrap();
    }
    rig.engine.install_batch(&rig.project, Some(&manifest), deps, options).await.unwrap()
}

#[test]
fn filter_table() {
    let deps = vec![dep("a", "1"), dev_dep("b", "1"), peer_dep("c", "1")];

    let default = InstallEngine::filter_deps(&deps, &BatchOptions::default());
    assert_eq!(names(&default), ["a", "b"]);

    let with_peer =
        InstallEngine::filter_deps(&deps, &BatchOptions { include_peer: true, ..Default::default() });
    assert_eq!(names(&with_peer), ["a", "b", "c"]);

    let production =
        InstallEngine::filter_deps(&deps, &BatchOptions { production: true, ..Default::default() });
    assert_eq!(names(&production), ["a"]);

    let production_peer = InstallEngine::filter_deps(
        &deps,
        &BatchOptions { production: true, include_peer: true, ..Default::default() },
    );
    assert_eq!(names(&production_peer), ["a", "c"]);

    let dev_only =
        InstallEngine::filter_deps(&deps, &BatchOptions { dev_only: true, ..Default::default() });
    assert_eq!(names(&dev_only), ["b"]);

    let dev_only_peer = InstallEngine::filter_deps(
        &deps,
        &BatchOptions { dev_only: true, include_peer: true, ..Default::default() },
    );
    assert_eq!(names(&dev_only_peer), ["b"]);
}

fn names(deps: &[DependencyRecord]) -> Vec<&str> {
    deps.iter().map(|d| d.name.as_str()).collect()
}

#[tokio::test]
async fn single_dep_batch_installs_and_locks() {
    let rig = rig();
    let report = run(&rig, &[dep("node", "22")], &quiet()).await;

    assert_eq!(report.results.len(), 1);
    assert!(report.results[0].is_success());
    assert!(report.exit_ok());
    assert!(report.env_bin.join("node").exists());

    assert!(report.lockfile_written);
    let freezer = rig.project.join(LOCKFILE_NAME);
    assert!(freezer.exists());
    assert_eq!(report.lockfile.len(), 1);
    let entry = report.lockfile.get("node@1.0.0").unwrap();
    assert_eq!(entry.source, PackageSource::Registry);
    assert_eq!(entry.integrity.as_deref(), Some("sha256:stub-node"));
}

#[tokio::test]
async fn results_stay_in_manifest_order() {
    let rig = rig();
    let deps =
        vec![dep("zeta", "1"), dep("missing-one", "1"), dep("alpha", "1"), dep("beta", "1")];
    let report = run(&rig, &deps, &quiet()).await;

    assert_eq!(report.results.len(), 4);
    for (i, result) in report.results.iter().enumerate() {
        match result {
            InstallOutcome::Installed { package, .. } => {
                assert_eq!(package.name, deps[i].name);
            }
            InstallOutcome::Failed { name, .. } => {
                assert_eq!(name, &deps[i].name);
                assert_eq!(i, 1);
            }
            _ => panic!("unexpected outcome in slot {i}"),
        }
    }
    assert_eq!(report.successes() + report.failures() + report.skipped_local(), 4);

    // Lockfile preserves manifest order, failed slot omitted
    let keys: Vec<String> = report.lockfile.packages.iter().map(|e| e.key()).collect();
    assert_eq!(keys, ["zeta@1.0.0", "alpha@1.0.0", "beta@1.0.0"]);
}

#[tokio::test]
async fn worker_pool_caps_at_four() {
    let rig = rig_with_delay(Duration::from_millis(40));
    let deps: Vec<DependencyRecord> =
        (0..8).map(|i| dep(&format!("pkg{i}"), "1")).collect();
    let report = run(&rig, &deps, &quiet()).await;

    assert_eq!(report.successes(), 8);
    assert_eq!(rig.fetcher.calls.load(Ordering::SeqCst), 8);
    let peak = rig.fetcher.peak.load(Ordering::SeqCst);
    assert!(peak <= MAX_WORKERS, "peak concurrency {peak} exceeded cap");
}

#[tokio::test]
async fn duplicate_dep_fetches_once() {
    let rig = rig_with_delay(Duration::from_millis(40));
    // Same package from the normal and dev sections
    let deps = vec![dep("tool", "1"), dev_dep("tool", "1")];
    let report = run(&rig, &deps, &quiet()).await;

    assert_eq!(report.successes(), 2);
    assert_eq!(
        rig.fetcher.calls.load(Ordering::SeqCst),
        1,
        "second worker must observe the installing stack or the cache"
    );
    // One lockfile row; the duplicate key is dropped
    assert_eq!(report.lockfile.len(), 1);
}

#[tokio::test]
async fn local_dep_is_finalized_with_symlinks() {
    let rig = rig();
    let vendor = rig.project.join("vendor/mylib");
    fs::create_dir_all(vendor.join("src")).unwrap();

    let report = run(&rig, &[dep("local:mylib", "./vendor/mylib")], &quiet()).await;

    assert_eq!(report.skipped_local(), 1);
    assert_eq!(report.failures(), 0);

    let module_link = rig.project.join("pantry_modules/mylib/src");
    assert_eq!(fs::read_link(&module_link).unwrap(), vendor.join("src"));
    let bin_link = report.env_bin.join("mylib");
    assert_eq!(fs::read_link(&bin_link).unwrap(), vendor);

    let entry = report.lockfile.get("mylib@./vendor/mylib").unwrap();
    assert_eq!(entry.source, PackageSource::Local);
    assert_eq!(entry.url.as_deref(), Some("./vendor/mylib"));
}

#[tokio::test]
async fn missing_local_target_warns_but_does_not_abort() {
    let rig = rig();
    let deps = vec![dep("node", "22"), dep("local:ghost", "./vendor/ghost")];
    let report = run(&rig, &deps, &quiet()).await;

    assert_eq!(report.successes(), 1);
    assert_eq!(report.failures(), 1);
    assert!(report.exit_ok(), "local warnings must not fail the batch");
    let lines = report.failure_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("ghost@./vendor/ghost ("));
}

#[tokio::test]
async fn unknown_package_reported_and_absent_from_lockfile() {
    let rig = rig();
    let report = run(&rig, &[dep("missing-pkg", "1.0.0")], &quiet()).await;

    assert_eq!(report.failures(), 1);
    assert!(!report.any_usable());
    assert!(report.lockfile.is_empty());
    assert_eq!(
        report.failure_lines(),
        ["missing-pkg@1.0.0 (package 'missing-pkg' not found in registry)"]
    );
    assert!(!report.env_bin.join("missing-pkg").exists());
}

#[tokio::test]
async fn repeat_batch_produces_identical_freezer_bytes() {
    let rig = rig();
    let deps = vec![dep("node", "22"), dep("jq", "1")];

    run(&rig, &deps, &quiet()).await;
    let first = fs::read(rig.project.join(LOCKFILE_NAME)).unwrap();
    let report = run(&rig, &deps, &quiet()).await;
    let second = fs::read(rig.project.join(LOCKFILE_NAME)).unwrap();

    assert_eq!(first, second);
    // Second run came entirely from the package cache
    assert_eq!(report.cached_count(), 2);
    assert_eq!(rig.fetcher.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn env_dir_tracks_manifest_content() {
    let rig = rig();
    let manifest = rig.project.join("deps.yaml");
    fs::write(&manifest, "one\n").unwrap();
    let first = rig
        .engine
        .install_batch(&rig.project, Some(&manifest), &[dep("node", "22")], &quiet())
        .await
        .unwrap();

    fs::write(&manifest, "two\n").unwrap();
    let second = rig
        .engine
        .install_batch(&rig.project, Some(&manifest), &[dep("node", "22")], &quiet())
        .await
        .unwrap();

    assert_ne!(first.env_dir, second.env_dir);
    // Same project prefix, different manifest suffix
    let prefix = |p: &std::path::Path| {
        p.file_name().unwrap().to_string_lossy().split_once("-d").unwrap().0.to_string()
    };
    assert_eq!(prefix(&first.env_dir), prefix(&second.env_dir));
}

#[tokio::test]
async fn lockfile_write_failure_is_warning() {
    let rig = rig();
    let manifest = rig.project.join("deps.yaml");
    fs::write(&manifest, "# test\n").unwrap();
    // Occupy the lockfile path with a directory so the rename fails
    fs::create_dir(rig.project.join(LOCKFILE_NAME)).unwrap();

    let report = rig
        .engine
        .install_batch(&rig.project, Some(&manifest), &[dep("node", "22")], &quiet())
        .await
        .unwrap();

    assert!(!report.lockfile_written);
    assert_eq!(report.successes(), 1);
    assert!(report.exit_ok());
}

#[tokio::test]
async fn relative_project_path_is_rejected() {
    let rig = rig();
    let err = rig
        .engine
        .install_batch(Path::new("relative/proj"), None, &[dep("node", "22")], &quiet())
        .await
        .unwrap_err();
    assert!(matches!(err, PantryError::ProjectPathNotAbsolute { .. }));
}
