//! End-to-end pipeline tests: manifest on disk → activation → environment
//! directory, lockfile, and env cache, driven through the public library
//! API with hermetic registry/fetch stubs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;

use pantry_cli::activate::{ActivateStatus, Activator};
use pantry_cli::cache::PackageCache;
use pantry_cli::core::{PantryError, Result};
use pantry_cli::installer::{BatchOptions, InstallEngine};
use pantry_cli::models::PackageSpec;
use pantry_cli::registry::{
    Fetcher, MaterializedPackage, PackageRecord, PackageRegistry, ResolvedPackage,
};

/// Resolves `node` → 22.1.0, `jq` → 1.7.1, everything else unknown.
struct TableRegistry;

impl PackageRegistry for TableRegistry {
    fn lookup(&self, _name: &str) -> Option<PackageRecord> {
        None
    }

    fn resolve(&self, spec: &PackageSpec) -> Result<ResolvedPackage> {
        let version = match spec.name.as_str() {
            "node" => "22.1.0",
            "jq" => "1.7.1",
            _ => {
                return Err(PantryError::PackageNotFoundInRegistry { name: spec.name.clone() });
            }
        };
        Ok(ResolvedPackage {
            name: spec.name.clone(),
            version: version.to_string(),
            fetch_url: format!("https://example.invalid/{}-{version}.tar.gz", spec.name),
            programs: vec![spec.name.clone()],
        })
    }
}

struct CountingFetcher {
    calls: AtomicUsize,
}

impl Fetcher for CountingFetcher {
    fn materialize(&self, pkg: &ResolvedPackage, staging_dir: &Path) -> Result<MaterializedPackage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let root = staging_dir.join("unpacked");
        fs::create_dir_all(root.join("bin"))?;
        fs::write(root.join("bin").join(&pkg.name), format!("#!/bin/sh\n# {}\n", pkg.version))?;
        Ok(MaterializedPackage {
            unpacked_root: root,
            integrity: format!("sha256:{}-{}", pkg.name, pkg.version),
        })
    }
}

struct World {
    _tmp: TempDir,
    home: PathBuf,
    project: PathBuf,
    fetcher: Arc<CountingFetcher>,
}

impl World {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path().join("home");
        let project = tmp.path().join("proj");
        fs::create_dir_all(&project).unwrap();
        let fetcher = Arc::new(CountingFetcher { calls: AtomicUsize::new(0) });
        Self { _tmp: tmp, home, project, fetcher }
    }

    fn engine(&self) -> InstallEngine {
        let cache =
            Arc::new(PackageCache::open(self.home.join("cache/packages")).unwrap());
        InstallEngine::with_collaborators(
            self.home.clone(),
            cache,
            Arc::new(TableRegistry),
            Arc::clone(&self.fetcher) as Arc<dyn Fetcher>,
        )
    }

    fn activator(&self) -> Activator {
        Activator::with_engine(&self.home, self.engine())
    }

    fn write_manifest(&self, content: &str) {
        fs::write(self.project.join("deps.yaml"), content).unwrap();
    }

    async fn activate(&self) -> (ActivateStatus, String) {
        let options = BatchOptions { quiet: true, ..BatchOptions::default() };
        let mut out = Vec::new();
        let status =
            self.activator().activate(&self.project, &options, &mut out).await.unwrap();
        (status, String::from_utf8(out).unwrap())
    }

    fn env_dirs(&self) -> Vec<PathBuf> {
        let envs = self.home.join("envs");
        if !envs.exists() {
            return Vec::new();
        }
        let mut dirs: Vec<PathBuf> = fs::read_dir(envs)
            .unwrap()
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .collect();
        dirs.sort();
        dirs
    }

    fn freezer(&self) -> String {
        fs::read_to_string(self.project.join(".freezer")).unwrap()
    }
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

#[tokio::test]
async fn cold_activation_single_registry_dep() {
    let world = World::new();
    world.write_manifest("dependencies:\n  node: '22'\n");

    let (status, stdout) = world.activate().await;
    assert_eq!(status, ActivateStatus::Activated);

    // Env dir name: proj_<8hex>-d<8hex>
    let dirs = world.env_dirs();
    assert_eq!(dirs.len(), 1);
    let name = dirs[0].file_name().unwrap().to_string_lossy().into_owned();
    let rest = name.strip_prefix("proj_").expect("basename prefix");
    let (proj_hash, manifest_hash) = rest.split_once("-d").expect("-d separator");
    assert_eq!(proj_hash.len(), 8);
    assert_eq!(manifest_hash.len(), 8);
    assert!(is_hex(proj_hash) && is_hex(manifest_hash));

    // bin/node symlink into the env
    let bin_node = dirs[0].join("bin/node");
    assert!(fs::symlink_metadata(&bin_node).unwrap().file_type().is_symlink());

    // .freezer pins the resolved version
    let freezer = world.freezer();
    assert!(freezer.contains("name = \"node\""));
    assert!(freezer.contains("version = \"22.1.0\""));

    // Exactly one export line; PATH points at the env bin
    let exports: Vec<&str> = stdout.lines().filter(|l| l.starts_with("export PATH=")).collect();
    assert_eq!(exports.len(), 1);
    assert_eq!(
        exports[0],
        format!("export PATH=\"{}:$PATH\"", dirs[0].join("bin").display())
    );
}

#[tokio::test]
async fn warm_activation_is_idempotent() {
    let world = World::new();
    world.write_manifest("dependencies:\n  node: '22'\n");

    let (_, cold) = world.activate().await;
    let fetches_after_cold = world.fetcher.calls.load(Ordering::SeqCst);
    let (status, warm) = world.activate().await;

    assert_eq!(status, ActivateStatus::Activated);
    assert_eq!(world.fetcher.calls.load(Ordering::SeqCst), fetches_after_cold, "no new fetch");
    assert_eq!(world.env_dirs().len(), 1, "no new env dir");

    // Warm stdout is the cold export line, banner stripped
    let export = cold.lines().find(|l| l.starts_with("export PATH=")).unwrap();
    assert_eq!(warm.trim_end(), export);
}

#[tokio::test]
async fn edited_manifest_gets_new_env_dir() {
    let world = World::new();
    world.write_manifest("dependencies:\n  node: '22'\n");
    world.activate().await;
    let first_dirs = world.env_dirs();

    // Ensure the rewrite lands on a different mtime tick
    std::thread::sleep(std::time::Duration::from_millis(5));
    world.write_manifest("dependencies:\n  node: '22'\n  jq: '1.7.1'\n");
    let (status, _) = world.activate().await;
    assert_eq!(status, ActivateStatus::Activated);

    let dirs = world.env_dirs();
    assert_eq!(dirs.len(), 2, "different manifest content, different env dir");
    let suffix = |p: &PathBuf| {
        p.file_name().unwrap().to_string_lossy().split_once("-d").unwrap().1.to_string()
    };
    let new_dir = dirs.iter().find(|d| *d != &first_dirs[0]).unwrap();
    assert_ne!(suffix(&first_dirs[0]), suffix(new_dir));
    assert!(new_dir.join("bin/node").exists());
    assert!(new_dir.join("bin/jq").exists());

    // Two entries, manifest order
    let freezer = world.freezer();
    let node_pos = freezer.find("name = \"node\"").unwrap();
    let jq_pos = freezer.find("name = \"jq\"").unwrap();
    assert!(node_pos < jq_pos);
}

#[tokio::test]
async fn local_dep_end_to_end() {
    let world = World::new();
    fs::create_dir_all(world.project.join("vendor/mylib/src")).unwrap();
    world.write_manifest("dependencies:\n  local:mylib: ./vendor/mylib\n");

    let (status, stdout) = world.activate().await;
    assert_eq!(status, ActivateStatus::Activated);
    assert!(stdout.contains("export PATH="));

    let vendor = world.project.join("vendor/mylib");
    let module_link = world.project.join("pantry_modules/mylib/src");
    assert_eq!(fs::read_link(&module_link).unwrap(), vendor.join("src"));

    let env_dir = &world.env_dirs()[0];
    assert_eq!(fs::read_link(env_dir.join("bin/mylib")).unwrap(), vendor);

    let freezer = world.freezer();
    assert!(freezer.contains("source = \"local\""));
    assert!(freezer.contains("url = \"./vendor/mylib\""));
    assert_eq!(world.fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_package_keeps_batch_alive() {
    let world = World::new();
    world.write_manifest("dependencies:\n  node: '22'\n  not-a-real-pkg: '1.0.0'\n");

    let (status, stdout) = world.activate().await;
    // Partial success still activates
    assert_eq!(status, ActivateStatus::Activated);
    assert!(stdout.contains("export PATH="));
    assert!(stdout.contains("1 failed"));

    let env_dir = &world.env_dirs()[0];
    assert!(env_dir.join("bin/node").exists());
    assert!(!env_dir.join("bin/not-a-real-pkg").exists());
    assert!(!world.freezer().contains("not-a-real-pkg"));
}

#[tokio::test]
async fn clean_cache_then_install_reproduces_environment() {
    let world = World::new();
    world.write_manifest("dependencies:\n  node: '22'\n  jq: '1.7.1'\n");
    let manifest = world.project.join("deps.yaml");
    let options = BatchOptions { quiet: true, ..BatchOptions::default() };

    let engine = world.engine();
    let deps = pantry_cli::manifest::parse_manifest(&manifest).unwrap();
    engine.install_batch(&world.project, Some(&manifest), &deps, &options).await.unwrap();
    let first_freezer = world.freezer();
    assert_eq!(engine.cache().stats().total_packages, 2);

    engine.cache().clear().unwrap();
    assert_eq!(engine.cache().stats().total_packages, 0);

    let report = engine
        .install_batch(&world.project, Some(&manifest), &deps, &options)
        .await
        .unwrap();
    assert_eq!(world.freezer(), first_freezer, "identical resolved set after cache wipe");
    assert_eq!(report.successes(), 2);
    assert_eq!(world.fetcher.calls.load(Ordering::SeqCst), 4, "cache wipe forces refetch");
}

#[tokio::test]
async fn env_cache_round_trips_between_activator_instances() {
    let world = World::new();
    world.write_manifest("dependencies:\n  node: '22'\n");
    world.activate().await;

    // A fresh activator (fresh process, conceptually) reads the persisted
    // cache and answers the lookup without installing.
    let activator = world.activator();
    let hit = activator.lookup(&world.project).unwrap();
    assert!(hit.env_bin.ends_with("bin"));
    assert_eq!(hit.project_dir, world.project);
}
