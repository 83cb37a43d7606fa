//! Dependency crate discovery.
//!
//! The default [`PackageLister`] asks `cargo metadata` for the resolved dependency graph.
//! Any failure there (no cargo, timeout, offline resolution error) degrades to a
//! file-system heuristic over the root manifest, so listing never aborts a build.

use crate::scanner::CrateRoot;
use anyhow::{bail, Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Lists the dependency crates of the crate in `root`, up to `max_depth` hops away.
pub trait PackageLister: Send + Sync {
    fn list(&self, root: &Path, max_depth: usize) -> Result<Vec<CrateRoot>>;
}

/// `cargo metadata --format-version 1 --offline`, bounded by a timeout.
pub struct CargoMetadataLister {
    pub timeout: Duration,
    /// Cargo executable; `$CARGO` or `cargo` from `PATH` by default
    pub cargo: PathBuf,
}

impl CargoMetadataLister {
    pub fn new(timeout: Duration) -> Self {
        let cargo = std::env::var_os("CARGO")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("cargo"));
        Self { timeout, cargo }
    }

    fn run(&self, root: &Path) -> Result<String> {
        let mut child = Command::new(&self.cargo)
            .args(["metadata", "--format-version", "1", "--offline"])
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to spawn cargo metadata")?;

        // Drain stdout concurrently so a full pipe cannot stall the child
        let mut stdout = child.stdout.take().context("cargo metadata has no stdout")?;
        let reader = thread::spawn(move || {
            let mut output = String::new();
            stdout.read_to_string(&mut output).map(|_| output)
        });

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                // Ignore errors: the child may exit between the check and the kill
                let _ = child.kill();
                let _ = child.wait();
                bail!("cargo metadata timed out after {:?}", self.timeout);
            }
            thread::sleep(Duration::from_millis(20));
        };
        if !status.success() {
            bail!("cargo metadata exited with {}", status);
        }
        let output = reader
            .join()
            .map_err(|_| anyhow::anyhow!("cargo metadata reader panicked"))??;
        Ok(output)
    }
}

impl PackageLister for CargoMetadataLister {
    fn list(&self, root: &Path, max_depth: usize) -> Result<Vec<CrateRoot>> {
        debug!("Running cargo metadata in {}", root.display());
        let output = self.run(root)?;
        let metadata: Metadata =
            serde_json::from_str(&output).context("cannot parse cargo metadata output")?;
        Ok(dependency_crates(&metadata, root, max_depth))
    }
}

#[derive(Debug, Deserialize)]
struct Metadata {
    packages: Vec<MetadataPackage>,
    workspace_members: Vec<String>,
    resolve: Option<Resolve>,
}

#[derive(Debug, Deserialize)]
struct MetadataPackage {
    id: String,
    name: String,
    manifest_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Resolve {
    nodes: Vec<ResolveNode>,
}

#[derive(Debug, Deserialize)]
struct ResolveNode {
    id: String,
    #[serde(default)]
    dependencies: Vec<String>,
}

/// Breadth-first walk of the resolve graph from the workspace members.
fn dependency_crates(metadata: &Metadata, root: &Path, max_depth: usize) -> Vec<CrateRoot> {
    let packages: HashMap<&str, &MetadataPackage> =
        metadata.packages.iter().map(|p| (p.id.as_str(), p)).collect();
    let edges: HashMap<&str, &[String]> = metadata
        .resolve
        .iter()
        .flat_map(|r| &r.nodes)
        .map(|n| (n.id.as_str(), n.dependencies.as_slice()))
        .collect();
    let root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());

    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
    for member in &metadata.workspace_members {
        if seen.insert(member.as_str()) {
            queue.push_back((member.as_str(), 0));
        }
    }

    let mut crates = Vec::new();
    let mut truncated = 0usize;
    while let Some((id, depth)) = queue.pop_front() {
        if let Some(package) = packages.get(id) {
            let dir = package
                .manifest_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            let canonical = fs::canonicalize(&dir).unwrap_or_else(|_| dir.clone());
            if canonical != root {
                crates.push(CrateRoot {
                    name: package.name.replace('-', "_"),
                    dir,
                    depth: depth.max(1),
                });
            }
        }
        for dep in edges.get(id).copied().unwrap_or_default() {
            if seen.contains(dep.as_str()) {
                continue;
            }
            if depth + 1 > max_depth {
                truncated += 1;
                continue;
            }
            seen.insert(dep.as_str());
            queue.push_back((dep.as_str(), depth + 1));
        }
    }
    if truncated > 0 {
        warn!(
            "Dependency traversal truncated at depth {}; {} crate(s) not scanned",
            max_depth, truncated
        );
    }
    crates
}

/// Reads `[dependencies]` of the root manifest and looks for the sources under
/// `vendor/<name>` or the cargo registry cache.
pub struct HeuristicLister {
    pub cargo_home: Option<PathBuf>,
}

impl HeuristicLister {
    pub fn new() -> Self {
        let cargo_home = std::env::var_os("CARGO_HOME")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".cargo")));
        Self { cargo_home }
    }

    fn registry_dir(&self, package: &str, version: &str) -> Option<PathBuf> {
        let registry = self.cargo_home.as_ref()?.join("registry").join("src");
        let prefix = format!("{}-", package);
        let mut candidates: Vec<PathBuf> = fs::read_dir(&registry)
            .ok()?
            .filter_map(|index| index.ok())
            .filter_map(|index| fs::read_dir(index.path()).ok())
            .flatten()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                name.strip_prefix(&prefix).is_some_and(|v| {
                    v.starts_with(|c: char| c.is_ascii_digit()) && v.starts_with(version)
                })
            })
            .map(|entry| entry.path())
            .collect();
        candidates.sort_by_cached_key(|path| {
            let name = path.file_name().map(|n| n.to_string_lossy().to_string());
            version_key(name.as_deref().and_then(|n| n.strip_prefix(&prefix)).unwrap_or(""))
        });
        candidates.pop()
    }
}

/// Numeric components of a version such as `1.0.100` or `0.4.0-beta.2`, for ordering.
fn version_key(version: &str) -> Vec<u64> {
    version
        .split(['.', '-', '+'])
        .map_while(|part| part.parse().ok())
        .collect()
}

impl Default for HeuristicLister {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageLister for HeuristicLister {
    fn list(&self, root: &Path, max_depth: usize) -> Result<Vec<CrateRoot>> {
        if max_depth == 0 {
            return Ok(Vec::new());
        }
        let manifest_path = root.join("Cargo.toml");
        let text = fs::read_to_string(&manifest_path)
            .with_context(|| format!("cannot read {}", manifest_path.display()))?;
        let manifest: toml::Table = text
            .parse()
            .with_context(|| format!("cannot parse {}", manifest_path.display()))?;

        let mut crates = Vec::new();
        let Some(dependencies) = manifest.get("dependencies").and_then(|d| d.as_table()) else {
            return Ok(crates);
        };
        for (name, spec) in dependencies {
            let (package, version) = match spec {
                toml::Value::String(version) => (name.as_str(), version.as_str()),
                toml::Value::Table(table) => (
                    table.get("package").and_then(|p| p.as_str()).unwrap_or(name),
                    table.get("version").and_then(|v| v.as_str()).unwrap_or(""),
                ),
                _ => continue,
            };
            let version = version.trim_start_matches(['^', '=', '~', ' ']);
            let dir = match spec.get("path").and_then(|p| p.as_str()) {
                Some(path) => Some(root.join(path)),
                None => Some(root.join("vendor").join(package))
                    .filter(|d| d.is_dir())
                    .or_else(|| self.registry_dir(package, version)),
            };
            match dir.filter(|d| d.is_dir()) {
                Some(dir) => crates.push(CrateRoot {
                    name: name.replace('-', "_"),
                    dir,
                    depth: 1,
                }),
                None => debug!("No sources found for dependency {}", name),
            }
        }
        Ok(crates)
    }
}

/// Lists dependency crates with `primary`, falling back to [`HeuristicLister`].
pub fn list_dependencies(
    primary: Option<&dyn PackageLister>,
    root: &Path,
    max_depth: usize,
) -> Vec<CrateRoot> {
    if let Some(lister) = primary {
        match lister.list(root, max_depth) {
            Ok(crates) => return crates,
            Err(e) => warn!("Dependency listing failed, using heuristic scan: {:#}", e),
        }
    }
    HeuristicLister::new()
        .list(root, max_depth)
        .unwrap_or_else(|e| {
            warn!("Heuristic dependency scan failed: {:#}", e);
            Vec::new()
        })
}
