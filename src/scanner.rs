use crate::config::BuildConfig;
use crate::error::{BuildError, ConfigError};
use crate::index::ModulePath;
use crate::parser::module_path_for;
use globset::{Glob, GlobSet, GlobSetBuilder};
use log::{debug, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A Rust source file together with the module it defines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub module: ModulePath,
    /// Dependency hops from the scanned project (0 for search directories)
    pub depth: usize,
}

/// A directory scanned as one crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrateRoot {
    pub name: String,
    pub dir: PathBuf,
    pub depth: usize,
}

impl CrateRoot {
    /// Names the crate after its manifest, or after the directory when there is none.
    pub fn from_dir(dir: &Path, depth: usize) -> Self {
        Self {
            name: crate_name(dir),
            dir: dir.to_path_buf(),
            depth,
        }
    }
}

/// File scanner for traversing crate directories.
///
/// The `FileScanner` walks each crate's `src/` directory (or the crate directory itself
/// when it has none) and collects every `.rs` file with its module path. It skips:
/// - `target`, hidden directories and the output directory
/// - `vendor` directories (vendored crates are scanned as crates of their own)
/// - `internal` directories unless internal parsing is enabled
/// - any path matching an exclude pattern
///
/// # Example
///
/// ```no_run
/// use openapi_from_comments::config::BuildConfig;
/// use openapi_from_comments::scanner::FileScanner;
///
/// let config = BuildConfig::default();
/// let scanner = FileScanner::new(&config);
/// let roots = scanner.search_roots(&config).unwrap();
/// let result = scanner.scan(&roots);
/// println!("Found {} Rust files", result.files.len());
/// ```
pub struct FileScanner {
    /// Plain exclude paths, matched as prefixes
    exclude_paths: Vec<PathBuf>,
    exclude_globs: GlobSet,
    parse_internal: bool,
    /// Canonical output directory, never scanned
    output_dir: Option<PathBuf>,
}

/// Result of a scan.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Files in walk order, each listed once
    pub files: Vec<SourceFile>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl FileScanner {
    pub fn new(config: &BuildConfig) -> Self {
        let (exclude_paths, exclude_globs) = exclude_patterns(&config.excludes);
        Self {
            exclude_paths,
            exclude_globs,
            parse_internal: config.parse_internal,
            output_dir: fs::canonicalize(&config.output_dir).ok(),
        }
    }

    /// Crates named by the search directories, plus vendored crates when enabled.
    ///
    /// The first search directory is the root crate.
    pub fn search_roots(&self, config: &BuildConfig) -> Result<Vec<CrateRoot>, BuildError> {
        let mut roots = Vec::new();
        for dir in &config.search_dirs {
            if !dir.is_dir() {
                return Err(ConfigError::SearchDirNotFound(dir.clone()).into());
            }
            roots.push(CrateRoot::from_dir(dir, 0));
        }

        if config.parse_vendor {
            for dir in &config.search_dirs {
                let vendor = dir.join("vendor");
                let Ok(entries) = fs::read_dir(&vendor) else {
                    continue;
                };
                let mut vendored: Vec<PathBuf> = entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.is_dir())
                    .collect();
                vendored.sort();
                for crate_dir in vendored {
                    debug!("Adding vendored crate {}", crate_dir.display());
                    roots.push(CrateRoot::from_dir(&crate_dir, 1));
                }
            }
        }

        Ok(roots)
    }

    /// Walks every crate root. A file reachable from two roots is kept for the first.
    pub fn scan(&self, roots: &[CrateRoot]) -> ScanResult {
        let mut result = ScanResult::default();
        let mut seen = HashSet::new();

        for root in roots {
            let src = root.dir.join("src");
            let walk_root = if src.is_dir() { src } else { root.dir.clone() };
            debug!("Scanning crate {} at {}", root.name, walk_root.display());

            for entry in WalkDir::new(&walk_root)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.path() == walk_root || self.keep_entry(e.path(), &walk_root, &root.dir))
            {
                match entry {
                    Ok(entry) => {
                        let path = entry.path();
                        if !entry.file_type().is_file()
                            || path.extension().and_then(|s| s.to_str()) != Some("rs")
                        {
                            continue;
                        }
                        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
                        if !seen.insert(key) {
                            debug!("Skipping {}: already scanned", path.display());
                            continue;
                        }
                        let relative = path.strip_prefix(&walk_root).unwrap_or(path);
                        result.files.push(SourceFile {
                            path: path.to_path_buf(),
                            module: module_path_for(&root.name, relative),
                            depth: root.depth,
                        });
                    }
                    Err(e) => {
                        // Record warning for inaccessible directories/files
                        let warning = format!("Failed to access path: {}", e);
                        warn!("{}", warning);
                        result.warnings.push(warning);
                    }
                }
            }
        }

        debug!("Scan found {} files", result.files.len());
        result
    }

    fn keep_entry(&self, path: &Path, walk_root: &Path, crate_dir: &Path) -> bool {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if path.is_dir() {
            if file_name.starts_with('.') || file_name == "target" || file_name == "vendor" {
                return false;
            }
            if file_name == "internal" && !self.parse_internal {
                debug!("Skipping internal directory {}", path.display());
                return false;
            }
            if let Some(output) = &self.output_dir {
                if fs::canonicalize(path).ok().as_ref() == Some(output) {
                    return false;
                }
            }
        }
        !self.is_excluded(path, walk_root, crate_dir)
    }

    fn is_excluded(&self, path: &Path, walk_root: &Path, crate_dir: &Path) -> bool {
        let candidates = [
            path,
            path.strip_prefix(crate_dir).unwrap_or(path),
            path.strip_prefix(walk_root).unwrap_or(path),
        ];
        candidates.iter().any(|candidate| {
            self.exclude_globs.is_match(candidate)
                || self.exclude_paths.iter().any(|prefix| candidate.starts_with(prefix))
        })
    }
}

/// Splits exclude patterns into plain path prefixes and a compiled glob set.
///
/// Invalid globs are logged and ignored.
fn exclude_patterns(patterns: &[String]) -> (Vec<PathBuf>, GlobSet) {
    let mut paths = Vec::new();
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.trim().trim_end_matches('/');
        if pattern.is_empty() {
            continue;
        }
        if !pattern.contains(['*', '?', '[', '{']) {
            paths.push(PathBuf::from(pattern));
            continue;
        }
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!("Ignoring invalid exclude pattern '{}': {}", pattern, e),
        }
    }
    let globs = builder.build().unwrap_or_else(|e| {
        warn!("Ignoring exclude globs: {}", e);
        GlobSet::empty()
    });
    (paths, globs)
}

/// Package name from `Cargo.toml` with `-` mapped to `_`, or the directory name.
pub fn crate_name(dir: &Path) -> String {
    let from_manifest = fs::read_to_string(dir.join("Cargo.toml"))
        .ok()
        .and_then(|text| text.parse::<toml::Table>().ok())
        .and_then(|manifest| {
            manifest
                .get("package")?
                .get("name")?
                .as_str()
                .map(String::from)
        });
    let name = from_manifest.unwrap_or_else(|| {
        fs::canonicalize(dir)
            .unwrap_or_else(|_| dir.to_path_buf())
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "crate".to_string())
    });
    name.replace('-', "_")
}
