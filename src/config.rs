//! Build configuration.
//!
//! One [`BuildConfig`] drives one `Generator::build` call. It is read-only for the
//! whole build, so every stage borrows it without synchronisation.

use crate::error::ConfigError;
use crate::naming::NamingStrategy;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default name of the overrides file, looked up in the current directory.
pub const DEFAULT_OVERRIDES_FILE: &str = ".openapi-overrides";

/// Instance name used when none is configured.
pub const DEFAULT_INSTANCE_NAME: &str = "openapi";

/// Requested artifact kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputKind {
    /// Embeddable Rust module
    Rust,
    /// `openapi.json`
    Json,
    /// `openapi.yaml`
    Yaml,
}

impl OutputKind {
    /// Parses a comma separated list such as `rust,json,yaml`, keeping first-seen order.
    pub fn parse_list(list: &str) -> Result<Vec<OutputKind>, ConfigError> {
        let mut kinds = Vec::new();
        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let kind = part.parse::<OutputKind>()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        if kinds.is_empty() {
            return Err(ConfigError::NoOutputTypes);
        }
        Ok(kinds)
    }
}

impl FromStr for OutputKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rust" | "rs" => Ok(OutputKind::Rust),
            "json" => Ok(OutputKind::Json),
            "yaml" | "yml" => Ok(OutputKind::Yaml),
            _ => Err(ConfigError::UnknownOutputType(s.to_string())),
        }
    }
}

/// Default serialization of array query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionFormat {
    /// Comma separated
    #[default]
    Csv,
    /// Space separated
    Ssv,
    /// Tab separated
    Tsv,
    /// Pipe separated
    Pipes,
    /// Repeated parameter
    Multi,
}

impl CollectionFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionFormat::Csv => "csv",
            CollectionFormat::Ssv => "ssv",
            CollectionFormat::Tsv => "tsv",
            CollectionFormat::Pipes => "pipes",
            CollectionFormat::Multi => "multi",
        }
    }
}

impl FromStr for CollectionFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(CollectionFormat::Csv),
            "ssv" => Ok(CollectionFormat::Ssv),
            "tsv" => Ok(CollectionFormat::Tsv),
            "pipes" => Ok(CollectionFormat::Pipes),
            "multi" => Ok(CollectionFormat::Multi),
            _ => Err(ConfigError::InvalidCollectionFormat(s.to_string())),
        }
    }
}

impl fmt::Display for CollectionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Left/right delimiter pair for the embeddable artifact's template placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDelims {
    pub left: String,
    pub right: String,
}

impl TemplateDelims {
    /// Parses `left,right`. Both halves are required and must differ.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [left, right] if !left.is_empty() && !right.is_empty() => {
                if left == right {
                    return Err(ConfigError::IdenticalTemplateDelims(left.to_string()));
                }
                Ok(Self {
                    left: left.to_string(),
                    right: right.to_string(),
                })
            }
            _ => Err(ConfigError::InvalidTemplateDelims(value.to_string())),
        }
    }
}

impl Default for TemplateDelims {
    fn default() -> Self {
        Self {
            left: "{{".to_string(),
            right: "}}".to_string(),
        }
    }
}

/// Configuration of one documentation build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Root directories to scan; the first one holds the general info file
    pub search_dirs: Vec<PathBuf>,
    /// Exclude patterns, relative to a search directory
    pub excludes: Vec<String>,
    /// General info file, relative to the first search directory
    pub main_file: PathBuf,
    pub naming: NamingStrategy,
    pub output_dir: PathBuf,
    pub output_kinds: Vec<OutputKind>,
    pub parse_vendor: bool,
    pub parse_internal: bool,
    pub parse_dependency: bool,
    pub markdown_dir: Option<PathBuf>,
    pub code_examples_dir: Option<PathBuf>,
    /// Maximum number of dependency hops followed
    pub parse_depth: usize,
    pub required_by_default: bool,
    pub instance_name: Option<String>,
    /// Explicit overrides file; `None` means the optional default file
    pub overrides_file: Option<PathBuf>,
    pub use_cargo_metadata: bool,
    pub metadata_timeout: Duration,
    /// Raw tag filter expression, e.g. `admin,!internal`
    pub tags: String,
    /// Keep only operations carrying `x-<name>`
    pub parse_extension: Option<String>,
    pub openapi_3_1: bool,
    pub template_delims: TemplateDelims,
    pub package_name: Option<String>,
    pub collection_format: CollectionFormat,
    pub generated_time: bool,
    /// Treat annotation errors as fatal
    pub strict: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            search_dirs: vec![PathBuf::from("./")],
            excludes: Vec::new(),
            main_file: PathBuf::from("src/main.rs"),
            naming: NamingStrategy::Declared,
            output_dir: PathBuf::from("./docs"),
            output_kinds: vec![OutputKind::Rust, OutputKind::Json, OutputKind::Yaml],
            parse_vendor: false,
            parse_internal: false,
            parse_dependency: false,
            markdown_dir: None,
            code_examples_dir: None,
            parse_depth: 100,
            required_by_default: false,
            instance_name: None,
            overrides_file: None,
            use_cargo_metadata: true,
            metadata_timeout: Duration::from_secs(30),
            tags: String::new(),
            parse_extension: None,
            openapi_3_1: false,
            template_delims: TemplateDelims::default(),
            package_name: None,
            collection_format: CollectionFormat::Csv,
            generated_time: false,
            strict: false,
        }
    }
}

impl BuildConfig {
    /// Pre-flight checks that need the file system.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_kinds.is_empty() {
            return Err(ConfigError::NoOutputTypes);
        }
        if self.search_dirs.is_empty() {
            return Err(ConfigError::SearchDirNotFound(PathBuf::new()));
        }
        for dir in &self.search_dirs {
            if !dir.is_dir() {
                return Err(ConfigError::SearchDirNotFound(dir.clone()));
            }
        }
        let main_file = self.main_file_path();
        if !main_file.is_file() {
            return Err(ConfigError::MainFileNotFound(main_file));
        }
        if self.template_delims.left == self.template_delims.right {
            return Err(ConfigError::IdenticalTemplateDelims(
                self.template_delims.left.clone(),
            ));
        }
        Ok(())
    }

    /// The general info file, resolved against the first search directory.
    pub fn main_file_path(&self) -> PathBuf {
        match self.search_dirs.first() {
            Some(root) => root.join(&self.main_file),
            None => self.main_file.clone(),
        }
    }

    pub fn instance_name(&self) -> &str {
        self.instance_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_INSTANCE_NAME)
    }

    /// Package name of the Rust artifact, defaulting to the output directory's base name.
    pub fn package_name(&self) -> String {
        if let Some(name) = self.package_name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        base_name(&self.output_dir).unwrap_or_else(|| "docs".to_string())
    }

    /// File name of the artifact for one output kind.
    pub fn artifact_file_name(&self, kind: OutputKind) -> String {
        let stem = match kind {
            OutputKind::Rust => format!("{}.rs", self.package_name()),
            OutputKind::Json => "openapi.json".to_string(),
            OutputKind::Yaml => "openapi.yaml".to_string(),
        };
        match self.instance_name.as_deref().filter(|n| !n.is_empty()) {
            Some(instance) => format!("{}_{}", instance, stem),
            None => stem,
        }
    }
}

fn base_name(path: &Path) -> Option<String> {
    let path = if path.file_name().is_none() {
        std::env::current_dir().ok()?.join(path)
    } else {
        path.to_path_buf()
    };
    // `./docs/.` and `docs/..` style paths have no usable file name
    let name = path.components().next_back()?.as_os_str().to_string_lossy().to_string();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.replace('-', "_"))
}
