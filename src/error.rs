//! Error taxonomy for a documentation build.
//!
//! Configuration problems are detected before any file is read. Annotation problems are
//! collected per declaration and only abort the build in strict mode. Resolution problems
//! are always fatal and carry the offending reference so the cause can be located.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for a documentation build
pub type Result<T> = std::result::Result<T, BuildError>;

/// Invalid configuration, reported before the pipeline starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid property naming strategy `{0}` (expected declared, camelcase, snakecase or pascalcase)")]
    InvalidNamingStrategy(String),

    #[error("invalid collection format `{0}` (expected csv, ssv, tsv, pipes or multi)")]
    InvalidCollectionFormat(String),

    #[error("template delimiters must be given as `left,right`, got `{0}`")]
    InvalidTemplateDelims(String),

    #[error("template delimiters must differ from one another, got `{0}` twice")]
    IdenticalTemplateDelims(String),

    #[error("at least one output type must be requested")]
    NoOutputTypes,

    #[error("unknown output type `{0}` (expected rust, json or yaml)")]
    UnknownOutputType(String),

    #[error("cannot find the general API info file: {}", .0.display())]
    MainFileNotFound(PathBuf),

    #[error("search directory does not exist: {}", .0.display())]
    SearchDirNotFound(PathBuf),

    #[error("overrides file {}:{line}: {message}", .file.display())]
    Overrides {
        file: PathBuf,
        line: usize,
        message: String,
    },

    #[error("overrides file not found: {}", .0.display())]
    OverridesFileNotFound(PathBuf),
}

/// A malformed annotation, scoped to the declaration it precedes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{}: {declaration}: {message}", .file.display())]
pub struct ParseError {
    pub file: PathBuf,
    pub declaration: String,
    pub message: String,
}

impl ParseError {
    pub fn new(
        file: impl Into<PathBuf>,
        declaration: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            declaration: declaration.into(),
            message: message.into(),
        }
    }
}

/// Failures of type resolution or document assembly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("ambiguous canonical name `{name}`: declared by both {first} and {second} with different shapes")]
    AmbiguousName {
        name: String,
        first: String,
        second: String,
    },

    #[error("{context}: unresolved type reference `{reference}`")]
    UnresolvedReference { context: String, reference: String },

    #[error("route {method} {path} is declared by both {first} and {second}")]
    DuplicateRoute {
        method: String,
        path: String,
        first: String,
        second: String,
    },

    #[error("operation id `{id}` is used by both {first} and {second}")]
    DuplicateOperationId {
        id: String,
        first: String,
        second: String,
    },
}

/// Errors of the runtime document registry.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("an OpenAPI document named `{0}` is already registered")]
    AlreadyRegistered(String),

    #[error("no OpenAPI document named `{0}` is registered")]
    NotRegistered(String),

    #[error("failed to render document `{name}`: {source}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },
}

/// Terminal failure of one `Generator::build` call.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{} annotation error(s) in strict mode; first: {}", .0.len(), first_message(.0))]
    Parse(Vec<ParseError>),

    #[error("failed to parse {}: {message}", .file.display())]
    Syntax { file: PathBuf, message: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize document: {0}")]
    Serialize(String),

    #[error("failed to render template: {0}")]
    Template(#[from] minijinja::Error),
}

impl BuildError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for BuildError {
    fn from(err: serde_json::Error) -> Self {
        BuildError::Serialize(format!("JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for BuildError {
    fn from(err: serde_yaml::Error) -> Self {
        BuildError::Serialize(format!("YAML: {}", err))
    }
}

fn first_message(errors: &[ParseError]) -> String {
    errors
        .first()
        .map(|e| e.to_string())
        .unwrap_or_default()
}
