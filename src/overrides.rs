//! Type override rules.
//!
//! ```text
//! // comments start with two slashes
//! replace chrono::NaiveDateTime string
//! replace crate::money::Cents models.Amount
//! skip    crate::internal::Trace
//! ```
//!
//! Rules are loaded once before resolution and consulted before any other step.

use crate::config::{BuildConfig, DEFAULT_OVERRIDES_FILE};
use crate::error::ConfigError;
use indexmap::IndexMap;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideAction {
    /// Resolve to this type instead
    Replace(String),
    /// Drop the field or reference entirely
    Skip,
}

/// Loaded override rules keyed by source type path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    rules: IndexMap<String, OverrideAction>,
}

impl Overrides {
    /// Loads the configured overrides file. A missing default file yields no rules; a
    /// missing explicit file is an error.
    pub fn load(config: &BuildConfig) -> Result<Self, ConfigError> {
        let (path, explicit) = match &config.overrides_file {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_OVERRIDES_FILE), false),
        };
        if !path.is_file() {
            if explicit {
                return Err(ConfigError::OverridesFileNotFound(path));
            }
            debug!("No overrides file at {}", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path).map_err(|e| ConfigError::Overrides {
            file: path.clone(),
            line: 0,
            message: e.to_string(),
        })?;
        let overrides = Self::parse(&text, &path)?;
        info!("Loaded {} override rule(s) from {}", overrides.len(), path.display());
        Ok(overrides)
    }

    pub fn parse(text: &str, file: &Path) -> Result<Self, ConfigError> {
        let mut rules = IndexMap::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = match raw.find("//") {
                Some(pos) => &raw[..pos],
                None => raw,
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            let error = |message: String| ConfigError::Overrides {
                file: file.to_path_buf(),
                line: idx + 1,
                message,
            };
            let parts: Vec<&str> = line.split_whitespace().collect();
            let (source, action) = match parts.as_slice() {
                ["replace", source, target] => {
                    (*source, OverrideAction::Replace(target.to_string()))
                }
                ["skip", source] => (*source, OverrideAction::Skip),
                ["replace", ..] => {
                    return Err(error(format!(
                        "`replace` takes a source and a target, got `{}`",
                        line
                    )))
                }
                ["skip", ..] => return Err(error(format!("`skip` takes one type, got `{}`", line))),
                [keyword, ..] => return Err(error(format!("unknown directive `{}`", keyword))),
                [] => continue,
            };
            rules.insert(source.to_string(), action);
        }
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule matching any of the candidate spellings of a reference.
    pub fn lookup<S: AsRef<str>>(&self, candidates: &[S]) -> Option<&OverrideAction> {
        if self.rules.is_empty() {
            return None;
        }
        candidates
            .iter()
            .find_map(|candidate| self.rules.get(candidate.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_parse_rules_and_comments() {
        let overrides = Overrides::parse(
            "// header\n\nreplace chrono::NaiveDateTime string // trailing\nskip crate::internal::Trace\n",
            Path::new(".openapi-overrides"),
        )
        .unwrap();
        assert_eq!(overrides.len(), 2);
        assert_eq!(
            overrides.lookup(&["chrono::NaiveDateTime"]),
            Some(&OverrideAction::Replace("string".to_string()))
        );
        assert_eq!(
            overrides.lookup(&["Trace", "crate::internal::Trace"]),
            Some(&OverrideAction::Skip)
        );
        assert_eq!(overrides.lookup(&["Other"]), None);
    }

    #[test]
    fn test_parse_reports_line() {
        let err = Overrides::parse("skip A\nrename A B\n", Path::new("rules")).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Overrides {
                file: PathBuf::from("rules"),
                line: 2,
                message: "unknown directive `rename`".to_string(),
            }
        );
        assert!(Overrides::parse("replace A", Path::new("rules")).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let config = BuildConfig {
            overrides_file: Some(temp_dir.path().join("missing")),
            ..BuildConfig::default()
        };
        assert!(matches!(
            Overrides::load(&config),
            Err(ConfigError::OverridesFileNotFound(_))
        ));
    }

    #[test]
    fn test_load_explicit_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("overrides");
        fs::write(&path, "skip crate::Secret\n").unwrap();
        let config = BuildConfig {
            overrides_file: Some(path),
            ..BuildConfig::default()
        };
        let overrides = Overrides::load(&config).unwrap();
        assert_eq!(overrides.lookup(&["crate::Secret"]), Some(&OverrideAction::Skip));
    }
}
