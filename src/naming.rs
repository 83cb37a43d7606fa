//! Property naming strategies and serde rename rules.
//!
//! A display name is chosen in this order: an explicit `#[serde(rename = "..")]`, the
//! container's `#[serde(rename_all = "..")]`, then the configured [`NamingStrategy`].

use crate::error::ConfigError;
use heck::{
    ToKebabCase, ToLowerCamelCase, ToPascalCase, ToShoutyKebabCase, ToShoutySnakeCase,
    ToSnakeCase,
};
use std::fmt;
use std::str::FromStr;

/// Maps a declared field name to its display name in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingStrategy {
    /// Keep the name as declared in source
    #[default]
    Declared,
    /// lowerCamelCase
    CamelCase,
    /// lower_snake_case
    SnakeCase,
    /// UpperCamelCase
    PascalCase,
}

impl NamingStrategy {
    pub fn apply(&self, name: &str) -> String {
        match self {
            NamingStrategy::Declared => name.to_string(),
            NamingStrategy::CamelCase => name.to_lower_camel_case(),
            NamingStrategy::SnakeCase => name.to_snake_case(),
            NamingStrategy::PascalCase => name.to_pascal_case(),
        }
    }
}

impl FromStr for NamingStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "declared" | "" => Ok(NamingStrategy::Declared),
            "camelcase" => Ok(NamingStrategy::CamelCase),
            "snakecase" => Ok(NamingStrategy::SnakeCase),
            "pascalcase" => Ok(NamingStrategy::PascalCase),
            _ => Err(ConfigError::InvalidNamingStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for NamingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NamingStrategy::Declared => "declared",
            NamingStrategy::CamelCase => "camelcase",
            NamingStrategy::SnakeCase => "snakecase",
            NamingStrategy::PascalCase => "pascalcase",
        };
        f.write_str(name)
    }
}

/// Applies a serde `rename_all` rule. Unknown rules leave the name untouched.
pub fn apply_rename_rule(rule: &str, name: &str) -> String {
    match rule {
        "lowercase" => name.to_lowercase(),
        "UPPERCASE" => name.to_uppercase(),
        "PascalCase" => name.to_pascal_case(),
        "camelCase" => name.to_lower_camel_case(),
        "snake_case" => name.to_snake_case(),
        "SCREAMING_SNAKE_CASE" => name.to_shouty_snake_case(),
        "kebab-case" => name.to_kebab_case(),
        "SCREAMING-KEBAB-CASE" => name.to_shouty_kebab_case(),
        _ => name.to_string(),
    }
}

/// Computes the display name of a field.
pub fn display_name(
    declared: &str,
    rename: Option<&str>,
    rename_all: Option<&str>,
    strategy: NamingStrategy,
) -> String {
    if let Some(rename) = rename {
        return rename.to_string();
    }
    if let Some(rule) = rename_all {
        return apply_rename_rule(rule, declared);
    }
    strategy.apply(declared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NAMES: &[&str] = &[
        "id",
        "user_id",
        "created_at_utc",
        "http_status2",
        "userId",
        "AccountOwner",
        "x",
    ];

    #[test]
    fn test_parse_strategy_values() {
        assert_eq!("declared".parse(), Ok(NamingStrategy::Declared));
        assert_eq!("camelcase".parse(), Ok(NamingStrategy::CamelCase));
        assert_eq!("snakecase".parse(), Ok(NamingStrategy::SnakeCase));
        assert_eq!("PascalCase".parse(), Ok(NamingStrategy::PascalCase));
    }

    #[test]
    fn test_parse_invalid_strategy() {
        let err = "kebab".parse::<NamingStrategy>().unwrap_err();
        assert_eq!(err, ConfigError::InvalidNamingStrategy("kebab".to_string()));
    }

    #[test]
    fn test_strategies_transform_names() {
        assert_eq!(NamingStrategy::CamelCase.apply("user_id"), "userId");
        assert_eq!(NamingStrategy::SnakeCase.apply("userId"), "user_id");
        assert_eq!(NamingStrategy::PascalCase.apply("user_id"), "UserId");
        assert_eq!(NamingStrategy::Declared.apply("user_id"), "user_id");
    }

    #[test]
    fn test_strategies_are_idempotent() {
        for strategy in [
            NamingStrategy::Declared,
            NamingStrategy::CamelCase,
            NamingStrategy::SnakeCase,
            NamingStrategy::PascalCase,
        ] {
            for name in NAMES {
                let once = strategy.apply(name);
                let twice = strategy.apply(&once);
                assert_eq!(once, twice, "{} is not idempotent on {}", strategy, name);
            }
        }
    }

    #[test]
    fn test_display_name_precedence() {
        let strategy = NamingStrategy::PascalCase;
        assert_eq!(
            display_name("user_id", Some("uid"), Some("camelCase"), strategy),
            "uid"
        );
        assert_eq!(
            display_name("user_id", None, Some("camelCase"), strategy),
            "userId"
        );
        assert_eq!(display_name("user_id", None, None, strategy), "UserId");
    }

    #[test]
    fn test_rename_rules() {
        assert_eq!(apply_rename_rule("SCREAMING_SNAKE_CASE", "userId"), "USER_ID");
        assert_eq!(apply_rename_rule("kebab-case", "user_id"), "user-id");
        assert_eq!(apply_rename_rule("lowercase", "Active"), "active");
        assert_eq!(apply_rename_rule("unknown", "Active"), "Active");
    }
}
