//! Field-level annotations on struct fields.

use super::AnnotationBlock;
use crate::index::TypeExpr;

/// Per-field overrides read from a field's doc comment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldAnnotation {
    pub description: Option<String>,
    pub example: Option<String>,
    pub format: Option<String>,
    /// `@required` / `@optional`; wins over every other source of the required flag
    pub required: Option<bool>,
    pub ignore: bool,
    pub type_override: Option<TypeExpr>,
    pub enums: Vec<String>,
    pub default: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
}

impl FieldAnnotation {
    /// Reads the field tags of a block. Malformed values are returned as messages and
    /// leave the corresponding setting unset.
    pub fn from_block(block: &AnnotationBlock) -> (Self, Vec<String>) {
        let mut annotation = FieldAnnotation {
            description: block.text(),
            ..FieldAnnotation::default()
        };
        let mut errors = Vec::new();

        for field in &block.fields {
            let value = field.value.trim();
            match field.tag.as_str() {
                "description" => annotation.description = Some(value.to_string()),
                "example" => annotation.example = Some(value.to_string()),
                "format" => annotation.format = Some(value.to_string()),
                "required" => annotation.required = Some(true),
                "optional" => annotation.required = Some(false),
                "ignore" => annotation.ignore = true,
                "pattern" => annotation.pattern = Some(value.to_string()),
                "default" => annotation.default = Some(value.to_string()),
                "enums" => {
                    annotation.enums = value
                        .split(',')
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(String::from)
                        .collect();
                }
                "type" => match TypeExpr::parse_annotation(value) {
                    Some(ty) => annotation.type_override = Some(ty),
                    None => errors.push(format!("invalid @type `{}`", value)),
                },
                "minimum" => parse_into(&mut annotation.minimum, "minimum", value, &mut errors),
                "maximum" => parse_into(&mut annotation.maximum, "maximum", value, &mut errors),
                "minlength" => {
                    parse_into(&mut annotation.min_length, "minLength", value, &mut errors)
                }
                "maxlength" => {
                    parse_into(&mut annotation.max_length, "maxLength", value, &mut errors)
                }
                _ => {}
            }
        }

        (annotation, errors)
    }
}

fn parse_into<T: std::str::FromStr>(
    slot: &mut Option<T>,
    tag: &str,
    value: &str,
    errors: &mut Vec<String>,
) {
    match value.parse::<T>() {
        Ok(parsed) => *slot = Some(parsed),
        Err(_) => errors.push(format!("@{} expects a number, got `{}`", tag, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_field_tags() {
        let block = AnnotationBlock::parse(&[
            "Display name of the account.",
            "@example Jane Doe",
            "@minLength 1",
            "@maxLength 64",
            "@required",
            "@enums a, b ,c",
        ]);
        let (annotation, errors) = FieldAnnotation::from_block(&block);
        assert!(errors.is_empty());
        assert_eq!(
            annotation.description.as_deref(),
            Some("Display name of the account.")
        );
        assert_eq!(annotation.example.as_deref(), Some("Jane Doe"));
        assert_eq!(annotation.min_length, Some(1));
        assert_eq!(annotation.max_length, Some(64));
        assert_eq!(annotation.required, Some(true));
        assert_eq!(annotation.enums, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_type_override_and_ignore() {
        let block = AnnotationBlock::parse(&["@type []string", "@ignore"]);
        let (annotation, _) = FieldAnnotation::from_block(&block);
        assert!(annotation.ignore);
        assert_eq!(
            annotation.type_override,
            Some(TypeExpr::Array(Box::new(TypeExpr::path(&["string"]))))
        );
    }

    #[test]
    fn test_bad_numbers_are_reported() {
        let block = AnnotationBlock::parse(&["@minimum low", "@maximum 10.5"]);
        let (annotation, errors) = FieldAnnotation::from_block(&block);
        assert_eq!(annotation.minimum, None);
        assert_eq!(annotation.maximum, Some(10.5));
        assert_eq!(errors, vec!["@minimum expects a number, got `low`"]);
    }
}
