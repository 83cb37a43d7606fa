//! Serialization module for converting OpenAPI documents to YAML or JSON format.
//!
//! This module provides functions to serialize OpenAPI documents into standard formats
//! and write them to files. Map ordering comes from the document model, so the same
//! document always serializes to the same bytes.

use crate::error::BuildError;
use crate::openapi_builder::OpenApiDocument;
use log::debug;
use std::fs;
use std::path::Path;

/// Serializes an OpenAPI document to YAML format.
///
/// # Errors
///
/// Returns [`BuildError::Serialize`] if serialization fails.
///
/// # Example
///
/// ```ignore
/// use openapi_from_comments::openapi_builder::OpenApiBuilder;
/// use openapi_from_comments::schema_registry::SchemaRegistry;
/// use openapi_from_comments::serializer::serialize_yaml;
///
/// let doc = OpenApiBuilder::new(false, Default::default())
///     .build(&SchemaRegistry::new())
///     .unwrap();
/// let yaml = serialize_yaml(&doc).unwrap();
/// println!("{}", yaml);
/// ```
pub fn serialize_yaml(doc: &OpenApiDocument) -> Result<String, BuildError> {
    debug!("Serializing OpenAPI document to YAML");
    Ok(serde_yaml::to_string(doc)?)
}

/// Serializes an OpenAPI document to JSON format with pretty printing.
///
/// The output is indented for readability, making it suitable for human review and
/// version control.
///
/// # Errors
///
/// Returns [`BuildError::Serialize`] if serialization fails.
pub fn serialize_json(doc: &OpenApiDocument) -> Result<String, BuildError> {
    debug!("Serializing OpenAPI document to JSON");
    Ok(serde_json::to_string_pretty(doc)?)
}

/// Parses a document previously written by [`serialize_json`].
pub fn deserialize_json(content: &str) -> Result<OpenApiDocument, BuildError> {
    Ok(serde_json::from_str(content)?)
}

/// Parses a document previously written by [`serialize_yaml`].
pub fn deserialize_yaml(content: &str) -> Result<OpenApiDocument, BuildError> {
    Ok(serde_yaml::from_str(content)?)
}

/// Writes string content to a file.
///
/// Creates the file and its parent directories if they don't exist, or overwrites the
/// file if it does.
///
/// # Errors
///
/// Returns [`BuildError::Io`] naming the path that could not be created or written.
pub fn write_to_file(content: &str, path: &Path) -> Result<(), BuildError> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }

    fs::write(path, content).map_err(|e| BuildError::io(path, e))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openapi_builder::{Info, OpenApiDocument, Operation, PathItem, Response};
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    /// Helper function to create a minimal OpenAPI document for testing
    fn create_test_document() -> OpenApiDocument {
        let mut responses = IndexMap::new();
        responses.insert(
            "204".to_string(),
            Response {
                description: "No Content".to_string(),
                ..Response::default()
            },
        );
        responses.insert(
            "200".to_string(),
            Response {
                description: "OK".to_string(),
                ..Response::default()
            },
        );
        let mut paths = BTreeMap::new();
        paths.insert(
            "/health".to_string(),
            PathItem {
                get: Some(Operation {
                    summary: Some("Health check".to_string()),
                    responses,
                    ..Operation::default()
                }),
                ..PathItem::default()
            },
        );
        OpenApiDocument {
            openapi: "3.0.3".to_string(),
            info: Info {
                title: "Test API".to_string(),
                version: "1.0.0".to_string(),
                description: Some("A test API".to_string()),
                ..Info::default()
            },
            servers: Vec::new(),
            paths,
            components: None,
            tags: Vec::new(),
            external_docs: None,
        }
    }

    #[test]
    fn test_serialize_yaml() {
        let doc = create_test_document();
        let yaml = serialize_yaml(&doc).unwrap();

        assert!(yaml.contains("openapi: 3.0.3"));
        assert!(yaml.contains("title: Test API"));
        assert!(yaml.contains("description: A test API"));
        assert!(yaml.contains("/health:"));
    }

    #[test]
    fn test_serialize_json() {
        let doc = create_test_document();
        let json = serialize_json(&doc).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["openapi"], "3.0.3");
        assert_eq!(parsed["info"]["title"], "Test API");
        assert_eq!(parsed["paths"]["/health"]["get"]["summary"], "Health check");
    }

    #[test]
    fn test_serialize_json_pretty_format() {
        let doc = create_test_document();
        let json = serialize_json(&doc).unwrap();

        assert!(json.contains('\n'));
        assert!(json.contains("  "));
        assert!(json.lines().count() > 5, "Pretty printed JSON should have multiple lines");
    }

    #[test]
    fn test_response_order_is_preserved() {
        let json = serialize_json(&create_test_document()).unwrap();
        let no_content = json.find("\"204\"").unwrap();
        let ok = json.find("\"200\"").unwrap();
        assert!(no_content < ok);
    }

    #[test]
    fn test_round_trip() {
        let doc = create_test_document();
        let from_json = deserialize_json(&serialize_json(&doc).unwrap()).unwrap();
        let from_yaml = deserialize_yaml(&serialize_yaml(&doc).unwrap()).unwrap();
        assert_eq!(from_json, doc);
        assert_eq!(from_yaml, doc);
    }

    #[test]
    fn test_write_to_file_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("openapi.json");

        write_to_file("{}", &path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_write_to_file_error_names_path() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let err = write_to_file("{}", &blocker.join("openapi.json")).unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }));
    }
}
