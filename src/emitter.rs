//! Artifact emission.
//!
//! Every requested artifact is rendered in memory first and only then written, so a
//! failing render never leaves a partial set of files behind.

use crate::annotation::general::GeneralInfo;
use crate::config::{BuildConfig, OutputKind, TemplateDelims};
use crate::error::BuildError;
use crate::openapi_builder::OpenApiDocument;
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
use log::{debug, info};
use minijinja::{context, Environment};
use serde_json::Value;
use std::path::PathBuf;

const MODULE_TEMPLATE: &str = include_str!("../templates/docs.rs.j2");

/// One rendered output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: OutputKind,
    pub path: PathBuf,
    pub content: String,
}

/// Renders and writes the requested artifacts of one build.
pub struct Emitter<'a> {
    config: &'a BuildConfig,
}

impl<'a> Emitter<'a> {
    pub fn new(config: &'a BuildConfig) -> Self {
        Self { config }
    }

    /// Renders one artifact per requested output kind, in request order.
    pub fn render(
        &self,
        document: &OpenApiDocument,
        general: &GeneralInfo,
    ) -> Result<Vec<Artifact>, BuildError> {
        self.config
            .output_kinds
            .iter()
            .map(|&kind| {
                let content = match kind {
                    OutputKind::Json => serialize_json(document)?,
                    OutputKind::Yaml => serialize_yaml(document)?,
                    OutputKind::Rust => self.render_module(document, general)?,
                };
                Ok(Artifact {
                    kind,
                    path: self
                        .config
                        .output_dir
                        .join(self.config.artifact_file_name(kind)),
                    content,
                })
            })
            .collect()
    }

    /// Writes rendered artifacts, returning their paths.
    pub fn write(artifacts: &[Artifact]) -> Result<Vec<PathBuf>, BuildError> {
        artifacts
            .iter()
            .map(|artifact| {
                write_to_file(&artifact.content, &artifact.path)?;
                info!("Wrote {}", artifact.path.display());
                Ok(artifact.path.clone())
            })
            .collect()
    }

    fn render_module(
        &self,
        document: &OpenApiDocument,
        general: &GeneralInfo,
    ) -> Result<String, BuildError> {
        let delims = &self.config.template_delims;
        let doc_template = doc_template(document, delims)?;
        debug!(
            "Rendering Rust module for instance `{}` ({} template bytes)",
            self.config.instance_name(),
            doc_template.len()
        );

        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.add_filter("rust_str", rust_str);
        env.add_template("docs.rs.j2", MODULE_TEMPLATE)?;
        let generated_time = self
            .config
            .generated_time
            .then(|| chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f %z").to_string());

        let tmpl = env.get_template("docs.rs.j2")?;
        Ok(tmpl.render(context! {
            package => self.config.package_name(),
            instance => self.config.instance_name(),
            generated_time => generated_time,
            doc_template => doc_template,
            version => document.info.version,
            title => document.info.title,
            description => document.info.description.clone().unwrap_or_default(),
            host => general.host.clone().unwrap_or_default(),
            base_path => general.base_path.clone().unwrap_or_default(),
            schemes => general.schemes,
            left_delim => delims.left,
            right_delim => delims.right,
        })?)
    }
}

fn placeholder(name: &str) -> String {
    format!("@@openapi:{}@@", name)
}

/// The JSON document as a template with placeholders for title, description, version
/// and servers.
///
/// Literal occurrences of the left delimiter are escaped so they render unchanged.
pub fn doc_template(
    document: &OpenApiDocument,
    delims: &TemplateDelims,
) -> Result<String, BuildError> {
    let mut value = serde_json::to_value(document)?;
    if let Some(info) = value.get_mut("info").and_then(Value::as_object_mut) {
        for field in ["title", "description", "version"] {
            info.insert(field.to_string(), Value::String(placeholder(field)));
        }
    }
    if let Some(root) = value.as_object_mut() {
        root.insert("servers".to_string(), Value::String(placeholder("servers")));
    }

    let json = serde_json::to_string_pretty(&value)?;
    let escaped = json.replace(
        &delims.left,
        &format!(
            "{} {} {}",
            delims.left,
            serde_json::to_string(&delims.left)?,
            delims.right
        ),
    );
    Ok(["title", "description", "version", "servers"]
        .iter()
        .fold(escaped, |template, field| {
            template.replace(
                &format!("\"{}\"", placeholder(field)),
                &format!("{} {}|tojson {}", delims.left, field, delims.right),
            )
        }))
}

/// Quotes a value as a Rust raw string literal.
fn rust_str(value: String) -> String {
    let mut hashes = 1;
    while value.contains(&format!("\"{}", "#".repeat(hashes))) {
        hashes += 1;
    }
    let fence = "#".repeat(hashes);
    format!("r{}\"{}\"{}", fence, value, fence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openapi_builder::{Info, Server, Tag};
    use crate::runtime::Spec;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn document() -> OpenApiDocument {
        OpenApiDocument {
            openapi: "3.0.3".to_string(),
            info: Info {
                title: "Pets".to_string(),
                description: Some("Use {{ name }} literally".to_string()),
                version: "2.0".to_string(),
                ..Info::default()
            },
            servers: vec![Server {
                url: "https://pets.io/api".to_string(),
            }],
            paths: BTreeMap::new(),
            components: None,
            tags: vec![Tag {
                name: "raw".to_string(),
                description: Some("Write {{ name }} as is".to_string()),
                external_docs: None,
            }],
            external_docs: None,
        }
    }

    fn general() -> GeneralInfo {
        GeneralInfo {
            host: Some("pets.io".to_string()),
            base_path: Some("/api".to_string()),
            schemes: vec!["https".to_string()],
            ..GeneralInfo::default()
        }
    }

    fn config(dir: &TempDir, delims: &str) -> BuildConfig {
        BuildConfig {
            output_dir: dir.path().join("docs"),
            template_delims: TemplateDelims::parse(delims).unwrap(),
            ..BuildConfig::default()
        }
    }

    fn spec_for(document: &OpenApiDocument, delims: &TemplateDelims) -> Spec {
        Spec {
            version: document.info.version.clone(),
            host: "pets.io".to_string(),
            base_path: "/api".to_string(),
            schemes: vec!["https".to_string()],
            title: document.info.title.clone(),
            description: document.info.description.clone().unwrap_or_default(),
            instance_name: "emitter_test".to_string(),
            left_delim: delims.left.clone(),
            right_delim: delims.right.clone(),
            template: doc_template(document, delims).unwrap(),
        }
    }

    #[test]
    fn test_doc_template_renders_back_to_document() {
        for delims in ["{{,}}", "[[,]]"] {
            let delims = TemplateDelims::parse(delims).unwrap();
            let rendered = spec_for(&document(), &delims).read_doc().unwrap();
            let rendered: Value = serde_json::from_str(&rendered).unwrap();
            assert_eq!(rendered, serde_json::to_value(document()).unwrap());
        }
    }

    #[test]
    fn test_doc_template_placeholders() {
        let template = doc_template(&document(), &TemplateDelims::default()).unwrap();
        assert!(template.contains("\"title\": {{ title|tojson }}"));
        assert!(template.contains("\"servers\": {{ servers|tojson }}"));
        assert!(!template.contains("Use {{ name }} literally"));
        assert!(template.contains("\"description\": {{ description|tojson }}"));
        assert!(template.contains("\"description\": \"Write {{ \"{{\" }} name }} as is\""));

        let custom = doc_template(&document(), &TemplateDelims::parse("[[,]]").unwrap()).unwrap();
        assert!(custom.contains("\"description\": \"Write {{ name }} as is\""));
    }

    #[test]
    fn test_render_all_kinds() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, "{{,}}");
        let artifacts = Emitter::new(&config).render(&document(), &general()).unwrap();

        let names: Vec<_> = artifacts
            .iter()
            .map(|a| a.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["docs.rs", "openapi.json", "openapi.yaml"]);

        let module = &artifacts[0].content;
        assert!(module.starts_with("// Code generated by openapi-from-comments. DO NOT EDIT.\n"));
        assert!(module.contains("pub const DOC_TEMPLATE: &str = r#\""));
        assert!(module.contains("host: r#\"pets.io\"#.to_string(),"));
        assert!(module.contains("schemes: vec![r#\"https\"#.to_string()],"));
        assert!(module.contains("instance_name: r#\"openapi\"#.to_string(),"));
        assert!(!module.contains("generated at"));
    }

    #[test]
    fn test_delimiters_only_change_module() {
        let dir = TempDir::new().unwrap();
        let braces = Emitter::new(&config(&dir, "{{,}}"))
            .render(&document(), &general())
            .unwrap();
        let brackets = Emitter::new(&config(&dir, "[[,]]"))
            .render(&document(), &general())
            .unwrap();

        assert_eq!(braces[1], brackets[1]);
        assert_eq!(braces[2], brackets[2]);
        assert_ne!(braces[0].content, brackets[0].content);
        assert!(brackets[0].content.contains("[[ title|tojson ]]"));
        assert!(brackets[0].content.contains("left_delim: r#\"[[\"#.to_string(),"));
    }

    #[test]
    fn test_instance_name_prefixes_files() {
        let dir = TempDir::new().unwrap();
        let config = BuildConfig {
            instance_name: Some("admin".to_string()),
            package_name: Some("apidocs".to_string()),
            ..config(&dir, "{{,}}")
        };
        let artifacts = Emitter::new(&config).render(&document(), &general()).unwrap();
        assert!(artifacts[0].path.ends_with("admin_apidocs.rs"));
        assert!(artifacts[1].path.ends_with("admin_openapi.json"));
        assert!(artifacts[0].content.contains("runtime::register(spec_info())"));
    }

    #[test]
    fn test_generated_time_header() {
        let dir = TempDir::new().unwrap();
        let config = BuildConfig {
            generated_time: true,
            output_kinds: vec![OutputKind::Rust],
            ..config(&dir, "{{,}}")
        };
        let artifacts = Emitter::new(&config).render(&document(), &general()).unwrap();
        let second_line = artifacts[0].content.lines().nth(1).unwrap();
        assert!(second_line.starts_with("// This file was generated at "));
    }

    #[test]
    fn test_write_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, "{{,}}");
        let artifacts = Emitter::new(&config).render(&document(), &general()).unwrap();
        let written = Emitter::write(&artifacts).unwrap();
        assert_eq!(written.len(), 3);
        for path in written {
            assert!(path.is_file());
        }
    }

    #[test]
    fn test_rust_str_fences() {
        assert_eq!(rust_str("plain".to_string()), "r#\"plain\"#");
        assert_eq!(rust_str("a\"#b".to_string()), "r##\"a\"#b\"##");
    }
}
