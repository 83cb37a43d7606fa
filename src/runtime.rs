//! Process-wide registry of generated OpenAPI documents.
//!
//! A generated module calls [`register`] with its [`Spec`]; the application later reads
//! the rendered document back by instance name. Several independently named documents
//! can live in one binary.

use crate::error::RuntimeError;
use crate::openapi_builder::servers_for;
use indexmap::IndexMap;
use log::debug;
use minijinja::syntax::SyntaxConfig;
use minijinja::{context, Environment};
use once_cell::sync::Lazy;
use std::sync::{Arc, PoisonError, RwLock};

/// Instance name used by [`read_doc`] when none is given.
pub const DEFAULT_INSTANCE: &str = crate::config::DEFAULT_INSTANCE_NAME;

static REGISTRY: Lazy<RwLock<IndexMap<String, Arc<Spec>>>> =
    Lazy::new(|| RwLock::new(IndexMap::new()));

/// Metadata and document template of one generated document.
///
/// The template is the JSON document with placeholders for the fields below, so they
/// can be changed at runtime before the document is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spec {
    pub version: String,
    pub host: String,
    pub base_path: String,
    pub schemes: Vec<String>,
    pub title: String,
    pub description: String,
    pub instance_name: String,
    pub left_delim: String,
    pub right_delim: String,
    pub template: String,
}

impl Spec {
    /// Renders the document template with the current metadata.
    pub fn read_doc(&self) -> Result<String, RuntimeError> {
        let render_error = |source| RuntimeError::Render {
            name: self.instance_name.clone(),
            source,
        };
        let env = template_env(&self.left_delim, &self.right_delim).map_err(render_error)?;
        let servers = servers_for(
            Some(self.host.as_str()),
            Some(self.base_path.as_str()),
            &self.schemes,
        );
        env.render_str(
            &self.template,
            context! {
                title => self.title,
                description => self.description,
                version => self.version,
                servers => servers,
            },
        )
        .map_err(render_error)
    }
}

/// A template environment whose variable delimiters are `left`/`right`.
///
/// Block and comment tags become `left%`/`%right` and `left#`/`#right`, so only text
/// starting with `left` is ever interpreted.
pub fn template_env(left: &str, right: &str) -> Result<Environment<'static>, minijinja::Error> {
    let syntax = SyntaxConfig::builder()
        .block_delimiters(format!("{}%", left), format!("%{}", right))
        .variable_delimiters(left.to_string(), right.to_string())
        .comment_delimiters(format!("{}#", left), format!("#{}", right))
        .build()?;
    let mut env = Environment::new();
    env.set_syntax(syntax);
    env.set_keep_trailing_newline(true);
    Ok(env)
}

/// Registers a document under its instance name.
///
/// # Errors
///
/// Returns [`RuntimeError::AlreadyRegistered`] if the name is taken.
pub fn register(spec: Spec) -> Result<(), RuntimeError> {
    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    if registry.contains_key(&spec.instance_name) {
        return Err(RuntimeError::AlreadyRegistered(spec.instance_name));
    }
    debug!("Registering OpenAPI document `{}`", spec.instance_name);
    registry.insert(spec.instance_name.clone(), Arc::new(spec));
    Ok(())
}

/// Registered document of one instance.
pub fn spec(name: &str) -> Option<Arc<Spec>> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .cloned()
}

/// Renders the document registered under `name`, or under [`DEFAULT_INSTANCE`].
pub fn read_doc(name: Option<&str>) -> Result<String, RuntimeError> {
    let name = name.unwrap_or(DEFAULT_INSTANCE);
    let spec = spec(name).ok_or_else(|| RuntimeError::NotRegistered(name.to_string()))?;
    spec.read_doc()
}

/// Names of all registered instances, in registration order.
pub fn registered_instances() -> Vec<String> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .keys()
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample(instance: &str, left: &str, right: &str) -> Spec {
        Spec {
            version: "1.0".to_string(),
            host: "api.example.com".to_string(),
            base_path: "/v1".to_string(),
            schemes: vec!["https".to_string()],
            title: "Pets \"v1\"".to_string(),
            description: String::new(),
            instance_name: instance.to_string(),
            left_delim: left.to_string(),
            right_delim: right.to_string(),
            template: format!(
                "{{\"title\": {l} title|tojson {r}, \"servers\": {l} servers|tojson {r}}}",
                l = left,
                r = right
            ),
        }
    }

    #[test]
    fn test_read_doc_substitutes_metadata() {
        let doc = sample("runtime_substitutes", "{{", "}}").read_doc().unwrap();
        let value: serde_json::Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(value["title"], "Pets \"v1\"");
        assert_eq!(value["servers"][0]["url"], "https://api.example.com/v1");
    }

    #[test]
    fn test_custom_delimiters() {
        let mut spec = sample("runtime_custom", "[[", "]]");
        spec.template = format!("{} {{{{ literal }}}}", spec.template);
        let doc = spec.read_doc().unwrap();
        assert!(doc.ends_with("{{ literal }}"));
        assert!(doc.contains("\"Pets \\\"v1\\\"\""));
    }

    #[test]
    fn test_register_and_read_back() {
        register(sample("runtime_registered", "{{", "}}")).unwrap();
        assert!(registered_instances().contains(&"runtime_registered".to_string()));
        let doc = read_doc(Some("runtime_registered")).unwrap();
        assert!(doc.contains("api.example.com"));
    }

    #[test]
    fn test_register_twice_fails() {
        register(sample("runtime_twice", "{{", "}}")).unwrap();
        let err = register(sample("runtime_twice", "{{", "}}")).unwrap_err();
        assert!(matches!(err, RuntimeError::AlreadyRegistered(name) if name == "runtime_twice"));
    }

    #[test]
    fn test_read_unknown_instance() {
        let err = read_doc(Some("runtime_missing")).unwrap_err();
        assert!(matches!(err, RuntimeError::NotRegistered(_)));
    }
}
