//! General API information from the main file's crate docs.

use super::{AnnotationBlock, AssetContext};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contact {
    pub name: Option<String>,
    pub url: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct License {
    pub name: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalDocs {
    pub description: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagInfo {
    pub name: String,
    pub description: Option<String>,
    pub external_docs: Option<ExternalDocs>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecuritySchemeKind {
    Basic,
    ApiKey { location: String, name: String },
    Bearer { format: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityDefinition {
    pub name: String,
    pub kind: SecuritySchemeKind,
    pub description: Option<String>,
}

/// Document-wide metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneralInfo {
    pub title: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub terms_of_service: Option<String>,
    pub contact: Option<Contact>,
    pub license: Option<License>,
    pub host: Option<String>,
    pub base_path: Option<String>,
    pub schemes: Vec<String>,
    pub tags: Vec<TagInfo>,
    pub external_docs: Option<ExternalDocs>,
    pub security: Vec<SecurityDefinition>,
}

/// What the attribute lines (`@in`, `@tag.description`, ...) currently apply to.
#[derive(Clone, Copy)]
enum Target {
    None,
    Tag(usize),
    Security(usize),
}

impl GeneralInfo {
    /// Reads the general info tags of a block, substituting markdown files where asked.
    pub fn from_block(block: &AnnotationBlock, assets: &AssetContext) -> (Self, Vec<String>) {
        let mut info = GeneralInfo::default();
        let mut errors = Vec::new();
        let mut target = Target::None;

        for field in &block.fields {
            let value = field.value.trim();
            match field.tag.as_str() {
                "title" => info.title = Some(value.to_string()),
                "version" => info.version = Some(value.to_string()),
                "description" => match target {
                    // A description right after a security definition describes it
                    Target::Security(idx) => {
                        info.security[idx].description = Some(value.to_string())
                    }
                    _ => append_line(&mut info.description, value),
                },
                "description.markdown" => {
                    let name = if value.is_empty() { "api" } else { value };
                    match assets.read_markdown(name) {
                        Ok(text) => info.description = Some(text),
                        Err(e) => errors.push(format!("@description.markdown: {}", e)),
                    }
                }
                "termsofservice" => info.terms_of_service = Some(value.to_string()),
                "contact.name" => {
                    info.contact.get_or_insert_with(Contact::default).name = Some(value.to_string())
                }
                "contact.url" => {
                    info.contact.get_or_insert_with(Contact::default).url = Some(value.to_string())
                }
                "contact.email" => {
                    info.contact.get_or_insert_with(Contact::default).email = Some(value.to_string())
                }
                "license.name" => {
                    info.license.get_or_insert_with(License::default).name = value.to_string()
                }
                "license.url" => {
                    info.license.get_or_insert_with(License::default).url = Some(value.to_string())
                }
                "host" => info.host = Some(value.to_string()),
                "basepath" => info.base_path = Some(value.to_string()),
                "schemes" => {
                    info.schemes = value.split_whitespace().map(String::from).collect();
                }
                "externaldocs.description" => {
                    info.external_docs.get_or_insert_with(ExternalDocs::default).description =
                        Some(value.to_string());
                }
                "externaldocs.url" => {
                    info.external_docs.get_or_insert_with(ExternalDocs::default).url = value.to_string();
                }
                "tag.name" => {
                    if value.is_empty() {
                        errors.push("@tag.name requires a value".to_string());
                        target = Target::None;
                        continue;
                    }
                    info.tags.push(TagInfo {
                        name: value.to_string(),
                        ..TagInfo::default()
                    });
                    target = Target::Tag(info.tags.len() - 1);
                }
                "tag.description" | "tag.description.markdown" | "tag.docs.url" | "tag.docs.description" => {
                    let Target::Tag(idx) = target else {
                        errors.push(format!("@{} without a preceding @tag.name", field.raw_tag));
                        continue;
                    };
                    let tag = &mut info.tags[idx];
                    match field.tag.as_str() {
                        "tag.description" => append_line(&mut tag.description, value),
                        "tag.description.markdown" => match assets.read_markdown(&tag.name) {
                            Ok(text) => tag.description = Some(text),
                            Err(e) => errors.push(format!("@tag.description.markdown: {}", e)),
                        },
                        "tag.docs.url" => {
                            tag.external_docs.get_or_insert_with(ExternalDocs::default).url = value.to_string();
                        }
                        _ => {
                            tag.external_docs.get_or_insert_with(ExternalDocs::default).description =
                                Some(value.to_string());
                        }
                    }
                }
                tag if tag.starts_with("securitydefinitions.") => {
                    let kind = match &tag["securitydefinitions.".len()..] {
                        "basic" => SecuritySchemeKind::Basic,
                        "apikey" => SecuritySchemeKind::ApiKey {
                            location: String::new(),
                            name: String::new(),
                        },
                        "bearer" => SecuritySchemeKind::Bearer { format: None },
                        other => {
                            errors.push(format!("unsupported security definition `{}`", other));
                            target = Target::None;
                            continue;
                        }
                    };
                    if value.is_empty() {
                        errors.push(format!("@{} requires a name", field.raw_tag));
                        target = Target::None;
                        continue;
                    }
                    info.security.push(SecurityDefinition {
                        name: value.to_string(),
                        kind,
                        description: None,
                    });
                    target = Target::Security(info.security.len() - 1);
                }
                "in" | "name" | "bearerformat" => {
                    let Target::Security(idx) = target else {
                        continue;
                    };
                    match (&mut info.security[idx].kind, field.tag.as_str()) {
                        (SecuritySchemeKind::ApiKey { location, .. }, "in") => {
                            *location = value.to_string()
                        }
                        (SecuritySchemeKind::ApiKey { name, .. }, "name") => *name = value.to_string(),
                        (SecuritySchemeKind::Bearer { format }, "bearerformat") => {
                            *format = Some(value.to_string())
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        for definition in &info.security {
            if let SecuritySchemeKind::ApiKey { location, name } = &definition.kind {
                if location.is_empty() || name.is_empty() {
                    errors.push(format!(
                        "@securityDefinitions.apikey {} needs both @in and @name",
                        definition.name
                    ));
                }
            }
        }

        (info, errors)
    }
}

fn append_line(slot: &mut Option<String>, value: &str) {
    match slot {
        Some(existing) => {
            existing.push('\n');
            existing.push_str(value);
        }
        None => *slot = Some(value.to_string()),
    }
}
