use crate::annotation::general::{self, GeneralInfo, SecuritySchemeKind};
use crate::annotation::operation::{HttpMethod, ParamAnnotation, ParamLocation};
use crate::config::CollectionFormat;
use crate::error::ResolveError;
use crate::schema_generator::{Schema, SchemaGenerator, SchemaTypeValue};
use crate::schema_registry::{Primitive, SchemaRegistry, TypeRef};
use crate::type_resolver::ResolvedOperation;
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// OpenAPI document builder
pub struct OpenApiBuilder {
    openapi_3_1: bool,
    collection_format: CollectionFormat,
    generator: SchemaGenerator,
    info: Info,
    servers: Vec<Server>,
    tags: Vec<Tag>,
    external_docs: Option<ExternalDocs>,
    security_schemes: BTreeMap<String, SecurityScheme>,
    /// Paths collection (URL path -> PathItem)
    paths: BTreeMap<String, PathItem>,
    /// (method, path) -> declaring location
    routes: HashMap<(HttpMethod, String), String>,
    /// operation id -> declaring location
    operation_ids: HashMap<String, String>,
}

/// OpenAPI Info object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Info {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalDocs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_docs: Option<ExternalDocs>,
}

/// OpenAPI PathItem object - represents all operations for a single path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Operation>,
}

impl PathItem {
    fn slot(&mut self, method: HttpMethod) -> &mut Option<Operation> {
        match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Trace => &mut self.trace,
        }
    }

    /// Operations in document order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        [
            &self.get,
            &self.put,
            &self.post,
            &self.delete,
            &self.options,
            &self.head,
            &self.patch,
            &self.trace,
        ]
        .into_iter()
        .flatten()
    }
}

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: IndexMap<String, Response>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<IndexMap<String, Vec<String>>>,
    /// `x-` vendor extensions
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Parameter location (path, query, header, cookie)
    #[serde(rename = "in")]
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    pub schema: Schema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explode: Option<bool>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Content types and their schemas
    pub content: IndexMap<String, MediaType>,
    pub required: bool,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
}

/// OpenAPI Response object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, Header>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub content: IndexMap<String, MediaType>,
}

/// OpenAPI Header object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub schema: Schema,
}

/// OpenAPI SecurityScheme object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub scheme_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "in", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_format: Option<String>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub schemas: BTreeMap<String, Schema>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub security_schemes: BTreeMap<String, SecurityScheme>,
}

/// Complete OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenApiDocument {
    /// OpenAPI version
    pub openapi: String,
    pub info: Info,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    pub paths: BTreeMap<String, PathItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_docs: Option<ExternalDocs>,
}

impl OpenApiBuilder {
    /// Create a new OpenApiBuilder targeting OpenAPI 3.0 or 3.1
    pub fn new(openapi_3_1: bool, collection_format: CollectionFormat) -> Self {
        debug!("Initializing OpenApiBuilder (3.1: {})", openapi_3_1);
        Self {
            openapi_3_1,
            collection_format,
            generator: SchemaGenerator::new(openapi_3_1),
            info: Info::default(),
            servers: Vec::new(),
            tags: Vec::new(),
            external_docs: None,
            security_schemes: BTreeMap::new(),
            paths: BTreeMap::new(),
            routes: HashMap::new(),
            operation_ids: HashMap::new(),
        }
    }

    /// Applies the general API information.
    pub fn with_general(mut self, general: &GeneralInfo) -> Self {
        self.info = Info {
            title: general.title.clone().unwrap_or_default(),
            description: general.description.clone(),
            terms_of_service: general.terms_of_service.clone(),
            contact: general.contact.as_ref().map(|c| Contact {
                name: c.name.clone(),
                url: c.url.clone(),
                email: c.email.clone(),
            }),
            license: general.license.as_ref().map(|l| License {
                name: l.name.clone(),
                url: l.url.clone(),
            }),
            version: general.version.clone().unwrap_or_default(),
        };
        self.servers = servers_for(
            general.host.as_deref(),
            general.base_path.as_deref(),
            &general.schemes,
        );
        self.tags = general
            .tags
            .iter()
            .map(|t| Tag {
                name: t.name.clone(),
                description: t.description.clone(),
                external_docs: t.external_docs.as_ref().map(external_docs),
            })
            .collect();
        self.external_docs = general.external_docs.as_ref().map(external_docs);
        self.security_schemes = general
            .security
            .iter()
            .map(|definition| {
                let mut scheme = SecurityScheme {
                    scheme_type: "http".to_string(),
                    description: definition.description.clone(),
                    name: None,
                    location: None,
                    scheme: None,
                    bearer_format: None,
                };
                match &definition.kind {
                    SecuritySchemeKind::Basic => scheme.scheme = Some("basic".to_string()),
                    SecuritySchemeKind::Bearer { format } => {
                        scheme.scheme = Some("bearer".to_string());
                        scheme.bearer_format = format.clone();
                    }
                    SecuritySchemeKind::ApiKey { location, name } => {
                        scheme.scheme_type = "apiKey".to_string();
                        scheme.location = Some(location.clone());
                        scheme.name = Some(name.clone());
                    }
                }
                (definition.name.clone(), scheme)
            })
            .collect();
        self
    }

    /// Adds every route of a resolved operation.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::DuplicateRoute`] when a method and path were already
    /// declared, and [`ResolveError::DuplicateOperationId`] for a reused `@ID`.
    pub fn add_operation(&mut self, resolved: &ResolvedOperation) -> Result<(), ResolveError> {
        let annotation = &resolved.annotation;

        if let Some(id) = &annotation.id {
            if let Some(first) = self.operation_ids.get(id) {
                return Err(ResolveError::DuplicateOperationId {
                    id: id.clone(),
                    first: first.clone(),
                    second: resolved.location.clone(),
                });
            }
        }
        let paths: Vec<(HttpMethod, String)> = annotation
            .routes
            .iter()
            .map(|route| (route.method, Self::convert_path_format(&route.path)))
            .collect();
        for (method, path) in &paths {
            if let Some(first) = self.routes.get(&(*method, path.clone())) {
                return Err(ResolveError::DuplicateRoute {
                    method: method.to_string(),
                    path: path.clone(),
                    first: first.clone(),
                    second: resolved.location.clone(),
                });
            }
        }

        let operation = self.build_operation(resolved);
        if let Some(id) = &annotation.id {
            self.operation_ids.insert(id.clone(), resolved.location.clone());
        }
        for (method, path) in paths {
            debug!("Adding route: {} {}", method, path);
            self.routes
                .insert((method, path.clone()), resolved.location.clone());
            *self.paths.entry(path).or_default().slot(method) = Some(operation.clone());
        }
        Ok(())
    }

    fn build_operation(&self, resolved: &ResolvedOperation) -> Operation {
        let annotation = &resolved.annotation;
        let mut parameters = Vec::new();
        let mut request_body = None;
        let mut form = Schema {
            schema_type: Some(SchemaTypeValue::single("object")),
            ..Schema::default()
        };
        let mut form_has_file = false;

        for (param, ty) in annotation.params.iter().zip(&resolved.params) {
            let Some(ty) = ty else {
                debug!("Parameter {} of {} dropped by override", param.name, resolved.location);
                continue;
            };
            match param.location {
                ParamLocation::Body => {
                    let schema = self.generator.type_schema(ty);
                    let content = media_types(&annotation.accept, "application/json")
                        .into_iter()
                        .map(|mime| (mime, MediaType { schema: schema.clone() }))
                        .collect();
                    request_body = Some(RequestBody {
                        description: non_empty(&param.description),
                        content,
                        required: param.required,
                    });
                }
                ParamLocation::FormData => {
                    form_has_file |= is_file(ty);
                    let mut schema = self.generator.parameter_schema(ty, &param.attrs);
                    if schema.reference.is_none() && schema.description.is_none() {
                        schema.description = non_empty(&param.description);
                    }
                    if param.required {
                        form.required.push(param.name.clone());
                    }
                    form.properties.insert(param.name.clone(), schema);
                }
                _ => parameters.push(self.parameter(param, ty)),
            }
        }

        if !form.properties.is_empty() {
            let mime = if form_has_file {
                "multipart/form-data".to_string()
            } else {
                annotation
                    .accept
                    .iter()
                    .find(|m| *m == "application/x-www-form-urlencoded" || *m == "multipart/form-data")
                    .cloned()
                    .unwrap_or_else(|| "multipart/form-data".to_string())
            };
            let required = !form.required.is_empty();
            request_body = Some(RequestBody {
                description: None,
                content: IndexMap::from([(mime, MediaType { schema: form })]),
                required,
            });
        }

        let mut responses: IndexMap<String, Response> = IndexMap::new();
        for (response, ty) in annotation.responses.iter().zip(&resolved.responses) {
            for code in &response.codes {
                let mut entry = Response {
                    description: response
                        .description
                        .clone()
                        .unwrap_or_else(|| status_text(code).to_string()),
                    ..Response::default()
                };
                if let Some(ty) = ty {
                    let schema = self.generator.type_schema(ty);
                    entry.content = media_types(&annotation.produce, "application/json")
                        .into_iter()
                        .map(|mime| (mime, MediaType { schema: schema.clone() }))
                        .collect();
                }
                responses.insert(code.clone(), entry);
            }
        }
        if responses.is_empty() {
            // Default response when no response is documented
            responses.insert(
                "200".to_string(),
                Response {
                    description: "Successful response".to_string(),
                    ..Response::default()
                },
            );
        }

        for (header, ty) in annotation.headers.iter().zip(&resolved.headers) {
            let Some(ty) = ty else {
                continue;
            };
            let value = Header {
                description: header.description.clone(),
                schema: self.generator.type_schema(ty),
            };
            for (code, response) in responses.iter_mut() {
                if header.codes.is_empty() || header.codes.contains(code) {
                    response.headers.insert(header.name.clone(), value.clone());
                }
            }
        }

        let mut extensions = annotation.extensions.clone();
        if !annotation.code_samples.is_empty() {
            let samples: Vec<Value> = annotation
                .code_samples
                .iter()
                .map(|s| serde_json::json!({"lang": s.lang, "source": s.source}))
                .collect();
            extensions.insert("x-codeSamples".to_string(), Value::Array(samples));
        }

        Operation {
            tags: annotation.tags.clone(),
            summary: annotation.summary.clone(),
            description: annotation.description.clone(),
            operation_id: annotation.id.clone(),
            parameters,
            request_body,
            responses,
            deprecated: annotation.deprecated,
            security: annotation.security.clone(),
            extensions,
        }
    }

    fn parameter(&self, param: &ParamAnnotation, ty: &TypeRef) -> Parameter {
        let mut parameter = Parameter {
            name: param.name.clone(),
            location: param.location.as_str().to_string(),
            description: non_empty(&param.description),
            required: param.required,
            schema: self.generator.parameter_schema(ty, &param.attrs),
            style: None,
            explode: None,
            extensions: IndexMap::new(),
        };

        if matches!(ty, TypeRef::Array(_)) && param.location == ParamLocation::Query {
            let format = match param.attrs.collection_format.as_deref() {
                Some(text) => text.parse::<CollectionFormat>().unwrap_or_else(|_| {
                    warn!(
                        "Unknown collectionFormat `{}` on parameter {}; using {}",
                        text, param.name, self.collection_format
                    );
                    self.collection_format
                }),
                None => self.collection_format,
            };
            let (style, explode) = match format {
                CollectionFormat::Csv => ("form", false),
                CollectionFormat::Multi => ("form", true),
                CollectionFormat::Ssv => ("spaceDelimited", false),
                CollectionFormat::Pipes => ("pipeDelimited", false),
                CollectionFormat::Tsv => {
                    // OpenAPI 3 has no tab style
                    parameter
                        .extensions
                        .insert("x-collection-format".to_string(), Value::from("tsv"));
                    ("form", false)
                }
            };
            parameter.style = Some(style.to_string());
            parameter.explode = Some(explode);
        }
        parameter
    }

    /// Convert path format from :param to OpenAPI {param} format
    fn convert_path_format(path: &str) -> String {
        let converted_parts: Vec<String> = path
            .split('/')
            .map(|part| match part.strip_prefix(':') {
                Some(name) => format!("{{{}}}", name),
                None => part.to_string(),
            })
            .collect();

        converted_parts.join("/")
    }

    /// Build the final OpenAPI document.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnresolvedReference`] if any schema reference in the
    /// document has no component.
    pub fn build(self, registry: &SchemaRegistry) -> Result<OpenApiDocument, ResolveError> {
        debug!("Building final OpenAPI document");

        let snapshot = registry.snapshot();
        let schemas = self.generator.components(snapshot.values().map(|s| s.as_ref()));

        let mut referenced = BTreeSet::new();
        {
            let mut names = Vec::new();
            for schema in schemas.values() {
                schema.collect_references(&mut names);
            }
            for item in self.paths.values() {
                for operation in item.operations() {
                    collect_operation_references(operation, &mut names);
                }
            }
            referenced.extend(names.into_iter().map(String::from));
        }
        if let Some(missing) = referenced.iter().find(|name| !schemas.contains_key(*name)) {
            return Err(ResolveError::UnresolvedReference {
                context: "components".to_string(),
                reference: missing.clone(),
            });
        }

        let components = if schemas.is_empty() && self.security_schemes.is_empty() {
            None
        } else {
            Some(Components {
                schemas,
                security_schemes: self.security_schemes,
            })
        };

        Ok(OpenApiDocument {
            openapi: if self.openapi_3_1 { "3.1.0" } else { "3.0.3" }.to_string(),
            info: self.info,
            servers: self.servers,
            paths: self.paths,
            components,
            tags: self.tags,
            external_docs: self.external_docs,
        })
    }
}

fn collect_operation_references<'a>(operation: &'a Operation, out: &mut Vec<&'a str>) {
    for parameter in &operation.parameters {
        parameter.schema.collect_references(out);
    }
    if let Some(body) = &operation.request_body {
        for media in body.content.values() {
            media.schema.collect_references(out);
        }
    }
    for response in operation.responses.values() {
        for media in response.content.values() {
            media.schema.collect_references(out);
        }
        for header in response.headers.values() {
            header.schema.collect_references(out);
        }
    }
}

/// Server URLs from host, base path and schemes.
///
/// One server per scheme; a scheme-relative URL without schemes; the base path alone
/// without a host.
pub fn servers_for(host: Option<&str>, base_path: Option<&str>, schemes: &[String]) -> Vec<Server> {
    let base_path = base_path.unwrap_or_default();
    match host.filter(|h| !h.is_empty()) {
        Some(host) if !schemes.is_empty() => schemes
            .iter()
            .map(|scheme| Server {
                url: format!("{}://{}{}", scheme, host, base_path),
            })
            .collect(),
        Some(host) => vec![Server {
            url: format!("//{}{}", host, base_path),
        }],
        None if !base_path.is_empty() => vec![Server {
            url: base_path.to_string(),
        }],
        None => Vec::new(),
    }
}

fn external_docs(docs: &general::ExternalDocs) -> ExternalDocs {
    ExternalDocs {
        description: docs.description.clone(),
        url: docs.url.clone(),
    }
}

fn media_types(declared: &[String], fallback: &str) -> Vec<String> {
    if declared.is_empty() {
        vec![fallback.to_string()]
    } else {
        declared.to_vec()
    }
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn is_file(ty: &TypeRef) -> bool {
    match ty {
        TypeRef::Primitive(Primitive::Binary) => true,
        TypeRef::Array(inner) => is_file(inner),
        _ => false,
    }
}

/// Reason phrase used when a response has no description.
fn status_text(code: &str) -> &'static str {
    match code {
        "100" => "Continue",
        "101" => "Switching Protocols",
        "200" => "OK",
        "201" => "Created",
        "202" => "Accepted",
        "204" => "No Content",
        "206" => "Partial Content",
        "207" => "Multi-Status",
        "301" => "Moved Permanently",
        "302" => "Found",
        "304" => "Not Modified",
        "307" => "Temporary Redirect",
        "308" => "Permanent Redirect",
        "400" => "Bad Request",
        "401" => "Unauthorized",
        "403" => "Forbidden",
        "404" => "Not Found",
        "405" => "Method Not Allowed",
        "406" => "Not Acceptable",
        "409" => "Conflict",
        "410" => "Gone",
        "412" => "Precondition Failed",
        "413" => "Payload Too Large",
        "415" => "Unsupported Media Type",
        "422" => "Unprocessable Entity",
        "429" => "Too Many Requests",
        "500" => "Internal Server Error",
        "501" => "Not Implemented",
        "502" => "Bad Gateway",
        "503" => "Service Unavailable",
        "504" => "Gateway Timeout",
        "default" => "Default response",
        _ => "Response",
    }
}
