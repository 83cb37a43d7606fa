//! Operation annotations on handler functions.

use super::{split_fields, unquote, AnnotationBlock, AssetContext};
use crate::index::TypeExpr;
use indexmap::IndexMap;
use std::fmt;

/// HTTP methods accepted by `@Router`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
    Trace,
}

impl HttpMethod {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "get" => Some(HttpMethod::Get),
            "post" => Some(HttpMethod::Post),
            "put" => Some(HttpMethod::Put),
            "delete" => Some(HttpMethod::Delete),
            "patch" => Some(HttpMethod::Patch),
            "options" => Some(HttpMethod::Options),
            "head" => Some(HttpMethod::Head),
            "trace" => Some(HttpMethod::Trace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Cookie,
    Body,
    FormData,
}

impl ParamLocation {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "path" => Some(ParamLocation::Path),
            "query" => Some(ParamLocation::Query),
            "header" => Some(ParamLocation::Header),
            "cookie" => Some(ParamLocation::Cookie),
            "body" => Some(ParamLocation::Body),
            "formdata" => Some(ParamLocation::FormData),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Header => "header",
            ParamLocation::Cookie => "cookie",
            ParamLocation::Body => "body",
            ParamLocation::FormData => "formData",
        }
    }
}

/// Trailing `key(value)` attributes of a `@Param` line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamAttrs {
    pub default: Option<String>,
    pub enums: Vec<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub format: Option<String>,
    pub example: Option<String>,
    pub collection_format: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamAnnotation {
    pub name: String,
    pub location: ParamLocation,
    pub ty: TypeExpr,
    pub required: bool,
    pub description: String,
    pub attrs: ParamAttrs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseAnnotation {
    /// Status codes, or `default`
    pub codes: Vec<String>,
    /// Body type; `None` for responses without content
    pub ty: Option<TypeExpr>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderAnnotation {
    /// Status codes the header applies to; empty means every response
    pub codes: Vec<String>,
    pub ty: TypeExpr,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAnnotation {
    pub path: String,
    pub method: HttpMethod,
}

/// One alternative of `@Security`: scheme name to scopes.
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSample {
    pub lang: String,
    pub source: String,
}

/// Everything declared in one handler's annotation block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationAnnotation {
    /// Name of the annotated function
    pub function: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub id: Option<String>,
    pub tags: Vec<String>,
    pub accept: Vec<String>,
    pub produce: Vec<String>,
    pub params: Vec<ParamAnnotation>,
    pub responses: Vec<ResponseAnnotation>,
    pub headers: Vec<HeaderAnnotation>,
    pub routes: Vec<RouteAnnotation>,
    pub security: Vec<SecurityRequirement>,
    pub deprecated: bool,
    pub code_samples: Vec<CodeSample>,
    /// `@x-name <json>` extensions, keyed with the `x-` prefix
    pub extensions: IndexMap<String, serde_json::Value>,
}

impl OperationAnnotation {
    /// Whether the block declares an operation at all.
    pub fn is_operation(block: &AnnotationBlock) -> bool {
        block.has("router")
    }

    /// Identifier used for markdown and code sample lookups.
    pub fn lookup_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.function)
    }

    /// Reads an operation block. Malformed lines are reported and skipped.
    pub fn from_block(
        function: &str,
        block: &AnnotationBlock,
        assets: &AssetContext,
    ) -> (Self, Vec<String>) {
        let mut op = OperationAnnotation {
            function: function.to_string(),
            ..OperationAnnotation::default()
        };
        let mut errors = Vec::new();
        let mut markdown: Option<String> = None;
        let mut wants_code_samples = false;

        for field in &block.fields {
            let value = field.value.trim();
            let result = match field.tag.as_str() {
                "summary" => {
                    op.summary = Some(value.to_string());
                    Ok(())
                }
                "description" => {
                    match &mut op.description {
                        Some(existing) => {
                            existing.push('\n');
                            existing.push_str(value);
                        }
                        None => op.description = Some(value.to_string()),
                    }
                    Ok(())
                }
                "description.markdown" => {
                    markdown = Some(value.to_string());
                    Ok(())
                }
                "id" => require(value, "@ID").map(|v| op.id = Some(v.to_string())),
                "tags" => {
                    op.tags.extend(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|t| !t.is_empty())
                            .map(String::from),
                    );
                    Ok(())
                }
                "accept" => parse_mime_list(value).map(|m| op.accept.extend(m)),
                "produce" => parse_mime_list(value).map(|m| op.produce.extend(m)),
                "param" => parse_param(value).map(|p| op.params.push(p)),
                "success" | "failure" | "response" => {
                    parse_response(value).map(|r| op.responses.push(r))
                }
                "header" => parse_header(value).map(|h| op.headers.push(h)),
                "router" => parse_router(value).map(|r| op.routes.push(r)),
                "security" => parse_security(value).map(|s| op.security.extend(s)),
                "deprecated" => {
                    op.deprecated = true;
                    Ok(())
                }
                "x-codesamples" => {
                    wants_code_samples = true;
                    Ok(())
                }
                tag if tag.starts_with("x-") => parse_extension(&field.raw_tag, value)
                    .map(|(name, v)| {
                        op.extensions.insert(name, v);
                    }),
                _ => Ok(()),
            };
            if let Err(message) = result {
                errors.push(message);
            }
        }

        if let Some(name) = markdown {
            let name = if name.is_empty() {
                op.lookup_id().to_string()
            } else {
                name
            };
            match assets.read_markdown(&name) {
                Ok(text) => op.description = Some(text),
                Err(e) => errors.push(format!("@Description.markdown: {}", e)),
            }
        }

        if wants_code_samples {
            match assets.read_code_samples(op.lookup_id()) {
                Ok(samples) => {
                    op.code_samples = samples
                        .into_iter()
                        .map(|(lang, source)| CodeSample { lang, source })
                        .collect();
                }
                Err(e) => errors.push(format!("@x-codeSamples: {}", e)),
            }
        }

        if op.routes.is_empty() && errors.is_empty() {
            errors.push("operation has no valid @Router".to_string());
        }

        (op, errors)
    }
}

fn require<'a>(value: &'a str, tag: &str) -> Result<&'a str, String> {
    if value.is_empty() {
        Err(format!("{} requires a value", tag))
    } else {
        Ok(value)
    }
}

/// Expands MIME aliases such as `json` or `mpfd`.
pub fn mime_alias(value: &str) -> Option<String> {
    let mime = match value.to_ascii_lowercase().as_str() {
        "json" => "application/json",
        "xml" => "text/xml",
        "plain" => "text/plain",
        "html" => "text/html",
        "mpfd" => "multipart/form-data",
        "x-www-form-urlencoded" => "application/x-www-form-urlencoded",
        "json-api" => "application/vnd.api+json",
        "json-stream" => "application/x-json-stream",
        "octet-stream" => "application/octet-stream",
        "png" => "image/png",
        "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        other if other.contains('/') => return Some(value.to_string()),
        _ => return None,
    };
    Some(mime.to_string())
}

fn parse_mime_list(value: &str) -> Result<Vec<String>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| mime_alias(m).ok_or_else(|| format!("unknown MIME type `{}`", m)))
        .collect()
}

fn parse_type(text: &str, line: &str) -> Result<TypeExpr, String> {
    TypeExpr::parse_annotation(text).ok_or_else(|| format!("invalid type `{}` in `{}`", text, line))
}

fn parse_param(value: &str) -> Result<ParamAnnotation, String> {
    let fields = split_fields(value);
    if fields.len() < 4 {
        return Err(format!(
            "@Param needs `name in type required \"comment\"`, got `{}`",
            value
        ));
    }
    let location = ParamLocation::parse(&fields[1])
        .ok_or_else(|| format!("@Param {}: unknown location `{}`", fields[0], fields[1]))?;
    let ty = parse_type(&fields[2], value)?;
    let required = match fields[3].to_ascii_lowercase().as_str() {
        "true" => true,
        "false" => false,
        other => {
            return Err(format!(
                "@Param {}: required must be true or false, got `{}`",
                fields[0], other
            ))
        }
    };
    let mut rest = fields[4..].iter().peekable();
    let description = match rest.peek() {
        Some(field) if field.starts_with('"') => {
            let description = unquote(field);
            rest.next();
            description
        }
        _ => String::new(),
    };
    let mut attrs = ParamAttrs::default();
    for attr in rest {
        apply_param_attr(&mut attrs, attr).map_err(|e| format!("@Param {}: {}", fields[0], e))?;
    }
    // Path parameters are always required
    let required = required || location == ParamLocation::Path;
    Ok(ParamAnnotation {
        name: fields[0].clone(),
        location,
        ty,
        required,
        description,
        attrs,
    })
}

fn apply_param_attr(attrs: &mut ParamAttrs, attr: &str) -> Result<(), String> {
    let open = attr.find('(').ok_or_else(|| format!("malformed attribute `{}`", attr))?;
    let inner = attr[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| format!("malformed attribute `{}`", attr))?;
    let inner = unquote(inner);
    let number = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|_| format!("`{}` expects a number, got `{}`", &attr[..open], v))
    };
    let length = |v: &str| {
        v.trim()
            .parse::<u64>()
            .map_err(|_| format!("`{}` expects an integer, got `{}`", &attr[..open], v))
    };
    match attr[..open].to_ascii_lowercase().as_str() {
        "default" => attrs.default = Some(inner),
        "enums" => {
            attrs.enums = inner
                .split(',')
                .map(|v| unquote(v.trim()))
                .filter(|v| !v.is_empty())
                .collect();
        }
        "minimum" => attrs.minimum = Some(number(&inner)?),
        "maximum" => attrs.maximum = Some(number(&inner)?),
        "minlength" => attrs.min_length = Some(length(&inner)?),
        "maxlength" => attrs.max_length = Some(length(&inner)?),
        "format" => attrs.format = Some(inner),
        "example" => attrs.example = Some(inner),
        "collectionformat" => attrs.collection_format = Some(inner),
        other => return Err(format!("unknown attribute `{}`", other)),
    }
    Ok(())
}

fn parse_codes(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

fn is_status_code(code: &str) -> bool {
    code == "default" || (code.len() == 3 && code.chars().all(|c| c.is_ascii_digit()))
}

fn parse_response(value: &str) -> Result<ResponseAnnotation, String> {
    let fields = split_fields(value);
    let mut iter = fields.iter().peekable();
    let codes = iter
        .next()
        .map(|c| parse_codes(c))
        .filter(|codes| !codes.is_empty() && codes.iter().all(|c| is_status_code(c)))
        .ok_or_else(|| format!("response needs a status code, got `{}`", value))?;

    let mut kind: Option<String> = None;
    if let Some(field) = iter.peek() {
        if let Some(inner) = field.strip_prefix('{').and_then(|f| f.strip_suffix('}')) {
            kind = Some(inner.trim().to_ascii_lowercase());
            iter.next();
        }
    }

    let mut type_text: Option<String> = None;
    if let Some(field) = iter.peek() {
        if !field.starts_with('"') {
            type_text = Some(field.to_string());
            iter.next();
        }
    }

    let description = iter.next().map(|d| unquote(d)).filter(|d| !d.is_empty());

    let ty = match (kind.as_deref(), type_text) {
        (Some("array"), Some(text)) => Some(TypeExpr::Array(Box::new(parse_type(&text, value)?))),
        (Some("array"), None) => {
            return Err(format!("{{array}} needs an element type in `{}`", value))
        }
        (Some("object"), None) => Some(TypeExpr::path(&["object"])),
        (Some(primitive), None) => Some(TypeExpr::path(&[primitive])),
        (_, Some(text)) => Some(parse_type(&text, value)?),
        (None, None) => None,
    };

    Ok(ResponseAnnotation {
        codes,
        ty,
        description,
    })
}

fn parse_header(value: &str) -> Result<HeaderAnnotation, String> {
    let fields = split_fields(value);
    if fields.len() < 3 {
        return Err(format!(
            "@Header needs `code {{type}} name \"comment\"`, got `{}`",
            value
        ));
    }
    let codes = if fields[0].eq_ignore_ascii_case("all") {
        Vec::new()
    } else {
        let codes = parse_codes(&fields[0]);
        if codes.is_empty() || !codes.iter().all(|c| is_status_code(c)) {
            return Err(format!("@Header: invalid status code `{}`", fields[0]));
        }
        codes
    };
    let type_text = fields[1]
        .strip_prefix('{')
        .and_then(|f| f.strip_suffix('}'))
        .ok_or_else(|| format!("@Header: type must be written as {{type}}, got `{}`", fields[1]))?;
    Ok(HeaderAnnotation {
        codes,
        ty: parse_type(type_text, value)?,
        name: fields[2].clone(),
        description: fields.get(3).map(|d| unquote(d)).filter(|d| !d.is_empty()),
    })
}

fn parse_router(value: &str) -> Result<RouteAnnotation, String> {
    let fields = split_fields(value);
    let [path, method, ..] = fields.as_slice() else {
        return Err(format!("@Router needs `/path [method]`, got `{}`", value));
    };
    if !path.starts_with('/') {
        return Err(format!("@Router path must start with `/`, got `{}`", path));
    }
    let method_text = method
        .strip_prefix('[')
        .and_then(|m| m.strip_suffix(']'))
        .ok_or_else(|| format!("@Router method must be written as [method], got `{}`", method))?;
    let method = HttpMethod::parse(method_text.trim())
        .ok_or_else(|| format!("@Router: unknown method `{}`", method_text))?;
    Ok(RouteAnnotation {
        path: path.clone(),
        method,
    })
}

/// `A && B[read,write] || C` gives two alternatives: {A, B} and {C}.
fn parse_security(value: &str) -> Result<Vec<SecurityRequirement>, String> {
    let mut alternatives = Vec::new();
    for alternative in value.split("||") {
        let mut requirement = SecurityRequirement::new();
        for scheme in alternative.split("&&").map(str::trim).filter(|s| !s.is_empty()) {
            let (name, scopes) = match scheme.find('[') {
                Some(open) => {
                    let scopes = scheme[open + 1..]
                        .strip_suffix(']')
                        .ok_or_else(|| format!("@Security: unterminated scopes in `{}`", scheme))?;
                    let scopes = scopes
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect();
                    (scheme[..open].trim().to_string(), scopes)
                }
                None => (scheme.to_string(), Vec::new()),
            };
            requirement.insert(name, scopes);
        }
        if requirement.is_empty() {
            return Err(format!("@Security needs a scheme name, got `{}`", value));
        }
        alternatives.push(requirement);
    }
    Ok(alternatives)
}

fn parse_extension(raw_tag: &str, value: &str) -> Result<(String, serde_json::Value), String> {
    let name = raw_tag.to_string();
    if value.is_empty() {
        return Err(format!("@{} requires a JSON value", raw_tag));
    }
    let parsed = serde_json::from_str(value)
        .map_err(|e| format!("@{}: value is not valid JSON: {}", raw_tag, e))?;
    Ok((name, parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn parse(lines: &[&str]) -> (OperationAnnotation, Vec<String>) {
        let block = AnnotationBlock::parse(lines);
        OperationAnnotation::from_block("get_account", &block, &AssetContext::default())
    }

    #[test]
    fn test_full_operation() {
        let (op, errors) = parse(&[
            "@Summary Show an account",
            "@Description get account by ID",
            "@ID getAccount",
            "@Tags accounts, admin",
            "@Accept json",
            "@Produce json,xml",
            "@Param id path int true \"Account ID\" minimum(1)",
            "@Param q query string false \"name search\" enums(a, b) default(a)",
            "@Success 200 {object} models.Account",
            "@Failure 400,404 {object} httputil.HTTPError \"bad\"",
            "@Header 200 {string} Token \"qwerty\"",
            "@Security ApiKeyAuth && OAuth2[read, write] || BasicAuth",
            "@Router /accounts/{id} [get]",
            "@Deprecated",
            "@x-rate-limit {\"per_minute\": 10}",
        ]);
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(op.id.as_deref(), Some("getAccount"));
        assert_eq!(op.tags, vec!["accounts", "admin"]);
        assert_eq!(op.accept, vec!["application/json"]);
        assert_eq!(op.produce, vec!["application/json", "text/xml"]);
        assert_eq!(op.params.len(), 2);
        assert_eq!(op.params[0].location, ParamLocation::Path);
        assert_eq!(op.params[0].description, "Account ID");
        assert_eq!(op.params[0].attrs.minimum, Some(1.0));
        assert_eq!(op.params[1].attrs.enums, vec!["a", "b"]);
        assert_eq!(op.params[1].attrs.default.as_deref(), Some("a"));
        assert_eq!(op.responses[0].codes, vec!["200"]);
        assert_eq!(op.responses[0].ty, Some(TypeExpr::path(&["models", "Account"])));
        assert_eq!(op.responses[1].codes, vec!["400", "404"]);
        assert_eq!(op.responses[1].description.as_deref(), Some("bad"));
        assert_eq!(op.headers[0].name, "Token");
        assert_eq!(op.security.len(), 2);
        assert_eq!(op.security[0]["OAuth2"], vec!["read", "write"]);
        assert!(op.security[1].contains_key("BasicAuth"));
        assert_eq!(
            op.routes,
            vec![RouteAnnotation {
                path: "/accounts/{id}".to_string(),
                method: HttpMethod::Get
            }]
        );
        assert!(op.deprecated);
        assert_eq!(op.extensions["x-rate-limit"]["per_minute"], 10);
    }

    #[test]
    fn test_array_and_primitive_responses() {
        let (op, errors) = parse(&[
            "@Success 200 {array} Account",
            "@Success 201 {string} string \"created\"",
            "@Success 204",
            "@Router /a [post]",
        ]);
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(
            op.responses[0].ty,
            Some(TypeExpr::Array(Box::new(TypeExpr::path(&["Account"]))))
        );
        assert_eq!(op.responses[1].ty, Some(TypeExpr::path(&["string"])));
        assert_eq!(op.responses[2].ty, None);
    }

    #[test]
    fn test_malformed_lines_are_reported() {
        let (op, errors) = parse(&[
            "@Param id path",
            "@Success ok {object} A",
            "@Router /a [fetch]",
        ]);
        assert!(op.params.is_empty());
        assert!(op.routes.is_empty());
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_multiple_routers() {
        let (op, errors) = parse(&["@Router /a [get]", "@Router /b [put]"]);
        assert!(errors.is_empty());
        assert_eq!(op.routes.len(), 2);
        assert_eq!(op.routes[1].method, HttpMethod::Put);
    }

    #[test]
    fn test_code_samples_and_markdown() {
        let temp_dir = TempDir::new().unwrap();
        let examples = temp_dir.path().join("examples");
        let markdown = temp_dir.path().join("md");
        fs::create_dir_all(&examples).unwrap();
        fs::create_dir_all(&markdown).unwrap();
        fs::write(examples.join("getAccount.sh"), "curl /accounts/1").unwrap();
        fs::write(markdown.join("getAccount.md"), "Long description").unwrap();
        let assets = AssetContext {
            markdown_dir: Some(markdown),
            code_examples_dir: Some(examples),
        };
        let block = AnnotationBlock::parse(&[
            "@ID getAccount",
            "@Description.markdown",
            "@x-codeSamples file",
            "@Router /accounts/{id} [get]",
        ]);
        let (op, errors) = OperationAnnotation::from_block("get_account", &block, &assets);
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(op.description.as_deref(), Some("Long description"));
        assert_eq!(
            op.code_samples,
            vec![CodeSample {
                lang: "shell".to_string(),
                source: "curl /accounts/1".to_string()
            }]
        );
    }
}
