//! Annotation blocks carried by doc comments.
//!
//! A block is the doc comment attached to one declaration. Inside it, a line starting
//! with `@tag` opens a field; following untagged lines extend that field until a blank
//! line, the next tag or the end of the block. Lines outside any field are free text.
//!
//! ```text
//! /// Lists accounts.
//! ///
//! /// @Summary   List accounts
//! /// @Description Returns every account,
//! ///   newest first.
//! /// @Router /accounts [get]
//! ```

pub mod field;
pub mod general;
pub mod operation;

use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// One `@tag value` field of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationField {
    /// Tag as written, without the `@`
    pub raw_tag: String,
    /// Lower-cased tag used for matching
    pub tag: String,
    pub value: String,
}

/// Parsed contents of one doc comment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationBlock {
    pub fields: Vec<AnnotationField>,
    pub text: Vec<String>,
}

impl AnnotationBlock {
    /// Runs the tagged-line state machine over the lines of a doc comment.
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut block = AnnotationBlock::default();
        let mut current: Option<usize> = None;

        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() {
                current = None;
                continue;
            }
            if let Some((raw_tag, value)) = split_tag(line) {
                block.fields.push(AnnotationField {
                    tag: raw_tag.to_ascii_lowercase(),
                    raw_tag: raw_tag.to_string(),
                    value: value.to_string(),
                });
                current = Some(block.fields.len() - 1);
                continue;
            }
            match current {
                Some(idx) => {
                    let field = &mut block.fields[idx];
                    let separator = if joins_with_newline(&field.tag) { "\n" } else { " " };
                    if field.value.is_empty() {
                        field.value = line.to_string();
                    } else {
                        field.value.push_str(separator);
                        field.value.push_str(line);
                    }
                }
                None => block.text.push(line.to_string()),
            }
        }

        block
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.text.is_empty()
    }

    pub fn has_tags(&self) -> bool {
        !self.fields.is_empty()
    }

    /// First value of a tag.
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.tag == tag)
            .map(|f| f.value.as_str())
    }

    pub fn has(&self, tag: &str) -> bool {
        self.fields.iter().any(|f| f.tag == tag)
    }

    /// Every value of a repeatable tag, in order.
    pub fn all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.tag == tag)
            .map(|f| f.value.as_str())
    }

    /// Free text joined into one paragraph per run of lines.
    pub fn text(&self) -> Option<String> {
        if self.text.is_empty() {
            None
        } else {
            Some(self.text.join("\n"))
        }
    }
}

fn split_tag(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('@')?;
    let end = rest
        .find(|c: char| c.is_whitespace())
        .unwrap_or(rest.len());
    let tag = &rest[..end];
    let valid = tag
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if !valid {
        return None;
    }
    Some((tag, rest[end..].trim()))
}

fn joins_with_newline(tag: &str) -> bool {
    tag == "description" || tag.ends_with(".description")
}

/// Outer doc comment lines (`///`, `/** */`).
pub fn doc_lines(attrs: &[syn::Attribute]) -> Vec<String> {
    collect_doc_lines(attrs, false)
}

/// Inner doc comment lines (`//!`, `/*! */`).
pub fn inner_doc_lines(attrs: &[syn::Attribute]) -> Vec<String> {
    collect_doc_lines(attrs, true)
}

fn collect_doc_lines(attrs: &[syn::Attribute], inner: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for attr in attrs {
        let is_inner = matches!(attr.style, syn::AttrStyle::Inner(_));
        if is_inner != inner || !attr.path().is_ident("doc") {
            continue;
        }
        let syn::Meta::NameValue(name_value) = &attr.meta else {
            continue;
        };
        let syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(doc),
            ..
        }) = &name_value.value
        else {
            continue;
        };
        for line in doc.value().lines() {
            // Block comments often carry a leading ` * ` gutter
            let line = line.trim_start();
            let line = line
                .strip_prefix("* ")
                .or_else(|| line.strip_prefix('*').filter(|l| l.is_empty()))
                .unwrap_or(line);
            lines.push(line.to_string());
        }
    }
    lines
}

/// Splits an annotation value into fields.
///
/// Whitespace separates fields except inside double quotes and bracket pairs, so
/// `"a comment" enums(A, B) Page<A, B>` yields three fields.
pub fn split_fields(value: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_quotes = false;

    for c in value.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '(' | '[' | '<' | '{' if !in_quotes => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '>' | '}' if !in_quotes => {
                depth = (depth - 1).max(0);
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes && depth == 0 => {
                if !current.is_empty() {
                    fields.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        fields.push(current);
    }
    fields
}

/// Strips one pair of surrounding double quotes.
pub fn unquote(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

/// Directories holding assets that annotations may pull in.
#[derive(Debug, Clone, Default)]
pub struct AssetContext {
    pub markdown_dir: Option<PathBuf>,
    pub code_examples_dir: Option<PathBuf>,
}

impl AssetContext {
    /// Reads `<markdown dir>/<name>.md`.
    pub fn read_markdown(&self, name: &str) -> Result<String, String> {
        let dir = self
            .markdown_dir
            .as_ref()
            .ok_or_else(|| "markdown directory is not configured".to_string())?;
        let file_name = if name.ends_with(".md") {
            name.to_string()
        } else {
            format!("{}.md", name)
        };
        let path = dir.join(file_name);
        debug!("Reading markdown from {}", path.display());
        fs::read_to_string(&path).map_err(|e| format!("cannot read {}: {}", path.display(), e))
    }

    /// Files in the code examples directory whose stem equals `id`, as (language, source).
    ///
    /// The language is the file extension, with a few common aliases expanded.
    pub fn read_code_samples(&self, id: &str) -> Result<Vec<(String, String)>, String> {
        let dir = self
            .code_examples_dir
            .as_ref()
            .ok_or_else(|| "code examples directory is not configured".to_string())?;
        let entries = fs::read_dir(dir).map_err(|e| format!("cannot read {}: {}", dir.display(), e))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.file_stem().and_then(|s| s.to_str()) == Some(id))
            .collect();
        paths.sort();
        if paths.is_empty() {
            return Err(format!("no code example named `{}` in {}", id, dir.display()));
        }
        paths
            .iter()
            .map(|path| {
                let source = fs::read_to_string(path)
                    .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
                Ok((sample_language(path), source))
            })
            .collect()
    }
}

fn sample_language(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "rs" => "rust".to_string(),
        "js" => "javascript".to_string(),
        "ts" => "typescript".to_string(),
        "py" => "python".to_string(),
        "sh" => "shell".to_string(),
        "rb" => "ruby".to_string(),
        _ => ext,
    }
}

/// Include/exclude filter over operation tags.
///
/// `admin,!internal` keeps operations tagged `admin` unless they are also tagged
/// `internal`. Exclusions always win; with no inclusions everything not excluded stays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl TagFilter {
    pub fn parse(expr: &str) -> Self {
        let mut filter = TagFilter::default();
        for entry in expr.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match entry.strip_prefix('!') {
                Some(tag) if !tag.trim().is_empty() => filter.exclude.push(tag.trim().to_string()),
                Some(_) => {}
                None => filter.include.push(entry.to_string()),
            }
        }
        filter
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn allows(&self, tags: &[String]) -> bool {
        if tags.iter().any(|t| self.exclude.contains(t)) {
            return false;
        }
        self.include.is_empty() || tags.iter().any(|t| self.include.contains(t))
    }
}
