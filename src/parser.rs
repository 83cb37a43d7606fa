use crate::annotation::field::FieldAnnotation;
use crate::annotation::general::GeneralInfo;
use crate::annotation::operation::OperationAnnotation;
use crate::annotation::{doc_lines, inner_doc_lines, AnnotationBlock, AssetContext};
use crate::error::{BuildError, ParseError};
use crate::index::{
    DeclKind, Declaration, FieldDecl, ModulePath, ModuleRecord, SerdeField, TypeExpr,
    ValidateAttrs, VariantDecl,
};
use crate::scanner::SourceFile;
use log::{debug, warn};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use syn::meta::ParseNestedMeta;

/// AST parser for Rust source files.
///
/// The `AstParser` reads each file with `syn` and lowers it into a [`SourceUnit`]: owned
/// declaration records for the index, operation annotations and, for the main file, the
/// general API information. Lowering happens on the worker that parsed the file, so no
/// syntax tree ever crosses a thread boundary.
///
/// # Example
///
/// ```no_run
/// use openapi_from_comments::parser::{AstParser, ParseContext};
/// use openapi_from_comments::scanner::SourceFile;
/// use openapi_from_comments::index::ModulePath;
/// use std::path::PathBuf;
///
/// let file = SourceFile {
///     path: PathBuf::from("src/main.rs"),
///     module: ModulePath::root("app"),
///     depth: 0,
/// };
/// let unit = AstParser::parse_file(&file, &ParseContext::default()).unwrap();
/// println!("Found {} operations", unit.operations.len());
/// ```
pub struct AstParser;

/// Everything the parser needs besides the file itself.
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    /// Canonical path of the general info file
    pub main_file: Option<PathBuf>,
    pub assets: AssetContext,
}

/// An operation annotation with the place it was declared.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub annotation: OperationAnnotation,
    /// Module of the annotated function, used to resolve its type references
    pub module: ModulePath,
    pub file: PathBuf,
}

impl OperationRecord {
    /// `file::function`, for diagnostics.
    pub fn location(&self) -> String {
        format!("{}::{}", self.file.display(), self.annotation.function)
    }
}

/// A parsed and lowered Rust file.
#[derive(Debug, Default)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub modules: Vec<ModuleRecord>,
    pub operations: Vec<OperationRecord>,
    /// General info, only for the main file
    pub general: Option<GeneralInfo>,
    pub errors: Vec<ParseError>,
    pub is_main: bool,
}

impl AstParser {
    /// Reads and lowers a single file.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Io`] if the file cannot be read and [`BuildError::Syntax`] if
    /// it is not valid Rust.
    pub fn parse_file(file: &SourceFile, ctx: &ParseContext) -> Result<SourceUnit, BuildError> {
        debug!("Parsing file: {}", file.path.display());

        let content = fs::read_to_string(&file.path).map_err(|e| BuildError::io(&file.path, e))?;
        let is_main = match &ctx.main_file {
            Some(main) => fs::canonicalize(&file.path)
                .map(|p| &p == main)
                .unwrap_or(false),
            None => false,
        };
        Self::parse_source(&content, file, is_main, ctx)
    }

    /// Lowers source text that has already been read.
    pub fn parse_source(
        content: &str,
        file: &SourceFile,
        is_main: bool,
        ctx: &ParseContext,
    ) -> Result<SourceUnit, BuildError> {
        let syntax_tree = syn::parse_file(content).map_err(|e| BuildError::Syntax {
            file: file.path.clone(),
            message: e.to_string(),
        })?;

        let mut lowering = Lowering {
            file,
            ctx,
            unit: SourceUnit {
                path: file.path.clone(),
                is_main,
                ..SourceUnit::default()
            },
        };
        if is_main {
            lowering.general_info(&syntax_tree);
        }
        lowering.items(&syntax_tree.items, file.module.clone());

        debug!(
            "Lowered {}: {} module record(s), {} operation(s)",
            file.path.display(),
            lowering.unit.modules.len(),
            lowering.unit.operations.len()
        );
        Ok(lowering.unit)
    }

    /// Parses files in parallel, continuing past failures.
    ///
    /// Results come back in input order so the rest of the build stays deterministic.
    pub fn parse_files(files: &[SourceFile], ctx: &ParseContext) -> Vec<Result<SourceUnit, BuildError>> {
        debug!("Parsing {} files", files.len());

        let results: Vec<Result<SourceUnit, BuildError>> = files
            .par_iter()
            .map(|file| {
                Self::parse_file(file, ctx).inspect_err(|e| {
                    warn!("Failed to parse {}: {}", file.path.display(), e);
                })
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );

        results
    }
}

struct Lowering<'a> {
    file: &'a SourceFile,
    ctx: &'a ParseContext,
    unit: SourceUnit,
}

impl Lowering<'_> {
    fn error(&mut self, declaration: &str, message: String) {
        self.unit
            .errors
            .push(ParseError::new(&self.file.path, declaration, message));
    }

    /// Crate docs (`//!`) carry the general info; `fn main` docs are the fallback.
    fn general_info(&mut self, syntax_tree: &syn::File) {
        let mut block = AnnotationBlock::parse(&inner_doc_lines(&syntax_tree.attrs));
        if !block.has_tags() {
            let main_docs = syntax_tree.items.iter().find_map(|item| match item {
                syn::Item::Fn(f) if f.sig.ident == "main" => Some(doc_lines(&f.attrs)),
                _ => None,
            });
            if let Some(lines) = main_docs {
                block = AnnotationBlock::parse(&lines);
            }
        }
        let (info, errors) = GeneralInfo::from_block(&block, &self.ctx.assets);
        for message in errors {
            self.error("general info", message);
        }
        self.unit.general = Some(info);
    }

    fn items(&mut self, items: &[syn::Item], module: ModulePath) {
        let mut record = ModuleRecord {
            path: Some(module.clone()),
            ..ModuleRecord::default()
        };

        for item in items {
            match item {
                syn::Item::Struct(s) => {
                    let decl = self.lower_struct(s, &module);
                    record.declarations.push(decl);
                }
                syn::Item::Enum(e) => record.declarations.push(self.lower_enum(e, &module)),
                syn::Item::Type(t) => record.declarations.push(Declaration {
                    name: t.ident.to_string(),
                    module: module.clone(),
                    file: self.file.path.clone(),
                    depth: self.file.depth,
                    generics: type_params(&t.generics),
                    description: describe(&t.attrs),
                    kind: DeclKind::Alias(TypeExpr::from_syn(&t.ty)),
                }),
                syn::Item::Use(u) => flatten_use(&u.tree, Vec::new(), &mut record),
                syn::Item::Mod(m) => {
                    if is_cfg_test(&m.attrs) {
                        continue;
                    }
                    if let Some((_, content)) = &m.content {
                        self.items(content, module.child(&unraw(&m.ident)));
                    }
                }
                syn::Item::Fn(f) => self.lower_fn(&f.attrs, &f.sig.ident, &module),
                syn::Item::Impl(i) => {
                    for impl_item in &i.items {
                        if let syn::ImplItem::Fn(method) = impl_item {
                            self.lower_fn(&method.attrs, &method.sig.ident, &module);
                        }
                    }
                }
                _ => {}
            }
        }

        self.unit.modules.push(record);
    }

    fn lower_fn(&mut self, attrs: &[syn::Attribute], ident: &syn::Ident, module: &ModulePath) {
        // Operations of dependencies are never documented
        if self.file.depth > 0 {
            return;
        }
        let block = AnnotationBlock::parse(&doc_lines(attrs));
        if !OperationAnnotation::is_operation(&block) {
            return;
        }
        let function = unraw(ident);
        let (annotation, errors) = OperationAnnotation::from_block(&function, &block, &self.ctx.assets);
        for message in errors {
            self.error(&function, message);
        }
        if annotation.routes.is_empty() {
            return;
        }
        self.unit.operations.push(OperationRecord {
            annotation,
            module: module.clone(),
            file: self.file.path.clone(),
        });
    }

    fn lower_struct(&mut self, s: &syn::ItemStruct, module: &ModulePath) -> Declaration {
        let name = unraw(&s.ident);
        let container = ContainerAttrs::parse(&s.attrs);

        let kind = match &s.fields {
            syn::Fields::Named(named) if container.transparent && named.named.len() == 1 => {
                DeclKind::Tuple {
                    elements: named.named.iter().map(|f| TypeExpr::from_syn(&f.ty)).collect(),
                    transparent: true,
                }
            }
            syn::Fields::Named(named) => DeclKind::Struct {
                fields: named
                    .named
                    .iter()
                    .map(|f| self.lower_field(&name, f))
                    .collect(),
                rename_all: container.rename_all,
            },
            syn::Fields::Unnamed(unnamed) => DeclKind::Tuple {
                elements: unnamed.unnamed.iter().map(|f| TypeExpr::from_syn(&f.ty)).collect(),
                transparent: container.transparent,
            },
            syn::Fields::Unit => DeclKind::Unit,
        };

        Declaration {
            name,
            module: module.clone(),
            file: self.file.path.clone(),
            depth: self.file.depth,
            generics: type_params(&s.generics),
            description: describe(&s.attrs),
            kind,
        }
    }

    fn lower_field(&mut self, owner: &str, field: &syn::Field) -> FieldDecl {
        let name = field.ident.as_ref().map(unraw).unwrap_or_default();
        let block = AnnotationBlock::parse(&doc_lines(&field.attrs));
        let (annotation, errors) = FieldAnnotation::from_block(&block);
        for message in errors {
            self.error(&format!("{}.{}", owner, name), message);
        }
        FieldDecl {
            ty: TypeExpr::from_syn(&field.ty),
            serde: parse_serde_field(&field.attrs),
            validate: parse_validate(&field.attrs),
            annotation,
            name,
        }
    }

    fn lower_enum(&mut self, e: &syn::ItemEnum, module: &ModulePath) -> Declaration {
        let container = ContainerAttrs::parse(&e.attrs);
        let unit_only = e
            .variants
            .iter()
            .all(|v| matches!(v.fields, syn::Fields::Unit));

        let kind = if unit_only {
            DeclKind::UnitEnum {
                variants: e
                    .variants
                    .iter()
                    .filter(|v| !parse_serde_field(&v.attrs).skip)
                    .map(|v| VariantDecl {
                        name: unraw(&v.ident),
                        rename: parse_serde_field(&v.attrs).rename,
                    })
                    .collect(),
                rename_all: container.rename_all,
            }
        } else {
            DeclKind::DataEnum
        };

        Declaration {
            name: unraw(&e.ident),
            module: module.clone(),
            file: self.file.path.clone(),
            depth: self.file.depth,
            generics: type_params(&e.generics),
            description: describe(&e.attrs),
            kind,
        }
    }
}

fn unraw(ident: &syn::Ident) -> String {
    let name = ident.to_string();
    name.strip_prefix("r#").map(String::from).unwrap_or(name)
}

fn type_params(generics: &syn::Generics) -> Vec<String> {
    generics.type_params().map(|p| p.ident.to_string()).collect()
}

/// Free text of a type's doc comment, or its `@description`.
fn describe(attrs: &[syn::Attribute]) -> Option<String> {
    let block = AnnotationBlock::parse(&doc_lines(attrs));
    block
        .get("description")
        .map(String::from)
        .or_else(|| block.text())
}

fn is_cfg_test(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|attr| {
        attr.path().is_ident("cfg")
            && attr
                .parse_args::<syn::Ident>()
                .map(|ident| ident == "test")
                .unwrap_or(false)
    })
}

/// Records `use` items as alias -> path imports and glob imports.
fn flatten_use(tree: &syn::UseTree, prefix: Vec<String>, record: &mut ModuleRecord) {
    match tree {
        syn::UseTree::Path(path) => {
            let mut prefix = prefix;
            prefix.push(path.ident.to_string());
            flatten_use(&path.tree, prefix, record);
        }
        syn::UseTree::Name(name) => {
            if name.ident == "self" {
                if let Some(alias) = prefix.last().cloned() {
                    record.imports.push((alias, prefix));
                }
            } else {
                let mut target = prefix;
                target.push(name.ident.to_string());
                record.imports.push((name.ident.to_string(), target));
            }
        }
        syn::UseTree::Rename(rename) => {
            let mut target = prefix;
            if rename.ident != "self" {
                target.push(rename.ident.to_string());
            }
            if rename.rename != "_" {
                record.imports.push((rename.rename.to_string(), target));
            }
        }
        syn::UseTree::Glob(_) => record.globs.push(prefix),
        syn::UseTree::Group(group) => {
            for item in &group.items {
                flatten_use(item, prefix.clone(), record);
            }
        }
    }
}

/// Container-level serde attributes.
#[derive(Debug, Default)]
struct ContainerAttrs {
    rename_all: Option<String>,
    transparent: bool,
}

impl ContainerAttrs {
    fn parse(attrs: &[syn::Attribute]) -> Self {
        let mut container = Self::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
            let result = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") {
                    container.rename_all = serialize_name(&meta)?;
                } else if meta.path.is_ident("transparent") {
                    container.transparent = true;
                } else {
                    skip_meta(&meta)?;
                }
                Ok(())
            });
            if let Err(e) = result {
                debug!("Ignoring unreadable serde attribute: {}", e);
            }
        }
        container
    }
}

fn parse_serde_field(attrs: &[syn::Attribute]) -> SerdeField {
    let mut serde = SerdeField::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        let result = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                if let Some(name) = serialize_name(&meta)? {
                    serde.rename = Some(name);
                }
            } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                serde.skip = true;
            } else if meta.path.is_ident("flatten") {
                serde.flatten = true;
            } else if meta.path.is_ident("default") {
                serde.default = true;
                skip_meta(&meta)?;
            } else {
                skip_meta(&meta)?;
            }
            Ok(())
        });
        if let Err(e) = result {
            debug!("Ignoring unreadable serde attribute: {}", e);
        }
    }
    serde
}

/// Reads `key = "value"` or `key(serialize = "value", ...)`.
fn serialize_name(meta: &ParseNestedMeta) -> syn::Result<Option<String>> {
    if meta.input.peek(syn::Token![=]) {
        let value: syn::LitStr = meta.value()?.parse()?;
        return Ok(Some(value.value()));
    }
    let mut name = None;
    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("serialize") {
            let value: syn::LitStr = inner.value()?.parse()?;
            name = Some(value.value());
        } else {
            skip_meta(&inner)?;
        }
        Ok(())
    })?;
    Ok(name)
}

/// Consumes the value of a nested meta item this parser does not use.
fn skip_meta(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(syn::Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        let _: proc_macro2::TokenStream = content.parse()?;
    }
    Ok(())
}

fn parse_validate(attrs: &[syn::Attribute]) -> ValidateAttrs {
    let mut validate = ValidateAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("validate")) {
        let result = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("length") {
                meta.parse_nested_meta(|inner| {
                    let value = number_value(&inner)?;
                    if inner.path.is_ident("min") {
                        validate.min_length = value.map(|v| v as u64);
                    } else if inner.path.is_ident("max") {
                        validate.max_length = value.map(|v| v as u64);
                    } else if inner.path.is_ident("equal") {
                        validate.min_length = value.map(|v| v as u64);
                        validate.max_length = value.map(|v| v as u64);
                    }
                    Ok(())
                })?;
            } else if meta.path.is_ident("range") {
                meta.parse_nested_meta(|inner| {
                    let value = number_value(&inner)?;
                    if inner.path.is_ident("min") {
                        validate.minimum = value;
                    } else if inner.path.is_ident("max") {
                        validate.maximum = value;
                    }
                    Ok(())
                })?;
            } else if meta.path.is_ident("email") {
                validate.email = true;
                skip_meta(&meta)?;
            } else if meta.path.is_ident("url") {
                validate.url = true;
                skip_meta(&meta)?;
            } else if meta.path.is_ident("required") {
                validate.required = true;
                skip_meta(&meta)?;
            } else {
                skip_meta(&meta)?;
            }
            Ok(())
        });
        if let Err(e) = result {
            debug!("Ignoring unreadable validate attribute: {}", e);
        }
    }
    validate
}

/// Numeric literal of `key = <number>`; other expressions (constants, paths) yield `None`.
fn number_value(meta: &ParseNestedMeta) -> syn::Result<Option<f64>> {
    if !meta.input.peek(syn::Token![=]) {
        skip_meta(meta)?;
        return Ok(None);
    }
    let expr: syn::Expr = meta.value()?.parse()?;
    Ok(expr_number(&expr))
}

fn expr_number(expr: &syn::Expr) -> Option<f64> {
    match expr {
        syn::Expr::Lit(syn::ExprLit { lit, .. }) => match lit {
            syn::Lit::Int(int) => int.base10_parse::<f64>().ok(),
            syn::Lit::Float(float) => float.base10_parse::<f64>().ok(),
            _ => None,
        },
        syn::Expr::Unary(syn::ExprUnary {
            op: syn::UnOp::Neg(_),
            expr,
            ..
        }) => expr_number(expr).map(|v| -v),
        syn::Expr::Group(group) => expr_number(&group.expr),
        syn::Expr::Paren(paren) => expr_number(&paren.expr),
        _ => None,
    }
}

/// Module path of a file below a crate's source root.
///
/// `lib.rs`, `main.rs` and `mod.rs` name their directory; any other file adds its stem.
pub fn module_path_for(crate_name: &str, relative: &Path) -> ModulePath {
    let mut module = ModulePath::root(crate_name);
    let components: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    let Some((file_name, dirs)) = components.split_last() else {
        return module;
    };
    for dir in dirs {
        module = module.child(dir);
    }
    match file_name.strip_suffix(".rs") {
        Some("lib" | "main" | "mod") | None => {}
        Some(stem) => module = module.child(stem),
    }
    module
}
