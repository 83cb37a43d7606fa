//! Declaration index over all scanned crates.
//!
//! Parsing lowers every file into owned records (`syn` trees are not `Send`), and this
//! module merges those records into one arena of [`Declaration`]s addressed by
//! [`DeclId`]. Lookups follow Rust path rules: `crate::`, `self::` and `super::` prefixes,
//! child modules, `use` imports (renamed or globbed) and other crates by name.

use crate::annotation::field::FieldAnnotation;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

/// Index of a declaration in the arena.
pub type DeclId = usize;

/// Maximum number of import hops followed by one lookup.
const MAX_IMPORT_HOPS: usize = 16;

/// Absolute module path: crate name plus module segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModulePath {
    pub crate_name: String,
    pub segments: Vec<String>,
}

impl ModulePath {
    pub fn root(crate_name: impl Into<String>) -> Self {
        Self {
            crate_name: crate_name.into(),
            segments: Vec::new(),
        }
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self {
            crate_name: self.crate_name.clone(),
            segments,
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self {
            crate_name: self.crate_name.clone(),
            segments,
        })
    }

    pub fn crate_root(&self) -> Self {
        Self::root(self.crate_name.clone())
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.crate_name)?;
        for segment in &self.segments {
            write!(f, "::{}", segment)?;
        }
        Ok(())
    }
}

/// A type as written in source or in an annotation.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// `a::b::Name<Args>`; the arguments belong to the last segment
    Path {
        segments: Vec<String>,
        args: Vec<TypeExpr>,
    },
    /// Slices, fixed arrays and `[]T` annotation types
    Array(Box<TypeExpr>),
    Tuple(Vec<TypeExpr>),
    /// Anything that has no schema counterpart (function pointers, trait objects, ...)
    Unknown(String),
}

impl TypeExpr {
    pub fn path(segments: &[&str]) -> Self {
        TypeExpr::Path {
            segments: segments.iter().map(|s| s.to_string()).collect(),
            args: Vec::new(),
        }
    }

    /// Lowers a `syn` type.
    pub fn from_syn(ty: &syn::Type) -> Self {
        match ty {
            syn::Type::Path(type_path) if type_path.qself.is_none() => {
                let segments: Vec<String> = type_path
                    .path
                    .segments
                    .iter()
                    .map(|s| s.ident.to_string())
                    .collect();
                let args = type_path
                    .path
                    .segments
                    .last()
                    .map(|last| match &last.arguments {
                        syn::PathArguments::AngleBracketed(bracketed) => bracketed
                            .args
                            .iter()
                            .filter_map(|arg| match arg {
                                syn::GenericArgument::Type(ty) => Some(TypeExpr::from_syn(ty)),
                                _ => None,
                            })
                            .collect(),
                        _ => Vec::new(),
                    })
                    .unwrap_or_default();
                TypeExpr::Path { segments, args }
            }
            syn::Type::Reference(reference) => TypeExpr::from_syn(&reference.elem),
            syn::Type::Paren(paren) => TypeExpr::from_syn(&paren.elem),
            syn::Type::Group(group) => TypeExpr::from_syn(&group.elem),
            syn::Type::Slice(slice) => TypeExpr::Array(Box::new(TypeExpr::from_syn(&slice.elem))),
            syn::Type::Array(array) => TypeExpr::Array(Box::new(TypeExpr::from_syn(&array.elem))),
            syn::Type::Tuple(tuple) => {
                TypeExpr::Tuple(tuple.elems.iter().map(TypeExpr::from_syn).collect())
            }
            other => TypeExpr::Unknown(type_label(other)),
        }
    }

    /// Parses a type written inside an annotation.
    ///
    /// Accepts Rust paths (`models::Page<Account>`) as well as the dotted forms
    /// `models.Account`, `Page[Account]`, `[]Account` and `map[string]Account`.
    pub fn parse_annotation(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Some(element) = text.strip_prefix("[]") {
            return Some(TypeExpr::Array(Box::new(TypeExpr::parse_annotation(element)?)));
        }
        if let Some(rest) = text.strip_prefix("map[") {
            let close = rest.find(']')?;
            let value = TypeExpr::parse_annotation(&rest[close + 1..])?;
            return Some(TypeExpr::Path {
                segments: vec!["HashMap".to_string()],
                args: vec![TypeExpr::path(&["String"]), value],
            });
        }
        let mut normalized = text.replace('[', "<").replace(']', ">");
        if !normalized.contains("::") {
            normalized = normalized.replace('.', "::");
        }
        match syn::parse_str::<syn::Type>(&normalized) {
            Ok(ty) => Some(TypeExpr::from_syn(&ty)),
            Err(e) => {
                debug!("Cannot parse annotation type `{}`: {}", text, e);
                None
            }
        }
    }

    /// Last path segment, if this is a path.
    pub fn ident(&self) -> Option<&str> {
        match self {
            TypeExpr::Path { segments, .. } => segments.last().map(String::as_str),
            _ => None,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Path { segments, args } => {
                f.write_str(&segments.join("::"))?;
                if !args.is_empty() {
                    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                    write!(f, "<{}>", args.join(", "))?;
                }
                Ok(())
            }
            TypeExpr::Array(inner) => write!(f, "[{}]", inner),
            TypeExpr::Tuple(elems) => {
                let elems: Vec<String> = elems.iter().map(|e| e.to_string()).collect();
                write!(f, "({})", elems.join(", "))
            }
            TypeExpr::Unknown(label) => f.write_str(label),
        }
    }
}

fn type_label(ty: &syn::Type) -> String {
    match ty {
        syn::Type::BareFn(_) => "fn".to_string(),
        syn::Type::TraitObject(_) => "dyn".to_string(),
        syn::Type::ImplTrait(_) => "impl".to_string(),
        syn::Type::Never(_) => "!".to_string(),
        syn::Type::Infer(_) => "_".to_string(),
        _ => "unknown".to_string(),
    }
}

/// Field-level serde attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SerdeField {
    pub rename: Option<String>,
    pub skip: bool,
    pub flatten: bool,
    pub default: bool,
}

/// Constraints read from `#[validate(...)]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidateAttrs {
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub email: bool,
    pub url: bool,
    pub required: bool,
}

/// One named field of a struct.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub serde: SerdeField,
    pub validate: ValidateAttrs,
    pub annotation: FieldAnnotation,
}

/// One variant of a unit-only enum.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantDecl {
    pub name: String,
    pub rename: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclKind {
    Struct {
        fields: Vec<FieldDecl>,
        rename_all: Option<String>,
    },
    /// Tuple struct, or a `#[serde(transparent)]` struct reduced to its single field
    Tuple {
        elements: Vec<TypeExpr>,
        transparent: bool,
    },
    Unit,
    UnitEnum {
        variants: Vec<VariantDecl>,
        rename_all: Option<String>,
    },
    /// Enum with data-carrying variants
    DataEnum,
    /// `type Name = Target;`
    Alias(TypeExpr),
}

/// A type declaration found in source.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub module: ModulePath,
    pub file: PathBuf,
    /// Dependency hops from the scanned project (0 for search roots)
    pub depth: usize,
    pub generics: Vec<String>,
    pub description: Option<String>,
    pub kind: DeclKind,
}

impl Declaration {
    /// `crate::module::Name`
    pub fn full_path(&self) -> String {
        format!("{}::{}", self.module, self.name)
    }
}

/// Owned contents of one module, as lowered by the parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleRecord {
    pub path: Option<ModulePath>,
    pub declarations: Vec<Declaration>,
    /// alias -> absolute or relative target path
    pub imports: Vec<(String, Vec<String>)>,
    pub globs: Vec<Vec<String>>,
}

#[derive(Debug, Default)]
struct ModuleEntry {
    items: HashMap<String, DeclId>,
    imports: HashMap<String, Vec<String>>,
    globs: Vec<Vec<String>>,
}

/// Arena of declarations plus the module tree used for path lookups.
#[derive(Debug, Default)]
pub struct SourceIndex {
    root_crate: String,
    decls: Vec<Declaration>,
    modules: HashMap<ModulePath, ModuleEntry>,
    by_name: HashMap<String, Vec<DeclId>>,
    crates: HashSet<String>,
}

impl SourceIndex {
    pub fn new(root_crate: impl Into<String>) -> Self {
        let root_crate = root_crate.into();
        let mut index = Self {
            root_crate: root_crate.clone(),
            ..Self::default()
        };
        index.crates.insert(root_crate);
        index
    }

    pub fn root_crate(&self) -> &str {
        &self.root_crate
    }

    /// Makes a crate name usable as a path prefix.
    pub fn add_crate(&mut self, name: &str) {
        self.crates.insert(name.to_string());
    }

    /// Merges one lowered module. Records for the same module (e.g. `mod.rs` plus
    /// inline blocks) accumulate.
    pub fn add_module(&mut self, record: ModuleRecord) {
        let Some(path) = record.path else {
            return;
        };
        self.add_crate(&path.crate_name);
        let mut new_ids = Vec::new();
        for decl in record.declarations {
            let id = self.decls.len();
            self.by_name.entry(decl.name.clone()).or_default().push(id);
            new_ids.push((decl.name.clone(), id));
            self.decls.push(decl);
        }
        let entry = self.modules.entry(path.clone()).or_default();
        for (name, id) in new_ids {
            if let Some(previous) = entry.items.insert(name.clone(), id) {
                warn!("{} declares `{}` twice; keeping the later one (#{})", path, name, previous);
            }
        }
        for (alias, target) in record.imports {
            entry.imports.insert(alias, target);
        }
        entry.globs.extend(record.globs);
        // Make every ancestor module known so `a::b::C` walks through empty parents
        let mut parent = path.parent();
        while let Some(module) = parent {
            parent = module.parent();
            self.modules.entry(module).or_default();
        }
    }

    pub fn get(&self, id: DeclId) -> &Declaration {
        &self.decls[id]
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn declarations(&self) -> impl Iterator<Item = (DeclId, &Declaration)> {
        self.decls.iter().enumerate()
    }

    /// Canonical name of a declaration: `<module>.<Name>`.
    ///
    /// Root-crate items at the crate root are just `Name`; other crates' root items are
    /// `<crate>.<Name>`.
    pub fn canonical_name(&self, id: DeclId) -> String {
        let decl = &self.decls[id];
        match decl.module.last_segment() {
            Some(module) => format!("{}.{}", module, decl.name),
            None if decl.module.crate_name == self.root_crate => decl.name.clone(),
            None => format!("{}.{}", decl.module.crate_name, decl.name),
        }
    }

    /// Resolves a path as seen from `from`.
    pub fn lookup(&self, from: &ModulePath, segments: &[String]) -> Option<DeclId> {
        self.lookup_path(from, segments, MAX_IMPORT_HOPS)
    }

    /// Resolves a path, falling back to a search by name.
    ///
    /// The fallback handles annotation references such as `models.Account` where
    /// `models` is a module name rather than a path from the current module. Among
    /// several candidates the current crate wins, then the lowest full path.
    pub fn lookup_or_search(&self, from: &ModulePath, segments: &[String]) -> Option<DeclId> {
        if let Some(id) = self.lookup(from, segments) {
            return Some(id);
        }
        let (name, qualifier) = match segments {
            [] => return None,
            [name] => (name, None),
            [.., qualifier, name] => (name, Some(qualifier.as_str())),
        };
        let mut candidates: Vec<DeclId> = self
            .by_name
            .get(name)?
            .iter()
            .copied()
            .filter(|id| match qualifier {
                Some(q) => {
                    let module = &self.decls[*id].module;
                    module.last_segment() == Some(q)
                        || (module.segments.is_empty() && module.crate_name == q)
                }
                None => true,
            })
            .collect();
        if candidates.len() > 1 {
            let same_crate: Vec<DeclId> = candidates
                .iter()
                .copied()
                .filter(|id| self.decls[*id].module.crate_name == from.crate_name)
                .collect();
            if !same_crate.is_empty() {
                candidates = same_crate;
            }
        }
        candidates.sort_by_key(|id| self.decls[*id].full_path());
        let chosen = *candidates.first()?;
        if candidates.len() > 1 {
            warn!(
                "`{}` matches {} declarations; using {}",
                segments.join("::"),
                candidates.len(),
                self.decls[chosen].full_path()
            );
        }
        Some(chosen)
    }

    /// Expands a path written in `from` to an absolute path through imports, without
    /// requiring it to name a declaration.
    pub fn expand_path(&self, from: &ModulePath, segments: &[String]) -> Option<Vec<String>> {
        let first = segments.first()?;
        let entry = self.modules.get(from)?;
        let target = entry.imports.get(first)?;
        let mut expanded = target.clone();
        expanded.extend(segments[1..].iter().cloned());
        Some(expanded)
    }

    fn lookup_path(&self, from: &ModulePath, segments: &[String], hops: usize) -> Option<DeclId> {
        if hops == 0 || segments.is_empty() {
            return None;
        }
        let (mut module, rest) = self.resolve_prefix(from, segments)?;
        let (name, prefix) = rest.split_last()?;
        for segment in prefix {
            module = self.resolve_module(&module, segment, hops)?;
        }
        self.lookup_item(&module, name, hops)
    }

    /// Strips `crate`, `self`, `super` and `::`-less crate prefixes.
    fn resolve_prefix<'s>(
        &self,
        from: &ModulePath,
        segments: &'s [String],
    ) -> Option<(ModulePath, &'s [String])> {
        let mut module = from.clone();
        let mut rest = segments;
        match rest.first().map(String::as_str) {
            Some("crate") => {
                module = from.crate_root();
                rest = &rest[1..];
            }
            Some("self") => rest = &rest[1..],
            Some("super") => {
                while rest.first().map(String::as_str) == Some("super") {
                    module = module.parent()?;
                    rest = &rest[1..];
                }
            }
            _ => {}
        }
        Some((module, rest))
    }

    fn resolve_module(&self, module: &ModulePath, name: &str, hops: usize) -> Option<ModulePath> {
        let child = module.child(name);
        if self.modules.contains_key(&child) {
            return Some(child);
        }
        if let Some(target) = self.modules.get(module).and_then(|e| e.imports.get(name)) {
            if let Some(resolved) = self.module_from_segments(module, target, hops) {
                return Some(resolved);
            }
        }
        if self.crates.contains(name) {
            return Some(ModulePath::root(name));
        }
        None
    }

    fn module_from_segments(
        &self,
        from: &ModulePath,
        segments: &[String],
        hops: usize,
    ) -> Option<ModulePath> {
        if hops == 0 {
            return None;
        }
        let (mut module, rest) = self.resolve_prefix(from, segments)?;
        for segment in rest {
            module = self.resolve_module(&module, segment, hops - 1)?;
        }
        Some(module)
    }

    fn lookup_item(&self, module: &ModulePath, name: &str, hops: usize) -> Option<DeclId> {
        let entry = self.modules.get(module)?;
        if let Some(id) = entry.items.get(name) {
            return Some(*id);
        }
        if hops == 0 {
            return None;
        }
        if let Some(target) = entry.imports.get(name) {
            // Imports resolve from the importing module
            let found = self.lookup_path(module, target, hops - 1);
            if found.is_some() {
                return found;
            }
        }
        for glob in &entry.globs {
            if let Some(glob_module) = self.module_from_segments(module, glob, hops - 1) {
                if glob_module != *module {
                    if let Some(id) = self.lookup_item(&glob_module, name, hops - 1) {
                        return Some(id);
                    }
                }
            }
        }
        None
    }
}
