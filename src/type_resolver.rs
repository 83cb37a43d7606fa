//! Turns type expressions into registry entries.
//!
//! Resolution of one reference runs these steps in order:
//! 1. generic parameters bound by the enclosing instantiation
//! 2. override rules
//! 3. declarations reachable by Rust path rules
//! 4. built-in wrappers, collections and primitives
//! 5. a search by name (for dotted annotation references)
//!
//! Declarations become [`SchemaType`]s registered under their canonical name; every
//! reference to them is a [`TypeRef::Schema`] by that name.

use crate::annotation::operation::OperationAnnotation;
use crate::error::ResolveError;
use crate::index::{DeclId, DeclKind, Declaration, FieldDecl, ModulePath, SourceIndex, TypeExpr};
use crate::naming::{apply_rename_rule, display_name, NamingStrategy};
use crate::overrides::{OverrideAction, Overrides};
use crate::parser::OperationRecord;
use crate::schema_registry::{
    Constraints, FieldDescriptor, Primitive, SchemaKind, SchemaRegistry, SchemaType, TypeRef,
};
use log::{debug, warn};
use std::collections::HashMap;

/// Maximum nesting of `#[serde(flatten)]` fields followed.
const MAX_EMBED_DEPTH: usize = 32;

/// Outcome of resolving one type expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// Dropped by a skip rule or a unit type
    Skipped,
    Type {
        ty: TypeRef,
        /// Wrapped in `Option`
        optional: bool,
    },
}

impl Resolved {
    fn required(ty: TypeRef) -> Self {
        Resolved::Type {
            ty,
            optional: false,
        }
    }

    /// The resolved type, or `None` when skipped.
    pub fn into_type(self) -> Option<TypeRef> {
        match self {
            Resolved::Skipped => None,
            Resolved::Type { ty, .. } => Some(ty),
        }
    }

    fn map(self, f: impl FnOnce(TypeRef) -> TypeRef) -> Self {
        match self {
            Resolved::Skipped => Resolved::Skipped,
            Resolved::Type { ty, .. } => Resolved::required(f(ty)),
        }
    }
}

/// Settings that shape resolved schemas.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub naming: NamingStrategy,
    pub required_by_default: bool,
    /// Declarations more dependency hops away than this become placeholders
    pub parse_depth: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            naming: NamingStrategy::Declared,
            required_by_default: false,
            parse_depth: 100,
        }
    }
}

/// An operation whose type references have all been resolved.
///
/// The vectors run parallel to the annotation's params, responses and headers; `None`
/// marks a reference dropped by a skip rule (or a response without a body).
#[derive(Debug, Clone)]
pub struct ResolvedOperation {
    pub annotation: OperationAnnotation,
    /// `file::function`
    pub location: String,
    pub params: Vec<Option<TypeRef>>,
    pub responses: Vec<Option<TypeRef>>,
    pub headers: Vec<Option<TypeRef>>,
}

/// What to do with a reference nothing can resolve.
#[derive(Debug, Clone, Copy)]
enum Missing<'c> {
    /// Fail, naming the operation that referenced it
    Error(&'c str),
    /// Degrade to an opaque placeholder
    Placeholder,
}

/// Where a type expression was written.
struct Scope<'s> {
    module: &'s ModulePath,
    bindings: &'s HashMap<String, TypeRef>,
}

/// Resolves type expressions against the index, filling the registry.
///
/// The resolver holds no mutable state of its own, so one instance can serve many
/// worker threads; all sharing goes through the registry.
pub struct TypeResolver<'a> {
    index: &'a SourceIndex,
    registry: &'a SchemaRegistry,
    overrides: &'a Overrides,
    options: ResolverOptions,
}

impl<'a> TypeResolver<'a> {
    pub fn new(
        index: &'a SourceIndex,
        registry: &'a SchemaRegistry,
        overrides: &'a Overrides,
        options: ResolverOptions,
    ) -> Self {
        debug!(
            "Initializing TypeResolver over {} declarations and {} override rule(s)",
            index.len(),
            overrides.len()
        );
        Self {
            index,
            registry,
            overrides,
            options,
        }
    }

    /// Resolves every type an operation references.
    pub fn resolve_operation(&self, record: &OperationRecord) -> Result<ResolvedOperation, ResolveError> {
        let location = record.location();
        let annotation = &record.annotation;
        debug!("Resolving operation {}", location);

        let params = annotation
            .params
            .iter()
            .map(|p| {
                self.resolve_reference(&p.ty, &record.module, &location)
                    .map(Resolved::into_type)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let responses = annotation
            .responses
            .iter()
            .map(|r| match &r.ty {
                Some(ty) => self
                    .resolve_reference(ty, &record.module, &location)
                    .map(Resolved::into_type),
                None => Ok(None),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let headers = annotation
            .headers
            .iter()
            .map(|h| {
                self.resolve_reference(&h.ty, &record.module, &location)
                    .map(Resolved::into_type)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ResolvedOperation {
            annotation: annotation.clone(),
            location,
            params,
            responses,
            headers,
        })
    }

    /// Resolves a reference written in an operation annotation.
    ///
    /// A reference that names nothing is an [`ResolveError::UnresolvedReference`]; types
    /// nested inside declarations degrade to placeholders instead.
    pub fn resolve_reference(
        &self,
        expr: &TypeExpr,
        module: &ModulePath,
        context: &str,
    ) -> Result<Resolved, ResolveError> {
        let bindings = HashMap::new();
        let scope = Scope {
            module,
            bindings: &bindings,
        };
        let mut stack = Vec::new();
        self.resolve_expr(expr, &scope, Missing::Error(context), &mut stack)
    }

    fn resolve_expr(
        &self,
        expr: &TypeExpr,
        scope: &Scope,
        missing: Missing,
        stack: &mut Vec<String>,
    ) -> Result<Resolved, ResolveError> {
        match expr {
            TypeExpr::Array(element) => Ok(self
                .resolve_expr(element, scope, missing, stack)?
                .map(|ty| TypeRef::Array(Box::new(ty)))),
            TypeExpr::Tuple(elements) if elements.is_empty() => Ok(Resolved::Skipped),
            TypeExpr::Tuple(_) => Ok(Resolved::required(TypeRef::Array(Box::new(TypeRef::Any)))),
            TypeExpr::Unknown(label) => {
                debug!("`{}` has no schema counterpart; using a placeholder", label);
                Ok(Resolved::required(TypeRef::Any))
            }
            TypeExpr::Path { segments, args } => {
                self.resolve_path(segments, args, scope, missing, stack)
            }
        }
    }

    fn resolve_path(
        &self,
        segments: &[String],
        args: &[TypeExpr],
        scope: &Scope,
        missing: Missing,
        stack: &mut Vec<String>,
    ) -> Result<Resolved, ResolveError> {
        if let [name] = segments {
            if let Some(bound) = scope.bindings.get(name) {
                return Ok(Resolved::required(bound.clone()));
            }
        }

        let ident = segments.last().map(String::as_str).unwrap_or_default();
        let found = self.index.lookup(scope.module, segments).or_else(|| {
            if is_builtin(ident) {
                None
            } else {
                self.index.lookup_or_search(scope.module, segments)
            }
        });

        if let Some(action) = self.override_for(segments, found, scope.module) {
            return match action {
                OverrideAction::Skip => {
                    debug!("Skipping `{}` by override", segments.join("::"));
                    Ok(Resolved::Skipped)
                }
                OverrideAction::Replace(target) => self.resolve_replacement(target, stack),
            };
        }

        if let Some(id) = found {
            return self.resolve_declaration(id, args, scope, missing, stack);
        }
        if let Some(resolved) = self.resolve_builtin(ident, args, scope, missing, stack)? {
            return Ok(resolved);
        }

        let reference = segments.join("::");
        match missing {
            Missing::Error(context) => Err(ResolveError::UnresolvedReference {
                context: context.to_string(),
                reference,
            }),
            Missing::Placeholder => {
                warn!("Cannot resolve type `{}`; using a placeholder", reference);
                Ok(Resolved::required(TypeRef::Any))
            }
        }
    }

    /// Override rule for a reference, trying every spelling it is known by.
    fn override_for(
        &self,
        segments: &[String],
        found: Option<DeclId>,
        module: &ModulePath,
    ) -> Option<&'a OverrideAction> {
        if self.overrides.is_empty() {
            return None;
        }
        let mut candidates = vec![segments.join("::")];
        if let Some(expanded) = self.index.expand_path(module, segments) {
            candidates.push(expanded.join("::"));
        }
        if let Some(id) = found {
            let decl = self.index.get(id);
            candidates.push(decl.full_path());
            if decl.module.crate_name == self.index.root_crate() {
                let mut local = vec!["crate".to_string()];
                local.extend(decl.module.segments.iter().cloned());
                local.push(decl.name.clone());
                candidates.push(local.join("::"));
            }
            candidates.push(self.index.canonical_name(id));
        }
        self.overrides.lookup(&candidates)
    }

    /// Resolves the target of a `replace` rule from the root crate.
    ///
    /// A target naming no declaration is used verbatim as a schema name.
    fn resolve_replacement(&self, target: &str, stack: &mut Vec<String>) -> Result<Resolved, ResolveError> {
        let marker = format!("override:{}", target);
        if stack.contains(&marker) {
            warn!("Override rules for `{}` form a cycle; using a placeholder", target);
            return Ok(Resolved::required(TypeRef::Any));
        }
        let Some(expr) = TypeExpr::parse_annotation(target) else {
            return Ok(Resolved::required(TypeRef::Schema(target.to_string())));
        };
        let root = ModulePath::root(self.index.root_crate());
        if let TypeExpr::Path { segments, .. } = &expr {
            let ident = segments.last().map(String::as_str).unwrap_or_default();
            if !is_builtin(ident) && self.index.lookup_or_search(&root, segments).is_none() {
                return Ok(Resolved::required(TypeRef::Schema(target.to_string())));
            }
        }

        let bindings = HashMap::new();
        let scope = Scope {
            module: &root,
            bindings: &bindings,
        };
        stack.push(marker);
        let result = self.resolve_expr(&expr, &scope, Missing::Placeholder, stack);
        stack.pop();
        result
    }

    fn resolve_builtin(
        &self,
        ident: &str,
        args: &[TypeExpr],
        scope: &Scope,
        missing: Missing,
        stack: &mut Vec<String>,
    ) -> Result<Option<Resolved>, ResolveError> {
        let arg = |idx: usize, stack: &mut Vec<String>| -> Result<Resolved, ResolveError> {
            match args.get(idx) {
                Some(expr) => self.resolve_expr(expr, scope, missing, stack),
                None => Ok(Resolved::required(TypeRef::Any)),
            }
        };

        let resolved = match ident {
            "Option" => match arg(0, stack)? {
                Resolved::Type { ty, .. } => Resolved::Type { ty, optional: true },
                Resolved::Skipped => Resolved::Skipped,
            },
            "Box" | "Rc" | "Arc" | "Cow" | "RefCell" | "Cell" | "Mutex" | "RwLock" | "Wrapping" => {
                arg(0, stack)?
            }
            "Vec" | "VecDeque" | "LinkedList" | "HashSet" | "BTreeSet" | "IndexSet" | "BinaryHeap" => {
                arg(0, stack)?.map(|ty| TypeRef::Array(Box::new(ty)))
            }
            "HashMap" | "BTreeMap" | "IndexMap" => {
                arg(1, stack)?.map(|ty| TypeRef::Map(Box::new(ty)))
            }
            _ => match primitive_for(ident) {
                Some(ty) => Resolved::required(ty),
                None => return Ok(None),
            },
        };
        Ok(Some(resolved))
    }

    fn resolve_declaration(
        &self,
        id: DeclId,
        args: &[TypeExpr],
        scope: &Scope,
        missing: Missing,
        stack: &mut Vec<String>,
    ) -> Result<Resolved, ResolveError> {
        let decl = self.index.get(id);
        if decl.depth > self.options.parse_depth {
            warn!(
                "{} is {} dependency hops away (limit {}); using a placeholder",
                decl.full_path(),
                decl.depth,
                self.options.parse_depth
            );
            return Ok(Resolved::required(TypeRef::Any));
        }

        let arg_types = args
            .iter()
            .map(|a| {
                self.resolve_expr(a, scope, missing, stack)
                    .map(|r| r.into_type().unwrap_or(TypeRef::Any))
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Aliases are transparent
        if let DeclKind::Alias(target) = &decl.kind {
            let bindings = bind_generics(decl, &arg_types);
            let alias_scope = Scope {
                module: &decl.module,
                bindings: &bindings,
            };
            return self.resolve_expr(target, &alias_scope, missing, stack);
        }

        let base = self.index.canonical_name(id);
        let name = instantiation_name(&base, decl, &arg_types);
        if stack.contains(&name) {
            return Ok(Resolved::required(TypeRef::Schema(name)));
        }
        // Another declaration under the same name is rebuilt so `register` compares shapes
        if let Some(existing) = self.registry.get(&name) {
            if existing.origin == decl.full_path() {
                return Ok(Resolved::required(TypeRef::Schema(name)));
            }
        }

        stack.push(name.clone());
        let built = self.build_schema(decl, &name, &base, &arg_types, stack);
        stack.pop();
        self.registry.register(built?)?;
        Ok(Resolved::required(TypeRef::Schema(name)))
    }

    fn build_schema(
        &self,
        decl: &Declaration,
        name: &str,
        base: &str,
        arg_types: &[TypeRef],
        stack: &mut Vec<String>,
    ) -> Result<SchemaType, ResolveError> {
        debug!("Building schema {} from {}", name, decl.full_path());
        let bindings = bind_generics(decl, arg_types);
        let scope = Scope {
            module: &decl.module,
            bindings: &bindings,
        };

        let kind = match &decl.kind {
            DeclKind::Struct { fields, rename_all } => {
                let fields = self.collect_fields(fields, rename_all.as_deref(), &scope, stack)?;
                if decl.generics.is_empty() {
                    SchemaKind::Object { fields }
                } else {
                    SchemaKind::Instantiation {
                        base: base.to_string(),
                        args: arg_types.iter().map(TypeRef::canonical_name).collect(),
                        fields,
                    }
                }
            }
            DeclKind::Tuple { elements, .. } if elements.len() == 1 => {
                match self.resolve_expr(&elements[0], &scope, Missing::Placeholder, stack)? {
                    Resolved::Type {
                        ty: TypeRef::Array(element),
                        ..
                    } => SchemaKind::Array { element: *element },
                    Resolved::Type { ty, .. } => SchemaKind::Alias { underlying: ty },
                    Resolved::Skipped => SchemaKind::Alias {
                        underlying: TypeRef::Any,
                    },
                }
            }
            DeclKind::Tuple { .. } => SchemaKind::Array {
                element: TypeRef::Any,
            },
            DeclKind::Unit => SchemaKind::Object { fields: Vec::new() },
            DeclKind::UnitEnum {
                variants,
                rename_all,
            } => SchemaKind::Enum {
                values: variants
                    .iter()
                    .map(|v| match (&v.rename, rename_all) {
                        (Some(rename), _) => rename.clone(),
                        (None, Some(rule)) => apply_rename_rule(rule, &v.name),
                        (None, None) => v.name.clone(),
                    })
                    .collect(),
            },
            // Data-carrying enums and anything left over have no structural schema
            DeclKind::DataEnum | DeclKind::Alias(_) => SchemaKind::Alias {
                underlying: TypeRef::Any,
            },
        };

        Ok(SchemaType {
            name: name.to_string(),
            origin: decl.full_path(),
            description: decl.description.clone(),
            kind,
        })
    }

    /// Fields of a struct with flattened fields merged in.
    ///
    /// On a name collision the field declared fewest flatten levels down wins; among
    /// equally deep fields the first declared wins and keeps its position.
    fn collect_fields(
        &self,
        fields: &[FieldDecl],
        rename_all: Option<&str>,
        scope: &Scope,
        stack: &mut Vec<String>,
    ) -> Result<Vec<FieldDescriptor>, ResolveError> {
        let mut merged: Vec<(usize, FieldDescriptor)> = Vec::new();
        self.merge_fields(fields, rename_all, scope, 0, stack, &mut merged)?;
        Ok(merged.into_iter().map(|(_, field)| field).collect())
    }

    fn merge_fields(
        &self,
        fields: &[FieldDecl],
        rename_all: Option<&str>,
        scope: &Scope,
        depth: usize,
        stack: &mut Vec<String>,
        out: &mut Vec<(usize, FieldDescriptor)>,
    ) -> Result<(), ResolveError> {
        for field in fields {
            if field.serde.skip || field.annotation.ignore {
                continue;
            }
            if field.serde.flatten {
                self.merge_embedded(field, scope, depth, stack, out)?;
                continue;
            }
            if let Some(descriptor) = self.describe_field(field, rename_all, scope, stack)? {
                insert_field(out, depth, descriptor);
            }
        }
        Ok(())
    }

    fn merge_embedded(
        &self,
        field: &FieldDecl,
        scope: &Scope,
        depth: usize,
        stack: &mut Vec<String>,
        out: &mut Vec<(usize, FieldDescriptor)>,
    ) -> Result<(), ResolveError> {
        if depth >= MAX_EMBED_DEPTH {
            warn!("Flattened field `{}` nests too deep; ignoring it", field.name);
            return Ok(());
        }
        let expr = field.annotation.type_override.as_ref().unwrap_or(&field.ty);
        let Some((id, bindings)) = self.embedded_target(expr, scope, stack, MAX_EMBED_DEPTH)? else {
            debug!("Flattened field `{}` is not a struct; ignoring it", field.name);
            return Ok(());
        };

        let decl = self.index.get(id);
        if decl.depth > self.options.parse_depth {
            warn!(
                "{} is beyond the dependency depth limit; its flattened fields are omitted",
                decl.full_path()
            );
            return Ok(());
        }
        let DeclKind::Struct { fields, rename_all } = &decl.kind else {
            debug!("Flattened {} has no named fields; ignoring it", decl.full_path());
            return Ok(());
        };

        let marker = format!("flatten:{}", decl.full_path());
        if stack.contains(&marker) {
            warn!("{} flattens itself; ignoring the cycle", decl.full_path());
            return Ok(());
        }
        let embedded_scope = Scope {
            module: &decl.module,
            bindings: &bindings,
        };
        stack.push(marker);
        let result = self.merge_fields(
            fields,
            rename_all.as_deref(),
            &embedded_scope,
            depth + 1,
            stack,
            out,
        );
        stack.pop();
        result
    }

    /// Declaration whose fields a flattened field contributes, following aliases, `Option`,
    /// `Box` and replace rules.
    fn embedded_target(
        &self,
        expr: &TypeExpr,
        scope: &Scope,
        stack: &mut Vec<String>,
        hops: usize,
    ) -> Result<Option<(DeclId, HashMap<String, TypeRef>)>, ResolveError> {
        let TypeExpr::Path { segments, args } = expr else {
            return Ok(None);
        };
        if hops == 0 {
            return Ok(None);
        }
        let ident = segments.last().map(String::as_str).unwrap_or_default();
        let found = self.index.lookup(scope.module, segments).or_else(|| {
            if is_builtin(ident) {
                None
            } else {
                self.index.lookup_or_search(scope.module, segments)
            }
        });

        match self.override_for(segments, found, scope.module) {
            Some(OverrideAction::Skip) => return Ok(None),
            Some(OverrideAction::Replace(target)) => {
                let Some(replacement) = TypeExpr::parse_annotation(target) else {
                    return Ok(None);
                };
                let root = ModulePath::root(self.index.root_crate());
                let empty = HashMap::new();
                let root_scope = Scope {
                    module: &root,
                    bindings: &empty,
                };
                return self.embedded_target(&replacement, &root_scope, stack, hops - 1);
            }
            None => {}
        }

        let Some(id) = found else {
            return match (ident, args.first()) {
                ("Option" | "Box", Some(inner)) => self.embedded_target(inner, scope, stack, hops - 1),
                _ => Ok(None),
            };
        };

        let arg_types = args
            .iter()
            .map(|a| {
                self.resolve_expr(a, scope, Missing::Placeholder, stack)
                    .map(|r| r.into_type().unwrap_or(TypeRef::Any))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let decl = self.index.get(id);
        let bindings = bind_generics(decl, &arg_types);
        if let DeclKind::Alias(target) = &decl.kind {
            let alias_scope = Scope {
                module: &decl.module,
                bindings: &bindings,
            };
            return self.embedded_target(target, &alias_scope, stack, hops - 1);
        }
        Ok(Some((id, bindings)))
    }

    fn describe_field(
        &self,
        field: &FieldDecl,
        rename_all: Option<&str>,
        scope: &Scope,
        stack: &mut Vec<String>,
    ) -> Result<Option<FieldDescriptor>, ResolveError> {
        let expr = field.annotation.type_override.as_ref().unwrap_or(&field.ty);
        let (ty, optional) = match self.resolve_expr(expr, scope, Missing::Placeholder, stack)? {
            Resolved::Skipped => return Ok(None),
            Resolved::Type { ty, optional } => (ty, optional),
        };

        let annotation = &field.annotation;
        let validate = &field.validate;
        let required = annotation.required.unwrap_or(if validate.required {
            true
        } else if optional || field.serde.default {
            false
        } else {
            self.options.required_by_default
        });
        let format = annotation.format.clone().or_else(|| {
            if validate.email {
                Some("email".to_string())
            } else if validate.url {
                Some("uri".to_string())
            } else {
                None
            }
        });

        Ok(Some(FieldDescriptor {
            display_name: display_name(
                &field.name,
                field.serde.rename.as_deref(),
                rename_all,
                self.options.naming,
            ),
            name: field.name.clone(),
            ty,
            required,
            nullable: optional,
            constraints: Constraints {
                minimum: annotation.minimum.or(validate.minimum),
                maximum: annotation.maximum.or(validate.maximum),
                min_length: annotation.min_length.or(validate.min_length),
                max_length: annotation.max_length.or(validate.max_length),
                pattern: annotation.pattern.clone(),
                enum_values: annotation.enums.clone(),
                default: annotation.default.clone(),
            },
            description: annotation.description.clone(),
            example: annotation.example.clone(),
            format,
        }))
    }
}

fn insert_field(out: &mut Vec<(usize, FieldDescriptor)>, depth: usize, field: FieldDescriptor) {
    match out
        .iter_mut()
        .find(|(_, existing)| existing.display_name == field.display_name)
    {
        Some(slot) if depth < slot.0 => *slot = (depth, field),
        Some(_) => debug!("Field `{}` is shadowed by a shallower field", field.display_name),
        None => out.push((depth, field)),
    }
}

fn bind_generics(decl: &Declaration, arg_types: &[TypeRef]) -> HashMap<String, TypeRef> {
    decl.generics
        .iter()
        .enumerate()
        .map(|(i, param)| (param.clone(), arg_types.get(i).cloned().unwrap_or(TypeRef::Any)))
        .collect()
}

/// `Base[arg,...]` for generic declarations, the bare canonical name otherwise.
fn instantiation_name(base: &str, decl: &Declaration, arg_types: &[TypeRef]) -> String {
    if decl.generics.is_empty() {
        return base.to_string();
    }
    let args: Vec<String> = (0..decl.generics.len())
        .map(|i| {
            arg_types
                .get(i)
                .map(TypeRef::canonical_name)
                .unwrap_or_else(|| TypeRef::Any.canonical_name())
        })
        .collect();
    format!("{}[{}]", base, args.join(","))
}

fn is_builtin(ident: &str) -> bool {
    matches!(
        ident,
        "Option"
            | "Box"
            | "Rc"
            | "Arc"
            | "Cow"
            | "RefCell"
            | "Cell"
            | "Mutex"
            | "RwLock"
            | "Wrapping"
            | "Vec"
            | "VecDeque"
            | "LinkedList"
            | "HashSet"
            | "BTreeSet"
            | "IndexSet"
            | "BinaryHeap"
            | "HashMap"
            | "BTreeMap"
            | "IndexMap"
    ) || primitive_for(ident).is_some()
}

/// Primitive for a Rust type name or an annotation keyword.
pub fn primitive_for(ident: &str) -> Option<TypeRef> {
    let primitive = match ident {
        "String" | "str" | "char" | "PathBuf" | "Path" | "OsString" | "string" => Primitive::String,
        "i8" | "i16" | "i32" | "u8" | "u16" | "u32" | "int32" => Primitive::Int32,
        "i64" | "u64" | "i128" | "u128" | "isize" | "usize" | "int64" => Primitive::Int64,
        "integer" | "int" => Primitive::Integer,
        "f32" | "float" => Primitive::Float,
        "f64" | "double" => Primitive::Double,
        "number" | "Decimal" | "BigDecimal" => Primitive::Number,
        "bool" | "boolean" => Primitive::Boolean,
        "DateTime" | "NaiveDateTime" | "OffsetDateTime" | "PrimitiveDateTime" | "SystemTime" => {
            Primitive::DateTime
        }
        "NaiveDate" | "Date" => Primitive::Date,
        "Uuid" => Primitive::Uuid,
        "Url" | "Uri" => Primitive::Uri,
        "Bytes" | "ByteBuf" | "file" => Primitive::Binary,
        "Value" | "JsonValue" | "object" | "any" => return Some(TypeRef::Any),
        _ => return None,
    };
    Some(TypeRef::Primitive(primitive))
}
