//! Resolved schema types and the per-build registry that owns them.
//!
//! Every [`SchemaType`] lives in exactly one [`SchemaRegistry`] under its canonical name.
//! Fields and operations refer to schemas by name through [`TypeRef::Schema`], so many
//! fields can share one entry and the registry stays the only owner.

use crate::error::ResolveError;
use indexmap::IndexMap;
use log::debug;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Primitive value types with their OpenAPI `type`/`format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    String,
    /// `integer` without a format
    Integer,
    Int32,
    Int64,
    /// `number` without a format
    Number,
    Float,
    Double,
    Boolean,
    DateTime,
    Date,
    Uuid,
    Uri,
    Binary,
}

impl Primitive {
    /// OpenAPI `type` and `format`.
    pub fn type_and_format(&self) -> (&'static str, Option<&'static str>) {
        match self {
            Primitive::String => ("string", None),
            Primitive::Integer => ("integer", None),
            Primitive::Int32 => ("integer", Some("int32")),
            Primitive::Int64 => ("integer", Some("int64")),
            Primitive::Number => ("number", None),
            Primitive::Float => ("number", Some("float")),
            Primitive::Double => ("number", Some("double")),
            Primitive::Boolean => ("boolean", None),
            Primitive::DateTime => ("string", Some("date-time")),
            Primitive::Date => ("string", Some("date")),
            Primitive::Uuid => ("string", Some("uuid")),
            Primitive::Uri => ("string", Some("uri")),
            Primitive::Binary => ("string", Some("binary")),
        }
    }

    /// Name used inside canonical instantiation names.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Integer => "integer",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::Number => "number",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::Boolean => "boolean",
            Primitive::DateTime => "date-time",
            Primitive::Date => "date",
            Primitive::Uuid => "uuid",
            Primitive::Uri => "uri",
            Primitive::Binary => "binary",
        }
    }
}

/// Non-owning reference to a resolved type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Primitive(Primitive),
    /// A registry entry, by canonical name
    Schema(String),
    Array(Box<TypeRef>),
    /// String-keyed map
    Map(Box<TypeRef>),
    /// Opaque placeholder for types that cannot be resolved structurally
    Any,
}

impl TypeRef {
    /// Canonical spelling, used for generic instantiation names.
    pub fn canonical_name(&self) -> String {
        match self {
            TypeRef::Primitive(p) => p.canonical_name().to_string(),
            TypeRef::Schema(name) => name.clone(),
            TypeRef::Array(inner) => format!("[]{}", inner.canonical_name()),
            TypeRef::Map(inner) => format!("map[string]{}", inner.canonical_name()),
            TypeRef::Any => "any".to_string(),
        }
    }

    /// Collects every schema name reachable without going through the registry.
    pub fn collect_schema_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            TypeRef::Schema(name) => out.push(name),
            TypeRef::Array(inner) | TypeRef::Map(inner) => inner.collect_schema_names(out),
            TypeRef::Primitive(_) | TypeRef::Any => {}
        }
    }
}

/// Validation constraints of a field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
    pub enum_values: Vec<String>,
    pub default: Option<String>,
}

/// One property of an object schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Name as declared in source
    pub name: String,
    /// Name after rename rules and the naming strategy
    pub display_name: String,
    pub ty: TypeRef,
    pub required: bool,
    pub nullable: bool,
    pub constraints: Constraints,
    pub description: Option<String>,
    pub example: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    Object {
        fields: Vec<FieldDescriptor>,
    },
    Array {
        element: TypeRef,
    },
    Alias {
        underlying: TypeRef,
    },
    Instantiation {
        base: String,
        args: Vec<String>,
        fields: Vec<FieldDescriptor>,
    },
    /// String enumeration
    Enum {
        values: Vec<String>,
    },
}

impl SchemaKind {
    pub fn fields(&self) -> &[FieldDescriptor] {
        match self {
            SchemaKind::Object { fields } | SchemaKind::Instantiation { fields, .. } => fields,
            _ => &[],
        }
    }
}

/// A resolved schema, owned by the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaType {
    pub name: String,
    /// Full path of the declaration it was built from
    pub origin: String,
    pub description: Option<String>,
    pub kind: SchemaKind,
}

impl SchemaType {
    /// Every schema name this type refers to directly.
    pub fn referenced_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        match &self.kind {
            SchemaKind::Array { element } => element.collect_schema_names(&mut names),
            SchemaKind::Alias { underlying } => underlying.collect_schema_names(&mut names),
            SchemaKind::Object { fields } | SchemaKind::Instantiation { fields, .. } => {
                for field in fields {
                    field.ty.collect_schema_names(&mut names);
                }
            }
            SchemaKind::Enum { .. } => {}
        }
        names
    }
}

/// Arena of resolved schemas keyed by canonical name, scoped to one build.
///
/// Reads take the shared lock; `register` is the only writer and holds the exclusive
/// lock while it checks and inserts, so one name never gets two entries.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: RwLock<IndexMap<String, Arc<SchemaType>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<SchemaType>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers a schema, or returns the entry already registered under its name.
    ///
    /// A second registration from the same declaration, or of an identical shape, is a
    /// no-op. A different shape under the same name is an [`ResolveError::AmbiguousName`].
    pub fn register(&self, schema: SchemaType) -> Result<Arc<SchemaType>, ResolveError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.get(&schema.name) {
            if existing.origin == schema.origin || existing.kind == schema.kind {
                return Ok(Arc::clone(existing));
            }
            let (first, second) = if existing.origin <= schema.origin {
                (existing.origin.clone(), schema.origin.clone())
            } else {
                (schema.origin.clone(), existing.origin.clone())
            };
            return Err(ResolveError::AmbiguousName {
                name: schema.name,
                first,
                second,
            });
        }
        debug!("Registering schema {} from {}", schema.name, schema.origin);
        let entry = Arc::new(schema);
        entries.insert(entry.name.clone(), Arc::clone(&entry));
        Ok(entry)
    }

    /// All entries ordered by canonical name.
    pub fn snapshot(&self) -> BTreeMap<String, Arc<SchemaType>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, schema)| (name.clone(), Arc::clone(schema)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rayon::prelude::*;

    fn object(name: &str, origin: &str, field_type: TypeRef) -> SchemaType {
        SchemaType {
            name: name.to_string(),
            origin: origin.to_string(),
            description: None,
            kind: SchemaKind::Object {
                fields: vec![FieldDescriptor {
                    name: "value".to_string(),
                    display_name: "value".to_string(),
                    ty: field_type,
                    required: true,
                    nullable: false,
                    constraints: Constraints::default(),
                    description: None,
                    example: None,
                    format: None,
                }],
            },
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = SchemaRegistry::new();
        let first = registry
            .register(object("types.Application", "app::types::Application", TypeRef::Any))
            .unwrap();
        let second = registry
            .register(object("types.Application", "app::types::Application", TypeRef::Any))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_identical_shape_from_other_origin_is_shared() {
        let registry = SchemaRegistry::new();
        let first = registry
            .register(object("model.Id", "a::model::Id", TypeRef::Primitive(Primitive::Int64)))
            .unwrap();
        let second = registry
            .register(object("model.Id", "b::model::Id", TypeRef::Primitive(Primitive::Int64)))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_conflicting_shapes_are_ambiguous() {
        let registry = SchemaRegistry::new();
        registry
            .register(object("model.Id", "b::model::Id", TypeRef::Primitive(Primitive::Int64)))
            .unwrap();
        let err = registry
            .register(object("model.Id", "a::model::Id", TypeRef::Primitive(Primitive::String)))
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::AmbiguousName {
                name: "model.Id".to_string(),
                first: "a::model::Id".to_string(),
                second: "b::model::Id".to_string(),
            }
        );
    }

    #[test]
    fn test_concurrent_registration_yields_one_entry() {
        let registry = SchemaRegistry::new();
        let entries: Vec<Arc<SchemaType>> = (0..64)
            .into_par_iter()
            .map(|_| {
                registry
                    .register(object("Page[string]", "app::Page", TypeRef::Any))
                    .unwrap()
            })
            .collect();
        assert_eq!(registry.len(), 1);
        assert!(entries.iter().all(|e| Arc::ptr_eq(e, &entries[0])));
    }

    #[test]
    fn test_canonical_names_of_refs() {
        let map = TypeRef::Map(Box::new(TypeRef::Array(Box::new(TypeRef::Schema(
            "model.Tag".to_string(),
        )))));
        assert_eq!(map.canonical_name(), "map[string][]model.Tag");
        assert_eq!(TypeRef::Primitive(Primitive::Int64).canonical_name(), "int64");
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let registry = SchemaRegistry::new();
        registry.register(object("b.B", "x::b::B", TypeRef::Any)).unwrap();
        registry.register(object("a.A", "x::a::A", TypeRef::Any)).unwrap();
        let names: Vec<String> = registry.snapshot().into_keys().collect();
        assert_eq!(names, vec!["a.A", "b.B"]);
    }
}
