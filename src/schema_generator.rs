use crate::annotation::operation::ParamAttrs;
use crate::schema_registry::{FieldDescriptor, Primitive, SchemaKind, SchemaType, TypeRef};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Prefix of every component schema reference.
pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// Schema generator - converts resolved types into OpenAPI schemas
///
/// Shapes differ between OpenAPI 3.0 (`nullable`, `example`, `allOf` around references
/// with siblings) and 3.1 (`"null"` in the type list, `examples`, `oneOf` for nullable
/// references).
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaGenerator {
    openapi_3_1: bool,
}

/// `type` is a single name in 3.0 and may be a list in 3.1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaTypeValue {
    Single(String),
    Multiple(Vec<String>),
}

impl SchemaTypeValue {
    pub fn single(name: &str) -> Self {
        SchemaTypeValue::Single(name.to_string())
    }

    /// The first non-null type name.
    pub fn primary(&self) -> Option<&str> {
        match self {
            SchemaTypeValue::Single(name) => Some(name),
            SchemaTypeValue::Multiple(names) => {
                names.iter().map(String::as_str).find(|n| *n != "null")
            }
        }
    }
}

/// OpenAPI Schema definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Reference to a component schema
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaTypeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<Schema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<Schema>,
    /// Properties for object types, in declaration order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Schema>,
    /// Required property names for object types
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Value schema for string-keyed maps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// OpenAPI 3.0 only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    /// OpenAPI 3.0 only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    /// OpenAPI 3.1 only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Value>,
}

impl Schema {
    fn typed(name: &str, format: Option<&str>) -> Self {
        Schema {
            schema_type: Some(SchemaTypeValue::single(name)),
            format: format.map(String::from),
            ..Schema::default()
        }
    }

    pub fn reference_to(name: &str) -> Self {
        Schema {
            reference: Some(format!("{}{}", SCHEMA_REF_PREFIX, name)),
            ..Schema::default()
        }
    }

    /// Name of the referenced component, if this is a plain reference.
    pub fn referenced_name(&self) -> Option<&str> {
        self.reference.as_deref()?.strip_prefix(SCHEMA_REF_PREFIX)
    }

    /// Collects every component name referenced anywhere inside this schema.
    pub fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Some(name) = self.referenced_name() {
            out.push(name);
        }
        for nested in self.all_of.iter().chain(&self.one_of).chain(self.properties.values()) {
            nested.collect_references(out);
        }
        for nested in self.items.iter().chain(&self.additional_properties) {
            nested.collect_references(out);
        }
    }

    fn primary_type(&self) -> Option<&str> {
        self.schema_type.as_ref().and_then(SchemaTypeValue::primary)
    }
}

/// Attributes that sit next to a type: documentation, examples and constraints.
#[derive(Debug, Clone, Default)]
struct Decorations {
    description: Option<String>,
    format: Option<String>,
    example: Option<String>,
    default: Option<String>,
    enum_values: Vec<String>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    min_length: Option<u64>,
    max_length: Option<u64>,
    pattern: Option<String>,
}

impl Decorations {
    fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.format.is_none()
            && self.example.is_none()
            && self.default.is_none()
            && self.enum_values.is_empty()
            && self.minimum.is_none()
            && self.maximum.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.pattern.is_none()
    }
}

impl SchemaGenerator {
    pub fn new(openapi_3_1: bool) -> Self {
        Self { openapi_3_1 }
    }

    /// Inline schema for a type reference.
    pub fn type_schema(&self, ty: &TypeRef) -> Schema {
        match ty {
            TypeRef::Primitive(primitive) => primitive_schema(*primitive),
            TypeRef::Schema(name) => Schema::reference_to(name),
            TypeRef::Array(element) => Schema {
                items: Some(Box::new(self.type_schema(element))),
                ..Schema::typed("array", None)
            },
            TypeRef::Map(value) => Schema {
                additional_properties: Some(Box::new(self.type_schema(value))),
                ..Schema::typed("object", None)
            },
            TypeRef::Any => Schema::typed("object", None),
        }
    }

    /// Component schema for a registry entry.
    pub fn component_schema(&self, schema: &SchemaType) -> Schema {
        debug!("Generating component schema {}", schema.name);
        let mut generated = match &schema.kind {
            SchemaKind::Object { fields } | SchemaKind::Instantiation { fields, .. } => {
                let mut object = Schema::typed("object", None);
                for field in fields {
                    if field.required {
                        object.required.push(field.display_name.clone());
                    }
                    object
                        .properties
                        .insert(field.display_name.clone(), self.field_schema(field));
                }
                object
            }
            SchemaKind::Array { element } => self.type_schema(&TypeRef::Array(Box::new(element.clone()))),
            SchemaKind::Alias { underlying } => self.type_schema(underlying),
            SchemaKind::Enum { values } => Schema {
                enum_values: values.iter().cloned().map(Value::String).collect(),
                ..Schema::typed("string", None)
            },
        };
        if let Some(description) = &schema.description {
            generated = self.decorate(
                generated,
                Decorations {
                    description: Some(description.clone()),
                    ..Decorations::default()
                },
                false,
            );
        }
        generated
    }

    /// All component schemas keyed by canonical name.
    pub fn components<'s>(
        &self,
        schemas: impl IntoIterator<Item = &'s SchemaType>,
    ) -> BTreeMap<String, Schema> {
        schemas
            .into_iter()
            .map(|schema| (schema.name.clone(), self.component_schema(schema)))
            .collect()
    }

    /// Schema of one object property.
    pub fn field_schema(&self, field: &FieldDescriptor) -> Schema {
        let constraints = &field.constraints;
        self.decorate(
            self.type_schema(&field.ty),
            Decorations {
                description: field.description.clone(),
                format: field.format.clone(),
                example: field.example.clone(),
                default: constraints.default.clone(),
                enum_values: constraints.enum_values.clone(),
                minimum: constraints.minimum,
                maximum: constraints.maximum,
                min_length: constraints.min_length,
                max_length: constraints.max_length,
                pattern: constraints.pattern.clone(),
            },
            field.nullable,
        )
    }

    /// Schema of a non-body parameter or form field.
    pub fn parameter_schema(&self, ty: &TypeRef, attrs: &ParamAttrs) -> Schema {
        // Attribute constraints describe the elements of array parameters
        if let TypeRef::Array(element) = ty {
            let items = self.parameter_schema(element, attrs);
            return Schema {
                items: Some(Box::new(items)),
                ..Schema::typed("array", None)
            };
        }
        self.decorate(
            self.type_schema(ty),
            Decorations {
                format: attrs.format.clone(),
                example: attrs.example.clone(),
                default: attrs.default.clone(),
                enum_values: attrs.enums.clone(),
                minimum: attrs.minimum,
                maximum: attrs.maximum,
                min_length: attrs.min_length,
                max_length: attrs.max_length,
                ..Decorations::default()
            },
            false,
        )
    }

    /// Applies attributes and nullability in the shape the target version expects.
    fn decorate(&self, base: Schema, decorations: Decorations, nullable: bool) -> Schema {
        if base.reference.is_some() {
            return self.decorate_reference(base, decorations, nullable);
        }

        let mut schema = base;
        self.apply(&mut schema, decorations);
        if nullable {
            if self.openapi_3_1 {
                let types = match schema.schema_type.take() {
                    Some(SchemaTypeValue::Single(name)) => vec![name, "null".to_string()],
                    Some(SchemaTypeValue::Multiple(mut names)) => {
                        if !names.iter().any(|n| n == "null") {
                            names.push("null".to_string());
                        }
                        names
                    }
                    None => vec!["null".to_string()],
                };
                schema.schema_type = Some(SchemaTypeValue::Multiple(types));
            } else {
                schema.nullable = Some(true);
            }
        }
        schema
    }

    fn decorate_reference(&self, reference: Schema, decorations: Decorations, nullable: bool) -> Schema {
        if decorations.is_empty() && !nullable {
            return reference;
        }
        if self.openapi_3_1 {
            let mut schema = if nullable {
                Schema {
                    one_of: vec![reference, Schema::typed("null", None)],
                    ..Schema::default()
                }
            } else {
                reference
            };
            // 3.1 allows siblings next to `$ref`
            self.apply(&mut schema, decorations);
            return schema;
        }
        let mut schema = Schema {
            all_of: vec![reference],
            nullable: nullable.then_some(true),
            ..Schema::default()
        };
        self.apply(&mut schema, decorations);
        schema
    }

    fn apply(&self, schema: &mut Schema, decorations: Decorations) {
        let primary = schema.primary_type().map(String::from);
        let primary = primary.as_deref();
        if decorations.description.is_some() {
            schema.description = decorations.description;
        }
        if decorations.format.is_some() {
            schema.format = decorations.format;
        }
        if let Some(example) = decorations.example {
            let value = typed_value(&example, primary);
            if self.openapi_3_1 {
                schema.examples = vec![value];
            } else {
                schema.example = Some(value);
            }
        }
        if let Some(default) = decorations.default {
            schema.default = Some(typed_value(&default, primary));
        }
        if !decorations.enum_values.is_empty() {
            schema.enum_values = decorations
                .enum_values
                .iter()
                .map(|v| typed_value(v, primary))
                .collect();
        }
        schema.minimum = decorations.minimum.or(schema.minimum);
        schema.maximum = decorations.maximum.or(schema.maximum);
        schema.min_length = decorations.min_length.or(schema.min_length);
        schema.max_length = decorations.max_length.or(schema.max_length);
        if decorations.pattern.is_some() {
            schema.pattern = decorations.pattern;
        }
    }
}

fn primitive_schema(primitive: Primitive) -> Schema {
    let (name, format) = primitive.type_and_format();
    Schema::typed(name, format)
}

/// Reads an annotation value as JSON of the schema's type, falling back to a string.
fn typed_value(text: &str, schema_type: Option<&str>) -> Value {
    let text = text.trim();
    let parsed = match schema_type {
        Some("integer") => text.parse::<i64>().ok().map(Value::from),
        Some("number") => text.parse::<f64>().ok().map(Value::from),
        Some("boolean") => text.parse::<bool>().ok().map(Value::from),
        Some("array") | Some("object") => serde_json::from_str::<Value>(text).ok(),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        let unquoted = text
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .unwrap_or(text);
        Value::String(unquoted.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_registry::Constraints;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn field(name: &str, ty: TypeRef) -> FieldDescriptor {
        FieldDescriptor {
            name: name.to_string(),
            display_name: name.to_string(),
            ty,
            required: true,
            nullable: false,
            constraints: Constraints::default(),
            description: None,
            example: None,
            format: None,
        }
    }

    fn to_json(schema: &Schema) -> Value {
        serde_json::to_value(schema).unwrap()
    }

    #[test]
    fn test_primitive_types() {
        let generator = SchemaGenerator::new(false);
        assert_eq!(
            to_json(&generator.type_schema(&TypeRef::Primitive(Primitive::Int64))),
            json!({"type": "integer", "format": "int64"})
        );
        assert_eq!(
            to_json(&generator.type_schema(&TypeRef::Primitive(Primitive::String))),
            json!({"type": "string"})
        );
        assert_eq!(
            to_json(&generator.type_schema(&TypeRef::Primitive(Primitive::DateTime))),
            json!({"type": "string", "format": "date-time"})
        );
        assert_eq!(to_json(&generator.type_schema(&TypeRef::Any)), json!({"type": "object"}));
    }

    #[test]
    fn test_arrays_maps_and_references() {
        let generator = SchemaGenerator::new(false);
        let ty = TypeRef::Map(Box::new(TypeRef::Array(Box::new(TypeRef::Schema(
            "models.Tag".to_string(),
        )))));
        assert_eq!(
            to_json(&generator.type_schema(&ty)),
            json!({
                "type": "object",
                "additionalProperties": {
                    "type": "array",
                    "items": {"$ref": "#/components/schemas/models.Tag"}
                }
            })
        );
    }

    #[test]
    fn test_object_component_keeps_field_order_and_required() {
        let generator = SchemaGenerator::new(false);
        let mut nick = field("nick", TypeRef::Primitive(Primitive::String));
        nick.required = false;
        nick.nullable = true;
        let schema = SchemaType {
            name: "User".to_string(),
            origin: "app::User".to_string(),
            description: Some("A user".to_string()),
            kind: SchemaKind::Object {
                fields: vec![field("id", TypeRef::Primitive(Primitive::Int32)), nick],
            },
        };
        let generated = generator.component_schema(&schema);
        assert_eq!(
            to_json(&generated),
            json!({
                "type": "object",
                "description": "A user",
                "properties": {
                    "id": {"type": "integer", "format": "int32"},
                    "nick": {"type": "string", "nullable": true}
                },
                "required": ["id"]
            })
        );
        let keys: Vec<&String> = generated.properties.keys().collect();
        assert_eq!(keys, vec!["id", "nick"]);
    }

    #[test]
    fn test_nullable_reference_per_version() {
        let mut owner = field("owner", TypeRef::Schema("Person".to_string()));
        owner.nullable = true;
        owner.description = Some("Who owns it".to_string());

        let v30 = SchemaGenerator::new(false).field_schema(&owner);
        assert_eq!(
            to_json(&v30),
            json!({
                "allOf": [{"$ref": "#/components/schemas/Person"}],
                "description": "Who owns it",
                "nullable": true
            })
        );

        let v31 = SchemaGenerator::new(true).field_schema(&owner);
        assert_eq!(
            to_json(&v31),
            json!({
                "oneOf": [{"$ref": "#/components/schemas/Person"}, {"type": "null"}],
                "description": "Who owns it"
            })
        );
    }

    #[test]
    fn test_nullable_primitive_and_examples_per_version() {
        let mut age = field("age", TypeRef::Primitive(Primitive::Int32));
        age.nullable = true;
        age.example = Some("42".to_string());
        age.constraints.minimum = Some(0.0);

        assert_eq!(
            to_json(&SchemaGenerator::new(false).field_schema(&age)),
            json!({"type": "integer", "format": "int32", "minimum": 0.0, "nullable": true, "example": 42})
        );
        assert_eq!(
            to_json(&SchemaGenerator::new(true).field_schema(&age)),
            json!({"type": ["integer", "null"], "format": "int32", "minimum": 0.0, "examples": [42]})
        );
    }

    #[test]
    fn test_plain_reference_stays_plain() {
        let generator = SchemaGenerator::new(false);
        let schema = generator.field_schema(&field("pet", TypeRef::Schema("Pet".to_string())));
        assert_eq!(schema.referenced_name(), Some("Pet"));
        assert!(schema.all_of.is_empty());
    }

    #[test]
    fn test_enum_component() {
        let schema = SchemaType {
            name: "Status".to_string(),
            origin: "app::Status".to_string(),
            description: None,
            kind: SchemaKind::Enum {
                values: vec!["active".to_string(), "gone".to_string()],
            },
        };
        assert_eq!(
            to_json(&SchemaGenerator::new(false).component_schema(&schema)),
            json!({"type": "string", "enum": ["active", "gone"]})
        );
    }

    #[test]
    fn test_parameter_schema_applies_attributes_to_items() {
        let attrs = ParamAttrs {
            enums: vec!["1".to_string(), "2".to_string()],
            default: Some("1".to_string()),
            ..ParamAttrs::default()
        };
        let ty = TypeRef::Array(Box::new(TypeRef::Primitive(Primitive::Int32)));
        assert_eq!(
            to_json(&SchemaGenerator::new(false).parameter_schema(&ty, &attrs)),
            json!({
                "type": "array",
                "items": {"type": "integer", "format": "int32", "enum": [1, 2], "default": 1}
            })
        );
    }

    #[test]
    fn test_collect_references() {
        let generator = SchemaGenerator::new(true);
        let mut parent = field("parent", TypeRef::Schema("Node".to_string()));
        parent.nullable = true;
        let schema = Schema {
            properties: IndexMap::from([
                ("parent".to_string(), generator.field_schema(&parent)),
                (
                    "tags".to_string(),
                    generator.type_schema(&TypeRef::Array(Box::new(TypeRef::Schema("Tag".to_string())))),
                ),
            ]),
            ..Schema::typed("object", None)
        };
        let mut names = Vec::new();
        schema.collect_references(&mut names);
        assert_eq!(names, vec!["Node", "Tag"]);
    }

    #[test]
    fn test_typed_values() {
        assert_eq!(typed_value("12", Some("integer")), json!(12));
        assert_eq!(typed_value("1.5", Some("number")), json!(1.5));
        assert_eq!(typed_value("true", Some("boolean")), json!(true));
        assert_eq!(typed_value("abc", Some("integer")), json!("abc"));
        assert_eq!(typed_value("\"quoted\"", Some("string")), json!("quoted"));
    }
}
