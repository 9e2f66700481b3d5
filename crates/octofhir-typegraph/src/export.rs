//! Export of the assembled graph as async-graphql dynamic types.
//!
//! The exporter turns one model version of an [`AssembledGraph`] into
//! dynamic `Object`, `InputObject`, `Enum` and `Scalar` registrations. Output
//! fields resolve by reading the same-named property of the parent JSON value,
//! so a resolver that returns a FHIR resource as JSON gets every nested field
//! for free. Query roots are wired by the caller; the exporter only adds the
//! search arguments of a resource to a root field.

use async_graphql::Value;
use async_graphql::dynamic::{
    Enum, EnumItem, Field, FieldFuture, InputObject, InputValue, Object, Scalar, Schema,
    SchemaBuilder, TypeRef,
};
use tracing::{debug, trace};

use crate::assembly::AssembledGraph;
use crate::error::TypeGraphError;
use crate::search::search_scalars;
use crate::types::{FieldSpec, FieldType, TypeDefinition, TypeKind, custom_scalars};

/// Registers one model version of an assembled graph into a dynamic schema.
pub struct SchemaExporter<'g> {
    graph: &'g AssembledGraph,
    version: String,
}

impl<'g> SchemaExporter<'g> {
    /// Creates an exporter for `version` of `graph`.
    pub fn new(graph: &'g AssembledGraph, version: impl Into<String>) -> Self {
        Self {
            graph,
            version: version.into(),
        }
    }

    /// Registers every scalar and type of the version into `builder`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaExport` if the graph holds no such version.
    pub fn register(&self, builder: SchemaBuilder) -> Result<SchemaBuilder, TypeGraphError> {
        if !self
            .graph
            .versions()
            .iter()
            .any(|v| v.as_str() == self.version)
        {
            return Err(TypeGraphError::SchemaExport(format!(
                "model version '{}' is not assembled",
                self.version
            )));
        }

        let mut builder = register_scalars(builder);
        let mut registered = 0usize;

        for definition in self.graph.types().filter(|d| d.key.version.as_str() == self.version) {
            builder = match definition.kind {
                TypeKind::Object => builder.register(object_type(definition)),
                TypeKind::InputObject => builder.register(input_object_type(definition)),
                TypeKind::Enum => builder.register(enum_type(definition)),
                TypeKind::Scalar => {
                    if is_builtin_scalar(definition.name()) {
                        continue;
                    }
                    builder.register(Scalar::new(definition.name()).description(&definition.description))
                }
            };
            registered += 1;
        }

        debug!(version = %self.version, types = registered, "Registered type graph into schema");
        Ok(builder)
    }

    /// Builds a complete schema around a caller-provided query root.
    ///
    /// # Errors
    ///
    /// Returns `SchemaExport` if the version is unknown or async-graphql
    /// rejects the schema.
    pub fn build_schema(&self, query: Object) -> Result<Schema, TypeGraphError> {
        let builder = Schema::build(query.type_name(), None, None);
        let builder = self.register(builder)?.register(query);
        builder
            .finish()
            .map_err(|e| TypeGraphError::SchemaExport(e.to_string()))
    }

    /// Adds the search arguments of `resource` to a root field.
    pub fn search_arguments(&self, mut field: Field, resource: &str) -> Field {
        let Some(arguments) = self.graph.search_arguments(&self.version, resource) else {
            return field;
        };

        for argument in arguments.iter() {
            let mut input = InputValue::new(
                argument.name.as_str(),
                TypeRef::named(argument.scalar.graphql_name()),
            );
            if !argument.description.is_empty() {
                input = input.description(&argument.description);
            }
            field = field.argument(input);
        }
        field
    }
}

/// Registers custom FHIR and search scalar types.
fn register_scalars(builder: SchemaBuilder) -> SchemaBuilder {
    let mut builder = builder;
    for (name, description) in custom_scalars().iter().chain(search_scalars()) {
        let scalar = Scalar::new(*name).description(*description);
        builder = builder.register(scalar);
    }
    builder
}

/// Whether `name` is a GraphQL built-in or already registered by
/// [`register_scalars`].
fn is_builtin_scalar(name: &str) -> bool {
    matches!(name, "Boolean" | "Int" | "Float" | "String" | "ID")
        || custom_scalars()
            .iter()
            .chain(search_scalars())
            .any(|(scalar, _)| *scalar == name)
}

/// Converts a field type into a dynamic `TypeRef`, wrappers included.
pub fn type_ref(field_type: &FieldType) -> TypeRef {
    match field_type {
        FieldType::Scalar(kind) => TypeRef::named(kind.graphql_name()),
        FieldType::Named(key) => TypeRef::named(key.name.as_str()),
        FieldType::List(inner) => TypeRef::List(Box::new(type_ref(inner))),
        FieldType::NonNull(inner) => TypeRef::NonNull(Box::new(type_ref(inner))),
    }
}

fn object_type(definition: &TypeDefinition) -> Object {
    let mut obj = Object::new(definition.name());
    if !definition.description.is_empty() {
        obj = obj.description(&definition.description);
    }

    for (name, spec) in &definition.fields {
        obj = obj.field(create_field_resolver(name, spec));
    }

    // GraphQL requires at least one field per type
    if definition.fields.is_empty() {
        trace!(type_name = %definition.name(), "No fields found, adding placeholder field");
        let placeholder = Field::new("_placeholder", TypeRef::named(TypeRef::STRING), |_ctx| {
            FieldFuture::new(async { Ok(None::<Value>) })
        })
        .description("Placeholder field - type has no defined elements");
        obj = obj.field(placeholder);
    }
    obj
}

/// Creates a field that reads the same-named property of the parent value.
fn create_field_resolver(field_name: &str, spec: &FieldSpec) -> Field {
    let json_field_name = field_name.to_string();

    let field = Field::new(field_name, type_ref(&spec.field_type), move |ctx| {
        let field_name = json_field_name.clone();
        FieldFuture::new(async move {
            if let Some(parent) = ctx.parent_value.as_value()
                && let Value::Object(obj) = parent
                && let Some(value) = obj.get(&async_graphql::Name::new(&field_name))
            {
                return Ok(Some(value.clone()));
            }
            Ok(None)
        })
    });

    if spec.description.is_empty() {
        field
    } else {
        field.description(&spec.description)
    }
}

fn input_object_type(definition: &TypeDefinition) -> InputObject {
    let mut input = InputObject::new(definition.name());
    if !definition.description.is_empty() {
        input = input.description(&definition.description);
    }

    for (name, spec) in &definition.fields {
        let mut value = InputValue::new(name.as_str(), type_ref(&spec.field_type));
        if !spec.description.is_empty() {
            value = value.description(&spec.description);
        }
        input = input.field(value);
    }

    if definition.fields.is_empty() {
        input = input.field(
            InputValue::new("_placeholder", TypeRef::named(TypeRef::STRING))
                .description("Placeholder field - type has no writable elements"),
        );
    }
    input
}

fn enum_type(definition: &TypeDefinition) -> Enum {
    let mut enumeration = Enum::new(definition.name());
    if !definition.description.is_empty() {
        enumeration = enumeration.description(&definition.description);
    }
    for value in &definition.enum_values {
        enumeration = enumeration.item(EnumItem::new(value.as_str()));
    }
    enumeration
}
