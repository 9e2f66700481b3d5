//! Data model of the type graph.
//!
//! A graph node is a [`TypeDefinition`] addressed by a [`TypeKey`]. Fields
//! live in an insertion-ordered [`FieldMap`]; the order is the declaration
//! order and is what introspection shows to clients.
//!
//! ## Namespaces
//!
//! Every model version owns two namespaces, one per [`Graph`]. Output types
//! use the plain FHIR name (`Patient`), input types carry a suffix
//! (`Patient_Input`). Field targets always carry a full key, so an input
//! field can still point at an output-namespace enum.

mod primitive;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use primitive::{FHIR_RESOURCE_SCALAR, PrimitiveKind, ScalarKind, custom_scalars};

/// Name of the discriminator field every resource carries.
pub const RESOURCE_TYPE_FIELD: &str = "resourceType";

/// Ordered mapping from field name to field specification.
pub type FieldMap = IndexMap<String, FieldSpec>;

/// A named revision of the FHIR standard (`"3_0_1"`, `"4_0_0"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ModelVersion(Arc<str>);

impl ModelVersion {
    /// Creates a model version identifier.
    pub fn new(version: impl AsRef<str>) -> Self {
        Self(Arc::from(version.as_ref()))
    }

    /// Returns the version identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ModelVersion {
    fn from(version: String) -> Self {
        Self(Arc::from(version))
    }
}

impl From<ModelVersion> for String {
    fn from(version: ModelVersion) -> Self {
        version.0.to_string()
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which of the two parallel graphs a type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Graph {
    /// Read-oriented types.
    Output,
    /// Write-oriented types derived by projection.
    Input,
}

/// Unique identifier of a node in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey {
    /// Model version owning the type.
    pub version: ModelVersion,
    /// Graph the type lives in.
    pub graph: Graph,
    /// Type name, unique within (version, graph).
    pub name: String,
}

impl TypeKey {
    /// Creates a key.
    pub fn new(version: ModelVersion, graph: Graph, name: impl Into<String>) -> Self {
        Self {
            version,
            graph,
            name: name.into(),
        }
    }

    /// Creates a key in the output graph of `version`.
    pub fn output(version: &ModelVersion, name: impl Into<String>) -> Self {
        Self::new(version.clone(), Graph::Output, name)
    }

    /// Creates a key in the input graph of `version`.
    pub fn input(version: &ModelVersion, name: impl Into<String>) -> Self {
        Self::new(version.clone(), Graph::Input, name)
    }

    /// Returns a key for `name` in the same namespace as this key.
    pub fn sibling(&self, name: impl Into<String>) -> Self {
        Self::new(self.version.clone(), self.graph, name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.graph {
            Graph::Output => write!(f, "{}/{}", self.version, self.name),
            Graph::Input => write!(f, "{}/input/{}", self.version, self.name),
        }
    }
}

/// Kind of a type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Object,
    InputObject,
    Enum,
    Scalar,
}

/// The type of a field, possibly wrapped in list / non-null.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// A scalar leaf.
    Scalar(ScalarKind),
    /// A reference to another registered type (object or enum).
    Named(TypeKey),
    /// `[T]`
    List(Box<FieldType>),
    /// `T!`
    NonNull(Box<FieldType>),
}

impl FieldType {
    /// A primitive scalar.
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::Scalar(ScalarKind::Primitive(kind))
    }

    /// A reference to a registered type.
    pub fn named(key: TypeKey) -> Self {
        Self::Named(key)
    }

    /// Wraps `inner` in a list.
    pub fn list(inner: FieldType) -> Self {
        Self::List(Box::new(inner))
    }

    /// Wraps `inner` in non-null. Already non-null types are returned as is.
    pub fn non_null(inner: FieldType) -> Self {
        match inner {
            Self::NonNull(_) => inner,
            other => Self::NonNull(Box::new(other)),
        }
    }

    /// Returns the innermost, unwrapped type.
    pub fn innermost(&self) -> &FieldType {
        match self {
            Self::List(inner) | Self::NonNull(inner) => inner.innermost(),
            leaf => leaf,
        }
    }

    /// Returns the referenced key, if the innermost type is a named type.
    pub fn named_key(&self) -> Option<&TypeKey> {
        match self.innermost() {
            Self::Named(key) => Some(key),
            _ => None,
        }
    }

    /// Returns the primitive kind, if the innermost type is a primitive scalar.
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self.innermost() {
            Self::Scalar(ScalarKind::Primitive(kind)) => Some(*kind),
            _ => None,
        }
    }

    /// Whether the outermost non-null wrapper is present.
    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }

    /// Whether the type is a list (ignoring an outer non-null).
    pub fn is_list(&self) -> bool {
        match self {
            Self::NonNull(inner) => inner.is_list(),
            Self::List(_) => true,
            _ => false,
        }
    }

    /// Rebuilds the type with every named key passed through `f`,
    /// preserving all wrappers.
    pub fn try_map_named<E>(
        &self,
        f: &mut impl FnMut(&TypeKey) -> Result<TypeKey, E>,
    ) -> Result<FieldType, E> {
        Ok(match self {
            Self::Scalar(kind) => Self::Scalar(*kind),
            Self::Named(key) => Self::Named(f(key)?),
            Self::List(inner) => Self::List(Box::new(inner.try_map_named(f)?)),
            Self::NonNull(inner) => Self::NonNull(Box::new(inner.try_map_named(f)?)),
        })
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => f.write_str(kind.graphql_name()),
            Self::Named(key) => f.write_str(&key.name),
            Self::List(inner) => write!(f, "[{inner}]"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

/// Specification of a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Target type including wrappers.
    pub field_type: FieldType,
    /// Human readable description.
    pub description: String,
    /// Server-managed field, dropped from the input graph.
    pub is_computed: bool,
}

impl FieldSpec {
    /// Creates a non-computed field without description.
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            description: String::new(),
            is_computed: false,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Marks the field as computed.
    #[must_use]
    pub fn computed(mut self) -> Self {
        self.is_computed = true;
        self
    }
}

/// A named node of the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    /// Key of this definition.
    pub key: TypeKey,
    /// Object, input object, enum or scalar.
    pub kind: TypeKind,
    /// Human readable description.
    pub description: String,
    /// Fields in introspection order.
    pub fields: FieldMap,
    /// Bases whose fields are composed in before the own fields, in order.
    pub extends: Vec<TypeKey>,
    /// Values of an enum definition.
    pub enum_values: Vec<String>,
}

impl TypeDefinition {
    fn empty(key: TypeKey, kind: TypeKind) -> Self {
        Self {
            key,
            kind,
            description: String::new(),
            fields: FieldMap::new(),
            extends: Vec::new(),
            enum_values: Vec::new(),
        }
    }

    /// Creates an empty object definition.
    pub fn object(key: TypeKey) -> Self {
        Self::empty(key, TypeKind::Object)
    }

    /// Creates an empty input object definition.
    pub fn input_object(key: TypeKey) -> Self {
        Self::empty(key, TypeKind::InputObject)
    }

    /// Creates an enum definition.
    pub fn enumeration(key: TypeKey, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut def = Self::empty(key, TypeKind::Enum);
        def.enum_values = values.into_iter().map(Into::into).collect();
        def
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends (or replaces in place) a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    /// Adds a base whose fields are composed in before the own fields.
    #[must_use]
    pub fn extends(mut self, base: TypeKey) -> Self {
        self.extends.push(base);
        self
    }

    /// The type name.
    pub fn name(&self) -> &str {
        &self.key.name
    }

    /// Field names in order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// Looks up a field.
    pub fn get_field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Whether this is a resource, i.e. it carries a `resourceType` enum tag.
    pub fn is_resource(&self) -> bool {
        self.fields
            .get(RESOURCE_TYPE_FIELD)
            .is_some_and(|spec| spec.field_type.named_key().is_some())
    }
}
