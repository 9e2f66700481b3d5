//! Model declaration tables.
//!
//! A [`ModelDeclarations`] table describes one model version: its types, in
//! declaration order, and the search parameter table of every resource. Tables
//! are plain data loaded with serde; nothing here touches the registry until
//! the assembler turns each [`TypeDeclaration`] into a factory.
//!
//! The envelope datatypes every table relies on (`Element`, `Resource`,
//! `DomainResource`, ...) ship with the crate, see [`envelope_types`].
//!
//! # Example
//!
//! ```json
//! {
//!   "version": "4_0_0",
//!   "types": [
//!     {
//!       "name": "Patient",
//!       "category": "resource",
//!       "elements": [
//!         { "name": "active", "type": "boolean" },
//!         { "name": "name", "type": "HumanName", "cardinality": "0..*" }
//!       ]
//!     }
//!   ],
//!   "searchParameters": {
//!     "Patient": [{ "name": "birthdate", "fhirtype": "date", "xpath": "Patient.birthDate" }]
//!   }
//! }
//! ```

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::TypeGraphError;
use crate::registry::Resolver;
use crate::search::SearchParamSpec;
use crate::types::{
    FHIR_RESOURCE_SCALAR, FieldSpec, FieldType, ModelVersion, PrimitiveKind, RESOURCE_TYPE_FIELD,
    ScalarKind, TypeDefinition, TypeKey,
};

/// Element type name that denotes an embedded resource of any type.
pub const ANY_RESOURCE_TYPE: &str = "Resource";

/// Occurrence constraint of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Cardinality {
    /// `0..1`
    #[default]
    Optional,
    /// `1..1`
    Required,
    /// `0..*`
    List,
    /// `1..*`
    RequiredList,
}

impl Cardinality {
    /// Parses a `min..max` cardinality.
    ///
    /// `max` may be `*` or any positive number; anything above one is a list.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCardinality` for malformed or empty ranges.
    pub fn parse(s: &str) -> Result<Self, TypeGraphError> {
        let invalid = || TypeGraphError::InvalidCardinality(s.to_string());

        let (min, max) = s.trim().split_once("..").ok_or_else(invalid)?;
        let min: u32 = min.parse().map_err(|_| invalid())?;
        let many = match max {
            "*" => true,
            n => {
                let max: u32 = n.parse().map_err(|_| invalid())?;
                if max == 0 || min > max {
                    return Err(invalid());
                }
                max > 1
            }
        };

        Ok(match (min > 0, many) {
            (false, false) => Self::Optional,
            (true, false) => Self::Required,
            (false, true) => Self::List,
            (true, true) => Self::RequiredList,
        })
    }

    /// Applies the list / non-null wrappers of this cardinality to `inner`.
    pub fn wrap(self, inner: FieldType) -> FieldType {
        match self {
            Self::Optional => inner,
            Self::Required => FieldType::non_null(inner),
            Self::List => FieldType::list(inner),
            Self::RequiredList => FieldType::list(FieldType::non_null(inner)),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Optional => "0..1",
            Self::Required => "1..1",
            Self::List => "0..*",
            Self::RequiredList => "1..*",
        }
    }
}

impl TryFrom<String> for Cardinality {
    type Error = TypeGraphError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Cardinality> for String {
    fn from(value: Cardinality) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared element (field) of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDecl {
    pub name: String,
    /// Primitive name (`dateTime`), complex type name (`HumanName`) or
    /// `Resource` for an embedded resource.
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub cardinality: Cardinality,
    /// Server-managed; absent from the input graph.
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub description: String,
}

impl ElementDecl {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            cardinality,
            computed: false,
            description: String::new(),
        }
    }

    #[must_use]
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Field type of this element, seen from the type under construction.
    fn field_type(&self, resolver: &Resolver<'_>) -> Result<FieldType, TypeGraphError> {
        let inner = if let Some(kind) = PrimitiveKind::parse(&self.type_name) {
            FieldType::primitive(kind)
        } else if self.type_name == ANY_RESOURCE_TYPE || self.type_name == FHIR_RESOURCE_SCALAR {
            FieldType::Scalar(ScalarKind::Resource)
        } else {
            resolver.handle_named(&self.type_name)?.field_type()
        };
        Ok(self.cardinality.wrap(inner))
    }
}

/// What a declared type is; decides its default base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeCategory {
    /// A resource: extends `DomainResource` and carries a `resourceType` tag.
    Resource,
    /// A complex datatype: extends `Element`.
    Datatype,
    /// A nested structure of a resource: extends `BackboneElement`.
    Backbone,
    /// A base type with no implicit base.
    Abstract,
}

impl TypeCategory {
    /// Base type applied when a declaration names none.
    pub fn default_base(self) -> Option<&'static str> {
        match self {
            Self::Resource => Some("DomainResource"),
            Self::Datatype => Some("Element"),
            Self::Backbone => Some("BackboneElement"),
            Self::Abstract => None,
        }
    }
}

/// A declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDeclaration {
    pub name: String,
    pub category: TypeCategory,
    /// Explicit base; overrides the category default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub elements: Vec<ElementDecl>,
}

impl TypeDeclaration {
    pub fn new(name: impl Into<String>, category: TypeCategory) -> Self {
        Self {
            name: name.into(),
            category,
            base: None,
            description: String::new(),
            elements: Vec::new(),
        }
    }

    #[must_use]
    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn element(mut self, element: ElementDecl) -> Self {
        self.elements.push(element);
        self
    }

    /// The base type the declaration composes, if any.
    pub fn effective_base(&self) -> Option<&str> {
        self.base
            .as_deref()
            .or_else(|| self.category.default_base())
    }

    /// Whether the type carries a `resourceType` tag.
    pub fn is_resource(&self) -> bool {
        self.category == TypeCategory::Resource
    }

    /// Name of the single value enum backing the `resourceType` tag.
    pub fn resource_enum_name(&self) -> String {
        format!("{}_Enum", self.name)
    }

    /// Builds the own (uncomposed) definition inside a type factory.
    ///
    /// Element targets are referenced by handle, so declarations may point at
    /// each other in any order.
    pub fn build(&self, resolver: &Resolver<'_>) -> Result<TypeDefinition, TypeGraphError> {
        let mut definition =
            TypeDefinition::object(resolver.key(&self.name)?).description(self.description.clone());

        if let Some(base) = self.effective_base() {
            definition = definition.extends(resolver.key(base)?);
        }

        if self.is_resource() {
            let tag = resolver.handle_named(&self.resource_enum_name())?;
            definition = definition.field(
                RESOURCE_TYPE_FIELD,
                FieldSpec::new(FieldType::non_null(tag.field_type())).description("Type of resource"),
            );
        }

        for element in &self.elements {
            let spec = FieldSpec {
                field_type: element.field_type(resolver)?,
                description: element.description.clone(),
                is_computed: element.computed,
            };
            definition = definition.field(element.name.clone(), spec);
        }

        Ok(definition)
    }
}

/// Declarations of one model version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDeclarations {
    pub version: ModelVersion,
    #[serde(default)]
    pub types: Vec<TypeDeclaration>,
    /// Resource name -> search parameter table.
    #[serde(default, rename = "searchParameters", alias = "search_parameters")]
    pub search_parameters: IndexMap<String, Vec<SearchParamSpec>>,
}

impl ModelDeclarations {
    /// Creates an empty table for `version`.
    pub fn new(version: impl AsRef<str>) -> Self {
        Self {
            version: ModelVersion::new(version),
            types: Vec::new(),
            search_parameters: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn with_type(mut self, declaration: TypeDeclaration) -> Self {
        self.types.push(declaration);
        self
    }

    #[must_use]
    pub fn with_search_parameters(
        mut self,
        resource: impl Into<String>,
        params: Vec<SearchParamSpec>,
    ) -> Self {
        self.search_parameters.insert(resource.into(), params);
        self
    }

    /// Parses and validates a JSON declaration table.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDeclarations` for malformed JSON or invalid names,
    /// `InvalidCardinality` for a bad cardinality and `DuplicateType` for a
    /// type declared twice.
    pub fn from_json_str(source: &str) -> Result<Self, TypeGraphError> {
        let declarations: Self = serde_json::from_str(source)?;
        declarations.validate()?;
        Ok(declarations)
    }

    /// Checks names and uniqueness.
    ///
    /// # Errors
    ///
    /// See [`from_json_str`](Self::from_json_str).
    pub fn validate(&self) -> Result<(), TypeGraphError> {
        if !is_valid_version(self.version.as_str()) {
            return Err(TypeGraphError::InvalidDeclarations(format!(
                "invalid model version '{}'",
                self.version
            )));
        }

        let mut seen = HashSet::new();
        for declaration in &self.types {
            if !is_valid_graphql_name(&declaration.name) {
                return Err(TypeGraphError::InvalidDeclarations(format!(
                    "invalid type name '{}'",
                    declaration.name
                )));
            }
            if !seen.insert(declaration.name.as_str()) {
                return Err(TypeGraphError::DuplicateType {
                    key: TypeKey::output(&self.version, declaration.name.clone()),
                });
            }
            if let Some(element) = declaration
                .elements
                .iter()
                .find(|element| !is_valid_graphql_name(&element.name))
            {
                return Err(TypeGraphError::InvalidDeclarations(format!(
                    "invalid element name '{}.{}'",
                    declaration.name, element.name
                )));
            }
        }
        Ok(())
    }

    /// Envelope types not overridden by this table, followed by the table's
    /// own declarations.
    pub fn with_envelope(&self) -> Vec<TypeDeclaration> {
        let declared: HashSet<&str> = self.types.iter().map(|t| t.name.as_str()).collect();
        envelope_types()
            .into_iter()
            .filter(|envelope| !declared.contains(envelope.name.as_str()))
            .chain(self.types.iter().cloned())
            .collect()
    }
}

/// Checks if a string is a valid GraphQL name.
///
/// GraphQL names must match: /[_A-Za-z][_0-9A-Za-z]*/
fn is_valid_graphql_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Model versions (`4_0_0`) may start with a digit; they only ever appear
/// inside generated names.
fn is_valid_version(version: &str) -> bool {
    !version.is_empty() && version.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

fn optional(name: &str, type_name: &str) -> ElementDecl {
    ElementDecl::new(name, type_name, Cardinality::Optional)
}

fn required(name: &str, type_name: &str) -> ElementDecl {
    ElementDecl::new(name, type_name, Cardinality::Required)
}

fn list(name: &str, type_name: &str) -> ElementDecl {
    ElementDecl::new(name, type_name, Cardinality::List)
}

/// The envelope datatypes shared by every model version.
///
/// Element and resource envelopes are composed into every declared type; the
/// small datatypes they reference (`Meta`, `Coding`, `Reference`, ...) come
/// along so that a table only has to declare its own types.
pub fn envelope_types() -> Vec<TypeDeclaration> {
    vec![
        TypeDeclaration::new("Element", TypeCategory::Abstract)
            .description("Base definition for all elements in a resource.")
            .element(
                optional("id", "string")
                    .description("Unique id for the element within a resource (for internal references)."),
            )
            .element(
                list("extension", "Extension")
                    .description("Additional content defined by implementations."),
            ),
        TypeDeclaration::new("Extension", TypeCategory::Datatype)
            .description("Optional Extension Element - found in all resources.")
            .element(required("url", "uri").description("Identifies the meaning of the extension."))
            .element(optional("valueBoolean", "boolean"))
            .element(optional("valueCode", "code"))
            .element(optional("valueDate", "date"))
            .element(optional("valueDateTime", "dateTime"))
            .element(optional("valueDecimal", "decimal"))
            .element(optional("valueInteger", "integer"))
            .element(optional("valueString", "string"))
            .element(optional("valueUri", "uri"))
            .element(optional("valueCodeableConcept", "CodeableConcept"))
            .element(optional("valueCoding", "Coding"))
            .element(optional("valueIdentifier", "Identifier"))
            .element(optional("valuePeriod", "Period"))
            .element(optional("valueReference", "Reference")),
        TypeDeclaration::new("BackboneElement", TypeCategory::Abstract)
            .base("Element")
            .description("Base definition for all elements that are defined inside a resource.")
            .element(
                list("modifierExtension", "Extension")
                    .description("Extensions that cannot be ignored even if unrecognized."),
            ),
        TypeDeclaration::new("Resource", TypeCategory::Abstract)
            .description("This is the base resource type for everything.")
            .element(optional("id", "id").description("Logical id of this artifact."))
            .element(optional("meta", "Meta").description("Metadata about the resource."))
            .element(
                optional("implicitRules", "uri")
                    .description("A set of rules under which this content was created."),
            )
            .element(optional("language", "code").description("Language of the resource content.")),
        TypeDeclaration::new("DomainResource", TypeCategory::Abstract)
            .base("Resource")
            .description("A resource that includes narrative, extensions, and contained resources.")
            .element(
                optional("text", "Narrative")
                    .description("Text summary of the resource, for human interpretation."),
            )
            .element(list("contained", ANY_RESOURCE_TYPE).description("Contained, inline Resources."))
            .element(
                list("extension", "Extension")
                    .description("Additional content defined by implementations."),
            )
            .element(
                list("modifierExtension", "Extension")
                    .description("Extensions that cannot be ignored."),
            ),
        TypeDeclaration::new("Meta", TypeCategory::Datatype)
            .description("Metadata about a resource.")
            .element(optional("versionId", "id").computed().description("Version specific identifier."))
            .element(
                optional("lastUpdated", "instant")
                    .computed()
                    .description("When the resource version last changed."),
            )
            .element(optional("source", "uri").description("Identifies where the resource comes from."))
            .element(list("profile", "canonical").description("Profiles this resource claims to conform to."))
            .element(list("security", "Coding").description("Security Labels applied to this resource."))
            .element(list("tag", "Coding").description("Tags applied to this resource.")),
        TypeDeclaration::new("Narrative", TypeCategory::Datatype)
            .description("Human-readable summary of the resource.")
            .element(required("status", "code").description("generated | extensions | additional | empty"))
            .element(required("div", "xhtml").description("Limited xhtml content.")),
        TypeDeclaration::new("Reference", TypeCategory::Datatype)
            .description("A reference from one resource to another.")
            .element(optional("reference", "string").description("Literal reference, Relative, internal or absolute URL."))
            .element(optional("type", "uri").description("Type the reference refers to (e.g. \"Patient\")."))
            .element(optional("identifier", "Identifier").description("Logical reference, when literal reference is not known."))
            .element(optional("display", "string").description("Text alternative for the resource."))
            .element(
                optional("resource", ANY_RESOURCE_TYPE)
                    .computed()
                    .description("The referenced resource, resolved by the server."),
            ),
        TypeDeclaration::new("Period", TypeCategory::Datatype)
            .description("Time range defined by start and end date/time.")
            .element(optional("start", "dateTime").description("Starting time with inclusive boundary."))
            .element(optional("end", "dateTime").description("End time with inclusive boundary, if not ongoing.")),
        TypeDeclaration::new("Coding", TypeCategory::Datatype)
            .description("A reference to a code defined by a terminology system.")
            .element(optional("system", "uri").description("Identity of the terminology system."))
            .element(optional("version", "string").description("Version of the system - if relevant."))
            .element(optional("code", "code").description("Symbol in syntax defined by the system."))
            .element(optional("display", "string").description("Representation defined by the system."))
            .element(optional("userSelected", "boolean").description("If this coding was chosen directly by the user.")),
        TypeDeclaration::new("CodeableConcept", TypeCategory::Datatype)
            .description("Concept - reference to a terminology or just text.")
            .element(list("coding", "Coding").description("Code defined by a terminology system."))
            .element(optional("text", "string").description("Plain text representation of the concept.")),
        TypeDeclaration::new("Identifier", TypeCategory::Datatype)
            .description("An identifier intended for computation.")
            .element(optional("use", "code").description("usual | official | temp | secondary | old"))
            .element(optional("type", "CodeableConcept").description("Description of identifier."))
            .element(optional("system", "uri").description("The namespace for the identifier value."))
            .element(optional("value", "string").description("The value that is unique."))
            .element(optional("period", "Period").description("Time period when id is/was valid for use."))
            .element(optional("assigner", "Reference").description("Organization that issued id.")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinality_parse() {
        assert_eq!(Cardinality::parse("0..1").unwrap(), Cardinality::Optional);
        assert_eq!(Cardinality::parse("1..1").unwrap(), Cardinality::Required);
        assert_eq!(Cardinality::parse("0..*").unwrap(), Cardinality::List);
        assert_eq!(Cardinality::parse("1..*").unwrap(), Cardinality::RequiredList);
        assert_eq!(Cardinality::parse("0..5").unwrap(), Cardinality::List);

        for bad in ["", "1", "a..b", "2..1", "0..0", "1..x"] {
            let err = Cardinality::parse(bad).unwrap_err();
            assert_eq!(err.error_code(), "INVALID_CARDINALITY", "{bad}");
        }
    }

    #[test]
    fn test_cardinality_wrappers() {
        let code = || FieldType::primitive(PrimitiveKind::Code);
        assert_eq!(Cardinality::Optional.wrap(code()).to_string(), "String");
        assert_eq!(Cardinality::Required.wrap(code()).to_string(), "String!");
        assert_eq!(Cardinality::List.wrap(code()).to_string(), "[String]");
        assert_eq!(Cardinality::RequiredList.wrap(code()).to_string(), "[String!]");
    }

    #[test]
    fn test_default_bases() {
        assert_eq!(
            TypeDeclaration::new("Patient", TypeCategory::Resource).effective_base(),
            Some("DomainResource")
        );
        assert_eq!(
            TypeDeclaration::new("PatientContact", TypeCategory::Backbone).effective_base(),
            Some("BackboneElement")
        );
        assert_eq!(
            TypeDeclaration::new("Binary", TypeCategory::Resource)
                .base("Resource")
                .effective_base(),
            Some("Resource")
        );
        assert_eq!(
            TypeDeclaration::new("Element", TypeCategory::Abstract).effective_base(),
            None
        );
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "version": "4_0_0",
            "types": [
                {
                    "name": "Patient",
                    "category": "resource",
                    "description": "Demographics",
                    "elements": [
                        { "name": "active", "type": "boolean" },
                        { "name": "name", "type": "HumanName", "cardinality": "0..*" },
                        { "name": "score", "type": "decimal", "computed": true }
                    ]
                }
            ],
            "searchParameters": {
                "Patient": [
                    { "name": "birthdate", "fhirtype": "date", "xpath": "Patient.birthDate" }
                ]
            }
        }"#;

        let declarations = ModelDeclarations::from_json_str(json).unwrap();
        assert_eq!(declarations.version.as_str(), "4_0_0");
        let patient = &declarations.types[0];
        assert!(patient.is_resource());
        assert_eq!(patient.elements[1].cardinality, Cardinality::List);
        assert!(patient.elements[2].computed);
        assert_eq!(declarations.search_parameters["Patient"][0].value_kind, "date");
    }

    #[test]
    fn test_from_json_rejects_bad_cardinality() {
        let json = r#"{
            "version": "4_0_0",
            "types": [{
                "name": "Patient",
                "category": "resource",
                "elements": [{ "name": "active", "type": "boolean", "cardinality": "1" }]
            }]
        }"#;

        let err = ModelDeclarations::from_json_str(json).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DECLARATIONS");
        assert!(err.to_string().contains("cardinality"));
    }

    #[test]
    fn test_validate_names_and_duplicates() {
        let declarations = ModelDeclarations::new("4_0_0")
            .with_type(TypeDeclaration::new("Patient", TypeCategory::Resource))
            .with_type(TypeDeclaration::new("Patient", TypeCategory::Resource));
        assert_eq!(
            declarations.validate().unwrap_err().error_code(),
            "DUPLICATE_TYPE"
        );

        let declarations = ModelDeclarations::new("4_0_0").with_type(
            TypeDeclaration::new("Patient", TypeCategory::Resource)
                .element(optional("birth-date", "date")),
        );
        assert_eq!(
            declarations.validate().unwrap_err().error_code(),
            "INVALID_DECLARATIONS"
        );

        assert!(ModelDeclarations::new("4.0.0").validate().is_err());
    }

    #[test]
    fn test_envelope_can_be_overridden() {
        let declarations = ModelDeclarations::new("4_0_0").with_type(
            TypeDeclaration::new("Period", TypeCategory::Datatype)
                .element(optional("start", "dateTime")),
        );

        let all = declarations.with_envelope();
        let periods: Vec<_> = all.iter().filter(|t| t.name == "Period").collect();
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].elements.len(), 1);
        assert_eq!(all.last().map(|t| t.name.as_str()), Some("Period"));
    }

    #[test]
    fn test_envelope_names_are_unique() {
        let envelope = envelope_types();
        let names: HashSet<&str> = envelope.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), envelope.len());
        assert!(names.contains("Element"));
        assert!(names.contains("DomainResource"));
    }
}
