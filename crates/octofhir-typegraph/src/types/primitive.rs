//! FHIR primitive kinds and their GraphQL scalar names.
//!
//! Primitive values are validated and encoded by the scalar codec layer; this
//! module only knows which kinds exist and which scalar name each one uses.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the scalar carrying an opaque FHIR resource as JSON.
pub const FHIR_RESOURCE_SCALAR: &str = "FhirResource";

/// A FHIR primitive data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrimitiveKind {
    Boolean,
    Integer,
    Integer64,
    String,
    Decimal,
    Uri,
    Url,
    Canonical,
    Base64Binary,
    Instant,
    Date,
    DateTime,
    Time,
    Code,
    Oid,
    Uuid,
    Id,
    Markdown,
    UnsignedInt,
    PositiveInt,
    Xhtml,
}

impl PrimitiveKind {
    /// All primitive kinds, in FHIR datatype table order.
    pub const ALL: [PrimitiveKind; 21] = [
        Self::Boolean,
        Self::Integer,
        Self::Integer64,
        Self::String,
        Self::Decimal,
        Self::Uri,
        Self::Url,
        Self::Canonical,
        Self::Base64Binary,
        Self::Instant,
        Self::Date,
        Self::DateTime,
        Self::Time,
        Self::Code,
        Self::Oid,
        Self::Uuid,
        Self::Id,
        Self::Markdown,
        Self::UnsignedInt,
        Self::PositiveInt,
        Self::Xhtml,
    ];

    /// Parses a FHIR primitive type name (`dateTime`, `positiveInt`, ...).
    #[must_use]
    pub fn parse(fhir_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.fhir_name() == fhir_type)
    }

    /// The FHIR name of this primitive.
    #[must_use]
    pub fn fhir_name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Integer64 => "integer64",
            Self::String => "string",
            Self::Decimal => "decimal",
            Self::Uri => "uri",
            Self::Url => "url",
            Self::Canonical => "canonical",
            Self::Base64Binary => "base64Binary",
            Self::Instant => "instant",
            Self::Date => "date",
            Self::DateTime => "dateTime",
            Self::Time => "time",
            Self::Code => "code",
            Self::Oid => "oid",
            Self::Uuid => "uuid",
            Self::Id => "id",
            Self::Markdown => "markdown",
            Self::UnsignedInt => "unsignedInt",
            Self::PositiveInt => "positiveInt",
            Self::Xhtml => "xhtml",
        }
    }

    /// The GraphQL scalar this primitive is exposed as.
    #[must_use]
    pub fn graphql_scalar(self) -> &'static str {
        match self {
            // Built-in GraphQL scalars
            Self::Boolean => "Boolean",
            Self::Integer | Self::Integer64 => "Int",
            Self::String | Self::Code => "String",

            // Custom FHIR scalars
            Self::Instant => "FhirInstant",
            Self::DateTime => "FhirDateTime",
            Self::Date => "FhirDate",
            Self::Time => "FhirTime",
            Self::Decimal => "FhirDecimal",
            Self::Uri => "FhirUri",
            Self::Url => "FhirUrl",
            Self::Canonical => "FhirCanonical",
            Self::Oid => "FhirOid",
            Self::Uuid => "FhirUuid",
            Self::Id => "FhirId",
            Self::Base64Binary => "FhirBase64Binary",
            Self::Markdown => "FhirMarkdown",
            Self::PositiveInt => "FhirPositiveInt",
            Self::UnsignedInt => "FhirUnsignedInt",
            Self::Xhtml => "FhirXhtml",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fhir_name())
    }
}

/// A scalar leaf of the type graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// A FHIR primitive; participates in element pairing.
    Primitive(PrimitiveKind),
    /// A whole resource carried as JSON (e.g. `contained`).
    Resource,
}

impl ScalarKind {
    /// The GraphQL scalar name.
    #[must_use]
    pub fn graphql_name(self) -> &'static str {
        match self {
            Self::Primitive(kind) => kind.graphql_scalar(),
            Self::Resource => FHIR_RESOURCE_SCALAR,
        }
    }
}

/// Custom scalars that must be registered alongside the graph, with descriptions.
pub fn custom_scalars() -> &'static [(&'static str, &'static str)] {
    &[
        ("FhirInstant", "A FHIR instant (xs:dateTime with timezone)"),
        (
            "FhirDateTime",
            "A FHIR dateTime (partial date/time with optional timezone)",
        ),
        ("FhirDate", "A FHIR date (YYYY, YYYY-MM, or YYYY-MM-DD)"),
        ("FhirTime", "A FHIR time (hh:mm:ss)"),
        ("FhirUri", "A FHIR URI"),
        ("FhirUrl", "A FHIR URL (resolvable URI)"),
        ("FhirCanonical", "A FHIR canonical URL reference"),
        ("FhirOid", "A FHIR OID (urn:oid:...)"),
        ("FhirUuid", "A FHIR UUID (urn:uuid:...)"),
        ("FhirId", "A FHIR resource ID"),
        ("FhirBase64Binary", "Base64-encoded binary data"),
        ("FhirMarkdown", "Markdown-formatted text"),
        ("FhirPositiveInt", "A positive integer (> 0)"),
        ("FhirUnsignedInt", "A non-negative integer (>= 0)"),
        ("FhirDecimal", "An arbitrary precision decimal"),
        ("FhirXhtml", "XHTML content for narratives"),
        (FHIR_RESOURCE_SCALAR, "A FHIR resource represented as JSON"),
    ]
}
