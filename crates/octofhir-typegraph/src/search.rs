//! Search parameter binding.
//!
//! Turns declarative search parameter descriptors into query arguments for
//! the query root. Binding is a pure per-parameter mapping from the FHIR
//! search value kind to an argument scalar; it does not look at the type
//! graph and can run before, after or without it.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::TypeGraphError;

/// A search parameter descriptor as found in the model's parameter tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParamSpec {
    /// Parameter code, e.g. `birthdate` or `address-city`.
    pub name: String,
    /// FHIR search value kind (`string`, `token`, `date`, ...).
    #[serde(alias = "fhirtype")]
    pub value_kind: String,
    /// Conceptual path of the searched element.
    #[serde(default, alias = "xpath")]
    pub path: String,
    /// Human readable description.
    #[serde(default)]
    pub description: String,
}

impl SearchParamSpec {
    /// Creates a descriptor without path or description.
    pub fn new(name: impl Into<String>, value_kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_kind: value_kind.into(),
            path: String::new(),
            description: String::new(),
        }
    }

    /// Sets the conceptual path.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// FHIR search parameter type.
/// See: https://hl7.org/fhir/R4/search.html#table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParamKind {
    Number,
    Date,
    String,
    Token,
    Reference,
    Composite,
    Quantity,
    Uri,
    Special,
}

impl SearchParamKind {
    /// Parse a search parameter kind from its FHIR code.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "number" => Some(Self::Number),
            "date" => Some(Self::Date),
            "string" => Some(Self::String),
            "token" => Some(Self::Token),
            "reference" => Some(Self::Reference),
            "composite" => Some(Self::Composite),
            "quantity" => Some(Self::Quantity),
            "uri" => Some(Self::Uri),
            "special" => Some(Self::Special),
            _ => None,
        }
    }

    /// The argument scalar used for this kind.
    #[must_use]
    pub fn argument_scalar(self) -> ArgumentScalar {
        match self {
            Self::String | Self::Composite | Self::Special => ArgumentScalar::Text,
            Self::Token => ArgumentScalar::Token,
            Self::Date => ArgumentScalar::Date,
            Self::Reference => ArgumentScalar::Reference,
            Self::Uri => ArgumentScalar::Uri,
            Self::Number => ArgumentScalar::Number,
            Self::Quantity => ArgumentScalar::Quantity,
        }
    }
}

/// Scalar type of a query argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentScalar {
    /// Free text.
    Text,
    /// `[system|]code` token.
    Token,
    /// Date with optional comparison prefix.
    Date,
    /// Opaque reference string (`Patient/123`).
    Reference,
    /// URI.
    Uri,
    /// Number with optional comparison prefix.
    Number,
    /// `[prefix]number|system|code` quantity.
    Quantity,
}

impl ArgumentScalar {
    /// The GraphQL scalar name.
    #[must_use]
    pub fn graphql_name(self) -> &'static str {
        match self {
            Self::Text | Self::Reference => "String",
            Self::Token => "SearchToken",
            Self::Date => "SearchDate",
            Self::Uri => "SearchUri",
            Self::Number => "SearchNumber",
            Self::Quantity => "SearchQuantity",
        }
    }
}

impl fmt::Display for ArgumentScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.graphql_name())
    }
}

/// Custom argument scalars with descriptions, for schema registration.
pub fn search_scalars() -> &'static [(&'static str, &'static str)] {
    &[
        ("SearchToken", "A FHIR search token ([system|]code)"),
        ("SearchDate", "A FHIR search date with optional prefix (ge2020-01-01)"),
        ("SearchUri", "A FHIR search URI"),
        ("SearchNumber", "A FHIR search number with optional prefix (lt5.0)"),
        ("SearchQuantity", "A FHIR search quantity ([prefix]number|system|code)"),
    ]
}

/// A bound query argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryArgument {
    /// GraphQL-safe argument name.
    pub name: String,
    /// Original search parameter code.
    pub param: String,
    /// FHIR search kind.
    pub kind: SearchParamKind,
    /// Argument scalar.
    pub scalar: ArgumentScalar,
    /// Conceptual path of the searched element.
    pub path: String,
    /// Human readable description.
    pub description: String,
}

/// Query arguments of one resource, in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryArgumentMap {
    arguments: IndexMap<String, QueryArgument>,
}

impl QueryArgumentMap {
    /// Looks up an argument by its GraphQL name.
    pub fn get(&self, name: &str) -> Option<&QueryArgument> {
        self.arguments.get(name)
    }

    /// Arguments in order.
    pub fn iter(&self) -> impl Iterator<Item = &QueryArgument> {
        self.arguments.values()
    }

    /// Argument names in order.
    pub fn names(&self) -> Vec<&str> {
        self.arguments.keys().map(String::as_str).collect()
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    /// Whether there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }
}

/// Converts a FHIR search parameter code to a GraphQL-safe argument name.
///
/// GraphQL doesn't allow hyphens in argument names.
pub fn argument_name(code: &str) -> String {
    code.replace('-', "_")
}

/// Binds a resource's search parameter table to query arguments.
///
/// # Errors
///
/// Returns `UnsupportedSearchParamKind` for a parameter whose value kind has
/// no argument mapping.
pub fn bind(params: &[SearchParamSpec]) -> Result<QueryArgumentMap, TypeGraphError> {
    let mut map = QueryArgumentMap::default();

    for param in params {
        let kind = SearchParamKind::parse(&param.value_kind).ok_or_else(|| {
            TypeGraphError::UnsupportedSearchParamKind {
                param: param.name.clone(),
                kind: param.value_kind.clone(),
            }
        })?;
        let scalar = kind.argument_scalar();
        let name = argument_name(&param.name);
        trace!(param = %param.name, argument = %name, scalar = %scalar, "Binding search parameter");

        let argument = QueryArgument {
            name: name.clone(),
            param: param.name.clone(),
            kind,
            scalar,
            path: param.path.clone(),
            description: param.description.clone(),
        };
        if map.arguments.insert(name.clone(), argument).is_some() {
            warn!(argument = %name, "Duplicate search argument, keeping the last definition");
        }
    }

    Ok(map)
}
