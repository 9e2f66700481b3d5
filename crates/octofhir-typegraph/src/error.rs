//! Error types for type graph assembly.
//!
//! Every error in this crate is an assembly-time defect: it is detected once
//! while the graph is being built and aborts the build. No partially built
//! graph is ever published, so there is no runtime error path for consumers
//! of an [`AssembledGraph`](crate::AssembledGraph).

use thiserror::Error;

use crate::types::TypeKey;

/// Errors that can occur while assembling a type graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeGraphError {
    /// A type was requested that was never registered.
    #[error("Type not found: {key}")]
    TypeNotFound {
        /// The key that was looked up.
        key: TypeKey,
    },

    /// A factory required the finalized state of a type that is still being
    /// constructed on the same resolution chain.
    #[error("Cyclic dependency while constructing {key}: {}", chain.join(" -> "))]
    CyclicDependency {
        /// The type whose construction re-entered itself.
        key: TypeKey,
        /// Resolution chain, outermost first, ending with `key`.
        chain: Vec<String>,
    },

    /// A factory panicked; the type stays unavailable.
    #[error("Construction of {key} panicked")]
    FactoryPanicked {
        /// The type whose factory panicked.
        key: TypeKey,
    },

    /// Projection found a field whose target has no definition in either graph.
    #[error("Unresolved target {target} for field {type_name}.{field}")]
    UnresolvedTarget {
        /// Type owning the field.
        type_name: String,
        /// Field name.
        field: String,
        /// Target type name that could not be found.
        target: String,
    },

    /// Only output objects have an input counterpart.
    #[error("Type {key} is not an output object and has no input projection")]
    NotProjectable {
        /// The rejected key.
        key: TypeKey,
    },

    /// A search parameter declared a value kind with no argument mapping.
    #[error("Unsupported search parameter kind '{kind}' for parameter '{param}'")]
    UnsupportedSearchParamKind {
        /// Search parameter name.
        param: String,
        /// The unmapped value kind.
        kind: String,
    },

    /// The same key was registered twice.
    #[error("Duplicate type definition: {key}")]
    DuplicateType {
        /// The duplicated key.
        key: TypeKey,
    },

    /// A primitive field has no `_field` Element sibling.
    #[error("Primitive field {type_name}.{field} has no element sibling")]
    MissingElementSibling {
        /// Type owning the field.
        type_name: String,
        /// Primitive field name.
        field: String,
    },

    /// A cardinality string could not be parsed.
    #[error("Invalid cardinality: {0}")]
    InvalidCardinality(String),

    /// A declaration table is malformed.
    #[error("Invalid model declarations: {0}")]
    InvalidDeclarations(String),

    /// Configuration values are invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The assembled graph could not be turned into a GraphQL schema.
    #[error("Schema export failed: {0}")]
    SchemaExport(String),
}

impl TypeGraphError {
    /// Returns a stable machine-readable code for this error.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TypeNotFound { .. } => "TYPE_NOT_FOUND",
            Self::CyclicDependency { .. } => "CYCLIC_DEPENDENCY",
            Self::FactoryPanicked { .. } => "FACTORY_PANICKED",
            Self::UnresolvedTarget { .. } => "UNRESOLVED_TARGET",
            Self::NotProjectable { .. } => "NOT_PROJECTABLE",
            Self::UnsupportedSearchParamKind { .. } => "UNSUPPORTED_SEARCH_PARAM_KIND",
            Self::DuplicateType { .. } => "DUPLICATE_TYPE",
            Self::MissingElementSibling { .. } => "MISSING_ELEMENT_SIBLING",
            Self::InvalidCardinality(_) => "INVALID_CARDINALITY",
            Self::InvalidDeclarations(_) => "INVALID_DECLARATIONS",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::SchemaExport(_) => "SCHEMA_EXPORT_FAILED",
        }
    }

    /// Creates a `TypeNotFound` error.
    pub fn type_not_found(key: TypeKey) -> Self {
        Self::TypeNotFound { key }
    }

    /// Creates an `UnresolvedTarget` error.
    pub fn unresolved_target(
        type_name: impl Into<String>,
        field: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::UnresolvedTarget {
            type_name: type_name.into(),
            field: field.into(),
            target: target.into(),
        }
    }
}

impl From<serde_json::Error> for TypeGraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidDeclarations(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Graph, ModelVersion};

    #[test]
    fn test_error_codes() {
        let key = TypeKey::output(&ModelVersion::new("4_0_0"), "Patient");
        assert_eq!(
            TypeGraphError::type_not_found(key.clone()).error_code(),
            "TYPE_NOT_FOUND"
        );
        assert_eq!(
            TypeGraphError::DuplicateType { key }.error_code(),
            "DUPLICATE_TYPE"
        );
        assert_eq!(
            TypeGraphError::unresolved_target("Patient", "link", "Missing").error_code(),
            "UNRESOLVED_TARGET"
        );
    }

    #[test]
    fn test_cycle_message_lists_chain() {
        let key = TypeKey::new(ModelVersion::new("4_0_0"), Graph::Output, "A");
        let err = TypeGraphError::CyclicDependency {
            key,
            chain: vec!["A".into(), "B".into(), "A".into()],
        };
        let message = err.to_string();
        assert!(message.contains("A -> B -> A"));
        assert!(message.contains("4_0_0"));
    }

    #[test]
    fn test_from_json_error() {
        let err: TypeGraphError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.error_code(), "INVALID_DECLARATIONS");
    }
}
