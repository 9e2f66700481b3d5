//! # octofhir-typegraph
//!
//! FHIR type graph assembly for the OctoFHIR GraphQL layer.
//!
//! This crate builds, for every declared FHIR model version, a queryable type
//! graph without any manual ordering of type definitions. It supports:
//!
//! - Lazy type registration with memoized, cycle-tolerant resolution
//! - Envelope field composition (`id`, `extension`, `meta`, ...) in place of
//!   inheritance
//! - Derived input (write) types for every output (read) type
//! - `_field` element siblings for every primitive field
//! - Search parameter to query argument binding
//! - Export into an async-graphql dynamic schema
//!
//! ## Overview
//!
//! Model declarations are registered as factories in a [`TypeRegistry`].
//! Assembly resolves them, projects the input graph and freezes everything
//! into an immutable [`AssembledGraph`] that is shared for the lifetime of
//! the process.
//!
//! ```no_run
//! use octofhir_typegraph::{GraphAssembler, ModelDeclarations, SchemaExporter, TypeGraphConfig};
//!
//! # fn main() -> octofhir_typegraph::Result<()> {
//! let declarations = ModelDeclarations::from_json_str(include_str!("../tests/fixtures/r4_related_person.json"))?;
//! let graph = GraphAssembler::new(TypeGraphConfig::default())
//!     .with_declarations(declarations)
//!     .assemble()?;
//!
//! let related_person_input = graph.input_of("4_0_0", "RelatedPerson");
//! let exporter = SchemaExporter::new(&graph, "4_0_0");
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! Add to `octofhir.toml`:
//!
//! ```toml
//! [typegraph]
//! input_suffix = "_Input"
//! element_type = "Element"
//! sibling_order = "before"
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Graph data model (keys, field types, definitions)
//! - [`registry`] - Lazy registry and thunk resolution
//! - [`compose`] - Field-map composition
//! - [`pairing`] - Primitive/element sibling pairing
//! - [`projector`] - Input graph derivation
//! - [`search`] - Search parameter binding
//! - [`declarations`] - Model declaration tables and envelope types
//! - [`assembly`] - Startup assembly and the frozen graph
//! - [`export`] - async-graphql dynamic schema export
//! - [`config`] - Configuration options
//! - [`error`] - Error types

pub mod assembly;
pub mod compose;
pub mod config;
pub mod declarations;
pub mod error;
pub mod export;
pub mod pairing;
pub mod projector;
pub mod registry;
pub mod search;
pub mod types;

// Re-export main types
pub use assembly::{AssembledGraph, GraphAssembler};
pub use config::{SiblingOrder, TypeGraphConfig};
pub use declarations::{Cardinality, ElementDecl, ModelDeclarations, TypeCategory, TypeDeclaration};
pub use error::TypeGraphError;
pub use export::SchemaExporter;
pub use projector::DualGraphProjector;
pub use registry::{Resolver, TypeHandle, TypeRegistry};
pub use search::{ArgumentScalar, QueryArgument, QueryArgumentMap, SearchParamKind, SearchParamSpec};
pub use types::{
    FieldMap, FieldSpec, FieldType, Graph, ModelVersion, PrimitiveKind, ScalarKind, TypeDefinition,
    TypeKey, TypeKind,
};

/// Result type for type graph operations.
pub type Result<T> = std::result::Result<T, TypeGraphError>;
