//! Startup assembly of the type graph.
//!
//! [`GraphAssembler`] runs the whole pipeline in one pass:
//!
//! 1. register a factory per declared type (envelope types included) and a
//!    `<Name>_Enum` tag per resource;
//! 2. resolve every output type (composition and element pairing happen in
//!    the registry);
//! 3. verify element pairing of the output graph;
//! 4. project the input graph and verify its pairing;
//! 5. bind the search parameter tables;
//! 6. freeze everything into an immutable [`AssembledGraph`].
//!
//! Any error aborts the build; a partially assembled graph is never returned.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::config::TypeGraphConfig;
use crate::declarations::ModelDeclarations;
use crate::error::TypeGraphError;
use crate::pairing::verify_pairing;
use crate::projector::DualGraphProjector;
use crate::registry::TypeRegistry;
use crate::search::{QueryArgumentMap, bind};
use crate::types::{Graph, ModelVersion, TypeDefinition, TypeKey, TypeKind};

/// Builds an [`AssembledGraph`] from declaration tables.
#[derive(Debug, Clone, Default)]
pub struct GraphAssembler {
    config: TypeGraphConfig,
    declarations: Vec<ModelDeclarations>,
}

impl GraphAssembler {
    /// Creates an assembler with the given configuration.
    pub fn new(config: TypeGraphConfig) -> Self {
        Self {
            config,
            declarations: Vec::new(),
        }
    }

    /// Adds the declarations of one model version.
    ///
    /// Versions are assembled side by side and never reference each other.
    #[must_use]
    pub fn with_declarations(mut self, declarations: ModelDeclarations) -> Self {
        self.declarations.push(declarations);
        self
    }

    /// Runs the assembly pipeline.
    ///
    /// # Errors
    ///
    /// Returns the first assembly defect: invalid configuration or
    /// declarations, unknown types, cycles in base chains, unresolved
    /// projection targets, missing element siblings or unsupported search
    /// parameter kinds.
    pub fn assemble(self) -> Result<AssembledGraph, TypeGraphError> {
        self.config.validate()?;
        let config = self.config;

        info!(
            versions = self.declarations.len(),
            input_suffix = %config.input_suffix,
            "Assembling FHIR type graph"
        );

        let mut versions: Vec<ModelVersion> = Vec::with_capacity(self.declarations.len());
        let mut registry = TypeRegistry::with_pairing(config.element_type.clone(), config.sibling_order);

        for declarations in &self.declarations {
            declarations.validate()?;
            if versions.contains(&declarations.version) {
                return Err(TypeGraphError::InvalidDeclarations(format!(
                    "model version '{}' declared twice",
                    declarations.version
                )));
            }
            versions.push(declarations.version.clone());
            register_declarations(&mut registry, declarations)?;
        }

        registry.resolve_all()?;
        let outputs: Vec<Arc<TypeDefinition>> = registry
            .keys()
            .map(|key| registry.resolve(key))
            .collect::<Result<_, _>>()?;
        let objects: Vec<&Arc<TypeDefinition>> = outputs
            .iter()
            .filter(|def| def.kind == TypeKind::Object)
            .collect();
        debug!(types = outputs.len(), objects = objects.len(), "Output graph resolved");

        if config.verify_pairing {
            for definition in &objects {
                verify_pairing(definition, &config.element_type)?;
            }
        }

        let roots: Vec<&TypeKey> = objects
            .iter()
            .filter(|def| config.project_all_types || def.is_resource())
            .map(|def| &def.key)
            .collect();
        let projected = DualGraphProjector::new(&mut registry, &config).project_reachable(roots)?;
        debug!(count = projected, "Input graph projected");

        let search = bind_search_tables(&self.declarations)?;

        let types = registry.freeze()?;

        if config.verify_pairing {
            let element_input = config.input_name(&config.element_type);
            for definition in types.values().filter(|def| def.kind == TypeKind::InputObject) {
                verify_pairing(definition, &element_input)?;
            }
        }

        info!(
            types = types.len(),
            search_tables = search.len(),
            "FHIR type graph assembled"
        );

        Ok(AssembledGraph {
            types,
            search,
            versions,
            config,
        })
    }
}

fn register_declarations(
    registry: &mut TypeRegistry,
    declarations: &ModelDeclarations,
) -> Result<(), TypeGraphError> {
    let version = &declarations.version;
    let all = declarations.with_envelope();
    debug!(version = %version, types = all.len(), "Registering model declarations");

    for declaration in all {
        if declaration.is_resource() {
            registry.insert(TypeDefinition::enumeration(
                TypeKey::output(version, declaration.resource_enum_name()),
                [declaration.name.clone()],
            ))?;
        }

        let key = TypeKey::output(version, declaration.name.clone());
        registry.register(key, move |resolver| declaration.build(resolver))?;
    }
    Ok(())
}

fn bind_search_tables(
    tables: &[ModelDeclarations],
) -> Result<IndexMap<(ModelVersion, String), QueryArgumentMap>, TypeGraphError> {
    let mut search = IndexMap::new();
    for declarations in tables {
        for (resource, params) in &declarations.search_parameters {
            let declared = declarations
                .types
                .iter()
                .any(|t| t.is_resource() && &t.name == resource);
            if !declared {
                warn!(version = %declarations.version, resource = %resource, "Search parameters for undeclared resource");
            }

            let arguments = bind(params)?;
            debug!(
                version = %declarations.version,
                resource = %resource,
                arguments = arguments.len(),
                "Bound search parameters"
            );
            search.insert((declarations.version.clone(), resource.clone()), arguments);
        }
    }
    Ok(search)
}

/// The frozen type graph of every assembled model version.
///
/// Immutable and `Send + Sync`; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct AssembledGraph {
    types: IndexMap<TypeKey, Arc<TypeDefinition>>,
    search: IndexMap<(ModelVersion, String), QueryArgumentMap>,
    versions: Vec<ModelVersion>,
    config: TypeGraphConfig,
}

impl AssembledGraph {
    /// Looks up a definition by key.
    pub fn get(&self, key: &TypeKey) -> Option<&Arc<TypeDefinition>> {
        self.types.get(key)
    }

    /// Looks up an output type (`Patient`).
    pub fn output(&self, version: &str, name: &str) -> Option<&Arc<TypeDefinition>> {
        self.get(&TypeKey::output(&ModelVersion::new(version), name))
    }

    /// Looks up an input type by its full name (`Patient_Input`).
    pub fn input(&self, version: &str, name: &str) -> Option<&Arc<TypeDefinition>> {
        self.get(&TypeKey::input(&ModelVersion::new(version), name))
    }

    /// Looks up the input counterpart of an output type name.
    pub fn input_of(&self, version: &str, output_name: &str) -> Option<&Arc<TypeDefinition>> {
        self.input(version, &self.config.input_name(output_name))
    }

    /// Query arguments of a resource.
    pub fn search_arguments(&self, version: &str, resource: &str) -> Option<&QueryArgumentMap> {
        self.search
            .get(&(ModelVersion::new(version), resource.to_string()))
    }

    /// All definitions in registration order.
    pub fn types(&self) -> impl Iterator<Item = &Arc<TypeDefinition>> {
        self.types.values()
    }

    /// Definitions of one namespace in registration order.
    pub fn types_in<'a>(
        &'a self,
        version: &'a str,
        graph: Graph,
    ) -> impl Iterator<Item = &'a Arc<TypeDefinition>> + 'a {
        self.types
            .values()
            .filter(move |def| def.key.graph == graph && def.key.version.as_str() == version)
    }

    /// Resources with their output definitions, in registration order.
    pub fn resources<'a>(&'a self, version: &'a str) -> impl Iterator<Item = &'a Arc<TypeDefinition>> + 'a {
        self.types_in(version, Graph::Output)
            .filter(|def| def.kind == TypeKind::Object && def.is_resource())
    }

    /// Assembled model versions in declaration order.
    pub fn versions(&self) -> &[ModelVersion] {
        &self.versions
    }

    /// Configuration the graph was assembled with.
    pub fn config(&self) -> &TypeGraphConfig {
        &self.config
    }

    /// Number of definitions across all versions and graphs.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the graph holds no definitions.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
