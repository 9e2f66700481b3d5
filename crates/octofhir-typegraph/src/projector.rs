//! Input graph derivation.
//!
//! Every output object has an input counterpart used by mutations. The input
//! type is derived mechanically from the realized output type:
//!
//! 1. computed (server-managed) fields are dropped;
//! 2. object targets are re-pointed to their input counterparts, scalars and
//!    enums pass through;
//! 3. wrappers are preserved; the `resourceType` tag becomes a one-value enum
//!    of the input graph;
//! 4. the result is registered as `<Name>_Input` in the input namespace.
//!
//! Targets are not projected recursively. They are queued and projected
//! afterwards, which keeps mutually referencing types (`Identifier` ->
//! `Reference` -> `Identifier`) cycle-free and constructs each input type once.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::TypeGraphConfig;
use crate::error::TypeGraphError;
use crate::registry::TypeRegistry;
use crate::types::{
    FieldMap, FieldSpec, FieldType, Graph, RESOURCE_TYPE_FIELD, TypeDefinition, TypeKey, TypeKind,
};

/// Tracks projection progress.
#[derive(Debug, Default)]
struct ProjectionQueue {
    /// Output key -> input key of types already projected.
    projected: HashMap<TypeKey, TypeKey>,
    /// Output types queued for projection.
    pending: VecDeque<TypeKey>,
    /// Mirror of `pending` for membership checks.
    queued: HashSet<TypeKey>,
}

impl ProjectionQueue {
    fn is_known(&self, key: &TypeKey) -> bool {
        self.projected.contains_key(key) || self.queued.contains(key)
    }

    fn queue_if_needed(&mut self, key: &TypeKey) {
        if !self.is_known(key) {
            self.queued.insert(key.clone());
            self.pending.push_back(key.clone());
        }
    }

    fn pop_pending(&mut self) -> Option<TypeKey> {
        let key = self.pending.pop_front()?;
        self.queued.remove(&key);
        Some(key)
    }
}

/// Derives input types from realized output types.
pub struct DualGraphProjector<'a> {
    registry: &'a mut TypeRegistry,
    config: &'a TypeGraphConfig,
    queue: ProjectionQueue,
}

impl<'a> DualGraphProjector<'a> {
    /// Creates a projector registering its results into `registry`.
    pub fn new(registry: &'a mut TypeRegistry, config: &'a TypeGraphConfig) -> Self {
        Self {
            registry,
            config,
            queue: ProjectionQueue::default(),
        }
    }

    /// Key of the input counterpart of `output`.
    pub fn input_key(&self, output: &TypeKey) -> TypeKey {
        TypeKey::input(&output.version, self.config.input_name(&output.name))
    }

    /// Projects `output` and every object type its projection points at.
    ///
    /// Returns the input definition of `output`. Projecting the same type
    /// twice returns the memoized definition.
    ///
    /// # Errors
    ///
    /// Returns `NotProjectable` unless `output` is an object of the output
    /// graph, and `UnresolvedTarget` if a field points at a type registered
    /// in neither graph. A failed projection leaves nothing registered.
    pub fn project(&mut self, output: &TypeDefinition) -> Result<Arc<TypeDefinition>, TypeGraphError> {
        if output.kind != TypeKind::Object || output.key.graph != Graph::Output {
            return Err(TypeGraphError::NotProjectable {
                key: output.key.clone(),
            });
        }
        let input = self.project_one(output)?;
        self.drain()?;
        Ok(input)
    }

    /// Projects the closure of `roots`.
    ///
    /// # Errors
    ///
    /// See [`project`](Self::project).
    pub fn project_reachable<'k>(
        &mut self,
        roots: impl IntoIterator<Item = &'k TypeKey>,
    ) -> Result<usize, TypeGraphError> {
        for root in roots {
            self.queue.queue_if_needed(root);
        }
        self.drain()?;
        debug!(count = self.queue.projected.len(), "Input graph projection complete");
        Ok(self.queue.projected.len())
    }

    fn drain(&mut self) -> Result<(), TypeGraphError> {
        while let Some(key) = self.queue.pop_pending() {
            if self.queue.projected.contains_key(&key) {
                continue;
            }
            let output = self.registry.resolve(&key)?;
            if output.kind == TypeKind::Object {
                self.project_one(&output)?;
            }
        }
        Ok(())
    }

    fn project_one(&mut self, output: &TypeDefinition) -> Result<Arc<TypeDefinition>, TypeGraphError> {
        if let Some(input_key) = self.queue.projected.get(&output.key) {
            return self.registry.resolve(input_key);
        }

        let input_key = self.input_key(&output.key);
        trace!(output = %output.key, input = %input_key, "Projecting type");

        let mut tag = None;
        let mut fields = FieldMap::with_capacity(output.fields.len());
        for (name, spec) in &output.fields {
            if spec.is_computed {
                trace!(type_name = %output.name(), field = %name, "Dropping computed field");
                continue;
            }

            let field_type = if name == RESOURCE_TYPE_FIELD && output.is_resource() {
                let enum_key = self.resource_tag_key(output);
                tag = Some(enum_key.clone());
                FieldType::non_null(FieldType::named(enum_key))
            } else {
                spec.field_type
                    .try_map_named(&mut |target| self.input_target(output, name, target))?
            };

            fields.insert(
                name.clone(),
                FieldSpec {
                    field_type,
                    description: spec.description.clone(),
                    is_computed: false,
                },
            );
        }

        // Nothing is registered until every field projected.
        if let Some(enum_key) = tag
            && !self.registry.contains(&enum_key)
        {
            self.registry.insert(TypeDefinition::enumeration(
                enum_key,
                [output.name().to_string()],
            ))?;
        }

        let mut input = TypeDefinition::input_object(input_key.clone())
            .description(output.description.clone());
        input.fields = fields;
        let input = self.registry.insert(input)?;
        self.queue.projected.insert(output.key.clone(), input_key);
        Ok(input)
    }

    /// Maps a field target of `owner` to the target used in the input graph.
    fn input_target(
        &mut self,
        owner: &TypeDefinition,
        field: &str,
        target: &TypeKey,
    ) -> Result<TypeKey, TypeGraphError> {
        if target.graph == Graph::Input {
            return if self.registry.contains(target) {
                Ok(target.clone())
            } else {
                Err(TypeGraphError::unresolved_target(owner.name(), field, &target.name))
            };
        }

        if !self.registry.contains(target) {
            // Accept a target that only exists as an input type.
            let input = self.input_key(target);
            return if self.registry.contains(&input) {
                Ok(input)
            } else {
                Err(TypeGraphError::unresolved_target(owner.name(), field, &target.name))
            };
        }

        let definition = self.registry.resolve(target)?;
        match definition.kind {
            TypeKind::Enum | TypeKind::Scalar | TypeKind::InputObject => Ok(target.clone()),
            TypeKind::Object => {
                self.queue.queue_if_needed(target);
                Ok(self.input_key(target))
            }
        }
    }

    /// Key of the input-side single value enum of a resource.
    fn resource_tag_key(&self, output: &TypeDefinition) -> TypeKey {
        TypeKey::input(
            &output.key.version,
            self.config.input_name(&format!("{}_Enum", output.name())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ModelVersion, PrimitiveKind};

    fn version() -> ModelVersion {
        ModelVersion::new("4_0_0")
    }

    fn out(name: &str) -> TypeKey {
        TypeKey::output(&version(), name)
    }

    fn inp(name: &str) -> TypeKey {
        TypeKey::input(&version(), name)
    }

    fn primitive(kind: PrimitiveKind) -> FieldSpec {
        FieldSpec::new(FieldType::primitive(kind))
    }

    fn reference_graph() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .register(out("Reference"), |r| {
                let identifier = r.handle_named("Identifier")?;
                Ok(TypeDefinition::object(out("Reference"))
                    .field("reference", primitive(PrimitiveKind::String))
                    .field("identifier", FieldSpec::new(identifier.field_type()))
                    .field(
                        "resource",
                        FieldSpec::new(FieldType::Scalar(crate::types::ScalarKind::Resource))
                            .computed(),
                    ))
            })
            .unwrap();
        registry
            .register(out("Identifier"), |r| {
                let reference = r.handle_named("Reference")?;
                Ok(TypeDefinition::object(out("Identifier"))
                    .field("value", primitive(PrimitiveKind::String))
                    .field("assigner", FieldSpec::new(reference.field_type())))
            })
            .unwrap();
        registry
    }

    #[test]
    fn test_computed_fields_dropped() {
        let mut registry = reference_graph();
        let config = TypeGraphConfig::default();
        let reference = registry.resolve(&out("Reference")).unwrap();

        let input = DualGraphProjector::new(&mut registry, &config)
            .project(&reference)
            .unwrap();
        assert_eq!(input.key, inp("Reference_Input"));
        assert_eq!(input.kind, TypeKind::InputObject);
        assert_eq!(input.field_names(), vec!["reference", "identifier"]);
    }

    #[test]
    fn test_mutual_references_projected_once() {
        let mut registry = reference_graph();
        let config = TypeGraphConfig::default();
        let reference = registry.resolve(&out("Reference")).unwrap();

        let mut projector = DualGraphProjector::new(&mut registry, &config);
        let first = projector.project(&reference).unwrap();
        let second = projector.project(&reference).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        drop(projector);

        let identifier = registry.resolve(&inp("Identifier_Input")).unwrap();
        assert_eq!(
            identifier.fields["assigner"].field_type.named_key(),
            Some(&inp("Reference_Input"))
        );
        assert_eq!(
            first.fields["identifier"].field_type.named_key(),
            Some(&inp("Identifier_Input"))
        );
    }

    #[test]
    fn test_wrappers_and_enums_preserved() {
        let mut registry = TypeRegistry::new();
        registry
            .insert(TypeDefinition::enumeration(out("Gender"), ["male", "female"]))
            .unwrap();
        registry
            .register(out("Coding"), |_| {
                Ok(TypeDefinition::object(out("Coding"))
                    .field("code", primitive(PrimitiveKind::Code)))
            })
            .unwrap();
        registry
            .register(out("Person"), |r| {
                let gender = r.handle_named("Gender")?;
                let coding = r.handle_named("Coding")?;
                Ok(TypeDefinition::object(out("Person"))
                    .field("gender", FieldSpec::new(FieldType::non_null(gender.field_type())))
                    .field(
                        "tags",
                        FieldSpec::new(FieldType::list(FieldType::non_null(coding.field_type()))),
                    ))
            })
            .unwrap();
        let config = TypeGraphConfig::default();
        let person = registry.resolve(&out("Person")).unwrap();

        let input = DualGraphProjector::new(&mut registry, &config)
            .project(&person)
            .unwrap();
        assert_eq!(input.fields["gender"].field_type.to_string(), "Gender!");
        assert_eq!(
            input.fields["gender"].field_type.named_key(),
            Some(&out("Gender"))
        );
        assert_eq!(input.fields["tags"].field_type.to_string(), "[Coding_Input!]");
    }

    #[test]
    fn test_resource_tag_respecified() {
        let mut registry = TypeRegistry::new();
        registry
            .insert(TypeDefinition::enumeration(out("Patient_Enum"), ["Patient"]))
            .unwrap();
        registry
            .register(out("Patient"), |r| {
                let tag = r.handle_named("Patient_Enum")?;
                Ok(TypeDefinition::object(out("Patient"))
                    .field(RESOURCE_TYPE_FIELD, FieldSpec::new(FieldType::non_null(tag.field_type())))
                    .field("active", primitive(PrimitiveKind::Boolean)))
            })
            .unwrap();
        let config = TypeGraphConfig::default();
        let patient = registry.resolve(&out("Patient")).unwrap();

        let input = DualGraphProjector::new(&mut registry, &config)
            .project(&patient)
            .unwrap();
        assert_eq!(
            input.fields[RESOURCE_TYPE_FIELD].field_type.to_string(),
            "Patient_Enum_Input!"
        );
        let tag = registry.resolve(&inp("Patient_Enum_Input")).unwrap();
        assert_eq!(tag.kind, TypeKind::Enum);
        assert_eq!(tag.enum_values, vec!["Patient"]);
    }

    #[test]
    fn test_unresolved_target() {
        let mut registry = TypeRegistry::new();
        let config = TypeGraphConfig::default();
        let orphan = TypeDefinition::object(out("Orphan"))
            .field("ghost", FieldSpec::new(FieldType::named(out("Ghost"))));

        let err = DualGraphProjector::new(&mut registry, &config)
            .project(&orphan)
            .unwrap_err();
        assert_eq!(
            err,
            TypeGraphError::unresolved_target("Orphan", "ghost", "Ghost")
        );
    }

    #[test]
    fn test_failed_projection_can_be_retried() {
        let mut registry = TypeRegistry::new();
        registry
            .insert(TypeDefinition::enumeration(out("Orphan_Enum"), ["Orphan"]))
            .unwrap();
        let config = TypeGraphConfig::default();
        let orphan = TypeDefinition::object(out("Orphan"))
            .field(
                RESOURCE_TYPE_FIELD,
                FieldSpec::new(FieldType::non_null(FieldType::named(out("Orphan_Enum")))),
            )
            .field("ghost", FieldSpec::new(FieldType::named(out("Ghost"))));

        let mut projector = DualGraphProjector::new(&mut registry, &config);
        let expected = TypeGraphError::unresolved_target("Orphan", "ghost", "Ghost");
        assert_eq!(projector.project(&orphan).unwrap_err(), expected);
        assert_eq!(projector.project(&orphan).unwrap_err(), expected);
        drop(projector);

        assert!(!registry.contains(&inp("Orphan_Input")));
        assert!(!registry.contains(&inp("Orphan_Enum_Input")));
    }

    #[test]
    fn test_only_output_objects_are_projected() {
        let mut registry = TypeRegistry::new();
        let config = TypeGraphConfig::default();
        let mut projector = DualGraphProjector::new(&mut registry, &config);

        let gender = TypeDefinition::enumeration(out("Gender"), ["male", "female"]);
        assert_eq!(
            projector.project(&gender).unwrap_err(),
            TypeGraphError::NotProjectable { key: out("Gender") }
        );

        let upload = TypeDefinition::input_object(inp("Upload_Input"));
        assert_eq!(
            projector.project(&upload).unwrap_err().error_code(),
            "NOT_PROJECTABLE"
        );

        let misplaced = TypeDefinition::object(inp("Misplaced"));
        assert_eq!(
            projector.project(&misplaced).unwrap_err().error_code(),
            "NOT_PROJECTABLE"
        );
        drop(projector);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_target_existing_only_as_input() {
        let mut registry = TypeRegistry::new();
        registry
            .insert(
                TypeDefinition::input_object(inp("Upload_Input"))
                    .field("data", primitive(PrimitiveKind::Base64Binary)),
            )
            .unwrap();
        let config = TypeGraphConfig::default();
        let holder = TypeDefinition::object(out("Holder"))
            .field("upload", FieldSpec::new(FieldType::named(out("Upload"))));

        let input = DualGraphProjector::new(&mut registry, &config)
            .project(&holder)
            .unwrap();
        assert_eq!(
            input.fields["upload"].field_type.named_key(),
            Some(&inp("Upload_Input"))
        );
    }

    #[test]
    fn test_project_reachable_counts_closure() {
        let mut registry = reference_graph();
        let config = TypeGraphConfig::default();

        let count = DualGraphProjector::new(&mut registry, &config)
            .project_reachable([&out("Identifier")])
            .unwrap();
        assert_eq!(count, 2);
        assert!(registry.contains(&inp("Reference_Input")));
        assert!(registry.contains(&inp("Identifier_Input")));
    }
}
