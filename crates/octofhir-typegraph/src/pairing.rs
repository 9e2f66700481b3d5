//! Primitive/extension pairing.
//!
//! In FHIR JSON a primitive value `status` may carry an id and extensions in a
//! sibling property `_status`. The graph mirrors that: every field whose
//! innermost type is a primitive scalar gets a sibling `_field` of the
//! generic `Element` type.
//!
//! The sibling is never non-null, even when the primitive is required: a
//! required value may still be transmitted as extension only, so both fields
//! stay independently addressable. A list primitive gets a list sibling.
//! A missing sibling is an assembly defect reported by [`verify_pairing`].

use std::collections::HashSet;

use tracing::trace;

use crate::config::SiblingOrder;
use crate::error::TypeGraphError;
use crate::types::{FieldMap, FieldSpec, FieldType, TypeDefinition, TypeKey};

/// Name of the Element sibling of `field`.
pub fn sibling_name(field: &str) -> String {
    format!("_{field}")
}

/// Builds the sibling specification for a primitive field.
pub fn sibling_spec(primitive: &FieldSpec, element: &TypeKey) -> FieldSpec {
    let element_type = FieldType::named(element.clone());
    let field_type = if primitive.field_type.is_list() {
        FieldType::list(element_type)
    } else {
        element_type
    };

    FieldSpec {
        field_type,
        description: primitive.description.clone(),
        // Computed primitives and their siblings leave the input graph together.
        is_computed: primitive.is_computed,
    }
}

/// Returns `fields` with an Element sibling next to every primitive field.
///
/// Existing siblings are kept (and moved next to their primitive); missing
/// ones are generated. Applying the function twice yields the same map.
pub fn pair_fields(fields: &FieldMap, element: &TypeKey, order: SiblingOrder) -> FieldMap {
    let primitives: HashSet<&str> = fields
        .iter()
        .filter(|(name, spec)| is_pairable(name, spec))
        .map(|(name, _)| name.as_str())
        .collect();

    let mut paired = FieldMap::with_capacity(fields.len() + primitives.len());
    for (name, spec) in fields {
        if let Some(base) = name.strip_prefix('_')
            && primitives.contains(base)
        {
            // Emitted together with its primitive.
            continue;
        }

        if !primitives.contains(name.as_str()) {
            paired.insert(name.clone(), spec.clone());
            continue;
        }

        let sibling_key = sibling_name(name);
        let sibling = match fields.get(&sibling_key) {
            Some(existing) => existing.clone(),
            None => {
                trace!(field = %name, element = %element.name, "Adding element sibling");
                sibling_spec(spec, element)
            }
        };

        match order {
            SiblingOrder::Before => {
                paired.insert(sibling_key, sibling);
                paired.insert(name.clone(), spec.clone());
            }
            SiblingOrder::After => {
                paired.insert(name.clone(), spec.clone());
                paired.insert(sibling_key, sibling);
            }
        }
    }

    paired
}

/// Checks that every primitive field of `definition` has an `_field` sibling
/// whose innermost type is `element_type`.
///
/// # Errors
///
/// Returns `MissingElementSibling` naming the first unpaired field.
pub fn verify_pairing(definition: &TypeDefinition, element_type: &str) -> Result<(), TypeGraphError> {
    for (name, spec) in &definition.fields {
        if !is_pairable(name, spec) {
            continue;
        }

        let paired = definition
            .fields
            .get(&sibling_name(name))
            .and_then(|sibling| sibling.field_type.named_key())
            .is_some_and(|key| key.name == element_type);

        if !paired {
            return Err(TypeGraphError::MissingElementSibling {
                type_name: definition.name().to_string(),
                field: name.clone(),
            });
        }
    }
    Ok(())
}

fn is_pairable(name: &str, spec: &FieldSpec) -> bool {
    !name.starts_with('_') && spec.field_type.primitive_kind().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ModelVersion, PrimitiveKind};

    fn element() -> TypeKey {
        TypeKey::output(&ModelVersion::new("4_0_0"), "Element")
    }

    fn primitive(kind: PrimitiveKind) -> FieldSpec {
        FieldSpec::new(FieldType::primitive(kind))
    }

    fn names(map: &FieldMap) -> Vec<&str> {
        map.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_siblings_before_primitives() {
        let mut fields = FieldMap::new();
        fields.insert("start".into(), primitive(PrimitiveKind::DateTime));
        fields.insert("end".into(), primitive(PrimitiveKind::DateTime));

        let paired = pair_fields(&fields, &element(), SiblingOrder::Before);
        assert_eq!(names(&paired), vec!["_start", "start", "_end", "end"]);
        assert_eq!(paired["_start"].field_type.to_string(), "Element");
    }

    #[test]
    fn test_siblings_after_primitives() {
        let mut fields = FieldMap::new();
        fields.insert("status".into(), primitive(PrimitiveKind::Code));

        let paired = pair_fields(&fields, &element(), SiblingOrder::After);
        assert_eq!(names(&paired), vec!["status", "_status"]);
    }

    #[test]
    fn test_required_primitive_gets_nullable_sibling() {
        let mut fields = FieldMap::new();
        fields.insert(
            "status".into(),
            FieldSpec::new(FieldType::non_null(FieldType::primitive(PrimitiveKind::Code)))
                .description("The status"),
        );

        let paired = pair_fields(&fields, &element(), SiblingOrder::Before);
        assert!(paired["status"].field_type.is_non_null());
        assert!(!paired["_status"].field_type.is_non_null());
        assert_eq!(paired["_status"].description, "The status");
    }

    #[test]
    fn test_list_primitive_gets_list_sibling() {
        let mut fields = FieldMap::new();
        fields.insert(
            "given".into(),
            FieldSpec::new(FieldType::list(FieldType::primitive(PrimitiveKind::String))),
        );

        let paired = pair_fields(&fields, &element(), SiblingOrder::Before);
        assert_eq!(paired["_given"].field_type.to_string(), "[Element]");
    }

    #[test]
    fn test_complex_fields_are_not_paired() {
        let mut fields = FieldMap::new();
        fields.insert(
            "period".into(),
            FieldSpec::new(FieldType::named(element().sibling("Period"))),
        );

        let paired = pair_fields(&fields, &element(), SiblingOrder::Before);
        assert_eq!(names(&paired), vec!["period"]);
    }

    #[test]
    fn test_pairing_is_idempotent() {
        let mut fields = FieldMap::new();
        fields.insert("id".into(), primitive(PrimitiveKind::String));
        fields.insert("active".into(), primitive(PrimitiveKind::Boolean));

        let once = pair_fields(&fields, &element(), SiblingOrder::Before);
        let twice = pair_fields(&once, &element(), SiblingOrder::Before);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_declared_sibling_is_moved_and_kept() {
        let mut fields = FieldMap::new();
        fields.insert("active".into(), primitive(PrimitiveKind::Boolean));
        fields.insert(
            "_active".into(),
            FieldSpec::new(FieldType::named(element())).description("declared"),
        );

        let paired = pair_fields(&fields, &element(), SiblingOrder::Before);
        assert_eq!(names(&paired), vec!["_active", "active"]);
        assert_eq!(paired["_active"].description, "declared");
    }

    #[test]
    fn test_verify_pairing() {
        let key = element().sibling("Period");
        let unpaired = TypeDefinition::object(key.clone())
            .field("start", primitive(PrimitiveKind::DateTime));
        let err = verify_pairing(&unpaired, "Element").unwrap_err();
        assert_eq!(
            err,
            TypeGraphError::MissingElementSibling {
                type_name: "Period".into(),
                field: "start".into()
            }
        );

        let mut paired = TypeDefinition::object(key);
        paired.fields = pair_fields(&unpaired.fields, &element(), SiblingOrder::Before);
        assert!(verify_pairing(&paired, "Element").is_ok());
        assert!(verify_pairing(&paired, "Element_Input").is_err());
    }
}
