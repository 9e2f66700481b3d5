//! Field-map composition.
//!
//! FHIR types share envelope fields (`id`, `extension`, `meta`, ...) through
//! the `Element` / `BackboneElement` / `Resource` / `DomainResource` bases.
//! Instead of inheritance, a type lists its bases and the registry composes
//! their realized field maps in front of its own fields.

use crate::types::FieldMap;

/// Composes `own` on top of `base`.
///
/// Base fields come first in base order, then own fields in own order. When a
/// name exists in both maps the own entry wins but keeps the base position.
pub fn compose(base: &FieldMap, own: &FieldMap) -> FieldMap {
    let mut composed = base.clone();
    for (name, spec) in own {
        // IndexMap::insert keeps the existing slot for known keys.
        composed.insert(name.clone(), spec.clone());
    }
    composed
}

/// Left fold of [`compose`] over `maps`; later maps are more specific.
pub fn compose_all<'a>(maps: impl IntoIterator<Item = &'a FieldMap>) -> FieldMap {
    maps.into_iter()
        .fold(FieldMap::new(), |acc, next| compose(&acc, next))
}

/// Moves `name` to the front of `fields`, keeping the relative order of the
/// remaining fields. Absent names leave the map unchanged.
pub fn hoist(fields: FieldMap, name: &str) -> FieldMap {
    match fields.get_index_of(name) {
        None | Some(0) => fields,
        Some(_) => {
            let mut rest = fields;
            let mut hoisted = FieldMap::with_capacity(rest.len());
            if let Some((key, spec)) = rest.shift_remove_entry(name) {
                hoisted.insert(key, spec);
            }
            hoisted.extend(rest);
            hoisted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldSpec, FieldType, PrimitiveKind};

    fn map(fields: &[(&str, PrimitiveKind)]) -> FieldMap {
        fields
            .iter()
            .map(|(name, kind)| (name.to_string(), FieldSpec::new(FieldType::primitive(*kind))))
            .collect()
    }

    fn names(map: &FieldMap) -> Vec<&str> {
        map.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_base_fields_first() {
        let base = map(&[("id", PrimitiveKind::Id), ("language", PrimitiveKind::Code)]);
        let own = map(&[("active", PrimitiveKind::Boolean)]);

        let composed = compose(&base, &own);
        assert_eq!(names(&composed), vec!["id", "language", "active"]);
    }

    #[test]
    fn test_override_keeps_base_position() {
        let base = map(&[("id", PrimitiveKind::String), ("language", PrimitiveKind::Code)]);
        let own = map(&[("active", PrimitiveKind::Boolean), ("id", PrimitiveKind::Id)]);

        let composed = compose(&base, &own);
        assert_eq!(names(&composed), vec!["id", "language", "active"]);
        assert_eq!(
            composed["id"].field_type.primitive_kind(),
            Some(PrimitiveKind::Id)
        );
    }

    #[test]
    fn test_compose_is_order_stable() {
        let base = map(&[("b", PrimitiveKind::String), ("a", PrimitiveKind::String)]);
        let own = map(&[("d", PrimitiveKind::String), ("c", PrimitiveKind::String)]);

        let first = compose(&base, &own);
        let second = compose(&base, &own);
        assert_eq!(names(&first), names(&second));
        assert_eq!(first, second);
    }

    #[test]
    fn test_compose_all_layers() {
        let resource = map(&[("id", PrimitiveKind::Id), ("language", PrimitiveKind::Code)]);
        let domain = map(&[("text", PrimitiveKind::Xhtml)]);
        let own = map(&[("language", PrimitiveKind::String), ("active", PrimitiveKind::Boolean)]);

        let composed = compose_all([&resource, &domain, &own]);
        assert_eq!(names(&composed), vec!["id", "language", "text", "active"]);
        assert_eq!(
            composed["language"].field_type.primitive_kind(),
            Some(PrimitiveKind::String)
        );
    }

    #[test]
    fn test_hoist_moves_field_first() {
        let fields = map(&[
            ("id", PrimitiveKind::Id),
            ("meta", PrimitiveKind::String),
            ("resourceType", PrimitiveKind::Code),
            ("active", PrimitiveKind::Boolean),
        ]);

        let hoisted = hoist(fields.clone(), "resourceType");
        assert_eq!(names(&hoisted), vec!["resourceType", "id", "meta", "active"]);
        assert_eq!(hoist(fields.clone(), "missing"), fields);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(compose(&FieldMap::new(), &FieldMap::new()).is_empty());
        assert!(compose_all(std::iter::empty::<&FieldMap>()).is_empty());
    }
}
