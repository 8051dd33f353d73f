//! Synthesized target types
//!
//! When a declared target type is absent from the graph, its shape is
//! inferred from the fields the mapping writes.

use crate::model::TypeScope;
use crate::resolve::resolve_path;
use caster_graph::{Field, FieldPath, TypeExpr, TypeId, TypeInfo};
use caster_mapping::{FieldMapping, TransformRegistry, TypeMapping};
use tracing::debug;

/// Build a struct declaration for `id` from the entries of `decl`.
///
/// Only single-segment target paths become fields; deeper paths are left
/// for the resolver to report. The first entry naming a field decides its
/// type.
pub(crate) fn synthesize_target(
    scope: TypeScope<'_>,
    transforms: &TransformRegistry,
    decl: &TypeMapping,
    source: &TypeExpr,
    id: TypeId,
) -> TypeInfo {
    let entries = decl
        .one_to_one
        .iter()
        .map(|(target, source)| FieldMapping::simple(target, source))
        .chain(decl.fields.iter().cloned())
        .chain(decl.auto.iter().cloned());

    let mut fields: Vec<Field> = Vec::new();
    for entry in entries {
        if entry.ignore {
            continue;
        }
        for target in entry.target.refs() {
            let Ok(path) = FieldPath::parse(&target.path) else {
                continue;
            };
            let [segment] = path.segments() else {
                continue;
            };
            if segment.is_slice || fields.iter().any(|f| f.name == segment.name) {
                continue;
            }
            let ty = infer_field_type(scope, transforms, &entry, source);
            fields.push(Field::new(&segment.name, ty, fields.len()));
        }
    }

    debug!("Synthesized {} with {} field(s)", id, fields.len());
    TypeInfo {
        is_generated: true,
        ..TypeInfo::structure(id, fields)
    }
}

fn infer_field_type(
    scope: TypeScope<'_>,
    transforms: &TransformRegistry,
    entry: &FieldMapping,
    source: &TypeExpr,
) -> TypeExpr {
    if let Some(name) = &entry.transform {
        return transforms
            .get(name)
            .and_then(|def| def.target_type.as_deref())
            .and_then(|text| TypeExpr::parse_go(text, scope.graph()).ok())
            .unwrap_or_else(any);
    }

    if let [single] = entry.source.refs() {
        let resolved = FieldPath::parse(&single.path)
            .ok()
            .and_then(|path| resolve_path(scope, source, &path).ok());
        return match resolved {
            Some(resolved) if resolved.slices.is_empty() => resolved.ty,
            _ => any(),
        };
    }

    match &entry.default {
        Some(literal) if entry.source.is_empty() => literal_type(literal),
        _ => any(),
    }
}

fn any() -> TypeExpr {
    TypeExpr::basic("any")
}

/// Go type of a literal as written in a `default`
#[must_use]
pub fn literal_type(literal: &str) -> TypeExpr {
    let literal = literal.trim();
    let name = if literal.starts_with('"') || literal.starts_with('`') {
        "string"
    } else if literal == "true" || literal == "false" {
        "bool"
    } else if literal.parse::<i64>().is_ok() {
        "int"
    } else if literal.parse::<f64>().is_ok() {
        "float64"
    } else {
        "any"
    };
    TypeExpr::basic(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caster_graph::TypeGraph;
    use caster_mapping::{FieldRefArray, TransformDef};
    use std::collections::BTreeMap;

    #[test]
    fn test_literal_type() {
        assert_eq!(literal_type("\"n/a\""), TypeExpr::basic("string"));
        assert_eq!(literal_type("true"), TypeExpr::basic("bool"));
        assert_eq!(literal_type("42"), TypeExpr::basic("int"));
        assert_eq!(literal_type("-1.5"), TypeExpr::basic("float64"));
        assert_eq!(literal_type("time.Now()"), TypeExpr::basic("any"));
    }

    #[test]
    fn test_synthesize_infers_field_types() {
        let mut graph = TypeGraph::new();
        graph.insert(TypeInfo::structure(
            TypeId::new("store", "User"),
            vec![
                Field::new("ID", TypeExpr::basic("int64"), 0),
                Field::new("FirstName", TypeExpr::basic("string"), 1),
            ],
        ));
        let generated = BTreeMap::new();
        let scope = TypeScope::new(&graph, &generated);

        let mut def = TransformDef::named("Age");
        def.target_type = Some("uint8".to_string());
        let transforms = TransformRegistry::from_defs(&[def]);

        let mut decl = TypeMapping::new("store.User", "dto.UserView");
        decl.one_to_one.push("ID", "ID");
        decl.fields.push(FieldMapping {
            transform: Some("Age".to_string()),
            ..FieldMapping::simple("Age", "FirstName")
        });
        decl.fields.push(FieldMapping {
            source: FieldRefArray::default(),
            default: Some("\"active\"".to_string()),
            ..FieldMapping::simple("Status", "Unused")
        });
        decl.fields.push(FieldMapping::simple("Nested.Deep", "ID"));
        decl.ignore.push(FieldMapping::ignored("Secret"));

        let info = synthesize_target(
            scope,
            &transforms,
            &decl,
            &TypeExpr::named("store", "User"),
            TypeId::new("dto", "UserView"),
        );

        assert!(info.is_generated);
        let fields = info.fields().unwrap();
        let shape: Vec<(&str, String)> = fields
            .iter()
            .map(|f| (f.name.as_str(), f.ty.to_string()))
            .collect();
        assert_eq!(
            shape,
            vec![
                ("ID", "int64".to_string()),
                ("Age", "uint8".to_string()),
                ("Status", "string".to_string()),
            ]
        );
    }
}
