//! Field path resolution
//!
//! Walks a [`FieldPath`] through struct fields, dereferencing pointers
//! automatically and stepping into elements at `[]` segments.

use crate::model::TypeScope;
use caster_graph::{FieldPath, Kind, PathSegment, TypeExpr};

/// `[]` step taken while walking a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceStep {
    /// Path of the container field, marker dropped
    pub container: FieldPath,
    /// Container type as declared on the field
    pub container_type: TypeExpr,
    /// Remaining path applied to each element
    pub rest: FieldPath,
    /// Pointers crossed inside an element, relative to the element; an
    /// empty path is the element itself
    pub pointers: Vec<(FieldPath, TypeExpr)>,
}

/// Result of resolving a path against a root type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: FieldPath,
    /// Type at the end of the path (element type after a trailing `[]`)
    pub ty: TypeExpr,
    /// Pointer-typed fields crossed before the final segment
    pub pointers: Vec<(FieldPath, TypeExpr)>,
    /// `[]` steps in order
    pub slices: Vec<SliceStep>,
}

impl ResolvedPath {
    /// First `[]` step, if any
    #[must_use]
    pub fn slice(&self) -> Option<&SliceStep> {
        self.slices.first()
    }
}

/// Resolve `path` starting at `root`.
///
/// # Errors
///
/// Returns a human-readable reason when a segment names no field, names an
/// unexported field, walks into a non-struct, or applies `[]` to a
/// non-sequence.
pub fn resolve_path(
    scope: TypeScope<'_>,
    root: &TypeExpr,
    path: &FieldPath,
) -> Result<ResolvedPath, String> {
    let mut current = root.clone();
    let mut walked: Vec<PathSegment> = Vec::new();
    let mut pointers = Vec::new();
    let mut slices: Vec<SliceStep> = Vec::new();
    // segments walked when the last `[]` step was taken
    let mut element_start = 0;
    let segments = path.segments();

    for (i, segment) in segments.iter().enumerate() {
        // auto-deref between segments
        while let TypeExpr::Pointer(elem) = scope.underlying(&current).clone() {
            if let Some(step) = slices.last_mut() {
                let within = FieldPath::from_segments(walked[element_start..].to_vec());
                step.pointers.push((within, current.clone()));
            } else if !walked.is_empty() {
                pointers.push((FieldPath::from_segments(walked.clone()), current.clone()));
            }
            current = *elem;
        }

        let Some(info) = scope.struct_of(&current) else {
            let at = if walked.is_empty() {
                current.to_string()
            } else {
                FieldPath::from_segments(walked.clone()).to_string()
            };
            return Err(format!(
                "cannot select '{}' on '{}': {} is not a struct",
                segment.name,
                at,
                scope.kind_of(&current)
            ));
        };

        let Some(field) = info.field(&segment.name) else {
            return Err(format!(
                "type {} has no field '{}'",
                TypeExpr::Named(info.id.clone()),
                segment.name
            ));
        };
        if !field.exported {
            return Err(format!(
                "field '{}' of {} is unexported",
                segment.name,
                TypeExpr::Named(info.id.clone())
            ));
        }

        current = field.ty.clone();
        walked.push(PathSegment::field(&segment.name));

        if segment.is_slice {
            let container_type = current.clone();
            let elem = match scope.underlying(&current) {
                TypeExpr::Slice(elem) | TypeExpr::Array { elem, .. } => (**elem).clone(),
                other => {
                    return Err(format!(
                        "'{}' is a {}, not a slice or array",
                        FieldPath::from_segments(walked.clone()),
                        scope.kind_of(other)
                    ));
                }
            };
            slices.push(SliceStep {
                container: FieldPath::from_segments(walked.clone()),
                container_type,
                rest: FieldPath::from_segments(segments[i + 1..].to_vec()),
                pointers: Vec::new(),
            });
            element_start = walked.len();
            current = elem;
        }
    }

    Ok(ResolvedPath {
        path: path.clone(),
        ty: current,
        pointers,
        slices,
    })
}

/// True when the expression is (an alias of) a struct
#[must_use]
pub fn is_struct(scope: TypeScope<'_>, ty: &TypeExpr) -> bool {
    scope.kind_of(scope.underlying(ty)) == Kind::Struct
}

#[cfg(test)]
mod tests {
    use super::*;
    use caster_graph::{Field, TypeGraph, TypeId, TypeInfo};
    use std::collections::BTreeMap;

    fn graph() -> TypeGraph {
        let mut graph = TypeGraph::new();
        graph.insert(TypeInfo::structure(
            TypeId::new("store", "Order"),
            vec![
                Field::new("ID", TypeExpr::basic("int"), 0),
                Field::new(
                    "Items",
                    TypeExpr::slice_of(TypeExpr::named("store", "Item")),
                    1,
                ),
                Field::new(
                    "Meta",
                    TypeExpr::pointer_to(TypeExpr::named("store", "Meta")),
                    2,
                ),
                Field::new("secret", TypeExpr::basic("string"), 3),
                Field::new(
                    "Refs",
                    TypeExpr::slice_of(TypeExpr::pointer_to(TypeExpr::named("store", "Item"))),
                    4,
                ),
            ],
        ));
        graph.insert(TypeInfo::structure(
            TypeId::new("store", "Item"),
            vec![
                Field::new("SKU", TypeExpr::basic("string"), 0),
                Field::new(
                    "Meta",
                    TypeExpr::pointer_to(TypeExpr::named("store", "Meta")),
                    1,
                ),
            ],
        ));
        graph.insert(TypeInfo::structure(
            TypeId::new("store", "Meta"),
            vec![Field::new("Note", TypeExpr::basic("string"), 0)],
        ));
        graph
    }

    fn resolve(graph: &TypeGraph, path: &str) -> Result<ResolvedPath, String> {
        let generated = BTreeMap::new();
        let scope = TypeScope::new(graph, &generated);
        resolve_path(
            scope,
            &TypeExpr::named("store", "Order"),
            &FieldPath::parse(path).unwrap(),
        )
    }

    #[test]
    fn test_resolve_simple_and_pointer() {
        let graph = graph();
        assert_eq!(resolve(&graph, "ID").unwrap().ty, TypeExpr::basic("int"));

        let note = resolve(&graph, "Meta.Note").unwrap();
        assert_eq!(note.ty, TypeExpr::basic("string"));
        assert_eq!(note.pointers.len(), 1);
        assert_eq!(note.pointers[0].0.to_string(), "Meta");
    }

    #[test]
    fn test_resolve_slice_step() {
        let graph = graph();
        let sku = resolve(&graph, "Items[].SKU").unwrap();
        assert_eq!(sku.ty, TypeExpr::basic("string"));
        let step = sku.slice().unwrap();
        assert_eq!(step.container.to_string(), "Items");
        assert_eq!(step.rest.to_string(), "SKU");

        let items = resolve(&graph, "Items[]").unwrap();
        assert_eq!(items.ty, TypeExpr::named("store", "Item"));
    }

    #[test]
    fn test_resolve_pointers_inside_elements() {
        let graph = graph();
        let note = resolve(&graph, "Items[].Meta.Note").unwrap();
        assert!(note.pointers.is_empty());
        let step = note.slice().unwrap();
        assert_eq!(step.pointers.len(), 1);
        assert_eq!(step.pointers[0].0.to_string(), "Meta");
        assert_eq!(
            step.pointers[0].1,
            TypeExpr::pointer_to(TypeExpr::named("store", "Meta"))
        );

        let sku = resolve(&graph, "Refs[].SKU").unwrap();
        let step = sku.slice().unwrap();
        assert_eq!(step.pointers.len(), 1);
        assert!(step.pointers[0].0.is_empty());

        let nested = resolve(&graph, "Meta.Note").unwrap();
        assert!(nested.slices.is_empty());
        assert_eq!(nested.pointers.len(), 1);
    }

    #[test]
    fn test_resolve_errors() {
        let graph = graph();
        assert!(resolve(&graph, "Missing").unwrap_err().contains("no field"));
        assert!(resolve(&graph, "secret").unwrap_err().contains("unexported"));
        assert!(resolve(&graph, "ID.Value").unwrap_err().contains("not a struct"));
        assert!(resolve(&graph, "ID[]").unwrap_err().contains("not a slice"));
    }
}
