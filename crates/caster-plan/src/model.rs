//! Resolved mapping plan
//!
//! The plan is the contract between the planner and the emitter: every
//! assignment carries the strategy the emitter must render, the types at both
//! ends, and the target paths it depends on.

use caster_graph::{FieldPath, Kind, TypeExpr, TypeGraph, TypeId, TypeInfo};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Conversion technique chosen for one assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStrategy {
    DirectAssign,
    Convert,
    PointerDeref,
    PointerWrap,
    SliceMap,
    Map,
    NestedCast,
    PointerNestedCast,
    Transform,
    Default,
    Ignore,
}

impl fmt::Display for ConversionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DirectAssign => "direct assign",
            Self::Convert => "convert",
            Self::PointerDeref => "pointer deref",
            Self::PointerWrap => "pointer wrap",
            Self::SliceMap => "slice map",
            Self::Map => "map",
            Self::NestedCast => "nested cast",
            Self::PointerNestedCast => "pointer nested cast",
            Self::Transform => "transform",
            Self::Default => "default",
            Self::Ignore => "ignore",
        })
    }
}

/// `(source, target)` identity of a caster
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TypePairKey {
    pub source: TypeId,
    pub target: TypeId,
}

impl TypePairKey {
    /// Create a key
    #[must_use]
    pub fn new(source: TypeId, target: TypeId) -> Self {
        Self { source, target }
    }
}

impl fmt::Display for TypePairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            TypeExpr::Named(self.source.clone()),
            TypeExpr::Named(self.target.clone())
        )
    }
}

/// Structural conversion between two types, one nesting level per node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversion {
    pub strategy: ConversionStrategy,
    pub source: TypeExpr,
    pub target: TypeExpr,
    /// Pointer inner, slice/array element, or map value conversion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elem: Option<Box<Conversion>>,
    /// Map key conversion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<Box<Conversion>>,
    /// Caster this conversion calls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested: Option<TypePairKey>,
    /// No rule applied; the source is assigned unmodified
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

impl Conversion {
    /// Leaf conversion without children
    #[must_use]
    pub fn leaf(strategy: ConversionStrategy, source: TypeExpr, target: TypeExpr) -> Self {
        Self {
            strategy,
            source,
            target,
            elem: None,
            key: None,
            nested: None,
            fallback: false,
        }
    }

    /// Unsupported conversion kept as a plain assignment
    #[must_use]
    pub fn fallback(source: TypeExpr, target: TypeExpr) -> Self {
        Self {
            fallback: true,
            ..Self::leaf(ConversionStrategy::DirectAssign, source, target)
        }
    }

    /// Conversion wrapping an inner one
    #[must_use]
    pub fn wrapping(
        strategy: ConversionStrategy,
        source: TypeExpr,
        target: TypeExpr,
        elem: Conversion,
    ) -> Self {
        Self {
            elem: Some(Box::new(elem)),
            ..Self::leaf(strategy, source, target)
        }
    }

    /// True when this node or any child fell back
    #[must_use]
    pub fn has_fallback(&self) -> bool {
        self.fallback
            || self.elem.as_ref().is_some_and(|c| c.has_fallback())
            || self.key.as_ref().is_some_and(|c| c.has_fallback())
    }

    /// Every caster pair referenced in this tree, outermost first
    #[must_use]
    pub fn nested_pairs(&self) -> Vec<TypePairKey> {
        let mut out = Vec::new();
        self.collect_nested(&mut out);
        out
    }

    fn collect_nested(&self, out: &mut Vec<TypePairKey>) {
        if let Some(key) = &self.nested {
            if !out.contains(key) {
                out.push(key.clone());
            }
        }
        if let Some(key) = &self.key {
            key.collect_nested(out);
        }
        if let Some(elem) = &self.elem {
            elem.collect_nested(out);
        }
    }

    /// Innermost fallback, for reporting
    #[must_use]
    pub fn first_fallback(&self) -> Option<&Conversion> {
        if self.fallback {
            return Some(self);
        }
        self.key
            .as_deref()
            .and_then(Conversion::first_fallback)
            .or_else(|| self.elem.as_deref().and_then(Conversion::first_fallback))
    }
}

/// Function a transform mapping calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Callee {
    /// Function in the package being generated into
    Local { func: String },
    /// Function in another package
    Package { path: String, func: String },
    /// Undeclared bare name; a panicking stub is generated
    Missing { name: String },
}

/// Type of a call argument or caster parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Expr(TypeExpr),
    /// Go type text that could not be parsed; rendered verbatim
    Raw(String),
}

/// Resolved transform call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformCall {
    /// Name as referenced in the mapping
    pub name: String,
    pub callee: Callee,
    /// Argument types: sources then extras
    pub params: Vec<ParamType>,
    /// Result types, one per target
    pub results: Vec<TypeExpr>,
}

/// Value of an extra argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraValue {
    /// Field of the source value
    Source(FieldPath),
    /// Field of the target value, assigned earlier
    Target(FieldPath),
    /// Caster parameter declared under `requires`
    Param(String),
}

/// Resolved extra argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedExtra {
    pub name: String,
    pub value: ExtraValue,
    pub ty: ParamType,
}

/// Element-wise assignment through one `[]` segment on each side
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Projection {
    pub source_container: FieldPath,
    /// Type of the source container (slice or array)
    pub source_container_type: TypeExpr,
    pub source_rest: FieldPath,
    pub target_container: FieldPath,
    pub target_rest: FieldPath,
    /// Type of the target container (slice or array)
    pub target_container_type: TypeExpr,
    /// Pointers inside a source element, nil-checked per element
    pub source_pointers: Vec<FieldPath>,
    /// Pointers inside a target element, allocated per element
    pub target_pointers: Vec<(FieldPath, TypeExpr)>,
}

/// Where a resolved mapping came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingOrigin {
    OneToOne,
    Field,
    Ignore,
    Auto,
    /// Name-matched by the planner
    Matched,
}

impl fmt::Display for MappingOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OneToOne => "121",
            Self::Field => "fields",
            Self::Ignore => "ignore",
            Self::Auto => "auto",
            Self::Matched => "matched",
        })
    }
}

/// One planned assignment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedFieldMapping {
    pub source_paths: Vec<FieldPath>,
    pub target_paths: Vec<FieldPath>,
    pub strategy: ConversionStrategy,
    /// Structural conversion for non-transform, non-default strategies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion: Option<Conversion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformCall>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<ResolvedExtra>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on_targets: Vec<FieldPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Projection>,
    /// Pointer fields crossed by the target path that must be allocated
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub target_pointers: Vec<(FieldPath, TypeExpr)>,
    /// Pointer fields crossed by source paths; read under a nil guard
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_pointers: Vec<FieldPath>,
    pub origin: MappingOrigin,
    pub explanation: String,
}

impl ResolvedFieldMapping {
    /// Skeleton with the given endpoints and strategy
    #[must_use]
    pub fn new(
        source_paths: Vec<FieldPath>,
        target_paths: Vec<FieldPath>,
        strategy: ConversionStrategy,
        origin: MappingOrigin,
    ) -> Self {
        Self {
            source_paths,
            target_paths,
            strategy,
            conversion: None,
            default: None,
            transform: None,
            extra: Vec::new(),
            depends_on_targets: Vec::new(),
            projection: None,
            target_pointers: Vec::new(),
            source_pointers: Vec::new(),
            origin,
            explanation: String::new(),
        }
    }

    /// Comma-joined target paths
    #[must_use]
    pub fn target_label(&self) -> String {
        join_paths(&self.target_paths)
    }

    /// Comma-joined source paths
    #[must_use]
    pub fn source_label(&self) -> String {
        join_paths(&self.source_paths)
    }
}

fn join_paths(paths: &[FieldPath]) -> String {
    paths
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Target field left unset, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmappedTarget {
    pub path: FieldPath,
    pub reason: String,
}

/// Extra caster parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRequire {
    pub name: String,
    pub ty: ParamType,
}

/// Why a pair is in the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairOrigin {
    /// Declared in the mapping document
    Declared,
    /// Needed by a nested cast of another pair
    Nested,
}

/// Fully resolved caster for one type pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTypePair {
    pub key: TypePairKey,
    pub caster_name: String,
    pub mappings: Vec<ResolvedFieldMapping>,
    pub nested_pairs: Vec<TypePairKey>,
    pub unmapped_targets: Vec<UnmappedTarget>,
    pub requires: Vec<ResolvedRequire>,
    pub is_generated_target: bool,
    pub origin: PairOrigin,
}

impl ResolvedTypePair {
    /// Source type identity
    #[must_use]
    pub fn source_type(&self) -> &TypeId {
        &self.key.source
    }

    /// Target type identity
    #[must_use]
    pub fn target_type(&self) -> &TypeId {
        &self.key.target
    }

    /// `source -> target` label
    #[must_use]
    pub fn label(&self) -> String {
        self.key.to_string()
    }
}

/// Output of the planner; immutable once returned
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedMappingPlan<'g> {
    #[serde(skip)]
    graph: &'g TypeGraph,
    pub pairs: Vec<ResolvedTypePair>,
    /// Target types the generator synthesizes
    #[serde(serialize_with = "serialize_values")]
    pub generated_types: BTreeMap<TypeId, TypeInfo>,
}

/// Struct-keyed maps serialize as their values, which carry the key
fn serialize_values<S: Serializer>(
    map: &BTreeMap<TypeId, TypeInfo>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(map.values())
}

impl<'g> ResolvedMappingPlan<'g> {
    /// Assemble a plan
    #[must_use]
    pub fn new(
        graph: &'g TypeGraph,
        pairs: Vec<ResolvedTypePair>,
        generated_types: BTreeMap<TypeId, TypeInfo>,
    ) -> Self {
        Self {
            graph,
            pairs,
            generated_types,
        }
    }

    /// Type graph the plan was built from
    #[must_use]
    pub fn graph(&self) -> &'g TypeGraph {
        self.graph
    }

    /// Lookup scope covering the graph and the synthesized types
    #[must_use]
    pub fn scope(&self) -> TypeScope<'_> {
        TypeScope::new(self.graph, &self.generated_types)
    }

    /// Pair by key
    #[must_use]
    pub fn pair(&self, key: &TypePairKey) -> Option<&ResolvedTypePair> {
        self.pairs.iter().find(|p| &p.key == key)
    }

    /// True when no pair was planned
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Type lookups over the immutable graph plus synthesized types
#[derive(Debug, Clone, Copy)]
pub struct TypeScope<'a> {
    graph: &'a TypeGraph,
    generated: &'a BTreeMap<TypeId, TypeInfo>,
}

impl<'a> TypeScope<'a> {
    /// Create a scope
    #[must_use]
    pub fn new(graph: &'a TypeGraph, generated: &'a BTreeMap<TypeId, TypeInfo>) -> Self {
        Self { graph, generated }
    }

    /// Underlying graph
    #[must_use]
    pub fn graph(&self) -> &'a TypeGraph {
        self.graph
    }

    /// Named type by identity; synthesized types shadow the graph
    #[must_use]
    pub fn get(&self, id: &TypeId) -> Option<&'a TypeInfo> {
        self.generated.get(id).or_else(|| self.graph.get(id))
    }

    /// Structural kind of an expression
    #[must_use]
    pub fn kind_of(&self, ty: &TypeExpr) -> Kind {
        match ty {
            TypeExpr::Named(id) if self.generated.contains_key(id) => Kind::Struct,
            _ => self.graph.kind_of(ty),
        }
    }

    /// Struct declaration behind an expression, following aliases
    #[must_use]
    pub fn struct_of(&self, ty: &TypeExpr) -> Option<&'a TypeInfo> {
        if let TypeExpr::Named(id) = ty {
            if let Some(info) = self.generated.get(id) {
                return Some(info);
            }
        }
        self.graph.struct_of(ty)
    }

    /// Follow aliases to the structural type
    #[must_use]
    pub fn underlying<'t>(&self, ty: &'t TypeExpr) -> &'t TypeExpr
    where
        'a: 't,
    {
        self.graph.underlying(ty)
    }
}

/// Caster function name: `StoreOrderToWireOrder`
#[must_use]
pub fn caster_name(graph: &TypeGraph, key: &TypePairKey) -> String {
    format!(
        "{}{}To{}{}",
        capitalize(&package_alias(graph, &key.source)),
        key.source.name,
        capitalize(&package_alias(graph, &key.target)),
        key.target.name
    )
}

fn package_alias(graph: &TypeGraph, id: &TypeId) -> String {
    if id.is_builtin() {
        String::new()
    } else {
        graph.package_name(&id.pkg_path)
    }
}

/// Uppercase the first character
#[must_use]
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caster_name() {
        let mut graph = TypeGraph::new();
        graph.add_package("example.com/app/wire", "wirepb", None);
        let key = TypePairKey::new(
            TypeId::new("example.com/app/store", "Order"),
            TypeId::new("example.com/app/wire", "Order"),
        );
        assert_eq!(caster_name(&graph, &key), "StoreOrderToWirepbOrder");
    }

    #[test]
    fn test_nested_pairs_collected_once() {
        let key = TypePairKey::new(TypeId::new("a", "Item"), TypeId::new("b", "Item"));
        let inner = Conversion {
            nested: Some(key.clone()),
            ..Conversion::leaf(
                ConversionStrategy::NestedCast,
                TypeExpr::named("a", "Item"),
                TypeExpr::named("b", "Item"),
            )
        };
        let outer = Conversion::wrapping(
            ConversionStrategy::SliceMap,
            TypeExpr::slice_of(TypeExpr::named("a", "Item")),
            TypeExpr::slice_of(TypeExpr::named("b", "Item")),
            inner,
        );
        assert_eq!(outer.nested_pairs(), vec![key]);
        assert!(!outer.has_fallback());
    }

    #[test]
    fn test_fallback_detection() {
        let conv = Conversion::wrapping(
            ConversionStrategy::PointerDeref,
            TypeExpr::pointer_to(TypeExpr::named("x", "A")),
            TypeExpr::named("y", "B"),
            Conversion::fallback(TypeExpr::named("x", "A"), TypeExpr::named("y", "B")),
        );
        assert!(conv.has_fallback());
        assert_eq!(
            conv.first_fallback().map(|c| c.target.to_string()),
            Some("y.B".to_string())
        );
    }
}
