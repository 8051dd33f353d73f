//! Type reference formatting and import management
//!
//! Every named type rendered through a [`TypeFormatter`] registers its
//! package in the file's [`ImportSet`]. Types of the package being emitted
//! into, and types declared inline in the same file, render bare.

use caster_graph::{TypeExpr, TypeGraph, TypeId, id::last_segment};
use caster_plan::ParamType;
use std::collections::{BTreeMap, BTreeSet};

/// Imports of one output file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSet {
    by_path: BTreeMap<String, String>,
    by_alias: BTreeMap<String, String>,
}

impl ImportSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` and return the alias to qualify with.
    ///
    /// A path keeps the alias it was first registered with. When the
    /// preferred alias is already taken by another path a counter is
    /// appended (`model`, `model2`, ...).
    pub fn register(&mut self, path: &str, preferred: &str) -> String {
        if let Some(alias) = self.by_path.get(path) {
            return alias.clone();
        }

        let mut alias = preferred.to_string();
        let mut counter = 2;
        while self.by_alias.contains_key(&alias) {
            alias = format!("{preferred}{counter}");
            counter += 1;
        }

        self.by_path.insert(path.to_string(), alias.clone());
        self.by_alias.insert(alias.clone(), path.to_string());
        alias
    }

    /// True when nothing was registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Number of imported paths
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    /// Import specs sorted by path; the alias is written only when it
    /// differs from the final path segment
    #[must_use]
    pub fn specs(&self) -> Vec<String> {
        self.by_path
            .iter()
            .map(|(path, alias)| {
                if alias == last_segment(path) {
                    format!("\"{path}\"")
                } else {
                    format!("{alias} \"{path}\"")
                }
            })
            .collect()
    }

    /// Rendered `import` declaration, empty when there is nothing to import
    #[must_use]
    pub fn render(&self) -> String {
        let specs = self.specs();
        match specs.as_slice() {
            [] => String::new(),
            [single] => format!("import {single}\n"),
            _ => {
                let mut out = String::from("import (\n");
                for spec in specs {
                    out.push('\t');
                    out.push_str(&spec);
                    out.push('\n');
                }
                out.push_str(")\n");
                out
            }
        }
    }
}

/// Formats type expressions for one output file
#[derive(Debug, Clone)]
pub struct TypeFormatter<'a> {
    graph: &'a TypeGraph,
    current_package: Option<String>,
    local: BTreeSet<TypeId>,
    imports: ImportSet,
}

impl<'a> TypeFormatter<'a> {
    /// Formatter for a file in `current_package` (import path, when known)
    #[must_use]
    pub fn new(graph: &'a TypeGraph, current_package: Option<&str>) -> Self {
        Self {
            graph,
            current_package: current_package.map(str::to_string),
            local: BTreeSet::new(),
            imports: ImportSet::new(),
        }
    }

    /// Treat the given types as declared in the current file's package
    #[must_use]
    pub fn with_local(mut self, local: impl IntoIterator<Item = TypeId>) -> Self {
        self.local.extend(local);
        self
    }

    /// Type graph behind the formatter
    #[must_use]
    pub fn graph(&self) -> &'a TypeGraph {
        self.graph
    }

    /// Imports registered so far
    #[must_use]
    pub fn imports(&self) -> &ImportSet {
        &self.imports
    }

    /// Consume the formatter, keeping its imports
    #[must_use]
    pub fn into_imports(self) -> ImportSet {
        self.imports
    }

    /// True when `path` is the package being emitted into
    #[must_use]
    pub fn is_current(&self, path: &str) -> bool {
        self.current_package.as_deref() == Some(path)
    }

    /// Canonical text of a type expression
    pub fn format(&mut self, ty: &TypeExpr) -> String {
        match ty {
            TypeExpr::Basic(name) => name.clone(),
            TypeExpr::Named(id) => self.format_id(id),
            TypeExpr::Pointer(elem) => format!("*{}", self.format(elem)),
            TypeExpr::Slice(elem) => format!("[]{}", self.format(elem)),
            TypeExpr::Array { len, elem } => format!("[{len}]{}", self.format(elem)),
            TypeExpr::Map { key, elem } => {
                format!("map[{}]{}", self.format(key), self.format(elem))
            }
        }
    }

    /// Canonical text of a named type
    pub fn format_id(&mut self, id: &TypeId) -> String {
        if id.is_builtin() || self.local.contains(id) || self.is_current(&id.pkg_path) {
            return id.name.clone();
        }
        let alias = self.qualifier(&id.pkg_path);
        format!("{alias}.{}", id.name)
    }

    /// Parameter type; unparsed text is kept verbatim
    pub fn format_param(&mut self, ty: &ParamType) -> String {
        match ty {
            ParamType::Expr(expr) => self.format(expr),
            ParamType::Raw(text) => text.clone(),
        }
    }

    /// Function reference, qualified unless it lives in the current package
    pub fn format_func(&mut self, path: &str, func: &str) -> String {
        if self.is_current(path) {
            return func.to_string();
        }
        let alias = self.qualifier(path);
        format!("{alias}.{func}")
    }

    fn qualifier(&mut self, path: &str) -> String {
        let preferred = self.graph.package_name(path);
        self.imports.register(path, &preferred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> TypeGraph {
        let mut graph = TypeGraph::new();
        graph.add_package("example.com/app/store", "store", None);
        graph.add_package("example.com/app/wire/v2", "wirepb", None);
        graph.add_package("example.com/a/model", "model", None);
        graph.add_package("example.com/b/model", "model", None);
        graph
    }

    #[test]
    fn test_format_composites() {
        let graph = graph();
        let mut formatter = TypeFormatter::new(&graph, None);
        let ty = TypeExpr::map_of(
            TypeExpr::basic("string"),
            TypeExpr::slice_of(TypeExpr::pointer_to(TypeExpr::named(
                "example.com/app/store",
                "Item",
            ))),
        );
        assert_eq!(formatter.format(&ty), "map[string][]*store.Item");

        let array = TypeExpr::Array {
            len: "N".to_string(),
            elem: Box::new(TypeExpr::basic("byte")),
        };
        assert_eq!(formatter.format(&array), "[N]byte");
        assert_eq!(formatter.imports().specs(), vec!["\"example.com/app/store\""]);
    }

    #[test]
    fn test_alias_rendered_when_it_differs() {
        let graph = graph();
        let mut formatter = TypeFormatter::new(&graph, None);
        let text = formatter.format(&TypeExpr::named("example.com/app/wire/v2", "Order"));
        assert_eq!(text, "wirepb.Order");
        assert_eq!(
            formatter.imports().specs(),
            vec!["wirepb \"example.com/app/wire/v2\""]
        );
    }

    #[test]
    fn test_current_package_and_local_types_render_bare() {
        let graph = graph();
        let mut formatter = TypeFormatter::new(&graph, Some("example.com/app/store"))
            .with_local([TypeId::new("example.com/app/dto", "Summary")]);
        assert_eq!(
            formatter.format(&TypeExpr::named("example.com/app/store", "Order")),
            "Order"
        );
        assert_eq!(
            formatter.format(&TypeExpr::named("example.com/app/dto", "Summary")),
            "Summary"
        );
        assert!(formatter.imports().is_empty());
        assert_eq!(
            formatter.format_func("example.com/app/store", "Join"),
            "Join"
        );
    }

    #[test]
    fn test_alias_collision_renamed() {
        let graph = graph();
        let mut formatter = TypeFormatter::new(&graph, None);
        assert_eq!(
            formatter.format(&TypeExpr::named("example.com/a/model", "User")),
            "model.User"
        );
        assert_eq!(
            formatter.format(&TypeExpr::named("example.com/b/model", "User")),
            "model2.User"
        );
        assert_eq!(
            formatter.imports().render(),
            "import (\n\t\"example.com/a/model\"\n\tmodel2 \"example.com/b/model\"\n)\n"
        );
    }
}
