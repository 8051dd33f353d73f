//! Go type text parser
//!
//! Mapping files spell extra parameter types and transform result types as Go
//! source text. Parsing them into [`TypeExpr`] lets the emitter format them
//! consistently and register their imports.

use crate::graph::TypeGraph;
use crate::id::TypeId;
use crate::types::TypeExpr;
use crate::{Error, Result};

/// Predeclared Go type names
pub const PREDECLARED: &[&str] = &[
    "any",
    "bool",
    "byte",
    "complex64",
    "complex128",
    "error",
    "float32",
    "float64",
    "int",
    "int8",
    "int16",
    "int32",
    "int64",
    "rune",
    "string",
    "uint",
    "uint8",
    "uint16",
    "uint32",
    "uint64",
    "uintptr",
];

/// True for a predeclared Go type name
#[must_use]
pub fn is_predeclared(name: &str) -> bool {
    PREDECLARED.contains(&name)
}

impl TypeExpr {
    /// Parse Go type text, resolving package qualifiers through the graph.
    ///
    /// Unqualified non-predeclared names become named types with an empty
    /// package path (types of the package being generated into).
    pub fn parse_go(text: &str, graph: &TypeGraph) -> Result<Self> {
        let trimmed = text.trim();
        let mut parser = Parser {
            text: trimmed,
            pos: 0,
            graph,
        };
        let ty = parser.parse_type()?;
        if parser.pos != trimmed.len() {
            return Err(Error::invalid_type_expr(
                trimmed,
                format!("unexpected trailing input '{}'", &trimmed[parser.pos..]),
            ));
        }
        Ok(ty)
    }
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    graph: &'a TypeGraph,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::invalid_type_expr(self.text, reason)
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn parse_type(&mut self) -> Result<TypeExpr> {
        if self.eat("*") {
            return Ok(TypeExpr::pointer_to(self.parse_type()?));
        }
        if self.eat("[]") {
            return Ok(TypeExpr::slice_of(self.parse_type()?));
        }
        if self.eat("[") {
            let end = self
                .rest()
                .find(']')
                .ok_or_else(|| self.error("unterminated array length"))?;
            let len = self.rest()[..end].trim().to_string();
            if len.is_empty() {
                return Err(self.error("empty array length"));
            }
            self.pos += end + 1;
            let elem = self.parse_type()?;
            return Ok(TypeExpr::Array {
                len,
                elem: Box::new(elem),
            });
        }
        if self.eat("map[") {
            let key = self.parse_type()?;
            if !self.eat("]") {
                return Err(self.error("expected ']' after map key"));
            }
            let elem = self.parse_type()?;
            return Ok(TypeExpr::map_of(key, elem));
        }
        if self.eat("interface{}") {
            return Ok(TypeExpr::basic("any"));
        }
        self.parse_name()
    }

    fn parse_name(&mut self) -> Result<TypeExpr> {
        let rest = self.rest();
        let end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.' || c == '/' || c == '-'))
            .unwrap_or(rest.len());
        let name = &rest[..end];
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(self.error(format!("expected type name at '{rest}'")));
        }
        self.pos += end;

        if is_predeclared(name) {
            return Ok(TypeExpr::basic(name));
        }
        if name.contains('.') {
            return Ok(TypeExpr::Named(self.graph.resolve_ident(name)));
        }
        Ok(TypeExpr::Named(TypeId::builtin(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> TypeGraph {
        let mut graph = TypeGraph::new();
        graph.add_package("example.com/app/store", "store", None);
        graph
    }

    #[test]
    fn test_parse_composites() {
        let graph = graph();
        let ty = TypeExpr::parse_go("map[string][]*store.Item", &graph).unwrap();
        assert_eq!(
            ty,
            TypeExpr::map_of(
                TypeExpr::basic("string"),
                TypeExpr::slice_of(TypeExpr::pointer_to(TypeExpr::named(
                    "example.com/app/store",
                    "Item"
                )))
            )
        );
    }

    #[test]
    fn test_parse_name_then_continue() {
        let graph = graph();
        let ty = TypeExpr::parse_go("map[store.Key]*store.Item", &graph).unwrap();
        assert_eq!(
            ty,
            TypeExpr::map_of(
                TypeExpr::named("example.com/app/store", "Key"),
                TypeExpr::pointer_to(TypeExpr::named("example.com/app/store", "Item"))
            )
        );
        assert!(TypeExpr::parse_go("store.Item]", &graph).is_err());
    }

    #[test]
    fn test_parse_array_keeps_length_text() {
        let ty = TypeExpr::parse_go("[MaxTags]string", &graph()).unwrap();
        assert_eq!(
            ty,
            TypeExpr::Array {
                len: "MaxTags".to_string(),
                elem: Box::new(TypeExpr::basic("string")),
            }
        );
    }

    #[test]
    fn test_parse_unknown_qualifier_kept() {
        let ty = TypeExpr::parse_go("*time.Location", &graph()).unwrap();
        assert_eq!(ty, TypeExpr::pointer_to(TypeExpr::named("time", "Location")));
    }

    #[test]
    fn test_parse_interface_and_local() {
        assert_eq!(
            TypeExpr::parse_go("interface{}", &graph()).unwrap(),
            TypeExpr::basic("any")
        );
        assert_eq!(
            TypeExpr::parse_go("Config", &graph()).unwrap(),
            TypeExpr::Named(TypeId::builtin("Config"))
        );
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "[]", "map[string", "[3", "int extra", "func()"] {
            assert!(
                TypeExpr::parse_go(bad, &graph()).is_err(),
                "expected '{bad}' to fail"
            );
        }
    }
}
