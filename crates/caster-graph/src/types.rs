//! Type expressions and named type declarations

use crate::id::{TypeId, last_segment};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural type expression as it appears at a field or element position.
///
/// Named types are referenced by identity and looked up in the graph, which
/// keeps recursive struct shapes finite.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeExpr {
    /// Predeclared type (`int`, `string`, `bool`, `any`, ...)
    Basic(String),

    /// Reference to a named type in the graph
    Named(TypeId),

    /// `*T`
    Pointer(Box<TypeExpr>),

    /// `[]T`
    Slice(Box<TypeExpr>),

    /// `[N]T`; `len` keeps the declared length text verbatim
    Array { len: String, elem: Box<TypeExpr> },

    /// `map[K]V`
    Map {
        key: Box<TypeExpr>,
        elem: Box<TypeExpr>,
    },
}

impl TypeExpr {
    /// Predeclared type by name
    pub fn basic(name: impl Into<String>) -> Self {
        Self::Basic(name.into())
    }

    /// Named type reference
    pub fn named(pkg_path: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Named(TypeId::new(pkg_path, name))
    }

    /// `*inner`
    #[must_use]
    pub fn pointer_to(inner: TypeExpr) -> Self {
        Self::Pointer(Box::new(inner))
    }

    /// `[]inner`
    #[must_use]
    pub fn slice_of(inner: TypeExpr) -> Self {
        Self::Slice(Box::new(inner))
    }

    /// `map[key]elem`
    #[must_use]
    pub fn map_of(key: TypeExpr, elem: TypeExpr) -> Self {
        Self::Map {
            key: Box::new(key),
            elem: Box::new(elem),
        }
    }

    /// Element type of a pointer, slice, array, or map
    #[must_use]
    pub fn elem(&self) -> Option<&TypeExpr> {
        match self {
            Self::Pointer(elem) | Self::Slice(elem) => Some(elem),
            Self::Array { elem, .. } | Self::Map { elem, .. } => Some(elem),
            Self::Basic(_) | Self::Named(_) => None,
        }
    }

    /// Identity when this is a named type reference
    #[must_use]
    pub fn named_id(&self) -> Option<&TypeId> {
        match self {
            Self::Named(id) => Some(id),
            _ => None,
        }
    }

    /// True for `*T`
    #[must_use]
    pub fn is_pointer(&self) -> bool {
        matches!(self, Self::Pointer(_))
    }

    /// True for `[]T` and `[N]T`
    #[must_use]
    pub fn is_sequence(&self) -> bool {
        matches!(self, Self::Slice(_) | Self::Array { .. })
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic(name) => write!(f, "{name}"),
            Self::Named(id) if id.is_builtin() => write!(f, "{}", id.name),
            Self::Named(id) => write!(f, "{}.{}", last_segment(&id.pkg_path), id.name),
            Self::Pointer(elem) => write!(f, "*{elem}"),
            Self::Slice(elem) => write!(f, "[]{elem}"),
            Self::Array { len, elem } => write!(f, "[{len}]{elem}"),
            Self::Map { key, elem } => write!(f, "map[{key}]{elem}"),
        }
    }
}

/// A struct field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field name
    pub name: String,

    /// Whether the field is visible outside its package
    pub exported: bool,

    /// Field type
    #[serde(rename = "type")]
    pub ty: TypeExpr,

    /// Declaration position within the struct
    pub index: usize,
}

impl Field {
    /// Create a field; exportedness follows the Go capitalization rule
    pub fn new(name: impl Into<String>, ty: TypeExpr, index: usize) -> Self {
        let name = name.into();
        let exported = is_exported(&name);
        Self {
            name,
            exported,
            ty,
            index,
        }
    }
}

/// Go exportedness: first character is an uppercase letter
#[must_use]
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

/// Declaration body of a named type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeKind {
    /// Named basic type known only by name
    Basic,

    /// Struct with ordered fields
    Struct {
        #[serde(default)]
        fields: Vec<Field>,
    },

    /// Opaque type from outside the analysed packages
    External,

    /// Named type defined over another type (`type Status string`)
    Alias { underlying: TypeExpr },
}

/// A named type in the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    /// Identity
    pub id: TypeId,

    /// Declaration body
    #[serde(flatten)]
    pub kind: TypeKind,

    /// Type the generator must synthesize because it does not exist yet
    #[serde(default)]
    pub is_generated: bool,
}

impl TypeInfo {
    /// Create a struct type
    #[must_use]
    pub fn structure(id: TypeId, fields: Vec<Field>) -> Self {
        Self {
            id,
            kind: TypeKind::Struct { fields },
            is_generated: false,
        }
    }

    /// Create an alias type
    #[must_use]
    pub fn alias(id: TypeId, underlying: TypeExpr) -> Self {
        Self {
            id,
            kind: TypeKind::Alias { underlying },
            is_generated: false,
        }
    }

    /// Create an external type
    #[must_use]
    pub fn external(id: TypeId) -> Self {
        Self {
            id,
            kind: TypeKind::External,
            is_generated: false,
        }
    }

    /// Struct fields, if this is a struct
    #[must_use]
    pub fn fields(&self) -> Option<&[Field]> {
        match &self.kind {
            TypeKind::Struct { fields } => Some(fields),
            _ => None,
        }
    }

    /// Find a struct field by name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields()?.iter().find(|f| f.name == name)
    }

    /// True for struct types
    #[must_use]
    pub fn is_struct(&self) -> bool {
        matches!(self.kind, TypeKind::Struct { .. })
    }
}

/// Classification of any type expression into the eight structural kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Basic,
    Struct,
    Pointer,
    Slice,
    Array,
    Map,
    External,
    Alias,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Basic => "basic",
            Self::Struct => "struct",
            Self::Pointer => "pointer",
            Self::Slice => "slice",
            Self::Array => "array",
            Self::Map => "map",
            Self::External => "external",
            Self::Alias => "alias",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_expr_display() {
        let ty = TypeExpr::map_of(
            TypeExpr::basic("string"),
            TypeExpr::slice_of(TypeExpr::pointer_to(TypeExpr::named(
                "example.com/app/store",
                "Item",
            ))),
        );
        assert_eq!(ty.to_string(), "map[string][]*store.Item");

        let arr = TypeExpr::Array {
            len: "4".to_string(),
            elem: Box::new(TypeExpr::basic("byte")),
        };
        assert_eq!(arr.to_string(), "[4]byte");
    }

    #[test]
    fn test_field_exportedness() {
        assert!(Field::new("ID", TypeExpr::basic("int"), 0).exported);
        assert!(!Field::new("secret", TypeExpr::basic("int"), 1).exported);
    }

    #[test]
    fn test_type_info_field_lookup() {
        let info = TypeInfo::structure(
            TypeId::new("store", "Order"),
            vec![
                Field::new("ID", TypeExpr::basic("int"), 0),
                Field::new("Total", TypeExpr::basic("float64"), 1),
            ],
        );
        assert!(info.is_struct());
        assert_eq!(info.field("Total").map(|f| f.index), Some(1));
        assert!(info.field("Missing").is_none());
    }
}
