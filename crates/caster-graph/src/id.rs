//! Type identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Globally unique identity of a named type: import path plus type name.
///
/// Builtin and predeclared types carry an empty `pkg_path`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeId {
    /// Full import path of the declaring package
    #[serde(default)]
    pub pkg_path: String,

    /// Type name as declared
    pub name: String,
}

impl TypeId {
    /// Create a new type identity
    pub fn new(pkg_path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            pkg_path: pkg_path.into(),
            name: name.into(),
        }
    }

    /// Identity of a predeclared type such as `int` or `error`
    pub fn builtin(name: impl Into<String>) -> Self {
        Self::new(String::new(), name)
    }

    /// True when the type has no declaring package
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.pkg_path.is_empty()
    }

    /// Final segment of the import path (`example.com/app/store` -> `store`)
    #[must_use]
    pub fn pkg_last_segment(&self) -> &str {
        last_segment(&self.pkg_path)
    }
}

/// Final `/`-separated segment of an import path.
#[must_use]
pub fn last_segment(pkg_path: &str) -> &str {
    pkg_path.rsplit('/').next().unwrap_or(pkg_path)
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pkg_path.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.pkg_path, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_segment() {
        let id = TypeId::new("example.com/app/store", "Order");
        assert_eq!(id.to_string(), "example.com/app/store.Order");
        assert_eq!(id.pkg_last_segment(), "store");

        let builtin = TypeId::builtin("error");
        assert!(builtin.is_builtin());
        assert_eq!(builtin.to_string(), "error");
    }

    #[test]
    fn test_ordering_is_path_then_name() {
        let mut ids = vec![
            TypeId::new("b", "A"),
            TypeId::new("a", "Z"),
            TypeId::new("a", "B"),
        ];
        ids.sort();
        assert_eq!(ids[0], TypeId::new("a", "B"));
        assert_eq!(ids[2], TypeId::new("b", "A"));
    }
}
