//! Transform registry
//!
//! Resolves transform names referenced by field mappings against the
//! document's `transforms` declarations.

use crate::dsl::TransformDef;
use std::collections::BTreeMap;
use tracing::warn;

/// How a referenced transform name resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformRef<'a> {
    /// `alias.Func`, called verbatim
    Qualified { qualifier: &'a str, func: &'a str },

    /// Bare name with a declaration
    Declared(&'a TransformDef),

    /// Bare name with no declaration; needs a stub
    Missing(&'a str),
}

/// Declared transforms keyed by name
#[derive(Debug, Clone, Default)]
pub struct TransformRegistry {
    defs: BTreeMap<String, TransformDef>,
    duplicates: Vec<String>,
}

impl TransformRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry; later duplicates are dropped and recorded
    #[must_use]
    pub fn from_defs(defs: &[TransformDef]) -> Self {
        let mut registry = Self::new();
        for def in defs {
            registry.register(def.clone());
        }
        registry
    }

    /// Register a declaration. Returns false for a duplicate name.
    pub fn register(&mut self, def: TransformDef) -> bool {
        if self.defs.contains_key(&def.name) {
            warn!("Duplicate transform declaration: {}", def.name);
            self.duplicates.push(def.name);
            return false;
        }
        self.defs.insert(def.name.clone(), def);
        true
    }

    /// Declaration by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TransformDef> {
        self.defs.get(name)
    }

    /// Names declared more than once, in declaration order
    #[must_use]
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// Declarations in name order
    pub fn iter(&self) -> impl Iterator<Item = &TransformDef> {
        self.defs.values()
    }

    /// Number of distinct declarations
    #[must_use]
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// True when nothing is declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Classify a referenced name
    #[must_use]
    pub fn resolve<'a>(&'a self, name: &'a str) -> TransformRef<'a> {
        if let Some(def) = self.defs.get(name) {
            return TransformRef::Declared(def);
        }
        match name.rsplit_once('.') {
            Some((qualifier, func)) if !qualifier.is_empty() && !func.is_empty() => {
                TransformRef::Qualified { qualifier, func }
            }
            _ => TransformRef::Missing(name),
        }
    }
}
