//! Type graph container and snapshot loading

use crate::id::{TypeId, last_segment};
use crate::types::{Field, Kind, TypeExpr, TypeInfo, TypeKind, is_exported};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Package metadata recorded by the analysis step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Short package name as written in its `package` clause
    pub name: String,

    /// Physical directory of the package, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// Immutable snapshot of every named type and package the planner may see.
///
/// Ordered maps keep iteration deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeGraph {
    types: BTreeMap<TypeId, TypeInfo>,
    packages: BTreeMap<String, PackageInfo>,
}

/// Serializable snapshot format
#[derive(Debug, Deserialize)]
struct GraphFile {
    #[serde(default)]
    packages: BTreeMap<String, PackageFile>,
    #[serde(default)]
    types: Vec<TypeFile>,
}

#[derive(Debug, Deserialize)]
struct PackageFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct TypeFile {
    id: TypeId,
    #[serde(flatten)]
    kind: KindFile,
    #[serde(default)]
    is_generated: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum KindFile {
    Basic,
    Struct {
        #[serde(default)]
        fields: Vec<FieldFile>,
    },
    External,
    Alias {
        underlying: TypeExpr,
    },
}

#[derive(Debug, Deserialize)]
struct FieldFile {
    name: String,
    #[serde(default)]
    exported: Option<bool>,
    #[serde(rename = "type")]
    ty: TypeExpr,
    #[serde(default)]
    index: Option<usize>,
}

impl TypeGraph {
    /// Create an empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a named type
    pub fn insert(&mut self, info: TypeInfo) -> &mut Self {
        self.types.insert(info.id.clone(), info);
        self
    }

    /// Record a package; `dir` is the physical location when known
    pub fn add_package(
        &mut self,
        path: impl Into<String>,
        name: impl Into<String>,
        dir: Option<PathBuf>,
    ) -> &mut Self {
        self.packages.insert(
            path.into(),
            PackageInfo {
                name: name.into(),
                dir,
            },
        );
        self
    }

    /// Get a named type by identity
    #[must_use]
    pub fn get(&self, id: &TypeId) -> Option<&TypeInfo> {
        self.types.get(id)
    }

    /// Look up a type by its mapping-file identifier (`pkg.Name`)
    #[must_use]
    pub fn lookup(&self, ident: &str) -> Option<&TypeInfo> {
        self.get(&self.resolve_ident(ident))
    }

    /// All named types in identity order
    pub fn types(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.values()
    }

    /// All packages in path order
    pub fn packages(&self) -> impl Iterator<Item = (&str, &PackageInfo)> {
        self.packages.iter().map(|(path, info)| (path.as_str(), info))
    }

    /// Number of named types
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True when the graph has no types
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Package metadata by import path
    #[must_use]
    pub fn package(&self, path: &str) -> Option<&PackageInfo> {
        self.packages.get(path)
    }

    /// Short name used to qualify types of a package.
    ///
    /// The recorded package name wins; otherwise the final path segment.
    #[must_use]
    pub fn package_name(&self, path: &str) -> String {
        self.packages
            .get(path)
            .map_or_else(|| last_segment(path).to_string(), |p| p.name.clone())
    }

    /// Resolve a package qualifier to an import path.
    ///
    /// Accepts a full import path, a recorded short name, or a final path
    /// segment. Returns `None` when no recorded package matches.
    #[must_use]
    pub fn resolve_package(&self, qualifier: &str) -> Option<&str> {
        if let Some((path, _)) = self.packages.get_key_value(qualifier) {
            return Some(path.as_str());
        }
        if let Some((path, _)) = self.packages.iter().find(|(_, p)| p.name == qualifier) {
            return Some(path.as_str());
        }
        self.packages
            .keys()
            .find(|path| last_segment(path) == qualifier)
            .map(String::as_str)
    }

    /// Turn a mapping-file identifier into a type identity.
    ///
    /// The identifier is split at its final `.`; the qualifier is resolved
    /// through [`Self::resolve_package`] and kept verbatim when unknown.
    #[must_use]
    pub fn resolve_ident(&self, ident: &str) -> TypeId {
        let ident = ident.trim();
        match ident.rsplit_once('.') {
            Some((qualifier, name)) => {
                let pkg = self
                    .resolve_package(qualifier)
                    .map_or_else(|| qualifier.to_string(), str::to_string);
                TypeId::new(pkg, name)
            }
            None => TypeId::builtin(ident),
        }
    }

    /// Classify a type expression into one of the eight structural kinds
    #[must_use]
    pub fn kind_of(&self, ty: &TypeExpr) -> Kind {
        match ty {
            TypeExpr::Basic(_) => Kind::Basic,
            TypeExpr::Pointer(_) => Kind::Pointer,
            TypeExpr::Slice(_) => Kind::Slice,
            TypeExpr::Array { .. } => Kind::Array,
            TypeExpr::Map { .. } => Kind::Map,
            TypeExpr::Named(id) => match self.get(id).map(|info| &info.kind) {
                Some(TypeKind::Struct { .. }) => Kind::Struct,
                Some(TypeKind::Alias { .. }) => Kind::Alias,
                Some(TypeKind::Basic) => Kind::Basic,
                Some(TypeKind::External) | None => Kind::External,
            },
        }
    }

    /// Follow named aliases down to their structural underlying type.
    ///
    /// Alias chains longer than the graph are treated as cyclic and stop.
    #[must_use]
    pub fn underlying<'a>(&'a self, ty: &'a TypeExpr) -> &'a TypeExpr {
        let mut current = ty;
        for _ in 0..=self.types.len() {
            match current {
                TypeExpr::Named(id) => match self.get(id).map(|info| &info.kind) {
                    Some(TypeKind::Alias { underlying }) => current = underlying,
                    _ => return current,
                },
                _ => return current,
            }
        }
        current
    }

    /// Struct declaration behind a type expression, following aliases
    #[must_use]
    pub fn struct_of(&self, ty: &TypeExpr) -> Option<&TypeInfo> {
        let id = self.underlying(ty).named_id()?;
        self.get(id).filter(|info| info.is_struct())
    }

    /// Load a snapshot from a file, picking the format by extension
    pub fn load_file(path: &Path) -> Result<Self> {
        trace!("Loading type graph from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;

        if path
            .extension()
            .is_some_and(|e| e == "yaml" || e == "yml")
        {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    /// Load a snapshot from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let file: GraphFile = serde_json::from_str(json)
            .map_err(|e| Error::InvalidSnapshot(format!("JSON parse error: {e}")))?;
        Ok(Self::from_file(file))
    }

    /// Load a snapshot from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: GraphFile = serde_yaml::from_str(yaml)
            .map_err(|e| Error::InvalidSnapshot(format!("YAML parse error: {e}")))?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: GraphFile) -> Self {
        let mut graph = Self::new();

        for (path, package) in file.packages {
            let name = package
                .name
                .unwrap_or_else(|| last_segment(&path).to_string());
            graph.add_package(path, name, package.dir);
        }

        for ty in file.types {
            let kind = match ty.kind {
                KindFile::Basic => TypeKind::Basic,
                KindFile::External => TypeKind::External,
                KindFile::Alias { underlying } => TypeKind::Alias { underlying },
                KindFile::Struct { fields } => TypeKind::Struct {
                    fields: fields
                        .into_iter()
                        .enumerate()
                        .map(|(position, f)| Field {
                            exported: f.exported.unwrap_or_else(|| is_exported(&f.name)),
                            index: f.index.unwrap_or(position),
                            name: f.name,
                            ty: f.ty,
                        })
                        .collect(),
                },
            };
            graph.insert(TypeInfo {
                id: ty.id,
                kind,
                is_generated: ty.is_generated,
            });
        }

        debug!(
            types = graph.types.len(),
            packages = graph.packages.len(),
            "Loaded type graph snapshot"
        );
        graph
    }
}
