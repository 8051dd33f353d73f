#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # caster-graph
//!
//! Type graph model and field paths for caster generation.
//!
//! The type graph is produced by an external static-analysis step and handed
//! to the planner as an immutable snapshot. This crate owns the data model of
//! that snapshot, its JSON/YAML loader, the dotted field-path notation used by
//! mapping files, and a parser for Go type text.

/// Go type text parser (`*T`, `[]T`, `[N]T`, `map[K]V`, `pkg.Name`).
pub mod go_type;
/// Type graph container, lookups, and snapshot loading.
pub mod graph;
/// Globally unique type identity.
pub mod id;
/// Dotted field paths with `[]` slice indirection.
pub mod path;
/// Type expressions and named type declarations.
pub mod types;

pub use graph::{PackageInfo, TypeGraph};
pub use id::TypeId;
pub use path::{FieldPath, PathSegment};
pub use types::{Field, Kind, TypeExpr, TypeInfo, TypeKind};

use thiserror::Error;

/// Errors that can occur when working with the type graph
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid field path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid type expression '{text}': {reason}")]
    InvalidTypeExpr { text: String, reason: String },

    #[error("Invalid type graph snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build an invalid-path error with input path and parsing reason.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build an invalid-type-expression error.
    pub fn invalid_type_expr(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTypeExpr {
            text: text.into(),
            reason: reason.into(),
        }
    }
}

/// Crate-local result type for type graph operations.
pub type Result<T> = std::result::Result<T, Error>;
