//! # caster-mapping
//!
//! Mapping document model and YAML loader.
//!
//! A mapping document declares, per source/target type pair, which fields
//! feed which, through which transforms, with which defaults. The documents
//! are plain data; path syntax and type references are checked later by the
//! planner so that one bad entry never hides the rest.

pub mod dsl;
pub mod refs;
pub mod transforms;

pub use dsl::{
    ExtraArg, ExtraDef, FieldMapping, MappingDsl, MappingFile, OneToOne, ParseError,
    RequiredArg, TransformDef, TypeMapping,
};
pub use refs::{FieldRef, FieldRefArray, Hint};
pub use transforms::{TransformRef, TransformRegistry};

use thiserror::Error;

/// Errors that can occur while loading mappings
#[derive(Error, Debug)]
pub enum Error {
    #[error("DSL parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Duplicate transform '{0}'")]
    DuplicateTransform(String),
}

pub type Result<T> = std::result::Result<T, Error>;
