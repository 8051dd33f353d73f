#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # caster-plan
//!
//! Mapping resolution engine.
//!
//! Combines a mapping document with a type graph snapshot and produces a
//! [`ResolvedMappingPlan`]: one [`ResolvedTypePair`] per declared type
//! mapping plus every nested pair those mappings need, each assignment
//! annotated with the conversion strategy the emitter renders.
//!
//! ```no_run
//! use caster_plan::plan;
//! # fn run(graph: &caster_graph::TypeGraph, mapping: &caster_mapping::MappingFile) {
//! let (resolved, diagnostics) = plan(graph, mapping);
//! for diagnostic in diagnostics.errors() {
//!     eprintln!("{diagnostic}");
//! }
//! # let _ = resolved;
//! # }
//! ```

pub mod diagnostics;
pub mod ident;
pub mod model;
pub mod planner;
pub mod resolve;
pub mod strategy;
mod synth;

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, RunStatus, Severity};
pub use ident::{
    MatchOutcome, match_ident, normalize_ident, normalize_ident_with_suffix_strip,
    tokenize_camel_case,
};
pub use model::{
    Callee, Conversion, ConversionStrategy, ExtraValue, MappingOrigin, PairOrigin, ParamType,
    Projection, ResolvedExtra, ResolvedFieldMapping, ResolvedMappingPlan, ResolvedRequire,
    ResolvedTypePair, TransformCall, TypePairKey, TypeScope, UnmappedTarget, capitalize,
    caster_name,
};
pub use planner::{Planner, plan};
pub use strategy::StrategySelector;
pub use synth::literal_type;

use caster_graph::TypeGraph;
use caster_mapping::{MappingDsl, MappingFile};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors raised while loading planner inputs
#[derive(Error, Debug)]
pub enum Error {
    #[error("Type graph error: {0}")]
    Graph(#[from] caster_graph::Error),

    #[error("Mapping error: {0}")]
    Mapping(#[from] caster_mapping::Error),
}

impl From<caster_mapping::ParseError> for Error {
    fn from(err: caster_mapping::ParseError) -> Self {
        Self::Mapping(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Load a type graph snapshot and a mapping document from disk
///
/// # Errors
///
/// Returns an error when either file cannot be read or parsed.
pub fn load_inputs(types: &Path, mapping: &Path) -> Result<(TypeGraph, MappingFile)> {
    info!("Loading type graph {} and mapping {}", types.display(), mapping.display());
    let graph = TypeGraph::load_file(types)?;
    let file = MappingDsl::parse_file(mapping)?;
    Ok((graph, file))
}
