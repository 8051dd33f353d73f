#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # caster-emit
//!
//! Deterministic Go emitter for resolved caster plans.
//!
//! Every [`ResolvedTypePair`](caster_plan::ResolvedTypePair) becomes one
//! caster file. The emitter orders assignments by their dependencies,
//! renders each strategy into Go statements, manages imports per file, and
//! produces stubs for transforms and types the plan references but cannot
//! find. The same plan always yields byte-identical files in the same order,
//! whether pairs are compiled sequentially or in parallel.
//!
//! ```no_run
//! use caster_emit::{EmitOptions, emit};
//! # fn run(plan: &caster_plan::ResolvedMappingPlan<'_>) {
//! let (files, diagnostics) = emit(plan, &EmitOptions::default());
//! for file in &files {
//!     println!("{}", file.path.display());
//! }
//! # let _ = diagnostics;
//! # }
//! ```

pub mod canonicalize;
pub mod compile;
pub mod emitter;
pub mod imports;
pub mod order;
pub mod render;

pub use canonicalize::{Canonicalizer, CommandCanonicalizer, PassThrough};
pub use compile::{CodeWriter, CompiledPair, MissingTransform, PairCompiler};
pub use emitter::{
    EmitOptions, Emitter, GeneratedFile, MISSING_TRANSFORMS_FILE, MISSING_TYPES_FILE,
    MissingTransforms, emit, emit_parallel,
};
pub use imports::{ImportSet, TypeFormatter};
pub use order::{CycleError, topo_sort};
pub use render::DEFAULT_HEADER;

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while producing output text
#[derive(Error, Debug)]
pub enum Error {
    #[error("Canonicalization of {path} failed: {message}")]
    Canonicalize { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a canonicalization error for `path`
    pub fn canonicalize(path: &Path, message: impl Into<String>) -> Self {
        Self::Canonicalize {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
