//! Plan-to-files emission
//!
//! Emission runs in two phases. Every pair is compiled on its own into a
//! [`CompiledPair`], optionally on worker threads. Missing transforms are
//! gathered in a concurrent registry and merged in pair order, then files
//! are rendered, canonicalized and sorted by path.

use crate::canonicalize::{Canonicalizer, PassThrough};
use crate::compile::{CompiledPair, MissingTransform, PairCompiler};
use crate::imports::TypeFormatter;
use crate::render::{DEFAULT_HEADER, render_pair, render_stub_file, render_type_file};
use caster_graph::{TypeGraph, TypeId, TypeInfo};
use caster_plan::{DiagnosticKind, Diagnostics, ResolvedMappingPlan, ResolvedTypePair};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared stub file name
pub const MISSING_TRANSFORMS_FILE: &str = "missing_transforms.go";
/// Per-package synthesized type file name
pub const MISSING_TYPES_FILE: &str = "missing_types.go";

/// Where stubs for missing transforms are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingTransforms {
    /// One `missing_transforms.go` holding every stub, sorted by name
    #[default]
    Shared,
    /// Each stub trails the first caster file referencing it
    PerPair,
}

/// Emitter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitOptions {
    /// Package clause of caster files
    pub package_name: String,
    /// Import path of the package casters are emitted into
    pub package_path: Option<String>,
    /// First line(s) of every file
    pub header: String,
    pub missing_transforms: MissingTransforms,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            package_name: "casters".to_string(),
            package_path: None,
            header: DEFAULT_HEADER.to_string(),
            missing_transforms: MissingTransforms::Shared,
        }
    }
}

/// One output file, path relative to the output root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: String,
}

impl GeneratedFile {
    fn new(path: impl Into<PathBuf>, contents: String) -> Self {
        Self {
            path: path.into(),
            contents,
        }
    }
}

/// Missing transforms reported by concurrently compiled pairs
#[derive(Debug, Default)]
struct MissingRegistry {
    entries: DashMap<String, Vec<(usize, MissingTransform)>>,
}

impl MissingRegistry {
    fn record(&self, index: usize, missing: &[MissingTransform]) {
        for transform in missing {
            self.entries
                .entry(transform.name.clone())
                .or_default()
                .push((index, transform.clone()));
        }
    }

    /// First reference of every name, sorted by name, with its owning pair
    fn merge(self, diagnostics: &mut Diagnostics) -> Vec<(usize, MissingTransform)> {
        let sorted: BTreeMap<String, Vec<(usize, MissingTransform)>> =
            self.entries.into_iter().collect();

        sorted
            .into_values()
            .filter_map(|mut references| {
                references.sort_by_key(|(index, _)| *index);
                let mut iter = references.into_iter();
                let (owner, first) = iter.next()?;
                if iter.any(|(_, other)| other != first) {
                    diagnostics.add_warning(
                        DiagnosticKind::Reference,
                        "transforms",
                        None,
                        format!(
                            "transform '{}' is referenced with different signatures; stub uses the first",
                            first.name
                        ),
                    );
                }
                Some((owner, first))
            })
            .collect()
    }
}

/// Per-run layout decided before compiling
struct Layout {
    /// Caster file name per pair
    file_names: Vec<String>,
    /// Generated type declared inline, per pair index
    inline: BTreeMap<usize, TypeId>,
    /// Types declared inline somewhere; rendered bare everywhere
    local: BTreeSet<TypeId>,
    /// Types deferred to a package's `missing_types.go`, by directory
    deferred: BTreeMap<PathBuf, (String, Vec<TypeId>)>,
}

impl Layout {
    fn new(plan: &ResolvedMappingPlan<'_>) -> Self {
        let graph = plan.graph();
        let mut inline = BTreeMap::new();
        let mut local = BTreeSet::new();
        let mut deferred: BTreeMap<PathBuf, (String, Vec<TypeId>)> = BTreeMap::new();

        for id in plan.generated_types.keys() {
            let dir = graph
                .package(&id.pkg_path)
                .and_then(|package| package.dir.clone());
            if let Some(dir) = dir {
                deferred
                    .entry(dir)
                    .or_insert_with(|| (id.pkg_path.clone(), Vec::new()))
                    .1
                    .push(id.clone());
                continue;
            }
            if let Some(index) = plan.pairs.iter().position(|p| &p.key.target == id) {
                inline.insert(index, id.clone());
                local.insert(id.clone());
            }
        }

        Self {
            file_names: file_names(graph, &plan.pairs),
            inline,
            local,
            deferred,
        }
    }
}

/// `<srcpkg>_<srctype>_to_<tgtpkg>_<tgttype>.go`, lowercase, with
/// collisions suffixed `_2`, `_3`, ...
fn file_names(graph: &TypeGraph, pairs: &[ResolvedTypePair]) -> Vec<String> {
    let mut used: BTreeMap<String, usize> = BTreeMap::new();
    pairs
        .iter()
        .map(|pair| {
            let base = format!(
                "{}_{}_to_{}_{}",
                graph.package_name(&pair.key.source.pkg_path),
                pair.key.source.name,
                graph.package_name(&pair.key.target.pkg_path),
                pair.key.target.name
            )
            .to_lowercase();
            let count = used.entry(base.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                format!("{base}.go")
            } else {
                format!("{base}_{count}.go")
            }
        })
        .collect()
}

/// Emits Go files for a resolved plan
pub struct Emitter {
    options: EmitOptions,
    canonicalizer: Arc<dyn Canonicalizer>,
}

impl Emitter {
    /// Emitter with a pass-through canonicalizer
    #[must_use]
    pub fn new(options: EmitOptions) -> Self {
        Self {
            options,
            canonicalizer: Arc::new(PassThrough),
        }
    }

    /// Canonicalize rendered files with `canonicalizer`
    #[must_use]
    pub fn with_canonicalizer(mut self, canonicalizer: impl Canonicalizer + 'static) -> Self {
        self.canonicalizer = Arc::new(canonicalizer);
        self
    }

    /// Options in use
    #[must_use]
    pub fn options(&self) -> &EmitOptions {
        &self.options
    }

    /// Compile and render every pair on the calling thread
    #[must_use]
    pub fn emit(&self, plan: &ResolvedMappingPlan<'_>) -> (Vec<GeneratedFile>, Diagnostics) {
        self.emit_parallel(plan, 1)
    }

    /// Compile pairs on up to `jobs` scoped worker threads.
    ///
    /// Output is identical to [`Emitter::emit`] for any `jobs`.
    #[must_use]
    pub fn emit_parallel(
        &self,
        plan: &ResolvedMappingPlan<'_>,
        jobs: usize,
    ) -> (Vec<GeneratedFile>, Diagnostics) {
        info!(
            "Emitting {} caster(s) into package {}",
            plan.pairs.len(),
            self.options.package_name
        );

        let layout = Layout::new(plan);
        let registry = MissingRegistry::default();
        let mut compiled = self.compile_all(plan, &layout, &registry, jobs.max(1));
        compiled.sort_by_key(|pair| pair.index);

        let mut diagnostics = Diagnostics::new();
        for pair in &compiled {
            diagnostics.extend(pair.diagnostics.clone());
        }
        let missing = registry.merge(&mut diagnostics);

        let mut files = Vec::new();
        let header = self.options.header.as_str();
        let package = self.options.package_name.as_str();

        for pair in compiled {
            let index = pair.index;
            let stubs: Vec<MissingTransform> = match self.options.missing_transforms {
                MissingTransforms::PerPair => missing
                    .iter()
                    .filter(|(owner, _)| *owner == index)
                    .map(|(_, stub)| stub.clone())
                    .collect(),
                MissingTransforms::Shared => Vec::new(),
            };
            let inline_type = pair
                .inline_type
                .as_ref()
                .and_then(|id| plan.generated_types.get(id));
            let text = render_pair(pair, header, package, inline_type, &stubs);
            files.push(GeneratedFile::new(&layout.file_names[index], text));
        }

        if self.options.missing_transforms == MissingTransforms::Shared && !missing.is_empty() {
            let stubs: Vec<MissingTransform> =
                missing.into_iter().map(|(_, stub)| stub).collect();
            let formatter = self.formatter(plan.graph(), &layout);
            files.push(GeneratedFile::new(
                MISSING_TRANSFORMS_FILE,
                render_stub_file(formatter, header, package, &stubs),
            ));
        }

        for (dir, (pkg_path, ids)) in &layout.deferred {
            let types: Vec<&TypeInfo> = ids
                .iter()
                .filter_map(|id| plan.generated_types.get(id))
                .collect();
            let formatter = TypeFormatter::new(plan.graph(), Some(pkg_path.as_str()));
            let text = render_type_file(
                formatter,
                header,
                &plan.graph().package_name(pkg_path),
                &types,
            );
            files.push(GeneratedFile::new(dir.join(MISSING_TYPES_FILE), text));
        }

        let mut files = self.canonicalize(files, &mut diagnostics);
        files.sort_by(|a, b| a.path.cmp(&b.path));
        debug!("Emitted {} file(s)", files.len());
        (files, diagnostics)
    }

    fn formatter<'g>(&self, graph: &'g TypeGraph, layout: &Layout) -> TypeFormatter<'g> {
        TypeFormatter::new(graph, self.options.package_path.as_deref())
            .with_local(layout.local.iter().cloned())
    }

    fn compile_all<'g>(
        &self,
        plan: &ResolvedMappingPlan<'g>,
        layout: &Layout,
        registry: &MissingRegistry,
        jobs: usize,
    ) -> Vec<CompiledPair<'g>> {
        let compile_one = |index: usize| {
            let pair = &plan.pairs[index];
            let formatter = self.formatter(plan.graph(), layout);
            let compiled = PairCompiler::new(plan, pair, formatter)
                .compile(index, layout.inline.get(&index).cloned());
            registry.record(index, &compiled.missing);
            compiled
        };

        let count = plan.pairs.len();
        if jobs == 1 || count < 2 {
            return (0..count).map(&compile_one).collect();
        }

        let chunk = count.div_ceil(jobs);
        let indices: Vec<usize> = (0..count).collect();
        let compile_one = &compile_one;
        std::thread::scope(|scope| {
            let handles: Vec<_> = indices
                .chunks(chunk)
                .map(|part| {
                    scope.spawn(move || part.iter().map(|&i| compile_one(i)).collect::<Vec<_>>())
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(compiled) => compiled,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }

    /// Canonicalize every file; failures keep the raw text and add a
    /// `.debug` sidecar
    fn canonicalize(
        &self,
        files: Vec<GeneratedFile>,
        diagnostics: &mut Diagnostics,
    ) -> Vec<GeneratedFile> {
        let mut out = Vec::with_capacity(files.len());
        for file in files {
            match self.canonicalizer.canonicalize(&file.path, &file.contents) {
                Ok(contents) => out.push(GeneratedFile::new(file.path, contents)),
                Err(message) => {
                    warn!("Failed to canonicalize {}: {}", file.path.display(), message);
                    diagnostics.add_error(
                        DiagnosticKind::Emission,
                        file.path.display().to_string(),
                        None,
                        format!("output could not be formatted: {message}"),
                    );
                    out.push(GeneratedFile::new(
                        debug_path(&file.path),
                        format!("// {}\n{}", message.replace('\n', "\n// "), file.contents),
                    ));
                    out.push(file);
                }
            }
        }
        out
    }
}

fn debug_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".debug");
    PathBuf::from(name)
}

/// Emit a plan on the calling thread
#[must_use]
pub fn emit(plan: &ResolvedMappingPlan<'_>, options: &EmitOptions) -> (Vec<GeneratedFile>, Diagnostics) {
    Emitter::new(options.clone()).emit(plan)
}

/// Emit a plan compiling pairs on up to `jobs` threads
#[must_use]
pub fn emit_parallel(
    plan: &ResolvedMappingPlan<'_>,
    options: &EmitOptions,
    jobs: usize,
) -> (Vec<GeneratedFile>, Diagnostics) {
    Emitter::new(options.clone()).emit_parallel(plan, jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caster_plan::{PairOrigin, TypePairKey};

    fn pair(source: TypeId, target: TypeId) -> ResolvedTypePair {
        ResolvedTypePair {
            key: TypePairKey::new(source, target),
            caster_name: String::new(),
            mappings: Vec::new(),
            nested_pairs: Vec::new(),
            unmapped_targets: Vec::new(),
            requires: Vec::new(),
            is_generated_target: false,
            origin: PairOrigin::Declared,
        }
    }

    #[test]
    fn test_file_names_lowercase_and_deduplicated() {
        let mut graph = TypeGraph::new();
        graph.add_package("example.com/a/store", "store", None);
        graph.add_package("example.com/b/store", "store", None);
        graph.add_package("example.com/wire", "wire", None);
        let pairs = vec![
            pair(
                TypeId::new("example.com/a/store", "Order"),
                TypeId::new("example.com/wire", "Order"),
            ),
            pair(
                TypeId::new("example.com/b/store", "Order"),
                TypeId::new("example.com/wire", "Order"),
            ),
        ];
        assert_eq!(
            file_names(&graph, &pairs),
            vec![
                "store_order_to_wire_order.go".to_string(),
                "store_order_to_wire_order_2.go".to_string(),
            ]
        );
    }

    #[test]
    fn test_registry_merges_first_reference_by_name() {
        let registry = MissingRegistry::default();
        let stub = |name: &str| MissingTransform {
            name: name.to_string(),
            params: Vec::new(),
            results: Vec::new(),
        };
        registry.record(3, &[stub("Zeta"), stub("Alpha")]);
        registry.record(1, &[stub("Zeta")]);

        let mut diagnostics = Diagnostics::new();
        let merged = registry.merge(&mut diagnostics);
        let names: Vec<(usize, &str)> = merged.iter().map(|(i, m)| (*i, m.name.as_str())).collect();
        assert_eq!(names, vec![(3, "Alpha"), (1, "Zeta")]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_debug_path() {
        assert_eq!(
            debug_path(Path::new("dir/a_to_b.go")),
            PathBuf::from("dir/a_to_b.go.debug")
        );
    }
}
