//! Field resolver / planner
//!
//! Turns declared mapping intent plus the type graph into a
//! [`ResolvedMappingPlan`]. Declared pairs are resolved in document order;
//! pairs discovered through nested casts follow in breadth-first discovery
//! order. A failing mapping is reported and dropped, never fatal.

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::ident::{MatchOutcome, match_ident};
use crate::model::{
    Callee, ConversionStrategy, ExtraValue, MappingOrigin, PairOrigin, ParamType, Projection,
    ResolvedExtra, ResolvedFieldMapping, ResolvedMappingPlan, ResolvedRequire, ResolvedTypePair,
    TransformCall, TypePairKey, TypeScope, UnmappedTarget, caster_name,
};
use crate::resolve::{ResolvedPath, resolve_path};
use crate::strategy::StrategySelector;
use crate::synth::synthesize_target;
use caster_graph::{Field, FieldPath, TypeExpr, TypeGraph, TypeId, TypeInfo};
use caster_mapping::{
    ExtraArg, ExtraDef, FieldMapping, Hint, MappingFile, TransformRef, TransformRegistry,
    TypeMapping,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, info, trace};

/// Pair label used for document-level diagnostics
const TRANSFORMS_LABEL: &str = "transforms";

/// Plan a mapping document against a type graph
#[must_use]
pub fn plan<'g>(graph: &'g TypeGraph, mapping: &MappingFile) -> (ResolvedMappingPlan<'g>, Diagnostics) {
    Planner::new(graph, mapping).plan()
}

/// One-shot planner for a single generation run
pub struct Planner<'g, 'm> {
    graph: &'g TypeGraph,
    mapping: &'m MappingFile,
    transforms: TransformRegistry,
    generated: BTreeMap<TypeId, TypeInfo>,
    diagnostics: Diagnostics,
}

struct WorkItem<'m> {
    key: TypePairKey,
    decl: Option<&'m TypeMapping>,
    origin: PairOrigin,
}

impl<'g, 'm> Planner<'g, 'm> {
    /// Create a planner
    #[must_use]
    pub fn new(graph: &'g TypeGraph, mapping: &'m MappingFile) -> Self {
        Self {
            graph,
            mapping,
            transforms: TransformRegistry::from_defs(&mapping.transforms),
            generated: BTreeMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Resolve every declared pair and every nested pair they need
    #[must_use]
    pub fn plan(mut self) -> (ResolvedMappingPlan<'g>, Diagnostics) {
        info!(
            "Planning {} type mapping(s) against {} type(s)",
            self.mapping.mappings.len(),
            self.graph.len()
        );

        for name in self.transforms.duplicates() {
            self.diagnostics.add_error(
                DiagnosticKind::Reference,
                TRANSFORMS_LABEL,
                Some(name.clone()),
                format!("duplicate transform declaration '{name}'"),
            );
        }

        let mut queue = self.declare_pairs();
        let mut seen: BTreeSet<TypePairKey> = queue.iter().map(|item| item.key.clone()).collect();
        let mut pairs = Vec::new();

        let scope = TypeScope::new(self.graph, &self.generated);
        while let Some(item) = queue.pop_front() {
            let resolver = PairResolver::new(scope, &self.transforms, item.key.clone());
            let pair = resolver.resolve(item.decl, item.origin, &mut self.diagnostics);

            for nested in &pair.nested_pairs {
                if seen.insert(nested.clone()) {
                    trace!("Discovered nested pair {}", nested);
                    queue.push_back(WorkItem {
                        key: nested.clone(),
                        decl: None,
                        origin: PairOrigin::Nested,
                    });
                }
            }
            pairs.push(pair);
        }

        assign_caster_names(self.graph, &mut pairs);
        check_nested_requires(&pairs, &mut self.diagnostics);

        debug!(
            "Planned {} pair(s), {} generated type(s), {} diagnostic(s)",
            pairs.len(),
            self.generated.len(),
            self.diagnostics.len()
        );
        (
            ResolvedMappingPlan::new(self.graph, pairs, self.generated),
            self.diagnostics,
        )
    }

    /// Validate declared pairs and synthesize missing target types
    fn declare_pairs(&mut self) -> VecDeque<WorkItem<'m>> {
        let mapping = self.mapping;
        let mut queue = VecDeque::new();
        let mut declared = BTreeSet::new();

        for decl in &mapping.mappings {
            let label = decl.label();
            let key = TypePairKey::new(
                self.graph.resolve_ident(&decl.source),
                self.graph.resolve_ident(&decl.target),
            );
            let source = TypeExpr::Named(key.source.clone());
            let target = TypeExpr::Named(key.target.clone());

            if self.graph.struct_of(&source).is_none() {
                let message = match self.graph.get(&key.source) {
                    Some(_) => format!(
                        "source type {} is a {}, not a struct",
                        source,
                        self.graph.kind_of(&source)
                    ),
                    None => format!("source type {source} not found in type graph"),
                };
                self.diagnostics
                    .add_error(DiagnosticKind::Structural, label, None, message);
                continue;
            }

            if !declared.insert(key.clone()) {
                self.diagnostics.add_error(
                    DiagnosticKind::Reference,
                    label,
                    None,
                    format!("duplicate mapping declaration for {key}"),
                );
                continue;
            }

            if self.graph.get(&key.target).is_some() {
                if self.graph.struct_of(&target).is_none() {
                    self.diagnostics.add_error(
                        DiagnosticKind::Structural,
                        label,
                        None,
                        format!(
                            "target type {} is a {}, not a struct",
                            target,
                            self.graph.kind_of(&target)
                        ),
                    );
                    continue;
                }
            } else if !self.generated.contains_key(&key.target) {
                if !decl.generate_target {
                    self.diagnostics.add_warning(
                        DiagnosticKind::Structural,
                        label,
                        None,
                        format!("target type {target} not found in type graph; generating it"),
                    );
                }
                let scope = TypeScope::new(self.graph, &self.generated);
                let info = synthesize_target(
                    scope,
                    &self.transforms,
                    decl,
                    &source,
                    key.target.clone(),
                );
                self.generated.insert(key.target.clone(), info);
            }

            queue.push_back(WorkItem {
                key,
                decl: Some(decl),
                origin: PairOrigin::Declared,
            });
        }

        queue
    }
}

/// Declared entry that won its target claim
struct Candidate {
    mapping: FieldMapping,
    origin: MappingOrigin,
    targets: Vec<FieldPath>,
}

/// Resolution state for one type pair
struct PairResolver<'a> {
    scope: TypeScope<'a>,
    selector: StrategySelector<'a>,
    transforms: &'a TransformRegistry,
    key: TypePairKey,
    label: String,
    source: TypeExpr,
    target: TypeExpr,
    generated_target: bool,
}

impl<'a> PairResolver<'a> {
    fn new(scope: TypeScope<'a>, transforms: &'a TransformRegistry, key: TypePairKey) -> Self {
        let generated_target = scope
            .get(&key.target)
            .is_some_and(|info| info.is_generated);
        Self {
            scope,
            selector: StrategySelector::new(scope),
            transforms,
            label: key.to_string(),
            source: TypeExpr::Named(key.source.clone()),
            target: TypeExpr::Named(key.target.clone()),
            key,
            generated_target,
        }
    }

    fn resolve(
        self,
        decl: Option<&TypeMapping>,
        origin: PairOrigin,
        diagnostics: &mut Diagnostics,
    ) -> ResolvedTypePair {
        debug!("Resolving pair {}", self.label);

        let mut requires = Vec::new();
        let mut mappings = Vec::new();
        let mut claimed = BTreeSet::new();

        if let Some(decl) = decl {
            requires = self.resolve_requires(decl, diagnostics);
            let candidates = self.collect_candidates(decl, &mut claimed, diagnostics);

            let mut pending = Vec::new();
            for candidate in &candidates {
                for resolved in self.resolve_candidate(candidate, diagnostics) {
                    pending.push((resolved, candidate.mapping.extra.as_slice()));
                }
            }
            mappings = self.resolve_extras(pending, &requires, diagnostics);
        }

        let mut unmapped_targets = Vec::new();
        if !self.generated_target {
            self.auto_match(&claimed, &mut mappings, &mut unmapped_targets);
        }
        for unmapped in &unmapped_targets {
            diagnostics.add_info(
                DiagnosticKind::Structural,
                &self.label,
                Some(unmapped.path.to_string()),
                format!("target left unset: {}", unmapped.reason),
            );
        }

        let mut nested_pairs: Vec<TypePairKey> = Vec::new();
        for conversion in mappings.iter().filter_map(|m| m.conversion.as_ref()) {
            for nested in conversion.nested_pairs() {
                if !nested_pairs.contains(&nested) {
                    nested_pairs.push(nested);
                }
            }
        }

        ResolvedTypePair {
            key: self.key,
            caster_name: String::new(),
            mappings,
            nested_pairs,
            unmapped_targets,
            requires,
            is_generated_target: self.generated_target,
            origin,
        }
    }

    fn resolve_requires(
        &self,
        decl: &TypeMapping,
        diagnostics: &mut Diagnostics,
    ) -> Vec<ResolvedRequire> {
        let mut requires = Vec::with_capacity(decl.requires.len());
        for required in &decl.requires {
            let ty = match TypeExpr::parse_go(&required.ty, self.scope.graph()) {
                Ok(ty) => ParamType::Expr(ty),
                Err(e) => {
                    diagnostics.add_error(
                        DiagnosticKind::Structural,
                        &self.label,
                        None,
                        format!("requires '{}': {e}", required.name),
                    );
                    ParamType::Raw(required.ty.clone())
                }
            };
            requires.push(ResolvedRequire {
                name: required.name.clone(),
                ty,
            });
        }
        requires
    }

    /// Expand 121 entries and settle target claims by priority group
    fn collect_candidates(
        &self,
        decl: &TypeMapping,
        claimed: &mut BTreeSet<FieldPath>,
        diagnostics: &mut Diagnostics,
    ) -> Vec<Candidate> {
        let entries = decl
            .one_to_one
            .iter()
            .map(|(target, source)| (FieldMapping::simple(target, source), MappingOrigin::OneToOne))
            .chain(decl.fields.iter().map(|f| (f.clone(), MappingOrigin::Field)))
            .chain(decl.ignore.iter().map(|f| {
                (
                    FieldMapping {
                        ignore: true,
                        ..f.clone()
                    },
                    MappingOrigin::Ignore,
                )
            }))
            .chain(decl.auto.iter().map(|f| (f.clone(), MappingOrigin::Auto)));

        let mut candidates = Vec::new();
        'entries: for (mapping, origin) in entries {
            if mapping.target.is_empty() {
                diagnostics.add_error(
                    DiagnosticKind::Structural,
                    &self.label,
                    None,
                    format!("{origin} entry from '{}' has no target", mapping.source),
                );
                continue;
            }

            let mut targets = Vec::with_capacity(mapping.target.len());
            for target in mapping.target.refs() {
                match FieldPath::parse(&target.path) {
                    Ok(path) => targets.push(path),
                    Err(e) => {
                        diagnostics.add_error(
                            DiagnosticKind::Structural,
                            &self.label,
                            Some(target.path.clone()),
                            e.to_string(),
                        );
                        continue 'entries;
                    }
                }
            }

            if let Some(taken) = targets.iter().find(|t| claimed.contains(*t)) {
                diagnostics.add_warning(
                    DiagnosticKind::Reference,
                    &self.label,
                    Some(taken.to_string()),
                    format!("target already mapped by a higher-priority entry; {origin} entry ignored"),
                );
                continue;
            }

            claimed.extend(targets.iter().cloned());
            candidates.push(Candidate {
                mapping,
                origin,
                targets,
            });
        }
        candidates
    }

    fn resolve_candidate(
        &self,
        candidate: &Candidate,
        diagnostics: &mut Diagnostics,
    ) -> Vec<ResolvedFieldMapping> {
        let mapping = &candidate.mapping;
        let target_label = join(&candidate.targets);

        if mapping.ignore {
            if !self.generated_target {
                for path in &candidate.targets {
                    if let Err(reason) = resolve_path(self.scope, &self.target, path) {
                        self.error(diagnostics, DiagnosticKind::Structural, path, reason);
                        return Vec::new();
                    }
                }
            }
            let mut resolved = ResolvedFieldMapping::new(
                Vec::new(),
                candidate.targets.clone(),
                ConversionStrategy::Ignore,
                candidate.origin,
            );
            resolved.explanation = "ignored".to_string();
            return vec![resolved];
        }

        let mut targets = Vec::with_capacity(candidate.targets.len());
        for path in &candidate.targets {
            match resolve_path(self.scope, &self.target, path) {
                Ok(resolved) => targets.push(resolved),
                Err(reason) => {
                    self.error(diagnostics, DiagnosticKind::Structural, path, reason);
                    return Vec::new();
                }
            }
        }

        let mut sources = Vec::with_capacity(mapping.source.len());
        for source in mapping.source.refs() {
            let path = match FieldPath::parse(&source.path) {
                Ok(path) => path,
                Err(e) => {
                    diagnostics.add_error(
                        DiagnosticKind::Structural,
                        &self.label,
                        Some(target_label),
                        e.to_string(),
                    );
                    return Vec::new();
                }
            };
            match resolve_path(self.scope, &self.source, &path) {
                Ok(resolved) => sources.push((resolved, source.hint)),
                Err(reason) => {
                    self.error(diagnostics, DiagnosticKind::Structural, &path, reason);
                    return Vec::new();
                }
            }
        }

        if let Some(name) = &mapping.transform {
            return self
                .resolve_transform(candidate, name, &sources, &targets, diagnostics)
                .into_iter()
                .collect();
        }

        match (sources.len(), targets.len()) {
            (0, _) => match &mapping.default {
                Some(literal) => self.resolve_defaults(candidate, literal, &targets, diagnostics),
                None => {
                    diagnostics.add_error(
                        DiagnosticKind::Structural,
                        &self.label,
                        Some(target_label),
                        "no source: mapping needs a source, a default, or a transform",
                    );
                    Vec::new()
                }
            },
            (1, _) => {
                let (source, source_hint) = &sources[0];
                targets
                    .iter()
                    .zip(mapping.target.refs())
                    .filter_map(|(target, target_ref)| {
                        let hint = if *source_hint == Hint::None {
                            target_ref.hint
                        } else {
                            *source_hint
                        };
                        self.resolve_one_to_one(candidate, source, target, hint, diagnostics)
                    })
                    .collect()
            }
            (n, m) => {
                let cardinality = if m == 1 { "N:1" } else { "N:M" };
                diagnostics.add_error(
                    DiagnosticKind::Cardinality,
                    &self.label,
                    Some(target_label),
                    format!(
                        "{cardinality} mapping ({n} sources, {m} target(s)) requires a transform"
                    ),
                );
                Vec::new()
            }
        }
    }

    fn resolve_one_to_one(
        &self,
        candidate: &Candidate,
        source: &ResolvedPath,
        target: &ResolvedPath,
        hint: Hint,
        diagnostics: &mut Diagnostics,
    ) -> Option<ResolvedFieldMapping> {
        let projection = match (source.slices.as_slice(), target.slices.as_slice()) {
            ([], []) => None,
            ([from], [into]) => Some(Projection {
                source_container: from.container.clone(),
                source_container_type: from.container_type.clone(),
                source_rest: from.rest.clone(),
                target_container: into.container.clone(),
                target_rest: into.rest.clone(),
                target_container_type: into.container_type.clone(),
                source_pointers: from.pointers.iter().map(|(p, _)| p.clone()).collect(),
                target_pointers: into.pointers.clone(),
            }),
            _ => {
                self.error(
                    diagnostics,
                    DiagnosticKind::Structural,
                    &target.path,
                    format!("unsupported slice projection: {} -> {}", source.path, target.path),
                );
                return None;
            }
        };

        let conversion = self.selector.select(&source.ty, &target.ty, hint);
        if let Some(fallback) = conversion.first_fallback() {
            diagnostics.add_warning(
                DiagnosticKind::Structural,
                &self.label,
                Some(target.path.to_string()),
                format!(
                    "no conversion from {} to {}; source assigned as-is",
                    fallback.source, fallback.target
                ),
            );
        }

        trace!(
            "{}: {} -> {} by {}",
            self.label, source.path, target.path, conversion.strategy
        );
        let mut resolved = ResolvedFieldMapping::new(
            vec![source.path.clone()],
            vec![target.path.clone()],
            conversion.strategy,
            candidate.origin,
        );
        resolved.explanation = format!(
            "{} {} -> {}",
            conversion.strategy, conversion.source, conversion.target
        );
        resolved.default.clone_from(&candidate.mapping.default);
        resolved.projection = projection;
        resolved.target_pointers = target.pointers.clone();
        resolved.source_pointers = source.pointers.iter().map(|(p, _)| p.clone()).collect();
        resolved.conversion = Some(conversion);
        Some(resolved)
    }

    fn resolve_defaults(
        &self,
        candidate: &Candidate,
        literal: &str,
        targets: &[ResolvedPath],
        diagnostics: &mut Diagnostics,
    ) -> Vec<ResolvedFieldMapping> {
        let mut out = Vec::with_capacity(targets.len());
        for target in targets {
            if !target.slices.is_empty() {
                self.error(
                    diagnostics,
                    DiagnosticKind::Structural,
                    &target.path,
                    "unsupported slice projection: a default cannot fill elements",
                );
                continue;
            }
            let mut resolved = ResolvedFieldMapping::new(
                Vec::new(),
                vec![target.path.clone()],
                ConversionStrategy::Default,
                candidate.origin,
            );
            resolved.default = Some(literal.to_string());
            resolved.target_pointers = target.pointers.clone();
            resolved.explanation = format!("default {literal}");
            out.push(resolved);
        }
        out
    }

    fn resolve_transform(
        &self,
        candidate: &Candidate,
        name: &str,
        sources: &[(ResolvedPath, Hint)],
        targets: &[ResolvedPath],
        diagnostics: &mut Diagnostics,
    ) -> Option<ResolvedFieldMapping> {
        let target_label = join(&candidate.targets);

        if sources.iter().any(|(s, _)| !s.slices.is_empty())
            || targets.iter().any(|t| !t.slices.is_empty())
        {
            diagnostics.add_error(
                DiagnosticKind::Structural,
                &self.label,
                Some(target_label),
                format!("unsupported slice projection: transform {name} cannot take [] paths"),
            );
            return None;
        }

        let callee = match self.transforms.resolve(name) {
            TransformRef::Declared(def) => match &def.package {
                Some(path) => Callee::Package {
                    path: path.clone(),
                    func: def.func_name().to_string(),
                },
                None => Callee::Local {
                    func: def.func_name().to_string(),
                },
            },
            TransformRef::Qualified { qualifier, func } => Callee::Package {
                path: self
                    .scope
                    .graph()
                    .resolve_package(qualifier)
                    .unwrap_or(qualifier)
                    .to_string(),
                func: func.to_string(),
            },
            TransformRef::Missing(missing) => {
                diagnostics.add_warning(
                    DiagnosticKind::Reference,
                    &self.label,
                    Some(target_label),
                    format!("transform '{missing}' is not declared; a panicking stub is generated"),
                );
                Callee::Missing {
                    name: missing.to_string(),
                }
            }
        };

        let mut resolved = ResolvedFieldMapping::new(
            sources.iter().map(|(s, _)| s.path.clone()).collect(),
            targets.iter().map(|t| t.path.clone()).collect(),
            ConversionStrategy::Transform,
            candidate.origin,
        );
        resolved.transform = Some(TransformCall {
            name: name.to_string(),
            callee,
            params: sources
                .iter()
                .map(|(s, _)| ParamType::Expr(s.ty.clone()))
                .collect(),
            results: targets.iter().map(|t| t.ty.clone()).collect(),
        });
        for target in targets {
            for pointer in &target.pointers {
                if !resolved.target_pointers.contains(pointer) {
                    resolved.target_pointers.push(pointer.clone());
                }
            }
        }
        for (source, _) in sources {
            for (path, _) in &source.pointers {
                if !resolved.source_pointers.contains(path) {
                    resolved.source_pointers.push(path.clone());
                }
            }
        }
        resolved.explanation = format!("transform {name}");
        Some(resolved)
    }

    /// Bind extras once every declared mapping is known
    fn resolve_extras(
        &self,
        pending: Vec<(ResolvedFieldMapping, &[ExtraArg])>,
        requires: &[ResolvedRequire],
        diagnostics: &mut Diagnostics,
    ) -> Vec<ResolvedFieldMapping> {
        let produced: Vec<FieldPath> = pending
            .iter()
            .filter(|(m, _)| m.strategy != ConversionStrategy::Ignore)
            .flat_map(|(m, _)| m.target_paths.iter().cloned())
            .collect();

        let mut out = Vec::with_capacity(pending.len());
        'mappings: for (mut mapping, extras) in pending {
            if extras.is_empty() {
                out.push(mapping);
                continue;
            }

            let takes_extras = mapping.strategy == ConversionStrategy::Transform
                || mapping
                    .conversion
                    .as_ref()
                    .is_some_and(|c| !c.nested_pairs().is_empty());
            if !takes_extras {
                diagnostics.add_warning(
                    DiagnosticKind::Reference,
                    &self.label,
                    Some(mapping.target_label()),
                    "extras are only passed to transforms and nested casters; ignored",
                );
                out.push(mapping);
                continue;
            }

            for extra in extras {
                match self.resolve_extra(extra, &mapping, &produced, requires) {
                    Ok((resolved, dependency)) => {
                        if let Some(dependency) = dependency {
                            if !mapping.depends_on_targets.contains(&dependency) {
                                mapping.depends_on_targets.push(dependency);
                            }
                        }
                        mapping.extra.push(resolved);
                    }
                    Err((kind, message)) => {
                        diagnostics.add_error(
                            kind,
                            &self.label,
                            Some(mapping.target_label()),
                            message,
                        );
                        continue 'mappings;
                    }
                }
            }

            if let Some(call) = &mut mapping.transform {
                call.params
                    .extend(mapping.extra.iter().map(|extra| extra.ty.clone()));
            }
            out.push(mapping);
        }
        self.drop_orphaned_dependents(&mut out, diagnostics);
        out
    }

    /// Remove mappings reading a target whose producer was dropped, until
    /// every remaining dependency is produced
    fn drop_orphaned_dependents(
        &self,
        mappings: &mut Vec<ResolvedFieldMapping>,
        diagnostics: &mut Diagnostics,
    ) {
        loop {
            let produced: BTreeSet<FieldPath> = mappings
                .iter()
                .filter(|m| m.strategy != ConversionStrategy::Ignore)
                .flat_map(|m| m.target_paths.iter().cloned())
                .collect();
            let before = mappings.len();
            mappings.retain(|mapping| {
                let Some(orphan) = mapping
                    .depends_on_targets
                    .iter()
                    .find(|dependency| !produced.contains(*dependency))
                else {
                    return true;
                };
                diagnostics.add_error(
                    DiagnosticKind::Reference,
                    &self.label,
                    Some(mapping.target_label()),
                    format!("extra reads target '{orphan}', whose mapping was dropped"),
                );
                false
            });
            if mappings.len() == before {
                break;
            }
        }
    }

    fn resolve_extra(
        &self,
        extra: &ExtraArg,
        mapping: &ResolvedFieldMapping,
        produced: &[FieldPath],
        requires: &[ResolvedRequire],
    ) -> Result<(ResolvedExtra, Option<FieldPath>), (DiagnosticKind, String)> {
        let parse = |text: &str| {
            FieldPath::parse(text).map_err(|e| (DiagnosticKind::Structural, e.to_string()))
        };

        match extra.def() {
            ExtraDef::Source(text) => {
                let path = parse(text)?;
                let resolved = resolve_path(self.scope, &self.source, &path).map_err(|reason| {
                    (
                        DiagnosticKind::Structural,
                        format!("extra '{}': {reason}", extra.name),
                    )
                })?;
                if !resolved.slices.is_empty() {
                    return Err((
                        DiagnosticKind::Structural,
                        format!("unsupported slice projection: extra '{}'", extra.name),
                    ));
                }
                Ok((
                    ResolvedExtra {
                        name: extra.name.clone(),
                        value: ExtraValue::Source(path),
                        ty: ParamType::Expr(resolved.ty),
                    },
                    None,
                ))
            }
            ExtraDef::Target(text) => {
                let path = parse(text)?;
                if mapping.target_paths.contains(&path) || !produced.contains(&path) {
                    return Err((
                        DiagnosticKind::Reference,
                        format!(
                            "extra '{}' references target '{path}', which no other mapping produces",
                            extra.name
                        ),
                    ));
                }
                let resolved = resolve_path(self.scope, &self.target, &path).map_err(|reason| {
                    (
                        DiagnosticKind::Structural,
                        format!("extra '{}': {reason}", extra.name),
                    )
                })?;
                Ok((
                    ResolvedExtra {
                        name: extra.name.clone(),
                        value: ExtraValue::Target(path.clone()),
                        ty: ParamType::Expr(resolved.ty),
                    },
                    Some(path),
                ))
            }
            ExtraDef::Requires => requires
                .iter()
                .find(|required| required.name == extra.name)
                .map(|required| {
                    (
                        ResolvedExtra {
                            name: extra.name.clone(),
                            value: ExtraValue::Param(required.name.clone()),
                            ty: required.ty.clone(),
                        },
                        None,
                    )
                })
                .ok_or_else(|| {
                    (
                        DiagnosticKind::Reference,
                        format!("undeclared extra '{}'", extra.name),
                    )
                }),
        }
    }

    /// Offer unclaimed target fields to the identifier matcher
    fn auto_match(
        &self,
        claimed: &BTreeSet<FieldPath>,
        mappings: &mut Vec<ResolvedFieldMapping>,
        unmapped: &mut Vec<UnmappedTarget>,
    ) {
        let (Some(source_info), Some(target_info)) = (
            self.scope.struct_of(&self.source),
            self.scope.struct_of(&self.target),
        ) else {
            return;
        };

        let claimed_names: BTreeSet<&str> = claimed
            .iter()
            .filter_map(FieldPath::first)
            .map(|segment| segment.name.as_str())
            .collect();
        let used_sources: BTreeSet<String> = mappings
            .iter()
            .flat_map(|m| m.source_paths.iter())
            .filter_map(FieldPath::first)
            .map(|segment| segment.name.clone())
            .collect();

        let mut candidates: Vec<&Field> = source_info
            .fields()
            .unwrap_or_default()
            .iter()
            .filter(|f| f.exported && !used_sources.contains(&f.name))
            .collect();

        for field in target_info.fields().unwrap_or_default() {
            if !field.exported || claimed_names.contains(field.name.as_str()) {
                continue;
            }
            let path = FieldPath::field(&field.name);
            let names: Vec<&str> = candidates.iter().map(|f| f.name.as_str()).collect();

            match match_ident(&field.name, &names) {
                MatchOutcome::Unique(index) => {
                    let source = candidates[index];
                    let conversion = self.selector.select(&source.ty, &field.ty, Hint::None);
                    if conversion.has_fallback() {
                        unmapped.push(UnmappedTarget {
                            path,
                            reason: format!("incompatible types: {} -> {}", source.ty, field.ty),
                        });
                        continue;
                    }

                    trace!(
                        "{}: matched {} -> {} by {}",
                        self.label, source.name, field.name, conversion.strategy
                    );
                    let mut resolved = ResolvedFieldMapping::new(
                        vec![FieldPath::field(&source.name)],
                        vec![path],
                        conversion.strategy,
                        MappingOrigin::Matched,
                    );
                    resolved.explanation =
                        format!("matched {} by name ({})", source.name, conversion.strategy);
                    resolved.conversion = Some(conversion);
                    mappings.push(resolved);
                    candidates.remove(index);
                }
                MatchOutcome::Ambiguous(hits) => {
                    let names: Vec<&str> = hits.iter().map(|&i| candidates[i].name.as_str()).collect();
                    unmapped.push(UnmappedTarget {
                        path,
                        reason: format!("ambiguous match: {}", names.join(", ")),
                    });
                }
                MatchOutcome::NoMatch => unmapped.push(UnmappedTarget {
                    path,
                    reason: "no matching source field".to_string(),
                }),
            }
        }
    }

    fn error(
        &self,
        diagnostics: &mut Diagnostics,
        kind: DiagnosticKind,
        path: &FieldPath,
        message: impl Into<String>,
    ) {
        diagnostics.add_error(kind, &self.label, Some(path.to_string()), message);
    }
}

fn join(paths: &[FieldPath]) -> String {
    paths
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Name casters, suffixing collisions in plan order
fn assign_caster_names(graph: &TypeGraph, pairs: &mut [ResolvedTypePair]) {
    let mut used: BTreeMap<String, usize> = BTreeMap::new();
    for pair in pairs.iter_mut() {
        let base = caster_name(graph, &pair.key);
        let count = used.entry(base.clone()).or_insert(0);
        *count += 1;
        pair.caster_name = if *count == 1 {
            base
        } else {
            format!("{base}{count}")
        };
    }
}

/// Nested caster calls must supply exactly the callee's `requires`
fn check_nested_requires(pairs: &[ResolvedTypePair], diagnostics: &mut Diagnostics) {
    let arity: BTreeMap<&TypePairKey, usize> =
        pairs.iter().map(|p| (&p.key, p.requires.len())).collect();

    for pair in pairs {
        for mapping in &pair.mappings {
            let Some(conversion) = &mapping.conversion else {
                continue;
            };
            for nested in conversion.nested_pairs() {
                let needed = arity.get(&nested).copied().unwrap_or(0);
                if needed != mapping.extra.len() {
                    diagnostics.add_warning(
                        DiagnosticKind::Reference,
                        pair.label(),
                        Some(mapping.target_label()),
                        format!(
                            "caster for {nested} takes {needed} extra argument(s), call supplies {}",
                            mapping.extra.len()
                        ),
                    );
                }
            }
        }
    }
}
