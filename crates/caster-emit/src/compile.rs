//! Expression/strategy compiler
//!
//! Compiles the mappings of one resolved pair into Go statements. Each
//! pair is compiled independently with its own formatter and registries so
//! pairs can be compiled on different threads.

use crate::imports::TypeFormatter;
use crate::order::topo_sort;
use caster_graph::{TypeExpr, TypeId};
use caster_plan::{
    Callee, Conversion, ConversionStrategy, DiagnosticKind, Diagnostics, ExtraValue, ParamType,
    Projection, ResolvedFieldMapping, ResolvedMappingPlan, ResolvedTypePair, TransformCall,
    caster_name,
};
use tracing::trace;

/// Receiver name of the source value
const SRC: &str = "in";
/// Name of the value under construction
const DST: &str = "out";

/// Transform referenced by bare name without a declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTransform {
    pub name: String,
    pub params: Vec<ParamType>,
    pub results: Vec<TypeExpr>,
}

impl MissingTransform {
    fn from_call(name: &str, call: &TransformCall) -> Self {
        Self {
            name: name.to_string(),
            params: call.params.clone(),
            results: call.results.clone(),
        }
    }
}

/// Tab-indented line buffer
#[derive(Debug, Clone, Default)]
pub struct CodeWriter {
    lines: Vec<String>,
    indent: usize,
}

impl CodeWriter {
    /// Writer starting at the given indentation level
    #[must_use]
    pub fn new(indent: usize) -> Self {
        Self {
            lines: Vec::new(),
            indent,
        }
    }

    /// Append one line at the current level
    pub fn line(&mut self, text: impl AsRef<str>) {
        self.lines
            .push(format!("{}{}", "\t".repeat(self.indent), text.as_ref()));
    }

    /// Append a line and indent what follows
    pub fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.indent += 1;
    }

    /// Dedent and append a closing line
    pub fn close(&mut self, text: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    /// Dedent, append, indent again (`} else {`)
    pub fn reopen(&mut self, text: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.open(text);
    }

    /// Lines written so far
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Consume the writer
    #[must_use]
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// Output of compiling one pair
#[derive(Debug, Clone)]
pub struct CompiledPair<'g> {
    /// Position of the pair in the plan
    pub index: usize,
    pub caster_name: String,
    /// File-level formatter holding the pair's imports
    pub formatter: TypeFormatter<'g>,
    /// `func ...(...) T {` line
    pub signature: String,
    /// Statements in dependency order, indented one level
    pub body: Vec<String>,
    /// TODO comments for unmapped targets
    pub todos: Vec<String>,
    /// Generated type declared inline in this file
    pub inline_type: Option<TypeId>,
    /// Missing transforms in first-reference order
    pub missing: Vec<MissingTransform>,
    pub diagnostics: Diagnostics,
}

/// Compiles one pair
pub struct PairCompiler<'p, 'g> {
    plan: &'p ResolvedMappingPlan<'g>,
    pair: &'p ResolvedTypePair,
    formatter: TypeFormatter<'g>,
    missing: Vec<MissingTransform>,
    diagnostics: Diagnostics,
    /// Arguments forwarded to nested casters of the current mapping
    extras: Vec<String>,
    /// `default` of the current mapping, used as the nil fallback
    nil_default: Option<String>,
}

impl<'p, 'g> PairCompiler<'p, 'g> {
    /// Compiler for `pair` writing into a file whose formatter is given
    #[must_use]
    pub fn new(
        plan: &'p ResolvedMappingPlan<'g>,
        pair: &'p ResolvedTypePair,
        formatter: TypeFormatter<'g>,
    ) -> Self {
        Self {
            plan,
            pair,
            formatter,
            missing: Vec::new(),
            diagnostics: Diagnostics::new(),
            extras: Vec::new(),
            nil_default: None,
        }
    }

    /// Compile the caster body and signature
    #[must_use]
    pub fn compile(mut self, index: usize, inline_type: Option<TypeId>) -> CompiledPair<'g> {
        let pair = self.pair;
        trace!("Compiling caster {}", pair.caster_name);

        let signature = self.signature();
        let mut body = CodeWriter::new(1);
        body.line(format!(
            "var {DST} {}",
            self.formatter.format_id(&pair.key.target)
        ));

        for position in self.order() {
            self.compile_mapping(&pair.mappings[position], &mut body);
        }
        body.line(format!("return {DST}"));

        let todos = pair
            .unmapped_targets
            .iter()
            .map(|u| format!("\t// TODO: {} is not mapped: {}", u.path, u.reason))
            .collect();

        CompiledPair {
            index,
            caster_name: pair.caster_name.clone(),
            formatter: self.formatter,
            signature,
            body: body.into_lines(),
            todos,
            inline_type,
            missing: self.missing,
            diagnostics: self.diagnostics,
        }
    }

    fn signature(&mut self) -> String {
        let pair = self.pair;
        let mut params = vec![format!(
            "{SRC} {}",
            self.formatter.format_id(&pair.key.source)
        )];
        for required in &pair.requires {
            params.push(format!(
                "{} {}",
                required.name,
                self.formatter.format_param(&required.ty)
            ));
        }
        format!(
            "func {}({}) {} {{",
            pair.caster_name,
            params.join(", "),
            self.formatter.format_id(&pair.key.target)
        )
    }

    /// Mapping indices in dependency order; declaration order on a cycle
    fn order(&mut self) -> Vec<usize> {
        let mappings = &self.pair.mappings;
        let prerequisites = |i: usize| -> Vec<usize> {
            mappings[i]
                .depends_on_targets
                .iter()
                .flat_map(|dep| {
                    mappings
                        .iter()
                        .enumerate()
                        .filter(move |(j, m)| *j != i && m.target_paths.contains(dep))
                        .map(|(j, _)| j)
                })
                .collect()
        };

        match topo_sort(mappings.len(), prerequisites) {
            Ok(order) => order,
            Err(cycle) => {
                let targets: Vec<String> = cycle
                    .remaining
                    .iter()
                    .map(|&i| mappings[i].target_label())
                    .collect();
                self.diagnostics.add_error(
                    DiagnosticKind::Ordering,
                    self.pair.label(),
                    None,
                    format!(
                        "dependency cycle among {}; declaration order used",
                        targets.join(", ")
                    ),
                );
                (0..mappings.len()).collect()
            }
        }
    }

    fn compile_mapping(&mut self, mapping: &ResolvedFieldMapping, w: &mut CodeWriter) {
        if mapping.strategy == ConversionStrategy::Ignore {
            return;
        }

        self.extras = mapping
            .extra
            .iter()
            .map(|extra| match &extra.value {
                ExtraValue::Source(path) => path.selector(SRC),
                ExtraValue::Target(path) => path.selector(DST),
                ExtraValue::Param(name) => name.clone(),
            })
            .collect();
        self.nil_default.clone_from(&mapping.default);

        let guards: Vec<String> = mapping
            .source_pointers
            .iter()
            .map(|path| format!("{} != nil", path.selector(SRC)))
            .collect();
        if !guards.is_empty() {
            w.open(format!("if {} {{", guards.join(" && ")));
        }

        for (path, ty) in &mapping.target_pointers {
            let pointee = self
                .plan
                .scope()
                .underlying(ty)
                .elem()
                .cloned()
                .unwrap_or_else(|| ty.clone());
            let selector = path.selector(DST);
            w.open(format!("if {selector} == nil {{"));
            w.line(format!("{selector} = new({})", self.formatter.format(&pointee)));
            w.close("}");
        }

        match (&mapping.transform, &mapping.projection, &mapping.conversion) {
            (Some(call), _, _) => self.compile_transform(mapping, call, w),
            (None, _, _) if mapping.strategy == ConversionStrategy::Default => {
                let literal = mapping.default.as_deref().unwrap_or("nil");
                for target in &mapping.target_paths {
                    w.line(format!("{} = {literal}", target.selector(DST)));
                }
            }
            (None, Some(projection), Some(conversion)) => {
                self.compile_projection(projection, conversion, w);
            }
            (None, None, Some(conversion)) => {
                if let (Some(source), Some(target)) =
                    (mapping.source_paths.first(), mapping.target_paths.first())
                {
                    self.assign(w, &target.selector(DST), &source.selector(SRC), conversion, 0);
                }
            }
            (None, _, None) => {}
        }

        if !guards.is_empty() {
            w.close("}");
        }
    }

    fn compile_transform(
        &mut self,
        mapping: &ResolvedFieldMapping,
        call: &TransformCall,
        w: &mut CodeWriter,
    ) {
        let func = match &call.callee {
            Callee::Local { func } => func.clone(),
            Callee::Package { path, func } => self.formatter.format_func(path, func),
            Callee::Missing { name } => {
                if !self.missing.iter().any(|m| &m.name == name) {
                    self.missing.push(MissingTransform::from_call(name, call));
                }
                name.clone()
            }
        };

        let args: Vec<String> = mapping
            .source_paths
            .iter()
            .map(|path| path.selector(SRC))
            .chain(self.extras.iter().cloned())
            .collect();
        let targets: Vec<String> = mapping
            .target_paths
            .iter()
            .map(|path| path.selector(DST))
            .collect();

        w.line(format!(
            "{} = {func}({})",
            targets.join(", "),
            args.join(", ")
        ));
    }

    fn compile_projection(
        &mut self,
        projection: &Projection,
        conversion: &Conversion,
        w: &mut CodeWriter,
    ) {
        let scope = self.plan.scope();
        let src = projection.source_container.selector(SRC);
        let dst = projection.target_container.selector(DST);
        let source_is_slice = matches!(
            scope.underlying(&projection.source_container_type),
            TypeExpr::Slice(_)
        );
        let target_is_array = matches!(
            scope.underlying(&projection.target_container_type),
            TypeExpr::Array { .. }
        );

        if source_is_slice {
            w.open(format!("if {src} != nil {{"));
        }
        if !target_is_array {
            w.open(format!("if len({dst}) != len({src}) {{"));
            w.line(format!(
                "{dst} = make({}, len({src}))",
                self.formatter.format(&projection.target_container_type)
            ));
            w.close("}");
        }

        w.open(format!("for i := range {src} {{"));
        if target_is_array {
            break_past_end(w, "i", &dst);
        }
        let src_elem = format!("{src}[i]");
        let dst_elem = format!("{dst}[i]");
        let guards: Vec<String> = projection
            .source_pointers
            .iter()
            .map(|path| format!("{} != nil", path.selector(&src_elem)))
            .collect();
        if !guards.is_empty() {
            w.open(format!("if {} {{", guards.join(" && ")));
        }
        for (path, ty) in &projection.target_pointers {
            let pointee = scope
                .underlying(ty)
                .elem()
                .cloned()
                .unwrap_or_else(|| ty.clone());
            let selector = path.selector(&dst_elem);
            w.open(format!("if {selector} == nil {{"));
            w.line(format!("{selector} = new({})", self.formatter.format(&pointee)));
            w.close("}");
        }

        let element_src = projection.source_rest.selector(&src_elem);
        let element_dst = projection.target_rest.selector(&dst_elem);
        self.assign(w, &element_dst, &element_src, conversion, 1);
        if !guards.is_empty() {
            w.close("}");
        }
        w.close("}");

        if source_is_slice {
            w.close("}");
        }
    }

    /// Emit statements assigning `src` converted by `conversion` to `dst`
    fn assign(
        &mut self,
        w: &mut CodeWriter,
        dst: &str,
        src: &str,
        conversion: &Conversion,
        depth: usize,
    ) {
        if conversion.fallback {
            let source = self.formatter.format(&conversion.source);
            let target = self.formatter.format(&conversion.target);
            w.line(format!(
                "// caster: no conversion from {source} to {target}; assigned as-is"
            ));
            w.line(format!("{dst} = {src}"));
            return;
        }

        if let Some(value) = self.value(src, conversion) {
            w.line(format!("{dst} = {value}"));
            return;
        }

        let Some(inner) = conversion.elem.as_deref() else {
            w.line(format!("{dst} = {src}"));
            return;
        };

        match conversion.strategy {
            ConversionStrategy::PointerDeref => {
                w.open(format!("if {src} != nil {{"));
                self.assign(w, dst, &format!("*{src}"), inner, depth);
                w.reopen("} else {");
                let zero = match self.nil_default.clone().filter(|_| depth == 0) {
                    Some(literal) => literal,
                    None => self.zero_value(&conversion.target, w),
                };
                w.line(format!("{dst} = {zero}"));
                w.close("}");
            }
            ConversionStrategy::PointerWrap => {
                self.wrap_in_closure(w, dst, src, inner, depth);
            }
            ConversionStrategy::PointerNestedCast => {
                w.open(format!("if {src} != nil {{"));
                self.wrap_in_closure(w, dst, &format!("*{src}"), inner, depth);
                w.close("}");
            }
            ConversionStrategy::SliceMap => self.assign_sequence(w, dst, src, conversion, inner, depth),
            ConversionStrategy::Map => self.assign_map(w, dst, src, conversion, inner, depth),
            _ => w.line(format!("{dst} = {src}")),
        }
    }

    /// Single-expression form, when the strategy has one
    fn value(&mut self, src: &str, conversion: &Conversion) -> Option<String> {
        match conversion.strategy {
            ConversionStrategy::DirectAssign => Some(src.to_string()),
            ConversionStrategy::Convert => {
                let target = self.formatter.format(&conversion.target);
                if target.starts_with('*') || target.starts_with("func") {
                    Some(format!("({target})({src})"))
                } else {
                    Some(format!("{target}({src})"))
                }
            }
            ConversionStrategy::NestedCast => {
                let key = conversion.nested.as_ref()?;
                let name = self
                    .plan
                    .pair(key)
                    .map_or_else(|| caster_name(self.plan.graph(), key), |p| p.caster_name.clone());
                let mut args = vec![src.to_string()];
                args.extend(self.extras.iter().cloned());
                Some(format!("{name}({})", args.join(", ")))
            }
            _ => None,
        }
    }

    /// `dst = func() *T { p := ...; return &p }()`
    fn wrap_in_closure(
        &mut self,
        w: &mut CodeWriter,
        dst: &str,
        src: &str,
        inner: &Conversion,
        depth: usize,
    ) {
        let local = var("p", depth + 1);
        let pointee = self.formatter.format(&inner.target);
        w.open(format!("{dst} = func() *{pointee} {{"));
        match self.value(src, inner).filter(|_| !inner.fallback) {
            Some(value) => w.line(format!("{local} := {value}")),
            None => {
                w.line(format!("var {local} {pointee}"));
                self.assign(w, &local, src, inner, depth + 1);
            }
        }
        w.line(format!("return &{local}"));
        w.close("}()");
    }

    fn assign_sequence(
        &mut self,
        w: &mut CodeWriter,
        dst: &str,
        src: &str,
        conversion: &Conversion,
        elem: &Conversion,
        depth: usize,
    ) {
        let scope = self.plan.scope();
        let source_is_slice = matches!(scope.underlying(&conversion.source), TypeExpr::Slice(_));
        let target_is_array = matches!(
            scope.underlying(&conversion.target),
            TypeExpr::Array { .. }
        );
        let index = var("i", depth);

        if target_is_array {
            w.open(format!("for {index} := range {src} {{"));
            break_past_end(w, &index, dst);
            self.assign(
                w,
                &format!("{dst}[{index}]"),
                &element(src, &index),
                elem,
                depth + 1,
            );
            w.close("}");
            return;
        }

        if source_is_slice {
            w.open(format!("if {src} != nil {{"));
        }
        w.line(format!(
            "{dst} = make({}, len({src}))",
            self.formatter.format(&conversion.target)
        ));
        w.open(format!("for {index} := range {src} {{"));
        self.assign(
            w,
            &format!("{dst}[{index}]"),
            &element(src, &index),
            elem,
            depth + 1,
        );
        w.close("}");
        if source_is_slice {
            w.close("}");
        }
    }

    fn assign_map(
        &mut self,
        w: &mut CodeWriter,
        dst: &str,
        src: &str,
        conversion: &Conversion,
        elem: &Conversion,
        depth: usize,
    ) {
        let key = var("k", depth);
        let value = var("v", depth);

        w.open(format!("if {src} != nil {{"));
        w.line(format!(
            "{dst} = make({}, len({src}))",
            self.formatter.format(&conversion.target)
        ));
        w.open(format!("for {key}, {value} := range {src} {{"));

        let key_expr = match conversion.key.as_deref() {
            Some(key_conversion) if key_conversion.fallback => {
                let source = self.formatter.format(&key_conversion.source);
                let target = self.formatter.format(&key_conversion.target);
                w.line(format!(
                    "// caster: no conversion from {source} to {target}; assigned as-is"
                ));
                key.clone()
            }
            Some(key_conversion) => self.value(&key, key_conversion).unwrap_or_else(|| key.clone()),
            None => key.clone(),
        };
        self.assign(w, &format!("{dst}[{key_expr}]"), &value, elem, depth + 1);

        w.close("}");
        w.close("}");
    }

    /// Zero value of `ty`; struct zero values get a fidelity-loss comment
    fn zero_value(&mut self, ty: &TypeExpr, w: &mut CodeWriter) -> String {
        let scope = self.plan.scope();
        match scope.underlying(ty) {
            TypeExpr::Basic(name) => match name.as_str() {
                "string" => "\"\"".to_string(),
                "bool" => "false".to_string(),
                "any" | "error" => "nil".to_string(),
                n if is_numeric(n) => "0".to_string(),
                _ => format!("*new({})", self.formatter.format(ty)),
            },
            TypeExpr::Pointer(_) | TypeExpr::Slice(_) | TypeExpr::Map { .. } => "nil".to_string(),
            TypeExpr::Array { .. } => format!("{}{{}}", self.formatter.format(ty)),
            TypeExpr::Named(_) if scope.struct_of(ty).is_some() => {
                let text = self.formatter.format(ty);
                w.line(format!("// caster: nil source yields an empty {text}"));
                format!("{text}{{}}")
            }
            TypeExpr::Named(_) => format!("*new({})", self.formatter.format(ty)),
        }
    }
}

fn is_numeric(name: &str) -> bool {
    matches!(
        name,
        "int"
            | "int8"
            | "int16"
            | "int32"
            | "int64"
            | "uint"
            | "uint8"
            | "uint16"
            | "uint32"
            | "uint64"
            | "uintptr"
            | "float32"
            | "float64"
            | "complex64"
            | "complex128"
            | "byte"
            | "rune"
    )
}

/// Depth-suffixed local name: `i`, `i1`, `i2`, ...
fn var(base: &str, depth: usize) -> String {
    if depth == 0 {
        base.to_string()
    } else {
        format!("{base}{depth}")
    }
}

/// Index expression, parenthesizing a dereference
fn element(src: &str, index: &str) -> String {
    if src.starts_with('*') {
        format!("({src})[{index}]")
    } else {
        format!("{src}[{index}]")
    }
}

fn break_past_end(w: &mut CodeWriter, index: &str, dst: &str) {
    w.open(format!("if {index} >= len({dst}) {{"));
    w.line("break");
    w.close("}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_writer_indents() {
        let mut w = CodeWriter::new(1);
        w.open("if x {");
        w.line("y()");
        w.reopen("} else {");
        w.line("z()");
        w.close("}");
        assert_eq!(
            w.lines(),
            &["\tif x {", "\t\ty()", "\t} else {", "\t\tz()", "\t}"]
        );
    }

    #[test]
    fn test_depth_suffixed_names() {
        assert_eq!(var("i", 0), "i");
        assert_eq!(var("i", 2), "i2");
        assert_eq!(element("*in.Tags", "i"), "(*in.Tags)[i]");
        assert_eq!(element("in.Tags", "i1"), "in.Tags[i1]");
    }
}
