//! Go source rendering
//!
//! Turns compiled pairs, generated type declarations and missing transform
//! stubs into file text. Anything that formats a type goes through the
//! file's [`TypeFormatter`] first so its imports are complete before the
//! header is written.

use crate::compile::{CompiledPair, MissingTransform};
use crate::imports::{ImportSet, TypeFormatter};
use caster_graph::TypeInfo;

/// Header line used when none is configured
pub const DEFAULT_HEADER: &str = "// Code generated by caster. DO NOT EDIT.";

/// Render one caster file
pub fn render_pair(
    mut compiled: CompiledPair<'_>,
    header: &str,
    package: &str,
    inline_type: Option<&TypeInfo>,
    stubs: &[MissingTransform],
) -> String {
    let declaration = inline_type.map(|info| render_struct(&mut compiled.formatter, info));
    let stubs: Vec<String> = stubs
        .iter()
        .map(|stub| render_stub(&mut compiled.formatter, stub))
        .collect();

    let mut out = preamble(header, package, compiled.formatter.imports());
    if let Some(declaration) = declaration {
        out.push_str(&declaration);
        out.push('\n');
    }

    out.push_str(&compiled.signature);
    out.push('\n');
    let (returns, statements) = compiled
        .body
        .split_last()
        .map_or((None, compiled.body.as_slice()), |(last, rest)| (Some(last), rest));
    for line in statements {
        out.push_str(line);
        out.push('\n');
    }
    for todo in &compiled.todos {
        out.push_str(todo);
        out.push('\n');
    }
    if let Some(returns) = returns {
        out.push_str(returns);
        out.push('\n');
    }
    out.push_str("}\n");

    for stub in stubs {
        out.push('\n');
        out.push_str(&stub);
    }
    out
}

/// Render a file holding only stubs for missing transforms
pub fn render_stub_file(
    mut formatter: TypeFormatter<'_>,
    header: &str,
    package: &str,
    stubs: &[MissingTransform],
) -> String {
    let bodies: Vec<String> = stubs
        .iter()
        .map(|stub| render_stub(&mut formatter, stub))
        .collect();

    let mut out = preamble(header, package, formatter.imports());
    out.push_str(&bodies.join("\n"));
    out
}

/// Render a file declaring synthesized types
pub fn render_type_file(
    mut formatter: TypeFormatter<'_>,
    header: &str,
    package: &str,
    types: &[&TypeInfo],
) -> String {
    let bodies: Vec<String> = types
        .iter()
        .map(|info| render_struct(&mut formatter, info))
        .collect();

    let mut out = preamble(header, package, formatter.imports());
    out.push_str(&bodies.join("\n"));
    out
}

fn preamble(header: &str, package: &str, imports: &ImportSet) -> String {
    let mut out = String::new();
    if !header.is_empty() {
        out.push_str(header);
        out.push_str("\n\n");
    }
    out.push_str("package ");
    out.push_str(package);
    out.push_str("\n\n");
    if !imports.is_empty() {
        out.push_str(&imports.render());
        out.push('\n');
    }
    out
}

/// `type Name struct { ... }` with field types aligned
pub fn render_struct(formatter: &mut TypeFormatter<'_>, info: &TypeInfo) -> String {
    let fields: Vec<(String, String)> = info
        .fields()
        .unwrap_or_default()
        .iter()
        .map(|field| (field.name.clone(), formatter.format(&field.ty)))
        .collect();
    let width = fields.iter().map(|(name, _)| name.len()).max().unwrap_or(0);

    let mut out = format!(
        "// {} is generated by caster.\ntype {} struct {{\n",
        info.id.name, info.id.name
    );
    for (name, ty) in fields {
        out.push_str(&format!("\t{name:<width$} {ty}\n"));
    }
    out.push_str("}\n");
    out
}

/// Panicking function with the signature the mapping implies
pub fn render_stub(formatter: &mut TypeFormatter<'_>, stub: &MissingTransform) -> String {
    let params: Vec<String> = stub
        .params
        .iter()
        .enumerate()
        .map(|(i, ty)| format!("a{i} {}", formatter.format_param(ty)))
        .collect();
    let results: Vec<String> = stub.results.iter().map(|ty| formatter.format(ty)).collect();
    let results = match results.as_slice() {
        [] => String::new(),
        [single] => format!(" {single}"),
        many => format!(" ({})", many.join(", ")),
    };

    format!(
        "// {name} is referenced by a mapping but not declared.\n\
         func {name}({params}){results} {{\n\
         \tpanic(\"caster: transform {name} is not implemented\")\n\
         }}\n",
        name = stub.name,
        params = params.join(", "),
    )
}
