//! Diagnostic output

use anyhow::Context;
use caster_plan::{Diagnostics, Severity};
use std::io::Write;
use std::path::Path;

/// Print diagnostics to stderr; info entries only when verbose
pub fn print(diagnostics: &Diagnostics, verbose: bool) {
    let stderr = std::io::stderr();
    let mut out = stderr.lock();
    for diagnostic in diagnostics {
        if diagnostic.severity == Severity::Info && !verbose {
            continue;
        }
        let _ = writeln!(out, "{diagnostic}");
    }
}

/// Write diagnostics as CSV with a header row
pub fn write_csv(path: &Path, diagnostics: &Diagnostics) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating report {}", path.display()))?;
    writer.write_record(["severity", "kind", "type_pair", "field_path", "message"])?;
    for diagnostic in diagnostics {
        writer.write_record([
            diagnostic.severity.to_string(),
            diagnostic.kind.to_string(),
            diagnostic.type_pair.clone(),
            diagnostic.field_path.clone().unwrap_or_default(),
            diagnostic.message.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// One-line summary of a run
pub fn summary(diagnostics: &Diagnostics) -> String {
    let errors = diagnostics.errors().count();
    let warnings = diagnostics.warnings().count();
    format!("{errors} error(s), {warnings} warning(s)")
}
