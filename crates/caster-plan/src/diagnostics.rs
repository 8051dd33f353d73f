//! Structured diagnostics
//!
//! Planning and emission never stop at the first defect. Every problem is
//! recorded with the type pair and field path it concerns, and the whole
//! run's list is handed back to the caller.

use serde::Serialize;
use std::fmt;

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The affected mapping or pair produced no (or wrong) output
    Error,
    /// Output was produced but deserves attention
    Warning,
    /// Informational only
    Info,
}

/// Category of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Path syntax, unresolvable or unexported fields, unknown types
    Structural,
    /// N:1 / N:M without a transform
    Cardinality,
    /// Undeclared extras, unknown target paths, duplicate declarations
    Reference,
    /// Dependency cycles among assignments
    Ordering,
    /// Output text that failed to canonicalize
    Emission,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        })
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Structural => "structural",
            Self::Cardinality => "cardinality",
            Self::Reference => "reference",
            Self::Ordering => "ordering",
            Self::Emission => "emission",
        })
    }
}

/// One reported problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    /// `source -> target` label of the affected pair
    pub type_pair: String,
    /// Affected field path, when the problem is field-specific
    pub field_path: Option<String>,
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic
    pub fn new(
        severity: Severity,
        kind: DiagnosticKind,
        type_pair: impl Into<String>,
        field_path: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            kind,
            type_pair: type_pair.into(),
            field_path,
            message: message.into(),
        }
    }

    /// True for error severity
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.severity, self.kind, self.type_pair)?;
        if let Some(path) = &self.field_path {
            write!(f, " ({path})")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Outcome classification of a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Output produced, nothing to report above info level
    Clean,
    /// Output produced with warnings or per-mapping errors
    WithWarnings,
    /// No usable output
    NoOutput,
}

/// Aggregated diagnostics of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Record an error
    pub fn add_error(
        &mut self,
        kind: DiagnosticKind,
        type_pair: impl Into<String>,
        field_path: Option<String>,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic::new(
            Severity::Error,
            kind,
            type_pair,
            field_path,
            message,
        ));
    }

    /// Record a warning
    pub fn add_warning(
        &mut self,
        kind: DiagnosticKind,
        type_pair: impl Into<String>,
        field_path: Option<String>,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic::new(
            Severity::Warning,
            kind,
            type_pair,
            field_path,
            message,
        ));
    }

    /// Record an informational note
    pub fn add_info(
        &mut self,
        kind: DiagnosticKind,
        type_pair: impl Into<String>,
        field_path: Option<String>,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic::new(
            Severity::Info,
            kind,
            type_pair,
            field_path,
            message,
        ));
    }

    /// Append every diagnostic of another collection
    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// All diagnostics in recording order
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Error-severity diagnostics
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Error)
    }

    /// Warning-severity diagnostics
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Warning)
    }

    /// Check if there are any errors
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Check if there are any warnings
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }

    /// Number of diagnostics
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Classify the run given whether any output was produced
    #[must_use]
    pub fn status(&self, produced_output: bool) -> RunStatus {
        if !produced_output {
            RunStatus::NoOutput
        } else if self.has_errors() || self.has_warnings() {
            RunStatus::WithWarnings
        } else {
            RunStatus::Clean
        }
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
