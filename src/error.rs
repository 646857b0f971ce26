//! Structured diagnostics produced by every stage of the pipeline.
//!
//! The core never prints, exits or throws: parse errors, resolution failures
//! and validation findings all become [`Diagnostic`] values that callers
//! inspect or render. [`Diagnostic::render`] produces a miette report for
//! callers that still have the schema source text at hand.

use crate::utils::get_line_and_column;
use miette::{Diagnostic as MietteDiagnostic, NamedSource, SourceSpan};
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;

/// How severe a diagnostic is. Callers typically exit non-zero only when at
/// least one `Error` is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// The closed set of diagnostic categories the pipeline can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    ParseError,
    UnresolvedReference,
    UnresolvedUse,
    MissingRequiredField,
    UnexpectedField,
    TypeMismatch,
    OutOfRange,
    NoUnionMatch,
    UnknownDispatchKey,
    EnumValueNotAllowed,
    LengthOutOfRange,
    ConstraintOnNonNumeric,
    InternalError,
}

/// A byte range inside a named schema module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaSpan {
    /// Canonical module path, e.g. `java::data::worldgen::biome`.
    pub module: String,
    pub start: usize,
    pub end: usize,
}

/// A single finding: what went wrong, where in the JSON, and where in the
/// schema when known.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    /// Dot- and bracket-joined path into the validated JSON document.
    /// Empty at the document root.
    pub json_path: String,
    /// The schema node this finding is attached to, when known.
    pub schema_span: Option<SchemaSpan>,
    pub hint: Option<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            message: message.into(),
            json_path: String::new(),
            schema_span: None,
            hint: None,
        }
    }

    #[must_use]
    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, message)
        }
    }

    #[must_use]
    pub fn at_json(mut self, path: impl Into<String>) -> Self {
        self.json_path = path.into();
        self
    }

    #[must_use]
    pub fn with_span(mut self, module: impl Into<String>, start: usize, end: usize) -> Self {
        self.schema_span = Some(SchemaSpan {
            module: module.into(),
            start,
            end,
        });
        self
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// 1-based line and column of the schema span inside `source`, when the
    /// diagnostic carries one.
    #[must_use]
    pub fn location(&self, source: &str) -> Option<(usize, usize)> {
        let span = self.schema_span.as_ref()?;
        Some(get_line_and_column(source, span.start))
    }

    /// Builds a miette report against the schema source this diagnostic
    /// points at. `source` must be the text of `schema_span.module`; the
    /// caller keeps module texts around (see `Compiled::render_diagnostic`).
    #[must_use]
    pub fn render(&self, source: &str) -> SchemaReport {
        let (name, span) = match &self.schema_span {
            Some(s) => (
                s.module.clone(),
                Some(SourceSpan::from((s.start, s.end.saturating_sub(s.start)))),
            ),
            None => ("<schema>".to_string(), None),
        };
        let label = if self.json_path.is_empty() {
            "here".to_string()
        } else {
            format!("while checking `{}`", self.json_path)
        };
        SchemaReport {
            message: self.message.clone(),
            src: NamedSource::new(name, source.to_string()),
            span,
            label,
            help: self.hint.clone(),
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.json_path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.json_path, self.message)
        }
    }
}

/// A renderable view of a [`Diagnostic`] with the schema source attached.
#[derive(Error, Debug, MietteDiagnostic)]
#[error("{message}")]
#[diagnostic(code(mcdoc::diagnostic))]
pub struct SchemaReport {
    message: String,
    #[source_code]
    src: NamedSource<String>,
    #[label("{label}")]
    span: Option<SourceSpan>,
    label: String,
    #[help]
    help: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let d = Diagnostic::error(DiagnosticKind::TypeMismatch, "expected string, got boolean");
        assert!(d.is_error());
        assert_eq!(d.json_path, "");
        assert!(d.schema_span.is_none());
        assert!(d.hint.is_none());
    }

    #[test]
    fn test_display_includes_json_path() {
        let d = Diagnostic::error(DiagnosticKind::OutOfRange, "value 1.5 is out of range")
            .at_json("downfall");
        assert_eq!(d.to_string(), "downfall: value 1.5 is out of range");
    }

    #[test]
    fn test_location_from_span() {
        let source = "struct Biome {\n  temperature: float\n}";
        let offset = source.find("temperature").unwrap();
        let d = Diagnostic::error(DiagnosticKind::TypeMismatch, "expected float, got string")
            .with_span("test", offset, offset + "temperature".len());
        assert_eq!(d.location(source), Some((2, 3)));
    }

    #[test]
    fn test_render_without_span() {
        let d = Diagnostic::error(DiagnosticKind::InternalError, "no such start type");
        let report = d.render("");
        assert_eq!(report.to_string(), "no such start type");
    }
}
