//! The public pipeline surface: [`parse`], [`resolve`], [`validate`], and
//! the [`compile`] convenience wrapper that runs a whole schema source set
//! through parsing and resolution in one call.
//!
//! ```rust
//! use mcdoc_core::ast::ModulePath;
//! use mcdoc_core::{compile, JsonValue, Start, Version};
//!
//! let schema = r#"
//!     dispatch minecraft:resource[worldgen/biome] to struct Biome {
//!         temperature: float,
//!         downfall: float @ 0..1,
//!     }
//! "#;
//! let compiled = compile([(ModulePath::relative(["worldgen", "biome"]), schema.to_string())]);
//! assert!(compiled.diagnostics.is_empty());
//!
//! let json = JsonValue::from(serde_json::json!({"temperature": 0.8, "downfall": 0.4}));
//! let start = Start::Dispatcher {
//!     resource: "minecraft:resource".to_string(),
//!     key: "worldgen/biome".to_string(),
//! };
//! let findings = compiled.validate(&start, &json, "1.20.1".parse::<Version>().unwrap());
//! assert!(findings.is_empty());
//! ```

use crate::ast::{Module, ModulePath};
use crate::error::{Diagnostic, DiagnosticKind};
use crate::json::JsonValue;
use crate::parser::{ParseResult, Parser};
use crate::resolver::{self, Resolution};
use crate::typegraph::{DispatcherRegistry, TypeGraph};
use crate::validator;
use crate::version::Version;
use std::collections::HashMap;

/// Parses a single module's text. Always returns an AST; syntax problems
/// are collected in `ParseResult::errors`.
#[must_use]
pub fn parse(path: ModulePath, text: &str) -> ParseResult {
    Parser::new(text).parse_module(path)
}

/// Resolves a set of parsed modules into a type graph and dispatcher
/// registry. See [`resolver::resolve`].
#[must_use]
pub fn resolve(modules: Vec<Module>) -> Resolution {
    resolver::resolve(modules)
}

/// Where validation starts: a named type, or a dispatcher variant chosen by
/// the caller (typically from the JSON file's location in the datapack).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Start {
    /// A fully qualified type path, e.g. `worldgen::biome::Biome`.
    Type(String),
    /// A dispatcher query, e.g. `minecraft:resource` + `worldgen/biome`.
    Dispatcher { resource: String, key: String },
}

/// Validates `json` against `start` for `version`.
///
/// A `start` that names nothing in the graph or registry is an input the
/// API cannot accept; it is reported as a single `InternalError`-kind
/// diagnostic rather than a panic.
#[must_use]
pub fn validate(
    graph: &TypeGraph,
    registry: &DispatcherRegistry,
    start: &Start,
    json: &JsonValue,
    version: Version,
) -> Vec<Diagnostic> {
    let node = match start {
        Start::Type(path) => match graph.lookup(path) {
            Some(node) => node,
            None => {
                return vec![Diagnostic::error(
                    DiagnosticKind::InternalError,
                    format!("start type `{path}` does not exist"),
                )];
            }
        },
        Start::Dispatcher { resource, key } => {
            match registry
                .lookup(resource, key)
                .or_else(|| registry.fallback(resource))
            {
                Some(node) => node,
                None => {
                    return vec![Diagnostic::error(
                        DiagnosticKind::InternalError,
                        format!("no dispatch target registered for {resource}[{key}]"),
                    )];
                }
            }
        }
    };
    validator::validate(graph, registry, node, json, version)
}

/// A fully compiled schema set: the resolved graph, the dispatcher
/// registry, every parse/resolve diagnostic, and the module texts kept
/// around for rendering.
pub struct Compiled {
    pub graph: TypeGraph,
    pub registry: DispatcherRegistry,
    pub diagnostics: Vec<Diagnostic>,
    sources: HashMap<String, String>,
}

/// Runs a schema source set (any iterator of `(module path, text)` pairs)
/// through parsing and resolution, in iteration order.
#[must_use]
pub fn compile<S>(sources: S) -> Compiled
where
    S: IntoIterator<Item = (ModulePath, String)>,
{
    let mut modules = Vec::new();
    let mut diagnostics = Vec::new();
    let mut texts = HashMap::new();

    for (path, text) in sources {
        let result = parse(path.clone(), &text);
        for error in &result.errors {
            diagnostics.push(error.to_diagnostic(&path));
        }
        texts.insert(path.segments.join("::"), text);
        modules.push(result.module);
    }

    let resolution = resolver::resolve(modules);
    diagnostics.extend(resolution.diagnostics);

    Compiled {
        graph: resolution.graph,
        registry: resolution.registry,
        diagnostics,
        sources: texts,
    }
}

impl Compiled {
    /// Validates a JSON document against this schema set.
    #[must_use]
    pub fn validate(&self, start: &Start, json: &JsonValue, version: Version) -> Vec<Diagnostic> {
        validate(&self.graph, &self.registry, start, json, version)
    }

    /// Whether compilation produced any error-severity diagnostics.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// The original text of a module, by canonical path.
    #[must_use]
    pub fn source(&self, module: &str) -> Option<&str> {
        self.sources.get(module).map(String::as_str)
    }

    /// Builds a miette report for a diagnostic that carries a schema span,
    /// using the retained module text.
    #[must_use]
    pub fn render_diagnostic(&self, diagnostic: &Diagnostic) -> Option<miette::Report> {
        let span = diagnostic.schema_span.as_ref()?;
        let source = self.sources.get(&span.module)?;
        Some(miette::Report::new(diagnostic.render(source)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn single(schema: &str) -> Compiled {
        compile([(ModulePath::relative(["test"]), schema.to_string())])
    }

    #[test]
    fn test_compile_and_validate_struct() {
        let compiled = single("struct Biome { temperature: float, downfall: float @ 0..1 }");
        assert!(!compiled.has_errors());

        let json = JsonValue::from(json!({"temperature": 0.8, "downfall": 0.4}));
        let start = Start::Type("test::Biome".to_string());
        assert!(compiled.validate(&start, &json, v("1.20.1")).is_empty());
    }

    #[test]
    fn test_unknown_start_type_is_internal_error() {
        let compiled = single("struct Biome {}");
        let json = JsonValue::from(json!({}));
        let start = Start::Type("test::Missing".to_string());
        let findings = compiled.validate(&start, &json, v("1.20.1"));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, DiagnosticKind::InternalError);
    }

    #[test]
    fn test_unknown_dispatcher_start_is_internal_error() {
        let compiled = single("struct Biome {}");
        let json = JsonValue::from(json!({}));
        let start = Start::Dispatcher {
            resource: "minecraft:resource".to_string(),
            key: "worldgen/biome".to_string(),
        };
        let findings = compiled.validate(&start, &json, v("1.20.1"));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, DiagnosticKind::InternalError);
    }

    #[test]
    fn test_parse_errors_surface_as_diagnostics() {
        let compiled = single("type Broken = @@@");
        assert!(compiled.has_errors());
        assert!(compiled
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::ParseError));
    }

    #[test]
    fn test_render_diagnostic_uses_retained_source() {
        let compiled = single("struct S { a: Missing }");
        let diagnostic = compiled
            .diagnostics
            .iter()
            .find(|d| d.kind == DiagnosticKind::UnresolvedReference)
            .expect("unresolved reference diagnostic");
        assert!(compiled.render_diagnostic(diagnostic).is_some());
    }

    #[test]
    fn test_diagnostics_serialize_to_json() {
        let compiled = single("struct S { a: Missing }");
        let text = serde_json::to_string(&compiled.diagnostics).unwrap();
        assert!(text.contains("unresolved_reference"));
    }
}
