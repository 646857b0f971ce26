//! Walks a JSON value against a resolved type node, applying version gates
//! and accumulating diagnostics.
//!
//! Validation never fails with an error value: every schema-vs-data
//! mismatch becomes a [`Diagnostic`] and control always returns. Recursion
//! is bounded by the JSON tree, so cyclic type graphs are safe to traverse;
//! the only guarded case is a pure reference cycle with no structure in
//! between, which is reported as an internal error.

use crate::error::{Diagnostic, DiagnosticKind};
use crate::json::JsonValue;
use crate::typegraph::{
    DispatcherRegistry, KeySelector, NodeKind, ResolvedFieldKind, StructNode, TypeGraph, TypeRef,
};
use crate::version::{Version, VersionGate};

/// Validates `json` against the node `start` for `version`, returning the
/// diagnostics in depth-first traversal order.
pub fn validate(
    graph: &TypeGraph,
    registry: &DispatcherRegistry,
    start: TypeRef,
    json: &JsonValue,
    version: Version,
) -> Vec<Diagnostic> {
    let mut checker = Checker {
        graph,
        registry,
        version,
        path: Vec::new(),
        ancestors: Vec::new(),
        active_key: None,
        same_value_depth: 0,
        diagnostics: Vec::new(),
    };
    checker.check(start, json);
    checker.diagnostics
}

enum PathSeg {
    Field(String),
    Index(usize),
    Hop(String),
}

struct Checker<'a> {
    graph: &'a TypeGraph,
    registry: &'a DispatcherRegistry,
    version: Version,
    path: Vec<PathSeg>,
    /// Enclosing containers of the value under validation, outermost first.
    ancestors: Vec<&'a JsonValue>,
    /// The computed-field key currently being matched, for `[[%key]]`.
    active_key: Option<String>,
    /// How many times the checker has re-entered itself on the same JSON
    /// value (unions, constraints, dispatchers). Reset on every descent
    /// into a child value; a chain longer than the graph must be a cycle.
    same_value_depth: usize,
    diagnostics: Vec<Diagnostic>,
}

/// A struct field after dynamic spreads have been spliced in.
struct EffectiveField {
    kind: EffectiveKind,
    value: TypeRef,
    gate: VersionGate,
}

enum EffectiveKind {
    Named { name: String, optional: bool },
    Computed { key: TypeRef },
}

impl<'a> Checker<'a> {
    fn check(&mut self, start: TypeRef, value: &'a JsonValue) {
        let graph = self.graph;

        // Follow plain references, honoring each wrapper's gate. A gated
        // node that does not apply for the target version validates
        // vacuously.
        let mut r = start;
        let mut hops = 0usize;
        loop {
            let node = graph.node(r);
            if !node.gate.applies(self.version) {
                return;
            }
            if let NodeKind::Ref(target) = node.kind {
                hops += 1;
                if hops > graph.len() {
                    self.push(Diagnostic::error(
                        DiagnosticKind::InternalError,
                        "type reference cycle with no intervening structure",
                    ));
                    return;
                }
                r = target;
                continue;
            }
            break;
        }

        match &graph.node(r).kind {
            NodeKind::Unknown | NodeKind::Param(_) => {}

            NodeKind::Primitive(prim) => self.check_primitive(*prim, value),

            NodeKind::Literal(expected) => {
                if !literal_matches(expected, value) {
                    self.push(Diagnostic::error(
                        DiagnosticKind::TypeMismatch,
                        format!("expected {expected}, got {}", brief(value)),
                    ));
                }
            }

            NodeKind::Constrained { base, range } => {
                let before = self.diagnostics.len();
                self.check_same_value(*base, value);
                if self.diagnostics.len() > before {
                    return;
                }
                if let Some(n) = value.as_f64() {
                    if let Some(violation) = range.explain_violation(n) {
                        self.push(Diagnostic::error(DiagnosticKind::OutOfRange, violation));
                    }
                } else if let JsonValue::String(s) = value {
                    let len = s.chars().count();
                    if !range.contains(len as f64) {
                        self.push(Diagnostic::error(
                            DiagnosticKind::LengthOutOfRange,
                            format!("string length {len} is outside the range {range}"),
                        ));
                    }
                } else if let JsonValue::Array(items) = value {
                    let len = items.len();
                    if !range.contains(len as f64) {
                        self.push(Diagnostic::error(
                            DiagnosticKind::LengthOutOfRange,
                            format!("array length {len} is outside the range {range}"),
                        ));
                    }
                }
            }

            NodeKind::Array { element, len } => {
                let JsonValue::Array(items) = value else {
                    self.push(Diagnostic::error(
                        DiagnosticKind::TypeMismatch,
                        format!("expected array, got {}", value.type_name()),
                    ));
                    return;
                };
                if let Some(range) = len {
                    let count = items.len();
                    if !range.contains(count as f64) {
                        self.push(Diagnostic::error(
                            DiagnosticKind::LengthOutOfRange,
                            format!("array length {count} is outside the range {range}"),
                        ));
                    }
                }
                let element = *element;
                for (i, item) in items.iter().enumerate() {
                    self.path.push(PathSeg::Index(i));
                    self.ancestors.push(value);
                    self.check_child_value(element, item);
                    self.ancestors.pop();
                    self.path.pop();
                }
            }

            NodeKind::Enum { values, .. } => {
                if !values.iter().any(|v| literal_matches(v, value)) {
                    self.push(Diagnostic::error(
                        DiagnosticKind::EnumValueNotAllowed,
                        format!("{} is not one of the allowed enum values", brief(value)),
                    ));
                }
            }

            NodeKind::Struct(s) => self.check_struct(s, value),

            NodeKind::Union(variants) => self.check_union(variants, value),

            NodeKind::Dispatch { resource, selector } => {
                self.check_dispatch(resource, selector, value);
            }

            NodeKind::Ref(_) => unreachable!("references are unwrapped above"),
        }
    }

    fn check_primitive(&mut self, prim: crate::ast::PrimitiveKind, value: &JsonValue) {
        use crate::ast::PrimitiveKind::*;
        let ok = match prim {
            Any => true,
            String => matches!(value, JsonValue::String(_)),
            Boolean => matches!(value, JsonValue::Boolean(_)),
            // Whole-valued floats are acceptable integers.
            Int => match value {
                JsonValue::Integer(_) => true,
                JsonValue::Float(_) => value.is_integral(),
                _ => false,
            },
            Float | Double => matches!(value, JsonValue::Integer(_) | JsonValue::Float(_)),
        };
        if !ok {
            let got = match (prim, value) {
                (Int, JsonValue::Float(f)) => format!("non-integral number {f}"),
                _ => value.type_name().to_string(),
            };
            self.push(Diagnostic::error(
                DiagnosticKind::TypeMismatch,
                format!("expected {}, got {got}", prim.name()),
            ));
        }
    }

    // === Structs ===

    fn check_struct(&mut self, s: &StructNode, value: &'a JsonValue) {
        let Some(entries) = value.as_object() else {
            self.push(Diagnostic::error(
                DiagnosticKind::TypeMismatch,
                format!("expected object, got {}", value.type_name()),
            ));
            return;
        };

        let mut fields = Vec::new();
        let mut unknown_spread = s.unknown_spread;
        self.collect_fields(s, value, VersionGate::OPEN, &mut fields, &mut unknown_spread, 0);

        let mut consumed = vec![false; entries.len()];
        let mut has_catch_all = false;

        for field in &fields {
            if !field.gate.applies(self.version) {
                continue;
            }
            match &field.kind {
                EffectiveKind::Named { name, optional } => {
                    match entries.iter().position(|(k, _)| k == name) {
                        Some(idx) => {
                            consumed[idx] = true;
                            self.path.push(PathSeg::Field(name.clone()));
                            self.ancestors.push(value);
                            self.check_child_value(field.value, &entries[idx].1);
                            self.ancestors.pop();
                            self.path.pop();
                        }
                        None if !optional => {
                            self.push(Diagnostic::error(
                                DiagnosticKind::MissingRequiredField,
                                format!("required field '{name}' is missing"),
                            ));
                        }
                        None => {}
                    }
                }
                EffectiveKind::Computed { key } => {
                    if self.is_any_key(*key) {
                        has_catch_all = true;
                    }
                    for idx in 0..entries.len() {
                        if consumed[idx] {
                            continue;
                        }
                        let key_str = entries[idx].0.clone();
                        if !self.key_matches(*key, &key_str) {
                            continue;
                        }
                        consumed[idx] = true;
                        self.path.push(PathSeg::Field(key_str.clone()));
                        self.ancestors.push(value);
                        let saved_key = self.active_key.replace(key_str);
                        self.check_child_value(field.value, &entries[idx].1);
                        self.active_key = saved_key;
                        self.ancestors.pop();
                        self.path.pop();
                    }
                }
            }
        }

        if !unknown_spread && !has_catch_all {
            for (idx, (key, _)) in entries.iter().enumerate() {
                if !consumed[idx] {
                    self.path.push(PathSeg::Field(key.clone()));
                    self.push(Diagnostic::error(
                        DiagnosticKind::UnexpectedField,
                        format!("unexpected field '{key}'"),
                    ));
                    self.path.pop();
                }
            }
        }
    }

    /// Flattens a struct's field list, splicing in dynamically dispatched
    /// spreads now that the JSON object is available.
    fn collect_fields(
        &mut self,
        s: &StructNode,
        value: &'a JsonValue,
        extra_gate: VersionGate,
        out: &mut Vec<EffectiveField>,
        unknown_spread: &mut bool,
        depth: usize,
    ) {
        if depth > 32 {
            *unknown_spread = true;
            return;
        }

        for field in &s.fields {
            let gate = field.gate.conjoin(&extra_gate);
            match &field.kind {
                ResolvedFieldKind::Named { name, optional } => {
                    push_effective(
                        out,
                        EffectiveField {
                            kind: EffectiveKind::Named {
                                name: name.clone(),
                                optional: *optional,
                            },
                            value: field.value,
                            gate,
                        },
                    );
                }
                ResolvedFieldKind::Computed { key } => {
                    out.push(EffectiveField {
                        kind: EffectiveKind::Computed { key: *key },
                        value: field.value,
                        gate,
                    });
                }
                ResolvedFieldKind::DynamicSpread => {
                    if !gate.applies(self.version) {
                        continue;
                    }
                    self.splice_spread(field.value, value, gate, out, unknown_spread, depth);
                }
            }
        }
    }

    fn splice_spread(
        &mut self,
        spread: TypeRef,
        value: &'a JsonValue,
        gate: VersionGate,
        out: &mut Vec<EffectiveField>,
        unknown_spread: &mut bool,
        depth: usize,
    ) {
        let graph = self.graph;
        let Some(target) = self.deref(spread) else {
            return; // gated out for this version
        };

        let (resource, selector) = match &graph.node(target).kind {
            NodeKind::Dispatch { resource, selector } => (resource, selector),
            NodeKind::Struct(inner) => {
                self.collect_fields(inner, value, gate, out, unknown_spread, depth + 1);
                return;
            }
            _ => {
                *unknown_spread = true;
                return;
            }
        };

        let variant = match self.eval_selector(selector, value) {
            Some(key) => match self
                .registry
                .lookup(resource, &key)
                .or_else(|| self.registry.fallback(resource))
            {
                Some(variant) => variant,
                None => {
                    *unknown_spread = true;
                    self.push(Diagnostic::error(
                        DiagnosticKind::UnknownDispatchKey,
                        format!("unknown dispatch key \"{key}\" for {resource}"),
                    ));
                    return;
                }
            },
            None => match self.registry.fallback(resource) {
                Some(variant) => variant,
                None => {
                    *unknown_spread = true;
                    self.push(Diagnostic::error(
                        DiagnosticKind::UnknownDispatchKey,
                        format!("cannot determine dispatch key for {resource}"),
                    ));
                    return;
                }
            },
        };

        match self.deref(variant).map(|r| &graph.node(r).kind) {
            Some(NodeKind::Struct(inner)) => {
                self.collect_fields(inner, value, gate, out, unknown_spread, depth + 1);
            }
            _ => {
                *unknown_spread = true;
            }
        }
    }

    // === Unions ===

    fn check_union(&mut self, variants: &[TypeRef], value: &'a JsonValue) {
        let applicable: Vec<TypeRef> = variants
            .iter()
            .copied()
            .filter(|v| self.graph.node(*v).gate.applies(self.version))
            .collect();

        // No alternative is active for this version: there is no schema to
        // check against, so the value passes.
        if applicable.is_empty() {
            return;
        }

        let mut summaries = Vec::new();
        for variant in applicable {
            let before = self.diagnostics.len();
            self.check_same_value(variant, value);
            if self.diagnostics.len() == before {
                return; // first success wins; earlier attempts are discarded
            }
            let first = self.diagnostics[before]
                .message
                .lines()
                .next()
                .unwrap_or_default()
                .to_string();
            summaries.push(first);
            self.diagnostics.truncate(before);
        }

        self.push(Diagnostic::error(
            DiagnosticKind::NoUnionMatch,
            format!("value matches no union alternative: {}", summaries.join("; ")),
        ));
    }

    // === Dispatchers ===

    fn check_dispatch(&mut self, resource: &str, selector: &KeySelector, value: &'a JsonValue) {
        let key = self.eval_selector(selector, value);

        let target = match &key {
            Some(k) => self
                .registry
                .lookup(resource, k)
                .or_else(|| self.registry.fallback(resource)),
            None => self.registry.fallback(resource),
        };

        match target {
            Some(target) => {
                let hop = match (selector, &key) {
                    (KeySelector::SiblingField(field), Some(k)) => format!("#{field}={k}"),
                    (_, Some(k)) => format!("#{k}"),
                    (_, None) => "#%fallback".to_string(),
                };
                self.path.push(PathSeg::Hop(hop));
                self.check_same_value(target, value);
                self.path.pop();
            }
            None => match key {
                Some(k) => self.push(Diagnostic::error(
                    DiagnosticKind::UnknownDispatchKey,
                    format!("unknown dispatch key \"{k}\" for {resource}"),
                )),
                None => self.push(Diagnostic::error(
                    DiagnosticKind::UnknownDispatchKey,
                    format!("cannot determine dispatch key for {resource}"),
                )),
            },
        }
    }

    /// Evaluates a discriminator selector against the current JSON cursor.
    /// Pure: only the value itself and its ancestors are consulted.
    fn eval_selector(&self, selector: &KeySelector, value: &JsonValue) -> Option<String> {
        match selector {
            KeySelector::Static(key) => Some(key.clone()),
            KeySelector::SiblingField(name) => {
                if let Some(v) = value.get(name) {
                    return v.as_str().map(str::to_string);
                }
                self.ancestors
                    .iter()
                    .rev()
                    .find_map(|a| a.get(name))
                    .and_then(JsonValue::as_str)
                    .map(str::to_string)
            }
            KeySelector::ComputedKey => self.active_key.clone(),
            KeySelector::ParentWalk(segments) => {
                let mut cursor = *self
                    .ancestors
                    .iter()
                    .rev()
                    .find(|a| matches!(a, JsonValue::Object(_)))?;
                for segment in segments {
                    cursor = cursor.get(segment)?;
                }
                cursor.as_str().map(str::to_string)
            }
        }
    }

    // === Helpers ===

    /// Re-enters the checker on the same JSON value. A chain of same-value
    /// hops longer than the graph must revisit a node, so it is a schema
    /// cycle with no structure in between.
    fn check_same_value(&mut self, r: TypeRef, value: &'a JsonValue) {
        self.same_value_depth += 1;
        if self.same_value_depth > self.graph.len() {
            self.push(Diagnostic::error(
                DiagnosticKind::InternalError,
                "type cycle with no intervening structure",
            ));
        } else {
            self.check(r, value);
        }
        self.same_value_depth -= 1;
    }

    /// Descends into a child JSON value; recursion from here on is bounded
    /// by the JSON tree again.
    fn check_child_value(&mut self, r: TypeRef, value: &'a JsonValue) {
        let saved = std::mem::take(&mut self.same_value_depth);
        self.check(r, value);
        self.same_value_depth = saved;
    }

    /// Follows reference nodes to the structural node behind them. `None`
    /// when a wrapper's gate excludes the target version.
    fn deref(&self, start: TypeRef) -> Option<TypeRef> {
        let mut r = start;
        for _ in 0..=self.graph.len() {
            let node = self.graph.node(r);
            if !node.gate.applies(self.version) {
                return None;
            }
            match node.kind {
                NodeKind::Ref(target) => r = target,
                _ => return Some(r),
            }
        }
        None
    }

    /// Whether an object key matches a computed-field key type.
    fn key_matches(&self, key: TypeRef, candidate: &str) -> bool {
        self.key_matches_inner(key, candidate, 0)
    }

    fn key_matches_inner(&self, key: TypeRef, candidate: &str, depth: usize) -> bool {
        if depth > self.graph.len() {
            return false;
        }
        let Some(r) = self.deref(key) else {
            return false;
        };
        match &self.graph.node(r).kind {
            NodeKind::Unknown | NodeKind::Param(_) => true,
            NodeKind::Primitive(p) => {
                use crate::ast::PrimitiveKind::*;
                matches!(p, String | Any)
            }
            NodeKind::Literal(crate::ast::LiteralValue::String(s)) => s == candidate,
            NodeKind::Literal(_) => false,
            NodeKind::Enum { values, .. } => values.iter().any(|v| {
                matches!(v, crate::ast::LiteralValue::String(s) if s == candidate)
            }),
            NodeKind::Union(variants) => variants
                .iter()
                .any(|v| self.key_matches_inner(*v, candidate, depth + 1)),
            NodeKind::Constrained { base, range } => {
                self.key_matches_inner(*base, candidate, depth + 1)
                    && range.contains(candidate.chars().count() as f64)
            }
            _ => false,
        }
    }

    /// Whether a computed-field key type accepts every key.
    fn is_any_key(&self, key: TypeRef) -> bool {
        match self.deref(key).map(|r| &self.graph.node(r).kind) {
            Some(NodeKind::Unknown | NodeKind::Param(_)) => true,
            Some(NodeKind::Primitive(crate::ast::PrimitiveKind::Any)) => true,
            _ => false,
        }
    }

    fn push(&mut self, diagnostic: Diagnostic) {
        let path = self.render_path();
        self.diagnostics.push(diagnostic.at_json(path));
    }

    fn render_path(&self) -> String {
        let mut out = String::new();
        for seg in &self.path {
            match seg {
                PathSeg::Field(name) | PathSeg::Hop(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                PathSeg::Index(i) => {
                    out.push_str(&format!("[{i}]"));
                }
            }
        }
        out
    }
}

/// Appends an effective field, replacing any earlier named field of the
/// same name.
fn push_effective(out: &mut Vec<EffectiveField>, field: EffectiveField) {
    if let EffectiveKind::Named { name, .. } = &field.kind {
        out.retain(
            |existing| !matches!(&existing.kind, EffectiveKind::Named { name: n, .. } if n == name),
        );
    }
    out.push(field);
}

/// Deep equality between a schema literal and a JSON value, with whole
/// floats equal to their integer counterparts.
fn literal_matches(expected: &crate::ast::LiteralValue, value: &JsonValue) -> bool {
    use crate::ast::LiteralValue;
    match (expected, value) {
        (LiteralValue::String(a), JsonValue::String(b)) => a == b,
        (LiteralValue::Boolean(a), JsonValue::Boolean(b)) => a == b,
        (LiteralValue::Number(a), _) => value.as_f64() == Some(*a),
        _ => false,
    }
}

/// A short, human-readable rendering of a JSON value for messages.
fn brief(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "null".to_string(),
        JsonValue::Boolean(b) => b.to_string(),
        JsonValue::Integer(i) => i.to_string(),
        JsonValue::Float(f) => f.to_string(),
        JsonValue::String(s) => format!("\"{s}\""),
        JsonValue::Array(_) => "array".to_string(),
        JsonValue::Object(_) => "object".to_string(),
    }
}
