//! The resolved, read-only graph of type nodes produced by the
//! [`resolver`](crate::resolver) and consumed by the
//! [`validator`](crate::validator).
//!
//! Nodes live in an arena ([`TypeGraph`]) and reference each other by
//! [`TypeRef`] handles, so cyclic schemas (a struct that transitively
//! references itself) are represented naturally. Every named item of every
//! module is reachable through its fully qualified path.

use crate::ast::{Attribute, LiteralValue, PrimitiveKind, RangeExpr};
use crate::error::SchemaSpan;
use crate::version::VersionGate;
use std::collections::HashMap;
use std::fmt;

/// A handle to a node in a [`TypeGraph`]. Handles are only meaningful for
/// the graph that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef(pub(crate) usize);

impl TypeRef {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A resolved type node: its shape, version gate, provenance, and the
/// attributes that survived resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeNode {
    pub kind: NodeKind,
    pub gate: VersionGate,
    /// Where in the schema sources this node was declared, when known.
    pub origin: Option<SchemaSpan>,
    /// Recognized attributes that do not gate validation (`id`, `nbt_path`,
    /// `random`).
    pub semantic: Vec<Attribute>,
    /// Everything else, preserved verbatim and never validated against.
    pub opaque: Vec<Attribute>,
}

impl TypeNode {
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            gate: VersionGate::OPEN,
            origin: None,
            semantic: Vec::new(),
            opaque: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Sentinel for anything that failed to resolve; validates any value.
    Unknown,
    Primitive(PrimitiveKind),
    Literal(LiteralValue),
    /// An indirection to another node, used for attributed references and
    /// alias bodies that are plain references.
    Ref(TypeRef),
    /// A base type with a numeric (or string/array length) constraint.
    Constrained { base: TypeRef, range: NumericRange },
    Array {
        element: TypeRef,
        len: Option<NumericRange>,
    },
    Struct(StructNode),
    Enum {
        base: PrimitiveKind,
        values: Vec<LiteralValue>,
    },
    /// Ordered alternatives; the validator short-circuits on first success.
    Union(Vec<TypeRef>),
    /// A lazy reference into the dispatcher registry.
    Dispatch {
        resource: String,
        selector: KeySelector,
    },
    /// A generic parameter that was never instantiated. Validates like
    /// Unknown.
    Param(String),
}

/// A struct with its spread fields flattened (where statically possible).
#[derive(Debug, Clone, PartialEq)]
pub struct StructNode {
    pub fields: Vec<ResolvedField>,
    /// Set when a spread target could not be resolved; suppresses
    /// unexpected-field reporting because the full key set is unknowable.
    pub unknown_spread: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub kind: ResolvedFieldKind,
    /// The field's value type. For `DynamicSpread` this is the dispatcher
    /// node whose fields get spliced in at validation time.
    pub value: TypeRef,
    pub gate: VersionGate,
    pub origin: Option<SchemaSpan>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedFieldKind {
    Named { name: String, optional: bool },
    /// `[KeyType]: ValueType` — matches any object key accepted by the key
    /// type.
    Computed { key: TypeRef },
    /// `...minecraft:chunk_generator[[type]]` — which struct gets inlined
    /// depends on the JSON being validated.
    DynamicSpread,
}

/// How a dispatcher node finds its discriminator value.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySelector {
    /// A fixed key chosen in the schema text (`[flat]`).
    Static(String),
    /// Read a sibling field of the value under validation (`[[type]]`).
    SiblingField(String),
    /// The computed-field key currently being matched (`[[%key]]`).
    ComputedKey,
    /// Walk to the parent object, then down named fields (`[[%parent.x]]`).
    ParentWalk(Vec<String>),
}

/// A numeric interval with optional open endpoints and per-side
/// exclusivity, used for value ranges and length ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub min_exclusive: bool,
    pub max_exclusive: bool,
}

impl From<RangeExpr> for NumericRange {
    fn from(r: RangeExpr) -> Self {
        Self {
            min: r.min,
            max: r.max,
            min_exclusive: r.min_exclusive,
            max_exclusive: r.max_exclusive,
        }
    }
}

impl NumericRange {
    /// Returns a human-readable violation for `value`, or `None` when the
    /// value is inside the range.
    #[must_use]
    pub fn explain_violation(&self, value: f64) -> Option<String> {
        if let Some(min) = self.min {
            if self.min_exclusive && value <= min {
                return Some(format!("value {value} must be greater than {min}"));
            }
            if !self.min_exclusive && value < min {
                return Some(format!(
                    "value {value} must be greater than or equal to {min}"
                ));
            }
        }
        if let Some(max) = self.max {
            if self.max_exclusive && value >= max {
                return Some(format!("value {value} must be less than {max}"));
            }
            if !self.max_exclusive && value > max {
                return Some(format!("value {value} must be less than or equal to {max}"));
            }
        }
        None
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.explain_violation(value).is_none()
    }
}

impl fmt::Display for NumericRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(min) = self.min {
            write!(f, "{min}")?;
        }
        if self.min_exclusive {
            write!(f, "<")?;
        }
        write!(f, "..")?;
        if self.max_exclusive {
            write!(f, "<")?;
        }
        if let Some(max) = self.max {
            write!(f, "{max}")?;
        }
        Ok(())
    }
}

/// The arena of resolved type nodes. Immutable once resolution finishes.
#[derive(Debug, Clone)]
pub struct TypeGraph {
    nodes: Vec<TypeNode>,
    by_path: HashMap<String, TypeRef>,
}

impl TypeGraph {
    /// An empty graph containing only the shared Unknown sentinel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![TypeNode::new(NodeKind::Unknown)],
            by_path: HashMap::new(),
        }
    }

    /// The shared Unknown sentinel node.
    #[must_use]
    pub fn unknown(&self) -> TypeRef {
        TypeRef(0)
    }

    pub(crate) fn add(&mut self, node: TypeNode) -> TypeRef {
        let r = TypeRef(self.nodes.len());
        self.nodes.push(node);
        r
    }

    #[must_use]
    pub fn node(&self, r: TypeRef) -> &TypeNode {
        &self.nodes[r.0]
    }

    pub(crate) fn node_mut(&mut self, r: TypeRef) -> &mut TypeNode {
        &mut self.nodes[r.0]
    }

    pub(crate) fn bind_path(&mut self, path: String, r: TypeRef) {
        self.by_path.insert(path, r);
    }

    /// Looks up a named item by its fully qualified path, e.g.
    /// `java::data::worldgen::biome::Biome`.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<TypeRef> {
        self.by_path.get(path).copied()
    }

    /// All bound paths, for inspection and tests.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.by_path.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for TypeGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps `(dispatcher resource, key)` pairs to resolved types, with an
/// optional per-resource fallback registered via `%fallback`, `%unknown`
/// or `%none`.
#[derive(Debug, Clone, Default)]
pub struct DispatcherRegistry {
    resources: HashMap<String, DispatchMap>,
}

#[derive(Debug, Clone, Default)]
pub struct DispatchMap {
    pub variants: HashMap<String, TypeRef>,
    pub fallback: Option<TypeRef>,
}

impl DispatcherRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register_variant(&mut self, resource: &str, key: &str, target: TypeRef) {
        self.resources
            .entry(resource.to_string())
            .or_default()
            .variants
            .insert(key.to_string(), target);
    }

    pub(crate) fn register_fallback(&mut self, resource: &str, target: TypeRef) {
        self.resources
            .entry(resource.to_string())
            .or_default()
            .fallback = Some(target);
    }

    /// The variant registered for `key`, if any.
    #[must_use]
    pub fn lookup(&self, resource: &str, key: &str) -> Option<TypeRef> {
        self.resources.get(resource)?.variants.get(key).copied()
    }

    /// The fallback variant for a resource, if one was registered.
    #[must_use]
    pub fn fallback(&self, resource: &str) -> Option<TypeRef> {
        self.resources.get(resource)?.fallback
    }

    #[must_use]
    pub fn variants(&self, resource: &str) -> Option<&HashMap<String, TypeRef>> {
        self.resources.get(resource).map(|m| &m.variants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_starts_with_unknown_sentinel() {
        let graph = TypeGraph::new();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.node(graph.unknown()).kind, NodeKind::Unknown);
    }

    #[test]
    fn test_range_inclusive_bounds() {
        let range = NumericRange {
            min: Some(0.0),
            max: Some(1.0),
            min_exclusive: false,
            max_exclusive: false,
        };
        assert!(range.contains(0.0));
        assert!(range.contains(1.0));
        assert!(!range.contains(1.5));
        assert!(!range.contains(-0.1));
    }

    #[test]
    fn test_range_exclusive_bounds() {
        let range = NumericRange {
            min: Some(0.0),
            max: Some(1.0),
            min_exclusive: true,
            max_exclusive: true,
        };
        assert!(!range.contains(0.0));
        assert!(!range.contains(1.0));
        assert!(range.contains(0.5));
        let msg = range.explain_violation(1.0).unwrap();
        assert!(msg.contains("less than 1"));
    }

    #[test]
    fn test_range_open_endpoints() {
        let range = NumericRange {
            min: None,
            max: Some(32.0),
            min_exclusive: false,
            max_exclusive: false,
        };
        assert!(range.contains(f64::MIN));
        assert!(!range.contains(33.0));
        assert_eq!(range.to_string(), "..32");
    }

    #[test]
    fn test_range_display() {
        let range = NumericRange {
            min: Some(0.0),
            max: Some(1.0),
            min_exclusive: true,
            max_exclusive: false,
        };
        assert_eq!(range.to_string(), "0<..1");
    }

    #[test]
    fn test_registry_variant_and_fallback() {
        let mut graph = TypeGraph::new();
        let flat = graph.add(TypeNode::new(NodeKind::Unknown));
        let other = graph.add(TypeNode::new(NodeKind::Unknown));

        let mut registry = DispatcherRegistry::new();
        registry.register_variant("minecraft:chunk_generator", "flat", flat);
        registry.register_fallback("minecraft:chunk_generator", other);

        assert_eq!(
            registry.lookup("minecraft:chunk_generator", "flat"),
            Some(flat)
        );
        assert_eq!(registry.lookup("minecraft:chunk_generator", "noise"), None);
        assert_eq!(registry.fallback("minecraft:chunk_generator"), Some(other));
        assert_eq!(registry.lookup("minecraft:resource", "flat"), None);
    }
}
