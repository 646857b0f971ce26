//! Two-pass binder turning parsed modules into a [`TypeGraph`] and a
//! [`DispatcherRegistry`].
//!
//! Pass 1 mints a node identity for every named item so that cyclic
//! references are natural; pass 2 lowers item bodies into those nodes;
//! pass 3 registers dispatch statements. Resolution failures are never
//! fatal: unresolved references become the Unknown sentinel and a
//! diagnostic, and the pipeline keeps going.

use crate::ast::*;
use crate::error::{Diagnostic, DiagnosticKind, SchemaSpan};
use crate::typegraph::{
    DispatcherRegistry, KeySelector, NodeKind, NumericRange, ResolvedField, ResolvedFieldKind,
    StructNode, TypeGraph, TypeNode, TypeRef,
};
use crate::version::{Version, VersionGate};
use std::collections::HashMap;

/// Everything resolution produces.
#[derive(Debug)]
pub struct Resolution {
    pub graph: TypeGraph,
    pub registry: DispatcherRegistry,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolves a set of parsed modules, in load order.
pub fn resolve(modules: Vec<Module>) -> Resolution {
    Resolver::new(modules).run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LowerState {
    NotLowered,
    Lowering,
    Done,
}

/// A named item registered in pass 1.
struct ItemSlot {
    module_idx: usize,
    item_idx: usize,
    node: TypeRef,
    params: Vec<String>,
    state: LowerState,
}

struct Ctx<'a> {
    module_idx: usize,
    generics: &'a HashMap<String, TypeRef>,
}

pub struct Resolver {
    modules: Vec<Module>,
    module_keys: Vec<String>,
    graph: TypeGraph,
    registry: DispatcherRegistry,
    diagnostics: Vec<Diagnostic>,
    slots: Vec<ItemSlot>,
    symbols: HashMap<String, usize>,
    imports: Vec<HashMap<String, String>>,
    instantiations: HashMap<(usize, Vec<TypeRef>), TypeRef>,
    /// Primitive nodes are shared so that equal generic argument lists hit
    /// the instantiation memo.
    primitives: HashMap<PrimitiveKind, TypeRef>,
}

impl Resolver {
    #[must_use]
    pub fn new(modules: Vec<Module>) -> Self {
        let module_keys = modules
            .iter()
            .map(|m| m.path.segments.join("::"))
            .collect();
        let imports = vec![HashMap::new(); modules.len()];
        Resolver {
            modules,
            module_keys,
            graph: TypeGraph::new(),
            registry: DispatcherRegistry::new(),
            diagnostics: Vec::new(),
            slots: Vec::new(),
            symbols: HashMap::new(),
            imports,
            instantiations: HashMap::new(),
            primitives: HashMap::new(),
        }
    }

    pub fn run(mut self) -> Resolution {
        self.bind_headers();
        self.resolve_uses();
        for slot_idx in 0..self.slots.len() {
            self.force_lower(slot_idx);
        }
        self.register_dispatchers();

        Resolution {
            graph: self.graph,
            registry: self.registry,
            diagnostics: self.diagnostics,
        }
    }

    // === Pass 1: header binding ===

    fn bind_headers(&mut self) {
        for module_idx in 0..self.modules.len() {
            for item_idx in 0..self.modules[module_idx].items.len() {
                let (name, params) = match &self.modules[module_idx].items[item_idx].kind {
                    ItemKind::TypeAlias(a) => (a.name.clone(), a.params.clone()),
                    ItemKind::Struct(s) => (s.name.clone(), s.params.clone()),
                    ItemKind::Enum(e) => (e.name.clone(), Vec::new()),
                    ItemKind::Dispatch(d) => match &d.target {
                        DispatchTarget::Struct(s) => (s.name.clone(), d.params.clone()),
                        DispatchTarget::Type(_) => continue,
                    },
                    ItemKind::Use(_) => continue,
                };
                let span = self.modules[module_idx].items[item_idx].span;
                let mut node = TypeNode::new(NodeKind::Unknown);
                node.origin = Some(SchemaSpan {
                    module: self.module_keys[module_idx].clone(),
                    start: span.start,
                    end: span.end,
                });
                let node = self.graph.add(node);

                let fq = format!("{}::{}", self.module_keys[module_idx], name);
                let slot_idx = self.slots.len();
                self.slots.push(ItemSlot {
                    module_idx,
                    item_idx,
                    node,
                    params,
                    state: LowerState::NotLowered,
                });
                self.symbols.insert(fq.clone(), slot_idx);
                self.graph.bind_path(fq, node);
            }
        }
    }

    // === Pass 1.5: use-path expansion ===

    fn resolve_uses(&mut self) {
        for module_idx in 0..self.modules.len() {
            for item_idx in 0..self.modules[module_idx].items.len() {
                let ItemKind::Use(path) = &self.modules[module_idx].items[item_idx].kind else {
                    continue;
                };
                let path = path.clone();
                let span = self.modules[module_idx].items[item_idx].span;

                let Some(name) = path.last().map(str::to_string) else {
                    continue;
                };
                match self.canonical_lookup(module_idx, &path) {
                    Some(fq) => {
                        self.imports[module_idx].insert(name, fq);
                    }
                    None => {
                        self.diagnostics.push(
                            Diagnostic::error(
                                DiagnosticKind::UnresolvedUse,
                                format!("cannot resolve use path `{path}`"),
                            )
                            .with_span(
                                self.module_keys[module_idx].clone(),
                                span.start,
                                span.end,
                            ),
                        );
                    }
                }
            }
        }
    }

    /// Canonicalizes `path` against the declaring module and returns the
    /// fully qualified symbol path if it names a known item.
    fn canonical_lookup(&self, module_idx: usize, path: &ModulePath) -> Option<String> {
        // Relative paths resolve against the declaring module first.
        if !path.absolute {
            if let Some(fq) = self.expand(&self.modules[module_idx].path.segments, path) {
                if self.symbols.contains_key(&fq) {
                    return Some(fq);
                }
            }
        }
        // Absolute paths (and the global fallback for relative ones) are
        // rooted at the module set.
        let fq = self.expand(&[], path)?;
        self.symbols.contains_key(&fq).then_some(fq)
    }

    fn expand(&self, base: &[String], path: &ModulePath) -> Option<String> {
        let mut segments: Vec<String> = base.to_vec();
        for seg in &path.segments {
            if seg == "super" {
                segments.pop()?;
            } else {
                segments.push(seg.clone());
            }
        }
        Some(segments.join("::"))
    }

    // === Pass 2: body lowering ===

    fn force_lower(&mut self, slot_idx: usize) -> TypeRef {
        let node = self.slots[slot_idx].node;
        if self.slots[slot_idx].state != LowerState::NotLowered {
            return node;
        }
        self.slots[slot_idx].state = LowerState::Lowering;

        // Definition-time lowering binds generic parameters to placeholder
        // nodes; instantiation substitutes real arguments later.
        let mut generics = HashMap::new();
        for param in self.slots[slot_idx].params.clone() {
            let placeholder = self.graph.add(TypeNode::new(NodeKind::Param(param.clone())));
            generics.insert(param, placeholder);
        }

        let module_idx = self.slots[slot_idx].module_idx;
        let item = self.modules[module_idx].items[self.slots[slot_idx].item_idx].clone();
        self.lower_item_body(&item, node, &Ctx {
            module_idx,
            generics: &generics,
        });

        self.slots[slot_idx].state = LowerState::Done;
        node
    }

    /// Fills `target` with the lowered body of `item`.
    fn lower_item_body(&mut self, item: &Item, target: TypeRef, ctx: &Ctx) {
        let kind = match &item.kind {
            ItemKind::TypeAlias(a) => {
                let body = self.lower_type(&a.ty, ctx);
                NodeKind::Ref(body)
            }
            ItemKind::Struct(s) => NodeKind::Struct(self.lower_struct_fields(&s.fields, ctx)),
            ItemKind::Enum(e) => NodeKind::Enum {
                base: e.base,
                values: e.entries.iter().map(|entry| entry.value.clone()).collect(),
            },
            ItemKind::Dispatch(d) => match &d.target {
                DispatchTarget::Struct(s) => {
                    NodeKind::Struct(self.lower_struct_fields(&s.fields, ctx))
                }
                DispatchTarget::Type(_) => return,
            },
            ItemKind::Use(_) => return,
        };

        let (gate, semantic, opaque) = self.partition_attributes(&item.attributes, ctx.module_idx);
        let node = self.graph.node_mut(target);
        node.kind = kind;
        node.gate = gate;
        node.semantic = semantic;
        node.opaque = opaque;
    }

    fn lower_type(&mut self, expr: &TypeExpr, ctx: &Ctx) -> TypeRef {
        match &expr.kind {
            TypeKind::Primitive(p) => {
                if let Some(&r) = self.primitives.get(p) {
                    return r;
                }
                let r = self.graph.add(TypeNode::new(NodeKind::Primitive(*p)));
                self.primitives.insert(*p, r);
                r
            }
            TypeKind::Literal(l) => self.add_node(NodeKind::Literal(l.clone()), expr.span, ctx),

            TypeKind::Ident(name) => {
                if let Some(&r) = ctx.generics.get(name) {
                    return r;
                }
                match self.resolve_ident_slot(name, ctx.module_idx) {
                    Some(slot_idx) => self.slots[slot_idx].node,
                    None => self.unresolved(name, expr.span, ctx),
                }
            }

            TypeKind::Path(path) => match self.canonical_lookup(ctx.module_idx, path) {
                Some(fq) => self.slots[self.symbols[&fq]].node,
                None => self.unresolved(&path.to_string(), expr.span, ctx),
            },

            TypeKind::ComplexRef {
                resource, index, ..
            } => {
                let selector = match index {
                    IndexKind::Static(key) => KeySelector::Static(key.clone()),
                    IndexKind::Dynamic(DynamicIndex::SiblingField(name)) => {
                        KeySelector::SiblingField(name.clone())
                    }
                    IndexKind::Dynamic(DynamicIndex::ComputedKey) => KeySelector::ComputedKey,
                    IndexKind::Dynamic(DynamicIndex::ParentWalk(segments)) => {
                        KeySelector::ParentWalk(segments.clone())
                    }
                };
                self.add_node(
                    NodeKind::Dispatch {
                        resource: resource.clone(),
                        selector,
                    },
                    expr.span,
                    ctx,
                )
            }

            TypeKind::Array { element, len } => {
                let element = self.lower_type(element, ctx);
                self.add_node(
                    NodeKind::Array {
                        element,
                        len: len.map(NumericRange::from),
                    },
                    expr.span,
                    ctx,
                )
            }

            TypeKind::StructLiteral(fields) => {
                let body = self.lower_struct_fields(fields, ctx);
                self.add_node(NodeKind::Struct(body), expr.span, ctx)
            }

            TypeKind::Union(variants) => {
                let mut refs: Vec<TypeRef> = Vec::new();
                for variant in variants {
                    let r = self.lower_type(variant, ctx);
                    // Dedup by node identity only; structurally equal but
                    // distinct alternatives stay.
                    if !refs.contains(&r) {
                        refs.push(r);
                    }
                }
                self.add_node(NodeKind::Union(refs), expr.span, ctx)
            }

            TypeKind::Attributed { attributes, inner } => {
                let inner = self.lower_type(inner, ctx);
                let (gate, semantic, opaque) =
                    self.partition_attributes(attributes, ctx.module_idx);
                let r = self.add_node(NodeKind::Ref(inner), expr.span, ctx);
                let node = self.graph.node_mut(r);
                node.gate = gate;
                node.semantic = semantic;
                node.opaque = opaque;
                r
            }

            TypeKind::Constrained { base, range } => {
                // Numeric primitives get value ranges, strings get length
                // ranges; a constraint on anything else non-referential is
                // reported and dropped.
                let blocked = match &base.kind {
                    TypeKind::Primitive(p) => !p.is_numeric() && *p != PrimitiveKind::String,
                    TypeKind::Literal(LiteralValue::Number(_)) => false,
                    TypeKind::Literal(_) => true,
                    _ => false,
                };
                let base_ref = self.lower_type(base, ctx);
                if blocked {
                    self.diagnostics.push(
                        Diagnostic::error(
                            DiagnosticKind::ConstraintOnNonNumeric,
                            "range constraint applied to a non-numeric type",
                        )
                        .with_span(
                            self.module_keys[ctx.module_idx].clone(),
                            expr.span.start,
                            expr.span.end,
                        ),
                    );
                    return base_ref;
                }
                self.add_node(
                    NodeKind::Constrained {
                        base: base_ref,
                        range: NumericRange::from(*range),
                    },
                    expr.span,
                    ctx,
                )
            }

            TypeKind::Generic { base, args } => {
                let arg_refs: Vec<TypeRef> = args.iter().map(|a| self.lower_type(a, ctx)).collect();
                let slot_idx = match &base.kind {
                    TypeKind::Ident(name) => self.resolve_ident_slot(name, ctx.module_idx),
                    TypeKind::Path(path) => self
                        .canonical_lookup(ctx.module_idx, path)
                        .map(|fq| self.symbols[&fq]),
                    _ => None,
                };
                match slot_idx {
                    Some(slot_idx) if !self.slots[slot_idx].params.is_empty() => {
                        self.instantiate(slot_idx, arg_refs)
                    }
                    Some(slot_idx) => self.slots[slot_idx].node,
                    None => self.unresolved(&format!("{:?}", base.kind), base.span, ctx),
                }
            }
        }
    }

    /// Produces (or reuses) the node for a generic template applied to
    /// concrete arguments. Memoized on `(template, argument_list)`.
    fn instantiate(&mut self, slot_idx: usize, args: Vec<TypeRef>) -> TypeRef {
        let key = (slot_idx, args.clone());
        if let Some(&r) = self.instantiations.get(&key) {
            return r;
        }

        // Mint the identity before lowering so self-referential templates
        // terminate.
        let node = self.graph.add(TypeNode::new(NodeKind::Unknown));
        self.instantiations.insert(key, node);

        let params = self.slots[slot_idx].params.clone();
        let mut generics = HashMap::new();
        for (i, param) in params.iter().enumerate() {
            let arg = args.get(i).copied().unwrap_or_else(|| self.graph.unknown());
            generics.insert(param.clone(), arg);
        }

        let module_idx = self.slots[slot_idx].module_idx;
        let item = self.modules[module_idx].items[self.slots[slot_idx].item_idx].clone();
        self.lower_item_body(&item, node, &Ctx {
            module_idx,
            generics: &generics,
        });
        node
    }

    fn lower_struct_fields(&mut self, fields: &[Field], ctx: &Ctx) -> StructNode {
        let mut out: Vec<ResolvedField> = Vec::new();
        let mut unknown_spread = false;

        for field in fields {
            let (gate, semantic, opaque) =
                self.partition_attributes(&field.attributes, ctx.module_idx);
            let origin = Some(SchemaSpan {
                module: self.module_keys[ctx.module_idx].clone(),
                start: field.span.start,
                end: field.span.end,
            });

            match &field.kind {
                FieldKind::Named { name, optional, ty } => {
                    let mut value = self.lower_type(ty, ctx);
                    if !semantic.is_empty() || !opaque.is_empty() {
                        let wrapper = self.graph.add(TypeNode::new(NodeKind::Ref(value)));
                        let node = self.graph.node_mut(wrapper);
                        node.semantic = semantic;
                        node.opaque = opaque;
                        value = wrapper;
                    }
                    push_named(
                        &mut out,
                        ResolvedField {
                            kind: ResolvedFieldKind::Named {
                                name: name.clone(),
                                optional: *optional,
                            },
                            value,
                            gate,
                            origin,
                        },
                    );
                }

                FieldKind::Computed { key, ty } => {
                    let key = self.lower_type(key, ctx);
                    let value = self.lower_type(ty, ctx);
                    out.push(ResolvedField {
                        kind: ResolvedFieldKind::Computed { key },
                        value,
                        gate,
                        origin,
                    });
                }

                FieldKind::Spread(ty) => {
                    self.lower_spread(ty, gate, ctx, &mut out, &mut unknown_spread, origin);
                }
            }
        }

        StructNode {
            fields: out,
            unknown_spread,
        }
    }

    /// Expands a `...Target` field. Static struct targets are flattened
    /// here; dispatcher references stay dynamic and get spliced in by the
    /// validator once the discriminator is known.
    fn lower_spread(
        &mut self,
        ty: &TypeExpr,
        spread_gate: VersionGate,
        ctx: &Ctx,
        out: &mut Vec<ResolvedField>,
        unknown_spread: &mut bool,
        origin: Option<SchemaSpan>,
    ) {
        if matches!(
            ty.kind,
            TypeKind::ComplexRef {
                index: IndexKind::Dynamic(_),
                ..
            }
        ) {
            let value = self.lower_type(ty, ctx);
            out.push(ResolvedField {
                kind: ResolvedFieldKind::DynamicSpread,
                value,
                gate: spread_gate,
                origin,
            });
            return;
        }

        let target = self.lower_type(ty, ctx);
        match self.spread_contents(target) {
            SpreadTarget::Struct(inner) => {
                if inner.unknown_spread {
                    *unknown_spread = true;
                }
                for field in inner.fields {
                    let field = ResolvedField {
                        gate: field.gate.conjoin(&spread_gate),
                        ..field
                    };
                    push_named(out, field);
                }
            }
            SpreadTarget::Dispatch => {
                // A statically keyed dispatcher reference; splice at
                // validation time like the dynamic form.
                out.push(ResolvedField {
                    kind: ResolvedFieldKind::DynamicSpread,
                    value: target,
                    gate: spread_gate,
                    origin,
                });
            }
            SpreadTarget::Unknown => {
                *unknown_spread = true;
            }
            SpreadTarget::Invalid => {
                self.diagnostics.push(
                    Diagnostic::error(
                        DiagnosticKind::UnresolvedReference,
                        "spread target does not resolve to a struct",
                    )
                    .with_span(
                        self.module_keys[ctx.module_idx].clone(),
                        ty.span.start,
                        ty.span.end,
                    ),
                );
            }
        }
    }

    fn spread_contents(&mut self, target: TypeRef) -> SpreadTarget {
        let mut r = target;
        for _ in 0..=self.graph.len() {
            if let Some(slot_idx) = self.slot_of(r) {
                if self.slots[slot_idx].state == LowerState::Lowering {
                    // A struct spreading itself (directly or mutually) can
                    // never be flattened.
                    return SpreadTarget::Invalid;
                }
                self.force_lower(slot_idx);
            }
            match &self.graph.node(r).kind {
                NodeKind::Ref(t) => r = *t,
                NodeKind::Struct(s) => return SpreadTarget::Struct(s.clone()),
                NodeKind::Dispatch { .. } => return SpreadTarget::Dispatch,
                NodeKind::Unknown | NodeKind::Param(_) => return SpreadTarget::Unknown,
                _ => return SpreadTarget::Invalid,
            }
        }
        SpreadTarget::Invalid
    }

    fn slot_of(&self, node: TypeRef) -> Option<usize> {
        self.slots.iter().position(|s| s.node == node)
    }

    // === Pass 3: dispatcher registration ===

    fn register_dispatchers(&mut self) {
        for module_idx in 0..self.modules.len() {
            for item_idx in 0..self.modules[module_idx].items.len() {
                let ItemKind::Dispatch(d) = &self.modules[module_idx].items[item_idx].kind else {
                    continue;
                };
                let d = d.clone();

                let target = match &d.target {
                    DispatchTarget::Struct(s) => {
                        let fq = format!("{}::{}", self.module_keys[module_idx], s.name);
                        match self.symbols.get(&fq) {
                            Some(&slot_idx) => self.slots[slot_idx].node,
                            None => self.graph.unknown(),
                        }
                    }
                    DispatchTarget::Type(ty) => {
                        let mut generics = HashMap::new();
                        for param in &d.params {
                            let placeholder =
                                self.graph.add(TypeNode::new(NodeKind::Param(param.clone())));
                            generics.insert(param.clone(), placeholder);
                        }
                        self.lower_type(ty, &Ctx {
                            module_idx,
                            generics: &generics,
                        })
                    }
                };

                for key in &d.keys {
                    match key {
                        DispatchKey::Name(name) => {
                            self.registry.register_variant(&d.resource, name, target);
                        }
                        DispatchKey::Fallback => {
                            self.registry.register_fallback(&d.resource, target);
                        }
                    }
                }
            }
        }
    }

    // === Shared helpers ===

    /// Bare-identifier lookup: module-local items, then use-imports, then
    /// the module set root. (Generic parameters are checked by the caller.)
    fn resolve_ident_slot(&self, name: &str, module_idx: usize) -> Option<usize> {
        let local = format!("{}::{}", self.module_keys[module_idx], name);
        if let Some(&slot) = self.symbols.get(&local) {
            return Some(slot);
        }
        if let Some(fq) = self.imports[module_idx].get(name) {
            if let Some(&slot) = self.symbols.get(fq) {
                return Some(slot);
            }
        }
        self.symbols.get(name).copied()
    }

    fn unresolved(&mut self, what: &str, span: Span, ctx: &Ctx) -> TypeRef {
        self.diagnostics.push(
            Diagnostic::error(
                DiagnosticKind::UnresolvedReference,
                format!("cannot resolve type reference `{what}`"),
            )
            .with_span(
                self.module_keys[ctx.module_idx].clone(),
                span.start,
                span.end,
            ),
        );
        self.graph.unknown()
    }

    fn add_node(&mut self, kind: NodeKind, span: Span, ctx: &Ctx) -> TypeRef {
        let mut node = TypeNode::new(kind);
        node.origin = Some(SchemaSpan {
            module: self.module_keys[ctx.module_idx].clone(),
            start: span.start,
            end: span.end,
        });
        self.graph.add(node)
    }

    /// Splits attributes into a version gate, recognized semantic
    /// attributes, and opaque leftovers.
    fn partition_attributes(
        &mut self,
        attributes: &[Attribute],
        module_idx: usize,
    ) -> (VersionGate, Vec<Attribute>, Vec<Attribute>) {
        let mut gate = VersionGate::OPEN;
        let mut semantic = Vec::new();
        let mut opaque = Vec::new();

        for attr in attributes {
            match attr.name.as_str() {
                "since" | "until" => match attr.string_value().map(str::parse::<Version>) {
                    Some(Ok(version)) => {
                        if attr.name == "since" {
                            gate.since = Some(version);
                        } else {
                            gate.until = Some(version);
                        }
                    }
                    _ => {
                        self.diagnostics.push(
                            Diagnostic::warning(
                                DiagnosticKind::ParseError,
                                format!("invalid version in `{}` attribute", attr.name),
                            )
                            .with_span(
                                self.module_keys[module_idx].clone(),
                                attr.span.start,
                                attr.span.end,
                            ),
                        );
                    }
                },
                "id" | "nbt_path" | "random" => semantic.push(attr.clone()),
                _ => opaque.push(attr.clone()),
            }
        }

        (gate, semantic, opaque)
    }
}

enum SpreadTarget {
    Struct(StructNode),
    Dispatch,
    Unknown,
    Invalid,
}

/// Appends a field; a named field replaces any earlier field of the same
/// name (last writer wins, in source order after spread expansion).
fn push_named(out: &mut Vec<ResolvedField>, field: ResolvedField) {
    if let ResolvedFieldKind::Named { name, .. } = &field.kind {
        out.retain(|existing| {
            !matches!(&existing.kind, ResolvedFieldKind::Named { name: n, .. } if n == name)
        });
    }
    out.push(field);
}
