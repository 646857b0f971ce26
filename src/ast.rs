//! The abstract syntax tree produced by the [`Parser`](crate::parser::Parser).
//!
//! Every node carries a [`Span`] with byte offsets into the module source so
//! diagnostics can point back at the schema text. The tree is immutable once
//! parsing completes; name resolution never rewrites it.

use std::fmt;

/// A half-open byte range `start..end` into a module's source text.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The smallest span covering both `self` and `other`.
    #[must_use]
    pub fn merge(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A `::`-separated module path such as `super::biome` or `::java::util`.
///
/// The `super` segment is kept verbatim; canonicalization against the
/// declaring module happens in the resolver, never in the parser.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct ModulePath {
    pub segments: Vec<String>,
    pub absolute: bool,
}

impl ModulePath {
    #[must_use]
    pub fn new(segments: Vec<String>, absolute: bool) -> Self {
        Self { segments, absolute }
    }

    /// Builds a relative path from identifier segments.
    #[must_use]
    pub fn relative<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(segments.into_iter().map(Into::into).collect(), false)
    }

    /// Builds an absolute path rooted at the module set.
    #[must_use]
    pub fn rooted<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(segments.into_iter().map(Into::into).collect(), true)
    }

    /// The final identifier, if any.
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// The path without its final segment.
    #[must_use]
    pub fn parent(&self) -> ModulePath {
        let mut segments = self.segments.clone();
        segments.pop();
        ModulePath::new(segments, self.absolute)
    }

    /// Appends a segment, returning a new path.
    #[must_use]
    pub fn child(&self, segment: &str) -> ModulePath {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        ModulePath::new(segments, self.absolute)
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            write!(f, "::")?;
        }
        write!(f, "{}", self.segments.join("::"))
    }
}

/// A parsed `.mcdoc` module: its canonical path plus top-level items.
#[derive(Debug, PartialEq, Clone)]
pub struct Module {
    pub path: ModulePath,
    pub items: Vec<Item>,
}

/// A top-level statement with its leading attributes.
#[derive(Debug, PartialEq, Clone)]
pub struct Item {
    pub attributes: Vec<Attribute>,
    pub kind: ItemKind,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub enum ItemKind {
    /// `use super::biome::Biome`
    Use(ModulePath),
    /// `type CoordinatePair<T> = [T] @ 2`
    TypeAlias(TypeAliasDef),
    /// `struct Biome { ... }`
    Struct(StructDef),
    /// `enum(string) Category { ... }`
    Enum(EnumDef),
    /// `dispatch minecraft:resource[worldgen/biome] to struct Biome { ... }`
    Dispatch(DispatchDef),
}

#[derive(Debug, PartialEq, Clone)]
pub struct TypeAliasDef {
    pub name: String,
    pub params: Vec<String>,
    pub ty: TypeExpr,
}

#[derive(Debug, PartialEq, Clone)]
pub struct StructDef {
    pub name: String,
    pub params: Vec<String>,
    pub fields: Vec<Field>,
}

/// A struct member with its leading attributes.
#[derive(Debug, PartialEq, Clone)]
pub struct Field {
    pub attributes: Vec<Attribute>,
    pub kind: FieldKind,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub enum FieldKind {
    /// `temperature: float` or `effects?: Effects`
    Named {
        name: String,
        optional: bool,
        ty: TypeExpr,
    },
    /// `[#[id] string]: Carver` — the key type matches object keys.
    Computed { key: TypeExpr, ty: TypeExpr },
    /// `...OtherStruct` or `...minecraft:chunk_generator[[type]]`
    Spread(TypeExpr),
}

#[derive(Debug, PartialEq, Clone)]
pub struct EnumDef {
    pub base: PrimitiveKind,
    pub name: String,
    pub entries: Vec<EnumEntry>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct EnumEntry {
    pub name: String,
    pub value: LiteralValue,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub struct DispatchDef {
    /// Dispatcher resource identity, e.g. `minecraft:resource`.
    pub resource: String,
    /// Bracketed key list: named keys and/or a fallback marker.
    pub keys: Vec<DispatchKey>,
    /// Generic parameters of the dispatch path, if any.
    pub params: Vec<String>,
    pub target: DispatchTarget,
}

#[derive(Debug, PartialEq, Clone)]
pub enum DispatchKey {
    /// `flat`, `worldgen/biome` or `"worldgen/biome"`.
    Name(String),
    /// `%fallback`, `%unknown` or `%none` — selected when no named key matches.
    Fallback,
}

#[derive(Debug, PartialEq, Clone)]
pub enum DispatchTarget {
    /// `to struct Flat { ... }` — also introduces `Flat` as a named struct.
    Struct(StructDef),
    /// `to SomeType`
    Type(TypeExpr),
}

/// A type expression with its source span.
#[derive(Debug, PartialEq, Clone)]
pub struct TypeExpr {
    pub kind: TypeKind,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    Literal(LiteralValue),
    /// Reference by bare identifier, resolved against generics, the module,
    /// imports, then the module set.
    Ident(String),
    /// Reference by `::`-separated path.
    Path(ModulePath),
    /// `minecraft:resource[worldgen/biome]` or `minecraft:chunk_generator[[type]]`.
    ComplexRef {
        resource: String,
        index: IndexKind,
        args: Vec<TypeExpr>,
    },
    /// `[T]` with an optional `@` length range.
    Array {
        element: Box<TypeExpr>,
        len: Option<RangeExpr>,
    },
    /// Anonymous `struct { ... }`.
    StructLiteral(Vec<Field>),
    /// `(A | B | C)`
    Union(Vec<TypeExpr>),
    /// One or more attributes applied to a type.
    Attributed {
        attributes: Vec<Attribute>,
        inner: Box<TypeExpr>,
    },
    /// `int @ 0..10`, `string @ ..32`
    Constrained {
        base: Box<TypeExpr>,
        range: RangeExpr,
    },
    /// `Tag<Item>`
    Generic {
        base: Box<TypeExpr>,
        args: Vec<TypeExpr>,
    },
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum PrimitiveKind {
    String,
    Int,
    Float,
    Double,
    Boolean,
    Any,
}

impl PrimitiveKind {
    /// Maps a primitive keyword to its kind; `None` for ordinary identifiers.
    #[must_use]
    pub fn from_name(name: &str) -> Option<PrimitiveKind> {
        match name {
            "string" => Some(PrimitiveKind::String),
            "int" => Some(PrimitiveKind::Int),
            "float" => Some(PrimitiveKind::Float),
            "double" => Some(PrimitiveKind::Double),
            "boolean" => Some(PrimitiveKind::Boolean),
            "any" => Some(PrimitiveKind::Any),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Any => "any",
        }
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::Int | PrimitiveKind::Float | PrimitiveKind::Double
        )
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum LiteralValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::String(s) => write!(f, "\"{s}\""),
            LiteralValue::Number(n) => write!(f, "{n}"),
            LiteralValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// The bracket suffix of a complex reference.
#[derive(Debug, PartialEq, Clone)]
pub enum IndexKind {
    /// `[flat]` — selects one registered variant without runtime lookup.
    Static(String),
    /// `[[...]]` — the discriminator value comes from the JSON being checked.
    Dynamic(DynamicIndex),
}

/// How a dynamic dispatcher index finds its discriminator at validation time.
#[derive(Debug, PartialEq, Clone)]
pub enum DynamicIndex {
    /// `[[type]]` — read the sibling field named here.
    SiblingField(String),
    /// `[[%key]]` — the computed-field key currently being validated.
    ComputedKey,
    /// `[[%parent.generator.type]]` — walk up one level, then down named fields.
    ParentWalk(Vec<String>),
}

/// A numeric range with optional open endpoints and exclusivity markers.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct RangeExpr {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub min_exclusive: bool,
    pub max_exclusive: bool,
}

impl RangeExpr {
    /// An exact value, from the `@ 2` shorthand.
    #[must_use]
    pub fn exact(value: f64) -> Self {
        Self {
            min: Some(value),
            max: Some(value),
            min_exclusive: false,
            max_exclusive: false,
        }
    }
}

/// A single `#[...]` attribute item.
#[derive(Debug, PartialEq, Clone)]
pub struct Attribute {
    pub name: String,
    pub value: Option<AttrValue>,
    pub span: Span,
}

impl Attribute {
    /// The attribute value as a string, for `#[since="1.19"]`-shaped items.
    #[must_use]
    pub fn string_value(&self) -> Option<&str> {
        match &self.value {
            Some(AttrValue::String(s)) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum AttrValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Ident(String),
    Array(Vec<AttrValue>),
    /// A nested attribute call such as `uuid()` inside `#[random=uuid()]`,
    /// and the parenthesized forms `#[name(args)]` / `#[name=(args)]`.
    Call { name: String, args: Vec<AttrValue> },
}
