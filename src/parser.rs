//! A recursive descent parser for mcdoc modules.
//!
//! The grammar is PEG-shaped: alternatives are ordered and the first match
//! wins, so parsing is a single left-to-right pass with no backtracking
//! across statements. The parser always produces a [`Module`]; errors inside
//! a top-level item are recorded and the parser skips ahead to the next
//! statement boundary, so one bad statement never hides the rest of the
//! file.

use crate::ast::*;
use crate::error::{Diagnostic, DiagnosticKind};
use crate::lexer::{Lexer, Token, TokenType};

/// A single parse failure with the byte span of the offending (or skipped)
/// region.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub span: Span,
    pub kind: ParseErrorKind,
    pub message: String,
    /// What the parser was looking for, when that is meaningful.
    pub expected: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedToken,
    UnclosedDelimiter,
    IllegalRange,
    UnexpectedEof,
}

impl ParseError {
    /// Converts this error into the pipeline-wide diagnostic shape.
    #[must_use]
    pub fn to_diagnostic(&self, module: &ModulePath) -> Diagnostic {
        Diagnostic::error(DiagnosticKind::ParseError, self.message.clone()).with_span(
            module.to_string(),
            self.span.start,
            self.span.end,
        )
    }
}

/// The outcome of parsing one module: an AST (possibly partial) plus every
/// error encountered along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub module: Module,
    pub errors: Vec<ParseError>,
}

/// A recursive descent parser over a single module's token stream.
#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    source_len: usize,
}

impl Parser {
    #[must_use]
    pub fn new(source_text: &str) -> Self {
        let mut lexer = Lexer::new(source_text);
        let tokens: Vec<Token> = lexer
            .lex()
            .into_iter()
            .filter(|t| !matches!(t.ttype, TokenType::Whitespace | TokenType::Comment(_)))
            .collect();

        Self {
            tokens,
            position: 0,
            source_len: source_text.len(),
        }
    }

    // === Main Parsing Methods ===

    /// Module ::= Statement* EOF
    pub fn parse_module(mut self, path: ModulePath) -> ParseResult {
        let mut items = Vec::new();
        let mut errors = Vec::new();

        while !self.check(&TokenType::Eof) {
            let before = self.position;
            match self.parse_statement() {
                Ok(item) => items.push(item),
                Err(mut err) => {
                    // Always make progress, then skip to the next statement
                    // boundary so the rest of the module still parses.
                    if self.position == before {
                        self.advance();
                    }
                    let skipped_to = self.synchronize();
                    err.span.end = err.span.end.max(skipped_to);
                    errors.push(err);
                }
            }
        }

        ParseResult {
            module: Module { path, items },
            errors,
        }
    }

    /// Statement ::= Attribute* (Use | TypeAlias | Struct | Enum | Dispatch)
    fn parse_statement(&mut self) -> Result<Item, ParseError> {
        let start = self.current().pos_start;
        let attributes = self.parse_attributes()?;

        let ttype = self.current().ttype.clone();
        let kind = match ttype {
            TokenType::Use => self.parse_use(),
            TokenType::Type => self.parse_type_alias(),
            TokenType::Struct => self.parse_struct_item(),
            TokenType::Enum => self.parse_enum_item(),
            TokenType::Dispatch => self.parse_dispatch(),
            _ => self.err_unexpected("a top-level statement (use, type, struct, enum, dispatch)"),
        }?;

        Ok(Item {
            attributes,
            kind,
            span: Span::new(start, self.previous_end()),
        })
    }

    /// Skips forward to the next token that can begin a statement. Returns
    /// the byte offset of the end of the skipped region.
    fn synchronize(&mut self) -> usize {
        loop {
            let at_boundary = matches!(
                self.current().ttype,
                TokenType::Eof
                    | TokenType::Use
                    | TokenType::Type
                    | TokenType::Struct
                    | TokenType::Enum
                    | TokenType::Dispatch
                    | TokenType::Hash
            );
            if at_boundary {
                break;
            }
            self.advance();
        }
        self.previous_end()
    }

    /// Use ::= 'use' Path
    fn parse_use(&mut self) -> Result<ItemKind, ParseError> {
        self.expect(TokenType::Use, "'use'")?;
        let path = self.parse_module_path()?;
        Ok(ItemKind::Use(path))
    }

    /// TypeAlias ::= 'type' Ident Generics? '=' Type
    fn parse_type_alias(&mut self) -> Result<ItemKind, ParseError> {
        self.expect(TokenType::Type, "'type'")?;
        let name = self.expect_name("a type alias name")?;
        let params = self.parse_generic_params()?;
        self.expect(TokenType::Equals, "'='")?;
        let ty = self.parse_type()?;
        Ok(ItemKind::TypeAlias(TypeAliasDef { name, params, ty }))
    }

    /// Struct ::= 'struct' Ident Generics? '{' FieldList? '}'
    fn parse_struct_item(&mut self) -> Result<ItemKind, ParseError> {
        self.expect(TokenType::Struct, "'struct'")?;
        let name = self.expect_name("a struct name")?;
        let params = self.parse_generic_params()?;
        let fields = self.parse_fields_block()?;
        Ok(ItemKind::Struct(StructDef {
            name,
            params,
            fields,
        }))
    }

    /// Enum ::= 'enum' '(' PrimitiveType ')' Ident '{' Entry (',' Entry)* ','? '}'
    fn parse_enum_item(&mut self) -> Result<ItemKind, ParseError> {
        self.expect(TokenType::Enum, "'enum'")?;
        self.expect(TokenType::LParen, "'('")?;
        let base_name = self.expect_name("a primitive base type")?;
        let base = PrimitiveKind::from_name(&base_name)
            .ok_or_else(|| self.make_error("a primitive base type"))?;
        self.expect(TokenType::RParen, "')'")?;
        let name = self.expect_name("an enum name")?;

        self.expect(TokenType::LBrace, "'{'")?;
        let mut entries = Vec::new();
        if !self.check(&TokenType::RBrace) {
            loop {
                let entry_start = self.current().pos_start;
                let entry_name = self.expect_name("an enum entry name")?;
                self.expect(TokenType::Equals, "'='")?;
                let value = self.parse_literal()?;
                entries.push(EnumEntry {
                    name: entry_name,
                    value,
                    span: Span::new(entry_start, self.previous_end()),
                });
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
                if self.check(&TokenType::RBrace) {
                    break;
                }
            }
        }
        self.expect(TokenType::RBrace, "'}'")?;

        Ok(ItemKind::Enum(EnumDef {
            base,
            name,
            entries,
        }))
    }

    /// Dispatch ::= 'dispatch' Ident ':' ResourcePath '[' KeyList ']'
    ///              Generics? 'to' (Struct | Type)
    fn parse_dispatch(&mut self) -> Result<ItemKind, ParseError> {
        self.expect(TokenType::Dispatch, "'dispatch'")?;
        let namespace = self.expect_name("a dispatcher namespace")?;
        self.expect(TokenType::Colon, "':'")?;
        let resource = format!("{}:{}", namespace, self.parse_resource_path()?);

        self.expect(TokenType::LBracket, "'['")?;
        let mut keys = Vec::new();
        loop {
            keys.push(self.parse_dispatch_key()?);
            if !self.match_token(&TokenType::Comma) {
                break;
            }
            if self.check(&TokenType::RBracket) {
                break;
            }
        }
        self.expect(TokenType::RBracket, "']'")?;

        let params = self.parse_generic_params()?;
        self.expect(TokenType::To, "'to'")?;

        // `to struct Name { ... }` introduces a named struct; an anonymous
        // `to struct { ... }` stays an inline type.
        let target = if self.check(&TokenType::Struct) && self.peek_is_identifier() {
            self.advance();
            let name = self.expect_name("a struct name")?;
            let fields = self.parse_fields_block()?;
            DispatchTarget::Struct(StructDef {
                name,
                params: Vec::new(),
                fields,
            })
        } else {
            DispatchTarget::Type(self.parse_type()?)
        };

        Ok(ItemKind::Dispatch(DispatchDef {
            resource,
            keys,
            params,
            target,
        }))
    }

    /// KeyList entry ::= Ident ('/' Ident)* | String | '%' ('fallback'|'unknown'|'none')
    fn parse_dispatch_key(&mut self) -> Result<DispatchKey, ParseError> {
        if self.match_token(&TokenType::Percent) {
            let name = self.expect_name("a static key name")?;
            return match name.as_str() {
                "fallback" | "unknown" | "none" => Ok(DispatchKey::Fallback),
                _ => self.err_unexpected("%fallback, %unknown or %none"),
            };
        }
        if let TokenType::String(s) = self.current().ttype.clone() {
            self.advance();
            return Ok(DispatchKey::Name(s));
        }
        let mut parts = vec![self.expect_name("a dispatch key")?];
        while self.match_token(&TokenType::Slash) {
            parts.push(self.expect_name("a resource path segment")?);
        }
        Ok(DispatchKey::Name(parts.join("/")))
    }

    // === Types ===

    /// Type ::= Attribute+ Type | TypeAtom ('@' Range)?
    fn parse_type(&mut self) -> Result<TypeExpr, ParseError> {
        if self.check(&TokenType::Hash) {
            let start = self.current().pos_start;
            let attributes = self.parse_attributes()?;
            let inner = self.parse_type_no_attrs()?;
            let span = Span::new(start, inner.span.end);
            return Ok(TypeExpr {
                kind: TypeKind::Attributed {
                    attributes,
                    inner: Box::new(inner),
                },
                span,
            });
        }
        self.parse_type_no_attrs()
    }

    fn parse_type_no_attrs(&mut self) -> Result<TypeExpr, ParseError> {
        let base = self.parse_type_atom()?;

        // Constraints bind to primitives, references and literals only;
        // array length ranges are consumed by the array rule itself.
        let constrainable = matches!(
            base.kind,
            TypeKind::Primitive(_)
                | TypeKind::Literal(_)
                | TypeKind::Ident(_)
                | TypeKind::Path(_)
                | TypeKind::ComplexRef { .. }
                | TypeKind::Generic { .. }
        );
        if constrainable && self.match_token(&TokenType::At) {
            let range = self.parse_range()?;
            let span = Span::new(base.span.start, self.previous_end());
            return Ok(TypeExpr {
                kind: TypeKind::Constrained {
                    base: Box::new(base),
                    range,
                },
                span,
            });
        }

        Ok(base)
    }

    fn parse_type_atom(&mut self) -> Result<TypeExpr, ParseError> {
        let start = self.current().pos_start;
        let ttype = self.current().ttype.clone();

        match ttype {
            // UnionType ::= '(' Type ('|' Type)* '|'? ')'
            TokenType::LParen => {
                self.advance();
                let mut variants = vec![self.parse_type()?];
                while self.match_token(&TokenType::Pipe) {
                    if self.check(&TokenType::RParen) {
                        break; // trailing pipe
                    }
                    variants.push(self.parse_type()?);
                }
                self.expect(TokenType::RParen, "')'")?;
                let span = Span::new(start, self.previous_end());
                if variants.len() == 1 {
                    // A parenthesized type is just that type.
                    return Ok(variants.into_iter().next().unwrap());
                }
                Ok(TypeExpr {
                    kind: TypeKind::Union(variants),
                    span,
                })
            }

            // ArrayType ::= '[' Type ']' ('@' Range)?
            TokenType::LBracket => {
                self.advance();
                let element = self.parse_type()?;
                self.expect(TokenType::RBracket, "']'")?;
                let len = if self.match_token(&TokenType::At) {
                    Some(self.parse_range()?)
                } else {
                    None
                };
                Ok(TypeExpr {
                    kind: TypeKind::Array {
                        element: Box::new(element),
                        len,
                    },
                    span: Span::new(start, self.previous_end()),
                })
            }

            // StructLiteral ::= 'struct' '{' FieldList? '}'
            TokenType::Struct => {
                self.advance();
                let fields = self.parse_fields_block()?;
                Ok(TypeExpr {
                    kind: TypeKind::StructLiteral(fields),
                    span: Span::new(start, self.previous_end()),
                })
            }

            TokenType::String(s) => {
                self.advance();
                Ok(TypeExpr {
                    kind: TypeKind::Literal(LiteralValue::String(s)),
                    span: Span::new(start, self.previous_end()),
                })
            }
            TokenType::Number(n) => {
                self.advance();
                Ok(TypeExpr {
                    kind: TypeKind::Literal(LiteralValue::Number(n)),
                    span: Span::new(start, self.previous_end()),
                })
            }
            TokenType::True => {
                self.advance();
                Ok(TypeExpr {
                    kind: TypeKind::Literal(LiteralValue::Boolean(true)),
                    span: Span::new(start, self.previous_end()),
                })
            }
            TokenType::False => {
                self.advance();
                Ok(TypeExpr {
                    kind: TypeKind::Literal(LiteralValue::Boolean(false)),
                    span: Span::new(start, self.previous_end()),
                })
            }

            // Absolute path or `super::...`
            TokenType::DoubleColon | TokenType::Super => {
                let path = self.parse_module_path()?;
                Ok(TypeExpr {
                    kind: TypeKind::Path(path),
                    span: Span::new(start, self.previous_end()),
                })
            }

            TokenType::Identifier(name) => {
                self.advance();

                // `ns:path[...]` — a complex (dispatcher) reference.
                if self.check(&TokenType::Colon) {
                    self.advance();
                    return self.parse_complex_ref(name, start);
                }

                // `a::b::c` — a relative path reference.
                if self.check(&TokenType::DoubleColon) {
                    let mut segments = vec![name];
                    while self.match_token(&TokenType::DoubleColon) {
                        segments.push(self.expect_path_segment()?);
                    }
                    return Ok(TypeExpr {
                        kind: TypeKind::Path(ModulePath::new(segments, false)),
                        span: Span::new(start, self.previous_end()),
                    });
                }

                // `Tag<Item>` — generic instantiation.
                if self.check(&TokenType::Lt) {
                    let base = TypeExpr {
                        kind: TypeKind::Ident(name),
                        span: Span::new(start, self.previous_end()),
                    };
                    let args = self.parse_generic_args()?;
                    return Ok(TypeExpr {
                        kind: TypeKind::Generic {
                            base: Box::new(base),
                            args,
                        },
                        span: Span::new(start, self.previous_end()),
                    });
                }

                let kind = match PrimitiveKind::from_name(&name) {
                    Some(prim) => TypeKind::Primitive(prim),
                    None => TypeKind::Ident(name),
                };
                Ok(TypeExpr {
                    kind,
                    span: Span::new(start, self.previous_end()),
                })
            }

            _ => self.err_unexpected("a type"),
        }
    }

    /// The remainder of `ns:resource/path[...]` after the colon.
    fn parse_complex_ref(&mut self, namespace: String, start: usize) -> Result<TypeExpr, ParseError> {
        let resource = format!("{}:{}", namespace, self.parse_resource_path()?);

        self.expect(TokenType::LBracket, "'['")?;
        let index = if self.match_token(&TokenType::LBracket) {
            let index = self.parse_dynamic_index()?;
            self.expect(TokenType::RBracket, "']'")?;
            self.expect(TokenType::RBracket, "']'")?;
            IndexKind::Dynamic(index)
        } else {
            let key = if let TokenType::String(s) = self.current().ttype.clone() {
                self.advance();
                s
            } else {
                let mut parts = vec![self.expect_name("a dispatch key")?];
                while self.match_token(&TokenType::Slash) {
                    parts.push(self.expect_name("a resource path segment")?);
                }
                parts.join("/")
            };
            self.expect(TokenType::RBracket, "']'")?;
            IndexKind::Static(key)
        };

        let args = if self.check(&TokenType::Lt) {
            self.parse_generic_args()?
        } else {
            Vec::new()
        };

        Ok(TypeExpr {
            kind: TypeKind::ComplexRef {
                resource,
                index,
                args,
            },
            span: Span::new(start, self.previous_end()),
        })
    }

    /// The inside of a `[[...]]` dynamic index.
    fn parse_dynamic_index(&mut self) -> Result<DynamicIndex, ParseError> {
        if self.match_token(&TokenType::Percent) {
            let name = self.expect_name("%key or %parent")?;
            return match name.as_str() {
                "key" => Ok(DynamicIndex::ComputedKey),
                "parent" => {
                    let mut segments = Vec::new();
                    while self.match_token(&TokenType::Dot) {
                        segments.push(self.expect_name("a field name")?);
                    }
                    Ok(DynamicIndex::ParentWalk(segments))
                }
                _ => self.err_unexpected("%key or %parent"),
            };
        }
        let name = self.expect_name("a sibling field name")?;
        Ok(DynamicIndex::SiblingField(name))
    }

    /// ResourcePath ::= Ident ('/' Ident)*
    fn parse_resource_path(&mut self) -> Result<String, ParseError> {
        let mut parts = vec![self.expect_name("a resource path")?];
        while self.match_token(&TokenType::Slash) {
            parts.push(self.expect_name("a resource path segment")?);
        }
        Ok(parts.join("/"))
    }

    /// FieldList ::= '{' Field (',' Field)* ','? '}'
    fn parse_fields_block(&mut self) -> Result<Vec<Field>, ParseError> {
        self.expect(TokenType::LBrace, "'{'")?;
        let mut fields = Vec::new();
        if !self.check(&TokenType::RBrace) {
            loop {
                fields.push(self.parse_field()?);
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
                if self.check(&TokenType::RBrace) {
                    break; // trailing comma
                }
            }
        }
        self.expect(TokenType::RBrace, "'}'")?;
        Ok(fields)
    }

    /// Field ::= Attribute* (Spread | ComputedField | NamedField)
    fn parse_field(&mut self) -> Result<Field, ParseError> {
        let start = self.current().pos_start;
        let attributes = self.parse_attributes()?;

        let kind = if self.match_token(&TokenType::Spread) {
            FieldKind::Spread(self.parse_type()?)
        } else if self.match_token(&TokenType::LBracket) {
            let key = self.parse_type()?;
            self.expect(TokenType::RBracket, "']'")?;
            self.expect(TokenType::Colon, "':'")?;
            let ty = self.parse_type()?;
            FieldKind::Computed { key, ty }
        } else {
            let name = if let TokenType::String(s) = self.current().ttype.clone() {
                self.advance();
                s
            } else {
                self.expect_name("a field name")?
            };
            let optional = self.match_token(&TokenType::Question);
            self.expect(TokenType::Colon, "':'")?;
            let ty = self.parse_type()?;
            FieldKind::Named { name, optional, ty }
        };

        Ok(Field {
            attributes,
            kind,
            span: Span::new(start, self.previous_end()),
        })
    }

    // === Attributes ===

    /// Attribute* where each is `#[` AttrItem (',' AttrItem)* ','? `]`
    fn parse_attributes(&mut self) -> Result<Vec<Attribute>, ParseError> {
        let mut attributes = Vec::new();
        while self.match_token(&TokenType::Hash) {
            self.expect(TokenType::LBracket, "'['")?;
            loop {
                attributes.push(self.parse_attr_item()?);
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
                if self.check(&TokenType::RBracket) {
                    break;
                }
            }
            self.expect(TokenType::RBracket, "']'")?;
        }
        Ok(attributes)
    }

    /// AttrItem ::= Ident | Ident '=' Value | Ident '(' Args? ')'
    ///            | Ident '=' '(' Args? ')'
    fn parse_attr_item(&mut self) -> Result<Attribute, ParseError> {
        let start = self.current().pos_start;
        let name = self.expect_name("an attribute name")?;

        let value = if self.match_token(&TokenType::Equals) {
            if self.match_token(&TokenType::LParen) {
                Some(AttrValue::Call {
                    name: name.clone(),
                    args: self.parse_attr_args()?,
                })
            } else {
                Some(self.parse_attr_value()?)
            }
        } else if self.match_token(&TokenType::LParen) {
            Some(AttrValue::Call {
                name: name.clone(),
                args: self.parse_attr_args()?,
            })
        } else {
            None
        };

        Ok(Attribute {
            name,
            value,
            span: Span::new(start, self.previous_end()),
        })
    }

    /// Arguments up to and including the closing `)`.
    fn parse_attr_args(&mut self) -> Result<Vec<AttrValue>, ParseError> {
        let mut args = Vec::new();
        if !self.check(&TokenType::RParen) {
            loop {
                args.push(self.parse_attr_value()?);
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
                if self.check(&TokenType::RParen) {
                    break;
                }
            }
        }
        self.expect(TokenType::RParen, "')'")?;
        Ok(args)
    }

    fn parse_attr_value(&mut self) -> Result<AttrValue, ParseError> {
        let ttype = self.current().ttype.clone();
        match ttype {
            TokenType::String(s) => {
                self.advance();
                Ok(AttrValue::String(s))
            }
            TokenType::Number(n) => {
                self.advance();
                Ok(AttrValue::Number(n))
            }
            TokenType::True => {
                self.advance();
                Ok(AttrValue::Boolean(true))
            }
            TokenType::False => {
                self.advance();
                Ok(AttrValue::Boolean(false))
            }
            TokenType::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(&TokenType::RBracket) {
                    loop {
                        items.push(self.parse_attr_value()?);
                        if !self.match_token(&TokenType::Comma) {
                            break;
                        }
                        if self.check(&TokenType::RBracket) {
                            break;
                        }
                    }
                }
                self.expect(TokenType::RBracket, "']'")?;
                Ok(AttrValue::Array(items))
            }
            TokenType::Identifier(name) => {
                self.advance();
                if self.match_token(&TokenType::LParen) {
                    Ok(AttrValue::Call {
                        name,
                        args: self.parse_attr_args()?,
                    })
                } else {
                    Ok(AttrValue::Ident(name))
                }
            }
            _ => self.err_unexpected("an attribute value"),
        }
    }

    // === Ranges ===

    /// Range ::= Number | Number? '<'? '..' '<'? Number?
    fn parse_range(&mut self) -> Result<RangeExpr, ParseError> {
        let start = self.current().pos_start;

        let min = self.peek_number();
        if min.is_some() {
            self.advance();
        }
        let min_exclusive = self.match_token(&TokenType::Lt);

        if !self.check(&TokenType::DotDot) {
            // `@ 2` shorthand for an exact value.
            if let (Some(n), false) = (min, min_exclusive) {
                return Ok(RangeExpr::exact(n));
            }
            return Err(self.make_range_error(start, "expected '..' in range"));
        }
        self.advance();

        let max_exclusive = self.match_token(&TokenType::Lt);
        let max = self.peek_number();
        if max.is_some() {
            self.advance();
        }

        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(self.make_range_error(start, "range lower bound exceeds upper bound"));
            }
        }

        Ok(RangeExpr {
            min,
            max,
            min_exclusive,
            max_exclusive,
        })
    }

    // === Shared Sub-Rules ===

    /// Path ::= '::'? Segment ('::' Segment)*, Segment ::= Ident | 'super'
    fn parse_module_path(&mut self) -> Result<ModulePath, ParseError> {
        let absolute = self.match_token(&TokenType::DoubleColon);
        let mut segments = vec![self.expect_path_segment()?];
        while self.match_token(&TokenType::DoubleColon) {
            segments.push(self.expect_path_segment()?);
        }
        Ok(ModulePath::new(segments, absolute))
    }

    fn expect_path_segment(&mut self) -> Result<String, ParseError> {
        if self.match_token(&TokenType::Super) {
            return Ok("super".to_string());
        }
        self.expect_name("a path segment")
    }

    /// Generic parameter list `<A, B>` on a declaration; empty when absent.
    fn parse_generic_params(&mut self) -> Result<Vec<String>, ParseError> {
        if !self.match_token(&TokenType::Lt) {
            return Ok(Vec::new());
        }
        let mut params = vec![self.expect_name("a generic parameter")?];
        while self.match_token(&TokenType::Comma) {
            if self.check(&TokenType::Gt) {
                break;
            }
            params.push(self.expect_name("a generic parameter")?);
        }
        self.expect(TokenType::Gt, "'>'")?;
        Ok(params)
    }

    /// Generic argument list `<T, U>` on a use site.
    fn parse_generic_args(&mut self) -> Result<Vec<TypeExpr>, ParseError> {
        self.expect(TokenType::Lt, "'<'")?;
        let mut args = vec![self.parse_type()?];
        while self.match_token(&TokenType::Comma) {
            if self.check(&TokenType::Gt) {
                break;
            }
            args.push(self.parse_type()?);
        }
        self.expect(TokenType::Gt, "'>'")?;
        Ok(args)
    }

    fn parse_literal(&mut self) -> Result<LiteralValue, ParseError> {
        let ttype = self.current().ttype.clone();
        match ttype {
            TokenType::String(s) => {
                self.advance();
                Ok(LiteralValue::String(s))
            }
            TokenType::Number(n) => {
                self.advance();
                Ok(LiteralValue::Number(n))
            }
            TokenType::True => {
                self.advance();
                Ok(LiteralValue::Boolean(true))
            }
            TokenType::False => {
                self.advance();
                Ok(LiteralValue::Boolean(false))
            }
            _ => self.err_unexpected("a literal"),
        }
    }

    // === Tokenizer Helper Methods ===

    fn peek_number(&self) -> Option<f64> {
        if let TokenType::Number(n) = self.current().ttype {
            Some(n)
        } else {
            None
        }
    }

    fn current(&self) -> &Token {
        // The token vector always ends with Eof and advance() never moves
        // past it.
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn previous_end(&self) -> usize {
        if self.position == 0 {
            0
        } else {
            self.tokens[self.position - 1].pos_end
        }
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn check(&self, ttype: &TokenType) -> bool {
        std::mem::discriminant(&self.current().ttype) == std::mem::discriminant(ttype)
    }

    fn match_token(&mut self, ttype: &TokenType) -> bool {
        if self.check(ttype) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn peek_is_identifier(&self) -> bool {
        matches!(
            self.tokens.get(self.position + 1).map(|t| &t.ttype),
            Some(TokenType::Identifier(_))
        )
    }

    fn expect(&mut self, expected: TokenType, what: &str) -> Result<Span, ParseError> {
        if self.check(&expected) {
            let span = Span::new(self.current().pos_start, self.current().pos_end);
            self.advance();
            Ok(span)
        } else {
            let closer = matches!(
                expected,
                TokenType::RBrace | TokenType::RBracket | TokenType::RParen | TokenType::Gt
            );
            Err(self.make_error_with_kind(what, closer))
        }
    }

    /// An identifier, or a keyword used in name position (`type: string` is
    /// a perfectly ordinary field).
    fn expect_name(&mut self, what: &str) -> Result<String, ParseError> {
        let name = match &self.current().ttype {
            TokenType::Identifier(s) => s.clone(),
            TokenType::Use => "use".to_string(),
            TokenType::Type => "type".to_string(),
            TokenType::Struct => "struct".to_string(),
            TokenType::Enum => "enum".to_string(),
            TokenType::Dispatch => "dispatch".to_string(),
            TokenType::To => "to".to_string(),
            TokenType::Super => "super".to_string(),
            _ => return self.err_unexpected(what),
        };
        self.advance();
        Ok(name)
    }

    fn err_unexpected<T>(&self, expected: &str) -> Result<T, ParseError> {
        Err(self.make_error(expected))
    }

    fn make_error(&self, expected: &str) -> ParseError {
        self.make_error_with_kind(expected, false)
    }

    fn make_error_with_kind(&self, expected: &str, closing_delimiter: bool) -> ParseError {
        let token = self.current();
        let at_eof = token.ttype == TokenType::Eof;
        let kind = match (at_eof, closing_delimiter) {
            (true, true) => ParseErrorKind::UnclosedDelimiter,
            (true, false) => ParseErrorKind::UnexpectedEof,
            (false, _) => ParseErrorKind::UnexpectedToken,
        };
        let found = if at_eof {
            "end of file".to_string()
        } else {
            format!("{:?}", token.ttype)
        };
        let span = if at_eof {
            let pos = self.source_len.saturating_sub(1);
            Span::new(pos, self.source_len)
        } else {
            Span::new(token.pos_start, token.pos_end)
        };
        ParseError {
            span,
            kind,
            message: format!("expected {expected}, found {found}"),
            expected: Some(expected.to_string()),
        }
    }

    fn make_range_error(&self, start: usize, message: &str) -> ParseError {
        ParseError {
            span: Span::new(start, self.current().pos_end.max(start)),
            kind: ParseErrorKind::IllegalRange,
            message: message.to_string(),
            expected: None,
        }
    }
}
