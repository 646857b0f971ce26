//! # mcdoc Lexer (Tokenizer)
//!
//! This module provides the `Lexer` for the mcdoc schema language. The lexer
//! is the first stage of the pipeline: it converts raw schema text into a
//! sequence of discrete [`Token`]s for the [`Parser`](crate::parser::Parser).
//!
//! ## Architectural Overview
//!
//! The `Lexer` is a hand-written, stateful scanner over the source bytes.
//! It recognizes the fundamental building blocks of mcdoc:
//!
//! - **Literals:** identifiers, strings, and numbers.
//! - **Keywords:** `use`, `type`, `struct`, `enum`, `dispatch`, `to`, `super`,
//!   `true`, `false`.
//! - **Punctuation:** braces, brackets, parens, `,`, `:`, `::`, `?`, `|`, `@`,
//!   `#`, `%`, `/`, `<`, `>`, `=`.
//! - **Range and spread operators:** `..` and `...`.
//! - **Whitespace and comments:** produced as tokens so token positions stay
//!   exact; the parser filters them out. Line comments start with `//`; doc
//!   comments (`///`) are lexed identically.
//!
//! Each `Token` records its start and end byte positions in the source,
//! which is what diagnostics point at later in the pipeline.
//!
//! ## Example: Direct Lexer Usage
//!
//! ```rust
//! use mcdoc_core::lexer::{Lexer, TokenType};
//!
//! let source = "temperature: float // degrees";
//!
//! let mut lexer = Lexer::new(source);
//! assert_eq!(lexer.next_token().ttype, TokenType::Identifier("temperature".to_string()));
//! assert_eq!(lexer.next_token().ttype, TokenType::Colon);
//! assert_eq!(lexer.next_token().ttype, TokenType::Whitespace);
//! assert_eq!(lexer.next_token().ttype, TokenType::Identifier("float".to_string()));
//! assert_eq!(lexer.next_token().ttype, TokenType::Whitespace);
//! assert!(matches!(lexer.next_token().ttype, TokenType::Comment(_)));
//! assert_eq!(lexer.next_token().ttype, TokenType::Eof);
//! ```

/// Represents the different kinds of tokens that the lexer can produce.
#[derive(Debug, PartialEq, Clone)]
pub enum TokenType {
    // == Special Tokens ==
    /// Represents the end of the input.
    Eof,
    /// A run of one or more whitespace characters.
    Whitespace,
    /// A line comment. `//` and `///` both produce this token; the
    /// associated `String` holds the comment text without the slashes.
    Comment(String),
    /// A character sequence the lexer could not recognize.
    Unknown,

    // == Literals ==
    /// An identifier: field names, type names, resource path segments.
    Identifier(String),
    /// A double-quoted string literal with escapes already processed.
    String(String),
    /// A number literal, integer or floating point, possibly negative.
    Number(f64),

    // == Keywords ==
    /// The `use` keyword, importing a symbol from another module.
    Use,
    /// The `type` keyword, introducing a type alias.
    Type,
    /// The `struct` keyword.
    Struct,
    /// The `enum` keyword.
    Enum,
    /// The `dispatch` keyword.
    Dispatch,
    /// The `to` keyword inside a dispatch statement.
    To,
    /// The `super` path segment.
    Super,
    /// The boolean `true` literal.
    True,
    /// The boolean `false` literal.
    False,

    // == Punctuation & Operators ==
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `<` (generics and exclusive range bounds)
    Lt,
    /// `>`
    Gt,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `::` (path separator)
    DoubleColon,
    /// `.` (dotted dispatcher index segments)
    Dot,
    /// `..` (range operator)
    DotDot,
    /// `...` (spread operator)
    Spread,
    /// `=`
    Equals,
    /// `#` (attribute prefix)
    Hash,
    /// `?` (optional field marker)
    Question,
    /// `|` (union separator)
    Pipe,
    /// `@` (constraint operator)
    At,
    /// `/` (resource path separator)
    Slash,
    /// `%` (static dispatcher key prefix)
    Percent,
}

/// A single lexical token with its byte positions in the source text.
#[derive(Debug, Clone)]
pub struct Token {
    /// The type of the token, e.g. `TokenType::Identifier`.
    pub ttype: TokenType,
    /// The 0-based starting byte position of the token.
    pub pos_start: usize,
    /// The 0-based ending byte position of the token (exclusive).
    pub pos_end: usize,
}

impl Token {
    /// Creates a new `Token`.
    #[must_use]
    pub fn new(ttype: TokenType, pos_start: usize, pos_end: usize) -> Token {
        Token {
            ttype,
            pos_start,
            pos_end,
        }
    }
}

/// A lexer for the mcdoc schema language.
///
/// Reads the source as a stream of characters and breaks it down into
/// [`Token`]s. Two characters of lookahead are kept so that `0..1` lexes as
/// `0`, `..`, `1` while `0.5` stays a single number.
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new `Lexer` for the given input string.
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    /// Consumes the `Lexer` and returns all tokens from the source,
    /// including the final [`TokenType::Eof`] token.
    pub fn lex(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.ttype == TokenType::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    /// Scans and returns the next [`Token`] from the input stream.
    ///
    /// When the end of the input is reached, it will repeatedly return a
    /// token of type [`TokenType::Eof`].
    pub fn next_token(&mut self) -> Token {
        let start_pos = self.position;

        let ttype = if let Some(char) = self.advance() {
            match char {
                '{' => TokenType::LBrace,
                '}' => TokenType::RBrace,
                '[' => TokenType::LBracket,
                ']' => TokenType::RBracket,
                '(' => TokenType::LParen,
                ')' => TokenType::RParen,
                '<' => TokenType::Lt,
                '>' => TokenType::Gt,
                ',' => TokenType::Comma,
                '=' => TokenType::Equals,
                '#' => TokenType::Hash,
                '?' => TokenType::Question,
                '|' => TokenType::Pipe,
                '@' => TokenType::At,
                '%' => TokenType::Percent,

                ':' => {
                    if self.peek() == Some(':') {
                        self.advance();
                        TokenType::DoubleColon
                    } else {
                        TokenType::Colon
                    }
                }
                '.' => {
                    if self.peek() == Some('.') {
                        self.advance();
                        if self.peek() == Some('.') {
                            self.advance();
                            TokenType::Spread
                        } else {
                            TokenType::DotDot
                        }
                    } else {
                        TokenType::Dot
                    }
                }
                '/' => {
                    if self.peek() == Some('/') {
                        self.read_comment()
                    } else {
                        TokenType::Slash
                    }
                }
                '"' => self.read_string(),
                c if c.is_whitespace() => self.read_whitespace(),
                c if c.is_ascii_alphabetic() || c == '_' => self.read_identifier(c),
                c if c.is_ascii_digit()
                    || (c == '-' && self.peek().is_some_and(|n| n.is_ascii_digit())) =>
                {
                    self.read_number(c)
                }

                _ => TokenType::Unknown,
            }
        } else {
            TokenType::Eof
        };

        Token::new(ttype, start_pos, self.position)
    }

    fn advance(&mut self) -> Option<char> {
        let char = self.input[self.position..].chars().next();
        if let Some(c) = char {
            self.position += c.len_utf8();
        }
        char
    }

    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek2(&self) -> Option<char> {
        let mut chars = self.input[self.position..].chars();
        chars.next();
        chars.next()
    }

    fn read_whitespace(&mut self) -> TokenType {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
        TokenType::Whitespace
    }

    fn read_comment(&mut self) -> TokenType {
        self.advance(); // Consume the second '/'
        if self.peek() == Some('/') {
            self.advance(); // Doc comments lex like plain comments
        }
        let mut comment_text = String::new();
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            comment_text.push(c);
            self.advance();
        }
        TokenType::Comment(comment_text.trim().to_string())
    }

    fn read_string(&mut self) -> TokenType {
        let mut value = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.advance(); // Consume the closing quote
                    return TokenType::String(value);
                }
                Some('\\') => {
                    self.advance(); // Consume the backslash
                    match self.advance() {
                        Some('"') => value.push('"'),
                        Some('\\') => value.push('\\'),
                        Some('n') => value.push('\n'),
                        Some('r') => value.push('\r'),
                        Some('t') => value.push('\t'),
                        Some(other) => {
                            value.push('\\');
                            value.push(other);
                        }
                        None => return TokenType::Unknown, // Unclosed escape sequence
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
                None => return TokenType::Unknown, // Unclosed string
            }
        }
    }

    fn read_identifier(&mut self, first_char: char) -> TokenType {
        let mut ident = String::new();
        ident.push(first_char);

        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }

        match ident.as_str() {
            "use" => TokenType::Use,
            "type" => TokenType::Type,
            "struct" => TokenType::Struct,
            "enum" => TokenType::Enum,
            "dispatch" => TokenType::Dispatch,
            "to" => TokenType::To,
            "super" => TokenType::Super,
            "true" => TokenType::True,
            "false" => TokenType::False,
            _ => TokenType::Identifier(ident),
        }
    }

    fn read_number(&mut self, first_char: char) -> TokenType {
        let mut number_str = String::new();
        number_str.push(first_char);
        let mut has_dot = false;
        let mut has_exponent = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                number_str.push(c);
                self.advance();
            } else if c == '.' && !has_dot && !has_exponent {
                // Only part of the number if a digit follows; `0..1` must
                // lex as `0` `..` `1`.
                if self.peek2().is_some_and(|n| n.is_ascii_digit()) {
                    has_dot = true;
                    number_str.push(c);
                    self.advance();
                } else {
                    break;
                }
            } else if (c == 'e' || c == 'E') && !has_exponent {
                has_exponent = true;
                number_str.push(c);
                self.advance();
                if let Some(sign_char) = self.peek() {
                    if sign_char == '+' || sign_char == '-' {
                        number_str.push(sign_char);
                        self.advance();
                    }
                }
            } else {
                break;
            }
        }

        if let Ok(num) = number_str.parse::<f64>() {
            TokenType::Number(num)
        } else {
            TokenType::Unknown
        }
    }
}
