//! Tokenizer for JOVIAL J73 source text.
//!
//! The lexer is context-free: quoted text always comes out as a single
//! [`TokenKind::QuotedText`] token, and the parser decides from grammar
//! position whether it is a comment or a string literal. Apostrophes are
//! word separators inside identifiers (`FLIGHT'CONTROL` is one token), so
//! the apostrophe is never a quote delimiter here.
//!
//! Malformed input never fails the lexer; it produces an `Error` token plus
//! a diagnostic and continues from the next plausible boundary.

use crate::diagnostics::{Category, Diagnostic};
use crate::span::{Position, Span};
use crate::token::{Keyword, Token, TokenKind};

/// Tokenizes `source` completely. The returned stream always ends with an
/// `Eof` token.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut lexer = Lexer::new(source);
    lexer.run();
    (lexer.tokens, lexer.diagnostics)
}

struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 0,
            column: 0,
            tokens: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn run(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.bump();
                continue;
            }
            let start = self.mark();
            match ch {
                '"' => self.quoted_text(start),
                c if c.is_ascii_alphabetic() => self.identifier(start),
                c if c.is_ascii_digit() => self.number(start),
                _ => self.punctuation(start, ch),
            }
        }
        let end = self.mark();
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            span: self.span_from(end),
            text: String::new(),
        });
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += ch.len_utf8();
        }
        Some(ch)
    }

    fn mark(&self) -> (usize, Position) {
        (self.pos, Position::new(self.line, self.column))
    }

    fn span_from(&self, start: (usize, Position)) -> Span {
        Span::new(
            start.0..self.pos,
            start.1,
            Position::new(self.line, self.column),
        )
    }

    fn push(&mut self, kind: TokenKind, start: (usize, Position)) {
        let span = self.span_from(start);
        let text = self.source[span.offsets.clone()].to_string();
        self.tokens.push(Token { kind, span, text });
    }

    fn error_token(&mut self, start: (usize, Position), message: impl Into<String>) {
        let span = self.span_from(start);
        self.diagnostics
            .push(Diagnostic::error(Category::Lex, span.clone(), message));
        let text = self.source[span.offsets.clone()].to_string();
        self.tokens.push(Token {
            kind: TokenKind::Error,
            span,
            text,
        });
    }

    /// `"..."`, terminated on the same line. An unterminated quote produces
    /// an error token up to the end of the line.
    fn quoted_text(&mut self, start: (usize, Position)) {
        self.bump();
        loop {
            match self.peek() {
                Some('"') => {
                    self.bump();
                    self.push(TokenKind::QuotedText, start);
                    return;
                }
                Some('\n') | None => {
                    self.error_token(start, "unterminated quoted text");
                    return;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    /// Letter/digit groups joined by interior apostrophes. The apostrophe
    /// is only consumed when flanked by identifier characters on both
    /// sides.
    fn identifier(&mut self, start: (usize, Position)) {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_alphanumeric() => {
                    self.bump();
                }
                Some('\'')
                    if self
                        .peek_at(1)
                        .map(|c| c.is_ascii_alphanumeric())
                        .unwrap_or(false) =>
                {
                    self.bump();
                }
                _ => break,
            }
        }
        let text = &self.source[start.0..self.pos];
        match Keyword::from_str(text) {
            Some(keyword) => self.push(TokenKind::Keyword(keyword), start),
            None => self.push(TokenKind::Ident, start),
        }
    }

    fn number(&mut self, start: (usize, Position)) {
        while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            self.bump();
        }

        // Bead-count bit string: digits `B` `'beads'`.
        if matches!(self.peek(), Some('B' | 'b')) && self.peek_at(1) == Some('\'') {
            self.bump();
            self.bump();
            loop {
                match self.peek() {
                    Some('\'') => {
                        self.bump();
                        self.push(TokenKind::BitString, start);
                        return;
                    }
                    Some(c) if c.is_ascii_alphanumeric() => {
                        self.bump();
                    }
                    _ => {
                        self.error_token(start, "malformed bit-string literal");
                        return;
                    }
                }
            }
        }

        let mut is_real = false;
        if self.peek() == Some('.')
            && self
                .peek_at(1)
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false)
        {
            is_real = true;
            self.bump();
            while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                self.bump();
            }
        }

        if matches!(self.peek(), Some('E' | 'e')) {
            let signed = matches!(self.peek_at(1), Some('+' | '-'))
                && self.peek_at(2).map(|c| c.is_ascii_digit()).unwrap_or(false);
            let plain = self
                .peek_at(1)
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false);
            if signed || plain {
                is_real = true;
                self.bump();
                if signed {
                    self.bump();
                }
                while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                    self.bump();
                }
            }
        }

        // Explicit scale suffix makes a fixed-point literal: `1.5A7`.
        if matches!(self.peek(), Some('A' | 'a'))
            && self
                .peek_at(1)
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false)
        {
            self.bump();
            while self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                self.bump();
            }
            self.push(TokenKind::Fixed, start);
            return;
        }

        if is_real {
            self.push(TokenKind::Real, start);
        } else {
            self.push(TokenKind::Integer, start);
        }
    }

    fn punctuation(&mut self, start: (usize, Position), ch: char) {
        self.bump();
        let kind = match ch {
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ':' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Assign
                } else {
                    TokenKind::Colon
                }
            }
            '=' => TokenKind::Eq,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '<' => match self.peek() {
                Some('=') => {
                    self.bump();
                    TokenKind::LessEq
                }
                Some('>') => {
                    self.bump();
                    TokenKind::NotEq
                }
                _ => TokenKind::Less,
            },
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::GreaterEq
                } else {
                    TokenKind::Greater
                }
            }
            '@' => TokenKind::At,
            other => {
                self.error_token(start, format!("unexpected character `{other}`"));
                return;
            }
        };
        self.push(kind, start);
    }
}
