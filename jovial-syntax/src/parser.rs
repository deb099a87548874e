//! Error-tolerant recursive descent parser.
//!
//! The parser never aborts: an unexpected token produces a `Parse`
//! diagnostic and a bounded skip to the next statement/declaration boundary
//! (`;`, `BEGIN`, `END`, or a top-level keyword), after which parsing
//! resumes. Partial nodes that are still viable are kept, so positional
//! queries stay useful while the user is mid-edit.
//!
//! Quoted-text tokens are interpreted here, not in the lexer: in
//! declaration/statement position they are comments (captured as
//! documentation for an adjacent following declaration), in expression
//! operand position they are string literals.

use crate::ast::{
    BinaryOp, Declaration, Dimension, Expr, ExternalKind, Module, ModuleKind, Name, Statement,
    TypeSpec, UnaryOp, VarRef,
};
use crate::diagnostics::{Category, Diagnostic};
use crate::lexer::tokenize;
use crate::span::Span;
use crate::token::{Keyword, Token, TokenKind};

/// Parses a token stream produced by [`tokenize`].
pub fn parse_tokens(tokens: &[Token]) -> (Module, Vec<Diagnostic>) {
    let mut parser = Parser::new(tokens);
    let module = parser.parse_module();
    (module, parser.diagnostics)
}

/// Convenience entry point: lex and parse in one call, returning the
/// combined diagnostics.
pub fn parse(source: &str) -> (Module, Vec<Diagnostic>) {
    let (tokens, mut diagnostics) = tokenize(source);
    let (module, parse_diagnostics) = parse_tokens(&tokens);
    diagnostics.extend(parse_diagnostics);
    (module, diagnostics)
}

/// Marker for a parse error that was already reported; the caller skips to
/// the next boundary and resumes.
struct Recovery;

type ParseResult<T> = Result<T, Recovery>;

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    /// Most recent free-standing comment, with the line it ends on.
    pending_doc: Option<(String, usize)>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            pending_doc: None,
        }
    }

    // ------------------------------------------------------------------
    // Token management
    // ------------------------------------------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> TokenKind {
        self.current().kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        self.kind() == TokenKind::Keyword(keyword)
    }

    fn at_eof(&self) -> bool {
        self.at(TokenKind::Eof)
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        self.eat(TokenKind::Keyword(keyword))
    }

    fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span.clone()
        } else {
            self.current().span.clone()
        }
    }

    fn error(&mut self, message: impl Into<String>) -> Recovery {
        let span = self.current().span.clone();
        self.diagnostics
            .push(Diagnostic::error(Category::Parse, span, message));
        Recovery
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> ParseResult<Span> {
        if self.at(kind) {
            Ok(self.advance().span)
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> ParseResult<Span> {
        if self.at_keyword(keyword) {
            Ok(self.advance().span)
        } else {
            Err(self.error(format!("expected {}", keyword.as_str())))
        }
    }

    fn expect_name(&mut self) -> ParseResult<Name> {
        if self.at(TokenKind::Ident) {
            let token = self.advance();
            Ok(Name {
                text: token.text,
                span: token.span,
            })
        } else {
            Err(self.error("expected identifier"))
        }
    }

    /// Skips to the next statement/declaration boundary. A `;` is consumed;
    /// `BEGIN`, `END`, `TERM` and declaration/statement keywords are left
    /// for the caller.
    fn recover(&mut self) {
        loop {
            match self.kind() {
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::Eof => return,
                TokenKind::Keyword(
                    Keyword::Begin
                    | Keyword::End
                    | Keyword::Term
                    | Keyword::Define
                    | Keyword::Item
                    | Keyword::Table
                    | Keyword::Proc
                    | Keyword::Compool
                    | Keyword::Def
                    | Keyword::Ref
                    | Keyword::If
                    | Keyword::For
                    | Keyword::Goto
                    | Keyword::Return
                    | Keyword::Exit
                    | Keyword::Stop,
                ) => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Recovery that always makes progress, even when the unexpected token
    /// is itself a boundary keyword.
    fn recover_from(&mut self, before: usize) {
        self.recover();
        if self.pos == before && !self.at_eof() {
            self.advance();
        }
    }

    /// Lenient declaration terminator: a missing `;` is reported but the
    /// declaration built so far is kept.
    fn finish_declaration(&mut self) {
        if !self.eat(TokenKind::Semicolon) {
            let _ = self.error("expected `;`");
        }
    }

    // ------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------

    /// Consumes free-standing comments (and already-diagnosed error
    /// tokens) at a declaration/statement boundary, remembering the last
    /// comment as candidate documentation.
    fn skip_trivia(&mut self) {
        loop {
            match self.kind() {
                TokenKind::QuotedText => {
                    let token = self.advance();
                    let text = token.text.trim_matches('"').trim().to_string();
                    self.pending_doc = Some((text, token.span.end.line));
                }
                TokenKind::Error => {
                    self.advance();
                }
                _ => break,
            }
        }
    }

    /// Takes the pending comment if it ends on the line before (or the
    /// same line as) the construct starting at `line`.
    fn take_doc(&mut self, line: usize) -> Option<String> {
        let (text, end_line) = self.pending_doc.take()?;
        if line <= end_line + 1 && !text.is_empty() {
            Some(text)
        } else {
            None
        }
    }

    fn at_declaration_start(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::Keyword(
                Keyword::Define
                    | Keyword::Item
                    | Keyword::Table
                    | Keyword::Proc
                    | Keyword::Compool
                    | Keyword::Def
                    | Keyword::Ref
            )
        )
    }

    // ------------------------------------------------------------------
    // Module
    // ------------------------------------------------------------------

    fn parse_module(&mut self) -> Module {
        let module_start = self.current().span.clone();
        self.skip_trivia();

        let mut kind = ModuleKind::Fragment;
        let mut name = None;
        let mut header_span = None;

        if self.at_keyword(Keyword::Start) {
            let span = self.advance().span;
            kind = ModuleKind::Program;
            name = self.expect_name().ok();
            if !self.eat(TokenKind::Semicolon) {
                self.error("expected `;` after module header");
                self.recover();
            }
            header_span = Some(span);
        } else if self.at_keyword(Keyword::Compool) {
            // At file start COMPOOL is the pool-module header; the nested
            // block form only occurs after a header.
            let span = self.advance().span;
            kind = ModuleKind::Compool;
            name = self.expect_name().ok();
            if !self.eat(TokenKind::Semicolon) {
                self.error("expected `;` after module header");
                self.recover();
            }
            header_span = Some(span);
        }

        let mut declarations = Vec::new();
        let mut statements = Vec::new();
        let mut terminated = false;

        loop {
            self.skip_trivia();
            if self.at_eof() {
                break;
            }
            if self.at_keyword(Keyword::Term) {
                self.advance();
                self.eat(TokenKind::Semicolon);
                terminated = true;
                break;
            }
            let before = self.pos;
            if self.at_declaration_start() {
                match self.parse_declaration() {
                    Ok(declaration) => declarations.push(declaration),
                    Err(Recovery) => self.recover_from(before),
                }
            } else {
                match self.parse_statement() {
                    Ok(statement) => statements.push(statement),
                    Err(Recovery) => self.recover_from(before),
                }
            }
        }

        if header_span.is_some() && !terminated {
            self.diagnostics.push(Diagnostic::error(
                Category::Parse,
                self.prev_span(),
                "missing TERM",
            ));
        }

        let span = if self.tokens.len() > 1 {
            module_start.merge(&self.prev_span())
        } else {
            module_start
        };

        Module {
            kind,
            name,
            declarations,
            statements,
            span,
        }
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn parse_declaration(&mut self) -> ParseResult<Declaration> {
        match self.kind() {
            TokenKind::Keyword(Keyword::Define) => self.parse_define(),
            TokenKind::Keyword(Keyword::Item) => self.parse_item(),
            TokenKind::Keyword(Keyword::Table) => self.parse_table(),
            TokenKind::Keyword(Keyword::Proc) => self.parse_proc(),
            TokenKind::Keyword(Keyword::Compool) => self.parse_compool_block(),
            TokenKind::Keyword(Keyword::Def | Keyword::Ref) => self.parse_external(),
            _ => Err(self.error("expected declaration")),
        }
    }

    fn parse_define(&mut self) -> ParseResult<Declaration> {
        let start = self.expect_keyword(Keyword::Define)?;
        let doc = self.take_doc(start.start.line);
        let name = self.expect_name()?;
        // `DEFINE name = value;` with the `=` optional.
        self.eat(TokenKind::Eq);
        let value = if self.at(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.finish_declaration();
        Ok(Declaration::Define {
            name,
            value,
            doc,
            span: start.merge(&self.prev_span()),
        })
    }

    fn parse_item(&mut self) -> ParseResult<Declaration> {
        let start = self.expect_keyword(Keyword::Item)?;
        let doc = self.take_doc(start.start.line);
        let name = self.expect_name()?;

        let mut is_static = false;
        let mut is_constant = false;
        loop {
            if self.eat_keyword(Keyword::Static) {
                is_static = true;
            } else if self.eat_keyword(Keyword::Constant) {
                is_constant = true;
            } else {
                break;
            }
        }

        let type_spec = self.parse_type_spec();

        let initial = if self.eat(TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        self.finish_declaration();
        Ok(Declaration::Item {
            name,
            type_spec,
            is_static,
            is_constant,
            initial,
            doc,
            span: start.merge(&self.prev_span()),
        })
    }

    /// Type letter + width (+ scale), STATUS member list, or LIKE. A
    /// missing specifier is reported but yields `Unknown` so the caller
    /// can still reach the terminator.
    fn parse_type_spec(&mut self) -> TypeSpec {
        if self.at_keyword(Keyword::Status) {
            self.advance();
            return self.parse_status_members();
        }
        if self.eat_keyword(Keyword::Like) {
            return match self.expect_name() {
                Ok(source) => TypeSpec::Like { source },
                Err(Recovery) => TypeSpec::Unknown,
            };
        }
        if self.at(TokenKind::Ident) && self.current().text.len() == 1 {
            let letter = self.advance().text.to_ascii_uppercase();
            let width = self.parse_width();
            return match letter.as_str() {
                "S" => TypeSpec::Signed { width },
                "U" => TypeSpec::Unsigned { width },
                "F" => TypeSpec::Float { width },
                "B" => TypeSpec::Bit { width },
                "C" => TypeSpec::Character { width },
                "P" => TypeSpec::Pointer,
                "A" => {
                    let scale = if self.eat(TokenKind::Comma) {
                        self.parse_width()
                    } else {
                        None
                    };
                    TypeSpec::Fixed { width, scale }
                }
                _ => {
                    self.error(format!("unknown type letter `{letter}`"));
                    TypeSpec::Unknown
                }
            };
        }
        if !self.at(TokenKind::Semicolon) && !self.at(TokenKind::Eq) {
            self.error("expected type specifier");
        }
        TypeSpec::Unknown
    }

    fn parse_width(&mut self) -> Option<u32> {
        if self.at(TokenKind::Integer) {
            let token = self.advance();
            token.text.parse().ok()
        } else {
            None
        }
    }

    /// `( V(a), V(b), ... )` after the STATUS keyword.
    fn parse_status_members(&mut self) -> TypeSpec {
        let mut values = Vec::new();
        if !self.eat(TokenKind::LParen) {
            self.error("expected `(` after STATUS");
            return TypeSpec::Status { values };
        }
        loop {
            if self.eat(TokenKind::RParen) || self.at_eof() {
                break;
            }
            if self.eat_keyword(Keyword::V) {
                let ok = self.eat(TokenKind::LParen);
                match self.expect_name() {
                    Ok(value) => {
                        values.push(value);
                    }
                    Err(Recovery) => {
                        self.recover_inside_parens();
                        break;
                    }
                }
                if ok && !self.eat(TokenKind::RParen) {
                    self.error("expected `)` after status value");
                }
            } else {
                self.error("expected V(name) status value");
                self.recover_inside_parens();
                break;
            }
            self.eat(TokenKind::Comma);
        }
        TypeSpec::Status { values }
    }

    /// Skips to the closing `)` of a member list, or a boundary.
    fn recover_inside_parens(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.kind() {
                TokenKind::RParen if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::RParen => {
                    depth -= 1;
                    self.advance();
                }
                TokenKind::LParen => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::Semicolon | TokenKind::Eof => return,
                TokenKind::Keyword(Keyword::Begin | Keyword::End | Keyword::Term) => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn parse_table(&mut self) -> ParseResult<Declaration> {
        let start = self.expect_keyword(Keyword::Table)?;
        let doc = self.take_doc(start.start.line);
        let name = self.expect_name()?;

        let mut dimensions = Vec::new();
        if self.eat(TokenKind::LParen) {
            loop {
                if self.eat(TokenKind::RParen) || self.at_eof() {
                    break;
                }
                let lower = self.parse_expr()?;
                self.expect(TokenKind::Colon, "`:` in table dimension")?;
                let upper = self.parse_expr()?;
                let span = lower.span().merge(upper.span());
                let label = format!("{}:{}", lower.display_label(), upper.display_label());
                dimensions.push(Dimension {
                    lower,
                    upper,
                    label,
                    span,
                });
                self.eat(TokenKind::Comma);
            }
        }

        let mut is_static = false;
        let mut is_constant = false;
        loop {
            if self.eat_keyword(Keyword::Static) {
                is_static = true;
            } else if self.eat_keyword(Keyword::Constant) {
                is_constant = true;
            } else {
                break;
            }
        }

        let had_semicolon = self.eat(TokenKind::Semicolon);
        self.skip_trivia();
        let mut members = Vec::new();
        if self.at_keyword(Keyword::Begin) {
            self.advance();
            loop {
                self.skip_trivia();
                if self.at_eof() {
                    self.error("missing END in table body");
                    break;
                }
                if self.eat_keyword(Keyword::End) {
                    self.eat(TokenKind::Semicolon);
                    break;
                }
                let before = self.pos;
                if matches!(
                    self.kind(),
                    TokenKind::Keyword(Keyword::Item | Keyword::Table)
                ) {
                    match self.parse_declaration() {
                        Ok(member) => members.push(member),
                        Err(Recovery) => self.recover_from(before),
                    }
                } else {
                    self.error("expected ITEM or TABLE member declaration");
                    self.recover_from(before);
                }
            }
        } else if !had_semicolon {
            self.finish_declaration();
        }

        Ok(Declaration::Table {
            name,
            dimensions,
            members,
            is_static,
            is_constant,
            doc,
            span: start.merge(&self.prev_span()),
        })
    }

    fn parse_proc(&mut self) -> ParseResult<Declaration> {
        let start = self.expect_keyword(Keyword::Proc)?;
        let doc = self.take_doc(start.start.line);
        let name = self.expect_name()?;

        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        if self.eat(TokenKind::LParen) {
            let mut in_outputs = false;
            loop {
                if self.eat(TokenKind::RParen) || self.at_eof() {
                    break;
                }
                if self.eat(TokenKind::Colon) {
                    in_outputs = true;
                    continue;
                }
                if self.eat(TokenKind::Comma) {
                    continue;
                }
                match self.expect_name() {
                    Ok(parameter) => {
                        if in_outputs {
                            outputs.push(parameter);
                        } else {
                            inputs.push(parameter);
                        }
                    }
                    Err(Recovery) => {
                        self.recover_inside_parens();
                        break;
                    }
                }
            }
        }
        self.eat(TokenKind::Semicolon);
        self.skip_trivia();

        let mut declarations = Vec::new();
        let mut statements = Vec::new();
        if self.at_keyword(Keyword::Begin) {
            self.advance();
            loop {
                self.skip_trivia();
                if self.at_eof() {
                    self.error("missing END in procedure body");
                    break;
                }
                if self.eat_keyword(Keyword::End) {
                    self.eat(TokenKind::Semicolon);
                    break;
                }
                let before = self.pos;
                if self.at_declaration_start() {
                    match self.parse_declaration() {
                        Ok(declaration) => declarations.push(declaration),
                        Err(Recovery) => self.recover_from(before),
                    }
                } else {
                    match self.parse_statement() {
                        Ok(statement) => statements.push(statement),
                        Err(Recovery) => self.recover_from(before),
                    }
                }
            }
        }

        Ok(Declaration::Proc {
            name,
            inputs,
            outputs,
            declarations,
            statements,
            doc,
            span: start.merge(&self.prev_span()),
        })
    }

    /// Nested shared-data block: `COMPOOL name; BEGIN decls END`.
    fn parse_compool_block(&mut self) -> ParseResult<Declaration> {
        let start = self.expect_keyword(Keyword::Compool)?;
        let doc = self.take_doc(start.start.line);
        let name = self.expect_name()?;
        self.eat(TokenKind::Semicolon);
        self.skip_trivia();

        let mut members = Vec::new();
        if self.at_keyword(Keyword::Begin) {
            self.advance();
            loop {
                self.skip_trivia();
                if self.at_eof() {
                    self.error("missing END in compool block");
                    break;
                }
                if self.eat_keyword(Keyword::End) {
                    self.eat(TokenKind::Semicolon);
                    break;
                }
                let before = self.pos;
                if self.at_declaration_start() {
                    match self.parse_declaration() {
                        Ok(member) => members.push(member),
                        Err(Recovery) => self.recover_from(before),
                    }
                } else {
                    self.error("expected declaration in compool block");
                    self.recover_from(before);
                }
            }
        }

        Ok(Declaration::Compool {
            name,
            members,
            doc,
            span: start.merge(&self.prev_span()),
        })
    }

    /// `DEF [ITEM|TABLE|PROC] name;` and `REF [ITEM|TABLE|PROC] name;`.
    fn parse_external(&mut self) -> ParseResult<Declaration> {
        let kind = if self.at_keyword(Keyword::Def) {
            ExternalKind::Def
        } else {
            ExternalKind::Ref
        };
        let start = self.advance().span;
        let doc = self.take_doc(start.start.line);
        // Optional kind keyword between DEF/REF and the name.
        self.eat_keyword(Keyword::Item);
        self.eat_keyword(Keyword::Table);
        self.eat_keyword(Keyword::Proc);
        let name = self.expect_name()?;
        self.finish_declaration();
        Ok(Declaration::External {
            name,
            kind,
            doc,
            span: start.merge(&self.prev_span()),
        })
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        self.skip_trivia();
        match self.kind() {
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::For) => self.parse_for(),
            TokenKind::Keyword(Keyword::Goto) => {
                let start = self.advance().span;
                let label = self.expect_name()?;
                self.expect(TokenKind::Semicolon, "`;`")?;
                Ok(Statement::Goto {
                    label,
                    span: start.merge(&self.prev_span()),
                })
            }
            TokenKind::Keyword(Keyword::Return) => self.parse_simple(Keyword::Return),
            TokenKind::Keyword(Keyword::Exit) => self.parse_simple(Keyword::Exit),
            TokenKind::Keyword(Keyword::Stop) => self.parse_simple(Keyword::Stop),
            TokenKind::Keyword(Keyword::Begin) => self.parse_block(),
            TokenKind::Semicolon => {
                let span = self.advance().span;
                Ok(Statement::Empty { span })
            }
            TokenKind::Ident => self.parse_assign_or_call(),
            _ => Err(self.error("expected statement")),
        }
    }

    fn parse_simple(&mut self, keyword: Keyword) -> ParseResult<Statement> {
        let start = self.expect_keyword(keyword)?;
        self.expect(TokenKind::Semicolon, "`;`")?;
        let span = start.merge(&self.prev_span());
        Ok(match keyword {
            Keyword::Return => Statement::Return { span },
            Keyword::Exit => Statement::Exit { span },
            _ => Statement::Stop { span },
        })
    }

    fn parse_block(&mut self) -> ParseResult<Statement> {
        let start = self.expect_keyword(Keyword::Begin)?;
        let mut statements = Vec::new();
        loop {
            self.skip_trivia();
            if self.at_eof() {
                self.error("missing END");
                break;
            }
            if self.eat_keyword(Keyword::End) {
                self.eat(TokenKind::Semicolon);
                break;
            }
            let before = self.pos;
            match self.parse_statement() {
                Ok(statement) => statements.push(statement),
                Err(Recovery) => self.recover_from(before),
            }
        }
        Ok(Statement::Block {
            statements,
            span: start.merge(&self.prev_span()),
        })
    }

    fn parse_if(&mut self) -> ParseResult<Statement> {
        let start = self.expect_keyword(Keyword::If)?;
        let condition = self.parse_expr()?;
        self.eat_keyword(Keyword::Then);
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.eat_keyword(Keyword::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
            span: start.merge(&self.prev_span()),
        })
    }

    /// `FOR control : from [BY step] [WHILE cond]; body-statement`
    fn parse_for(&mut self) -> ParseResult<Statement> {
        let start = self.expect_keyword(Keyword::For)?;
        let control = self.expect_name()?;
        self.expect(TokenKind::Colon, "`:` after loop control")?;
        let from = self.parse_expr()?;
        let by = if self.eat_keyword(Keyword::By) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let while_condition = if self.eat_keyword(Keyword::While) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "`;`")?;
        let body = if self.starts_statement() {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Statement::For {
            control,
            from,
            by,
            while_condition,
            body,
            span: start.merge(&self.prev_span()),
        })
    }

    fn starts_statement(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::Ident
                | TokenKind::Keyword(
                    Keyword::If
                        | Keyword::For
                        | Keyword::Goto
                        | Keyword::Return
                        | Keyword::Exit
                        | Keyword::Stop
                        | Keyword::Begin
                )
        )
    }

    fn parse_assign_or_call(&mut self) -> ParseResult<Statement> {
        let var = self.parse_var_ref()?;
        if self.eat(TokenKind::Assign) {
            let value = self.parse_expr()?;
            self.expect(TokenKind::Semicolon, "`;`")?;
            let span = var.span.merge(&self.prev_span());
            Ok(Statement::Assign {
                target: var,
                value,
                span,
            })
        } else {
            self.expect(TokenKind::Semicolon, "`;`")?;
            let span = var.span.merge(&self.prev_span());
            Ok(Statement::Call {
                name: var.name,
                args: var.subscripts,
                span,
            })
        }
    }

    fn parse_var_ref(&mut self) -> ParseResult<VarRef> {
        let name = self.expect_name()?;
        let mut subscripts = Vec::new();
        let mut span = name.span.clone();
        if self.eat(TokenKind::LParen) {
            loop {
                if self.at_eof() {
                    self.error("expected `)`");
                    break;
                }
                if self.eat(TokenKind::RParen) {
                    break;
                }
                subscripts.push(self.parse_expr()?);
                self.eat(TokenKind::Comma);
            }
            span = span.merge(&self.prev_span());
        }
        Ok(VarRef {
            name,
            subscripts,
            span,
        })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat_keyword(Keyword::Or) {
            let rhs = self.parse_and()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_comparison()?;
        while self.eat_keyword(Keyword::And) {
            let rhs = self.parse_comparison()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let lhs = self.parse_additive()?;
        let op = match self.kind() {
            TokenKind::Eq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::Less => BinaryOp::Less,
            TokenKind::LessEq => BinaryOp::LessEq,
            TokenKind::Greater => BinaryOp::Greater,
            TokenKind::GreaterEq => BinaryOp::GreaterEq,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_additive()?;
        let span = lhs.span().merge(rhs.span());
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            span,
        })
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Keyword(Keyword::Mod) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let op = match self.kind() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Keyword(Keyword::Not) => Some(UnaryOp::Not),
            TokenKind::At => Some(UnaryOp::Deref),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.advance().span;
            let operand = self.parse_unary()?;
            let span = start.merge(operand.span());
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                span,
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        match self.kind() {
            TokenKind::Integer => {
                let token = self.advance();
                Ok(Expr::Integer {
                    text: token.text,
                    span: token.span,
                })
            }
            TokenKind::Real => {
                let token = self.advance();
                Ok(Expr::Real {
                    text: token.text,
                    span: token.span,
                })
            }
            TokenKind::Fixed => {
                let token = self.advance();
                Ok(Expr::Fixed {
                    text: token.text,
                    span: token.span,
                })
            }
            TokenKind::BitString => {
                let token = self.advance();
                Ok(Expr::BitString {
                    text: token.text,
                    span: token.span,
                })
            }
            // Operand position: quoted text is a string literal here.
            TokenKind::QuotedText => {
                let token = self.advance();
                Ok(Expr::StringLiteral {
                    text: token.text.trim_matches('"').to_string(),
                    span: token.span,
                })
            }
            TokenKind::Keyword(Keyword::V) => {
                let start = self.advance().span;
                self.expect(TokenKind::LParen, "`(` after V")?;
                let value = self.expect_name()?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(Expr::StatusValue {
                    span: start.merge(&self.prev_span()),
                    value,
                })
            }
            TokenKind::Ident => {
                let var = self.parse_var_ref()?;
                let span = var.span.clone();
                Ok(Expr::Variable { var, span })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(inner)
            }
            _ => Err(self.error("expected expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;

    fn parse_clean(source: &str) -> Module {
        let (module, diagnostics) = parse(source);
        assert!(
            diagnostics.is_empty(),
            "unexpected diagnostics: {diagnostics:?}"
        );
        module
    }

    #[test]
    fn parses_program_header_and_terminator() {
        let module = parse_clean("START FLIGHT'CONTROL;\nTERM");
        assert_eq!(module.kind, ModuleKind::Program);
        assert_eq!(module.name.as_ref().unwrap().text, "FLIGHT'CONTROL");
    }

    #[test]
    fn parses_compool_module_header() {
        let module = parse_clean("COMPOOL NAV'DATA;\nITEM ORIGIN F 32;\nTERM");
        assert_eq!(module.kind, ModuleKind::Compool);
        assert_eq!(module.declarations.len(), 1);
    }

    #[test]
    fn headerless_fragment_is_not_an_error() {
        let module = parse_clean("ITEM COUNT S 16;");
        assert_eq!(module.kind, ModuleKind::Fragment);
        assert_eq!(module.declarations.len(), 1);
    }

    #[test]
    fn missing_term_is_reported() {
        let (_, diagnostics) = parse("START P;\nITEM A S 16;");
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("missing TERM")));
    }

    #[test]
    fn item_declaration_carries_type_and_attributes() {
        let module = parse_clean("ITEM ALTITUDE STATIC S 16;");
        match &module.declarations[0] {
            Declaration::Item {
                name,
                type_spec,
                is_static,
                ..
            } => {
                assert_eq!(name.text, "ALTITUDE");
                assert!(is_static);
                assert_eq!(type_spec.describe(), "S 16");
            }
            other => panic!("expected item, got {other:?}"),
        }
    }

    #[test]
    fn fixed_point_type_keeps_width_and_scale() {
        let module = parse_clean("ITEM RANGE A 16,8;");
        match &module.declarations[0] {
            Declaration::Item { type_spec, .. } => {
                assert_eq!(
                    *type_spec,
                    TypeSpec::Fixed {
                        width: Some(16),
                        scale: Some(8)
                    }
                );
            }
            other => panic!("expected item, got {other:?}"),
        }
    }

    #[test]
    fn status_enumeration_collects_members() {
        let module = parse_clean("ITEM MODE STATUS (V(ON), V(OFF));");
        match &module.declarations[0] {
            Declaration::Item { type_spec, .. } => match type_spec {
                TypeSpec::Status { values } => {
                    let names: Vec<_> = values.iter().map(|v| v.text.as_str()).collect();
                    assert_eq!(names, ["ON", "OFF"]);
                }
                other => panic!("expected status, got {other:?}"),
            },
            other => panic!("expected item, got {other:?}"),
        }
    }

    #[test]
    fn table_declares_nested_members() {
        let module = parse_clean("TABLE DATA (1: 10); BEGIN ITEM VALUE F 32; END");
        match &module.declarations[0] {
            Declaration::Table {
                name,
                dimensions,
                members,
                ..
            } => {
                assert_eq!(name.text, "DATA");
                assert_eq!(dimensions[0].label, "1:10");
                assert_eq!(members.len(), 1);
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn tables_nest_arbitrarily() {
        let module = parse_clean(
            "TABLE OUTER (1:4);\nBEGIN\n  TABLE INNER (0:1);\n  BEGIN\n    ITEM CELL U 8;\n  END\nEND",
        );
        match &module.declarations[0] {
            Declaration::Table { members, .. } => match &members[0] {
                Declaration::Table { members, .. } => {
                    assert_eq!(members[0].name().text, "CELL");
                }
                other => panic!("expected inner table, got {other:?}"),
            },
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn proc_splits_input_and_output_parameters() {
        let module = parse_clean(
            "PROC UPDATE'POSITION (NEW'LAT, NEW'LON : DISTANCE);\nBEGIN\nITEM NEW'LAT F;\nITEM NEW'LON F;\nITEM DISTANCE F;\nEND",
        );
        match &module.declarations[0] {
            Declaration::Proc {
                inputs,
                outputs,
                declarations,
                ..
            } => {
                assert_eq!(inputs.len(), 2);
                assert_eq!(outputs.len(), 1);
                assert_eq!(declarations.len(), 3);
            }
            other => panic!("expected proc, got {other:?}"),
        }
    }

    #[test]
    fn comment_attaches_to_adjacent_declaration() {
        let module = parse_clean("\" altitude above sea level \"\nITEM ALTITUDE S 16;");
        assert_eq!(
            module.declarations[0].doc(),
            Some("altitude above sea level")
        );
    }

    #[test]
    fn comment_does_not_attach_across_blank_lines() {
        let module = parse_clean("\" stale \"\n\n\nITEM ALTITUDE S 16;");
        assert_eq!(module.declarations[0].doc(), None);
    }

    #[test]
    fn quoted_text_in_operand_position_is_a_string_literal() {
        let module = parse_clean("ITEM GREETING C 20 = \"HELLO\";");
        match &module.declarations[0] {
            Declaration::Item {
                initial: Some(Expr::StringLiteral { text, .. }),
                ..
            } => assert_eq!(text, "HELLO"),
            other => panic!("expected string initializer, got {other:?}"),
        }
    }

    #[test]
    fn assignment_and_call_statements() {
        let module = parse_clean("ALTITUDE := 100;\nUPDATE'POSITION (1, 2);");
        assert_eq!(module.statements.len(), 2);
        assert!(matches!(module.statements[0], Statement::Assign { .. }));
        assert!(matches!(module.statements[1], Statement::Call { .. }));
    }

    #[test]
    fn recovers_after_unexpected_token() {
        let (module, diagnostics) = parse("ITEM ALTITUDE S 16 %%%;\nITEM HEADING U 9;");
        assert!(diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error));
        // The second declaration survives recovery.
        assert!(module
            .declarations
            .iter()
            .any(|d| d.name().text == "HEADING"));
    }

    #[test]
    fn recovers_from_stray_end() {
        let (module, diagnostics) = parse("END\nITEM A S 16;");
        assert!(!diagnostics.is_empty());
        assert_eq!(module.declarations.len(), 1);
    }

    #[test]
    fn declaration_span_covers_keyword_to_terminator() {
        let source = "ITEM COUNT S 16;";
        let module = parse_clean(source);
        let span = module.declarations[0].span();
        assert_eq!(span.offsets, 0..source.len());
    }

    #[test]
    fn external_declarations_parse() {
        let module = parse_clean("DEF ITEM SHARED'FLAG;\nREF PROC NAVIGATE;");
        assert_eq!(module.declarations.len(), 2);
        assert!(matches!(
            module.declarations[0],
            Declaration::External {
                kind: ExternalKind::Def,
                ..
            }
        ));
    }

    #[test]
    fn for_loop_records_control_and_bounds() {
        let module = parse_clean("FOR I : 0 BY 1 WHILE I < 10;\nSTOP;");
        match &module.statements[0] {
            Statement::For {
                control, by, body, ..
            } => {
                assert_eq!(control.text, "I");
                assert!(by.is_some());
                assert!(body.is_some());
            }
            other => panic!("expected for, got {other:?}"),
        }
    }
}
