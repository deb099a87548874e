//! Cross-reference index.
//!
//! A second walk over the parsed tree resolves every identifier occurrence
//! to a declared symbol (or marks it unresolved) and records its role.
//! Declaration headers contribute exactly one occurrence each, at the
//! declared name's span. The index keeps, per symbol, the ordered list of
//! its occurrences (declaration first, then uses in source order) plus a
//! span-sorted table for binary-search position lookup.

use std::collections::HashMap;

use crate::ast::{Declaration, Expr, Module, Name, Statement, TypeSpec, VarRef};
use crate::diagnostics::{Category, Diagnostic};
use crate::span::Span;
use crate::symbols::{SymbolId, SymbolTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Declaration,
    Read,
    Write,
    Call,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub span: Span,
    /// `None` marks an unresolved reference.
    pub symbol: Option<SymbolId>,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossReferences {
    /// All occurrences, in tree-walk order.
    occurrences: Vec<Occurrence>,
    /// Indices into `occurrences`, sorted by span start.
    order: Vec<usize>,
    /// Per symbol: declaration occurrences first, then uses in source
    /// order.
    by_symbol: Vec<Vec<usize>>,
}

impl CrossReferences {
    pub fn build(
        module: &Module,
        symbols: &SymbolTable,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> CrossReferences {
        let mut indexer = Indexer::new(symbols, diagnostics);
        for declaration in &module.declarations {
            indexer.walk_declaration(declaration);
        }
        for statement in &module.statements {
            indexer.walk_statement(statement);
        }
        indexer.finish()
    }

    /// All occurrences in source order.
    pub fn occurrences(&self) -> impl Iterator<Item = &Occurrence> {
        self.order.iter().map(move |&index| &self.occurrences[index])
    }

    /// The occurrence covering `offset`, found by binary search.
    pub fn occurrence_at_offset(&self, offset: usize) -> Option<&Occurrence> {
        let idx = self
            .order
            .partition_point(|&index| self.occurrences[index].span.offsets.start <= offset);
        if idx == 0 {
            return None;
        }
        let candidate = &self.occurrences[self.order[idx - 1]];
        candidate.span.contains_offset(offset).then_some(candidate)
    }

    /// All occurrences of `symbol`: declaration first, then uses in
    /// source order.
    pub fn occurrences_of(&self, symbol: SymbolId) -> impl Iterator<Item = &Occurrence> {
        self.by_symbol
            .get(symbol.index())
            .into_iter()
            .flatten()
            .map(move |&index| &self.occurrences[index])
    }
}

struct Indexer<'a> {
    symbols: &'a SymbolTable,
    diagnostics: &'a mut Vec<Diagnostic>,
    occurrences: Vec<Occurrence>,
    /// Declared name spans, for exact declaration-occurrence resolution.
    declared: HashMap<(usize, usize), SymbolId>,
}

impl<'a> Indexer<'a> {
    fn new(symbols: &'a SymbolTable, diagnostics: &'a mut Vec<Diagnostic>) -> Self {
        let declared = symbols
            .symbols()
            .map(|(id, symbol)| {
                (
                    (
                        symbol.name_span.offsets.start,
                        symbol.name_span.offsets.end,
                    ),
                    id,
                )
            })
            .collect();
        Self {
            symbols,
            diagnostics,
            occurrences: Vec::new(),
            declared,
        }
    }

    fn finish(self) -> CrossReferences {
        let mut order: Vec<usize> = (0..self.occurrences.len()).collect();
        order.sort_by_key(|&index| {
            let span = &self.occurrences[index].span;
            (span.offsets.start, span.offsets.end)
        });

        let mut by_symbol = vec![Vec::new(); self.symbols.symbol_count()];
        for &index in &order {
            if let Some(symbol) = self.occurrences[index].symbol {
                by_symbol[symbol.index()].push(index);
            }
        }
        for list in &mut by_symbol {
            list.sort_by_key(|&index| {
                let occurrence = &self.occurrences[index];
                (
                    occurrence.role != Role::Declaration,
                    occurrence.span.offsets.start,
                )
            });
        }

        CrossReferences {
            occurrences: self.occurrences,
            order,
            by_symbol,
        }
    }

    /// One occurrence per declaration header, at the declared name's span.
    /// A duplicate declaration resolves to the first (binding) symbol.
    fn declaration(&mut self, name: &Name) {
        let key = (name.span.offsets.start, name.span.offsets.end);
        let symbol = self.declared.get(&key).copied().or_else(|| {
            let scope = self.symbols.innermost_scope_at(name.span.offsets.start);
            self.symbols.lookup(scope, &name.text)
        });
        self.occurrences.push(Occurrence {
            span: name.span.clone(),
            symbol,
            name: name.text.clone(),
            role: Role::Declaration,
        });
    }

    /// Resolves a use from the innermost scope containing it outward.
    fn resolve(&mut self, name: &Name, role: Role) {
        let scope = self.symbols.innermost_scope_at(name.span.offsets.start);
        let symbol = self.symbols.lookup(scope, &name.text);
        if symbol.is_none() {
            self.diagnostics.push(Diagnostic::warning(
                Category::UnresolvedReference,
                name.span.clone(),
                format!("unresolved reference to `{}`", name.text),
            ));
        }
        self.occurrences.push(Occurrence {
            span: name.span.clone(),
            symbol,
            name: name.text.clone(),
            role,
        });
    }

    fn walk_declaration(&mut self, declaration: &Declaration) {
        match declaration {
            Declaration::Define { name, value, .. } => {
                self.declaration(name);
                if let Some(value) = value {
                    self.walk_expr(value);
                }
            }
            Declaration::Item {
                name,
                type_spec,
                initial,
                ..
            } => {
                self.declaration(name);
                match type_spec {
                    TypeSpec::Status { values } => {
                        for value in values {
                            self.declaration(value);
                        }
                    }
                    TypeSpec::Like { source } => self.resolve(source, Role::Read),
                    _ => {}
                }
                if let Some(initial) = initial {
                    self.walk_expr(initial);
                }
            }
            Declaration::Table {
                name,
                dimensions,
                members,
                ..
            } => {
                self.declaration(name);
                for dimension in dimensions {
                    self.walk_expr(&dimension.lower);
                    self.walk_expr(&dimension.upper);
                }
                for member in members {
                    self.walk_declaration(member);
                }
            }
            Declaration::Proc {
                name,
                inputs,
                outputs,
                declarations,
                statements,
                ..
            } => {
                self.declaration(name);
                // Header parameter names resolve against the body's ITEM
                // declarations for them.
                for parameter in inputs.iter().chain(outputs) {
                    self.resolve(parameter, Role::Read);
                }
                for declaration in declarations {
                    self.walk_declaration(declaration);
                }
                for statement in statements {
                    self.walk_statement(statement);
                }
            }
            Declaration::Compool { name, members, .. } => {
                self.declaration(name);
                for member in members {
                    self.walk_declaration(member);
                }
            }
            Declaration::External { name, .. } => {
                self.declaration(name);
            }
        }
    }

    fn walk_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Assign { target, value, .. } => {
                self.walk_var(target, Role::Write);
                self.walk_expr(value);
            }
            Statement::Call { name, args, .. } => {
                self.resolve(name, Role::Call);
                for arg in args {
                    self.walk_expr(arg);
                }
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.walk_expr(condition);
                self.walk_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.walk_statement(else_branch);
                }
            }
            Statement::For {
                control,
                from,
                by,
                while_condition,
                body,
                ..
            } => {
                self.resolve(control, Role::Write);
                self.walk_expr(from);
                if let Some(by) = by {
                    self.walk_expr(by);
                }
                if let Some(while_condition) = while_condition {
                    self.walk_expr(while_condition);
                }
                if let Some(body) = body {
                    self.walk_statement(body);
                }
            }
            Statement::Goto { label, .. } => {
                self.resolve(label, Role::Read);
            }
            Statement::Block { statements, .. } => {
                for statement in statements {
                    self.walk_statement(statement);
                }
            }
            Statement::Return { .. }
            | Statement::Exit { .. }
            | Statement::Stop { .. }
            | Statement::Empty { .. } => {}
        }
    }

    fn walk_var(&mut self, var: &VarRef, role: Role) {
        self.resolve(&var.name, role);
        for subscript in &var.subscripts {
            self.walk_expr(subscript);
        }
    }

    fn walk_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Variable { var, .. } => self.walk_var(var, Role::Read),
            Expr::StatusValue { value, .. } => self.resolve(value, Role::Read),
            Expr::Unary { operand, .. } => self.walk_expr(operand),
            Expr::Binary { lhs, rhs, .. } => {
                self.walk_expr(lhs);
                self.walk_expr(rhs);
            }
            Expr::Integer { .. }
            | Expr::Real { .. }
            | Expr::Fixed { .. }
            | Expr::BitString { .. }
            | Expr::StringLiteral { .. }
            | Expr::Error { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::symbols::SymbolTable;

    fn index(source: &str) -> (SymbolTable, CrossReferences, Vec<Diagnostic>) {
        let (module, mut diagnostics) = parse(source);
        let symbols = SymbolTable::build(&module, &mut diagnostics);
        let xref = CrossReferences::build(&module, &symbols, &mut diagnostics);
        (symbols, xref, diagnostics)
    }

    fn occurrence_at<'a>(
        source: &str,
        xref: &'a CrossReferences,
        needle: &str,
    ) -> &'a Occurrence {
        let offset = source.find(needle).expect("needle present");
        xref.occurrence_at_offset(offset)
            .unwrap_or_else(|| panic!("no occurrence at `{needle}`"))
    }

    #[test]
    fn assignment_target_is_a_write() {
        let source = "ITEM ALTITUDE S 16;\nALTITUDE := 100;";
        let (_, xref, diagnostics) = index(source);
        assert!(diagnostics.is_empty());
        let offset = source.rfind("ALTITUDE").unwrap();
        let occurrence = xref.occurrence_at_offset(offset).expect("occurrence");
        assert_eq!(occurrence.role, Role::Write);
        assert!(occurrence.symbol.is_some());
    }

    #[test]
    fn call_target_is_a_call() {
        let source = "PROC NAVIGATE;\nBEGIN\nEND\nNAVIGATE;";
        let (_, xref, _) = index(source);
        let offset = source.rfind("NAVIGATE").unwrap();
        let occurrence = xref.occurrence_at_offset(offset).expect("occurrence");
        assert_eq!(occurrence.role, Role::Call);
    }

    #[test]
    fn unresolved_reference_is_reported_once() {
        let source = "FOO := 1;";
        let (_, xref, diagnostics) = index(source);
        let unresolved: Vec<_> = diagnostics
            .iter()
            .filter(|d| d.category == Category::UnresolvedReference)
            .collect();
        assert_eq!(unresolved.len(), 1);
        let occurrence = occurrence_at(source, &xref, "FOO");
        assert!(occurrence.symbol.is_none());
    }

    #[test]
    fn declaration_comes_first_in_per_symbol_lists() {
        let source = "ITEM COUNT S 16;\nCOUNT := COUNT + 1;";
        let (symbols, xref, _) = index(source);
        let count = symbols.lookup(symbols.root(), "COUNT").expect("count");
        let roles: Vec<_> = xref.occurrences_of(count).map(|o| o.role).collect();
        assert_eq!(roles, [Role::Declaration, Role::Write, Role::Read]);
    }

    #[test]
    fn status_value_mentions_resolve_to_members() {
        let source = "ITEM MODE STATUS (V(ON), V(OFF));\nMODE := V(ON);";
        let (symbols, xref, diagnostics) = index(source);
        assert!(diagnostics.is_empty());
        let on = symbols.lookup(symbols.root(), "ON").expect("member");
        let spans: Vec<_> = xref.occurrences_of(on).collect();
        // Declaration inside the STATUS list plus the use in `V(ON)`.
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].role, Role::Declaration);
        assert_eq!(spans[1].role, Role::Read);
        let mode = symbols.lookup(symbols.root(), "MODE").expect("type");
        let mode_occurrences: Vec<_> = xref.occurrences_of(mode).collect();
        assert_eq!(mode_occurrences.len(), 2);
    }

    #[test]
    fn duplicate_declaration_occurrences_both_point_at_first_symbol() {
        let source = "ITEM X S 16; ITEM X U 8;";
        let (symbols, xref, _) = index(source);
        let x = symbols.lookup(symbols.root(), "X").expect("x");
        let declarations: Vec<_> = xref
            .occurrences_of(x)
            .filter(|o| o.role == Role::Declaration)
            .collect();
        assert_eq!(declarations.len(), 2);
        let first = source.find('X').unwrap();
        assert_eq!(declarations[0].span.offsets.start, first);
    }

    #[test]
    fn shadowed_name_resolves_to_inner_symbol_inside_block() {
        let source = "ITEM FLAG U 1;\nPROC CHECK;\nBEGIN\nITEM FLAG S 16;\nFLAG := 1;\nEND";
        let (symbols, xref, diagnostics) = index(source);
        assert!(diagnostics.is_empty());
        let offset = source.rfind("FLAG").unwrap();
        let occurrence = xref.occurrence_at_offset(offset).expect("occurrence");
        let symbol = symbols.symbol(occurrence.symbol.expect("resolved"));
        assert_eq!(symbol.type_desc, "S 16");
    }

    #[test]
    fn table_bounds_reference_define_constants() {
        let source = "DEFINE MAX'SIZE = 100;\nTABLE DATA (1:MAX'SIZE);\nBEGIN\nITEM V1 F 32;\nEND";
        let (symbols, xref, diagnostics) = index(source);
        assert!(diagnostics.is_empty());
        let max = symbols.lookup(symbols.root(), "MAX'SIZE").expect("define");
        let occurrences: Vec<_> = xref.occurrences_of(max).collect();
        assert_eq!(occurrences.len(), 2);
        assert_eq!(occurrences[1].role, Role::Read);
    }

    #[test]
    fn position_lookup_misses_between_tokens() {
        let source = "ITEM COUNT S 16;";
        let (_, xref, _) = index(source);
        // Offset of the space before `S`.
        let offset = source.find(" S ").unwrap();
        assert!(xref.occurrence_at_offset(offset).is_none());
    }
}
