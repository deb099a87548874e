//! Scope tree and symbol table.
//!
//! Scopes live in an arena indexed by [`ScopeId`]; a scope's parent link is
//! a plain index, so ownership flows strictly root → children and there are
//! no reference cycles. One scope is created per Program/Compool/Procedure/
//! Table node, and every declaration inserts one symbol into its innermost
//! enclosing scope, in declaration order.
//!
//! Name lookup walks from the innermost scope outward; the first match
//! wins, so an inner declaration shadows an outer one of the same name.
//! JOVIAL names compare case-insensitively.

use crate::ast::{Declaration, Module, ModuleKind, Name, TypeSpec};
use crate::diagnostics::{Category, Diagnostic};
use crate::error::SyntaxError;
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Program,
    Compool,
    Procedure,
    Table,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub kind: ScopeKind,
    /// Name of the owning declaration; `None` for the root of a headerless
    /// fragment.
    pub name: Option<String>,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    /// Symbols declared directly in this scope, in declaration order.
    pub symbols: Vec<SymbolId>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// `DEFINE` constant binding.
    Constant,
    Item,
    Table,
    Procedure,
    /// A STATUS enumeration type.
    StatusType,
    /// One `V(name)` member of a STATUS enumeration.
    StatusValue,
    Compool,
    /// `DEF`/`REF` externally shared declaration.
    External,
}

impl SymbolKind {
    pub fn describe(&self) -> &'static str {
        match self {
            SymbolKind::Constant => "DEFINE",
            SymbolKind::Item => "ITEM",
            SymbolKind::Table => "TABLE",
            SymbolKind::Procedure => "PROC",
            SymbolKind::StatusType => "STATUS",
            SymbolKind::StatusValue => "STATUS VALUE",
            SymbolKind::Compool => "COMPOOL",
            SymbolKind::External => "EXTERNAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Declared-type descriptor as written, e.g. `S 16` or
    /// `STATUS (V(ON), V(OFF))`.
    pub type_desc: String,
    pub scope: ScopeId,
    /// Span of the declared name; declaration occurrences use this.
    pub name_span: Span,
    /// Full extent of the declaration node, keyword through terminator.
    pub extent: Span,
    /// Documentation captured from an adjacent quoted comment.
    pub doc: Option<String>,
    /// For a STATUS enumeration, its value members.
    pub members: Vec<SymbolId>,
    /// The enumeration a STATUS value belongs to.
    pub owner: Option<SymbolId>,
    /// Child scope for Table/Procedure/Compool symbols.
    pub owned_scope: Option<ScopeId>,
    pub is_static: bool,
    pub is_constant: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    symbols: Vec<Symbol>,
    root: ScopeId,
}

impl SymbolTable {
    /// Walks the parsed tree once, creating scopes and symbols. Duplicate
    /// declarations in one scope produce a warning on the second
    /// occurrence; the first stays binding.
    pub fn build(module: &Module, diagnostics: &mut Vec<Diagnostic>) -> SymbolTable {
        let root_kind = match module.kind {
            ModuleKind::Compool => ScopeKind::Compool,
            _ => ScopeKind::Program,
        };
        let mut table = SymbolTable {
            scopes: vec![Scope {
                kind: root_kind,
                name: module.name.as_ref().map(|name| name.text.clone()),
                parent: None,
                children: Vec::new(),
                symbols: Vec::new(),
                span: module.span.clone(),
            }],
            symbols: Vec::new(),
            root: ScopeId(0),
        };
        let root = table.root;
        for declaration in &module.declarations {
            table.bind_declaration(root, declaration, diagnostics);
        }
        table
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(index, symbol)| (SymbolId(index as u32), symbol))
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Resolves `name` from `from` outward to the root; first match wins.
    pub fn lookup(&self, from: ScopeId, name: &str) -> Option<SymbolId> {
        let mut scope = Some(from);
        while let Some(id) = scope {
            if let Some(symbol) = self.lookup_local(id, name) {
                return Some(symbol);
            }
            scope = self.scope(id).parent;
        }
        None
    }

    /// Resolves `name` in `scope` only, ignoring ancestors.
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<SymbolId> {
        self.scope(scope)
            .symbols
            .iter()
            .copied()
            .find(|&id| self.symbol(id).name.eq_ignore_ascii_case(name))
    }

    /// The deepest scope whose span contains `offset`; falls back to the
    /// root when no nested scope covers the position.
    pub fn innermost_scope_at(&self, offset: usize) -> ScopeId {
        let mut current = self.root;
        loop {
            let next = self
                .scope(current)
                .children
                .iter()
                .copied()
                .find(|&child| self.scope(child).span.contains_offset(offset));
            match next {
                Some(child) => current = child,
                None => return current,
            }
        }
    }

    /// Ancestor chain from `from` (inclusive) to the root.
    pub fn scope_chain(&self, from: ScopeId) -> Vec<ScopeId> {
        let mut chain = Vec::new();
        let mut scope = Some(from);
        while let Some(id) = scope {
            chain.push(id);
            scope = self.scope(id).parent;
        }
        chain
    }

    /// Structural invariant check run at the end of the bind stage. A
    /// failure here aborts the analysis pass instead of publishing a
    /// corrupt snapshot.
    pub fn validate(&self) -> Result<(), SyntaxError> {
        for (index, scope) in self.scopes.iter().enumerate() {
            if let Some(parent) = scope.parent {
                if parent.index() >= self.scopes.len() || parent.index() == index {
                    return Err(SyntaxError::ScopeTreeCorrupt { scope: index });
                }
            }
            for &child in &scope.children {
                if child.index() >= self.scopes.len() {
                    return Err(SyntaxError::ScopeTreeCorrupt { scope: index });
                }
            }
            for &symbol in &scope.symbols {
                if symbol.index() >= self.symbols.len() {
                    return Err(SyntaxError::SymbolOutOfBounds {
                        symbol: symbol.index(),
                    });
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Binding
    // ------------------------------------------------------------------

    fn bind_declaration(
        &mut self,
        scope: ScopeId,
        declaration: &Declaration,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        match declaration {
            Declaration::Define {
                name, value, doc, span,
            } => {
                let type_desc = match value {
                    Some(value) => format!("DEFINE = {}", value.display_label()),
                    None => "DEFINE".to_string(),
                };
                self.declare(
                    scope,
                    name,
                    SymbolKind::Constant,
                    type_desc,
                    span.clone(),
                    doc.clone(),
                    diagnostics,
                );
            }
            Declaration::Item {
                name,
                type_spec,
                is_static,
                is_constant,
                doc,
                span,
                ..
            } => {
                if let TypeSpec::Status { values } = type_spec {
                    self.bind_status(
                        scope,
                        name,
                        values,
                        type_spec,
                        span,
                        doc.clone(),
                        diagnostics,
                    );
                } else {
                    let id = self.declare(
                        scope,
                        name,
                        SymbolKind::Item,
                        type_spec.describe(),
                        span.clone(),
                        doc.clone(),
                        diagnostics,
                    );
                    if let Some(id) = id {
                        self.symbols[id.index()].is_static = *is_static;
                        self.symbols[id.index()].is_constant = *is_constant;
                    }
                }
            }
            Declaration::Table {
                name,
                dimensions,
                members,
                is_static,
                is_constant,
                doc,
                span,
            } => {
                let dims = dimensions
                    .iter()
                    .map(|dimension| dimension.label.clone())
                    .collect::<Vec<_>>()
                    .join(", ");
                let type_desc = if dims.is_empty() {
                    "TABLE".to_string()
                } else {
                    format!("TABLE ({dims})")
                };
                let id = self.declare(
                    scope,
                    name,
                    SymbolKind::Table,
                    type_desc,
                    span.clone(),
                    doc.clone(),
                    diagnostics,
                );
                if let Some(id) = id {
                    self.symbols[id.index()].is_static = *is_static;
                    self.symbols[id.index()].is_constant = *is_constant;
                }
                let block = self.push_scope(scope, ScopeKind::Table, &name.text, span.clone());
                if let Some(id) = id {
                    self.symbols[id.index()].owned_scope = Some(block);
                }
                for member in members {
                    self.bind_declaration(block, member, diagnostics);
                }
            }
            Declaration::Proc {
                name,
                inputs,
                outputs,
                declarations,
                doc,
                span,
                ..
            } => {
                let type_desc = proc_signature(inputs, outputs);
                let id = self.declare(
                    scope,
                    name,
                    SymbolKind::Procedure,
                    type_desc,
                    span.clone(),
                    doc.clone(),
                    diagnostics,
                );
                let body = self.push_scope(scope, ScopeKind::Procedure, &name.text, span.clone());
                if let Some(id) = id {
                    self.symbols[id.index()].owned_scope = Some(body);
                }
                for declaration in declarations {
                    self.bind_declaration(body, declaration, diagnostics);
                }
            }
            Declaration::Compool {
                name,
                members,
                doc,
                span,
            } => {
                let id = self.declare(
                    scope,
                    name,
                    SymbolKind::Compool,
                    "COMPOOL".to_string(),
                    span.clone(),
                    doc.clone(),
                    diagnostics,
                );
                let block = self.push_scope(scope, ScopeKind::Compool, &name.text, span.clone());
                if let Some(id) = id {
                    self.symbols[id.index()].owned_scope = Some(block);
                }
                for member in members {
                    self.bind_declaration(block, member, diagnostics);
                }
            }
            Declaration::External {
                name, kind, doc, span,
            } => {
                let type_desc = match kind {
                    crate::ast::ExternalKind::Def => "DEF".to_string(),
                    crate::ast::ExternalKind::Ref => "REF".to_string(),
                };
                self.declare(
                    scope,
                    name,
                    SymbolKind::External,
                    type_desc,
                    span.clone(),
                    doc.clone(),
                    diagnostics,
                );
            }
        }
    }

    /// A STATUS enumeration inserts its own symbol plus one symbol per
    /// value, all siblings in the same scope, so values resolve directly
    /// by name.
    fn bind_status(
        &mut self,
        scope: ScopeId,
        name: &Name,
        values: &[Name],
        type_spec: &TypeSpec,
        span: &Span,
        doc: Option<String>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let type_id = self.declare(
            scope,
            name,
            SymbolKind::StatusType,
            type_spec.describe(),
            span.clone(),
            doc,
            diagnostics,
        );
        let mut member_ids = Vec::new();
        for value in values {
            let member = self.declare_at(
                scope,
                value,
                SymbolKind::StatusValue,
                format!("V({})", value.text),
                span.clone(),
                None,
                diagnostics,
            );
            if let Some(member) = member {
                self.symbols[member.index()].owner = type_id;
                member_ids.push(member);
            }
        }
        if let Some(type_id) = type_id {
            self.symbols[type_id.index()].members = member_ids;
        }
    }

    fn declare(
        &mut self,
        scope: ScopeId,
        name: &Name,
        kind: SymbolKind,
        type_desc: String,
        extent: Span,
        doc: Option<String>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<SymbolId> {
        self.declare_at(scope, name, kind, type_desc, extent, doc, diagnostics)
    }

    fn declare_at(
        &mut self,
        scope: ScopeId,
        name: &Name,
        kind: SymbolKind,
        type_desc: String,
        extent: Span,
        doc: Option<String>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<SymbolId> {
        if self.lookup_local(scope, &name.text).is_some() {
            diagnostics.push(Diagnostic::warning(
                Category::DuplicateDeclaration,
                name.span.clone(),
                format!("duplicate declaration of `{}`", name.text),
            ));
            return None;
        }
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol {
            name: name.text.clone(),
            kind,
            type_desc,
            scope,
            name_span: name.span.clone(),
            extent,
            doc,
            members: Vec::new(),
            owner: None,
            owned_scope: None,
            is_static: false,
            is_constant: false,
        });
        self.scopes[scope.index()].symbols.push(id);
        Some(id)
    }

    fn push_scope(&mut self, parent: ScopeId, kind: ScopeKind, name: &str, span: Span) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            kind,
            name: Some(name.to_string()),
            parent: Some(parent),
            children: Vec::new(),
            symbols: Vec::new(),
            span,
        });
        self.scopes[parent.index()].children.push(id);
        id
    }
}

fn proc_signature(inputs: &[Name], outputs: &[Name]) -> String {
    let render = |names: &[Name]| {
        names
            .iter()
            .map(|name| name.text.clone())
            .collect::<Vec<_>>()
            .join(", ")
    };
    if outputs.is_empty() {
        format!("PROC ({})", render(inputs))
    } else {
        format!("PROC ({} : {})", render(inputs), render(outputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn build(source: &str) -> (SymbolTable, Vec<Diagnostic>) {
        let (module, mut diagnostics) = parse(source);
        let table = SymbolTable::build(&module, &mut diagnostics);
        (table, diagnostics)
    }

    fn find<'a>(table: &'a SymbolTable, name: &str) -> &'a Symbol {
        table
            .symbols()
            .map(|(_, symbol)| symbol)
            .find(|symbol| symbol.name == name)
            .unwrap_or_else(|| panic!("symbol {name} not found"))
    }

    #[test]
    fn table_members_live_in_a_nested_scope() {
        let (table, diagnostics) = build("TABLE DATA (1:10);\nBEGIN\nITEM VALUE F 32;\nEND");
        assert!(diagnostics.is_empty());
        let data = find(&table, "DATA");
        let block = data.owned_scope.expect("table scope");
        assert_eq!(table.scope(block).kind, ScopeKind::Table);
        assert!(table.lookup_local(block, "VALUE").is_some());
        // Not visible from the root.
        assert!(table.lookup_local(table.root(), "VALUE").is_none());
        // But visible when resolving from inside the block.
        assert!(table.lookup(block, "VALUE").is_some());
    }

    #[test]
    fn inner_declaration_shadows_outer() {
        let (table, _) = build(
            "ITEM FLAG U 1;\nPROC CHECK;\nBEGIN\nITEM FLAG S 16;\nEND",
        );
        let check = find(&table, "CHECK");
        let body = check.owned_scope.expect("proc scope");
        let inner = table.lookup(body, "FLAG").expect("inner flag");
        assert_eq!(table.symbol(inner).type_desc, "S 16");
        let outer = table.lookup(table.root(), "FLAG").expect("outer flag");
        assert_eq!(table.symbol(outer).type_desc, "U 1");
        assert_ne!(inner, outer);
    }

    #[test]
    fn duplicate_declaration_keeps_first_binding() {
        let (table, diagnostics) = build("ITEM X S 16; ITEM X U 8;");
        let duplicates: Vec<_> = diagnostics
            .iter()
            .filter(|d| d.category == Category::DuplicateDeclaration)
            .collect();
        assert_eq!(duplicates.len(), 1);
        let x = table.lookup(table.root(), "X").expect("x");
        assert_eq!(table.symbol(x).type_desc, "S 16");
        assert_eq!(table.symbol_count(), 1);
    }

    #[test]
    fn status_values_are_siblings_of_the_type() {
        let (table, diagnostics) = build("ITEM MODE STATUS (V(ON), V(OFF));");
        assert!(diagnostics.is_empty());
        let mode = find(&table, "MODE");
        assert_eq!(mode.kind, SymbolKind::StatusType);
        assert_eq!(mode.members.len(), 2);
        let on = table.lookup(table.root(), "ON").expect("member resolves");
        assert_eq!(table.symbol(on).kind, SymbolKind::StatusValue);
        let owner = table.symbol(on).owner.expect("owner");
        assert_eq!(table.symbol(owner).name, "MODE");
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let (table, _) = build("ITEM ALTITUDE S 16;");
        assert!(table.lookup(table.root(), "altitude").is_some());
    }

    #[test]
    fn innermost_scope_tracks_nesting() {
        let source = "TABLE DATA (1:10);\nBEGIN\nITEM VALUE F 32;\nEND\nITEM TOP S 16;";
        let (table, _) = build(source);
        let inside = source.find("VALUE").unwrap();
        let scope = table.innermost_scope_at(inside);
        assert_eq!(table.scope(scope).kind, ScopeKind::Table);
        let outside = source.find("TOP").unwrap();
        assert_eq!(table.innermost_scope_at(outside), table.root());
    }

    #[test]
    fn validate_accepts_well_formed_tables() {
        let (table, _) = build("START P;\nITEM A S 16;\nPROC Q;\nBEGIN\nEND\nTERM");
        assert!(table.validate().is_ok());
    }
}
