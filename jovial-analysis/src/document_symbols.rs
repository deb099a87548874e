//! Hierarchical document outline from the scope tree.

use jovial_syntax::session::AnalysisSnapshot;
use jovial_syntax::span::Span;
use jovial_syntax::symbols::{ScopeId, SymbolId, SymbolKind as JovialSymbolKind};
use lsp_types::SymbolKind;

use crate::utils::outline_kind;

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOutlineSymbol {
    pub name: String,
    pub detail: Option<String>,
    pub kind: SymbolKind,
    /// Full extent of the declaration, for outline framing.
    pub range: Span,
    /// The declared name, for cursor placement.
    pub selection_range: Span,
    pub children: Vec<DocumentOutlineSymbol>,
}

/// Returns the document outline: one entry per declaration, nested to
/// match Table/Procedure/Compool block structure, in declaration order.
/// Status values nest under their enumeration.
pub fn document_symbols(snapshot: &AnalysisSnapshot) -> Vec<DocumentOutlineSymbol> {
    scope_symbols(snapshot, snapshot.symbols.root())
}

fn scope_symbols(snapshot: &AnalysisSnapshot, scope: ScopeId) -> Vec<DocumentOutlineSymbol> {
    snapshot
        .symbols
        .scope(scope)
        .symbols
        .iter()
        // Status values appear nested under their enumeration, not as
        // siblings.
        .filter(|&&id| snapshot.symbols.symbol(id).owner.is_none())
        .map(|&id| outline_symbol(snapshot, id))
        .collect()
}

fn outline_symbol(snapshot: &AnalysisSnapshot, id: SymbolId) -> DocumentOutlineSymbol {
    let symbol = snapshot.symbols.symbol(id);
    let mut children = Vec::new();
    if symbol.kind == JovialSymbolKind::StatusType {
        children.extend(symbol.members.iter().map(|&member| outline_symbol(snapshot, member)));
    }
    if let Some(owned) = symbol.owned_scope {
        children.extend(scope_symbols(snapshot, owned));
    }
    DocumentOutlineSymbol {
        name: symbol.name.clone(),
        detail: (!symbol.type_desc.is_empty()).then(|| symbol.type_desc.clone()),
        kind: outline_kind(symbol.kind),
        range: symbol.extent.clone(),
        selection_range: symbol.name_span.clone(),
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_snapshot;
    use jovial_syntax::analyze;

    fn find<'a>(
        symbols: &'a [DocumentOutlineSymbol],
        name: &str,
    ) -> &'a DocumentOutlineSymbol {
        symbols
            .iter()
            .find(|symbol| symbol.name == name)
            .unwrap_or_else(|| panic!("symbol {name} not found"))
    }

    #[test]
    fn table_members_nest_under_the_table() {
        let snapshot = analyze("TABLE DATA (1: 10); BEGIN ITEM VALUE F 32; END", 1);
        let outline = document_symbols(&snapshot);
        let data = find(&outline, "DATA");
        assert_eq!(data.kind, SymbolKind::STRUCT);
        assert_eq!(data.children.len(), 1);
        assert_eq!(data.children[0].name, "VALUE");
    }

    #[test]
    fn outline_follows_declaration_order() {
        let snapshot = sample_snapshot();
        let outline = document_symbols(&snapshot);
        let names: Vec<_> = outline.iter().map(|symbol| symbol.name.as_str()).collect();
        let max = names.iter().position(|&n| n == "MAX'ALTITUDE").unwrap();
        let altitude = names.iter().position(|&n| n == "ALTITUDE").unwrap();
        let waypoints = names.iter().position(|&n| n == "WAYPOINTS").unwrap();
        assert!(max < altitude && altitude < waypoints);
    }

    #[test]
    fn status_values_nest_under_their_enumeration() {
        let snapshot = sample_snapshot();
        let outline = document_symbols(&snapshot);
        let flag = find(&outline, "STATUS'FLAG");
        let members: Vec<_> = flag.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(members, ["NORMAL", "WARNING", "CRITICAL"]);
        assert!(!outline.iter().any(|symbol| symbol.name == "NORMAL"));
    }

    #[test]
    fn proc_locals_nest_under_the_proc() {
        let snapshot = sample_snapshot();
        let outline = document_symbols(&snapshot);
        let proc = find(&outline, "UPDATE'POSITION");
        assert_eq!(proc.kind, SymbolKind::FUNCTION);
        assert!(proc.children.iter().any(|c| c.name == "DISTANCE"));
    }

    #[test]
    fn selection_range_is_the_declared_name() {
        let source = "ITEM COUNT S 16;";
        let snapshot = analyze(source, 1);
        let outline = document_symbols(&snapshot);
        let count = find(&outline, "COUNT");
        assert_eq!(count.selection_range.offsets, 5..10);
        assert_eq!(count.range.offsets, 0..source.len());
    }
}
