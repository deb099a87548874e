//! Shared lookup and rendering helpers for the query modules.

use jovial_syntax::session::AnalysisSnapshot;
use jovial_syntax::span::Position;
use jovial_syntax::symbols::{ScopeId, Symbol, SymbolId, SymbolKind};
use jovial_syntax::token::{Token, TokenKind};
use jovial_syntax::xref::Occurrence;

/// The occurrence under `position`, if the position falls on a name.
pub fn occurrence_at(snapshot: &AnalysisSnapshot, position: Position) -> Option<&Occurrence> {
    snapshot.occurrence_at(position)
}

/// The token under `position`. Binary search over the token stream; the
/// trailing `Eof` token never matches.
pub fn token_at(snapshot: &AnalysisSnapshot, position: Position) -> Option<&Token> {
    let offset = snapshot.offset(position);
    let idx = snapshot
        .tokens
        .partition_point(|token| token.span.offsets.start <= offset);
    if idx == 0 {
        return None;
    }
    let token = &snapshot.tokens[idx - 1];
    (token.kind != TokenKind::Eof && token.span.contains_offset(offset)).then_some(token)
}

/// Symbols visible from `position`, innermost scope first. A name
/// shadowed by an inner declaration is reported once, for the inner
/// symbol only. The returned tier is the scope distance (0 = innermost).
pub fn visible_symbols(
    snapshot: &AnalysisSnapshot,
    position: Position,
) -> Vec<(usize, SymbolId)> {
    let offset = snapshot.offset(position);
    let innermost = snapshot.symbols.innermost_scope_at(offset);
    let mut seen: Vec<String> = Vec::new();
    let mut visible = Vec::new();
    for (distance, scope) in snapshot.symbols.scope_chain(innermost).into_iter().enumerate() {
        for &id in &snapshot.symbols.scope(scope).symbols {
            let name = &snapshot.symbols.symbol(id).name;
            if seen.iter().any(|taken| taken.eq_ignore_ascii_case(name)) {
                continue;
            }
            seen.push(name.clone());
            visible.push((distance, id));
        }
    }
    visible
}

/// Display name of a declaring scope: the owning declaration's name, or
/// the module name for the root, or `(program)` for a headerless
/// fragment.
pub fn scope_display_name(snapshot: &AnalysisSnapshot, scope: ScopeId) -> String {
    snapshot
        .symbols
        .scope(scope)
        .name
        .clone()
        .unwrap_or_else(|| "(program)".to_string())
}

/// Markdown hover body for a resolved symbol, in the shape the original
/// J73 tooling used: bold name, kind tag, then one line per attribute.
pub fn symbol_markdown(snapshot: &AnalysisSnapshot, symbol: &Symbol) -> String {
    let mut lines = Vec::new();
    if !symbol.type_desc.is_empty() {
        lines.push(format!("Type: `{}`", symbol.type_desc));
    }
    if symbol.is_static {
        lines.push("Attribute: `STATIC`".to_string());
    }
    if symbol.is_constant {
        lines.push("Attribute: `CONSTANT`".to_string());
    }
    if let Some(owner) = symbol.owner {
        lines.push(format!(
            "Value of `{}`",
            snapshot.symbols.symbol(owner).name
        ));
    }
    lines.push(format!(
        "Declared in `{}`",
        scope_display_name(snapshot, symbol.scope)
    ));
    let mut contents = format!(
        "**{}** ({})\n\n{}",
        symbol.name,
        symbol.kind.describe(),
        lines.join("\n")
    );
    if let Some(doc) = &symbol.doc {
        contents.push_str("\n\n");
        contents.push_str(doc);
    }
    contents
}

/// Keyword and type-letter descriptions, keyed by upper-cased lexeme.
pub fn keyword_description(word: &str) -> Option<&'static str> {
    let description = match word.to_ascii_uppercase().as_str() {
        "START" => "Begin main program module",
        "TERM" => "End program module",
        "BEGIN" => "Begin block",
        "END" => "End block",
        "COMPOOL" => "Communication pool module (shared data)",
        "ITEM" => "Scalar variable declaration",
        "TABLE" => "Array/structure declaration",
        "PROC" => "Procedure declaration",
        "DEFINE" => "Compile-time constant",
        "DEF" => "Export to other modules",
        "REF" => "Reference to external",
        "S" => "Signed integer type",
        "U" => "Unsigned integer type",
        "F" => "Floating-point type",
        "A" => "Fixed-point (scaled) type",
        "B" => "Bit string type",
        "C" => "Character string type",
        "P" => "Pointer type",
        "STATUS" => "Enumeration type",
        "STATIC" => "Static allocation (persistent)",
        "CONSTANT" => "Read-only value",
        "LIKE" => "Type copied from another declaration",
        "IF" => "Conditional statement",
        "THEN" => "Then branch of a conditional",
        "ELSE" => "Else branch of a conditional",
        "FOR" => "Counted loop",
        "BY" => "Loop increment",
        "WHILE" => "Loop continuation condition",
        "GOTO" => "Unconditional branch",
        "RETURN" => "Return from procedure",
        "EXIT" => "Exit from loop",
        "STOP" => "Abort program execution",
        "AND" => "Logical conjunction",
        "OR" => "Logical disjunction",
        "NOT" => "Logical negation",
        "MOD" => "Modulo operator",
        "V" => "Status value constructor",
        _ => return None,
    };
    Some(description)
}

/// Maps a symbol kind to the LSP completion-item kind used for icons.
pub fn completion_kind(kind: SymbolKind) -> lsp_types::CompletionItemKind {
    use lsp_types::CompletionItemKind as K;
    match kind {
        SymbolKind::Constant => K::CONSTANT,
        SymbolKind::Item => K::VARIABLE,
        SymbolKind::Table => K::STRUCT,
        SymbolKind::Procedure => K::FUNCTION,
        SymbolKind::StatusType => K::ENUM,
        SymbolKind::StatusValue => K::ENUM_MEMBER,
        SymbolKind::Compool => K::MODULE,
        SymbolKind::External => K::INTERFACE,
    }
}

/// Maps a symbol kind to the LSP document-symbol kind for the outline.
pub fn outline_kind(kind: SymbolKind) -> lsp_types::SymbolKind {
    use lsp_types::SymbolKind as K;
    match kind {
        SymbolKind::Constant => K::CONSTANT,
        SymbolKind::Item => K::VARIABLE,
        SymbolKind::Table => K::STRUCT,
        SymbolKind::Procedure => K::FUNCTION,
        SymbolKind::StatusType => K::ENUM,
        SymbolKind::StatusValue => K::ENUM_MEMBER,
        SymbolKind::Compool => K::NAMESPACE,
        SymbolKind::External => K::INTERFACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{position_of, sample_snapshot};

    #[test]
    fn token_lookup_hits_names_and_misses_whitespace() {
        let snapshot = sample_snapshot();
        let position = position_of("ALTITUDE STATIC");
        let token = token_at(&snapshot, position).expect("token at ALTITUDE");
        assert_eq!(token.text, "ALTITUDE");
        // One past the end of the final token's line is empty space.
        assert!(token_at(&snapshot, Position::new(9999, 0)).is_none());
    }

    #[test]
    fn visible_symbols_put_inner_scope_first() {
        let snapshot = sample_snapshot();
        let inside = position_of("LAT F 32");
        let visible = visible_symbols(&snapshot, inside);
        let lat_tier = visible
            .iter()
            .find(|(_, id)| snapshot.symbols.symbol(*id).name == "LAT")
            .map(|(tier, _)| *tier)
            .expect("LAT visible inside WAYPOINTS");
        let altitude_tier = visible
            .iter()
            .find(|(_, id)| snapshot.symbols.symbol(*id).name == "ALTITUDE")
            .map(|(tier, _)| *tier)
            .expect("ALTITUDE visible inside WAYPOINTS");
        assert!(lat_tier < altitude_tier);
    }

    #[test]
    fn keyword_descriptions_cover_type_letters() {
        assert!(keyword_description("S").is_some());
        assert!(keyword_description("status").is_some());
        assert!(keyword_description("NOPE'WORD").is_none());
    }
}
