//! Hover information at a position.

use jovial_syntax::session::AnalysisSnapshot;
use jovial_syntax::span::{Position, Span};

use crate::utils::{keyword_description, occurrence_at, symbol_markdown, token_at};

#[derive(Debug, Clone, PartialEq)]
pub struct HoverResult {
    pub range: Span,
    pub contents: String,
}

/// Returns hover contents for the name or keyword at `position`.
///
/// A resolved occurrence shows the symbol's kind, type descriptor,
/// declaring scope and captured documentation. An unresolved occurrence
/// and a position outside any token both yield `None` — ordinary
/// not-found cases are never errors.
pub fn hover(snapshot: &AnalysisSnapshot, position: Position) -> Option<HoverResult> {
    symbol_hover(snapshot, position).or_else(|| keyword_hover(snapshot, position))
}

fn symbol_hover(snapshot: &AnalysisSnapshot, position: Position) -> Option<HoverResult> {
    let occurrence = occurrence_at(snapshot, position)?;
    let symbol = snapshot.symbols.symbol(occurrence.symbol?);
    Some(HoverResult {
        range: occurrence.span.clone(),
        contents: symbol_markdown(snapshot, symbol),
    })
}

fn keyword_hover(snapshot: &AnalysisSnapshot, position: Position) -> Option<HoverResult> {
    let token = token_at(snapshot, position)?;
    let description = keyword_description(&token.text)?;
    Some(HoverResult {
        range: token.span.clone(),
        contents: format!("**{}** (J73 Keyword)\n\n{description}", token.text.to_ascii_uppercase()),
    })
}
