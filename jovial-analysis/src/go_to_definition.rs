//! Go-to-definition for an occurrence.

use jovial_syntax::session::AnalysisSnapshot;
use jovial_syntax::span::{Position, Span};

use crate::utils::occurrence_at;

/// Returns the declaration span of the symbol under `position`, or an
/// empty vector when the position misses every occurrence or the name is
/// unresolved. Never a failure.
pub fn goto_definition(snapshot: &AnalysisSnapshot, position: Position) -> Vec<Span> {
    let Some(occurrence) = occurrence_at(snapshot, position) else {
        return Vec::new();
    };
    let Some(symbol) = occurrence.symbol else {
        return Vec::new();
    };
    vec![snapshot.symbols.symbol(symbol).name_span.clone()]
}
