//! Find-references for the symbol under a position.

use jovial_syntax::session::AnalysisSnapshot;
use jovial_syntax::span::{Position, Span};
use jovial_syntax::xref::Role;

use crate::utils::occurrence_at;

/// Returns the spans of every occurrence of the symbol under `position`,
/// ordered by source position. `include_declaration` controls whether
/// declaration occurrences are part of the answer. An unresolved name or
/// a position that misses every occurrence yields an empty vector.
pub fn find_references(
    snapshot: &AnalysisSnapshot,
    position: Position,
    include_declaration: bool,
) -> Vec<Span> {
    let Some(occurrence) = occurrence_at(snapshot, position) else {
        return Vec::new();
    };
    let Some(symbol) = occurrence.symbol else {
        return Vec::new();
    };
    let mut ranges: Vec<Span> = snapshot
        .xref
        .occurrences_of(symbol)
        .filter(|occurrence| include_declaration || occurrence.role != Role::Declaration)
        .map(|occurrence| occurrence.span.clone())
        .collect();
    ranges.sort_by_key(|span| (span.offsets.start, span.offsets.end));
    ranges.dedup();
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{position_in, position_of, sample_snapshot};
    use jovial_syntax::analyze;

    #[test]
    fn references_include_declaration_and_all_uses() {
        let snapshot = sample_snapshot();
        let ranges = find_references(&snapshot, position_of("ALTITUDE := 0"), true);
        // Declaration, two uses in the proc body, one module-level write.
        assert_eq!(ranges.len(), 4);
        // Source order.
        assert!(ranges.windows(2).all(|pair| pair[0].offsets.start < pair[1].offsets.start));
    }

    #[test]
    fn declaration_can_be_excluded() {
        let snapshot = sample_snapshot();
        let with_decl = find_references(&snapshot, position_of("ALTITUDE := 0"), true);
        let without = find_references(&snapshot, position_of("ALTITUDE := 0"), false);
        assert_eq!(with_decl.len(), without.len() + 1);
    }

    #[test]
    fn enumeration_and_its_members_have_separate_reference_lists() {
        let source = "ITEM MODE STATUS (V(ON), V(OFF));\nMODE := V(ON);";
        let snapshot = analyze(source, 1);
        let mode = find_references(&snapshot, position_in(source, "MODE STATUS"), true);
        // The enumeration declaration and its write.
        assert_eq!(mode.len(), 2);
        let on = find_references(&snapshot, position_in(source, "ON)"), true);
        // The member declaration and its use in `V(ON)`.
        assert_eq!(on.len(), 2);
    }

    #[test]
    fn querying_from_the_declaration_finds_uses() {
        let snapshot = sample_snapshot();
        let from_decl = find_references(&snapshot, position_of("STATUS'FLAG STATUS"), true);
        assert_eq!(from_decl.len(), 2);
    }

    #[test]
    fn unresolved_position_yields_empty_list() {
        let source = "FOO := 1;";
        let snapshot = analyze(source, 1);
        assert!(find_references(&snapshot, position_in(source, "FOO"), true).is_empty());
        assert!(find_references(&snapshot, Position::new(99, 0), true).is_empty());
    }
}
