//! End-to-end editor scenarios over the full analysis pipeline.

use jovial_syntax::analyze;
use jovial_syntax::diagnostics::Category;
use jovial_syntax::span::Position;

use jovial_analysis::document_symbols::document_symbols;
use jovial_analysis::go_to_definition::goto_definition;
use jovial_analysis::hover::hover;
use jovial_analysis::references::find_references;

fn position_of(source: &str, needle: &str) -> Position {
    let offset = source
        .find(needle)
        .unwrap_or_else(|| panic!("needle not found: {needle}"));
    let mut line = 0;
    let mut column = 0;
    for ch in source[..offset].chars() {
        if ch == '\n' {
            line += 1;
            column = 0;
        } else {
            column += ch.len_utf8();
        }
    }
    Position::new(line, column)
}

#[test]
fn hover_on_item_reports_kind_and_type() {
    let source = "ITEM COUNT S 16;";
    let snapshot = analyze(source, 1);
    let hover = hover(&snapshot, position_of(source, "COUNT")).expect("hover");
    assert!(hover.contents.contains("(ITEM)"));
    assert!(hover.contents.contains("S 16"));
}

#[test]
fn table_outline_nests_its_members() {
    let source = "TABLE DATA (1: 10); BEGIN ITEM VALUE F 32; END";
    let snapshot = analyze(source, 1);
    let outline = document_symbols(&snapshot);
    let data = outline
        .iter()
        .find(|symbol| symbol.name == "DATA")
        .expect("DATA in outline");
    assert!(data.children.iter().any(|child| child.name == "VALUE"));
}

#[test]
fn undeclared_assignment_is_unresolved_with_no_definition() {
    let source = "FOO := 1;";
    let snapshot = analyze(source, 1);
    let unresolved: Vec<_> = snapshot
        .diagnostics
        .iter()
        .filter(|d| d.category == Category::UnresolvedReference)
        .collect();
    assert_eq!(unresolved.len(), 1);
    assert!(goto_definition(&snapshot, position_of(source, "FOO")).is_empty());
}

#[test]
fn duplicate_declaration_binds_to_the_first() {
    let source = "ITEM X S 16; ITEM X U 8;";
    let snapshot = analyze(source, 1);
    let duplicates: Vec<_> = snapshot
        .diagnostics
        .iter()
        .filter(|d| d.category == Category::DuplicateDeclaration)
        .collect();
    assert_eq!(duplicates.len(), 1);
    // The diagnostic sits on the second occurrence.
    assert_eq!(duplicates[0].span.offsets.start, source.find("X U 8").unwrap());

    let first = source.find('X').unwrap();
    for needle in ["X S 16", "X U 8"] {
        let locations = goto_definition(&snapshot, position_of(source, needle));
        assert_eq!(locations.len(), 1, "definition from `{needle}`");
        assert_eq!(locations[0].offsets.start, first);
    }
}

#[test]
fn status_enumeration_and_members_reference_separately() {
    let source = "ITEM MODE STATUS (V(ON), V(OFF));\nMODE := V(ON);";
    let snapshot = analyze(source, 1);

    let mode_refs = find_references(&snapshot, position_of(source, "MODE STATUS"), true);
    assert_eq!(mode_refs.len(), 2, "enumeration declaration plus write");

    let use_site = source.rfind("ON").unwrap();
    let on_refs = find_references(
        &snapshot,
        snapshot.line_index.position(use_site),
        true,
    );
    assert_eq!(on_refs.len(), 2, "member declaration plus use");
    assert_eq!(on_refs[0].offsets.start, source.find("ON").unwrap());
    assert_eq!(on_refs[1].offsets.start, use_site);
}

#[test]
fn identical_text_analyzes_identically() {
    let source = "START P;\nITEM A S 16;\n\" note \"\nITEM B U 8;\nA := B;\nTERM\n";
    assert_eq!(analyze(source, 7), analyze(source, 7));
}

#[test]
fn quoted_text_is_comment_or_string_by_position() {
    // Statement position: comment, attached to the next declaration.
    let source = "\" cruise speed \"\nITEM SPEED F 32;\nITEM LABEL C 10 = \" cruise speed \";";
    let snapshot = analyze(source, 1);
    assert!(snapshot.diagnostics.is_empty());
    let speed = hover(&snapshot, position_of(source, "SPEED F")).expect("hover");
    assert!(speed.contents.contains("cruise speed"));
    // Operand position: the same quoted text is a string literal, not a
    // comment for a following declaration.
    let label = hover(&snapshot, position_of(source, "LABEL")).expect("hover");
    assert!(label.contents.contains("C 10"));
}

#[test]
fn apostrophe_identifier_resolves_as_one_name() {
    let source = "DEFINE MAX'SIZE = 100;\nITEM LIMIT S 16 = MAX'SIZE;";
    let snapshot = analyze(source, 1);
    assert!(snapshot.diagnostics.is_empty());
    let refs = find_references(&snapshot, position_of(source, "MAX'SIZE;"), true);
    assert_eq!(refs.len(), 2);
}

#[test]
fn mid_edit_source_still_answers_queries() {
    // Unterminated table body, as an editor would send mid-edit.
    let source = "ITEM READY U 1;\nTABLE POINTS (1:4);\nBEGIN\nITEM PX F 32;\n";
    let snapshot = analyze(source, 1);
    assert!(!snapshot.diagnostics.is_empty());
    let outline = document_symbols(&snapshot);
    assert!(outline.iter().any(|symbol| symbol.name == "READY"));
    let points = outline
        .iter()
        .find(|symbol| symbol.name == "POINTS")
        .expect("partial table still in outline");
    assert!(points.children.iter().any(|child| child.name == "PX"));
}
