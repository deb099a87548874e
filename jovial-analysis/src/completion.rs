//! Context-aware completion for J73 documents.
//!
//! The candidate set depends on the syntactic context at the cursor:
//!
//! - **Declaration header** (after `ITEM`, `TABLE`, `PROC`, …): type
//!   letters and the structural keywords that may follow a declared name.
//!
//! - **Statement/expression position**: every symbol visible from the
//!   cursor's scope, plus statement and declaration keywords.
//!
//! Candidates are filtered by the already-typed prefix, case-insensitive,
//! and ordered in tiers: symbols of the cursor's own scope first, then
//! outer-scope symbols, then keywords, lexicographically within each tier.

use jovial_syntax::session::AnalysisSnapshot;
use jovial_syntax::span::Position;
use jovial_syntax::token::{Keyword, TokenKind};
use lsp_types::CompletionItemKind;

use crate::utils::{completion_kind, keyword_description, visible_symbols};

/// A completion suggestion with display metadata.
///
/// Maps to LSP `CompletionItem` but remains protocol-agnostic; the server
/// layer converts to the wire format. Uses [`lsp_types::CompletionItemKind`]
/// directly for semantic classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionCandidate {
    /// The text shown in the completion menu and inserted.
    pub label: String,
    /// Description shown alongside the label, e.g. the type descriptor.
    pub detail: Option<String>,
    /// Semantic category for icon display.
    pub kind: CompletionItemKind,
}

impl CompletionCandidate {
    fn new(label: impl Into<String>, kind: CompletionItemKind) -> Self {
        Self {
            label: label.into(),
            detail: None,
            kind,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompletionContext {
    DeclarationHeader,
    Statement,
}

/// Type letters offered in declaration-header position.
const TYPE_LETTER_KEYWORDS: &[&str] = &["A", "B", "C", "F", "P", "S", "U"];

/// Structural keywords valid inside a declaration header.
const DECLARATION_KEYWORDS: &[&str] = &["CONSTANT", "LIKE", "STATIC", "STATUS"];

/// Keywords offered in statement/declaration position.
const STATEMENT_KEYWORDS: &[&str] = &[
    "BEGIN", "BY", "COMPOOL", "DEF", "DEFINE", "ELSE", "END", "EXIT", "FOR", "GOTO", "IF", "ITEM",
    "NOT", "PROC", "REF", "RETURN", "STOP", "TABLE", "TERM", "THEN", "WHILE",
];

/// Returns completion candidates for the cursor position, filtered by the
/// already-typed prefix and ordered by scope tier then label.
pub fn completion_items(
    snapshot: &AnalysisSnapshot,
    position: Position,
) -> Vec<CompletionCandidate> {
    let offset = snapshot.offset(position);
    let prefix = typed_prefix(snapshot, offset);

    let mut tiered: Vec<(usize, CompletionCandidate)> = Vec::new();
    match detect_context(snapshot, offset) {
        CompletionContext::DeclarationHeader => {
            for &word in TYPE_LETTER_KEYWORDS.iter().chain(DECLARATION_KEYWORDS) {
                tiered.push((0, keyword_candidate(word)));
            }
        }
        CompletionContext::Statement => {
            for (distance, id) in visible_symbols(snapshot, position) {
                let symbol = snapshot.symbols.symbol(id);
                let candidate = CompletionCandidate::new(
                    symbol.name.clone(),
                    completion_kind(symbol.kind),
                )
                .with_detail(symbol.type_desc.clone());
                tiered.push((distance, candidate));
            }
            for &word in STATEMENT_KEYWORDS {
                tiered.push((usize::MAX, keyword_candidate(word)));
            }
        }
    }

    let prefix_upper = prefix.to_ascii_uppercase();
    tiered.retain(|(_, candidate)| {
        candidate
            .label
            .to_ascii_uppercase()
            .starts_with(&prefix_upper)
    });
    tiered.sort_by(|(tier_a, a), (tier_b, b)| {
        tier_a
            .cmp(tier_b)
            .then_with(|| a.label.to_ascii_uppercase().cmp(&b.label.to_ascii_uppercase()))
    });
    tiered.into_iter().map(|(_, candidate)| candidate).collect()
}

fn keyword_candidate(word: &str) -> CompletionCandidate {
    let candidate = CompletionCandidate::new(word, CompletionItemKind::KEYWORD);
    match keyword_description(word) {
        Some(description) => candidate.with_detail(description),
        None => candidate,
    }
}

/// The identifier fragment immediately before the cursor, if the cursor
/// touches one.
fn typed_prefix(snapshot: &AnalysisSnapshot, offset: usize) -> String {
    let idx = snapshot
        .tokens
        .partition_point(|token| token.span.offsets.start < offset);
    if idx == 0 {
        return String::new();
    }
    let token = &snapshot.tokens[idx - 1];
    let touches = token.span.offsets.end >= offset;
    let wordy = matches!(token.kind, TokenKind::Ident | TokenKind::Keyword(_));
    if touches && wordy {
        token.text[..offset - token.span.offsets.start].to_string()
    } else {
        String::new()
    }
}

/// Classifies the cursor position by scanning back to the start of the
/// current statement: a declaration-introducing keyword already completed
/// before the cursor puts us in its header.
fn detect_context(snapshot: &AnalysisSnapshot, offset: usize) -> CompletionContext {
    let idx = snapshot
        .tokens
        .partition_point(|token| token.span.offsets.start < offset);
    let mut opener = None;
    let mut i = idx;
    while i > 0 {
        let token = &snapshot.tokens[i - 1];
        match token.kind {
            TokenKind::Semicolon | TokenKind::Keyword(Keyword::Begin | Keyword::End) => break,
            TokenKind::Error => {}
            _ => opener = Some(token),
        }
        i -= 1;
    }
    match opener {
        Some(token)
            if token.span.offsets.end < offset
                && matches!(
                    token.kind,
                    TokenKind::Keyword(
                        Keyword::Item
                            | Keyword::Table
                            | Keyword::Proc
                            | Keyword::Define
                            | Keyword::Compool
                            | Keyword::Def
                            | Keyword::Ref
                    )
                ) =>
        {
            CompletionContext::DeclarationHeader
        }
        _ => CompletionContext::Statement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{position_in, position_of, sample_snapshot};
    use jovial_syntax::analyze;

    fn labels(candidates: &[CompletionCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.label.as_str()).collect()
    }

    #[test]
    fn declaration_header_offers_type_letters() {
        let source = "ITEM COUNT ";
        let snapshot = analyze(source, 1);
        let candidates = completion_items(&snapshot, Position::new(0, source.len()));
        let labels = labels(&candidates);
        assert!(labels.contains(&"S"));
        assert!(labels.contains(&"STATUS"));
        assert!(labels.contains(&"STATIC"));
        // No symbols in a declaration header.
        assert!(!labels.contains(&"COUNT"));
        let s = candidates.iter().find(|c| c.label == "S").expect("S");
        assert_eq!(s.detail.as_deref(), Some("Signed integer type"));
    }

    #[test]
    fn statement_position_offers_visible_symbols_with_details() {
        let snapshot = sample_snapshot();
        let candidates = completion_items(&snapshot, position_of("ALTITUDE := 0"));
        let altitude = candidates
            .iter()
            .find(|c| c.label == "ALTITUDE")
            .expect("ALTITUDE offered");
        assert_eq!(altitude.detail.as_deref(), Some("S 16"));
        assert_eq!(altitude.kind, CompletionItemKind::VARIABLE);
        let proc = candidates
            .iter()
            .find(|c| c.label == "UPDATE'POSITION")
            .expect("proc offered");
        assert_eq!(
            proc.detail.as_deref(),
            Some("PROC (NEW'LAT, NEW'LON : DISTANCE)")
        );
    }

    #[test]
    fn prefix_filter_is_case_insensitive() {
        let source = "ITEM ALTITUDE S 16;\nal";
        let snapshot = analyze(source, 1);
        let candidates = completion_items(&snapshot, Position::new(1, 2));
        let labels = labels(&candidates);
        assert_eq!(labels, ["ALTITUDE"]);
    }

    #[test]
    fn inner_scope_symbols_come_before_outer_then_keywords() {
        let snapshot = sample_snapshot();
        let inside = position_of("ALTITUDE := ALTITUDE + 1");
        let candidates = completion_items(&snapshot, inside);
        let labels = labels(&candidates);
        let distance = labels.iter().position(|&l| l == "DISTANCE").unwrap();
        let altitude = labels.iter().position(|&l| l == "ALTITUDE").unwrap();
        let begin = labels.iter().position(|&l| l == "BEGIN").unwrap();
        assert!(distance < altitude, "proc-local before module symbol");
        assert!(altitude < begin, "symbols before keywords");
    }

    #[test]
    fn keywords_are_offered_in_statement_position() {
        let snapshot = analyze("", 1);
        let candidates = completion_items(&snapshot, Position::new(0, 0));
        let labels = labels(&candidates);
        assert!(labels.contains(&"ITEM"));
        assert!(labels.contains(&"IF"));
        assert!(labels.contains(&"BEGIN"));
    }

    #[test]
    fn shadowed_outer_symbol_is_offered_once() {
        let source =
            "ITEM FLAG U 1;\nPROC CHECK;\nBEGIN\nITEM FLAG S 16;\nFLAG := 1;\nEND";
        let snapshot = analyze(source, 1);
        let candidates = completion_items(&snapshot, position_in(source, "FLAG := 1"));
        let flags: Vec<_> = candidates.iter().filter(|c| c.label == "FLAG").collect();
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].detail.as_deref(), Some("S 16"));
    }

    #[test]
    fn mid_word_prefix_filters_partially_typed_name() {
        let source = "ITEM ALTITUDE S 16;\nITEM AIRSPEED F 32;\nALT";
        let snapshot = analyze(source, 1);
        let candidates = completion_items(&snapshot, Position::new(2, 3));
        let labels = labels(&candidates);
        assert_eq!(labels, ["ALTITUDE"]);
    }
}
