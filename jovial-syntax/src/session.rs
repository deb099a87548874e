//! Analysis pipeline and per-document session state.
//!
//! One analysis pass runs lex → parse → bind → index over the full text and
//! bundles the results into an immutable [`AnalysisSnapshot`]. A
//! [`DocumentSession`] owns the latest text and a monotonically increasing
//! generation counter; every edit bumps the counter, and an in-flight pass
//! checks it at each stage boundary, abandoning itself when a newer edit
//! has superseded it. Only the highest-generation completed pass is ever
//! published, and publishing is a single `Arc` swap so concurrent readers
//! need no locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::ast::Module;
use crate::diagnostics::Diagnostic;
use crate::error::SyntaxError;
use crate::lexer::tokenize;
use crate::parser::parse_tokens;
use crate::span::{LineIndex, Position};
use crate::symbols::SymbolTable;
use crate::token::Token;
use crate::xref::{CrossReferences, Occurrence};

/// The complete, immutable result of one analysis pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSnapshot {
    pub text: Arc<String>,
    pub tokens: Vec<Token>,
    pub module: Module,
    pub symbols: SymbolTable,
    pub xref: CrossReferences,
    pub diagnostics: Vec<Diagnostic>,
    pub line_index: LineIndex,
    pub generation: u64,
}

impl AnalysisSnapshot {
    /// Byte offset of an editor position.
    pub fn offset(&self, position: Position) -> usize {
        self.line_index.offset(position)
    }

    /// The occurrence under an editor position, if any.
    pub fn occurrence_at(&self, position: Position) -> Option<&Occurrence> {
        self.xref.occurrence_at_offset(self.offset(position))
    }
}

/// Analyzes `text` in one uncancellable pass.
pub fn analyze(text: &str, generation: u64) -> AnalysisSnapshot {
    run_pipeline(Arc::new(text.to_string()), generation, &|| false)
        .expect("analysis without cancellation always completes")
}

fn run_pipeline(
    text: Arc<String>,
    generation: u64,
    superseded: &dyn Fn() -> bool,
) -> Option<AnalysisSnapshot> {
    let (tokens, mut diagnostics) = tokenize(&text);
    if superseded() {
        return None;
    }

    let (module, parse_diagnostics) = parse_tokens(&tokens);
    diagnostics.extend(parse_diagnostics);
    if superseded() {
        return None;
    }

    let symbols = SymbolTable::build(&module, &mut diagnostics);
    if superseded() {
        return None;
    }

    let xref = CrossReferences::build(&module, &symbols, &mut diagnostics);

    let line_index = LineIndex::new(&text);
    Some(AnalysisSnapshot {
        text,
        tokens,
        module,
        symbols,
        xref,
        diagnostics,
        line_index,
        generation,
    })
}

/// Outcome of a cancellable analysis pass.
#[derive(Debug)]
pub enum PassOutcome {
    Completed(AnalysisSnapshot),
    /// A newer edit arrived while the pass ran; nothing is published.
    Superseded,
}

/// One generation-tagged unit of analysis work, detached from the session
/// so it can run on a worker thread.
pub struct AnalysisPass {
    text: Arc<String>,
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl AnalysisPass {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Runs lex → parse → bind → index with a cooperative cancellation
    /// check between stages. Internal invariant violations abort the pass
    /// so the previous snapshot stays current.
    pub fn run(self) -> Result<PassOutcome, SyntaxError> {
        let generation = self.generation;
        let latest = Arc::clone(&self.latest);
        let superseded = move || latest.load(Ordering::SeqCst) != generation;
        match run_pipeline(self.text, generation, &superseded) {
            Some(snapshot) => {
                snapshot.symbols.validate()?;
                Ok(PassOutcome::Completed(snapshot))
            }
            None => Ok(PassOutcome::Superseded),
        }
    }
}

/// Per-document analysis state: the latest text, the generation counter
/// and the currently published snapshot.
///
/// Lifecycle per document: created on open, fed every change, discarded on
/// close. Edits are serialized by the owner; passes may run concurrently
/// with edits and cancel themselves through the shared counter.
pub struct DocumentSession {
    text: Arc<String>,
    latest: Arc<AtomicU64>,
    published: Option<Arc<AnalysisSnapshot>>,
}

impl DocumentSession {
    pub fn new(text: String) -> Self {
        Self {
            text: Arc::new(text),
            latest: Arc::new(AtomicU64::new(1)),
            published: None,
        }
    }

    pub fn text(&self) -> &Arc<String> {
        &self.text
    }

    /// Replaces the document text, superseding any in-flight pass, and
    /// returns the pass for the new generation.
    pub fn begin_edit(&mut self, text: String) -> AnalysisPass {
        self.text = Arc::new(text);
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        AnalysisPass {
            text: Arc::clone(&self.text),
            generation,
            latest: Arc::clone(&self.latest),
        }
    }

    /// The pass for the current text without an edit; used on open.
    pub fn initial_pass(&self) -> AnalysisPass {
        AnalysisPass {
            text: Arc::clone(&self.text),
            generation: self.latest.load(Ordering::SeqCst),
            latest: Arc::clone(&self.latest),
        }
    }

    /// Publishes a completed snapshot unless a newer one is already
    /// current. Returns whether the snapshot became current.
    pub fn publish(&mut self, snapshot: Arc<AnalysisSnapshot>) -> bool {
        let newer = self
            .published
            .as_ref()
            .map(|current| current.generation >= snapshot.generation)
            .unwrap_or(false);
        if newer {
            return false;
        }
        self.published = Some(snapshot);
        true
    }

    /// The most recently completed snapshot. Queries read this and never
    /// block on in-flight analysis.
    pub fn snapshot(&self) -> Option<Arc<AnalysisSnapshot>> {
        self.published.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyzing_twice_yields_identical_snapshots() {
        let source = "START P;\nITEM COUNT S 16;\nCOUNT := COUNT + 1;\nTERM";
        let first = analyze(source, 1);
        let second = analyze(source, 1);
        assert_eq!(first, second);
    }

    #[test]
    fn open_then_run_publishes_generation_one() {
        let mut session = DocumentSession::new("ITEM A S 16;".to_string());
        let pass = session.initial_pass();
        match pass.run().expect("no internal error") {
            PassOutcome::Completed(snapshot) => {
                assert_eq!(snapshot.generation, 1);
                assert!(session.publish(Arc::new(snapshot)));
            }
            PassOutcome::Superseded => panic!("nothing superseded this pass"),
        }
        assert!(session.snapshot().is_some());
    }

    #[test]
    fn newer_edit_supersedes_in_flight_pass() {
        let mut session = DocumentSession::new("ITEM A S 16;".to_string());
        let stale = session.begin_edit("ITEM B S 16;".to_string());
        // A newer edit arrives before the first pass runs.
        let fresh = session.begin_edit("ITEM C S 16;".to_string());
        match stale.run().expect("no internal error") {
            PassOutcome::Superseded => {}
            PassOutcome::Completed(_) => panic!("stale pass must be superseded"),
        }
        match fresh.run().expect("no internal error") {
            PassOutcome::Completed(snapshot) => {
                assert!(session.publish(Arc::new(snapshot)));
            }
            PassOutcome::Superseded => panic!("fresh pass is current"),
        }
        let snapshot = session.snapshot().expect("published");
        assert!(snapshot.text.contains("ITEM C"));
    }

    #[test]
    fn stale_snapshot_is_not_published_over_newer() {
        let mut session = DocumentSession::new(String::new());
        let older = analyze("ITEM OLD S 16;", 2);
        let newer = analyze("ITEM NEW S 16;", 3);
        assert!(session.publish(Arc::new(newer)));
        assert!(!session.publish(Arc::new(older)));
        assert!(session
            .snapshot()
            .expect("published")
            .text
            .contains("NEW"));
    }

    #[test]
    fn snapshot_resolves_positions_to_occurrences() {
        let snapshot = analyze("ITEM COUNT S 16;", 1);
        let occurrence = snapshot
            .occurrence_at(Position::new(0, 7))
            .expect("occurrence at COUNT");
        assert_eq!(occurrence.name, "COUNT");
    }
}
