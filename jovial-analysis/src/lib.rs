//! Editor queries for JOVIAL J73 documents
//!
//! This crate answers editor requests against an analysis snapshot from
//! `jovial-syntax`: completion, hover, go-to-definition, find-references,
//! and the document outline.
//!
//! # Architecture
//!
//! The crate is organized into one module per feature:
//!
//! - `utils`: occurrence/token lookup and shared markdown rendering
//! - `completion`: context-aware candidates with tiered ordering
//! - `hover`: symbol and keyword information at a position
//! - `go_to_definition`: declaration lookup for an occurrence
//! - `references`: every occurrence of a symbol in source order
//! - `document_symbols`: the scope tree as a hierarchical outline
//!
//! # Design Principles
//!
//! - **Stateless**: every function is a pure read over an immutable
//!   [`jovial_syntax::AnalysisSnapshot`]
//! - **No failures for not-found**: an unresolved name or a position
//!   outside any token yields an empty result, never an error
//! - **Reusable**: not tied to the LSP wire protocol — usable from CLIs
//!   and editor plugins; only `lsp_types` item/symbol kind enums are
//!   shared with the protocol layer

pub mod completion;
pub mod document_symbols;
pub mod go_to_definition;
pub mod hover;
pub mod references;
pub mod utils;

// Test support (available in tests and as dev-dependency)
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
