//! Language analysis core for JOVIAL J73
//!
//! This crate turns raw J73 source into a queryable analysis snapshot:
//! tokens, a declaration/statement tree, a scoped symbol table and a
//! cross-reference index, together with all the diagnostics produced along
//! the way.
//!
//! # Architecture
//!
//! The pipeline runs one way per analysis cycle:
//!
//! - `lexer`: text → classified tokens with spans; quoted text is always a
//!   uniform `QuotedText` token (comment vs string is a parser decision)
//! - `parser`: tokens → declaration/statement tree, recovering at
//!   statement boundaries so mid-edit input still yields a usable tree
//! - `symbols`: tree → scope arena + symbol table with case-insensitive,
//!   innermost-outward name resolution
//! - `xref`: tree + symbols → occurrence index (declaration/read/write/
//!   call) with binary-search position lookup
//! - `session`: generation-tagged re-analysis with cooperative
//!   cancellation between stages, publishing immutable snapshots
//!
//! # Design Principles
//!
//! - **Never panic on input**: malformed source produces diagnostics and
//!   recovery, not errors; only internal invariant violations surface as
//!   [`error::SyntaxError`], and those abort the pass rather than publish
//! - **Immutable snapshots**: queries read a published
//!   [`session::AnalysisSnapshot`] without locking
//! - **Protocol-agnostic**: nothing here depends on LSP types; the query
//!   and server layers live in their own crates

pub mod ast;
pub mod diagnostics;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod session;
pub mod span;
pub mod symbols;
pub mod token;
pub mod xref;

pub use session::{analyze, AnalysisSnapshot, DocumentSession, PassOutcome};
pub use span::{Position, Span};
