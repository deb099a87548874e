//! Language Server Protocol (LSP) implementation for JOVIAL J73
//!
//! This crate provides language server capabilities for J73 sources,
//! enabling rich editor support in any LSP-compatible editor (VSCode,
//! Neovim, Emacs, Sublime, etc.).
//!
//! # Design Decision: tower-lsp
//!
//! After evaluating the Rust LSP ecosystem, we chose tower-lsp as our
//! framework:
//!
//! Considered Options:
//!
//! 1. tower-lsp: High-level async framework built on Tower
//! 2. lsp-server: Low-level sync library from rust-analyzer
//! 3. async-lsp: Low-level async with full Tower integration
//!
//! Why tower-lsp:
//!
//! - Best balance of ease-of-use and functionality for a small server
//! - Modern async/await patterns fit the cancel-and-reanalyze model:
//!   each edit supersedes the in-flight analysis pass through a
//!   shared generation counter, and passes run on blocking workers
//!   without stalling the protocol loop
//! - Good integration with the Rust async ecosystem (tokio, futures)
//!
//! # Feature Set
//!
//! J73 is a declaration-heavy embedded-systems language; the feature set
//! is chosen for navigating and editing such sources:
//!
//! 1. Completion (textDocument/completion):
//!    - Type letters and structural keywords in declaration headers
//!    - Visible symbols (innermost scope first) plus statement
//!      keywords elsewhere
//! 2. Hover (textDocument/hover):
//!    - Symbol kind, declared type descriptor, attributes,
//!      declaring scope and captured documentation comments
//!    - Keyword descriptions
//! 3. Go to Definition / Find References
//!    (textDocument/definition, textDocument/references):
//!    - Declaration lookup through the cross-reference index
//!    - All occurrences of a symbol in source order
//! 4. Document Symbols (textDocument/documentSymbol):
//!    - Hierarchical outline matching TABLE/PROC/COMPOOL nesting
//! 5. Diagnostics push:
//!    - Lex, parse and semantic diagnostics after every completed
//!      analysis pass
//!
//! # Architecture
//!
//! The server follows a layered architecture:
//!
//! LSP Layer (tower-lsp):
//! - JSON-RPC communication, handshaking, request routing
//!
//! Server Layer (this crate):
//! - Implements the LanguageServer trait
//! - Owns the open-document table: one analysis session per open
//!   document, created on didOpen, discarded on didClose
//! - Serializes edits per document; a new edit cancels the
//!   in-flight pass cooperatively between stages
//! - Thin handlers that convert between wire types and analysis
//!   types, with thin tests asserting the right things are called
//!
//! Feature Layer (jovial-analysis over jovial-syntax):
//! - Stateless queries over immutable analysis snapshots
//! - All language logic and dense unit tests live there
//!
//! # Error Handling and Robustness
//!
//! 1. No Panics:
//!    - `unwrap()`/`expect()` are avoided in production code paths;
//!      malformed input becomes diagnostics, not errors.
//! 2. Graceful Degradation:
//!    - Queries on unresolved names or stale positions return empty
//!      results rather than protocol errors.
//!    - An internal invariant violation aborts the analysis pass and
//!      leaves the previous snapshot current, with an internal-only
//!      log record; it is never observable through a query.
//! 3. Property-Based Testing:
//!    - `proptest` fuzzes the server with random document text to
//!      ensure stability under unexpected input.
//!
//! # Usage
//!
//! This crate provides both a library and binary:
//!
//! Binary:
//!
//! ```text
//! $ jovial-lsp
//! ```
//!
//! Starts the language server on stdin/stdout for editor
//! integration.

pub mod server;

pub use server::JovialLanguageServer;
