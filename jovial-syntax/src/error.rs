//! Internal error taxonomy.
//!
//! Malformed *input* is reported through [`crate::diagnostics::Diagnostic`]
//! and is never an error value. These variants exist only for invariant
//! violations inside the analysis pipeline itself; a pass that hits one is
//! abandoned and the previously published snapshot stays current.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("scope tree corrupt at scope {scope}")]
    ScopeTreeCorrupt { scope: usize },
    #[error("symbol index {symbol} out of bounds")]
    SymbolOutOfBounds { symbol: usize },
}
