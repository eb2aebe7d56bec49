//! Formula error types

use sheetcalc_core::{CellError, CellId};
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors raised while parsing, compiling or ordering formulas
///
/// Spreadsheet-level errors such as `#DIV/0!` are not represented here; they
/// are ordinary values ([`crate::FormulaValue::Error`]) that flow through a
/// calculation. These variants describe failures of the machinery itself.
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Malformed formula text
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// Formula evaluation error raised by a function body
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Reference to invalid cell
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// A formula was registered twice for the same cell
    #[error("Duplicate formula registration for cell {0}")]
    DuplicateCell(CellId),

    /// The chain's index and cell sequence disagree
    #[error("Dependency chain corrupted: {0}")]
    ChainCorrupted(String),
}

impl FormulaError {
    /// Create a parse error at a byte offset of the formula body
    pub fn parse<S: Into<String>>(position: usize, message: S) -> Self {
        FormulaError::Parse {
            position,
            message: message.into(),
        }
    }

    /// Whether this error indicates a broken chain invariant. Structural
    /// errors abort a calculation pass; everything else is scoped to one cell.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            FormulaError::DuplicateCell(_) | FormulaError::ChainCorrupted(_)
        )
    }

    /// Error code stored in a cell whose formula failed with this error
    pub fn cell_error(&self) -> CellError {
        match self {
            FormulaError::UnknownFunction(_) => CellError::Name,
            FormulaError::InvalidReference(_) => CellError::Ref,
            _ => CellError::Value,
        }
    }
}
