//! Error types for the calculation engine

use sheetcalc_formula::FormulaError;
use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a calculation pass
///
/// Problems scoped to a single cell (bad syntax, unknown functions, `#DIV/0!`)
/// never surface here; they are stored as the cell's value and counted in
/// [`crate::CalculationStats::errors`].
#[derive(Debug, Error)]
pub enum Error {
    /// Cell storage rejected a read or write
    #[error(transparent)]
    Store(#[from] sheetcalc_core::Error),

    /// The dependency chain is inconsistent
    #[error(transparent)]
    Formula(#[from] FormulaError),

    /// The pass was cancelled; results committed before that remain valid
    #[error("Calculation cancelled after {evaluated} cells")]
    Cancelled { evaluated: usize },
}
