//! The cell-storage boundary used by the calculation engine
//!
//! The engine never owns cell storage. It reads raw values and formula text
//! through [`CellStore`], asks [`SheetCatalog`] for sheet names and bounds while
//! resolving references, and writes computed results back with
//! [`CellStore::set_computed_value`].

use crate::cell::{CellId, CellRange, CellValue};
use crate::error::Result;

/// Sheet naming and bounds queries
pub trait SheetCatalog {
    /// Number of worksheets
    fn sheet_count(&self) -> usize;

    /// Index of the worksheet with the given name (case-insensitive)
    fn sheet_index(&self, name: &str) -> Option<usize>;

    /// Name of the worksheet at `index`
    fn sheet_name(&self, index: usize) -> Option<&str>;

    /// Bounding box of the non-empty cells of a sheet, `None` if the sheet is
    /// empty or does not exist
    fn dimension(&self, sheet: usize) -> Option<CellRange>;
}

/// Read/write access to cell contents
pub trait CellStore: SheetCatalog {
    /// Current value of a cell. Formula cells report their last computed
    /// result ([`CellValue::Empty`] before the first calculation).
    fn value(&self, id: CellId) -> CellValue;

    /// Formula text of a cell, if it holds a formula
    fn formula_text(&self, id: CellId) -> Option<&str>;

    /// Every cell currently holding a formula, in ascending [`CellId`] order
    fn formula_cells(&self) -> Vec<CellId>;

    /// Store the computed result of a formula cell
    fn set_computed_value(&mut self, id: CellId, value: CellValue) -> Result<()>;

    /// Whether serial dates count from 1904-01-01 instead of 1899-12-30
    fn date_1904(&self) -> bool {
        false
    }
}
