//! Evaluation context handed to compiled expressions and function bodies

use crate::diagnostics::FunctionDiagnostics;
use crate::value::FormulaValue;
use sheetcalc_core::{CellError, CellId, CellRange, CellStore};

/// Ranges with more cells than this are clamped to the sheet's used area
pub const DEFAULT_MAX_RANGE_CELLS: u64 = 1 << 16;

/// Context for formula evaluation
pub struct EvaluationContext<'a> {
    /// Cell storage for reference lookups (`None` when evaluating detached)
    pub store: Option<&'a dyn CellStore>,
    /// Current worksheet index
    pub current_sheet: usize,
    /// Current cell row
    pub current_row: u32,
    /// Current cell column
    pub current_col: u16,
    /// Ranges larger than this are clamped to the used area of their sheet
    pub max_range_cells: u64,
    /// Per-function call counters, when diagnostics are collected
    pub diagnostics: Option<&'a FunctionDiagnostics>,
}

impl<'a> EvaluationContext<'a> {
    /// Context for evaluating the formula in `cell`
    pub fn new(store: &'a dyn CellStore, cell: CellId) -> Self {
        Self {
            store: Some(store),
            current_sheet: cell.sheet(),
            current_row: cell.row(),
            current_col: cell.col(),
            max_range_cells: DEFAULT_MAX_RANGE_CELLS,
            diagnostics: None,
        }
    }

    /// Context without cell storage; every reference reads as empty
    pub fn detached() -> Self {
        Self {
            store: None,
            current_sheet: 0,
            current_row: 0,
            current_col: 0,
            max_range_cells: DEFAULT_MAX_RANGE_CELLS,
            diagnostics: None,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: &'a FunctionDiagnostics) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn with_max_range_cells(mut self, max_range_cells: u64) -> Self {
        self.max_range_cells = max_range_cells;
        self
    }

    /// The cell whose formula is being evaluated
    pub fn current_cell(&self) -> CellId {
        CellId::new(self.current_sheet, self.current_row, self.current_col)
    }

    /// Whether the 1904 date system is in effect
    pub fn date_1904(&self) -> bool {
        self.store.map_or(false, |s| s.date_1904())
    }

    /// Value of a single cell
    pub fn cell_value(&self, id: CellId) -> FormulaValue {
        match self.store {
            None => FormulaValue::Empty,
            Some(store) if id.sheet() >= store.sheet_count() => FormulaValue::Error(CellError::Ref),
            Some(store) => store.value(id).into(),
        }
    }

    /// Values of a range as rows of columns
    pub fn range_values(&self, sheet: usize, range: &CellRange) -> FormulaValue {
        if let Some(store) = self.store {
            if sheet >= store.sheet_count() {
                return FormulaValue::Error(CellError::Ref);
            }
        }

        let Some(range) = self.effective_range(sheet, range) else {
            return FormulaValue::Array(Vec::new());
        };

        let rows = (range.start.row..=range.end.row)
            .map(|row| {
                (range.start.col..=range.end.col)
                    .map(|col| self.cell_value(CellId::new(sheet, row, col)))
                    .collect()
            })
            .collect();
        FormulaValue::Array(rows)
    }

    /// The part of `range` that is actually read. Oversized ranges keep their
    /// top-left corner and stop at the sheet's used area.
    pub fn effective_range(&self, sheet: usize, range: &CellRange) -> Option<CellRange> {
        if range.cell_count() <= self.max_range_cells {
            return Some(*range);
        }
        let used = self.store.and_then(|s| s.dimension(sheet))?;
        let end_row = range.end.row.min(used.end.row);
        let end_col = range.end.col.min(used.end.col);
        if end_row < range.start.row || end_col < range.start.col {
            return None;
        }
        Some(CellRange::from_indices(
            range.start.row,
            range.start.col,
            end_row,
            end_col,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetcalc_core::Workbook;

    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value("A1", 1.0).unwrap();
        ws.set_cell_value("A2", "two").unwrap();
        ws.set_cell_value("B3", true).unwrap();
        wb
    }

    #[test]
    fn test_cell_and_range_values() {
        let wb = workbook();
        let ctx = EvaluationContext::new(&wb, CellId::new(0, 9, 9));
        assert_eq!(ctx.current_cell(), CellId::new(0, 9, 9));
        assert_eq!(ctx.cell_value(CellId::new(0, 0, 0)), FormulaValue::Number(1.0));
        assert_eq!(
            ctx.cell_value(CellId::new(4, 0, 0)),
            FormulaValue::Error(CellError::Ref)
        );

        let values = ctx.range_values(0, &CellRange::parse("A1:B2").unwrap());
        assert_eq!(
            values,
            FormulaValue::Array(vec![
                vec![FormulaValue::Number(1.0), FormulaValue::Empty],
                vec![FormulaValue::String("two".into()), FormulaValue::Empty],
            ])
        );
    }

    #[test]
    fn test_oversized_range_is_clamped_to_used_area() {
        let wb = workbook();
        let ctx = EvaluationContext::new(&wb, CellId::new(0, 0, 5)).with_max_range_cells(100);
        let whole_columns = CellRange::from_indices(0, 0, 1_048_575, 1);
        assert_eq!(
            ctx.effective_range(0, &whole_columns),
            Some(CellRange::parse("A1:B3").unwrap())
        );
        assert_eq!(ctx.range_values(0, &whole_columns).dimensions(), (3, 2));

        let below_used = CellRange::from_indices(10, 0, 1_048_575, 1);
        assert_eq!(ctx.effective_range(0, &below_used), None);
    }

    #[test]
    fn test_detached_context_reads_empty() {
        let ctx = EvaluationContext::detached();
        assert_eq!(ctx.cell_value(CellId::new(0, 0, 0)), FormulaValue::Empty);
        assert!(!ctx.date_1904());
        assert_eq!(
            ctx.range_values(0, &CellRange::parse("A1:A2").unwrap()).dimensions(),
            (2, 1)
        );
    }
}
