//! Workbook type - an in-memory [`CellStore`]

use crate::cell::{CellId, CellRange, CellValue};
use crate::error::{Error, Result};
use crate::store::{CellStore, SheetCatalog};
use crate::worksheet::Worksheet;
use crate::MAX_SHEET_NAME_LEN;

/// A workbook (ordered collection of worksheets plus settings)
#[derive(Debug, Clone)]
pub struct Workbook {
    worksheets: Vec<Worksheet>,
    settings: WorkbookSettings,
}

impl Workbook {
    /// Create a new workbook with one worksheet named "Sheet1"
    pub fn new() -> Self {
        Self {
            worksheets: vec![Worksheet::new("Sheet1")],
            settings: WorkbookSettings::default(),
        }
    }

    /// Create an empty workbook with no worksheets
    pub fn empty() -> Self {
        Self {
            worksheets: Vec::new(),
            settings: WorkbookSettings::default(),
        }
    }

    /// Get the number of worksheets
    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    /// Get a worksheet by index
    pub fn worksheet(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    /// Get a mutable worksheet by index
    pub fn worksheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.worksheets.get_mut(index)
    }

    /// Get a worksheet by name (case-insensitive)
    pub fn worksheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheet_index(name).map(|i| &self.worksheets[i])
    }

    /// Get a mutable worksheet by name (case-insensitive)
    pub fn worksheet_by_name_mut(&mut self, name: &str) -> Option<&mut Worksheet> {
        self.sheet_index(name).map(|i| &mut self.worksheets[i])
    }

    /// Get the index of a worksheet by name (case-insensitive)
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.worksheets
            .iter()
            .position(|ws| ws.name().eq_ignore_ascii_case(name))
    }

    /// Iterate over all worksheets
    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.iter()
    }

    /// Add a new worksheet with a generated "SheetN" name
    pub fn add_worksheet(&mut self) -> Result<usize> {
        let name = self.generate_sheet_name();
        self.add_worksheet_with_name(&name)
    }

    /// Add a new worksheet with specified name
    pub fn add_worksheet_with_name(&mut self, name: &str) -> Result<usize> {
        self.validate_sheet_name(name, None)?;
        self.worksheets.push(Worksheet::new(name));
        Ok(self.worksheets.len() - 1)
    }

    /// Rename a worksheet
    pub fn rename_worksheet(&mut self, index: usize, new_name: &str) -> Result<()> {
        if index >= self.worksheets.len() {
            return Err(Error::SheetOutOfBounds(index, self.worksheets.len()));
        }
        self.validate_sheet_name(new_name, Some(index))?;
        self.worksheets[index].set_name(new_name);
        Ok(())
    }

    /// Get workbook settings
    pub fn settings(&self) -> &WorkbookSettings {
        &self.settings
    }

    /// Get mutable workbook settings
    pub fn settings_mut(&mut self) -> &mut WorkbookSettings {
        &mut self.settings
    }

    fn validate_sheet_name(&self, name: &str, exclude_index: Option<usize>) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {MAX_SHEET_NAME_LEN} characters)"
            )));
        }
        if let Some(c) = name
            .chars()
            .find(|c| matches!(c, ':' | '\\' | '/' | '?' | '*' | '[' | ']'))
        {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name cannot contain '{c}'"
            )));
        }
        match self.sheet_index(name) {
            Some(i) if Some(i) != exclude_index => Err(Error::DuplicateSheetName(name.into())),
            _ => Ok(()),
        }
    }

    fn generate_sheet_name(&self) -> String {
        (self.worksheets.len() + 1..)
            .map(|n| format!("Sheet{n}"))
            .find(|name| self.sheet_index(name).is_none())
            .unwrap_or_default()
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetCatalog for Workbook {
    fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    fn sheet_index(&self, name: &str) -> Option<usize> {
        Workbook::sheet_index(self, name)
    }

    fn sheet_name(&self, index: usize) -> Option<&str> {
        self.worksheets.get(index).map(Worksheet::name)
    }

    fn dimension(&self, sheet: usize) -> Option<CellRange> {
        self.worksheets.get(sheet)?.used_range()
    }
}

impl CellStore for Workbook {
    fn value(&self, id: CellId) -> CellValue {
        self.worksheets
            .get(id.sheet())
            .map(|ws| ws.get_value_at(id.row(), id.col()))
            .unwrap_or_default()
    }

    fn formula_text(&self, id: CellId) -> Option<&str> {
        self.worksheets
            .get(id.sheet())?
            .get_formula_at(id.row(), id.col())
    }

    fn formula_cells(&self) -> Vec<CellId> {
        self.worksheets
            .iter()
            .enumerate()
            .flat_map(|(sheet, ws)| {
                ws.formula_cells()
                    .map(move |(row, col, _)| CellId::new(sheet, row, col))
            })
            .collect()
    }

    fn set_computed_value(&mut self, id: CellId, value: CellValue) -> Result<()> {
        let count = self.worksheets.len();
        self.worksheets
            .get_mut(id.sheet())
            .ok_or(Error::SheetOutOfBounds(id.sheet(), count))?
            .set_formula_result(id.row(), id.col(), value)
    }

    fn date_1904(&self) -> bool {
        self.settings.date_1904
    }
}

/// Workbook-level settings
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkbookSettings {
    /// Date system: false = 1900 (Windows), true = 1904 (Mac)
    pub date_1904: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CellError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_workbook() {
        let wb = Workbook::new();
        assert_eq!(wb.sheet_count(), 1);
        assert_eq!(wb.worksheet(0).unwrap().name(), "Sheet1");
    }

    #[test]
    fn test_add_worksheets() {
        let mut wb = Workbook::new();
        assert_eq!(wb.add_worksheet().unwrap(), 1);
        assert_eq!(wb.worksheet(1).unwrap().name(), "Sheet2");
        assert_eq!(wb.add_worksheet_with_name("Data").unwrap(), 2);
        assert_eq!(SheetCatalog::sheet_name(&wb, 2), Some("Data"));
    }

    #[test]
    fn test_sheet_names_are_case_insensitive() {
        let mut wb = Workbook::new();
        assert!(wb.add_worksheet_with_name("SHEET1").is_err());
        wb.add_worksheet_with_name("Data").unwrap();
        assert_eq!(wb.sheet_index("data"), Some(1));
        wb.rename_worksheet(1, "DATA").unwrap();
        assert_eq!(wb.worksheet(1).unwrap().name(), "DATA");
    }

    #[test]
    fn test_invalid_sheet_name() {
        let mut wb = Workbook::new();
        assert!(wb.add_worksheet_with_name("").is_err());
        assert!(wb.add_worksheet_with_name("Sheet/1").is_err());
        assert!(wb.add_worksheet_with_name("Sheet[1]").is_err());
        let long_name = "A".repeat(MAX_SHEET_NAME_LEN + 1);
        assert!(wb.add_worksheet_with_name(&long_name).is_err());
    }

    #[test]
    fn test_cell_store_roundtrip() {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Other").unwrap();
        wb.worksheet_mut(0).unwrap().set_cell_value("A1", 3).unwrap();
        wb.worksheet_mut(1)
            .unwrap()
            .set_cell_formula("B2", "=Sheet1!A1")
            .unwrap();

        let target = CellId::new(1, 1, 1);
        assert_eq!(wb.formula_cells(), vec![target]);
        assert_eq!(wb.formula_text(target), Some("=Sheet1!A1"));
        assert_eq!(wb.value(target), CellValue::Empty);

        wb.set_computed_value(target, CellValue::Number(3.0)).unwrap();
        assert_eq!(wb.value(target), CellValue::Number(3.0));

        assert!(wb
            .set_computed_value(CellId::new(0, 0, 0), CellError::Na.into())
            .is_err());
        assert!(wb
            .set_computed_value(CellId::new(7, 0, 0), CellValue::Empty)
            .is_err());
        assert_eq!(wb.dimension(1), Some(CellRange::parse("B2").unwrap()));
        assert_eq!(wb.dimension(9), None);
    }

    #[test]
    fn test_date_system_setting() {
        let mut wb = Workbook::new();
        assert!(!wb.date_1904());
        wb.settings_mut().date_1904 = true;
        assert!(wb.date_1904());
    }
}
