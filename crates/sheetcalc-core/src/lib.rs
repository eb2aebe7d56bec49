//! # sheetcalc-core
//!
//! Core data structures shared by the sheetcalc calculation engine.
//!
//! This crate provides:
//! - [`CellId`] - Packed (sheet, row, column) key used for dependency bookkeeping
//! - [`CellAddress`], [`CellRange`] and [`SheetReference`] - Cell addressing and
//!   resolution of `Sheet1!A1:B3` style text
//! - [`CellValue`] and [`CellError`] - Values stored in cells
//! - [`CellStore`] - The boundary the engine reads from and writes results into
//! - [`Workbook`], [`Worksheet`] - A simple in-memory store implementing [`CellStore`]
//!
//! ## Example
//!
//! ```rust
//! use sheetcalc_core::{CellId, CellStore, CellValue, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_cell_value("A1", 42.0).unwrap();
//! sheet.set_cell_formula("B1", "=A1*2").unwrap();
//!
//! assert_eq!(workbook.value(CellId::new(0, 0, 0)), CellValue::Number(42.0));
//! assert_eq!(workbook.formula_text(CellId::new(0, 0, 1)), Some("=A1*2"));
//! ```

pub mod cell;
pub mod error;
pub mod store;
pub mod workbook;
pub mod worksheet;

pub use cell::{CellAddress, CellError, CellId, CellRange, CellValue, SheetReference};
pub use error::{Error, Result};
pub use store::{CellStore, SheetCatalog};
pub use workbook::{Workbook, WorkbookSettings};
pub use worksheet::Worksheet;

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum number of worksheets addressable through a [`CellId`]
pub const MAX_SHEETS: usize = 1 << 30;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
