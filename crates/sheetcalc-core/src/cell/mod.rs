//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellId`] - The packed 64-bit identity of a cell
//! - [`CellValue`] - The value stored in a cell
//! - [`CellAddress`] - A cell's location (e.g., "A1")
//! - [`CellRange`] - A range of cells (e.g., "A1:B10")
//! - [`SheetReference`] - An optionally sheet-qualified address or range

mod address;
mod id;
mod value;

pub use address::{CellAddress, CellRange, CellRangeIterator, SheetReference};
pub use id::CellId;
pub use value::{CellError, CellValue};
