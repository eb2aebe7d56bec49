//! Packed cell identity

use std::fmt;

use super::CellAddress;
use crate::{MAX_COLS, MAX_ROWS, MAX_SHEETS};

const COL_BITS: u32 = 14;
const ROW_BITS: u32 = 20;
const SHEET_SHIFT: u32 = ROW_BITS + COL_BITS;
const COL_MASK: u64 = (1 << COL_BITS) - 1;
const ROW_MASK: u64 = (1 << ROW_BITS) - 1;

/// Unique key for a cell (sheet index + row + column) packed into a `u64`.
///
/// Bit layout, most significant first:
///
/// ```text
/// 63            34 33          14 13         0
/// +---------------+--------------+------------+
/// | sheet (30)    | row (20)     | col (14)   |
/// +---------------+--------------+------------+
/// ```
///
/// Rows fit `MAX_ROWS` (2^20) and columns fit `MAX_COLS` (2^14) exactly, so the
/// packing is injective for every addressable cell. Ordering of the packed value
/// is sheet-major, then row, then column.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellId(u64);

impl CellId {
    /// Pack a (sheet, row, column) triple.
    ///
    /// Coordinates must be inside `MAX_SHEETS`/`MAX_ROWS`/`MAX_COLS`; this is
    /// checked in debug builds.
    pub fn new(sheet: usize, row: u32, col: u16) -> Self {
        debug_assert!(sheet < MAX_SHEETS, "sheet index {sheet} out of range");
        debug_assert!(row < MAX_ROWS, "row {row} out of range");
        debug_assert!(col < MAX_COLS, "column {col} out of range");
        CellId(
            ((sheet as u64) << SHEET_SHIFT)
                | ((row as u64 & ROW_MASK) << COL_BITS)
                | (col as u64 & COL_MASK),
        )
    }

    /// Pack a sheet index and address
    pub fn from_address(sheet: usize, addr: &CellAddress) -> Self {
        Self::new(sheet, addr.row, addr.col)
    }

    /// Worksheet index
    pub fn sheet(self) -> usize {
        (self.0 >> SHEET_SHIFT) as usize
    }

    /// Row index (0-based)
    pub fn row(self) -> u32 {
        ((self.0 >> COL_BITS) & ROW_MASK) as u32
    }

    /// Column index (0-based)
    pub fn col(self) -> u16 {
        (self.0 & COL_MASK) as u16
    }

    /// Relative address within the owning sheet
    pub fn address(self) -> CellAddress {
        CellAddress::new(self.row(), self.col())
    }

    /// Raw packed value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellId({}!{})", self.sheet(), self.address())
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]{}", self.sheet(), self.address())
    }
}
