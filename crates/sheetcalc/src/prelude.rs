//! Prelude module - common imports for sheetcalc users
//!
//! ```rust
//! use sheetcalc::prelude::*;
//! ```

pub use crate::{
    // Calculation types
    CalculationEngine,
    CalculationOptions,
    CalculationStats,
    CancellationToken,
    // Cell types
    CellAddress,
    CellError,
    CellId,
    CellRange,
    CellStore,
    CellValue,
    // Error types
    Error,
    // Function extension types
    FormulaValue,
    FunctionDef,
    FunctionModule,
    FunctionRepository,
    Result,
    // Main types
    Workbook,
    // Extension traits
    WorkbookCalculationExt,
    Worksheet,
};
