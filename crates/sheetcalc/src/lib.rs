//! # sheetcalc
//!
//! A spreadsheet calculation engine.
//!
//! Formulas are parsed and compiled against a function repository, ordered
//! by their cell dependencies and evaluated against any cell store
//! implementing [`CellStore`].
//!
//! ## Features
//!
//! - Full and partial recalculation with a persistent dependency chain
//! - Circular reference detection: cycle members become `#CIRCULAR!`,
//!   cells reading them are evaluated normally
//! - Volatile functions (NOW, TODAY, RAND, RANDBETWEEN)
//! - Loadable function modules with optional custom compilers
//! - Per-function call diagnostics through a pluggable logger
//! - Cooperative cancellation between cells
//!
//! ## Example
//!
//! ```rust
//! use sheetcalc::prelude::*;
//!
//! // Create a new workbook
//! let mut workbook = Workbook::new();
//!
//! // Get the first worksheet
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! // Set cell values
//! sheet.set_cell_value("A1", "Hello").unwrap();
//! sheet.set_cell_value("B1", 42.0).unwrap();
//!
//! // Set a formula
//! sheet.set_cell_formula("C1", "=B1*2").unwrap();
//!
//! let stats = workbook.calculate().unwrap();
//! assert_eq!(stats.formula_count, 1);
//! assert_eq!(workbook.value(CellId::new(0, 0, 2)), CellValue::Number(84.0));
//! ```

pub mod calculation;
pub mod error;
pub mod prelude;

// Re-export calculation types
pub use calculation::{
    CalculationEngine, CalculationOptions, CalculationStats, CancellationToken,
    WorkbookCalculationExt,
};
pub use error::{Error, Result};

// Re-export core types
pub use sheetcalc_core::{
    CellAddress, CellError, CellId, CellRange, CellStore, CellValue, SheetCatalog,
    SheetReference, Workbook, WorkbookSettings, Worksheet, MAX_COLS, MAX_ROWS,
    MAX_SHEET_NAME_LEN,
};

// Re-export formula types
pub use sheetcalc_formula::{
    parse_formula, CallEvaluator, CompiledExpr, Compiler, DependencyChain, EagerCall,
    EvaluationContext, FormulaCell, FormulaError, FormulaExpr, FormulaLogger, FormulaResult,
    FormulaValue, FunctionCompiler, FunctionDef, FunctionDiagnostics, FunctionModule,
    FunctionRepository, RegisteredFunction, TracingLogger,
};
