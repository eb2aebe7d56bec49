//! # sheetcalc-formula
//!
//! Formula parser, compiler and function library for sheetcalc.
//!
//! This crate provides:
//! - Formula parsing (text → AST)
//! - Compilation against a [`FunctionRepository`] (AST → [`CompiledExpr`])
//! - Built-in spreadsheet functions, grouped into loadable modules
//! - The dependency chain that orders formula cells for calculation
//!
//! ## Example
//!
//! ```rust,ignore
//! use sheetcalc_formula::{parse_formula, Compiler, EvaluationContext, FunctionRepository};
//!
//! let repo = FunctionRepository::with_builtins();
//! let ast = parse_formula("=SUM(A1:A10)")?;
//! let expr = Compiler::new(&repo, &workbook, 0).compile(&ast)?;
//! let value = expr.evaluate(&EvaluationContext::new(&workbook, cell))?;
//! ```

pub mod ast;
pub mod compiler;
pub mod context;
pub mod dependency;
pub mod diagnostics;
pub mod error;
pub mod functions;
pub mod parser;
pub mod repository;
pub mod value;

pub use ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
pub use compiler::{
    CallEvaluator, CompiledCall, CompiledExpr, Compiler, EagerCall, FunctionCompiler, Reference,
    WithEvaluator,
};
pub use context::{EvaluationContext, DEFAULT_MAX_RANGE_CELLS};
pub use dependency::{DependencyChain, FormulaCell};
pub use diagnostics::{FormulaLogger, FunctionDiagnostics, FunctionStats, TracingLogger};
pub use error::{FormulaError, FormulaResult};
pub use functions::builtin_module;
pub use parser::parse_formula;
pub use repository::{
    Function, FunctionDef, FunctionId, FunctionImpl, FunctionModule, FunctionRepository,
    ModuleEntry, RegisteredFunction,
};
pub use value::{compare_values, format_number, values_equal, FormulaValue};
