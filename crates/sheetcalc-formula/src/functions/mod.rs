//! Built-in spreadsheet functions
//!
//! Every function has the [`FunctionImpl`] signature. Functions that need a
//! different evaluation strategy (IF evaluating one branch, ROW looking at the
//! reference rather than its value) also ship a custom compiler.
//!
//! [`builtin_module`] bundles the whole library so a
//! [`FunctionRepository`](crate::FunctionRepository) can load it like any other
//! module.

pub mod criteria;
pub mod database;
pub mod date;
pub mod info;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod statistical;
pub mod text;

use crate::error::FormulaResult;
use crate::repository::{FunctionDef, FunctionImpl, FunctionModule};
use crate::value::FormulaValue;
use sheetcalc_core::CellError;
use std::sync::Arc;

/// Result of a function body before spreadsheet errors are folded into values
pub(crate) type CellResult<T> = Result<T, CellError>;

/// Name, minimum and maximum argument count, implementation
type Entry = (&'static str, usize, Option<usize>, FunctionImpl);

const MATH_FUNCTIONS: &[Entry] = &[
    ("SUM", 1, None, math::fn_sum),
    ("PRODUCT", 1, None, math::fn_product),
    ("ABS", 1, Some(1), math::fn_abs),
    ("ROUND", 1, Some(2), math::fn_round),
    ("ROUNDUP", 1, Some(2), math::fn_roundup),
    ("ROUNDDOWN", 1, Some(2), math::fn_rounddown),
    ("INT", 1, Some(1), math::fn_int),
    ("TRUNC", 1, Some(2), math::fn_trunc),
    ("MOD", 2, Some(2), math::fn_mod),
    ("POWER", 2, Some(2), math::fn_power),
    ("SQRT", 1, Some(1), math::fn_sqrt),
    ("EXP", 1, Some(1), math::fn_exp),
    ("LN", 1, Some(1), math::fn_ln),
    ("LOG", 1, Some(2), math::fn_log),
    ("LOG10", 1, Some(1), math::fn_log10),
    ("PI", 0, Some(0), math::fn_pi),
    ("SIGN", 1, Some(1), math::fn_sign),
    ("SUMPRODUCT", 1, None, math::fn_sumproduct),
    ("ROMAN", 1, Some(2), math::fn_roman),
];

const LOGICAL_FUNCTIONS: &[Entry] = &[
    ("NOT", 1, Some(1), logical::fn_not),
    ("XOR", 1, None, logical::fn_xor),
    ("TRUE", 0, Some(0), logical::fn_true),
    ("FALSE", 0, Some(0), logical::fn_false),
];

const TEXT_FUNCTIONS: &[Entry] = &[
    ("LEN", 1, Some(1), text::fn_len),
    ("LEFT", 1, Some(2), text::fn_left),
    ("RIGHT", 1, Some(2), text::fn_right),
    ("MID", 3, Some(3), text::fn_mid),
    ("UPPER", 1, Some(1), text::fn_upper),
    ("LOWER", 1, Some(1), text::fn_lower),
    ("TRIM", 1, Some(1), text::fn_trim),
    ("CONCATENATE", 1, None, text::fn_concatenate),
    ("CONCAT", 1, None, text::fn_concat),
    ("REPT", 2, Some(2), text::fn_rept),
    ("FIND", 2, Some(3), text::fn_find),
    ("SEARCH", 2, Some(3), text::fn_search),
    ("SUBSTITUTE", 3, Some(4), text::fn_substitute),
    ("EXACT", 2, Some(2), text::fn_exact),
    ("VALUE", 1, Some(1), text::fn_value),
    ("T", 1, Some(1), text::fn_t),
];

const DATE_FUNCTIONS: &[Entry] = &[
    ("DATE", 3, Some(3), date::fn_date),
    ("YEAR", 1, Some(1), date::fn_year),
    ("MONTH", 1, Some(1), date::fn_month),
    ("DAY", 1, Some(1), date::fn_day),
    ("DAYS", 2, Some(2), date::fn_days),
    ("DAYS360", 2, Some(3), date::fn_days360),
    ("EDATE", 2, Some(2), date::fn_edate),
    ("EOMONTH", 2, Some(2), date::fn_eomonth),
    ("WEEKDAY", 1, Some(2), date::fn_weekday),
];

const STATISTICAL_FUNCTIONS: &[Entry] = &[
    ("AVERAGE", 1, None, statistical::fn_average),
    ("MIN", 1, None, statistical::fn_min),
    ("MAX", 1, None, statistical::fn_max),
    ("COUNT", 1, None, statistical::fn_count),
    ("COUNTA", 1, None, statistical::fn_counta),
    ("COUNTBLANK", 1, Some(1), statistical::fn_countblank),
    ("MEDIAN", 1, None, statistical::fn_median),
    ("LARGE", 2, Some(2), statistical::fn_large),
    ("SMALL", 2, Some(2), statistical::fn_small),
];

const CRITERIA_FUNCTIONS: &[Entry] = &[
    ("COUNTIF", 2, Some(2), criteria::fn_countif),
    ("SUMIF", 2, Some(3), criteria::fn_sumif),
    ("AVERAGEIF", 2, Some(3), criteria::fn_averageif),
    ("COUNTIFS", 2, None, criteria::fn_countifs),
    ("SUMIFS", 3, None, criteria::fn_sumifs),
];

const DATABASE_FUNCTIONS: &[Entry] = &[
    ("DSUM", 3, Some(3), database::fn_dsum),
    ("DCOUNT", 3, Some(3), database::fn_dcount),
    ("DCOUNTA", 3, Some(3), database::fn_dcounta),
    ("DAVERAGE", 3, Some(3), database::fn_daverage),
    ("DMAX", 3, Some(3), database::fn_dmax),
    ("DMIN", 3, Some(3), database::fn_dmin),
    ("DGET", 3, Some(3), database::fn_dget),
];

const LOOKUP_FUNCTIONS: &[Entry] = &[
    ("INDEX", 2, Some(3), lookup::fn_index),
    ("MATCH", 2, Some(3), lookup::fn_match),
    ("VLOOKUP", 3, Some(4), lookup::fn_vlookup),
    ("HLOOKUP", 3, Some(4), lookup::fn_hlookup),
];

const INFO_FUNCTIONS: &[Entry] = &[
    ("ISBLANK", 1, Some(1), info::fn_isblank),
    ("ISNUMBER", 1, Some(1), info::fn_isnumber),
    ("ISTEXT", 1, Some(1), info::fn_istext),
    ("ISLOGICAL", 1, Some(1), info::fn_islogical),
    ("ISERROR", 1, Some(1), info::fn_iserror),
    ("ISERR", 1, Some(1), info::fn_iserr),
    ("ISNA", 1, Some(1), info::fn_isna),
    ("NA", 0, Some(0), info::fn_na),
];

/// Every built-in function as one module
pub fn builtin_module() -> FunctionModule {
    let mut module = FunctionModule::new("builtin");

    for table in [
        MATH_FUNCTIONS,
        LOGICAL_FUNCTIONS,
        TEXT_FUNCTIONS,
        DATE_FUNCTIONS,
        STATISTICAL_FUNCTIONS,
        CRITERIA_FUNCTIONS,
        DATABASE_FUNCTIONS,
        LOOKUP_FUNCTIONS,
        INFO_FUNCTIONS,
    ] {
        for &(name, min_args, max_args, implementation) in table {
            module.add(FunctionDef::new(name, min_args, max_args, implementation));
        }
    }

    // Volatile
    module
        .add(FunctionDef::new("RAND", 0, Some(0), math::fn_rand).volatile())
        .add(FunctionDef::new("RANDBETWEEN", 2, Some(2), math::fn_randbetween).volatile())
        .add(FunctionDef::new("TODAY", 0, Some(0), date::fn_today).volatile())
        .add(FunctionDef::new("NOW", 0, Some(0), date::fn_now).volatile());

    // Lazy argument evaluation
    module
        .add_with_compiler(
            FunctionDef::new("IF", 2, Some(3), logical::fn_if),
            Arc::new(logical::IfCompiler),
        )
        .add_with_compiler(
            FunctionDef::new("IFERROR", 2, Some(2), logical::fn_iferror),
            Arc::new(logical::lazy(logical::IfErrorCall { only_na: false })),
        )
        .add_with_compiler(
            FunctionDef::new("IFNA", 2, Some(2), logical::fn_ifna),
            Arc::new(logical::lazy(logical::IfErrorCall { only_na: true })),
        )
        .add_with_compiler(
            FunctionDef::new("AND", 1, None, logical::fn_and),
            Arc::new(logical::lazy(logical::ShortCircuitCall { stop_on: false })),
        )
        .add_with_compiler(
            FunctionDef::new("OR", 1, None, logical::fn_or),
            Arc::new(logical::lazy(logical::ShortCircuitCall { stop_on: true })),
        )
        .add_with_compiler(
            FunctionDef::new("CHOOSE", 2, None, logical::fn_choose),
            Arc::new(logical::lazy(logical::ChooseCall)),
        );

    // Reference-aware
    module
        .add_with_compiler(
            FunctionDef::new("ROW", 0, Some(1), lookup::fn_row),
            Arc::new(lookup::PositionCompiler::Row),
        )
        .add_with_compiler(
            FunctionDef::new("COLUMN", 0, Some(1), lookup::fn_column),
            Arc::new(lookup::PositionCompiler::Column),
        )
        .add_with_compiler(
            FunctionDef::new("ROWS", 1, Some(1), lookup::fn_rows),
            Arc::new(lookup::ExtentCompiler::Rows),
        )
        .add_with_compiler(
            FunctionDef::new("COLUMNS", 1, Some(1), lookup::fn_columns),
            Arc::new(lookup::ExtentCompiler::Columns),
        );

    module
}

// === Argument helpers ===

static EMPTY: FormulaValue = FormulaValue::Empty;

/// Run a body that reports spreadsheet errors through `Err`
///
/// Errors become error values; non-finite numbers become `#NUM!`.
pub(crate) fn cell_result(
    body: impl FnOnce() -> CellResult<FormulaValue>,
) -> FormulaResult<FormulaValue> {
    Ok(match body() {
        Ok(FormulaValue::Number(n)) if !n.is_finite() => FormulaValue::Error(CellError::Num),
        Ok(value) => value,
        Err(e) => FormulaValue::Error(e),
    })
}

/// Argument `index`, or Empty when it was omitted
pub(crate) fn arg(args: &[FormulaValue], index: usize) -> &FormulaValue {
    args.get(index).unwrap_or(&EMPTY)
}

/// Coerce a scalar argument to a number
pub(crate) fn number(value: &FormulaValue) -> CellResult<f64> {
    match value {
        FormulaValue::Error(e) => Err(*e),
        FormulaValue::Array(_) => number(&value.scalar()),
        other => other.as_number().ok_or(CellError::Value),
    }
}

/// Optional numeric argument with a default when omitted
pub(crate) fn number_or(args: &[FormulaValue], index: usize, default: f64) -> CellResult<f64> {
    match args.get(index) {
        None => Ok(default),
        Some(v) => number(v),
    }
}

/// Coerce a scalar argument to text
pub(crate) fn text(value: &FormulaValue) -> CellResult<String> {
    match value {
        FormulaValue::Error(e) => Err(*e),
        FormulaValue::Array(_) => text(&value.scalar()),
        other => Ok(other.as_string()),
    }
}

/// Coerce a scalar argument to a boolean
pub(crate) fn boolean(value: &FormulaValue) -> CellResult<bool> {
    match value {
        FormulaValue::Error(e) => Err(*e),
        FormulaValue::Array(_) => boolean(&value.scalar()),
        other => other.as_bool().ok_or(CellError::Value),
    }
}

/// First error found anywhere in the value
pub(crate) fn first_error(value: &FormulaValue) -> Option<CellError> {
    value.flatten().find_map(FormulaValue::get_error)
}

/// Numbers for aggregate functions
///
/// Direct scalar arguments are coerced (`TRUE`, `"3"`), while booleans and
/// text inside arrays and ranges are skipped. Errors anywhere propagate.
pub(crate) fn collect_numbers(args: &[FormulaValue]) -> CellResult<Vec<f64>> {
    let mut numbers = Vec::new();
    for arg in args {
        match arg {
            FormulaValue::Array(_) => {
                for value in arg.flatten() {
                    match value {
                        FormulaValue::Number(n) => numbers.push(*n),
                        FormulaValue::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
            FormulaValue::Empty => {}
            other => numbers.push(number(other)?),
        }
    }
    Ok(numbers)
}

/// Borrow the rows of an array argument; scalars are a 1x1 table
pub(crate) fn as_table(value: &FormulaValue) -> Vec<Vec<FormulaValue>> {
    match value {
        FormulaValue::Array(rows) => rows.clone(),
        scalar => vec![vec![scalar.clone()]],
    }
}
