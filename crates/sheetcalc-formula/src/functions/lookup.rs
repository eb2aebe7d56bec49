//! Lookup and reference functions
//!
//! ROW, COLUMN, ROWS and COLUMNS look at the shape of their reference rather
//! than its contents, so they are registered with compilers that fold the
//! answer into a constant whenever the argument is a cell or range.

use super::text::wildcard_regex;
use super::{arg, as_table, boolean, cell_result, number, CellResult};
use crate::compiler::{CompiledExpr, EagerCall, FunctionCompiler};
use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::repository::RegisteredFunction;
use crate::value::{compare_values, values_equal, FormulaValue};
use sheetcalc_core::CellError;
use std::cmp::Ordering;
use std::mem::discriminant;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchMode {
    Exact,
    /// Largest value not above the needle, items sorted ascending
    LargestNotAbove,
    /// Smallest value not below the needle, items sorted descending
    SmallestNotBelow,
}

fn same_kind(a: &FormulaValue, b: &FormulaValue) -> bool {
    discriminant(a) == discriminant(b)
}

fn has_wildcards(s: &str) -> bool {
    s.contains(|c| matches!(c, '*' | '?' | '~'))
}

/// 0-based position of `needle` among `items`, `#N/A` when absent
fn find_position<'a>(
    needle: &FormulaValue,
    items: impl IntoIterator<Item = &'a FormulaValue>,
    mode: MatchMode,
) -> CellResult<usize> {
    let needle = match needle {
        FormulaValue::Error(e) => return Err(*e),
        FormulaValue::Empty => FormulaValue::Number(0.0),
        FormulaValue::Array(_) => needle.scalar(),
        other => other.clone(),
    };

    match mode {
        MatchMode::Exact => {
            let pattern = match &needle {
                FormulaValue::String(s) if has_wildcards(s) => Some(wildcard_regex(s, true)?),
                _ => None,
            };
            items
                .into_iter()
                .position(|item| match (&pattern, item) {
                    (Some(re), FormulaValue::String(s)) => re.is_match(s),
                    (Some(_), _) => false,
                    (None, item) => same_kind(item, &needle) && values_equal(item, &needle),
                })
                .ok_or(CellError::Na)
        }
        MatchMode::LargestNotAbove | MatchMode::SmallestNotBelow => {
            let stop = if mode == MatchMode::LargestNotAbove {
                Ordering::Greater
            } else {
                Ordering::Less
            };
            let mut found = None;
            for (i, item) in items.into_iter().enumerate() {
                if !same_kind(item, &needle) {
                    continue;
                }
                if compare_values(item, &needle) == stop {
                    break;
                }
                found = Some(i);
            }
            found.ok_or(CellError::Na)
        }
    }
}

/// Non-negative whole index argument
fn index_arg(value: &FormulaValue) -> CellResult<usize> {
    let n = number(value)?.trunc();
    if n < 0.0 {
        return Err(CellError::Value);
    }
    Ok(n as usize)
}

/// INDEX(array, row_num, [column_num])
///
/// A zero row or column selects the whole column or row. With one row and no
/// column argument, the second argument picks the column.
pub fn fn_index(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        if let FormulaValue::Error(e) = arg(args, 0) {
            return Err(*e);
        }
        let table = as_table(arg(args, 0));
        let rows = table.len();
        let cols = table.first().map_or(0, Vec::len);

        let (row, col) = match args.get(2) {
            Some(col) => (index_arg(arg(args, 1))?, index_arg(col)?),
            None if rows == 1 => (1, index_arg(arg(args, 1))?),
            None if cols == 1 => (index_arg(arg(args, 1))?, 1),
            None => (index_arg(arg(args, 1))?, 0),
        };
        if row > rows || col > cols {
            return Err(CellError::Ref);
        }

        let selected: Vec<Vec<FormulaValue>> = table
            .into_iter()
            .enumerate()
            .filter(|(r, _)| row == 0 || *r + 1 == row)
            .map(|(_, values)| {
                values
                    .into_iter()
                    .enumerate()
                    .filter(|(c, _)| col == 0 || *c + 1 == col)
                    .map(|(_, v)| v)
                    .collect()
            })
            .collect();

        match selected.as_slice() {
            [single] if single.len() == 1 => Ok(single[0].clone()),
            _ => Ok(FormulaValue::Array(selected)),
        }
    })
}

/// MATCH(lookup_value, lookup_array, [match_type])
///
/// match_type 1 (the default) finds the largest value not above the lookup
/// value, 0 an exact match, and -1 the smallest value not below it.
pub fn fn_match(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let mode = match args.get(2).map(number).transpose()?.unwrap_or(1.0) {
            t if t > 0.0 => MatchMode::LargestNotAbove,
            t if t < 0.0 => MatchMode::SmallestNotBelow,
            _ => MatchMode::Exact,
        };
        let table = as_table(arg(args, 1));
        let vector: Vec<&FormulaValue> = match table.as_slice() {
            [row] => row.iter().collect(),
            rows if rows.iter().all(|r| r.len() == 1) => rows.iter().flatten().collect(),
            _ => return Err(CellError::Na),
        };
        let position = find_position(arg(args, 0), vector, mode)?;
        Ok(FormulaValue::Number(position as f64 + 1.0))
    })
}

fn range_lookup_mode(args: &[FormulaValue]) -> CellResult<MatchMode> {
    match args.get(3).map(boolean).transpose()?.unwrap_or(true) {
        true => Ok(MatchMode::LargestNotAbove),
        false => Ok(MatchMode::Exact),
    }
}

/// 0-based offset from a 1-based index argument bounded by `len`
fn offset_within(value: &FormulaValue, len: usize) -> CellResult<usize> {
    let index = number(value)?.trunc();
    if index < 1.0 {
        return Err(CellError::Value);
    }
    if index > len as f64 {
        return Err(CellError::Ref);
    }
    Ok(index as usize - 1)
}

/// VLOOKUP(lookup_value, table_array, col_index_num, [range_lookup])
pub fn fn_vlookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let table = as_table(arg(args, 1));
        let width = table.first().map_or(0, Vec::len);
        let col = offset_within(arg(args, 2), width)?;
        let mode = range_lookup_mode(args)?;

        let row = find_position(arg(args, 0), table.iter().filter_map(|r| r.first()), mode)?;
        Ok(table[row].get(col).cloned().unwrap_or(FormulaValue::Empty))
    })
}

/// HLOOKUP(lookup_value, table_array, row_index_num, [range_lookup])
pub fn fn_hlookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let table = as_table(arg(args, 1));
        let row = offset_within(arg(args, 2), table.len())?;
        let mode = range_lookup_mode(args)?;

        let header = table.first().map(Vec::as_slice).unwrap_or_default();
        let col = find_position(arg(args, 0), header, mode)?;
        Ok(table[row].get(col).cloned().unwrap_or(FormulaValue::Empty))
    })
}

/// Body used only when the position compiler could not fold the call
fn position_of_current(
    args: &[FormulaValue],
    current: impl FnOnce() -> f64,
) -> FormulaResult<FormulaValue> {
    Ok(match args.first() {
        None => FormulaValue::Number(current()),
        Some(FormulaValue::Error(e)) => FormulaValue::Error(*e),
        Some(_) => FormulaValue::Error(CellError::Value),
    })
}

/// ROW([reference])
pub fn fn_row(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    position_of_current(args, || f64::from(ctx.current_row) + 1.0)
}

/// COLUMN([reference])
pub fn fn_column(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    position_of_current(args, || f64::from(ctx.current_col) + 1.0)
}

/// ROWS(array)
pub fn fn_rows(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match arg(args, 0) {
        FormulaValue::Error(e) => FormulaValue::Error(*e),
        value => FormulaValue::Number(value.dimensions().0 as f64),
    })
}

/// COLUMNS(array)
pub fn fn_columns(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match arg(args, 0) {
        FormulaValue::Error(e) => FormulaValue::Error(*e),
        value => FormulaValue::Number(value.dimensions().1 as f64),
    })
}

/// Folds ROW(ref) and COLUMN(ref) to the 1-based index of the reference's
/// top-left cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionCompiler {
    Row,
    Column,
}

impl FunctionCompiler for PositionCompiler {
    fn compile(
        &self,
        function: &Arc<RegisteredFunction>,
        args: Vec<CompiledExpr>,
    ) -> FormulaResult<CompiledExpr> {
        let (row, col) = match args.first() {
            None => return Ok(CompiledExpr::call(function.clone(), args, Arc::new(EagerCall))),
            Some(CompiledExpr::Cell(id)) => (id.row(), id.col()),
            Some(CompiledExpr::Range { range, .. }) => (range.start.row, range.start.col),
            Some(CompiledExpr::Value(FormulaValue::Error(e))) => {
                return Ok(CompiledExpr::Value(FormulaValue::Error(*e)))
            }
            Some(_) => return Ok(CompiledExpr::Value(FormulaValue::Error(CellError::Value))),
        };
        let index = match self {
            PositionCompiler::Row => f64::from(row),
            PositionCompiler::Column => f64::from(col),
        };
        Ok(CompiledExpr::Value(FormulaValue::Number(index + 1.0)))
    }
}

/// Folds ROWS(ref) and COLUMNS(ref) to the extent of the reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtentCompiler {
    Rows,
    Columns,
}

impl FunctionCompiler for ExtentCompiler {
    fn compile(
        &self,
        function: &Arc<RegisteredFunction>,
        args: Vec<CompiledExpr>,
    ) -> FormulaResult<CompiledExpr> {
        let extent = match (args.first(), self) {
            (Some(CompiledExpr::Cell(_)), _) => 1.0,
            (Some(CompiledExpr::Range { range, .. }), ExtentCompiler::Rows) => {
                f64::from(range.row_count())
            }
            (Some(CompiledExpr::Range { range, .. }), ExtentCompiler::Columns) => {
                f64::from(range.col_count())
            }
            _ => return Ok(CompiledExpr::call(function.clone(), args, Arc::new(EagerCall))),
        };
        Ok(CompiledExpr::Value(FormulaValue::Number(extent)))
    }
}
